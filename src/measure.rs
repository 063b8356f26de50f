// SPDX-License-Identifier: Apache-2.0

//! Software computation of the enclave measurement (MRENCLAVE)
//!
//! This mirrors what the hardware hashes while the enclave is built
//! (Section 41.3). The signing toolchain computes the same value to put into
//! the SIGSTRUCT, so it can be used to predict or double check it.

use crate::enclave::page::PageRecord;

use primordial::Page;
use sha2::{Digest, Sha256};

/// An MRENCLAVE accumulator
#[derive(Clone)]
pub struct Measurement(Sha256);

impl Measurement {
    /// Mimics ECREATE
    pub fn new(size: usize, ssa_frame_pages: u32) -> Self {
        // This value documented in 41.3.
        const ECREATE: u64 = 0x0045544145524345;

        let mut sha256 = Sha256::new();
        sha256.update(ECREATE.to_le_bytes());
        sha256.update(ssa_frame_pages.to_le_bytes());
        sha256.update((size as u64).to_le_bytes());
        sha256.update([0u8; 44]); // Reserved

        Self(sha256)
    }

    /// Mimics EADD and the EEXTENDs selected by the page's mask
    ///
    /// `offset` is the page offset from the enclave base.
    pub fn add(&mut self, offset: usize, page: &PageRecord<'_>) {
        // These values documented in 41.3.
        const EEXTEND: u64 = 0x00444E4554584545;
        const EADD: u64 = 0x0000000044444145;

        debug_assert_eq!(offset % Page::SIZE, 0);
        debug_assert_eq!(page.src.len(), Page::SIZE);

        self.0.update(EADD.to_le_bytes());
        self.0.update((offset as u64).to_le_bytes());
        self.0.update(&page.secinfo.as_bytes()[..48]);

        for (i, chunk) in page.src.chunks(256).enumerate() {
            if page.mrmask & (1 << i) == 0 {
                continue;
            }

            self.0.update(EEXTEND.to_le_bytes());
            self.0.update(((offset + i * 256) as u64).to_le_bytes());
            self.0.update([0u8; 48]);
            self.0.update(chunk);
        }
    }

    /// Produces the MRENCLAVE value
    pub fn finish(self) -> [u8; 32] {
        self.0.finalize().into()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use crate::enclave::page::Pages;
    use crate::region::AlignedRange;

    fn measure(image: &[u8], base: usize) -> [u8; 32] {
        let size = AlignedRange::size_for(image.len()).unwrap();
        let range = AlignedRange::new(base, size).unwrap();

        let mut m = Measurement::new(size, 1);
        for page in Pages::new(range, image).unwrap() {
            m.add(page.addr - range.base(), &page);
        }

        m.finish()
    }

    #[test]
    fn independent_of_base() {
        let image = vec![0x90u8; 2 * Page::SIZE];
        assert_eq!(measure(&image, 0x2000), measure(&image, 0x7f00_0000_0000));
    }

    #[test]
    fn covers_content() {
        let mut image = vec![0u8; 2 * Page::SIZE];
        let before = measure(&image, 0x2000);

        image[Page::SIZE + 1000] = 1;
        assert_ne!(before, measure(&image, 0x2000));
    }

    #[test]
    fn covers_size() {
        let one = Measurement::new(0x1000, 1).finish();
        let two = Measurement::new(0x2000, 1).finish();
        assert_ne!(one, two);
    }

    #[test]
    fn unmeasured_chunks() {
        let mut image = vec![0u8; Page::SIZE];
        let range = AlignedRange::new(0x1000, 0x1000).unwrap();

        let hash = |image: &[u8], mrmask: u16| {
            let mut m = Measurement::new(0x1000, 1);
            for mut page in Pages::new(range, image).unwrap() {
                page.mrmask = mrmask;
                m.add(0, &page);
            }
            m.finish()
        };

        let before = hash(&image, 0xfffe);
        image[10] = 0xff; // Inside chunk 0, which is not measured.
        assert_eq!(before, hash(&image, 0xfffe));
        assert_ne!(hash(&image, 0xffff), hash(&image, 0xfffe));
    }
}
