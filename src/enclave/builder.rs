// SPDX-License-Identifier: Apache-2.0

use super::page::Pages;
use super::{Descriptor, Enclave};
use crate::driver::Driver;
use crate::error::Request;
use crate::region::{AlignedRange, Region};
use crate::types::{EinitToken, SigStruct};
use crate::{Error, Result};

use std::io;

use log::{debug, trace};

/// A struct which assists in enclave creation
///
/// 1. Create the enclave with `Builder::new()`.
/// 2. Add the image with `Builder::load()`.
/// 3. Finalize the enclave with `Builder::build()`.
pub struct Builder<'a, D: Driver + ?Sized> {
    driver: &'a mut D,
    descriptor: Descriptor,
    region: Region,
}

impl<'a, D: Driver + ?Sized> Builder<'a, D> {
    /// Creates an enclave large enough to hold `image_size` bytes
    ///
    /// The enclave size is the smallest power of two holding the image. A
    /// naturally aligned region of that size is reserved and ECREATE is
    /// issued for it. If ECREATE fails the region is released again.
    ///
    /// For those familiar with the Intel documentation, this function wraps
    /// the call to the kernel to issue the `ECREATE` instruction.
    pub fn new(driver: &'a mut D, image_size: usize) -> Result<Self> {
        let size = AlignedRange::size_for(image_size).ok_or_else(|| {
            Error::mapping("size")(io::Error::from_raw_os_error(libc::ENOMEM))
        })?;

        let region = Region::reserve(size, driver.backing())?;
        let descriptor = Descriptor::new(region.range());

        driver
            .create(&descriptor.secs())
            .map_err(Error::driver(Request::Create))?;
        debug!("enclave created: {:?}", descriptor.range());

        Ok(Self {
            driver,
            descriptor,
            region,
        })
    }

    /// The parameters the enclave is being created with
    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    /// Adds the image to the enclave, one page per request
    ///
    /// The image must be a non-empty multiple of the page size. The first
    /// failing request aborts the load; pages added before it are not
    /// removed, the enclave is simply discarded with the builder.
    ///
    /// For those familiar with the Intel documentation, this function wraps
    /// the calls to the kernel to issue the `EADD` and `EEXTEND`
    /// instructions.
    pub fn load(&mut self, image: &[u8]) -> Result<()> {
        let pages = Pages::new(self.descriptor.range(), image)
            .ok_or(Error::Image { len: image.len() })?;

        let mut added = 0;
        for page in pages {
            trace!(
                "adding page {}: {:016x} {}",
                page.index,
                page.addr,
                page.secinfo
            );

            self.driver
                .add_page(&page)
                .map_err(Error::driver(Request::AddPage(page.index)))?;

            added += page.src.len();
        }

        debug_assert_eq!(added, image.len());
        debug!("added {} bytes to the enclave", added);
        Ok(())
    }

    /// Finalizes the enclave
    ///
    /// On failure the builder is consumed and the region released.
    ///
    /// For those familiar with the Intel documentation, this function wraps
    /// the call to the kernel to issue the `EINIT` instruction.
    pub fn build(self, sigstruct: &SigStruct, token: &EinitToken) -> Result<Enclave> {
        self.driver
            .init(self.descriptor.base(), sigstruct, token)
            .map_err(Error::driver(Request::Init))?;
        debug!("enclave initialized");

        Ok(Enclave {
            descriptor: self.descriptor,
            _region: self.region,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use crate::driver::{Call, Fail, Memory};
    use crate::enclave::entry::{self, ECALL_MAGIC, INIT_MAGIC};
    use crate::enclave::page::PageIndex;
    use crate::measure::Measurement;
    use crate::types::{Attributes, Class};

    use primordial::Page;

    fn artifacts(image: &[u8]) -> (SigStruct, EinitToken) {
        let size = AlignedRange::size_for(image.len()).unwrap();
        let range = AlignedRange::new(0, size).unwrap();

        let mut m = Measurement::new(size, Descriptor::SSA_FRAME_SIZE);
        for page in Pages::new(range, image).unwrap() {
            m.add(page.index.offset(), &page);
        }
        let mrenclave = m.finish();

        let mut sig = SigStruct::default();
        sig.set_enclave_hash(mrenclave);
        let mut token = EinitToken::default();
        token.issue(mrenclave);

        (sig, token)
    }

    #[test]
    fn create() {
        let mut driver = Memory::new();
        let builder = Builder::new(&mut driver, 3 * Page::SIZE).unwrap();

        let descriptor = *builder.descriptor();
        assert_eq!(descriptor.size(), 4 * Page::SIZE);
        assert_eq!(descriptor.base() % descriptor.size(), 0);
        drop(builder);

        assert_eq!(
            driver.calls(),
            &[Call::Create {
                base: descriptor.base(),
                size: 4 * Page::SIZE,
                ssa_frame_size: 1,
                attributes: Attributes::MODE64BIT | Attributes::DEBUG,
                xfrm: 7,
            }]
        );
    }

    #[test]
    fn create_fails() {
        let mut driver = Memory::new().fail(Fail::Create);
        let err = Builder::new(&mut driver, Page::SIZE).err().unwrap();

        assert!(matches!(
            err,
            Error::Driver {
                request: Request::Create,
                ..
            }
        ));
    }

    #[test]
    fn load_and_build() {
        let image = vec![0xccu8; 2 * Page::SIZE];
        let (sig, token) = artifacts(&image);

        let mut driver = Memory::new();
        let mut builder = Builder::new(&mut driver, image.len()).unwrap();
        let base = builder.descriptor().base();
        builder.load(&image).unwrap();
        let enclave = builder.build(&sig, &token).unwrap();

        assert_eq!(enclave.tcs(), base);
        assert_eq!(enclave.descriptor().size(), 2 * Page::SIZE);

        let calls = driver.calls();
        assert_eq!(calls.len(), 4);
        assert!(matches!(calls[1], Call::AddPage { addr, class: Some(Class::Tcs), .. } if addr == base));
        assert!(
            matches!(calls[2], Call::AddPage { addr, class: Some(Class::Reg), .. } if addr == base + Page::SIZE)
        );
        assert_eq!(calls[3], Call::Init { base });

        let found = entry::invoke(&mut driver, &enclave, ECALL_MAGIC, INIT_MAGIC).unwrap();
        assert_eq!(found, INIT_MAGIC);
    }

    #[test]
    fn load_stops_at_first_failure() {
        let image = vec![0u8; 4 * Page::SIZE];

        let mut driver = Memory::new().fail(Fail::AddPage(PageIndex::new(2)));
        let mut builder = Builder::new(&mut driver, image.len()).unwrap();
        let err = builder.load(&image).unwrap_err();
        drop(builder);

        match err {
            Error::Driver {
                request: Request::AddPage(index),
                ..
            } => assert_eq!(index, PageIndex::new(2)),
            e => panic!("unexpected error: {}", e),
        }

        let added = driver
            .calls()
            .iter()
            .filter(|c| matches!(c, Call::AddPage { .. }))
            .count();
        assert_eq!(added, 3);
    }

    #[test]
    fn build_with_wrong_measurement() {
        let image = vec![0u8; 2 * Page::SIZE];
        let (sig, token) = artifacts(&vec![1u8; 2 * Page::SIZE]);

        let mut driver = Memory::new();
        let mut builder = Builder::new(&mut driver, image.len()).unwrap();
        builder.load(&image).unwrap();

        assert!(matches!(
            builder.build(&sig, &token),
            Err(Error::Driver {
                request: Request::Init,
                ..
            })
        ));
    }

    #[test]
    fn load_rejects_partial_pages() {
        let mut driver = Memory::new();
        let mut builder = Builder::new(&mut driver, 2 * Page::SIZE).unwrap();

        assert!(matches!(
            builder.load(&vec![0u8; Page::SIZE + 1]),
            Err(Error::Image { len }) if len == Page::SIZE + 1
        ));
        assert!(matches!(builder.load(&[]), Err(Error::Image { len: 0 })));
        drop(builder);

        assert_eq!(driver.calls().len(), 1);
    }
}
