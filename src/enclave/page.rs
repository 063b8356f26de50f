// SPDX-License-Identifier: Apache-2.0

//! Splitting an enclave image into the pages submitted to the driver

use crate::region::AlignedRange;
use crate::types::{Class, Flags, SecInfo};

use std::fmt;
use std::iter::FusedIterator;
use std::slice::ChunksExact;

use primordial::Page;

/// Measure all 16 256-byte chunks of a page (EEXTEND each of them)
pub const MEASURE_ALL: u16 = u16::MAX;

/// The position of a page within the enclave image
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PageIndex(usize);

impl PageIndex {
    /// The page at position `index`
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// The position of the page
    pub const fn get(self) -> usize {
        self.0
    }

    /// The byte offset of the page from the enclave base
    pub const fn offset(self) -> usize {
        self.0 * Page::SIZE
    }
}

impl fmt::Display for PageIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A single page submission to the driver
#[derive(Copy, Clone)]
pub struct PageRecord<'a> {
    /// Position of the page in the image
    pub index: PageIndex,
    /// Destination address inside the enclave
    pub addr: usize,
    /// Exactly one page of source data
    pub src: &'a [u8],
    /// Class and permissions of the page
    pub secinfo: SecInfo,
    /// Which 256-byte chunks are measured
    pub mrmask: u16,
}

impl fmt::Debug for PageRecord<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageRecord")
            .field("index", &self.index)
            .field("addr", &format_args!("{:016x}", self.addr))
            .field("secinfo", &format_args!("{}", self.secinfo))
            .field("mrmask", &format_args!("{:#06x}", self.mrmask))
            .finish()
    }
}

/// Iterator over the page submissions covering an enclave image
///
/// The first page is the thread control structure; every other page is a
/// regular RWX page. All pages are fully measured.
pub struct Pages<'a> {
    base: usize,
    chunks: std::iter::Enumerate<ChunksExact<'a, u8>>,
}

impl<'a> Pages<'a> {
    /// Plans the submissions of `image` into the enclave at `range`
    ///
    /// Returns `None` unless the image is a non-empty multiple of the page
    /// size that fits into the range.
    pub fn new(range: AlignedRange, image: &'a [u8]) -> Option<Self> {
        if image.is_empty() || image.len() % Page::SIZE != 0 || image.len() > range.size() {
            return None;
        }

        Some(Self {
            base: range.base(),
            chunks: image.chunks_exact(Page::SIZE).enumerate(),
        })
    }
}

impl<'a> Iterator for Pages<'a> {
    type Item = PageRecord<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let (i, src) = self.chunks.next()?;
        let index = PageIndex::new(i);

        let secinfo = match i {
            0 => SecInfo::tcs(),
            _ => SecInfo::reg(Flags::READ | Flags::WRITE | Flags::EXECUTE),
        };

        Some(PageRecord {
            index,
            addr: self.base + index.offset(),
            src,
            secinfo,
            mrmask: MEASURE_ALL,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.chunks.size_hint()
    }
}

impl ExactSizeIterator for Pages<'_> {}
impl FusedIterator for Pages<'_> {}

impl PageRecord<'_> {
    /// Whether this is the thread control page
    pub fn is_tcs(&self) -> bool {
        self.secinfo.class() == Some(Class::Tcs)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use rstest::rstest;

    const BASE: usize = 0x7f00_0000_0000;

    fn range(pages: usize) -> AlignedRange {
        let size = AlignedRange::size_for(pages * Page::SIZE).unwrap();
        AlignedRange::new(BASE, size).unwrap()
    }

    #[test]
    fn single_page() {
        let image = vec![0u8; Page::SIZE];
        let pages: Vec<_> = Pages::new(range(1), &image).unwrap().collect();

        assert_eq!(pages.len(), 1);
        assert!(pages[0].is_tcs());
        assert_eq!(pages[0].addr, BASE);
        assert_eq!(pages[0].index, PageIndex::new(0));
        assert_eq!(pages[0].mrmask, MEASURE_ALL);
        assert_eq!(pages.iter().filter(|p| !p.is_tcs()).count(), 0);
    }

    #[rstest]
    #[case(2)]
    #[case(3)]
    #[case(8)]
    #[case(33)]
    fn many_pages(#[case] n: usize) {
        let image: Vec<u8> = (0..n * Page::SIZE).map(|i| (i / Page::SIZE) as u8).collect();
        let pages = Pages::new(range(n), &image).unwrap();
        assert_eq!(pages.len(), n);

        let pages: Vec<_> = pages.collect();
        assert!(pages[0].is_tcs());
        assert_eq!(pages[0].addr, BASE);

        for (i, page) in pages.iter().enumerate().skip(1) {
            assert!(!page.is_tcs());
            assert_eq!(page.secinfo.class(), Some(Class::Reg));
            assert_eq!(
                page.secinfo.flags(),
                Flags::READ | Flags::WRITE | Flags::EXECUTE
            );
            assert_eq!(page.addr, BASE + Page::SIZE * i);
            assert_eq!(page.index.offset(), Page::SIZE * i);
            assert_eq!(page.mrmask, MEASURE_ALL);
        }

        // Every byte is submitted exactly once and in order.
        let total: usize = pages.iter().map(|p| p.src.len()).sum();
        assert_eq!(total, image.len());
        for page in &pages {
            assert_eq!(page.src.len(), Page::SIZE);
            assert!(page.src.iter().all(|b| *b == page.index.get() as u8));
        }
    }

    #[test]
    fn rejects_bad_images() {
        assert!(Pages::new(range(1), &[]).is_none());
        assert!(Pages::new(range(1), &[0u8; 100]).is_none());
        assert!(Pages::new(range(1), &vec![0u8; Page::SIZE + 1]).is_none());
        assert!(Pages::new(range(1), &vec![0u8; 2 * Page::SIZE]).is_none());
    }
}
