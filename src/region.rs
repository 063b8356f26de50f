// SPDX-License-Identifier: Apache-2.0

//! Naturally aligned address space for an enclave
//!
//! An enclave must live at an address which is a multiple of its size. The
//! kernel gives no such guarantee, so we reserve twice as much as we need,
//! pick the aligned window inside the reservation and give the rest back.

use crate::{Error, Result};

use std::fmt;
use std::fs::File;
use std::io;
use std::ops::Range;

use log::trace;
use mmarinus::{perms, Kind, Map};
use primordial::Page;

/// A power-of-two sized range of addresses starting at a multiple of its size
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct AlignedRange {
    base: usize,
    size: usize,
}

impl AlignedRange {
    /// Creates a range, checking the alignment invariants
    pub fn new(base: usize, size: usize) -> Option<Self> {
        if !size.is_power_of_two() || base % size != 0 {
            return None;
        }

        base.checked_add(size)?;
        Some(Self { base, size })
    }

    /// The first naturally aligned range of `size` bytes at or after `addr`
    ///
    /// Returns `None` if `size` is not a power of two or the range would
    /// overflow the address space.
    pub fn within(addr: usize, size: usize) -> Option<Self> {
        if !size.is_power_of_two() {
            return None;
        }

        let base = addr.checked_add(size - 1)? & !(size - 1);
        Self::new(base, size)
    }

    /// The smallest power of two that holds `len` bytes, and at least one page
    pub fn size_for(len: usize) -> Option<usize> {
        len.max(Page::SIZE).checked_next_power_of_two()
    }

    /// The first address in the range
    pub fn base(&self) -> usize {
        self.base
    }

    /// The number of bytes in the range
    pub fn size(&self) -> usize {
        self.size
    }

    /// One past the last address in the range
    pub fn end(&self) -> usize {
        self.base + self.size
    }

    /// Whether `addr` falls inside the range
    pub fn contains(&self, addr: usize) -> bool {
        (self.base..self.end()).contains(&addr)
    }
}

impl From<AlignedRange> for Range<usize> {
    fn from(range: AlignedRange) -> Self {
        range.base..range.end()
    }
}

impl fmt::Debug for AlignedRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}-{:016x}", self.base, self.end())
    }
}

/// A reserved, naturally aligned and RWX mapped region of address space
///
/// The mapping is released when the region is dropped.
pub struct Region {
    range: AlignedRange,
    _map: Map<perms::Unknown>,
}

impl Region {
    /// Reserves a naturally aligned region of `size` bytes
    ///
    /// When a `backing` file is given the region is a shared mapping of it
    /// (the SGX driver requires enclave memory to be mapped from the device),
    /// otherwise it is private anonymous memory.
    ///
    /// On failure nothing stays mapped: every partial mapping is owned by a
    /// `Map` and unmapped as it goes out of scope.
    pub fn reserve(size: usize, backing: Option<&mut File>) -> Result<Self> {
        if size == 0 || !size.is_power_of_two() {
            return Err(Error::mapping("align")(io::Error::from_raw_os_error(
                libc::EINVAL,
            )));
        }

        // We map twice as much as we need so that we can naturally align it.
        let twice = size
            .checked_mul(2)
            .ok_or_else(|| Error::mapping("reserve")(io::Error::from_raw_os_error(libc::ENOMEM)))?;
        let map = reserve(twice, backing).map_err(Error::mapping("reserve"))?;
        trace!(
            "reserved: {:016x}-{:016x}",
            map.addr(),
            map.addr() + map.size()
        );

        let range = AlignedRange::within(map.addr(), size)
            .ok_or_else(|| Error::mapping("align")(io::Error::from_raw_os_error(libc::EINVAL)))?;
        let map = trim(map, range).map_err(Error::mapping("align"))?;
        trace!("aligned: {:?}", range);

        // Upgrade the permissions of the aligned window.
        let rwx = libc::PROT_READ | libc::PROT_WRITE | libc::PROT_EXEC;
        // SAFETY: the range is exactly the mapping we own.
        if unsafe { libc::mprotect(map.addr() as *mut _, map.size(), rwx) } != 0 {
            return Err(Error::mapping("protect")(io::Error::last_os_error()));
        }

        Ok(Self {
            range,
            _map: map.into(), // Discard typed permissions
        })
    }

    /// The addresses covered by this region
    pub fn range(&self) -> AlignedRange {
        self.range
    }
}

impl fmt::Debug for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Region").field(&self.range).finish()
    }
}

// SAFETY: the region is only address space; no thread owns the mapping.
unsafe impl Send for Region {}

fn reserve(size: usize, backing: Option<&mut File>) -> io::Result<Map<perms::None>> {
    Ok(match backing {
        Some(file) => Map::map(size)
            .anywhere()
            .from(file, 0)
            .known::<perms::None>(Kind::Shared)?,

        None => Map::map(size)
            .anywhere()
            .anonymously()
            .known::<perms::None>(Kind::Private)?,
    })
}

fn trim(map: Map<perms::None>, range: AlignedRange) -> io::Result<Map<perms::None>> {
    // Dropping the head and the tail unmaps them.
    let (_, map) = map.split_at(range.base())?;
    let (map, _) = map.split(range.size())?;
    Ok(map)
}
