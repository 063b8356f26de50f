// SPDX-License-Identifier: Apache-2.0

//! # Building an Enclave
//!
//! An enclave is built in three steps, each wrapping one kind of driver
//! request:
//!
//!   1. `Builder::new()` reserves a naturally aligned region of address
//!      space and issues ECREATE for it.
//!
//!   2. `Builder::load()` adds the image page by page with EADD. The first
//!      page is the Thread Control Structure (TCS); all others are regular
//!      RWX pages. Every page is measured.
//!
//!   3. `Builder::build()` issues EINIT with the SIGSTRUCT and EINITTOKEN.
//!      The hardware compares the measurement of the loaded pages against
//!      the SIGSTRUCT and the SIGSTRUCT against the token.
//!
//! Dropping a `Builder` at any point releases the region; there is no need
//! to undo individual pages.
//!
//! # Executing an Enclave
//!
//! A finished `Enclave` is entered exactly once per call through
//! `entry::invoke()`, which uses the TCS at the enclave base.

mod builder;
pub mod entry;
pub mod page;

pub use builder::Builder;
pub use entry::Transfer;

use crate::region::{AlignedRange, Region};
use crate::types::{Attributes, Secs};

/// The fixed parameters of the enclave control structure
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Descriptor {
    range: AlignedRange,
    ssa_frame_size: u32,
    attributes: Attributes,
    xfrm: u64,
}

impl Descriptor {
    /// Pages per SSA frame
    pub const SSA_FRAME_SIZE: u32 = 1;

    /// x87, SSE and AVX state
    pub const XFRM: u64 = 0x7;

    /// Describes a 64-bit debug enclave covering `range`
    pub fn new(range: AlignedRange) -> Self {
        Self {
            range,
            ssa_frame_size: Self::SSA_FRAME_SIZE,
            attributes: Attributes::MODE64BIT | Attributes::DEBUG,
            xfrm: Self::XFRM,
        }
    }

    /// The address range of the enclave
    pub fn range(&self) -> AlignedRange {
        self.range
    }

    /// The enclave base address
    pub fn base(&self) -> usize {
        self.range.base()
    }

    /// The enclave size
    pub fn size(&self) -> usize {
        self.range.size()
    }

    /// Pages per SSA frame
    pub fn ssa_frame_size(&self) -> u32 {
        self.ssa_frame_size
    }

    /// The enclave attributes
    pub fn attributes(&self) -> Attributes {
        self.attributes
    }

    /// The extended feature mask
    pub fn xfrm(&self) -> u64 {
        self.xfrm
    }

    /// The SECS handed to ECREATE
    pub fn secs(&self) -> Secs {
        Secs::new(
            self.base() as u64,
            self.size() as u64,
            self.ssa_frame_size,
            self.attributes,
            self.xfrm,
        )
    }
}

/// A fully initialized enclave
///
/// The enclave memory is released when this is dropped.
#[derive(Debug)]
pub struct Enclave {
    descriptor: Descriptor,
    _region: Region,
}

impl Enclave {
    /// The parameters the enclave was created with
    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    /// The address of the thread control page
    ///
    /// The image always starts with it, so this is the enclave base.
    pub fn tcs(&self) -> usize {
        self.descriptor.base()
    }
}
