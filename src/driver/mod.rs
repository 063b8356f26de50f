// SPDX-License-Identifier: Apache-2.0

//! The privileged interface used to build and enter an enclave
//!
//! [`Isgx`] talks to the real driver; [`Memory`] is an in-process stand-in
//! that enforces the same sequencing rules and computes the measurement in
//! software.

mod ioctls;
mod isgx;
mod mem;

pub use isgx::{Isgx, ISGX_DEVICE_PATH};
pub use mem::{Call, Fail, Memory};

use crate::enclave::page::PageRecord;
use crate::enclave::Transfer;
use crate::types::{EinitToken, Secs, SigStruct};

use std::fs::File;
use std::io;

/// The enclave building requests of an SGX driver
///
/// Each method is one blocking request to the driver.
pub trait Driver {
    /// The file enclave memory must be mapped from, if any
    fn backing(&mut self) -> Option<&mut File> {
        None
    }

    /// Creates an enclave from its control structure (ECREATE)
    fn create(&mut self, secs: &Secs) -> io::Result<()>;

    /// Adds and measures a single page (EADD, EEXTEND)
    fn add_page(&mut self, page: &PageRecord<'_>) -> io::Result<()>;

    /// Finalizes the enclave at `base` (EINIT)
    fn init(&mut self, base: usize, sigstruct: &SigStruct, token: &EinitToken) -> io::Result<()>;
}

/// Transfer of control into an initialized enclave
pub trait Gate {
    /// Enters the enclave through the TCS at `tcs`, passing `arg`
    ///
    /// Returns the scalar the enclave handed back when it exited.
    fn enter(&mut self, tcs: usize, arg: u64) -> Result<u64, Transfer>;
}
