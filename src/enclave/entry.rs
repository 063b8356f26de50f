// SPDX-License-Identifier: Apache-2.0

//! The single validated call into a finished enclave

use super::Enclave;
use crate::driver::Gate;
use crate::{Error, Result};

use log::{debug, trace};

/// The argument the enclave expects on entry
pub const ECALL_MAGIC: u64 = 0;

/// The value the enclave answers with once it is up
pub const INIT_MAGIC: u64 = 0xcafe_f00d_dead_beef;

/// Control did not come back from the enclave through EEXIT
#[derive(Copy, Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Transfer {
    /// The enclave was left with an asynchronous exit
    #[error("enclave exited with leaf {leaf:#x} instead of EEXIT")]
    Interrupted {
        /// The ENCLU leaf found in `rax` after the exit
        leaf: u64,
    },

    /// Entering enclaves is not supported on this platform
    #[error("entering enclaves is not supported on this platform")]
    Unsupported,
}

/// Enters `enclave` once with `arg` and checks that it answers `expected`
///
/// A failed transfer and a wrong answer are reported as different errors;
/// neither is retried.
pub fn invoke<G: Gate + ?Sized>(
    gate: &mut G,
    enclave: &Enclave,
    arg: u64,
    expected: u64,
) -> Result<u64> {
    let tcs = enclave.tcs();
    trace!("entering enclave: tcs={:016x} arg={:#x}", tcs, arg);

    let found = gate.enter(tcs, arg)?;
    debug!("enclave returned {:#x}", found);

    if found != expected {
        return Err(Error::Validation { expected, found });
    }

    Ok(found)
}
