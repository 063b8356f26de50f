// SPDX-License-Identifier: Apache-2.0

use std::fmt;
use std::io;
use std::path::PathBuf;

use crate::enclave::page::PageIndex;
use crate::enclave::Transfer;
use crate::pal::State;

/// A privileged request issued to the driver
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Request {
    /// Opening the driver device
    Open,
    /// ECREATE
    Create,
    /// EADD (and EEXTEND) of a single page
    AddPage(PageIndex),
    /// EINIT
    Init,
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => f.write_str("open"),
            Self::Create => f.write_str("ECREATE"),
            Self::AddPage(index) => write!(f, "EADD of page {}", index),
            Self::Init => f.write_str("EINIT"),
        }
    }
}

/// Errors produced while building, entering or managing an enclave
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An artifact could not be opened, inspected or read in full
    #[error("failed to load {}: {source}", .path.display())]
    Io {
        /// The artifact path
        path: PathBuf,
        /// The underlying failure
        source: io::Error,
    },

    /// The image cannot be split into enclave pages
    #[error("invalid enclave image of {len} bytes")]
    Image {
        /// The image size
        len: usize,
    },

    /// Reserving, aligning or protecting the enclave address space failed
    #[error("failed to {what} enclave memory: {source}")]
    Mapping {
        /// The step that failed
        what: &'static str,
        /// The underlying failure
        source: io::Error,
    },

    /// A privileged request was rejected by the driver
    #[error("{request} request failed: {source}")]
    Driver {
        /// The request that failed
        request: Request,
        /// The driver's answer
        source: io::Error,
    },

    /// An operation was invoked in the wrong lifecycle state
    #[error("cannot {operation}: enclave runtime skeleton is {state}")]
    State {
        /// The rejected operation
        operation: &'static str,
        /// The state the handle was in
        state: State,
    },

    /// Control never came back from the enclave through EEXIT
    #[error("failed to enter enclave: {0}")]
    Transfer(#[from] Transfer),

    /// The enclave returned, but with the wrong value
    #[error("Unexpected result: {found:#x} != {expected:#x}")]
    Validation {
        /// The value the enclave should have returned
        expected: u64,
        /// The value it did return
        found: u64,
    },

    /// The initialization arguments could not be parsed
    #[error("invalid arguments: {0}")]
    Config(String),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io { path, source }
    }

    pub(crate) fn mapping(what: &'static str) -> impl FnOnce(io::Error) -> Self {
        move |source| Self::Mapping { what, source }
    }

    pub(crate) fn driver(request: Request) -> impl FnOnce(io::Error) -> Self {
        move |source| Self::Driver { request, source }
    }

    /// The negative errno reported for this error at the C boundary
    pub fn errno(&self) -> i32 {
        -match self {
            Self::Io { .. } => libc::ENOENT,
            Self::Image { .. } => libc::ENOENT,
            Self::Mapping { .. } => libc::ENOMEM,
            Self::Driver { .. } => libc::EINVAL,
            Self::State { .. } => libc::EPERM,
            Self::Transfer(..) => libc::EFAULT,
            Self::Validation { .. } => libc::EPERM,
            Self::Config(..) => libc::EINVAL,
        }
    }
}

/// A specialized `Result` for enclave operations
pub type Result<T> = std::result::Result<T, Error>;
