// SPDX-License-Identifier: Apache-2.0

//! An SGX enclave runtime skeleton for the out-of-tree `isgx` driver
//!
//! The crate builds one enclave from three artifacts (the image, its
//! SIGSTRUCT and a launch token), enters it once and checks that it answers
//! with the expected value. [`pal::Pal`] drives that lifecycle; the
//! [`ffi`] module exports it with the `pal_*` C ABI expected by enclave
//! runtimes that load PALs as shared objects.
//!
//! ```no_run
//! use skeleton_pal::config::Config;
//! use skeleton_pal::driver::Isgx;
//! use skeleton_pal::pal::Pal;
//!
//! # fn main() -> skeleton_pal::Result<()> {
//! let config = Config::default();
//! let driver = Isgx::open(&config.device)?;
//!
//! let mut pal = Pal::new(config, driver);
//! pal.init()?;
//! let code = pal.exec(&mut std::io::stderr())?;
//! pal.destroy()?;
//! # let _ = code;
//! # Ok(())
//! # }
//! ```

#![deny(clippy::all)]
#![deny(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod artifact;
pub mod config;
pub mod driver;
pub mod enclave;
pub mod ffi;
pub mod logger;
pub mod measure;
pub mod pal;
pub mod region;
pub mod types;

mod error;

pub use error::{Error, Request, Result};
