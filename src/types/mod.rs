// SPDX-License-Identifier: Apache-2.0

//! Hardware structures exchanged with the SGX driver
//!
//! Section references refer to the [Intel® 64 and IA-32 Architectures
//! Software Developer's Manual Volume 3D](https://www.intel.com/content/dam/www/public/us/en/documents/manuals/64-ia-32-architectures-software-developer-vol-3d-part-4-manual.pdf).

mod secinfo;
mod secs;
mod sig;

pub use secinfo::{Class, Flags, SecInfo};
pub use secs::{Attributes, Secs};
pub use sig::{EinitToken, SigStruct};
