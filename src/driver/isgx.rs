// SPDX-License-Identifier: Apache-2.0

//! The out-of-tree Intel SGX driver

use super::ioctls::*;
use super::{Driver, Gate};
use crate::enclave::page::PageRecord;
use crate::enclave::Transfer;
use crate::error::Request;
use crate::types::{EinitToken, Secs, SigStruct};
use crate::{Error, Result};

use std::fs::{metadata, File, OpenOptions};
use std::io;
use std::os::unix::fs::FileTypeExt;
use std::path::Path;

use log::trace;

/// Default path to the driver device.
pub const ISGX_DEVICE_PATH: &str = "/dev/isgx";

/// An open handle to the `isgx` driver
#[derive(Debug)]
pub struct Isgx(File);

impl Isgx {
    /// Opens the driver device at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let meta = metadata(path).map_err(Error::driver(Request::Open))?;
        if !meta.file_type().is_char_device() {
            return Err(Error::driver(Request::Open)(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} is not a character device", path.display()),
            )));
        }

        OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map(Self)
            .map_err(Error::driver(Request::Open))
    }
}

impl Driver for Isgx {
    fn backing(&mut self) -> Option<&mut File> {
        Some(&mut self.0)
    }

    fn create(&mut self, secs: &Secs) -> io::Result<()> {
        trace!("creating enclave: {:?}", secs);
        ENCLAVE_CREATE.ioctl(&mut self.0, &Create::new(secs))?;
        Ok(())
    }

    fn add_page(&mut self, page: &PageRecord<'_>) -> io::Result<()> {
        let secinfo = page.secinfo;
        ENCLAVE_ADD_PAGE.ioctl(&mut self.0, &AddPage::new(page, &secinfo))?;
        Ok(())
    }

    fn init(&mut self, base: usize, sigstruct: &SigStruct, token: &EinitToken) -> io::Result<()> {
        ENCLAVE_INIT.ioctl(&mut self.0, &Init::new(base, sigstruct, token))?;
        Ok(())
    }
}

impl Gate for Isgx {
    fn enter(&mut self, tcs: usize, arg: u64) -> std::result::Result<u64, Transfer> {
        #[cfg(target_arch = "x86_64")]
        {
            let mut result = 0u64;

            // SAFETY: `tcs` is the TCS page of an initialized enclave which
            // only writes the result slot passed in `rsi`.
            match unsafe { eenter(tcs, arg, &mut result) } {
                EEXIT => Ok(result),
                leaf => Err(Transfer::Interrupted { leaf }),
            }
        }

        #[cfg(not(target_arch = "x86_64"))]
        {
            let _ = (tcs, arg);
            Err(Transfer::Unsupported)
        }
    }
}

#[cfg(target_arch = "x86_64")]
const EENTER: u64 = 2;

#[cfg(target_arch = "x86_64")]
const EEXIT: u64 = 4;

/// Enters the enclave with `arg` in `rdi` and `result` in `rsi`
///
/// The asynchronous exit pointer is the instruction right after `enclu`,
/// which is also where EEXIT returns to. The leaf left in `rax` tells the
/// two apart: EEXIT leaves `4`, an AEX leaves ERESUME (`3`).
///
/// The enclave preserves `rsp` and `rbp`; every other register is
/// clobbered.
#[cfg(target_arch = "x86_64")]
unsafe fn eenter(tcs: usize, arg: u64, result: &mut u64) -> u64 {
    use std::arch::asm;

    let leaf: u64;

    asm!(
        "push rbx",       // save rbx
        "push rbp",       // save rbp
        "mov  rbx, {tcs}",
        "lea  rcx, [rip + 2f]",
        "enclu",
        "2:",
        "pop  rbp",       // restore rbp
        "pop  rbx",       // restore rbx

        tcs = in(reg) tcs,
        inout("rax") EENTER => leaf,
        inout("rdi") arg => _,
        inout("rsi") (result as *mut u64) => _,
        out("rcx") _,
        out("rdx") _,
        out("r8") _,
        out("r9") _,
        out("r10") _,
        out("r11") _,
        out("r12") _,
        out("r13") _,
        out("r14") _,
        out("r15") _,
    );

    leaf
}
