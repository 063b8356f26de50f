// SPDX-License-Identifier: Apache-2.0

//! The C ABI of the PAL shared object
//!
//! The ABI has no handle argument, so the process holds exactly one [`Pal`]
//! behind a mutex. Every export returns `0` on success and a negative errno
//! on failure.

use crate::config::Config;
use crate::driver::{Driver, Gate, Isgx};
use crate::pal::{report, Pal, State, VERSION};
use crate::{logger, Error, Result};

use std::ffi::CStr;
use std::fs::File;
use std::io::{self, Write};
use std::mem::ManuallyDrop;
use std::os::raw::{c_char, c_int};
use std::os::unix::io::FromRawFd;
use std::sync::{Mutex, MutexGuard};

use log::error;

const UNINITIALIZED: &str = "enclave runtime skeleton uninitialized yet!";

static PAL: Mutex<Option<Pal<Isgx>>> = Mutex::new(None);

fn pal() -> MutexGuard<'static, Option<Pal<Isgx>>> {
    PAL.lock().unwrap_or_else(|e| e.into_inner())
}

fn uninitialized(operation: &'static str) -> Error {
    Error::State {
        operation,
        state: State::Uninitialized,
    }
}

/// Borrows a C string, treating NULL as empty
///
/// # Safety
///
/// `ptr` must be NULL or point to a NUL terminated string.
unsafe fn string<'a>(ptr: *const c_char, what: &str) -> Result<&'a str> {
    if ptr.is_null() {
        return Ok("");
    }

    CStr::from_ptr(ptr)
        .to_str()
        .map_err(|e| Error::Config(format!("{} is not valid UTF-8: {}", what, e)))
}

fn errno(result: Result<()>) -> c_int {
    match result {
        Ok(()) => 0,
        Err(e) => {
            error!("{}", e);
            e.errno()
        }
    }
}

fn init(args: &str) -> Result<()> {
    let config = Config::from_args(args)?;

    let mut guard = pal();
    match guard.as_mut() {
        Some(pal) => *pal.config_mut() = config,
        None => {
            let driver = Isgx::open(&config.device)?;
            *guard = Some(Pal::new(config, driver));
        }
    }

    guard
        .as_mut()
        .map_or_else(|| Err(uninitialized("init")), |pal| pal.init())
}

/// Returns the version of the PAL interface
#[no_mangle]
pub extern "C" fn pal_get_version() -> c_int {
    VERSION
}

/// Builds the enclave
///
/// `args` are whitespace separated `Config` flags; `log_level` is an
/// `env_logger` filter.
///
/// # Safety
///
/// Both arguments must be NULL or NUL terminated strings.
#[no_mangle]
pub unsafe extern "C" fn pal_init(args: *const c_char, log_level: *const c_char) -> c_int {
    let result = string(log_level, "log level")
        .map(logger::init)
        .and_then(|()| string(args, "args"))
        .and_then(init);

    errno(result)
}

/// Enters the enclave once
///
/// The outcome is reported on `stderr`, which stays open. `exit_code` is only
/// written on success. The remaining arguments are accepted for
/// compatibility and ignored.
///
/// # Safety
///
/// `exit_code` must be NULL or valid for writes and `stderr` must be an open
/// file descriptor.
#[no_mangle]
pub unsafe extern "C" fn pal_exec(
    _path: *const c_char,
    _argv: *const *const c_char,
    _envp: *const *const c_char,
    exit_code: *mut c_int,
    _stdin: c_int,
    _stdout: c_int,
    stderr: c_int,
) -> c_int {
    if stderr < 0 {
        return -libc::EBADF;
    }

    // The descriptor belongs to the caller.
    let mut diag = ManuallyDrop::new(File::from_raw_fd(stderr));

    exec(&mut *pal(), &mut *diag, exit_code.as_mut())
}

fn exec<D: Driver + Gate>(
    pal: &mut Option<Pal<D>>,
    diag: &mut dyn Write,
    exit_code: Option<&mut c_int>,
) -> c_int {
    let result = match pal.as_mut() {
        Some(pal) => pal.exec(diag),
        None => {
            report(diag, UNINITIALIZED);
            Err(uninitialized("exec"))
        }
    };

    errno(result.map(|code| {
        if let Some(exit_code) = exit_code {
            *exit_code = code;
        }
    }))
}

/// Tears down the enclave runtime
#[no_mangle]
pub extern "C" fn pal_destroy() -> c_int {
    destroy(&mut *pal(), &mut io::stderr())
}

fn destroy<D: Driver + Gate>(pal: &mut Option<Pal<D>>, diag: &mut dyn Write) -> c_int {
    let result = match pal.as_mut() {
        Some(pal) => pal.destroy(),
        None => Err(uninitialized("destroy")),
    };

    if result.is_err() {
        report(diag, "Enclave runtime skeleton uninitialized yet!");
    }

    errno(result)
}
