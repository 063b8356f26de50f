// SPDX-License-Identifier: Apache-2.0

//! IOCTLs of the out-of-tree `isgx` driver, implemented with the iocuddle crate
//!
//! Unlike the upstream driver, `isgx` takes absolute enclave addresses, adds
//! a single page per request and expects the EINITTOKEN from user space.

use std::marker::PhantomData;

use iocuddle::*;

use crate::enclave::page::PageRecord;
use crate::types::{EinitToken, SecInfo, Secs, SigStruct};

const SGX: Group = Group::new(0xA4);

/// IOCTL identifier for ECREATE
pub const ENCLAVE_CREATE: Ioctl<Write, &Create<'_>> = unsafe { SGX.write(0x00) };

/// IOCTL identifier for EADD
pub const ENCLAVE_ADD_PAGE: Ioctl<Write, &AddPage<'_>> = unsafe { SGX.write(0x01) };

/// IOCTL identifier for EINIT
pub const ENCLAVE_INIT: Ioctl<Write, &Init<'_>> = unsafe { SGX.write(0x02) };

#[repr(C)]
#[derive(Debug)]
/// Struct for creating a new enclave from SECS
pub struct Create<'a>(u64, PhantomData<&'a ()>);

impl<'a> Create<'a> {
    /// A new Create struct wraps an SECS struct.
    pub fn new(secs: &'a Secs) -> Self {
        Create(secs as *const _ as _, PhantomData)
    }
}

#[repr(C, packed)]
#[derive(Debug)]
/// Struct for adding a single page to an enclave
pub struct AddPage<'a> {
    addr: u64,
    src: u64,
    secinfo: u64,
    mrmask: u16,
    phantom: PhantomData<&'a ()>,
}

impl<'a> AddPage<'a> {
    /// Creates a new AddPage struct from a page submission
    pub fn new(page: &PageRecord<'a>, secinfo: &'a SecInfo) -> Self {
        Self {
            addr: page.addr as _,
            src: page.src.as_ptr() as _,
            secinfo: secinfo as *const _ as _,
            mrmask: page.mrmask,
            phantom: PhantomData,
        }
    }
}

#[repr(C, packed)]
#[derive(Debug)]
/// Struct for initializing an enclave
pub struct Init<'a> {
    addr: u64,
    sigstruct: u64,
    einittoken: u64,
    phantom: PhantomData<&'a ()>,
}

impl<'a> Init<'a> {
    /// A new Init struct wraps the SIGSTRUCT and EINITTOKEN of the enclave at `addr`.
    pub fn new(addr: usize, sigstruct: &'a SigStruct, einittoken: &'a EinitToken) -> Self {
        Self {
            addr: addr as _,
            sigstruct: sigstruct as *const _ as _,
            einittoken: einittoken as *const _ as _,
            phantom: PhantomData,
        }
    }
}
