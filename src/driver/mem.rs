// SPDX-License-Identifier: Apache-2.0

//! A driver that keeps enclaves in process memory
//!
//! Nothing is executed: the pages are copied aside, the measurement is
//! computed in software and entering an initialized enclave produces a
//! canned answer. The sequencing rules of the real driver are enforced so
//! that misuse fails the same way it would on hardware.

use super::{Driver, Gate};
use crate::enclave::entry::{ECALL_MAGIC, INIT_MAGIC};
use crate::enclave::page::{PageIndex, PageRecord};
use crate::enclave::Transfer;
use crate::measure::Measurement;
use crate::types::{Attributes, Class, EinitToken, Flags, Secs, SigStruct};

use std::collections::BTreeMap;
use std::io::{self, ErrorKind};

use log::trace;
use primordial::Page;

/// ERESUME, the leaf an asynchronous exit leaves behind
const ERESUME: u64 = 3;

/// A request received by a [`Memory`] driver
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    /// ECREATE
    Create {
        /// Enclave base address
        base: usize,
        /// Enclave size in bytes
        size: usize,
        /// Pages per SSA frame
        ssa_frame_size: u32,
        /// Enclave attributes
        attributes: Attributes,
        /// Extended feature mask
        xfrm: u64,
    },

    /// EADD
    AddPage {
        /// Destination address
        addr: usize,
        /// Page class
        class: Option<Class>,
        /// Page permissions
        flags: Flags,
        /// Measured chunks
        mrmask: u16,
    },

    /// EINIT
    Init {
        /// Enclave base address
        base: usize,
    },

    /// EENTER
    Enter {
        /// TCS address
        tcs: usize,
        /// Argument passed in
        arg: u64,
    },
}

/// A request a [`Memory`] driver is told to reject
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Fail {
    /// Reject every ECREATE
    Create,
    /// Reject EADD of the page at this position
    AddPage(PageIndex),
    /// Reject every EINIT
    Init,
}

struct Shadow {
    size: usize,
    pages: BTreeMap<usize, Vec<u8>>,
    measurement: Measurement,
    mrenclave: Option<[u8; 32]>,
}

impl Shadow {
    fn initialized(&self) -> bool {
        self.mrenclave.is_some()
    }
}

/// An in-process SGX driver
#[derive(Default)]
pub struct Memory {
    calls: Vec<Call>,
    fail: Option<Fail>,
    answer: Option<u64>,
    interrupted: bool,
    enclaves: BTreeMap<usize, Shadow>,
}

fn invalid(msg: &str) -> io::Error {
    io::Error::new(ErrorKind::InvalidInput, msg)
}

impl Memory {
    /// A driver that accepts every well formed request
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects the given request
    pub fn fail(mut self, fail: Fail) -> Self {
        self.inject(Some(fail));
        self
    }

    /// Makes every entered enclave answer `value`
    pub fn returning(mut self, value: u64) -> Self {
        self.answer = Some(value);
        self
    }

    /// Makes every entry end in an asynchronous exit
    pub fn interrupted(mut self) -> Self {
        self.interrupted = true;
        self
    }

    /// Changes the rejected request of an existing driver
    pub fn inject(&mut self, fail: Option<Fail>) {
        self.fail = fail;
    }

    /// Every request received so far, in order
    pub fn calls(&self) -> &[Call] {
        &self.calls
    }

    /// The contents of the enclave page at `addr`
    pub fn page(&self, addr: usize) -> Option<&[u8]> {
        let (base, shadow) = self.enclaves.range(..=addr).next_back()?;
        shadow.pages.get(&(addr - base)).map(Vec::as_slice)
    }

    /// The measurement the enclave at `base` was initialized with
    pub fn mrenclave(&self, base: usize) -> Option<[u8; 32]> {
        self.enclaves.get(&base)?.mrenclave
    }

    fn rejects(&self, fail: Fail) -> io::Result<()> {
        match self.fail {
            Some(f) if f == fail => Err(io::Error::from_raw_os_error(libc::EIO)),
            _ => Ok(()),
        }
    }
}

impl Driver for Memory {
    fn create(&mut self, secs: &Secs) -> io::Result<()> {
        let base = secs.base() as usize;
        let size = secs.size() as usize;

        self.calls.push(Call::Create {
            base,
            size,
            ssa_frame_size: secs.ssa_frame_size(),
            attributes: secs.attributes(),
            xfrm: secs.xfrm(),
        });
        self.rejects(Fail::Create)?;

        if !size.is_power_of_two() || size < Page::SIZE || base % size != 0 {
            return Err(invalid("enclave range is not naturally aligned"));
        }

        if secs.ssa_frame_size() == 0 {
            return Err(invalid("SSA frame size is zero"));
        }

        trace!("shadow enclave at {:016x} ({} bytes)", base, size);
        let shadow = Shadow {
            size,
            pages: BTreeMap::new(),
            measurement: Measurement::new(size, secs.ssa_frame_size()),
            mrenclave: None,
        };

        // Enclaves overlapping the new one have been unmapped.
        self.enclaves
            .retain(|b, s| b + s.size <= base || base + size <= *b);
        self.enclaves.insert(base, shadow);
        Ok(())
    }

    fn add_page(&mut self, page: &PageRecord<'_>) -> io::Result<()> {
        self.calls.push(Call::AddPage {
            addr: page.addr,
            class: page.secinfo.class(),
            flags: page.secinfo.flags(),
            mrmask: page.mrmask,
        });
        self.rejects(Fail::AddPage(page.index))?;

        if page.addr % Page::SIZE != 0 || page.src.len() != Page::SIZE {
            return Err(invalid("page is not page sized and aligned"));
        }

        let (base, shadow) = self
            .enclaves
            .range_mut(..=page.addr)
            .next_back()
            .ok_or_else(|| invalid("no enclave at page address"))?;

        let offset = page.addr - base;
        if offset >= shadow.size {
            return Err(invalid("page outside of the enclave"));
        }

        if shadow.initialized() {
            return Err(io::Error::from_raw_os_error(libc::EBUSY));
        }

        if shadow.pages.contains_key(&offset) {
            return Err(io::Error::from_raw_os_error(libc::EEXIST));
        }

        shadow.measurement.add(offset, page);
        shadow.pages.insert(offset, page.src.to_vec());
        Ok(())
    }

    fn init(&mut self, base: usize, sigstruct: &SigStruct, token: &EinitToken) -> io::Result<()> {
        self.calls.push(Call::Init { base });
        self.rejects(Fail::Init)?;

        let shadow = self
            .enclaves
            .get_mut(&base)
            .ok_or_else(|| invalid("no enclave at base address"))?;

        if shadow.initialized() {
            return Err(io::Error::from_raw_os_error(libc::EBUSY));
        }

        let mrenclave = shadow.measurement.clone().finish();
        if sigstruct.enclave_hash() != mrenclave {
            return Err(io::Error::new(
                ErrorKind::PermissionDenied,
                "SIGSTRUCT does not match the enclave measurement",
            ));
        }

        if !token.is_valid() || token.mrenclave() != mrenclave {
            return Err(io::Error::new(
                ErrorKind::PermissionDenied,
                "EINITTOKEN was not issued for this enclave",
            ));
        }

        shadow.mrenclave = Some(mrenclave);
        Ok(())
    }
}

impl Gate for Memory {
    fn enter(&mut self, tcs: usize, arg: u64) -> Result<u64, Transfer> {
        self.calls.push(Call::Enter { tcs, arg });

        let ready = self
            .enclaves
            .get(&tcs)
            .map(Shadow::initialized)
            .unwrap_or(false);

        if !ready || self.interrupted {
            return Err(Transfer::Interrupted { leaf: ERESUME });
        }

        Ok(match (self.answer, arg) {
            (Some(value), _) => value,
            (None, ECALL_MAGIC) => INIT_MAGIC,
            (None, _) => 0,
        })
    }
}
