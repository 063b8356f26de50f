// SPDX-License-Identifier: Apache-2.0

use core::fmt;

use bitflags::bitflags;

bitflags! {
    /// Enclave attributes (Section 38.7.1)
    pub struct Attributes: u64 {
        /// The enclave has been initialized by EINIT
        const INIT = 1 << 0;
        /// The enclave permits debugger access
        const DEBUG = 1 << 1;
        /// The enclave runs in 64-bit mode
        const MODE64BIT = 1 << 2;
        /// The enclave has access to the provisioning key
        const PROVISIONKEY = 1 << 4;
        /// The enclave has access to the EINIT token key
        const EINITTOKENKEY = 1 << 5;
        /// The enclave uses key separation and sharing
        const KSS = 1 << 7;
    }
}

/// The SGX Enclave Control Structure
///
/// This structure defines the address range and global attributes of an
/// enclave. It is handed to the driver, which copies it into the first EPC
/// page of the enclave by means of ECREATE.
///
/// Section 38.7
#[repr(C, align(4096))]
pub struct Secs {
    size: u64,
    base: u64,
    ssa_frame_size: u32,
    miscselect: u32,
    reserved1: [u8; 24],
    attributes: u64,
    xfrm: u64,
    mrenclave: [u8; 32],
    reserved2: [u8; 32],
    mrsigner: [u8; 32],
    reserved3: [u8; 32],
    config_id: [u8; 64],
    isv_prod_id: u16,
    isv_svn: u16,
    config_svn: u16,
    reserved4: [u8; 3834],
}

impl Secs {
    /// Creates a new SECS for an enclave at `base` spanning `size` bytes
    ///
    /// Every field not named here (measurements, identities, reserved
    /// areas) is zero; the hardware fills them in.
    pub fn new(base: u64, size: u64, ssa_frame_size: u32, attributes: Attributes, xfrm: u64) -> Self {
        Self {
            size,
            base,
            ssa_frame_size,
            miscselect: 0,
            reserved1: [0; 24],
            attributes: attributes.bits(),
            xfrm,
            mrenclave: [0; 32],
            reserved2: [0; 32],
            mrsigner: [0; 32],
            reserved3: [0; 32],
            config_id: [0; 64],
            isv_prod_id: 0,
            isv_svn: 0,
            config_svn: 0,
            reserved4: [0; 3834],
        }
    }

    /// The enclave base address
    pub fn base(&self) -> u64 {
        self.base
    }

    /// The enclave size in bytes
    pub fn size(&self) -> u64 {
        self.size
    }

    /// The number of pages in a single SSA frame
    pub fn ssa_frame_size(&self) -> u32 {
        self.ssa_frame_size
    }

    /// The requested enclave attributes
    pub fn attributes(&self) -> Attributes {
        Attributes::from_bits_truncate(self.attributes)
    }

    /// The requested extended feature mask
    pub fn xfrm(&self) -> u64 {
        self.xfrm
    }
}

impl fmt::Debug for Secs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secs")
            .field("base", &format_args!("{:#x}", self.base))
            .field("size", &format_args!("{:#x}", self.size))
            .field("ssa_frame_size", &self.ssa_frame_size)
            .field("attributes", &self.attributes())
            .field("xfrm", &format_args!("{:#x}", self.xfrm))
            .finish()
    }
}
