// SPDX-License-Identifier: Apache-2.0

use core::fmt;

use bitflags::bitflags;

bitflags! {
    /// Access permissions and status bits of an enclave page (Section 38.11.1)
    pub struct Flags: u64 {
        /// Read access
        const READ = 1 << 0;
        /// Write access
        const WRITE = 1 << 1;
        /// Execute access
        const EXECUTE = 1 << 2;
        /// Page is pending acceptance
        const PENDING = 1 << 3;
        /// Page has been modified
        const MODIFIED = 1 << 4;
        /// Permission restriction is in progress
        const PR = 1 << 5;
    }
}

/// The page class (`PAGE_TYPE`) stored in bits 8..16 of the SECINFO flags
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Class {
    /// SGX Enclave Control Structure
    Secs = 0,
    /// Thread Control Structure
    Tcs = 1,
    /// Regular page
    Reg = 2,
    /// Version Array
    Va = 3,
    /// Trimmed page
    Trim = 4,
}

impl Class {
    fn from_bits(bits: u8) -> Option<Self> {
        Some(match bits {
            0 => Self::Secs,
            1 => Self::Tcs,
            2 => Self::Reg,
            3 => Self::Va,
            4 => Self::Trim,
            _ => return None,
        })
    }
}

/// Security information for a page being added to an enclave
///
/// The hardware reads the first 48 bytes of this structure during EADD and
/// folds them into the enclave measurement.
#[repr(C, align(64))]
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct SecInfo {
    flags: u64,
    reserved: [u64; 7],
}

impl SecInfo {
    const CLASS_SHIFT: u64 = 8;

    const fn new(class: Class, flags: Flags) -> Self {
        Self {
            flags: flags.bits() | (class as u64) << Self::CLASS_SHIFT,
            reserved: [0; 7],
        }
    }

    /// Security information for a TCS page
    ///
    /// TCS pages carry no permissions of their own.
    pub const fn tcs() -> Self {
        Self::new(Class::Tcs, Flags::empty())
    }

    /// Security information for a regular page
    pub const fn reg(flags: Flags) -> Self {
        Self::new(Class::Reg, flags)
    }

    /// The page class
    pub fn class(&self) -> Option<Class> {
        Class::from_bits((self.flags >> Self::CLASS_SHIFT) as u8)
    }

    /// The page permissions
    pub fn flags(&self) -> Flags {
        Flags::from_bits_truncate(self.flags)
    }

    /// The raw bytes of the structure
    pub fn as_bytes(&self) -> &[u8] {
        // SAFETY: `SecInfo` is `repr(C)` plain data without padding.
        unsafe {
            core::slice::from_raw_parts(
                self as *const Self as *const u8,
                core::mem::size_of::<Self>(),
            )
        }
    }
}

impl fmt::Debug for SecInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecInfo")
            .field("class", &self.class())
            .field("flags", &self.flags())
            .finish()
    }
}

impl fmt::Display for SecInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let letter = |b, c| if b { c } else { '-' };
        let flags = self.flags();

        let class = match self.class() {
            Some(Class::Tcs) => 't',
            Some(Class::Reg) => 'r',
            _ => '?',
        };

        write!(
            f,
            "{}:{}{}{}",
            class,
            letter(flags.contains(Flags::READ), 'r'),
            letter(flags.contains(Flags::WRITE), 'w'),
            letter(flags.contains(Flags::EXECUTE), 'x'),
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use testaso::testaso;

    testaso! {
        struct SecInfo: 64, 64 => {
            flags: 0,
            reserved: 8
        }
    }

    #[test]
    fn tcs() {
        let si = SecInfo::tcs();
        assert_eq!(si.class(), Some(Class::Tcs));
        assert_eq!(si.flags(), Flags::empty());
        assert_eq!(&si.as_bytes()[..8], &0x100u64.to_le_bytes());
        assert_eq!(si.to_string(), "t:---");
    }

    #[test]
    fn reg() {
        let si = SecInfo::reg(Flags::READ | Flags::WRITE | Flags::EXECUTE);
        assert_eq!(si.class(), Some(Class::Reg));
        assert_eq!(si.flags(), Flags::READ | Flags::WRITE | Flags::EXECUTE);
        assert_eq!(&si.as_bytes()[..8], &0x207u64.to_le_bytes());
        assert!(si.as_bytes()[8..].iter().all(|b| *b == 0));
        assert_eq!(si.to_string(), "r:rwx");
    }
}
