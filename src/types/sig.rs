// SPDX-License-Identifier: Apache-2.0

use core::fmt;
use core::ops::Range;

/// The enclave signature structure (SIGSTRUCT, Section 38.13)
///
/// This is produced by the signing toolchain and passed verbatim to EINIT.
/// Nothing in this crate validates its contents.
#[repr(C)]
#[derive(Clone)]
pub struct SigStruct([u8; 1808]);

impl SigStruct {
    /// The size of the structure in bytes
    pub const SIZE: usize = 1808;

    const ENCLAVEHASH: Range<usize> = 960..992;

    /// Wraps raw SIGSTRUCT bytes
    pub const fn new(bytes: [u8; Self::SIZE]) -> Self {
        Self(bytes)
    }

    /// The MRENCLAVE value the signer vouches for
    pub fn enclave_hash(&self) -> [u8; 32] {
        let mut hash = [0; 32];
        hash.copy_from_slice(&self.0[Self::ENCLAVEHASH]);
        hash
    }

    /// Sets the MRENCLAVE value the signer vouches for
    pub fn set_enclave_hash(&mut self, hash: [u8; 32]) {
        self.0[Self::ENCLAVEHASH].copy_from_slice(&hash);
    }
}

impl Default for SigStruct {
    fn default() -> Self {
        Self([0; Self::SIZE])
    }
}

impl AsRef<[u8]> for SigStruct {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl AsMut<[u8]> for SigStruct {
    fn as_mut(&mut self) -> &mut [u8] {
        &mut self.0
    }
}

impl fmt::Debug for SigStruct {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigStruct")
            .field("enclave_hash", &Hex(&self.enclave_hash()))
            .finish()
    }
}

/// The launch token (EINITTOKEN, Section 38.14)
///
/// Issued by the launch enclave and passed verbatim to EINIT.
#[repr(C)]
#[derive(Clone)]
pub struct EinitToken([u8; 304]);

impl EinitToken {
    /// The size of the structure in bytes
    pub const SIZE: usize = 304;

    const VALID: Range<usize> = 0..4;
    const MRENCLAVE: Range<usize> = 64..96;

    /// Wraps raw EINITTOKEN bytes
    pub const fn new(bytes: [u8; Self::SIZE]) -> Self {
        Self(bytes)
    }

    /// Whether the token has its `VALID` bit set
    pub fn is_valid(&self) -> bool {
        let mut valid = [0; 4];
        valid.copy_from_slice(&self.0[Self::VALID]);
        u32::from_le_bytes(valid) & 1 == 1
    }

    /// The MRENCLAVE value the token was issued for
    pub fn mrenclave(&self) -> [u8; 32] {
        let mut hash = [0; 32];
        hash.copy_from_slice(&self.0[Self::MRENCLAVE]);
        hash
    }

    /// Sets the `VALID` bit and the MRENCLAVE value the token is issued for
    pub fn issue(&mut self, mrenclave: [u8; 32]) {
        self.0[Self::VALID].copy_from_slice(&1u32.to_le_bytes());
        self.0[Self::MRENCLAVE].copy_from_slice(&mrenclave);
    }
}

impl Default for EinitToken {
    fn default() -> Self {
        Self([0; Self::SIZE])
    }
}

impl AsRef<[u8]> for EinitToken {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl AsMut<[u8]> for EinitToken {
    fn as_mut(&mut self) -> &mut [u8] {
        &mut self.0
    }
}

impl fmt::Debug for EinitToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EinitToken")
            .field("valid", &self.is_valid())
            .field("mrenclave", &Hex(&self.mrenclave()))
            .finish()
    }
}

struct Hex<'a>(&'a [u8]);

impl fmt::Debug for Hex<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.0 {
            write!(f, "{:02x}", b)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use core::mem::size_of;

    #[test]
    fn sizes() {
        assert_eq!(size_of::<SigStruct>(), 1808);
        assert_eq!(size_of::<EinitToken>(), 304);
    }

    #[test]
    fn enclave_hash() {
        let mut sig = SigStruct::default();
        sig.set_enclave_hash([0xab; 32]);

        assert_eq!(sig.enclave_hash(), [0xab; 32]);
        assert_eq!(sig.as_ref()[959], 0);
        assert_eq!(sig.as_ref()[960], 0xab);
        assert_eq!(sig.as_ref()[991], 0xab);
        assert_eq!(sig.as_ref()[992], 0);
    }

    #[test]
    fn token() {
        let mut token = EinitToken::default();
        assert!(!token.is_valid());

        token.issue([7; 32]);
        assert!(token.is_valid());
        assert_eq!(token.mrenclave(), [7; 32]);
        assert_eq!(&token.as_ref()[..4], &[1, 0, 0, 0]);
    }
}
