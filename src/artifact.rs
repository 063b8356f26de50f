// SPDX-License-Identifier: Apache-2.0

//! Loading of the enclave image, its SIGSTRUCT and its EINITTOKEN

use crate::types::{EinitToken, SigStruct};
use crate::{Error, Result};

use std::fs::File;
use std::io::{self, Read};
use std::ops::Deref;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use mmarinus::{perms, Kind, Map};
use primordial::Page;

/// The enclave image, mapped read-only from storage
pub struct Image {
    path: PathBuf,
    map: Map<perms::Read>,
}

impl Image {
    /// Maps the image at `path`
    ///
    /// The image size must be a non-zero multiple of the page size. This is
    /// checked before anything is mapped.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut file = File::open(path).map_err(Error::io(path))?;

        let len = file.metadata().map_err(Error::io(path))?.len();
        let size = usize::try_from(len)
            .ok()
            .filter(|size| *size != 0 && *size % Page::SIZE == 0)
            .ok_or_else(|| {
                Error::io(path)(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("invalid image size {}", len),
                ))
            })?;

        let map = map(&mut file, size).map_err(Error::io(path))?;
        debug!("loaded {}: {} pages", path.display(), size / Page::SIZE);

        Ok(Self {
            path: path.to_owned(),
            map,
        })
    }

    /// Where the image was loaded from
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Deref for Image {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.map
    }
}

impl AsRef<[u8]> for Image {
    fn as_ref(&self) -> &[u8] {
        self
    }
}

fn map(file: &mut File, size: usize) -> io::Result<Map<perms::Read>> {
    Ok(Map::map(size)
        .anywhere()
        .from(file, 0)
        .known::<perms::Read>(Kind::Private)?)
}

/// A fixed-size artifact consumed verbatim by the driver
pub trait Artifact: Default + AsMut<[u8]> {
    /// The exact number of bytes making up the artifact
    const SIZE: usize;
}

impl Artifact for SigStruct {
    const SIZE: usize = SigStruct::SIZE;
}

impl Artifact for EinitToken {
    const SIZE: usize = EinitToken::SIZE;
}

/// Reads a fixed-size artifact from `path`
///
/// Exactly `T::SIZE` bytes must be available; a short read fails the whole
/// load. Anything after the first `T::SIZE` bytes is ignored.
pub fn load<T: Artifact>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    let mut artifact = T::default();

    let mut file = File::open(path).map_err(Error::io(path))?;
    file.read_exact(artifact.as_mut())
        .map_err(Error::io(path))?;

    if file.read(&mut [0u8; 1]).map_err(Error::io(path))? != 0 {
        warn!(
            "{}: ignoring data past the first {} bytes",
            path.display(),
            T::SIZE
        );
    }

    debug!("loaded {}: {} bytes", path.display(), T::SIZE);
    Ok(artifact)
}

#[cfg(test)]
mod test {
    use super::*;

    use std::io::Write;

    use rstest::rstest;
    use tempfile::NamedTempFile;

    fn file(bytes: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(bytes).unwrap();
        file.flush().unwrap();
        file
    }

    #[rstest]
    #[case(1)]
    #[case(2)]
    #[case(5)]
    fn image(#[case] pages: usize) {
        let bytes: Vec<u8> = (0..pages * Page::SIZE).map(|i| (i / Page::SIZE) as u8).collect();
        let tmp = file(&bytes);

        let image = Image::load(tmp.path()).unwrap();
        assert_eq!(image.len(), bytes.len());
        assert_eq!(&image[..], &bytes[..]);
        assert_eq!(image.path(), tmp.path());
    }

    #[rstest]
    #[case(0)]
    #[case(1)]
    #[case(Page::SIZE - 1)]
    #[case(Page::SIZE + 1)]
    #[case(3 * Page::SIZE + 0x800)]
    fn image_bad_size(#[case] len: usize) {
        let tmp = file(&vec![0u8; len]);

        match Image::load(tmp.path()) {
            Err(Error::Io { source, .. }) => assert_eq!(source.kind(), io::ErrorKind::InvalidData),
            _ => panic!("image of {} bytes was accepted", len),
        }
    }

    #[test]
    fn image_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("encl.bin");

        match Image::load(&path) {
            Err(Error::Io { path: p, source }) => {
                assert_eq!(p, path);
                assert_eq!(source.kind(), io::ErrorKind::NotFound);
            }
            _ => panic!("missing image was accepted"),
        }
    }

    #[test]
    fn sigstruct() {
        let mut bytes = vec![0u8; SigStruct::SIZE];
        bytes[960..992].copy_from_slice(&[0x5a; 32]);
        let tmp = file(&bytes);

        let sig: SigStruct = load(tmp.path()).unwrap();
        assert_eq!(sig.enclave_hash(), [0x5a; 32]);
    }

    #[test]
    fn token_with_trailing_data() {
        let mut bytes = vec![0u8; EinitToken::SIZE + 16];
        bytes[0] = 1;
        let tmp = file(&bytes);

        let token: EinitToken = load(tmp.path()).unwrap();
        assert!(token.is_valid());
    }

    #[rstest]
    #[case(0)]
    #[case(1)]
    #[case(SigStruct::SIZE - 1)]
    fn sigstruct_short(#[case] len: usize) {
        let tmp = file(&vec![0u8; len]);

        match load::<SigStruct>(tmp.path()) {
            Err(Error::Io { source, .. }) => {
                assert_eq!(source.kind(), io::ErrorKind::UnexpectedEof)
            }
            _ => panic!("short sigstruct was accepted"),
        }
    }

    #[test]
    fn token_short() {
        let tmp = file(&[0u8; EinitToken::SIZE - 1]);
        assert!(matches!(
            load::<EinitToken>(tmp.path()),
            Err(Error::Io { .. })
        ));
    }
}
