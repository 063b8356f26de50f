// SPDX-License-Identifier: Apache-2.0

//! Where the enclave artifacts live and what the enclave is expected to say
//!
//! Every setting can be given as a flag, through the environment or left at
//! its default, which points at the conventional file names in the current
//! directory.

use crate::driver::ISGX_DEVICE_PATH;
use crate::enclave::entry::{ECALL_MAGIC, INIT_MAGIC};
use crate::{Error, Result};

use std::num::ParseIntError;
use std::path::PathBuf;

use clap::{Args, Parser};

/// Enclave artifact and entry settings
#[derive(Args, Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// Path of the enclave image
    #[clap(long, env = "SKELETON_PAL_IMAGE", default_value = "encl.bin")]
    pub image: PathBuf,

    /// Path of the enclave SIGSTRUCT
    #[clap(long, env = "SKELETON_PAL_SIGSTRUCT", default_value = "encl.ss")]
    pub sigstruct: PathBuf,

    /// Path of the launch token
    #[clap(long, env = "SKELETON_PAL_TOKEN", default_value = "encl.token")]
    pub token: PathBuf,

    /// Path of the SGX driver device
    #[clap(long, env = "SKELETON_PAL_DEVICE", default_value = ISGX_DEVICE_PATH)]
    pub device: PathBuf,

    /// Value passed into the enclave on entry
    #[clap(long, env = "SKELETON_PAL_ECALL_MAGIC", default_value = "0x0", parse(try_from_str = parse_magic))]
    pub ecall_magic: u64,

    /// Value the enclave must hand back
    #[clap(long, env = "SKELETON_PAL_INIT_MAGIC", default_value = "0xcafef00ddeadbeef", parse(try_from_str = parse_magic))]
    pub init_magic: u64,
}

#[derive(Parser, Debug)]
#[clap(no_binary_name = true)]
struct InitArgs {
    #[clap(flatten)]
    config: Config,
}

impl Config {
    /// Parses the argument string handed to `pal_init`
    ///
    /// Arguments are separated by whitespace; an empty string selects the
    /// defaults.
    pub fn from_args(args: &str) -> Result<Self> {
        InitArgs::try_parse_from(args.split_whitespace())
            .map(|a| a.config)
            .map_err(|e| Error::Config(e.to_string()))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            image: "encl.bin".into(),
            sigstruct: "encl.ss".into(),
            token: "encl.token".into(),
            device: ISGX_DEVICE_PATH.into(),
            ecall_magic: ECALL_MAGIC,
            init_magic: INIT_MAGIC,
        }
    }
}

/// Parses a hexadecimal (`0x` prefixed) or decimal number
fn parse_magic(s: &str) -> std::result::Result<u64, ParseIntError> {
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(&hex.replace('_', ""), 16),
        None => s.parse(),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use rstest::rstest;

    #[rstest]
    #[case("0", 0)]
    #[case("42", 42)]
    #[case("0x2a", 42)]
    #[case("0XCAFE", 0xcafe)]
    #[case("0xcafe_f00d_dead_beef", INIT_MAGIC)]
    fn magic(#[case] s: &str, #[case] value: u64) {
        assert_eq!(parse_magic(s).unwrap(), value);
    }

    #[rstest]
    #[case("")]
    #[case("0x")]
    #[case("beef")]
    #[case("-1")]
    fn bad_magic(#[case] s: &str) {
        assert!(parse_magic(s).is_err());
    }

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.ecall_magic, ECALL_MAGIC);
        assert_eq!(config.init_magic, INIT_MAGIC);
        assert_eq!(config.device, PathBuf::from("/dev/isgx"));
    }

    #[test]
    fn from_args() {
        let config =
            Config::from_args("--image /tmp/a.bin  --token /tmp/a.token\t--init-magic 0x1").unwrap();

        assert_eq!(config.image, PathBuf::from("/tmp/a.bin"));
        assert_eq!(config.token, PathBuf::from("/tmp/a.token"));
        assert_eq!(config.init_magic, 1);
    }

    #[test]
    fn from_bad_args() {
        assert!(matches!(
            Config::from_args("--no-such-flag"),
            Err(Error::Config(..))
        ));
        assert!(matches!(
            Config::from_args("--ecall-magic nope"),
            Err(Error::Config(..))
        ));
    }
}
