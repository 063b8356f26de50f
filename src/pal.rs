// SPDX-License-Identifier: Apache-2.0

//! The `init / exec / destroy` lifecycle of the enclave runtime skeleton

use crate::artifact::{self, Image};
use crate::config::Config;
use crate::driver::{Driver, Gate};
use crate::enclave::{entry, Builder, Enclave};
use crate::types::{EinitToken, SigStruct};
use crate::{Error, Result};

use std::fmt;
use std::io::Write;
use std::mem::replace;

use log::{debug, info, warn};

/// The version of the PAL interface implemented here
pub const VERSION: i32 = 1;

/// Where a [`Pal`] is in its lifecycle
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum State {
    /// No enclave has been built yet
    Uninitialized,
    /// An enclave is built and can be entered
    Initialized,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uninitialized => f.write_str("uninitialized"),
            Self::Initialized => f.write_str("initialized"),
        }
    }
}

enum Lifecycle {
    Uninitialized,
    Initialized(Enclave),
}

/// A lifecycle handle owning at most one enclave
pub struct Pal<D> {
    config: Config,
    driver: D,
    lifecycle: Lifecycle,
}

impl<D: Driver + Gate> Pal<D> {
    /// Creates an uninitialized handle
    pub fn new(config: Config, driver: D) -> Self {
        Self {
            config,
            driver,
            lifecycle: Lifecycle::Uninitialized,
        }
    }

    /// The settings this handle was created with
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Changes the settings used by the next `init()`
    ///
    /// The driver stays open; `device` is not looked at again.
    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    /// The driver enclaves are built with
    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// The driver enclaves are built with
    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    /// The current lifecycle state
    pub fn state(&self) -> State {
        match self.lifecycle {
            Lifecycle::Uninitialized => State::Uninitialized,
            Lifecycle::Initialized(..) => State::Initialized,
        }
    }

    /// The enclave, once initialized
    pub fn enclave(&self) -> Option<&Enclave> {
        match &self.lifecycle {
            Lifecycle::Uninitialized => None,
            Lifecycle::Initialized(enclave) => Some(enclave),
        }
    }

    /// Loads the artifacts and builds the enclave
    ///
    /// All three artifacts are loaded before the driver sees a single
    /// request. On failure the handle is left as it was. Initializing an
    /// initialized handle builds a fresh enclave and releases the previous
    /// one only once the new one is ready.
    pub fn init(&mut self) -> Result<()> {
        let image = Image::load(&self.config.image)?;
        let sigstruct: SigStruct = artifact::load(&self.config.sigstruct)?;
        let token: EinitToken = artifact::load(&self.config.token)?;

        let mut builder = Builder::new(&mut self.driver, image.len())?;
        builder.load(&image)?;
        let enclave = builder.build(&sigstruct, &token)?;
        info!(
            "enclave built from {}: {:?}",
            image.path().display(),
            enclave.descriptor().range()
        );

        // The previous enclave is dropped here and its memory unmapped, rather
        // than left mapped behind the new one.
        if let Lifecycle::Initialized(old) =
            replace(&mut self.lifecycle, Lifecycle::Initialized(enclave))
        {
            debug!("releasing previous enclave {:?}", old.descriptor().range());
        }

        Ok(())
    }

    /// Enters the enclave once and checks its answer
    ///
    /// One line describing the outcome is written to `diag`. On success the
    /// exit code of the run is returned.
    pub fn exec(&mut self, diag: &mut dyn Write) -> Result<i32> {
        let enclave = match &self.lifecycle {
            Lifecycle::Initialized(enclave) => enclave,
            Lifecycle::Uninitialized => {
                report(diag, "enclave runtime skeleton uninitialized yet!");
                return Err(Error::State {
                    operation: "exec",
                    state: State::Uninitialized,
                });
            }
        };

        let ecall = self.config.ecall_magic;
        let expected = self.config.init_magic;

        match entry::invoke(&mut self.driver, enclave, ecall, expected) {
            Ok(_) => {
                report(diag, "Enclave runtime skeleton initialization succeeded");
                Ok(0)
            }

            Err(e @ Error::Validation { .. }) => {
                report(diag, &e.to_string());
                Err(e)
            }

            Err(e) => {
                report(diag, "failed to initialize enclave");
                Err(e)
            }
        }
    }

    /// Checks that there is an enclave to tear down
    ///
    /// The enclave itself stays in place until the handle is dropped.
    pub fn destroy(&mut self) -> Result<()> {
        match self.state() {
            State::Initialized => {
                debug!("destroy requested; enclave is released with the handle");
                Ok(())
            }

            state => Err(Error::State {
                operation: "destroy",
                state,
            }),
        }
    }
}

/// Writes one diagnostic line, logging instead of failing if it can't
pub(crate) fn report(diag: &mut dyn Write, line: &str) {
    if let Err(e) = writeln!(diag, "{}", line).and_then(|_| diag.flush()) {
        warn!("failed to write diagnostic {:?}: {}", line, e);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use crate::driver::Memory;

    #[test]
    fn state() {
        assert_eq!(State::Uninitialized.to_string(), "uninitialized");
        assert_eq!(State::Initialized.to_string(), "initialized");
    }

    #[test]
    fn uninitialized() {
        let mut pal = Pal::new(Config::default(), Memory::new());
        assert_eq!(pal.state(), State::Uninitialized);
        assert!(pal.enclave().is_none());

        let mut diag = Vec::new();
        let err = pal.exec(&mut diag).unwrap_err();
        assert_eq!(err.errno(), -1);
        assert_eq!(diag, b"enclave runtime skeleton uninitialized yet!\n");

        assert!(matches!(
            pal.destroy(),
            Err(Error::State {
                operation: "destroy",
                state: State::Uninitialized
            })
        ));

        assert!(pal.driver().calls().is_empty());
    }

    #[test]
    fn missing_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            image: dir.path().join("encl.bin"),
            ..Config::default()
        };

        let mut pal = Pal::new(config, Memory::new());
        assert_eq!(pal.init().unwrap_err().errno(), -libc::ENOENT);
        assert_eq!(pal.state(), State::Uninitialized);
        assert!(pal.driver().calls().is_empty());
    }
}
