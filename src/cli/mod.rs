// SPDX-License-Identifier: Apache-2.0

mod log;
mod measure;
mod run;

use self::log::LogOptions;

use ::log::info;
use clap::{Parser, Subcommand};

/// Build and launch an SGX enclave through the isgx driver
///
/// The enclave is built from an image, its SIGSTRUCT and a launch token,
/// entered once and expected to answer with a fixed value.
#[derive(Parser, Debug)]
#[clap(version)]
pub struct Options {
    /// Logging options
    #[clap(flatten)]
    logger: LogOptions,

    /// Subcommands (with their own options)
    #[clap(subcommand)]
    cmd: Subcommands,
}

impl Options {
    pub fn execute(self) -> anyhow::Result<()> {
        self.logger.init();

        info!("logging initialized!");
        info!("CLI opts: {:?}", self);

        self.cmd.dispatch()
    }
}

/// `skeleton-pal` subcommands and their options/arguments.
#[derive(Subcommand, Debug)]
enum Subcommands {
    Run(run::Options),
    Measure(measure::Options),
}

impl Subcommands {
    fn dispatch(self) -> anyhow::Result<()> {
        match self {
            Self::Run(cmd) => cmd.execute(),
            Self::Measure(cmd) => cmd.execute(),
        }
    }
}
