// SPDX-License-Identifier: Apache-2.0

use skeleton_pal::config::Config;
use skeleton_pal::driver::Isgx;
use skeleton_pal::pal::Pal;

use std::io;

use anyhow::Context;
use clap::Args;

/// Build the enclave, enter it once and tear it down again.
#[derive(Args, Debug)]
pub struct Options {
    #[clap(flatten)]
    pub config: Config,
}

impl Options {
    pub fn execute(self) -> anyhow::Result<()> {
        let driver = Isgx::open(&self.config.device)
            .with_context(|| format!("failed to open {}", self.config.device.display()))?;

        let mut pal = Pal::new(self.config, driver);
        pal.init().context("failed to initialize enclave")?;

        let code = pal
            .exec(&mut io::stderr())
            .context("failed to execute enclave")?;
        pal.destroy().context("failed to destroy enclave")?;

        println!("{}", code);
        Ok(())
    }
}
