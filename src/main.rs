// SPDX-License-Identifier: Apache-2.0

#![doc = include_str!("../README.md")]
#![deny(clippy::all)]
#![warn(rust_2018_idioms)]

mod cli;

use clap::Parser;

fn main() -> anyhow::Result<()> {
    let app = cli::Options::parse();
    app.execute()
}
