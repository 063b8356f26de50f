// SPDX-License-Identifier: Apache-2.0

use skeleton_pal::artifact::Image;
use skeleton_pal::enclave::page::Pages;
use skeleton_pal::enclave::Descriptor;
use skeleton_pal::measure::Measurement;
use skeleton_pal::region::AlignedRange;

use std::path::PathBuf;

use anyhow::{anyhow, Context};
use clap::Args;

/// Print the MRENCLAVE an image is loaded with.
#[derive(Args, Debug)]
pub struct Options {
    /// Path of the enclave image
    #[clap(long, env = "SKELETON_PAL_IMAGE", default_value = "encl.bin")]
    pub image: PathBuf,
}

impl Options {
    pub fn execute(self) -> anyhow::Result<()> {
        let image = Image::load(&self.image).context("failed to load image")?;
        let mrenclave = measure(&image)?;

        let hex: String = mrenclave.iter().map(|b| format!("{:02x}", b)).collect();
        println!("{}", hex);
        Ok(())
    }
}

/// The measurement is independent of where the enclave ends up, so any
/// aligned base will do.
fn measure(image: &[u8]) -> anyhow::Result<[u8; 32]> {
    let size = AlignedRange::size_for(image.len()).ok_or_else(|| anyhow!("image too large"))?;
    let range = AlignedRange::new(0, size).ok_or_else(|| anyhow!("image too large"))?;
    let pages = Pages::new(range, image).ok_or_else(|| anyhow!("invalid image size"))?;

    let mut measurement = Measurement::new(size, Descriptor::SSA_FRAME_SIZE);
    for page in pages {
        measurement.add(page.index.offset(), &page);
    }

    Ok(measurement.finish())
}
