// SPDX-License-Identifier: Apache-2.0

//! Logging setup for hosts that load the PAL as a shared object

use log::LevelFilter;

/// Installs an `env_logger` backend writing to stderr
///
/// `filter` uses the `env_logger` filter syntax (`"debug"`,
/// `"skeleton_pal=trace"`, ...). An empty filter only shows errors. If the
/// host already installed a logger, that one is kept.
pub fn init(filter: &str) {
    let mut builder = env_logger::Builder::new();
    builder
        .filter_level(LevelFilter::Error)
        .parse_filters(filter)
        .target(env_logger::Target::Stderr);

    if builder.try_init().is_err() {
        log::debug!("logger already initialized; ignoring filter {:?}", filter);
    }
}
