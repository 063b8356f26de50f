// SPDX-License-Identifier: Apache-2.0

use std::fs;
use std::os::unix::fs::FileTypeExt;
use std::path::Path;

const ISGX_DEVICE: &str = "/dev/isgx";

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed={}", ISGX_DEVICE);
    println!("cargo:rustc-check-cfg=cfg(host_can_test_sgx)");

    if Path::new(ISGX_DEVICE).exists()
        && fs::metadata(ISGX_DEVICE)
            .map(|m| m.file_type().is_char_device())
            .unwrap_or(false)
    {
        println!("cargo:rustc-cfg=host_can_test_sgx");
    }
}
