// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

mod stm32mp1;

use cc::Build;
use std::{error::Error, path::Path};
use stm32mp1::Stm32Mp1Builder;

pub const PLATFORMS: [&str; 1] = [Stm32Mp1Builder::PLAT_NAME];

type BuildResult = Result<(), Box<dyn Error>>;

pub trait Builder {
    /// Base address of the BL2 binary.
    ///
    /// This is passed to the linker script through the `BL2_BASE` symbol.
    fn bl2_base(&self) -> u64;

    /// Size of the BL2 binary.
    ///
    /// This is passed to the linker script through the `BL2_SIZE` symbol.
    fn bl2_size(&self) -> u64;

    /// Adds the platform drivers from the TF-A tree at `tfa_dir` to the build.
    fn configure_build(&self, build: &mut Build, tfa_dir: &Path) -> BuildResult;
}

pub fn get_builder(platform: &str) -> Result<Box<dyn Builder>, Box<dyn Error>> {
    match platform {
        Stm32Mp1Builder::PLAT_NAME => Ok(Box::new(Stm32Mp1Builder)),
        _ => Err(format!(
            "Unexpected platform name {platform:?}. Supported platforms: {PLATFORMS:?}"
        )
        .into()),
    }
}

pub fn add_linker_script(path: &Path) {
    println!("cargo:rustc-link-arg=-T{}", path.display());
    println!("cargo:rerun-if-changed={}", path.display());
}

pub fn define_linker_symbol(name: &str, value: u64) {
    println!("cargo:rustc-link-arg=--defsym={name}={value}");
}
