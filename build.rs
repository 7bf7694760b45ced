// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! Build script for RF-A BL2.

mod platforms;

use cc::Build;
use platforms::{Builder, PLATFORMS, add_linker_script, define_linker_symbol, get_builder};
use std::{env, path::PathBuf};

/// Compiles the TF-A drivers BL2 calls into, from the TF-A tree at `TFA_DIR`.
fn build_libtfa(platform_builder: &dyn Builder) {
    println!("cargo:rerun-if-env-changed=TFA_DIR");
    let tfa_dir = PathBuf::from(env::var("TFA_DIR").expect("TFA_DIR must point to a TF-A tree"));

    // SAFETY: The build script is single-threaded.
    unsafe {
        env::set_var("CROSS_COMPILE", "aarch64-none-elf");
        env::set_var("CC", "clang");
    }

    let mut build = Build::new();
    build
        .define("IMAGE_BL2", None)
        .define("BL2_AT_EL3", Some("1"))
        .define("ENABLE_ASSERTIONS", Some("1"))
        .include(tfa_dir.join("include"))
        .include(tfa_dir.join("include/arch/aarch64"))
        .include(tfa_dir.join("include/lib/libc"))
        .include(tfa_dir.join("include/lib/libc/aarch64"))
        .include(tfa_dir.join("include/lib/libfdt"))
        .include(tfa_dir.join("lib/libfdt"));

    if env::var("CARGO_FEATURE_OPTEE").as_deref() == Ok("1") {
        build.define("AARCH32_SP_OPTEE", Some("1"));
    }
    if let Ok(debug) = env::var("DEBUG") {
        build.define("DEBUG", debug.as_str());
    }

    platform_builder
        .configure_build(&mut build, &tfa_dir)
        .unwrap();

    build.compile("tfa");
}

fn setup_linker(builder: &dyn Builder) {
    define_linker_symbol("BL2_BASE", builder.bl2_base());
    define_linker_symbol("BL2_SIZE", builder.bl2_size());
    add_linker_script(&PathBuf::from("bl2.ld"));
}

fn main() {
    println!(
        "cargo::rustc-check-cfg=cfg(platform, values(\"{}\"))",
        PLATFORMS.join("\", \""),
    );

    if env::var("CARGO_CFG_TARGET_OS").unwrap() == "none" {
        let platform = env::var("CARGO_CFG_PLATFORM").expect("Missing platform name");

        let platform_builder = get_builder(&platform).unwrap();

        build_libtfa(&*platform_builder);

        setup_linker(&*platform_builder);
    }
}
