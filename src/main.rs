// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! RF-A BL2 for STM32MP1: brings up the SoC from the boot ROM, loads the secure and non-secure
//! payloads and jumps to the secure one.

#![cfg_attr(not(test), no_main)]
#![cfg_attr(not(test), no_std)]

mod boot_context;
mod config;
mod debug;
mod device_tree;
mod error;
mod image;
mod image_load;
#[cfg_attr(test, path = "layout_fake.rs")]
mod layout;
mod logger;
mod mmio;
mod optee;
mod pagetable;
mod platform;
mod registers;
mod reset_reason;
mod setup;

use crate::{
    config::Bl2Config,
    error::Fatal,
    image::EntryPointInfo,
    platform::Platform,
    setup::Bl2Setup,
};

/// Runs every bring-up phase on `platform`, and returns the entry point of the next image.
fn run<P: Platform>(platform: P, config: Bl2Config, arg0: u64) -> Result<EntryPointInfo, Fatal> {
    let mut setup = Bl2Setup::new(platform, config);
    setup.early_platform_setup(arg0)?;
    setup.platform_setup()?;
    setup.arch_setup()?;
    setup.load_images()
}

#[cfg(not(test))]
extern "C" fn bl2_main(arg0: u64, arg1: u64, arg2: u64, arg3: u64) -> ! {
    use crate::platform::PlatformImpl;
    use log::info;

    logger::init(PlatformImpl::log_sink()).expect("Failed to initialise logger");
    info!("Rust BL2 starting");
    info!("Parameters: {arg0:#0x} {arg1:#0x} {arg2:#0x} {arg3:#0x}");

    // SAFETY: This is the only place the platform is created, and BL2 runs at EL3.
    let platform = unsafe { PlatformImpl::new() };
    match run(platform, Bl2Config::BUILD, arg0) {
        Ok(next) => {
            info!("BL2: Booting BL32 at {:#x}", next.pc);
            // SAFETY: The next image has been loaded to `next.pc` and nothing in BL2 is used
            // after this.
            unsafe { asm::run_next_image(&next) }
        }
        Err(fatal) => halt(fatal),
    }
}

/// Stops the boot after an unrecoverable error.
#[cfg(not(test))]
fn halt(fatal: Fatal) -> ! {
    log::error!("{fatal}");
    panic!("BL2 halted: {fatal}");
}

#[cfg(all(target_arch = "aarch64", not(test)))]
mod asm {
    use super::*;
    use crate::image::ExecutionState;
    use arm_sysregs::{ScrEl3, SctlrEl3, Spsr};

    /// The number of bytes of stack space reserved for BL2.
    const STACK_SIZE: usize = 0x2000;

    /// AArch32 supervisor mode, in `SPSR.M[3:0]`.
    const MODE32_SVC: u8 = 0b0011;

    #[repr(C, align(16))]
    struct Stack([u8; STACK_SIZE]);

    #[unsafe(link_section = ".stack")]
    static mut BL2_STACK: Stack = Stack([0; STACK_SIZE]);

    /// The entrypoint, jumped to by the boot ROM with the address of its boot context in `x0`.
    #[unsafe(naked)]
    #[unsafe(no_mangle)]
    #[unsafe(link_section = ".text.entrypoint")]
    unsafe extern "C" fn bl2_entrypoint() -> ! {
        naked_asm!(
            "mov	x20, x0
            mov	x21, x1
            mov	x22, x2
            mov	x23, x3

            mrs	x0, sctlr_el3
            ldr	x1, ={SCTLR_SET}
            orr	x0, x0, x1
            msr	sctlr_el3, x0
            isb

            adrp	x0, __BSS_START__
            add	x0, x0, :lo12:__BSS_START__
            adrp	x1, __BSS_END__
            add	x1, x1, :lo12:__BSS_END__
        1:
            cmp	x0, x1
            b.hs	2f
            str	xzr, [x0], #8
            b	1b
        2:
            adrp	x0, {stack}
            add	x0, x0, :lo12:{stack}
            add	sp, x0, #{STACK_SIZE}

            mov	x0, x20
            mov	x1, x21
            mov	x2, x22
            mov	x3, x23
            bl	{bl2_main}
            b	.",
            SCTLR_SET = const (SctlrEl3::I | SctlrEl3::SA).bits(),
            stack = sym BL2_STACK,
            STACK_SIZE = const STACK_SIZE,
            bl2_main = sym bl2_main,
        );
    }

    /// Returns the `SPSR_EL3` and `SCR_EL3` values to enter an image in `state` with.
    fn entry_state(state: ExecutionState) -> (Spsr, ScrEl3) {
        let masked = Spsr::A | Spsr::I | Spsr::F;
        match state {
            ExecutionState::AArch32 => (
                masked | Spsr::M_EXECUTION_STATE | Spsr::from_bits_retain(MODE32_SVC.into()),
                ScrEl3::RES1,
            ),
            ExecutionState::AArch64 => (
                masked | Spsr::D | Spsr::M_AARCH64_EL1H,
                ScrEl3::RES1 | ScrEl3::RW,
            ),
        }
    }

    /// Disables translation and caches, then enters the image described by `entry_point` in the
    /// secure world.
    ///
    /// # Safety
    ///
    /// The image must be loaded at `entry_point.pc` and written back to memory. Nothing set up by
    /// BL2 may be used after this.
    pub unsafe fn run_next_image(entry_point: &EntryPointInfo) -> ! {
        let (spsr, scr) = entry_state(entry_point.execution_state);
        // SAFETY: Our caller promised that the image is ready to run.
        unsafe {
            enter_image(
                &entry_point.args,
                entry_point.pc,
                spsr.bits(),
                scr.bits(),
                entry_point.lr_svc,
            )
        }
    }

    /// Loads the image arguments into `x0`-`x7` and returns to `pc` with `spsr` and `scr`.
    ///
    /// `lr` is passed in `x30`, for AArch32 images which read the non-secure entry point from it.
    #[unsafe(naked)]
    unsafe extern "C" fn enter_image(
        args: &[u64; 8],
        pc: usize,
        spsr: u64,
        scr: u64,
        lr: usize,
    ) -> ! {
        naked_asm!(
            "msr	elr_el3, x1
            msr	spsr_el3, x2
            msr	scr_el3, x3
            mov	x30, x4
            mov	x8, x0

            mrs	x9, sctlr_el3
            ldr	x10, ={SCTLR_CLEAR}
            bic	x9, x9, x10
            ldp	x0, x1, [x8]
            ldp	x2, x3, [x8, #16]
            ldp	x4, x5, [x8, #32]
            ldp	x6, x7, [x8, #48]
            msr	sctlr_el3, x9
            isb
            tlbi	alle3
            dsb	ish
            isb
            eret",
            SCTLR_CLEAR = const (SctlrEl3::M | SctlrEl3::C | SctlrEl3::I).bits(),
        );
    }

    /// This macro wraps a naked_asm block with `bti`, or any other universal
    /// prologue we'd still like added.
    ///
    /// Use this over `core::arch::naked_asm` by default, otherwise you may
    /// need to ensure that e.g. `bti` landing pads are in place yourself.
    macro_rules! naked_asm {
        ($($inner:tt)*) => {
           ::core::arch::naked_asm!("bti c", $($inner)*)
        }
    }
    pub(crate) use naked_asm;
}

#[cfg(all(target_arch = "aarch64", not(test)))]
pub(crate) use asm::naked_asm;
