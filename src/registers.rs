// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! Offsets and bit definitions of the STM32MP1 PWR, RCC and TAMP registers touched by BL2.

use bitflags::bitflags;

/// Offset of the PWR control register 1 from the PWR base.
pub const PWR_CR1: usize = 0x0;

/// Offset of the RCC TrustZone control register from the RCC base.
pub const RCC_TZCR: usize = 0x0;
/// Offset of the RCC backup domain control register from the RCC base.
pub const RCC_BDCR: usize = 0x140;
/// Offset of the RCC MPU reset status clear register from the RCC base.
pub const RCC_MP_RSTSCLRR: usize = 0x408;

const TAMP_BKP_REGISTER_BASE: usize = 0x100;
/// Index of the TAMP backup register which records the boot interface.
pub const TAMP_BKP_BOOT_INTERFACE: usize = 20;

/// Returns the address of TAMP backup register `index`.
pub const fn tamp_bkpr(tamp_base: usize, index: usize) -> usize {
    tamp_base + TAMP_BKP_REGISTER_BASE + index * size_of::<u32>()
}

bitflags! {
    /// PWR_CR1.
    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    pub struct PwrCr1: u32 {
        /// Disable backup domain write protection.
        const DBP = 1 << 8;
    }
}

bitflags! {
    /// RCC_TZCR.
    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    pub struct RccTzcr: u32 {
        /// RCC secure mode enabled.
        const TZEN = 1 << 0;
        /// Protection of the MCU clock configuration.
        const MCKPROT = 1 << 1;
    }
}

bitflags! {
    /// RCC_BDCR.
    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    pub struct RccBdcr: u32 {
        /// RTC clock source selection. Zero (no clock) only after the backup domain lost power.
        const RTCSRC = 0b11 << 16;
        /// Backup domain software reset.
        const VSWRST = 1 << 31;
    }
}

bitflags! {
    /// RCC_MP_RSTSCLRR, the MPU reset cause flags.
    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    pub struct RccMpRstsclrr: u32 {
        /// Power-on reset.
        const PORRSTF = 1 << 0;
        /// Brownout reset.
        const BORRSTF = 1 << 1;
        /// Pad reset from NRST.
        const PADRSTF = 1 << 2;
        /// HSE clock failure.
        const HCSSRSTF = 1 << 3;
        /// VDD_CORE failure.
        const VCORERSTF = 1 << 4;
        /// System reset generated by the MPU.
        const MPSYSRSTF = 1 << 6;
        /// System reset generated by the MCU.
        const MCSYSRSTF = 1 << 7;
        /// Independent watchdog 1.
        const IWDG1RSTF = 1 << 8;
        /// Independent watchdog 2.
        const IWDG2RSTF = 1 << 9;
        /// System exit from standby.
        const STDBYRSTF = 1 << 11;
        /// MPU exit from CStandby.
        const CSTDBYRSTF = 1 << 12;
        /// MPU processor 0 reset.
        const MPUP0RSTF = 1 << 13;
        /// MPU processor 1 reset.
        const MPUP1RSTF = 1 << 14;
    }
}

/// Position of the boot interface field in the TAMP backup register.
pub const TAMP_BOOT_ITF_SHIFT: u32 = 8;
/// Mask of the boot interface field in the TAMP backup register.
pub const TAMP_BOOT_ITF_MASK: u32 = 0xff << TAMP_BOOT_ITF_SHIFT;
