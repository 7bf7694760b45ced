// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! Classification of the MPU reset cause, for diagnostics only.

use crate::{
    mmio::Mmio,
    registers::{RCC_MP_RSTSCLRR, RccMpRstsclrr},
};
use core::fmt::{self, Display, Formatter};
use log::{error, info, warn};

/// Why the MPU was reset, as recorded by the RCC.
///
/// Several flags may be set at once; the decoder picks one by a fixed priority.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ResetCause {
    /// No flag set at all.
    Unknown,
    /// The system left Standby.
    StandbyExit,
    /// The MPU left CStandby.
    CStandbyExit,
    /// Power-on reset.
    PowerOn,
    /// Brownout reset.
    Brownout,
    /// System reset requested by the MCU.
    McuSystemReset,
    /// Local reset requested by the MCU.
    McuLocalReset,
    /// System reset requested by the MPU.
    MpuSystemReset,
    /// HSE clock failure.
    HseClockFailure,
    /// Independent watchdog 1 expired.
    Iwdg1,
    /// Independent watchdog 2 expired.
    Iwdg2,
    /// MPU processor 0 reset.
    MpuProcessor0,
    /// MPU processor 1 reset.
    MpuProcessor1,
    /// NRST pad reset.
    Pad,
    /// VDD_CORE failure.
    VddCoreFailure,
    /// Flags were set but none of them is known.
    Unidentified,
}

/// Causes checked after power-on, brownout and MCU resets, highest priority first.
const LOW_PRIORITY_CAUSES: [(RccMpRstsclrr, ResetCause); 8] = [
    (RccMpRstsclrr::MPSYSRSTF, ResetCause::MpuSystemReset),
    (RccMpRstsclrr::HCSSRSTF, ResetCause::HseClockFailure),
    (RccMpRstsclrr::IWDG1RSTF, ResetCause::Iwdg1),
    (RccMpRstsclrr::IWDG2RSTF, ResetCause::Iwdg2),
    (RccMpRstsclrr::MPUP0RSTF, ResetCause::MpuProcessor0),
    (RccMpRstsclrr::MPUP1RSTF, ResetCause::MpuProcessor1),
    (RccMpRstsclrr::PADRSTF, ResetCause::Pad),
    (RccMpRstsclrr::VCORERSTF, ResetCause::VddCoreFailure),
];

impl ResetCause {
    /// Classifies the raw value of `RCC_MP_RSTSCLRR`.
    pub fn decode(status: u32) -> Self {
        if status == 0 {
            return Self::Unknown;
        }

        let flags = RccMpRstsclrr::from_bits_retain(status);
        let pad_reset = flags.contains(RccMpRstsclrr::PADRSTF);

        // Standby flags are only meaningful if the pad was not also toggled.
        if !pad_reset {
            if flags.contains(RccMpRstsclrr::STDBYRSTF) {
                return Self::StandbyExit;
            }
            if flags.contains(RccMpRstsclrr::CSTDBYRSTF) {
                return Self::CStandbyExit;
            }
        }

        if flags.contains(RccMpRstsclrr::PORRSTF) {
            return Self::PowerOn;
        }
        if flags.contains(RccMpRstsclrr::BORRSTF) {
            return Self::Brownout;
        }
        if flags.contains(RccMpRstsclrr::MCSYSRSTF) {
            return if pad_reset {
                Self::McuSystemReset
            } else {
                Self::McuLocalReset
            };
        }

        LOW_PRIORITY_CAUSES
            .iter()
            .find(|(flag, _)| flags.contains(*flag))
            .map_or(Self::Unidentified, |&(_, cause)| cause)
    }

    /// Logs the reset cause for the given status value, and returns it.
    pub fn report(status: u32) -> Self {
        let cause = Self::decode(status);
        match cause {
            Self::Unknown => warn!("{cause}"),
            Self::StandbyExit | Self::CStandbyExit => {
                info!("Reset reason ({status:#x}):");
                info!("{cause}");
            }
            Self::Unidentified => {
                info!("Reset reason ({status:#x}):");
                error!("  {cause}");
            }
            _ => {
                info!("Reset reason ({status:#x}):");
                info!("  {cause}");
            }
        }
        cause
    }
}

impl Display for ResetCause {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let description = match self {
            Self::Unknown => "Reset reason unknown",
            Self::StandbyExit => "System exits from STANDBY",
            Self::CStandbyExit => "MPU exits from CSTANDBY",
            Self::PowerOn => "Power-on Reset (rst_por)",
            Self::Brownout => "Brownout Reset (rst_bor)",
            Self::McuSystemReset => "System reset generated by MCU (MCSYSRST)",
            Self::McuLocalReset => "Local reset generated by MCU (MCSYSRST)",
            Self::MpuSystemReset => "System reset generated by MPU (MPSYSRST)",
            Self::HseClockFailure => "Reset due to a clock failure on HSE",
            Self::Iwdg1 => "IWDG1 Reset (rst_iwdg1)",
            Self::Iwdg2 => "IWDG2 Reset (rst_iwdg2)",
            Self::MpuProcessor0 => "MPU Processor 0 Reset",
            Self::MpuProcessor1 => "MPU Processor 1 Reset",
            Self::Pad => "Pad Reset from NRST",
            Self::VddCoreFailure => "Reset due to a failure of VDD_CORE",
            Self::Unidentified => "Unidentified reset reason",
        };
        f.write_str(description)
    }
}

/// Reads the reset status from the RCC at `rcc_base` and logs the reset cause.
pub fn print_reset_reason(mmio: &impl Mmio, rcc_base: usize) -> ResetCause {
    ResetCause::report(mmio.read_32(rcc_base + RCC_MP_RSTSCLRR))
}
