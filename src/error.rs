// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! Conditions which stop the boot.

use crate::{
    device_tree::DtError, image::ImageId, optee::OpteeError, pagetable::MmapError, setup::Phase,
};
use thiserror::Error;

/// A failure reported by an external driver, with its raw return code.
#[derive(Clone, Copy, Debug, Eq, Error, PartialEq)]
#[error("driver error {0}")]
pub struct DriverError(pub i32);

impl DriverError {
    /// Converts a driver return code, where only negative values are errors, to a result.
    pub fn check(ret: i32) -> Result<(), Self> {
        if ret < 0 {
            Err(Self(ret))
        } else {
            Ok(())
        }
    }
}

/// An unrecoverable error. BL2 halts when one of these is returned.
#[derive(Clone, Copy, Debug, Eq, Error, PartialEq)]
pub enum Fatal {
    /// A setup phase was run before the one it depends on.
    #[error("Setup phase {attempted:?} run in phase {current:?}")]
    PhaseOrder {
        /// The phase which was attempted.
        attempted: Phase,
        /// The phase BL2 was in.
        current: Phase,
    },
    /// The DDR controller could not be initialised.
    #[error("DDR probe failed: {0}")]
    DdrProbe(DriverError),
    /// There is not enough DRAM for the secure carve-out and a usable non-secure area.
    #[error("DRAM size {size:#x} is too small")]
    DramTooSmall {
        /// The detected DRAM size.
        size: usize,
    },
    /// The memory map could not be declared or activated.
    #[error("Memory map: {0}")]
    MemoryMap(#[from] MmapError),
    /// The device tree blob is invalid.
    #[error("{0}")]
    DeviceTree(#[from] DtError),
    /// The clock driver could not be probed.
    #[error("Clock probe failed: {0}")]
    ClockProbe(DriverError),
    /// The clock tree could not be initialised.
    #[error("Clock init failed: {0}")]
    ClockInit(DriverError),
    /// The console UART is described but its driver failed.
    #[error("Console registration failed: {0}")]
    Console(DriverError),
    /// The RCC left secure mode during security setup.
    #[error("RCC is not in secure mode")]
    RccNotSecure,
    /// An image could not be loaded.
    #[error("Failed to load image {id:?}: {error}")]
    ImageLoad {
        /// The image being loaded.
        id: ImageId,
        /// The loader error.
        error: DriverError,
    },
    /// An image descriptor needed by the boot flow is missing.
    #[error("Missing image descriptor {0:?}")]
    MissingImage(ImageId),
    /// The OP-TEE header is invalid.
    #[error("OP-TEE header parse error: {0}")]
    Optee(#[from] OpteeError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_negative_return_codes_fail() {
        assert_eq!(DriverError::check(0), Ok(()));
        assert_eq!(DriverError::check(1), Ok(()));
        assert_eq!(DriverError::check(-22), Err(DriverError(-22)));
    }
}
