// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! The boot context handed over by the boot ROM, and recording of the boot interface for later
//! stages.

use crate::{
    mmio::Mmio,
    registers::{TAMP_BKP_BOOT_INTERFACE, TAMP_BOOT_ITF_MASK, TAMP_BOOT_ITF_SHIFT, tamp_bkpr},
};
use core::fmt::{self, Display, Formatter};
use num_enum::{IntoPrimitive, TryFromPrimitive};
use thiserror::Error;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// The start of the context structure written by the boot ROM. Only the fields BL2 uses are
/// declared.
#[derive(
    Clone, Copy, Debug, Default, Eq, FromBytes, Immutable, IntoBytes, KnownLayout, PartialEq,
)]
#[repr(C)]
pub struct BootContext {
    /// The action the ROM took to boot.
    pub boot_action: u16,
    /// The raw [`BootInterface`] the ROM booted from.
    pub boot_interface_selected: u16,
    /// Which instance of the interface was used, starting from 1.
    pub boot_interface_instance: u16,
}

/// Interfaces the ROM can boot from.
#[derive(Clone, Copy, Debug, Eq, IntoPrimitive, PartialEq, TryFromPrimitive)]
#[repr(u16)]
pub enum BootInterface {
    /// No interface was selected.
    None = 0,
    /// SD card.
    Sd = 1,
    /// eMMC.
    Emmc = 2,
    /// Parallel NAND on the FMC.
    NandFmc = 3,
    /// NOR flash on QSPI.
    NorQspi = 4,
    /// Serial download over UART.
    Uart = 5,
    /// Serial download over USB.
    Usb = 6,
    /// NAND flash on QSPI.
    NandQspi = 7,
}

impl Display for BootInterface {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let name = match self {
            Self::None => "none",
            Self::Sd => "SD",
            Self::Emmc => "eMMC",
            Self::NandFmc => "FMC NAND",
            Self::NorQspi => "QSPI NOR",
            Self::Uart => "UART",
            Self::Usb => "USB",
            Self::NandQspi => "QSPI NAND",
        };
        f.write_str(name)
    }
}

/// The boot interface can't be encoded in the backup register.
#[derive(Clone, Copy, Debug, Eq, Error, PartialEq)]
pub enum BootInterfaceError {
    /// The interface doesn't fit in 4 bits.
    #[error("Boot interface {0} out of range")]
    Interface(u16),
    /// The instance doesn't fit in 4 bits.
    #[error("Boot interface instance {0} out of range")]
    Instance(u16),
}

impl BootContext {
    /// Returns the interface the ROM booted from, or the raw value if it is unknown.
    pub fn boot_interface(&self) -> Result<BootInterface, u16> {
        BootInterface::try_from(self.boot_interface_selected)
            .map_err(|_| self.boot_interface_selected)
    }

    /// Returns the boot interface field of the TAMP backup register, before shifting into place.
    pub fn encoded_boot_interface(&self) -> Result<u32, BootInterfaceError> {
        let interface = self.boot_interface_selected;
        let instance = self.boot_interface_instance;
        if interface > 0xf {
            return Err(BootInterfaceError::Interface(interface));
        }
        if instance > 0xf {
            return Err(BootInterfaceError::Instance(instance));
        }
        Ok((u32::from(interface) << 4) | u32::from(instance))
    }
}

/// Records the boot interface and instance from `context` in the TAMP backup register.
///
/// The RTC APB clock must be enabled.
pub fn save_boot_interface(
    mmio: &impl Mmio,
    tamp_base: usize,
    context: &BootContext,
) -> Result<(), BootInterfaceError> {
    let value = context.encoded_boot_interface()?;
    mmio.clrsetbits_32(
        tamp_bkpr(tamp_base, TAMP_BKP_BOOT_INTERFACE),
        TAMP_BOOT_ITF_MASK,
        value << TAMP_BOOT_ITF_SHIFT,
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::test::FakeMmio;

    const TAMP_BASE: usize = 0x5c00_a000;
    const BKP20: usize = TAMP_BASE + 0x150;

    fn context(interface: u16, instance: u16) -> BootContext {
        BootContext {
            boot_action: 0,
            boot_interface_selected: interface,
            boot_interface_instance: instance,
        }
    }

    #[test]
    fn layout_matches_rom() {
        let bytes = [0x34, 0x12, 0x02, 0x00, 0x01, 0x00, 0xff, 0xff];
        let (context, _) = BootContext::read_from_prefix(&bytes[..]).unwrap();
        assert_eq!(context.boot_action, 0x1234);
        assert_eq!(context.boot_interface(), Ok(BootInterface::Emmc));
        assert_eq!(context.boot_interface_instance, 1);
        assert_eq!(context.as_bytes(), &bytes[..6]);
    }

    #[test]
    fn unknown_interface() {
        assert_eq!(context(9, 1).boot_interface(), Err(9));
    }

    #[test]
    fn writes_backup_register() {
        let mmio = FakeMmio::new();
        mmio.write_32(BKP20, 0xdead_00ef);

        save_boot_interface(&mmio, TAMP_BASE, &context(BootInterface::Sd.into(), 1)).unwrap();
        assert_eq!(mmio.read_32(BKP20), 0xdead_11ef);

        save_boot_interface(&mmio, TAMP_BASE, &context(BootInterface::NandQspi.into(), 2))
            .unwrap();
        assert_eq!(mmio.read_32(BKP20), 0xdead_72ef);
    }

    #[test]
    fn rejects_values_wider_than_a_nibble() {
        let mmio = FakeMmio::new();

        assert_eq!(
            save_boot_interface(&mmio, TAMP_BASE, &context(0x10, 1)),
            Err(BootInterfaceError::Interface(0x10))
        );
        assert_eq!(
            save_boot_interface(&mmio, TAMP_BASE, &context(1, 0x11)),
            Err(BootInterfaceError::Instance(0x11))
        );
        assert!(mmio.writes().is_empty());
    }
}
