// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

use super::{BuildResult, Builder};
use cc::Build;
use std::path::Path;

/// TF-A sources providing the drivers BL2 calls, relative to the TF-A tree.
const DRIVER_SOURCES: &[&str] = &[
    "common/bl_common.c",
    "common/fdt_wrappers.c",
    "drivers/arm/tzc/tzc400.c",
    "drivers/console/multi_console.c",
    "drivers/delay_timer/delay_timer.c",
    "drivers/delay_timer/generic_delay_timer.c",
    "drivers/io/io_block.c",
    "drivers/io/io_dummy.c",
    "drivers/io/io_fip.c",
    "drivers/io/io_storage.c",
    "drivers/mmc/mmc.c",
    "drivers/st/clk/stm32mp1_clk.c",
    "drivers/st/clk/stm32mp_clkfunc.c",
    "drivers/st/ddr/stm32mp1_ddr.c",
    "drivers/st/ddr/stm32mp1_ram.c",
    "drivers/st/gpio/stm32_gpio.c",
    "drivers/st/i2c/stm32_i2c.c",
    "drivers/st/mmc/stm32_sdmmc2.c",
    "drivers/st/pmic/stm32mp_pmic.c",
    "drivers/st/pmic/stpmic1.c",
    "drivers/st/reset/stm32mp1_reset.c",
    "drivers/st/uart/aarch64/stm32_console.S",
    "plat/st/common/stm32mp_common.c",
    "plat/st/common/stm32mp_dt.c",
    "plat/st/stm32mp1/bl2_io_storage.c",
    "plat/st/stm32mp1/stm32mp1_private.c",
    "plat/st/stm32mp1/stm32mp1_security.c",
];

pub struct Stm32Mp1Builder;

impl Stm32Mp1Builder {
    pub const PLAT_NAME: &str = "stm32mp1";

    const BL2_BASE: u64 = 0x2ffd_2000;
    const BL2_SIZE: u64 = 0x1_5000;
}

impl Builder for Stm32Mp1Builder {
    fn bl2_base(&self) -> u64 {
        Self::BL2_BASE
    }

    fn bl2_size(&self) -> u64 {
        Self::BL2_SIZE
    }

    fn configure_build(&self, build: &mut Build, tfa_dir: &Path) -> BuildResult {
        build
            .include(tfa_dir.join("plat/st/common/include"))
            .include(tfa_dir.join("plat/st/stm32mp1/include"))
            .define("STM32MP_UART_PROGRAMMER", Some("0"))
            .define("STM32MP_USB_PROGRAMMER", Some("0"));
        for source in DRIVER_SOURCES {
            let path = tfa_dir.join(source);
            if !path.exists() {
                return Err(format!("Missing TF-A source {}", path.display()).into());
            }
            build.file(path);
        }
        Ok(())
    }
}
