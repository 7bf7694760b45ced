// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

macro_rules! select_platform {
    (platform = $condition:literal, $mod:ident::$plat_impl:ident) => {
        #[cfg(platform = $condition)]
        mod $mod;

        #[cfg(platform = $condition)]
        pub use $mod::$plat_impl as PlatformImpl;
    };
    (test, $mod:ident::$plat_impl:ident) => {
        #[cfg(test)]
        pub mod $mod;

        #[cfg(test)]
        pub use $mod::$plat_impl as PlatformImpl;
    };
}

select_platform!(platform = "stm32mp1", stm32mp1::Stm32Mp1);
select_platform!(test, test::TestPlatform);

use crate::{
    boot_context::BootContext,
    device_tree::{DeviceTree, DtError},
    error::DriverError,
    image::{ImageDescriptor, ImageInfo},
    logger::LogSink,
    mmio::Mmio,
    pagetable::MmapRegion,
};
use aarch64_paging::paging::PageTable;

/// Type alias for convenience, to avoid having to use the complicated type name everywhere.
pub type LogSinkImpl = <PlatformImpl as Platform>::LogSinkImpl;

/// The board description and drivers BL2 needs.
///
/// Driver methods are only called in the order the boot flow needs them; implementations don't
/// need to check it.
pub trait Platform {
    /// Base address of the PWR registers.
    const PWR_BASE: usize;
    /// Base address of the RCC registers.
    const RCC_BASE: usize;
    /// Base address of the TAMP registers.
    const TAMP_BASE: usize;

    /// Where the boot ROM loads the device tree blob.
    const DTB_BASE: usize;
    /// Space reserved for the device tree blob.
    const DTB_SIZE: usize;
    /// Where the secure payload, or the OP-TEE header image, is loaded.
    const BL32_BASE: usize;
    /// Space reserved for the secure payload.
    const BL32_SIZE: usize;
    /// SYSRAM reserved for the OP-TEE pager.
    const OPTEE_BASE: usize;
    /// Size of the OP-TEE pager area.
    const OPTEE_SIZE: usize;
    /// Where the non-secure payload is loaded.
    const BL33_BASE: usize;
    /// Largest non-secure payload.
    const BL33_MAX_SIZE: usize;

    /// Start of DRAM.
    const DDR_BASE: usize;
    /// The largest amount of DRAM which is used.
    const DDR_MAX_SIZE: usize;
    /// Secure DRAM carved out of the top of DRAM for the OP-TEE paged image.
    const DDR_S_SIZE: usize;
    /// DRAM above the secure carve-out shared between OP-TEE and the normal world.
    const DDR_SHMEM_SIZE: usize;
    /// The least non-secure DRAM the normal world can boot with.
    const DDR_NS_MIN_SIZE: usize;

    /// Peripheral regions mapped as device memory.
    const DEVICE_REGIONS: &'static [MmapRegion];

    /// Baud rate of the console UART.
    const UART_BAUDRATE: u32;
    /// Clock gating the RTC APB interface, and so the TAMP backup registers.
    const RTCAPB_CLOCK: u32;

    /// Platform dependent LogSink implementation type for Logger.
    type LogSinkImpl: LogSink;

    /// Register accessor type.
    type MmioImpl: Mmio;

    /// Creates the log sink which the logger is initialised with.
    fn log_sink() -> Self::LogSinkImpl;

    /// Returns the register accessor.
    fn mmio(&self) -> &Self::MmioImpl;

    /// Reads the boot context written by the boot ROM at `address`.
    fn boot_context(&self, address: usize) -> BootContext;

    /// Returns pages for the translation tables. This is only called once.
    fn page_heap(&mut self) -> &'static mut [PageTable];

    /// Returns whether the board has a PMIC which must be initialised.
    fn pmic_present(&mut self) -> bool;

    /// Initialises the PMIC and the regulators it supplies.
    fn initialize_pmic(&mut self);

    /// Initialises the DDR controller and returns the DRAM size in bytes.
    fn ddr_probe(&mut self) -> Result<usize, DriverError>;

    /// Programs the memory firewall protecting the OP-TEE DRAM carve-out.
    fn security_setup(&mut self);

    /// Opens and validates the device tree blob.
    fn open_device_tree(&self) -> Result<impl DeviceTree + '_, DtError>;

    /// Initialises the timer used by [`Self::udelay`] and [`Self::mdelay`].
    fn init_delay_timer(&mut self);

    /// Busy-waits for `us` microseconds.
    fn udelay(&mut self, us: u32);

    /// Busy-waits for `ms` milliseconds.
    fn mdelay(&mut self, ms: u32);

    /// Probes the clock driver.
    fn clk_probe(&mut self) -> Result<(), DriverError>;

    /// Configures the clock tree.
    fn clk_init(&mut self) -> Result<(), DriverError>;

    /// Enables clock `id`.
    fn clk_enable(&mut self, id: u32);

    /// Disables clock `id`.
    fn clk_disable(&mut self, id: u32);

    /// Returns the rate of clock `id` in Hz.
    fn clk_get_rate(&mut self, id: u32) -> u32;

    /// Asserts reset line `id`.
    fn reset_assert(&mut self, id: u32);

    /// Deasserts reset line `id`.
    fn reset_deassert(&mut self, id: u32);

    /// Configures the pins of the stdout UART.
    fn set_stdout_pinctrl(&mut self) -> Result<(), DriverError>;

    /// Registers the UART at `base` as the console.
    fn register_console(
        &mut self,
        base: usize,
        clock_rate: u32,
        baud_rate: u32,
    ) -> Result<(), DriverError>;

    /// Applies the SoC security configuration, such as the secure state of the RCC.
    fn arch_security_setup(&mut self);

    /// Sets up the storage I/O stack used to load images.
    fn io_setup(&mut self);

    /// Loads the image described by `image` and records its size.
    fn load_image(&mut self, image: &mut ImageDescriptor) -> Result<(), DriverError>;

    /// Returns the contents of a loaded image.
    fn loaded_image(&self, image_info: &ImageInfo) -> &[u8];
}
