// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! STMicroelectronics STM32MP1 boards, using the TF-A drivers for the SoC.

use super::Platform;
use crate::{
    boot_context::BootContext,
    device_tree::{DeviceTree, DtError, FdtDeviceTree},
    error::DriverError,
    image::{ImageDescriptor, ImageInfo},
    logger::LockedWriter,
    mmio::DirectMmio,
    pagetable::{MmapRegion, PAGE_HEAP_PAGE_COUNT},
};
use aarch64_paging::paging::PageTable;
use core::{
    ffi::{c_int, c_uint, c_ulong},
    fmt::{self, Write},
    slice,
};
use spin::mutex::{SpinMutex, SpinMutexGuard};

const SYSRAM_BASE: usize = 0x2ffc_0000;

/// Peripherals on the APB and AHB buses.
const DEVICE1: MmapRegion = MmapRegion::device(0x4000_0000, 0x4000_0000);
/// The GIC and the MPU peripherals.
const DEVICE2: MmapRegion = MmapRegion::device(0xa000_0000, 0x2000_0000);

/// Clock identifier of the RTC APB interface, from `dt-bindings/clock/stm32mp1-clks.h`.
const RTCAPB: u32 = 68;

/// Type and version of an `image_info_t` parameter block.
const PARAM_IMAGE_BINARY: u8 = 0x02;
const VERSION_2: u8 = 0x02;

static PAGE_HEAP: SpinMutex<[PageTable; PAGE_HEAP_PAGE_COUNT]> =
    SpinMutex::new([PageTable::EMPTY; PAGE_HEAP_PAGE_COUNT]);

static CONSOLE: SpinMutex<Console> = SpinMutex::new(Console::EMPTY);

/// A TF-A `console_t`, filled in by the UART driver on registration.
#[repr(C)]
struct Console {
    next: usize,
    flags: usize,
    putc: usize,
    getc: usize,
    flush: usize,
    base: usize,
}

impl Console {
    const EMPTY: Self = Self {
        next: 0,
        flags: 0,
        putc: 0,
        getc: 0,
        flush: 0,
        base: 0,
    };
}

/// A TF-A `param_header_t`.
#[repr(C)]
struct ParamHeader {
    param_type: u8,
    version: u8,
    size: u16,
    attr: u32,
}

/// A TF-A `image_info_t`.
#[repr(C)]
struct TfaImageInfo {
    header: ParamHeader,
    image_base: usize,
    image_size: u32,
    image_max_size: u32,
}

unsafe extern "C" {
    fn dt_open_and_check() -> c_int;
    fn dt_pmic_status() -> c_int;
    fn dt_get_ddr_size() -> u32;
    fn dt_set_stdout_pinctrl() -> c_int;
    fn initialize_pmic();
    fn stm32mp1_ddr_probe() -> c_int;
    fn stm32mp1_security_setup();
    fn stm32mp1_arch_security_setup();
    fn generic_delay_timer_init();
    fn udelay(usec: u32);
    fn mdelay(msec: u32);
    fn stm32mp1_clk_probe() -> c_int;
    fn stm32mp1_clk_init() -> c_int;
    fn stm32mp_clk_enable(id: c_ulong);
    fn stm32mp_clk_disable(id: c_ulong);
    fn stm32mp_clk_get_rate(id: c_ulong) -> c_ulong;
    fn stm32mp_reset_assert(id: u32);
    fn stm32mp_reset_deassert(id: u32);
    fn console_stm32_register(
        base: usize,
        clock: c_uint,
        baud_rate: c_uint,
        console: *mut Console,
    ) -> c_int;
    fn console_putc(c: c_int) -> c_int;
    fn stm32mp_io_setup();
    fn load_auth_image(image_id: c_uint, image_data: *mut TfaImageInfo) -> c_int;
}

/// Writes characters to every console registered with the TF-A console framework.
///
/// Output is dropped until a console is registered.
pub struct ConsoleWriter;

impl Write for ConsoleWriter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for byte in s.bytes() {
            // SAFETY: `console_putc` only accesses registered consoles, which are static.
            unsafe {
                console_putc(byte.into());
            }
        }
        Ok(())
    }
}

/// The STM32MP1 platform.
pub struct Stm32Mp1 {
    mmio: DirectMmio,
}

impl Stm32Mp1 {
    /// Creates the platform.
    ///
    /// # Safety
    ///
    /// This must only be called once, by BL2 running at EL3 on an STM32MP1.
    pub unsafe fn new() -> Self {
        Self {
            // SAFETY: Our caller promised that this is an STM32MP1, whose registers BL2 owns.
            mmio: unsafe { DirectMmio::new() },
        }
    }
}

impl Platform for Stm32Mp1 {
    const PWR_BASE: usize = 0x5000_1000;
    const RCC_BASE: usize = 0x5000_0000;
    const TAMP_BASE: usize = 0x5c00_a000;

    const DTB_BASE: usize = SYSRAM_BASE + 0xc000;
    const DTB_SIZE: usize = 0x6000;
    const BL32_BASE: usize = 0x2ffe_7000;
    const BL32_SIZE: usize = 0x3000_0000 - Self::BL32_BASE;
    const OPTEE_BASE: usize = SYSRAM_BASE;
    const OPTEE_SIZE: usize = Self::DTB_BASE - Self::OPTEE_BASE;
    const BL33_BASE: usize = Self::DDR_BASE + 0x10_0000;
    const BL33_MAX_SIZE: usize = 0x40_0000;

    const DDR_BASE: usize = 0xc000_0000;
    const DDR_MAX_SIZE: usize = 0x4000_0000;
    const DDR_S_SIZE: usize = 0x01e0_0000;
    const DDR_SHMEM_SIZE: usize = 0x0020_0000;
    const DDR_NS_MIN_SIZE: usize = 0x0400_0000;

    const DEVICE_REGIONS: &'static [MmapRegion] = &[DEVICE1, DEVICE2];

    const UART_BAUDRATE: u32 = 115_200;
    const RTCAPB_CLOCK: u32 = RTCAPB;

    type LogSinkImpl = LockedWriter<ConsoleWriter>;
    type MmioImpl = DirectMmio;

    fn log_sink() -> Self::LogSinkImpl {
        LockedWriter::new(ConsoleWriter)
    }

    fn mmio(&self) -> &DirectMmio {
        &self.mmio
    }

    fn boot_context(&self, address: usize) -> BootContext {
        // SAFETY: The boot ROM passes the address of its context in SYSRAM, which stays valid
        // while BL2 runs.
        unsafe { (address as *const BootContext).read_unaligned() }
    }

    fn page_heap(&mut self) -> &'static mut [PageTable] {
        SpinMutexGuard::leak(PAGE_HEAP.try_lock().expect("Page heap already taken"))
    }

    fn pmic_present(&mut self) -> bool {
        // SAFETY: The device tree blob was loaded by the boot ROM and is only read.
        unsafe { dt_open_and_check() >= 0 && dt_pmic_status() > 0 }
    }

    fn initialize_pmic(&mut self) {
        // SAFETY: The PMIC is described by the device tree and owned by BL2.
        unsafe { initialize_pmic() }
    }

    fn ddr_probe(&mut self) -> Result<usize, DriverError> {
        // SAFETY: The DDR controller is only initialised once, before DRAM is used.
        DriverError::check(unsafe { stm32mp1_ddr_probe() })?;
        // SAFETY: Only reads the device tree.
        Ok(unsafe { dt_get_ddr_size() } as usize)
    }

    fn security_setup(&mut self) {
        // SAFETY: DRAM is initialised, so the firewall regions can be computed.
        unsafe { stm32mp1_security_setup() }
    }

    fn open_device_tree(&self) -> Result<impl DeviceTree + '_, DtError> {
        // SAFETY: The device tree region is mapped read-only, so nothing modifies the blob.
        let device_tree = unsafe { FdtDeviceTree::from_address(Self::DTB_BASE) }?;
        // SAFETY: The blob has been validated above.
        if unsafe { dt_open_and_check() } < 0 {
            return Err(DtError::Incompatible);
        }
        Ok(device_tree)
    }

    fn init_delay_timer(&mut self) {
        // SAFETY: Only programs the timer frequency used by the delay functions.
        unsafe { generic_delay_timer_init() }
    }

    fn udelay(&mut self, us: u32) {
        // SAFETY: The delay timer was initialised.
        unsafe { udelay(us) }
    }

    fn mdelay(&mut self, ms: u32) {
        // SAFETY: The delay timer was initialised.
        unsafe { mdelay(ms) }
    }

    fn clk_probe(&mut self) -> Result<(), DriverError> {
        // SAFETY: The RCC is mapped and the device tree is open.
        DriverError::check(unsafe { stm32mp1_clk_probe() })
    }

    fn clk_init(&mut self) -> Result<(), DriverError> {
        // SAFETY: The clock driver was probed.
        DriverError::check(unsafe { stm32mp1_clk_init() })
    }

    fn clk_enable(&mut self, id: u32) {
        // SAFETY: The clock driver was initialised.
        unsafe { stm32mp_clk_enable(id.into()) }
    }

    fn clk_disable(&mut self, id: u32) {
        // SAFETY: The clock driver was initialised.
        unsafe { stm32mp_clk_disable(id.into()) }
    }

    fn clk_get_rate(&mut self, id: u32) -> u32 {
        // SAFETY: The clock driver was initialised.
        let rate = unsafe { stm32mp_clk_get_rate(id.into()) };
        rate.try_into().unwrap_or(u32::MAX)
    }

    fn reset_assert(&mut self, id: u32) {
        // SAFETY: The RCC is mapped.
        unsafe { stm32mp_reset_assert(id) }
    }

    fn reset_deassert(&mut self, id: u32) {
        // SAFETY: The RCC is mapped.
        unsafe { stm32mp_reset_deassert(id) }
    }

    fn set_stdout_pinctrl(&mut self) -> Result<(), DriverError> {
        // SAFETY: The GPIO banks are mapped and their clocks are running.
        match unsafe { dt_set_stdout_pinctrl() } {
            0 => Ok(()),
            ret => Err(DriverError(ret)),
        }
    }

    fn register_console(
        &mut self,
        base: usize,
        clock_rate: u32,
        baud_rate: u32,
    ) -> Result<(), DriverError> {
        let console = SpinMutexGuard::leak(CONSOLE.try_lock().ok_or(DriverError(-16))?);
        // SAFETY: The console is static and never accessed from Rust again, so the driver can
        // keep it in its list.
        match unsafe { console_stm32_register(base, clock_rate, baud_rate, console) } {
            0 => Err(DriverError(0)),
            _ => Ok(()),
        }
    }

    fn arch_security_setup(&mut self) {
        // SAFETY: Called once, after the clock tree is configured.
        unsafe { stm32mp1_arch_security_setup() }
    }

    fn io_setup(&mut self) {
        // SAFETY: The boot interface and clocks are set up.
        unsafe { stm32mp_io_setup() }
    }

    fn load_image(&mut self, image: &mut ImageDescriptor) -> Result<(), DriverError> {
        let mut image_info = TfaImageInfo {
            header: ParamHeader {
                param_type: PARAM_IMAGE_BINARY,
                version: VERSION_2,
                size: size_of::<TfaImageInfo>() as u16,
                attr: 0,
            },
            image_base: image.image_info.base,
            image_size: 0,
            image_max_size: image.image_info.max_size as u32,
        };
        // SAFETY: The destination area is mapped read-write and reserved for this image.
        DriverError::check(unsafe { load_auth_image(image.id.into(), &mut image_info) })?;
        image.image_info.size = image_info.image_size as usize;
        Ok(())
    }

    fn loaded_image(&self, image_info: &ImageInfo) -> &[u8] {
        // SAFETY: The image was loaded to this mapped area and nothing else writes to it.
        unsafe { slice::from_raw_parts(image_info.base as *const u8, image_info.size) }
    }
}
