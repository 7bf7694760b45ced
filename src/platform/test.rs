// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

use super::Platform;
use crate::{
    boot_context::BootContext,
    device_tree::{DeviceTree, DtError, UartInfo},
    error::DriverError,
    image::{ImageDescriptor, ImageId, ImageInfo},
    logger::LogSink,
    mmio::Mmio,
    pagetable::{MmapRegion, PAGE_HEAP_PAGE_COUNT},
    registers::{PWR_CR1, RCC_TZCR},
};
use aarch64_paging::paging::PageTable;
use std::{
    cell::RefCell,
    collections::BTreeMap,
    fmt,
    io::{Write, stdout},
};

const DEVICE0: MmapRegion = MmapRegion::device(0x4000_0000, 0x4000_0000);
const DEVICE1: MmapRegion = MmapRegion::device(0xa000_0000, 0x2000_0000);

/// The clock of the stdout UART in [`FakeDeviceTree::board`].
pub const UART_CLOCK: u32 = 0x7c;
/// The reset line of the stdout UART in [`FakeDeviceTree::board`].
pub const UART_RESET: u32 = 0x4d31;
/// The rate reported for every clock.
pub const CLOCK_RATE: u32 = 64_000_000;

#[derive(Debug, Default)]
struct FakeRegisters {
    values: BTreeMap<usize, u32>,
    /// Bits whose new value becomes visible only after a number of reads.
    delays: BTreeMap<usize, (u32, usize)>,
    /// Pending stale value and the number of reads it is still returned for.
    stale: BTreeMap<usize, (u32, usize)>,
    reads: BTreeMap<usize, usize>,
    writes: Vec<(usize, u32)>,
}

/// A register file in memory. Unwritten registers read as zero.
#[derive(Debug, Default)]
pub struct FakeMmio {
    registers: RefCell<FakeRegisters>,
}

impl FakeMmio {
    pub fn new() -> Self {
        Self::default()
    }

    /// After a write changes any of `bits` at `address`, the next `reads` reads still return the
    /// old value of those bits.
    pub fn delay_bits(&self, address: usize, bits: u32, reads: usize) {
        self.registers
            .borrow_mut()
            .delays
            .insert(address, (bits, reads));
    }

    /// Returns the number of reads of `address` so far.
    pub fn reads(&self, address: usize) -> usize {
        self.registers
            .borrow()
            .reads
            .get(&address)
            .copied()
            .unwrap_or_default()
    }

    /// Returns the value last written to `address`, without counting a read or applying a delay.
    pub fn value(&self, address: usize) -> u32 {
        self.registers
            .borrow()
            .values
            .get(&address)
            .copied()
            .unwrap_or_default()
    }

    /// Returns every write so far, in order.
    pub fn writes(&self) -> Vec<(usize, u32)> {
        self.registers.borrow().writes.clone()
    }

    /// Returns the values written to `address` so far, in order.
    pub fn writes_to(&self, address: usize) -> Vec<u32> {
        self.registers
            .borrow()
            .writes
            .iter()
            .filter(|(written, _)| *written == address)
            .map(|(_, value)| *value)
            .collect()
    }
}

impl Mmio for FakeMmio {
    fn read_32(&self, address: usize) -> u32 {
        let registers = &mut *self.registers.borrow_mut();
        *registers.reads.entry(address).or_default() += 1;
        let value = registers.values.get(&address).copied().unwrap_or_default();
        match registers.stale.get_mut(&address) {
            Some((old, remaining)) if *remaining > 0 => {
                *remaining -= 1;
                let (bits, _) = registers.delays[&address];
                (value & !bits) | (*old & bits)
            }
            _ => value,
        }
    }

    fn write_32(&self, address: usize, value: u32) {
        let registers = &mut *self.registers.borrow_mut();
        let old = registers.values.insert(address, value).unwrap_or_default();
        registers.writes.push((address, value));
        if let Some(&(bits, reads)) = registers.delays.get(&address)
            && (old ^ value) & bits != 0
        {
            registers.stale.insert(address, (old, reads));
        }
    }
}

/// Device tree contents returned by [`TestPlatform::open_device_tree`].
#[derive(Clone, Debug, Default)]
pub struct FakeDeviceTree {
    pub stdout_uart: Option<UartInfo>,
    pub board_model: Option<String>,
}

impl FakeDeviceTree {
    /// A board with a model string and an enabled console UART.
    pub fn board() -> Self {
        Self {
            stdout_uart: Some(UartInfo {
                base: 0x4001_0000,
                clock: Some(UART_CLOCK),
                reset: Some(UART_RESET),
                enabled: true,
            }),
            board_model: Some("STMicroelectronics STM32MP157C-DK2 Discovery Board".to_string()),
        }
    }
}

impl DeviceTree for FakeDeviceTree {
    fn stdout_uart(&self) -> Option<UartInfo> {
        self.stdout_uart
    }

    fn board_model(&self) -> Option<&str> {
        self.board_model.as_deref()
    }
}

/// A driver call made by the code under test.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Call {
    InitializePmic,
    DdrProbe,
    SecuritySetup,
    InitDelayTimer,
    Udelay(u32),
    Mdelay(u32),
    ClkProbe,
    ClkInit,
    ClkEnable(u32),
    ClkDisable(u32),
    ClkGetRate(u32),
    ResetAssert(u32),
    ResetDeassert(u32),
    SetStdoutPinctrl,
    RegisterConsole {
        base: usize,
        clock_rate: u32,
        baud_rate: u32,
    },
    ArchSecuritySetup,
    IoSetup,
    LoadImage(ImageId),
}

/// A fake platform for unit tests.
///
/// Driver results are scripted through the public fields, and every driver call is recorded.
#[derive(Debug)]
pub struct TestPlatform {
    pub mmio: FakeMmio,
    pub device_tree: Result<FakeDeviceTree, DtError>,
    pub boot_context: BootContext,
    pub pmic_present: bool,
    pub ddr_probe: Result<usize, DriverError>,
    pub clk_probe: Result<(), DriverError>,
    pub clk_init: Result<(), DriverError>,
    pub pinctrl: Result<(), DriverError>,
    pub register_console: Result<(), DriverError>,
    /// Whether `arch_security_setup` leaves the RCC in secure mode.
    pub rcc_secure: bool,
    /// Contents of each image in the FIP. Images not listed load as 0x100 zero bytes.
    pub fip: BTreeMap<u32, Vec<u8>>,
    /// An image whose load fails.
    pub failing_image: Option<ImageId>,
    /// Contents of loaded images, by load address.
    pub memory: BTreeMap<usize, Vec<u8>>,
    /// `PWR_CR1` and `RCC_TZCR` when the clock driver was probed.
    pub backup_domain_at_clk_probe: Option<(u32, u32)>,
    pub calls: Vec<Call>,
}

impl Default for TestPlatform {
    fn default() -> Self {
        Self {
            mmio: FakeMmio::new(),
            device_tree: Ok(FakeDeviceTree::board()),
            boot_context: BootContext {
                boot_action: 0,
                boot_interface_selected: 1,
                boot_interface_instance: 1,
            },
            pmic_present: true,
            ddr_probe: Ok(0x2000_0000),
            clk_probe: Ok(()),
            clk_init: Ok(()),
            pinctrl: Ok(()),
            register_console: Ok(()),
            rcc_secure: true,
            fip: BTreeMap::new(),
            failing_image: None,
            memory: BTreeMap::new(),
            backup_domain_at_clk_probe: None,
            calls: Vec::new(),
        }
    }
}

impl Platform for TestPlatform {
    const PWR_BASE: usize = 0x5000_1000;
    const RCC_BASE: usize = 0x5000_0000;
    const TAMP_BASE: usize = 0x5c00_a000;

    const DTB_BASE: usize = 0x2ffc_c000;
    const DTB_SIZE: usize = 0x6000;
    const BL32_BASE: usize = 0x2ffe_7000;
    const BL32_SIZE: usize = 0x1_9000;
    const OPTEE_BASE: usize = 0x2ffc_0000;
    const OPTEE_SIZE: usize = 0xc000;
    const BL33_BASE: usize = 0xc010_0000;
    const BL33_MAX_SIZE: usize = 0x40_0000;

    const DDR_BASE: usize = 0xc000_0000;
    const DDR_MAX_SIZE: usize = 0x4000_0000;
    const DDR_S_SIZE: usize = 0x01e0_0000;
    const DDR_SHMEM_SIZE: usize = 0x0020_0000;
    const DDR_NS_MIN_SIZE: usize = 0x0400_0000;

    const DEVICE_REGIONS: &'static [MmapRegion] = &[DEVICE0, DEVICE1];

    const UART_BAUDRATE: u32 = 115_200;
    const RTCAPB_CLOCK: u32 = 0x5f;

    type LogSinkImpl = StdOutSink;
    type MmioImpl = FakeMmio;

    fn log_sink() -> StdOutSink {
        StdOutSink
    }

    fn mmio(&self) -> &FakeMmio {
        &self.mmio
    }

    fn boot_context(&self, _address: usize) -> BootContext {
        self.boot_context
    }

    fn page_heap(&mut self) -> &'static mut [PageTable] {
        Box::leak(Box::new([PageTable::EMPTY; PAGE_HEAP_PAGE_COUNT]))
    }

    fn pmic_present(&mut self) -> bool {
        self.pmic_present
    }

    fn initialize_pmic(&mut self) {
        self.calls.push(Call::InitializePmic);
    }

    fn ddr_probe(&mut self) -> Result<usize, DriverError> {
        self.calls.push(Call::DdrProbe);
        self.ddr_probe
    }

    fn security_setup(&mut self) {
        self.calls.push(Call::SecuritySetup);
    }

    fn open_device_tree(&self) -> Result<impl DeviceTree + '_, DtError> {
        self.device_tree.clone()
    }

    fn init_delay_timer(&mut self) {
        self.calls.push(Call::InitDelayTimer);
    }

    fn udelay(&mut self, us: u32) {
        self.calls.push(Call::Udelay(us));
    }

    fn mdelay(&mut self, ms: u32) {
        self.calls.push(Call::Mdelay(ms));
    }

    fn clk_probe(&mut self) -> Result<(), DriverError> {
        self.calls.push(Call::ClkProbe);
        self.backup_domain_at_clk_probe = Some((
            self.mmio.value(Self::PWR_BASE + PWR_CR1),
            self.mmio.value(Self::RCC_BASE + RCC_TZCR),
        ));
        self.clk_probe
    }

    fn clk_init(&mut self) -> Result<(), DriverError> {
        self.calls.push(Call::ClkInit);
        self.clk_init
    }

    fn clk_enable(&mut self, id: u32) {
        self.calls.push(Call::ClkEnable(id));
    }

    fn clk_disable(&mut self, id: u32) {
        self.calls.push(Call::ClkDisable(id));
    }

    fn clk_get_rate(&mut self, id: u32) -> u32 {
        self.calls.push(Call::ClkGetRate(id));
        CLOCK_RATE
    }

    fn reset_assert(&mut self, id: u32) {
        self.calls.push(Call::ResetAssert(id));
    }

    fn reset_deassert(&mut self, id: u32) {
        self.calls.push(Call::ResetDeassert(id));
    }

    fn set_stdout_pinctrl(&mut self) -> Result<(), DriverError> {
        self.calls.push(Call::SetStdoutPinctrl);
        self.pinctrl
    }

    fn register_console(
        &mut self,
        base: usize,
        clock_rate: u32,
        baud_rate: u32,
    ) -> Result<(), DriverError> {
        self.calls.push(Call::RegisterConsole {
            base,
            clock_rate,
            baud_rate,
        });
        self.register_console
    }

    fn arch_security_setup(&mut self) {
        self.calls.push(Call::ArchSecuritySetup);
        if !self.rcc_secure {
            self.mmio.write_32(Self::RCC_BASE, 0);
        }
    }

    fn io_setup(&mut self) {
        self.calls.push(Call::IoSetup);
    }

    fn load_image(&mut self, image: &mut ImageDescriptor) -> Result<(), DriverError> {
        self.calls.push(Call::LoadImage(image.id));
        if self.failing_image == Some(image.id) {
            return Err(DriverError(-5));
        }
        let data = self
            .fip
            .get(&image.id.into())
            .cloned()
            .unwrap_or_else(|| vec![0; 0x100]);
        if data.len() > image.image_info.max_size {
            return Err(DriverError(-27));
        }
        image.image_info.size = data.len();
        self.memory.insert(image.image_info.base, data);
        Ok(())
    }

    fn loaded_image(&self, image_info: &ImageInfo) -> &[u8] {
        self.memory
            .get(&image_info.base)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

impl TestPlatform {
    /// Returns whether `call` was made.
    pub fn called(&self, call: &Call) -> bool {
        self.calls.contains(call)
    }

    /// Returns the index of the first `call`, panicking if it wasn't made.
    pub fn call_index(&self, call: &Call) -> usize {
        self.calls
            .iter()
            .position(|made| made == call)
            .unwrap_or_else(|| panic!("{call:?} not called, calls: {:?}", self.calls))
    }
}

/// Log sink writing to the standard output of the test harness.
pub struct StdOutSink;

impl LogSink for StdOutSink {
    fn write_fmt(&self, args: fmt::Arguments) {
        stdout().write_fmt(args).unwrap();
    }
}
