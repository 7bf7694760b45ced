// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! The BL2 platform bring-up sequence.
//!
//! [`Bl2Setup`] runs each phase once, in order. Every phase depends on the hardware state left by
//! the previous one, so running a phase out of order is a fatal error.

use crate::{
    boot_context::save_boot_interface,
    config::{Bl2Config, SecurePayload},
    device_tree::{DeviceTree, UartInfo},
    error::Fatal,
    image::{EntryPointInfo, ImageId, ImageRegistry},
    image_load::{handle_post_image_load, image_descriptors},
    layout::{bl_code_base, bl_code_end, bl_rw_base, bl_rw_end},
    logger::notice,
    mmio::Mmio,
    pagetable::{Access, IdMap, MemoryMap, MmapError, MmapRegion, Security, configure_mmu},
    platform::Platform,
    registers::{PWR_CR1, PwrCr1, RCC_BDCR, RCC_TZCR, RccBdcr, RccTzcr},
    reset_reason::print_reset_reason,
};
use arrayvec::ArrayString;
use core::ops::Range;
use log::{debug, error, info, warn};

/// Longest board model which is printed.
const MODEL_MAX_LEN: usize = 128;

/// The phases of the bring-up, in the order they run.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
#[repr(u8)]
pub enum Phase {
    /// Nothing has run yet.
    Entry,
    /// The boot context address has been recorded.
    ContextCaptured,
    /// The PMIC and DRAM are up.
    PlatformReady,
    /// Translation, clocks, console, security and I/O are set up.
    ArchReady,
    /// All images are loaded.
    ImagesLoaded,
}

/// How DRAM is shared between the normal world and OP-TEE.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DdrLayout {
    /// DRAM available to the normal world.
    pub non_secure: Range<usize>,
    /// Secure carve-out for the OP-TEE paged image. Empty without OP-TEE.
    pub secure: Range<usize>,
    /// Memory shared between OP-TEE and the normal world. Empty without OP-TEE.
    pub shared: Range<usize>,
}

impl DdrLayout {
    /// Splits `dram_size` bytes of DRAM for the given payload.
    ///
    /// With OP-TEE the secure and shared areas are carved out of the top of DRAM, and there must
    /// be at least `P::DDR_NS_MIN_SIZE` left below them.
    pub fn new<P: Platform>(dram_size: usize, payload: SecurePayload) -> Result<Self, Fatal> {
        let size = dram_size.min(P::DDR_MAX_SIZE);
        let end = P::DDR_BASE + size;
        match payload {
            SecurePayload::SpMin => Ok(Self {
                non_secure: P::DDR_BASE..end,
                secure: end..end,
                shared: end..end,
            }),
            SecurePayload::OpTee => {
                if size < P::DDR_S_SIZE + P::DDR_SHMEM_SIZE + P::DDR_NS_MIN_SIZE {
                    return Err(Fatal::DramTooSmall { size: dram_size });
                }
                let shared_start = end - P::DDR_SHMEM_SIZE;
                let secure_start = shared_start - P::DDR_S_SIZE;
                Ok(Self {
                    non_secure: P::DDR_BASE..secure_start,
                    secure: secure_start..shared_start,
                    shared: shared_start..end,
                })
            }
        }
    }
}

/// State of the BL2 bring-up.
pub struct Bl2Setup<P: Platform> {
    platform: P,
    config: Bl2Config,
    phase: Phase,
    /// Address of the boot context written by the boot ROM.
    boot_context_address: usize,
    ddr: Option<DdrLayout>,
    /// The active translation tables. These must live as long as BL2 runs.
    idmap: Option<IdMap>,
    images: ImageRegistry,
}

impl<P: Platform> Bl2Setup<P> {
    /// Creates the bring-up state for `platform`.
    pub fn new(platform: P, config: Bl2Config) -> Self {
        Self {
            platform,
            config,
            phase: Phase::Entry,
            boot_context_address: 0,
            ddr: None,
            idmap: None,
            images: image_descriptors::<P>(config.payload),
        }
    }

    /// Checks that `phase` is the next phase to run.
    fn begin(&self, phase: Phase) -> Result<(), Fatal> {
        if phase as u8 == self.phase as u8 + 1 {
            Ok(())
        } else {
            Err(Fatal::PhaseOrder {
                attempted: phase,
                current: self.phase,
            })
        }
    }

    /// Records the boot context address passed by the boot ROM in `arg0`.
    pub fn early_platform_setup(&mut self, arg0: u64) -> Result<(), Fatal> {
        self.begin(Phase::ContextCaptured)?;
        self.boot_context_address = arg0 as usize;
        self.phase = Phase::ContextCaptured;
        Ok(())
    }

    /// Brings up the PMIC and DRAM, then the OP-TEE memory firewall if needed.
    pub fn platform_setup(&mut self) -> Result<(), Fatal> {
        self.begin(Phase::PlatformReady)?;

        if self.platform.pmic_present() {
            self.platform.initialize_pmic();
        }

        let dram_size = self.platform.ddr_probe().map_err(|e| {
            error!("Invalid DDR init");
            Fatal::DdrProbe(e)
        })?;
        debug!("DRAM size {dram_size:#x}");
        let ddr = DdrLayout::new::<P>(dram_size, self.config.payload)?;

        match self.config.payload {
            SecurePayload::OpTee => {
                info!("BL2 runs OP-TEE setup");
                self.platform.security_setup();
            }
            SecurePayload::SpMin => info!("BL2 runs SP_MIN setup"),
        }

        self.ddr = Some(ddr);
        self.phase = Phase::PlatformReady;
        Ok(())
    }

    /// Enables translation, then brings up the backup domain, clocks, console, security
    /// configuration and I/O.
    pub fn arch_setup(&mut self) -> Result<(), Fatal> {
        self.begin(Phase::ArchReady)?;
        let ddr = self
            .ddr
            .as_ref()
            .expect("DRAM layout is set by platform setup");

        let map = declare_memory_map::<P>(&self.config, ddr)?;
        self.idmap = Some(configure_mmu(&map, self.platform.page_heap())?);

        let (uart, model) = {
            let device_tree = self.platform.open_device_tree()?;
            let model = device_tree.board_model().map(truncate_model);
            (device_tree.stdout_uart(), model)
        };

        self.unlock_backup_domain();
        self.platform.init_delay_timer();
        self.platform.clk_probe().map_err(Fatal::ClockProbe)?;
        self.platform.clk_init().map_err(Fatal::ClockInit)?;

        if self.console_setup(uart)?
            && let Some(model) = model
        {
            notice!("Model: {model}");
        }

        self.save_boot_interface();
        self.security_setup()?;
        print_reset_reason(self.platform.mmio(), P::RCC_BASE);
        self.platform.io_setup();

        self.phase = Phase::ArchReady;
        Ok(())
    }

    /// Loads every image, fixing up the descriptors as each one is loaded, and returns the entry
    /// point of the next stage.
    pub fn load_images(&mut self) -> Result<EntryPointInfo, Fatal> {
        self.begin(Phase::ImagesLoaded)?;
        let ddr = self
            .ddr
            .as_ref()
            .expect("DRAM layout is set by platform setup");
        if let Some(idmap) = &self.idmap {
            debug!("Loading images with page table at {:#x}", idmap.root_address().0);
        }

        for id in self.images.ids() {
            let image = self
                .images
                .get_mut(id)
                .ok_or(Fatal::MissingImage(id))?;
            if !image.preloaded {
                info!("BL2: Loading image id {}", u32::from(id));
                self.platform
                    .load_image(image)
                    .map_err(|error| Fatal::ImageLoad { id, error })?;
            }
            handle_post_image_load(&self.platform, &self.config, &mut self.images, ddr, id)?;
        }

        let next = self
            .images
            .get(ImageId::Bl32)
            .ok_or(Fatal::MissingImage(ImageId::Bl32))?
            .ep_info
            .clone();
        self.phase = Phase::ImagesLoaded;
        Ok(next)
    }

    /// Lifts the backup domain write protection, and resets the backup domain on a cold boot.
    fn unlock_backup_domain(&self) {
        let mmio = self.platform.mmio();

        let pwr_cr1 = P::PWR_BASE + PWR_CR1;
        mmio.setbits_32(pwr_cr1, PwrCr1::DBP.bits());
        mmio.wait_for_bits(pwr_cr1, PwrCr1::DBP.bits(), true);

        // The RTC clock source is only unset after the backup domain lost power.
        let bdcr = P::RCC_BASE + RCC_BDCR;
        if !RccBdcr::from_bits_retain(mmio.read_32(bdcr)).intersects(RccBdcr::RTCSRC) {
            debug!("Cold boot, resetting backup domain");
            mmio.setbits_32(bdcr, RccBdcr::VSWRST.bits());
            mmio.wait_for_bits(bdcr, RccBdcr::VSWRST.bits(), true);
            mmio.clrbits_32(bdcr, RccBdcr::VSWRST.bits());
            mmio.wait_for_bits(bdcr, RccBdcr::VSWRST.bits(), false);
        }

        mmio.clrbits_32(P::RCC_BASE + RCC_TZCR, RccTzcr::MCKPROT.bits());
    }

    /// Registers the stdout UART as the console, if the device tree describes a usable one, and
    /// returns whether it did.
    ///
    /// Only a failure of the UART driver itself is an error.
    fn console_setup(&mut self, uart: Option<UartInfo>) -> Result<bool, Fatal> {
        let Some(uart) = uart.filter(|uart| uart.enabled) else {
            return Ok(false);
        };
        let (Some(clock), Some(reset)) = (uart.clock, uart.reset) else {
            return Ok(false);
        };
        if self.platform.set_stdout_pinctrl().is_err() {
            return Ok(false);
        }

        self.platform.clk_enable(clock);
        self.platform.reset_assert(reset);
        self.platform.udelay(2);
        self.platform.reset_deassert(reset);
        self.platform.mdelay(1);

        let clock_rate = self.platform.clk_get_rate(clock);
        self.platform
            .register_console(uart.base, clock_rate, P::UART_BAUDRATE)
            .map_err(Fatal::Console)?;
        Ok(true)
    }

    /// Records the interface the ROM booted from for the OS. Failure is only logged.
    fn save_boot_interface(&mut self) {
        let context = self.platform.boot_context(self.boot_context_address);
        match context.boot_interface() {
            Ok(interface) => info!(
                "Boot interface {interface}, instance {}",
                context.boot_interface_instance
            ),
            Err(raw) => warn!("Unknown boot interface {raw}"),
        }

        self.platform.clk_enable(P::RTCAPB_CLOCK);
        let result = save_boot_interface(self.platform.mmio(), P::TAMP_BASE, &context);
        self.platform.clk_disable(P::RTCAPB_CLOCK);

        if let Err(e) = result {
            error!("Cannot save boot interface: {e}");
        }
    }

    /// Applies the SoC security configuration and checks that the RCC is still secure.
    fn security_setup(&mut self) -> Result<(), Fatal> {
        self.platform.arch_security_setup();
        let tzcr =
            RccTzcr::from_bits_retain(self.platform.mmio().read_32(P::RCC_BASE + RCC_TZCR));
        if tzcr.contains(RccTzcr::TZEN) {
            Ok(())
        } else {
            Err(Fatal::RccNotSecure)
        }
    }
}

/// Declares every region BL2 accesses once translation is enabled.
fn declare_memory_map<P: Platform>(
    config: &Bl2Config,
    ddr: &DdrLayout,
) -> Result<MemoryMap, MmapError> {
    let mut map = MemoryMap::new();
    map.add_region(MmapRegion::code(
        bl_code_base(),
        bl_code_end() - bl_code_base(),
    ))?;
    map.add_region(MmapRegion::memory(
        bl_rw_base(),
        bl_rw_end() - bl_rw_base(),
        Access::ReadWrite,
        Security::Secure,
    ))?;
    // Read-only, so that later stages don't corrupt it.
    map.add_region(MmapRegion::memory(
        P::DTB_BASE,
        P::DTB_SIZE,
        Access::ReadOnly,
        Security::Secure,
    ))?;
    map.add_region(MmapRegion::memory(
        ddr.non_secure.start,
        ddr.non_secure.len(),
        Access::ReadWrite,
        Security::NonSecure,
    ))?;

    match config.payload {
        SecurePayload::OpTee => {
            map.add_region(MmapRegion::memory(
                ddr.secure.start,
                ddr.secure.len(),
                Access::ReadWrite,
                Security::Secure,
            ))?;
            map.add_region(MmapRegion::memory(
                P::OPTEE_BASE,
                P::OPTEE_SIZE,
                Access::ReadWrite,
                Security::Secure,
            ))?;
            map.add_region(MmapRegion::memory(
                P::BL32_BASE,
                P::BL32_SIZE,
                Access::ReadWrite,
                Security::Secure,
            ))?;
        }
        SecurePayload::SpMin => {
            // The ROM loaded SP_MIN along with BL2.
            map.add_region(MmapRegion::memory(
                P::BL32_BASE,
                P::BL32_SIZE,
                Access::ReadOnly,
                Security::Secure,
            ))?;
        }
    }

    for region in P::DEVICE_REGIONS {
        map.add_region(*region)?;
    }
    Ok(map)
}

fn truncate_model(model: &str) -> ArrayString<MODEL_MAX_LEN> {
    let mut truncated = ArrayString::new();
    for c in model.chars() {
        if truncated.try_push(c).is_err() {
            break;
        }
    }
    truncated
}
