// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! Declaration of the BL2 memory map and activation of address translation.

use aarch64_paging::{
    Mapping,
    descriptor::{Attributes, PhysicalAddress, VirtualAddress},
    mair::{Mair, MairAttribute, NormalMemory},
    paging::{Constraints, MemoryRegion, PageTable, Translation, TranslationRegime, VaRange},
};
use arrayvec::ArrayVec;
use core::{
    fmt::{self, Debug, Formatter},
    ptr::NonNull,
};
use log::{debug, error, info, trace};
use thiserror::Error;

const ROOT_LEVEL: usize = 1;

// Indices of entries in the Memory Attribute Indirection Register.
const MAIR_IWTRWA_OWTRWA_NTR_INDEX: u8 = 0;
const MAIR_DEVICE_INDEX: u8 = 1;

const MAIR_DEVICE: MairAttribute = MairAttribute::DEVICE_NGNRE;
// Write-through, so that the boot context and images written before the MMU was enabled are
// visible without cache maintenance.
const MAIR_IWTRWA_OWTRWA_NTR: MairAttribute = MairAttribute::normal(
    NormalMemory::WriteThroughTransientReadWriteAllocate,
    NormalMemory::WriteThroughTransientReadWriteAllocate,
);

#[cfg_attr(test, allow(unused))]
const MAIR: Mair = Mair::EMPTY
    .with_attribute(MAIR_DEVICE_INDEX, MAIR_DEVICE)
    .with_attribute(MAIR_IWTRWA_OWTRWA_NTR_INDEX, MAIR_IWTRWA_OWTRWA_NTR);

#[cfg_attr(test, allow(unused))]
const TCR: u64 = (0b101 << 16) // 48 bit physical address size (256 TiB).
        | (64 - 39); // Size offset is 2**39 bytes (512 GiB).

/// Size of the identity mapped address space, as configured in `TCR`.
pub const ADDRESS_SPACE_SIZE: usize = 1 << 39;
/// Translation granule: 4 KiB pages.
pub const GRANULE_SIZE: usize = 4096;
/// The number of page tables BL2 needs for its memory map.
pub const PAGE_HEAP_PAGE_COUNT: usize = 8;
/// The maximum number of regions in a memory map.
pub const MAX_MMAP_REGIONS: usize = 16;

const NORMAL: Attributes = Attributes::ATTRIBUTE_INDEX_0;
const DEVICE: Attributes = Attributes::ATTRIBUTE_INDEX_1;

/// Attribute bits which are RES1 for the EL3 translation regime, as we configure it.
///
/// From Arm ARM K.a, D8.4.1.2.1: "For a stage 1 translation that supports one Exception level,
/// AP\[1\] is RES1."
const EL3_RES1: Attributes = Attributes::USER;

/// Descriptor bit 5, selecting the Non-secure physical address space for secure stage 1
/// translations.
const NON_SECURE: Attributes = Attributes::from_bits_retain(1 << 5);

/// Attributes used for all mappings.
///
/// We always set the access flag, as we don't manage access flag faults.
const BASE: Attributes = EL3_RES1
    .union(Attributes::ACCESSED)
    .union(Attributes::VALID);

/// Attributes used for device mappings, always execute-never.
const MT_DEVICE: Attributes = DEVICE.union(BASE).union(Attributes::UXN);

/// Attributes used for regular memory mappings.
const MT_MEMORY: Attributes = NORMAL.union(BASE).union(Attributes::INNER_SHAREABLE);

/// Attributes used for code (i.e. text) mappings.
const MT_CODE: Attributes = MT_MEMORY.union(Attributes::READ_ONLY);

/// Attributes used for read-only data mappings.
const MT_RO_DATA: Attributes = MT_MEMORY
    .union(Attributes::READ_ONLY)
    .union(Attributes::UXN);

/// Attributes used for read-write data mappings.
const MT_RW_DATA: Attributes = MT_MEMORY.union(Attributes::UXN);

/// What kind of memory a region holds.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MemoryType {
    /// Executable code, always read-only.
    Code,
    /// Normal cacheable memory, never executable.
    Memory,
    /// Device registers.
    Device,
}

/// Whether a region may be written.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Access {
    /// Read-only.
    ReadOnly,
    /// Read-write.
    ReadWrite,
}

/// Which physical address space a region belongs to.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Security {
    /// Secure physical address space.
    Secure,
    /// Non-secure physical address space.
    NonSecure,
}

/// A region of the BL2 memory map. Regions are identity mapped.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct MmapRegion {
    /// Base physical address.
    pub base: usize,
    /// Size in bytes.
    pub size: usize,
    /// Kind of memory.
    pub memory_type: MemoryType,
    /// Write permission.
    pub access: Access,
    /// Security state.
    pub security: Security,
}

impl MmapRegion {
    /// Returns a secure, read-only, executable region.
    pub const fn code(base: usize, size: usize) -> Self {
        Self {
            base,
            size,
            memory_type: MemoryType::Code,
            access: Access::ReadOnly,
            security: Security::Secure,
        }
    }

    /// Returns a region of normal memory.
    pub const fn memory(base: usize, size: usize, access: Access, security: Security) -> Self {
        Self {
            base,
            size,
            memory_type: MemoryType::Memory,
            access,
            security,
        }
    }

    /// Returns a secure device region.
    pub const fn device(base: usize, size: usize) -> Self {
        Self {
            base,
            size,
            memory_type: MemoryType::Device,
            access: Access::ReadWrite,
            security: Security::Secure,
        }
    }

    /// Returns whether the two regions share at least one byte.
    pub fn overlaps(&self, other: &Self) -> bool {
        self.base < other.base.saturating_add(other.size)
            && other.base < self.base.saturating_add(self.size)
    }

    /// Returns the translation table attributes for this region.
    pub fn attributes(&self) -> Attributes {
        let attributes = match (self.memory_type, self.access) {
            (MemoryType::Code, _) => MT_CODE,
            (MemoryType::Memory, Access::ReadOnly) => MT_RO_DATA,
            (MemoryType::Memory, Access::ReadWrite) => MT_RW_DATA,
            (MemoryType::Device, Access::ReadOnly) => MT_DEVICE.union(Attributes::READ_ONLY),
            (MemoryType::Device, Access::ReadWrite) => MT_DEVICE,
        };
        match self.security {
            Security::Secure => attributes,
            Security::NonSecure => attributes.union(NON_SECURE),
        }
    }

    fn validate(&self) -> Result<(), MmapError> {
        let Self { base, size, .. } = *self;
        if size == 0 {
            return Err(MmapError::Empty { base });
        }
        if !base.is_multiple_of(GRANULE_SIZE) || !size.is_multiple_of(GRANULE_SIZE) {
            return Err(MmapError::Unaligned { base, size });
        }
        match base.checked_add(size) {
            Some(end) if end <= ADDRESS_SPACE_SIZE => {}
            _ => return Err(MmapError::OutOfAddressSpace { base, size }),
        }
        if self.memory_type == MemoryType::Code && self.access == Access::ReadWrite {
            return Err(MmapError::WritableCode { base });
        }
        Ok(())
    }
}

/// An invalid memory map.
#[derive(Clone, Copy, Debug, Eq, Error, PartialEq)]
pub enum MmapError {
    /// A region has size zero.
    #[error("Empty memory region at {base:#x}")]
    Empty {
        /// Base of the offending region.
        base: usize,
    },
    /// A region is not aligned to the translation granule.
    #[error("Memory region {base:#x} of size {size:#x} is not page aligned")]
    Unaligned {
        /// Base of the offending region.
        base: usize,
        /// Size of the offending region.
        size: usize,
    },
    /// A region extends past the translated address space.
    #[error("Memory region {base:#x} of size {size:#x} is outside the address space")]
    OutOfAddressSpace {
        /// Base of the offending region.
        base: usize,
        /// Size of the offending region.
        size: usize,
    },
    /// A code region was declared writable.
    #[error("Code region at {base:#x} is writable")]
    WritableCode {
        /// Base of the offending region.
        base: usize,
    },
    /// Two regions overlap.
    #[error("Memory region {new:x?} overlaps {existing:x?}")]
    Overlap {
        /// The region being added.
        new: MmapRegion,
        /// The region already in the map.
        existing: MmapRegion,
    },
    /// The map is full.
    #[error("Too many memory regions")]
    TooManyRegions,
    /// The page table builder rejected a region.
    #[error("Failed to map memory region at {base:#x}")]
    Map {
        /// Base of the offending region.
        base: usize,
    },
}

/// A declarative list of non-overlapping memory regions.
#[derive(Clone, Debug, Default)]
pub struct MemoryMap {
    regions: ArrayVec<MmapRegion, MAX_MMAP_REGIONS>,
}

impl MemoryMap {
    /// Creates an empty memory map.
    pub const fn new() -> Self {
        Self {
            regions: ArrayVec::new_const(),
        }
    }

    /// Adds a region to the map, after checking it against the regions already declared.
    pub fn add_region(&mut self, region: MmapRegion) -> Result<(), MmapError> {
        region.validate()?;
        if let Some(existing) = self.regions.iter().find(|existing| existing.overlaps(&region)) {
            return Err(MmapError::Overlap {
                new: region,
                existing: *existing,
            });
        }
        self.regions
            .try_push(region)
            .map_err(|_| MmapError::TooManyRegions)
    }

    /// Returns the declared regions, in declaration order.
    pub fn regions(&self) -> &[MmapRegion] {
        &self.regions
    }

    /// Returns whether any declared region contains `address`.
    #[cfg(test)]
    pub fn contains(&self, address: usize) -> bool {
        self.regions
            .iter()
            .any(|region| region.base <= address && address - region.base < region.size)
    }
}

/// Builds identity-mapped translation tables for every region of `map` and enables the MMU with
/// them.
///
/// Every address BL2 touches after this point must be in one of the declared regions.
pub fn configure_mmu(
    map: &MemoryMap,
    pages: &'static mut [PageTable],
) -> Result<IdMap, MmapError> {
    let mut idmap = IdMap::new(pages);
    for region in map.regions() {
        idmap.map_region(region)?;
    }
    trace!("Page table: {idmap:?}");

    #[cfg(all(target_arch = "aarch64", not(test)))]
    {
        use arm_sysregs::SctlrEl3;

        info!("Enabling MMU");
        // SAFETY: BL2 code, data and stack are identity mapped with the attributes they are
        // already used with, so turning on translation doesn't change the meaning of any address
        // in use.
        unsafe {
            enable_mmu(
                idmap.root_address().0,
                (SctlrEl3::M | SctlrEl3::C | SctlrEl3::WXN).bits(),
                0,
            );
        }
        idmap.mark_active();
    }
    info!("Page table activated.");

    Ok(idmap)
}

/// Enables the MMU on the current core.
///
/// Sets `MAIR_EL3`, `TCR_EL3` and `TTBR0_EL3` then sets
/// `SCTLR_EL3 = (SCTLR_EL3 | sctlr_set) & !sctlr_clear`.
#[cfg(all(target_arch = "aarch64", not(test)))]
#[unsafe(naked)]
unsafe extern "C" fn enable_mmu(ttbr: usize, sctlr_set: u64, sctlr_clear: u64) {
    crate::naked_asm!(
        "tlbi	alle3

        ldr	x3, ={mair}
        msr	mair_el3, x3

        ldr	x3, ={tcr}
        msr	tcr_el3, x3

        msr	ttbr0_el3, x0

        dsb	sy
        isb

        mrs	x3, sctlr_el3

        orr	x3, x3, x1
        bic	x3, x3, x2

        msr	sctlr_el3, x3

        isb
        ret",
        mair = const MAIR.0,
        tcr = const TCR,
    )
}

struct IdTranslation {
    /// Pages which can be allocated for page tables.
    pages: &'static mut [PageTable],
    /// Record of which `pages` are currently allocated.
    allocated: [bool; PAGE_HEAP_PAGE_COUNT],
}

impl Debug for IdTranslation {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.debug_struct("IdTranslation")
            .field("pages", &self.pages.len())
            .field("allocated", &self.allocated)
            .finish()
    }
}

impl IdTranslation {
    fn virtual_to_physical(va: VirtualAddress) -> PhysicalAddress {
        // Physical address is the same as the virtual address because we are using identity mapping
        // everywhere.
        PhysicalAddress(va.0)
    }
}

impl Translation for IdTranslation {
    fn allocate_table(&mut self) -> (NonNull<PageTable>, PhysicalAddress) {
        let index = self
            .allocated
            .iter()
            .zip(self.pages.iter())
            .position(|(&allocated, _)| !allocated)
            .expect("Failed to allocate page table");
        self.allocated[index] = true;
        let table = NonNull::from(&mut self.pages[index]);
        (
            table,
            Self::virtual_to_physical(VirtualAddress(table.as_ptr() as usize)),
        )
    }

    unsafe fn deallocate_table(&mut self, page_table: NonNull<PageTable>) {
        let index =
            (page_table.addr().get() - &raw const self.pages[0] as usize) / size_of::<PageTable>();
        self.allocated[index] = false;
    }

    fn physical_to_virtual(&self, page_table_pa: PhysicalAddress) -> NonNull<PageTable> {
        NonNull::new(page_table_pa.0 as *mut PageTable)
            .expect("Got physical address 0 for pagetable")
    }
}

/// Identity-mapped EL3 translation tables.
#[derive(Debug)]
pub struct IdMap {
    mapping: Mapping<IdTranslation>,
}

impl IdMap {
    fn new(pages: &'static mut [PageTable]) -> Self {
        Self {
            mapping: Mapping::new(
                IdTranslation {
                    pages,
                    allocated: [false; PAGE_HEAP_PAGE_COUNT],
                },
                0,
                ROOT_LEVEL,
                TranslationRegime::El3,
                VaRange::Lower,
            ),
        }
    }

    #[cfg_attr(test, allow(unused))]
    fn mark_active(&mut self) {
        self.mapping.mark_active();
    }

    /// Returns the physical address of the root table.
    pub fn root_address(&self) -> PhysicalAddress {
        self.mapping.root_address()
    }

    fn map_region(&mut self, region: &MmapRegion) -> Result<(), MmapError> {
        let attributes = region.attributes();
        let range = MemoryRegion::new(region.base, region.base + region.size);
        debug!("Mapping {range} as {attributes:?}.");
        let pa = IdTranslation::virtual_to_physical(range.start());
        self.mapping
            .map_range(&range, pa, attributes, Constraints::empty())
            .map_err(|e| {
                error!("Error mapping {range}: {e}");
                MmapError::Map { base: region.base }
            })
    }
}
