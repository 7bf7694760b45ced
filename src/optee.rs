// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! Parsing of the OP-TEE combined image header, which describes how to split the loaded secure OS
//! into a pager and a paged image.

use crate::image::{EntryPointInfo, ExecutionState, ImageInfo};
use log::{info, warn};
use thiserror::Error;
use zerocopy::{FromBytes, Immutable, KnownLayout};

/// "OPTE" in little-endian.
const OPTEE_MAGIC: u32 = 0x4554_504f;
const OPTEE_VERSION: u8 = 2;
const OPTEE_MAX_IMAGES: u32 = 2;
const OPTEE_PAGER_IMAGE_ID: u32 = 0;
const OPTEE_PAGED_IMAGE_ID: u32 = 1;
const OPTEE_ARCH_ARM32: u8 = 0;
/// Load address meaning "wherever the loader reserved space".
const DEFAULT_LOAD_ADDRESS: u64 = u64::MAX;

/// The fixed part of the header. Fields are in the byte order of the target, which is always
/// little-endian.
#[derive(Clone, Debug, Eq, FromBytes, Immutable, KnownLayout, PartialEq)]
#[repr(C)]
struct OpteeHeader {
    magic: u32,
    version: u8,
    arch: u8,
    flags: u16,
    nb_images: u32,
}

/// One entry of the image list following [`OpteeHeader`].
#[derive(Clone, Debug, Eq, FromBytes, Immutable, KnownLayout, PartialEq)]
#[repr(C)]
struct OpteeImage {
    load_addr_hi: u32,
    load_addr_lo: u32,
    image_id: u32,
    size: u32,
}

impl OpteeImage {
    fn load_address(&self) -> u64 {
        (u64::from(self.load_addr_hi) << 32) | u64::from(self.load_addr_lo)
    }
}

/// An error parsing the OP-TEE header.
#[derive(Clone, Copy, Debug, Eq, Error, PartialEq)]
pub enum OpteeError {
    /// The image has no header, so it can't be split into pager and paged images.
    #[error("OP-TEE image has no header")]
    NoHeader,
    /// The magic number matched but the rest of the header is unsupported.
    #[error("Invalid OP-TEE header: version {version}, {nb_images} images")]
    InvalidHeader {
        /// The header version.
        version: u8,
        /// The number of images the header claims.
        nb_images: u32,
    },
    /// The header or its image list extends past the loaded data.
    #[error("OP-TEE header is truncated")]
    Truncated,
    /// An image entry has an id other than pager or paged.
    #[error("Unknown OP-TEE image id {0}")]
    UnknownImage(u32),
    /// An image is empty or its end address overflows.
    #[error("OP-TEE image at {start:#x} with size {size:#x} overflows")]
    Overflow {
        /// The requested load address.
        start: u64,
        /// The requested size.
        size: u32,
    },
    /// An image doesn't fit in the area reserved for it.
    #[error("OP-TEE image {start:#x}-{end:#x} is not in the reserved area {base:#x}-{limit:#x}")]
    OutOfReservedArea {
        /// The requested load address.
        start: u64,
        /// The requested end address, inclusive.
        end: u64,
        /// The start of the reserved area.
        base: usize,
        /// The end of the reserved area, inclusive.
        limit: usize,
    },
}

fn validate(header: &OpteeHeader) -> Result<(), OpteeError> {
    if header.version == OPTEE_VERSION && (1..=OPTEE_MAX_IMAGES).contains(&header.nb_images) {
        Ok(())
    } else {
        Err(OpteeError::InvalidHeader {
            version: header.version,
            nb_images: header.nb_images,
        })
    }
}

/// Checks that the image described by `entry` fits in the area reserved by `image_info`, then
/// records its final location in `image_info`.
fn place_image(image_info: &mut ImageInfo, entry: &OpteeImage) -> Result<(), OpteeError> {
    let start = match entry.load_address() {
        DEFAULT_LOAD_ADDRESS => image_info.base as u64,
        address => address,
    };
    let size = entry.size;

    let limit = image_info
        .max_size
        .checked_sub(1)
        .and_then(|last| image_info.base.checked_add(last))
        .ok_or(OpteeError::Overflow {
            start: image_info.base as u64,
            size,
        })?;
    let end = u64::from(size)
        .checked_sub(1)
        .and_then(|last| start.checked_add(last))
        .ok_or(OpteeError::Overflow { start, size })?;

    if start < image_info.base as u64 || end > limit as u64 {
        warn!(
            "The load address in OP-TEE header {start:#x} - {end:#x} is not in reserved area: \
             {:#x} - {limit:#x}.",
            image_info.base
        );
        return Err(OpteeError::OutOfReservedArea {
            start,
            end,
            base: image_info.base,
            limit,
        });
    }

    // The checks above guarantee that `start` fits within the reserved area.
    image_info.base = start as usize;
    image_info.size = size as usize;
    Ok(())
}

/// Parses the OP-TEE header at the start of `header_image`, the loaded BL32 image.
///
/// `pager` and `paged` hold the areas reserved for the two images on entry, and their final
/// location on success. The header entry point is redirected to the pager, with the paged image
/// location in its first two arguments.
pub fn parse_optee_header(
    header_image: &[u8],
    header_ep: &mut EntryPointInfo,
    pager: &mut ImageInfo,
    paged: &mut ImageInfo,
) -> Result<ExecutionState, OpteeError> {
    let (header, mut entries) =
        OpteeHeader::read_from_prefix(header_image).map_err(|_| OpteeError::Truncated)?;

    info!("OP-TEE ep={:#x}", header_ep.pc);
    info!(
        "OP-TEE header info: magic={:#x} version={:#x} arch={:#x} flags={:#x} nb_images={}",
        header.magic, header.version, header.arch, header.flags, header.nb_images
    );

    if header.magic != OPTEE_MAGIC {
        warn!("Not a known TEE, no header to split.");
        return Err(OpteeError::NoHeader);
    }
    validate(&header)?;

    for _ in 0..header.nb_images {
        let (entry, rest) =
            OpteeImage::read_from_prefix(entries).map_err(|_| OpteeError::Truncated)?;
        entries = rest;
        match entry.image_id {
            OPTEE_PAGER_IMAGE_ID => place_image(pager, &entry)?,
            OPTEE_PAGED_IMAGE_ID => place_image(paged, &entry)?,
            id => return Err(OpteeError::UnknownImage(id)),
        }
    }

    header_ep.pc = pager.base;
    header_ep.args[0] = paged.base as u64;
    header_ep.args[1] = paged.size as u64;

    let execution_state = if header.arch == OPTEE_ARCH_ARM32 {
        ExecutionState::AArch32
    } else {
        ExecutionState::AArch64
    };
    header_ep.execution_state = execution_state;
    Ok(execution_state)
}
