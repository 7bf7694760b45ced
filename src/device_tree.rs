// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! Board information queried from the flattened device tree.

use fdt::{Fdt, FdtError, node::FdtNode};
use thiserror::Error;

/// The stdout UART as described by the device tree.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct UartInfo {
    /// Base address of the UART registers.
    pub base: usize,
    /// Clock identifier, if the node references a clock.
    pub clock: Option<u32>,
    /// Reset line identifier, if the node references a reset.
    pub reset: Option<u32>,
    /// Whether the node status is "okay".
    pub enabled: bool,
}

/// The device tree blob could not be opened.
#[derive(Clone, Copy, Debug, Eq, Error, PartialEq)]
pub enum DtError {
    /// The blob doesn't start with the FDT magic number.
    #[error("Device tree has a bad magic number")]
    BadMagic,
    /// The blob pointer is null.
    #[error("Device tree pointer is invalid")]
    BadPointer,
    /// The blob is shorter than its header claims.
    #[error("Device tree is truncated")]
    Truncated,
    /// The platform drivers rejected the blob.
    #[error("Device tree is not compatible with the platform")]
    Incompatible,
}

impl From<FdtError> for DtError {
    fn from(error: FdtError) -> Self {
        match error {
            FdtError::BadMagic => Self::BadMagic,
            FdtError::BadPtr => Self::BadPointer,
            FdtError::BufferTooSmall => Self::Truncated,
        }
    }
}

/// The device tree queries BL2 needs.
pub trait DeviceTree {
    /// Returns the UART selected by `/chosen/stdout-path`, if any.
    fn stdout_uart(&self) -> Option<UartInfo>;

    /// Returns the board model string, if present.
    fn board_model(&self) -> Option<&str>;
}

/// A [`DeviceTree`] backed by a flattened device tree blob.
pub struct FdtDeviceTree<'a> {
    fdt: Fdt<'a>,
}

impl<'a> FdtDeviceTree<'a> {
    /// Opens and validates the blob in `data`.
    pub fn new(data: &'a [u8]) -> Result<Self, DtError> {
        Ok(Self {
            fdt: Fdt::new(data)?,
        })
    }

    /// Opens and validates the blob at `address`.
    ///
    /// # Safety
    ///
    /// `address` must point to readable memory at least as large as the size in the blob header,
    /// which is not modified for the lifetime `'a`.
    pub unsafe fn from_address(address: usize) -> Result<Self, DtError> {
        // SAFETY: The caller guarantees that the blob is readable and immutable.
        let fdt = unsafe { Fdt::from_ptr(address as *const u8) }?;
        Ok(Self { fdt })
    }

    fn stdout_node(&self) -> Option<FdtNode<'_, 'a>> {
        let stdout_path = self
            .fdt
            .find_node("/chosen")?
            .property("stdout-path")?
            .as_str()?;
        // Options such as the baud rate follow a colon.
        let path = stdout_path.split(':').next()?;
        if path.starts_with('/') {
            self.fdt.find_node(path)
        } else {
            let resolved = self.fdt.find_node("/aliases")?.property(path)?.as_str()?;
            self.fdt.find_node(resolved)
        }
    }
}

/// Returns whether the node's status allows it to be used. A missing status means enabled.
fn is_enabled(node: &FdtNode) -> bool {
    node.property("status")
        .and_then(|status| status.as_str())
        .is_none_or(|status| status == "okay" || status == "ok")
}

/// Returns the specifier following the phandle of the first entry of a single-cell
/// `clocks`/`resets` style property.
fn first_specifier(node: &FdtNode, name: &str) -> Option<u32> {
    let value = node.property(name)?.value;
    let cell = value.get(4..8)?;
    Some(u32::from_be_bytes(cell.try_into().ok()?))
}

impl DeviceTree for FdtDeviceTree<'_> {
    fn stdout_uart(&self) -> Option<UartInfo> {
        let node = self.stdout_node()?;
        let base = node.reg()?.next()?.starting_address as usize;
        Some(UartInfo {
            base,
            clock: first_specifier(&node, "clocks"),
            reset: first_specifier(&node, "resets"),
            enabled: is_enabled(&node),
        })
    }

    fn board_model(&self) -> Option<&str> {
        self.fdt.find_node("/")?.property("model")?.as_str()
    }
}
