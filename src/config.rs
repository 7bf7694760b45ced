// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! Build-time configuration of BL2.

/// The secure payload BL2 prepares.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SecurePayload {
    /// OP-TEE, loaded as a header image which is split into a pager and a paged image.
    OpTee,
    /// SP_MIN, preloaded into SYSRAM.
    SpMin,
}

/// Configuration of the boot flow.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Bl2Config {
    /// The secure payload to prepare.
    pub payload: SecurePayload,
}

impl Bl2Config {
    /// The configuration selected by cargo features.
    pub const BUILD: Self = Self {
        payload: if cfg!(feature = "optee") {
            SecurePayload::OpTee
        } else {
            SecurePayload::SpMin
        },
    };
}
