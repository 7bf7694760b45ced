// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

pub fn bl_code_base() -> usize {
    0x2ffd_2000
}

pub fn bl_code_end() -> usize {
    0x2ffd_c000
}

pub fn bl_rw_base() -> usize {
    0x2ffd_c000
}

pub fn bl_rw_end() -> usize {
    0x2ffe_7000
}
