// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! Access to 32-bit memory-mapped control registers.

use core::hint::spin_loop;

/// Read and write access to 32-bit memory-mapped registers.
///
/// Each individual access is assumed to be atomic. Methods take `&self` as the state lives in the
/// hardware rather than in the implementing type.
pub trait Mmio {
    /// Reads the 32-bit register at `address`.
    fn read_32(&self, address: usize) -> u32;

    /// Writes `value` to the 32-bit register at `address`.
    fn write_32(&self, address: usize, value: u32);

    /// Sets `bits` in the register at `address`, leaving the other bits unchanged.
    fn setbits_32(&self, address: usize, bits: u32) {
        self.write_32(address, self.read_32(address) | bits);
    }

    /// Clears `bits` in the register at `address`, leaving the other bits unchanged.
    fn clrbits_32(&self, address: usize, bits: u32) {
        self.write_32(address, self.read_32(address) & !bits);
    }

    /// Clears `clear` and then sets `set` in the register at `address` with a single write.
    fn clrsetbits_32(&self, address: usize, clear: u32, set: u32) {
        self.write_32(address, (self.read_32(address) & !clear) | set);
    }

    /// Spins until every bit of `bits` in the register at `address` reads as set, if `set` is
    /// true, or as clear otherwise.
    ///
    /// There is no timeout: hardware which never updates the bits hangs the boot.
    fn wait_for_bits(&self, address: usize, bits: u32, set: bool) {
        loop {
            let value = self.read_32(address) & bits;
            if (set && value == bits) || (!set && value == 0) {
                return;
            }
            spin_loop();
        }
    }
}

/// Volatile accesses to physical registers.
#[derive(Debug)]
pub struct DirectMmio {
    _private: (),
}

impl DirectMmio {
    /// Creates a new register accessor.
    ///
    /// # Safety
    ///
    /// Every address later passed to the accessor must be a 4-byte aligned device register which
    /// is mapped (or reachable with the MMU off) and which it is sound to access from BL2.
    pub const unsafe fn new() -> Self {
        Self { _private: () }
    }
}

impl Mmio for DirectMmio {
    fn read_32(&self, address: usize) -> u32 {
        // SAFETY: The caller of `DirectMmio::new` promised that the address is a valid register.
        unsafe { (address as *const u32).read_volatile() }
    }

    fn write_32(&self, address: usize, value: u32) {
        // SAFETY: The caller of `DirectMmio::new` promised that the address is a valid register.
        unsafe { (address as *mut u32).write_volatile(value) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::test::FakeMmio;

    #[test]
    fn read_modify_write() {
        let mmio = FakeMmio::new();
        mmio.write_32(0x100, 0xf0);

        mmio.setbits_32(0x100, 0x0f);
        assert_eq!(mmio.read_32(0x100), 0xff);

        mmio.clrbits_32(0x100, 0x3c);
        assert_eq!(mmio.read_32(0x100), 0xc3);

        mmio.clrsetbits_32(0x100, 0xc0, 0x10);
        assert_eq!(mmio.read_32(0x100), 0x13);
    }

    #[test]
    fn wait_for_delayed_bit() {
        let mmio = FakeMmio::new();
        mmio.delay_bits(0x40, 1 << 3, 5);
        mmio.setbits_32(0x40, 1 << 3);

        mmio.wait_for_bits(0x40, 1 << 3, true);
        // One read for the read-modify-write, five stale polls and the one that sees the bit.
        assert_eq!(mmio.reads(0x40), 7);

        mmio.clrbits_32(0x40, 1 << 3);
        mmio.wait_for_bits(0x40, 1 << 3, false);
        assert_eq!(mmio.read_32(0x40), 0);
    }
}
