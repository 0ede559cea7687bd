//! Defines the memory interface shared by all bus-attached devices.

use std::fmt::Debug;

/// Byte-addressable interface exposed by every device attached to the system bus.
///
/// Addresses are offsets relative to wherever the device is mapped, values are little-endian.
///
/// Each access reports whether it succeeded: reads return `None` and writes return `false` when
/// the device does not accept the `(address, size)` pair. A failed access is turned into an access
/// fault by the core, it never aborts the simulation. Implementors must handle *every* input
/// without panicking, including accesses that run past the end of the device.
///
/// Devices may decide which alignments they support. The core itself never issues misaligned
/// halfword or word accesses, since those are caught as address-misaligned exceptions first.
pub trait Bus: Debug {
    /// Read a single byte at `address`.
    fn read_byte(&mut self, address: u32) -> Option<u8>;

    /// Read a halfword at `address`.
    fn read_halfword(&mut self, address: u32) -> Option<u16>;

    /// Read a word at `address`.
    fn read_word(&mut self, address: u32) -> Option<u32>;

    /// Write a single byte at `address`, returning `true` on success.
    fn write_byte(&mut self, address: u32, value: u8) -> bool;

    /// Write a halfword at `address`, returning `true` on success.
    fn write_halfword(&mut self, address: u32, value: u16) -> bool;

    /// Write a word at `address`, returning `true` on success.
    fn write_word(&mut self, address: u32, value: u32) -> bool;
}

impl<B: Bus + ?Sized> Bus for &mut B {
    fn read_byte(&mut self, address: u32) -> Option<u8> {
        (**self).read_byte(address)
    }

    fn read_halfword(&mut self, address: u32) -> Option<u16> {
        (**self).read_halfword(address)
    }

    fn read_word(&mut self, address: u32) -> Option<u32> {
        (**self).read_word(address)
    }

    fn write_byte(&mut self, address: u32, value: u8) -> bool {
        (**self).write_byte(address, value)
    }

    fn write_halfword(&mut self, address: u32, value: u16) -> bool {
        (**self).write_halfword(address, value)
    }

    fn write_word(&mut self, address: u32, value: u32) -> bool {
        (**self).write_word(address, value)
    }
}
