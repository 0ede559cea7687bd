//! General purpose registers.

use core::fmt;
use std::fmt::Formatter;

/// The type of a single `x` register.
pub type X = u32;

/// The bit width of the `x` registers.
pub const XLEN: u32 = X::BITS;

/// The number of `x` registers available (indices start at `0` for `x0`)
pub const LEN: u8 = 32;

/// ABI mnemonics of the `x` registers, indexed by register number.
const ABI_NAMES: [&str; LEN as usize] = [
    "zero", "ra", "sp", "gp", "tp", "t0", "t1", "t2", "s0", "s1", "a0", "a1", "a2", "a3", "a4",
    "a5", "a6", "a7", "s2", "s3", "s4", "s5", "s6", "s7", "s8", "s9", "s10", "s11", "t3", "t4",
    "t5", "t6",
];

/// A RISC-V hart's general purpose registers.
///
/// There are 32 `x` word-size (32 bit) registers, named `x0` up to `x31`.
/// The register `x0` (aka `zero`) is always zero. Writes to it are ignored.
/// There is also the `pc` register which holds the Program Counter (also 32 bits).
///
/// > For RV32I, the 32 x registers are each 32 bits wide, i.e., XLEN=32. Register x0 is hardwired
/// > with all bits equal to 0.
///
/// It is not possible to get a mutable reference to an `x` register, since that would allow
/// unchecked writes to register `x0`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registers {
    x_registers: [X; LEN as usize],
    pc: u32,
}

impl Default for Registers {
    fn default() -> Self {
        Self::new(0)
    }
}

impl Registers {
    /// Returns a fresh set of all-zero registers, with the `pc` set to `initial_pc`.
    pub fn new(initial_pc: u32) -> Self {
        Self {
            x_registers: [0; LEN as usize],
            pc: initial_pc,
        }
    }

    /// Returns the value of an `x` register.
    pub fn x(&self, specifier: Specifier) -> u32 {
        self.x_registers[usize::from(specifier)]
    }

    /// Sets the value of an `x` register.
    ///
    /// Writes to register `x0` are ignored.
    pub fn set_x(&mut self, specifier: Specifier, value: u32) {
        if specifier != Specifier::X0 {
            self.x_registers[usize::from(specifier)] = value;
        }
    }

    /// Returns the value of the `pc` register.
    pub fn pc(&self) -> u32 {
        self.pc
    }

    /// Returns a mutable reference to the `pc` register value.
    pub fn pc_mut(&mut self) -> &mut u32 {
        &mut self.pc
    }
}

/// An `x` register specifier. Can take values in the range `0..LEN`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Specifier(u8);

impl Specifier {
    /// Register `x0`, a.k.a. register `zero`, always returns `0` on read, and ignores any writes.
    pub const X0: Self = Specifier(0);
    /// Return address, `x1`.
    pub const RA: Self = Specifier(1);
    /// Stack pointer, `x2`.
    pub const SP: Self = Specifier(2);
    /// Saved register / frame pointer, `x8`.
    pub const S0: Self = Specifier(8);
    /// First argument / return value register, `x10`.
    pub const A0: Self = Specifier(10);
    /// Second argument / return value register, `x11`.
    pub const A1: Self = Specifier(11);

    /// Create a register specifier from its index, returning `None` if `index > 31`.
    pub fn new<U: TryInto<u8>>(index: U) -> Option<Self> {
        let index = index.try_into().ok()?;
        (index < LEN).then_some(Self(index))
    }

    /// Convert a 5-bit value into a register specifier.
    /// Only the five least significant bits of `value_u5` are used.
    pub fn from_u5(value_u5: u8) -> Self {
        const_assert_eq!(LEN, 32);
        Self(value_u5 & 0x1F)
    }

    /// Convert a 3-bit compressed register field (`rd'`, `rs1'`, `rs2'`) into the register it
    /// denotes, one of `x8..=x15`.
    pub fn from_compressed_u3(value_u3: u8) -> Self {
        Self((value_u3 & 0b111) + 8)
    }

    /// Convert a 3-bit Zcmp `sreg` field into the saved register it denotes.
    ///
    /// Values `0` and `1` map to `s0` and `s1` (`x8`, `x9`), values `2..=7` to `s2..=s7`
    /// (`x18..=x23`).
    pub fn from_saved_u3(value_u3: u8) -> Self {
        let value_u3 = value_u3 & 0b111;
        if value_u3 & 0b110 != 0 {
            Self(value_u3 + 16)
        } else {
            Self(value_u3 + 8)
        }
    }

    /// Return an iterator over all register specifier, starting at x0 up to x31.
    pub fn iter_all() -> impl Iterator<Item = Self> {
        (0..LEN).map(Self)
    }

    /// Returns the ABI mnemonic of this register, e.g. `"sp"` for `x2`.
    pub fn abi_name(self) -> &'static str {
        ABI_NAMES[self.0 as usize]
    }
}

impl From<Specifier> for u8 {
    fn from(value: Specifier) -> Self {
        value.0
    }
}

impl From<Specifier> for u32 {
    fn from(value: Specifier) -> Self {
        value.0 as u32
    }
}

impl From<Specifier> for usize {
    fn from(value: Specifier) -> Self {
        value.0 as usize
    }
}

impl fmt::Display for Specifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "x{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants() {
        assert_eq!(32, XLEN);
        const_assert!(LEN > 1);
    }

    #[test]
    fn test_write_to_zero() {
        let mut registers = Registers::default();
        assert_eq!(0, registers.x(Specifier::X0));
        registers.set_x(Specifier::X0, 0xDEADBEEF);
        assert_eq!(0, registers.x(Specifier::X0));
        assert_eq!(0, registers.pc());
    }

    #[test]
    fn test_set_x() {
        let mut registers = Registers::new(0x40);
        for specifier in Specifier::iter_all() {
            registers.set_x(specifier, u32::from(specifier) + 1);
        }
        assert_eq!(0, registers.x(Specifier::X0));
        for i in 1..LEN {
            assert_eq!(i as u32 + 1, registers.x(Specifier::from_u5(i)));
        }
        assert_eq!(0x40, registers.pc());
    }

    #[test]
    fn test_compressed_specifiers() {
        assert_eq!(Specifier::S0, Specifier::from_compressed_u3(0));
        assert_eq!(Specifier::new(15).unwrap(), Specifier::from_compressed_u3(7));
        assert_eq!(Specifier::S0, Specifier::from_saved_u3(0));
        assert_eq!(Specifier::new(9).unwrap(), Specifier::from_saved_u3(1));
        assert_eq!(Specifier::new(18).unwrap(), Specifier::from_saved_u3(2));
        assert_eq!(Specifier::new(23).unwrap(), Specifier::from_saved_u3(7));
    }

    #[test]
    fn test_names() {
        assert_eq!("zero", Specifier::X0.abi_name());
        assert_eq!("sp", Specifier::SP.abi_name());
        assert_eq!("s11", Specifier::new(27).unwrap().abi_name());
        assert_eq!("t6", Specifier::new(31).unwrap().abi_name());
        assert_eq!("x10", Specifier::A0.to_string());
        assert_eq!(None, Specifier::new(32));
    }
}
