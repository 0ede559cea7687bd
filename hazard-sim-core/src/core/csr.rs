//! Specifiers for all CSRs known to the hart.
//!
//! Supervisor-mode, floating-point and debug-mode CSRs are not implemented. Accessing any CSR not
//! listed here raises an illegal instruction exception.

use crate::RawPrivilegeLevel;

/// General 12-bit value representing a CSR specifier. Note that this can hold any 12-bit value,
/// even if the value represents an unsupported or non-existent CSR.
pub type CsrSpecifier = u16;

//
// Unprivileged counters (`0xC00`, `0xC02`, `0xC80`, `0xC82`).
//
/// Cycle counter for RDCYCLE instruction.
pub const CYCLE: CsrSpecifier = 0xC00;
/// Instructions-retired counter for RDINSTRET instruction.
pub const INSTRET: CsrSpecifier = 0xC02;
/// Upper 32 bits of [`CYCLE`], RV32 only.
pub const CYCLEH: CsrSpecifier = 0xC80;
/// Upper 32 bits of [`INSTRET`], RV32 only.
pub const INSTRETH: CsrSpecifier = 0xC82;

//
// Machine information registers (`0xF11..=0xF15`).
//
/// Vendor ID.
pub const MVENDORID: CsrSpecifier = 0xF11;
/// Architecture ID.
pub const MARCHID: CsrSpecifier = 0xF12;
/// Implementation ID.
pub const MIMPID: CsrSpecifier = 0xF13;
/// Hardware thread ID.
pub const MHARTID: CsrSpecifier = 0xF14;
/// Pointer to configuration data structure.
pub const MCONFIGPTR: CsrSpecifier = 0xF15;

//
// Machine trap setup (`0x300..=0x306`, `0x310`).
//
/// Machine status register.
pub const MSTATUS: CsrSpecifier = 0x300;
/// ISA and extensions.
pub const MISA: CsrSpecifier = 0x301;
/// Machine interrupt-enable register.
pub const MIE: CsrSpecifier = 0x304;
/// Machine trap-handler base address.
pub const MTVEC: CsrSpecifier = 0x305;
/// Machine counter enable.
pub const MCOUNTEREN: CsrSpecifier = 0x306;
/// Additional machine status register, RV32 only.
pub const MSTATUSH: CsrSpecifier = 0x310;

//
// Machine trap handling (`0x340..=0x344`).
//
/// Scratch register for machine trap handlers.
pub const MSCRATCH: CsrSpecifier = 0x340;
/// Machine exception program counter.
pub const MEPC: CsrSpecifier = 0x341;
/// Machine trap cause.
pub const MCAUSE: CsrSpecifier = 0x342;
/// Machine bad address or instruction.
pub const MTVAL: CsrSpecifier = 0x343;
/// Machine interrupt pending.
pub const MIP: CsrSpecifier = 0x344;

//
// Machine memory protection (`0x3A0..=0x3A3`, `0x3B0..=0x3BF`).
//
/// First physical memory protection configuration register, regions 0 to 3.
pub const PMPCFG0: CsrSpecifier = 0x3A0;
/// Last physical memory protection configuration register, regions 12 to 15.
pub const PMPCFG3: CsrSpecifier = 0x3A3;
/// First physical memory protection address register.
pub const PMPADDR0: CsrSpecifier = 0x3B0;
/// Last physical memory protection address register.
pub const PMPADDR15: CsrSpecifier = 0x3BF;

//
// Machine counters/timers (`0xB00..=0xB1F`, `0xB80..=0xB9F`).
//
/// Machine cycle counter.
pub const MCYCLE: CsrSpecifier = 0xB00;
/// Machine instructions-retired counter.
pub const MINSTRET: CsrSpecifier = 0xB02;
/// First machine performance-monitoring counter.
pub const MHPMCOUNTER3: CsrSpecifier = 0xB03;
/// Last machine performance-monitoring counter.
pub const MHPMCOUNTER31: CsrSpecifier = 0xB1F;
/// Upper 32 bits of [`MCYCLE`], RV32 only.
pub const MCYCLEH: CsrSpecifier = 0xB80;
/// Upper 32 bits of [`MINSTRET`], RV32 only.
pub const MINSTRETH: CsrSpecifier = 0xB82;
/// Upper 32 bits of [`MHPMCOUNTER3`], RV32 only.
pub const MHPMCOUNTER3H: CsrSpecifier = 0xB83;
/// Upper 32 bits of [`MHPMCOUNTER31`], RV32 only.
pub const MHPMCOUNTER31H: CsrSpecifier = 0xB9F;

//
// Machine counter setup (`0x320`, `0x323..=0x33F`).
//
/// Machine counter-inhibit register.
pub const MCOUNTINHIBIT: CsrSpecifier = 0x320;
/// First machine performance-monitoring event selector.
pub const MHPMEVENT3: CsrSpecifier = 0x323;
/// Last machine performance-monitoring event selector.
pub const MHPMEVENT31: CsrSpecifier = 0x33F;

//
// Debug/trace registers (`0x7A0..=0x7A2`, `0x7A4..=0x7A5`).
//
/// Debug/trace trigger register select.
pub const TSELECT: CsrSpecifier = 0x7A0;
/// First debug/trace trigger data register.
pub const TDATA1: CsrSpecifier = 0x7A1;
/// Second debug/trace trigger data register.
pub const TDATA2: CsrSpecifier = 0x7A2;
/// Trigger info.
pub const TINFO: CsrSpecifier = 0x7A4;
/// Trigger control.
pub const TCONTROL: CsrSpecifier = 0x7A5;

//
// Hazard3 custom machine registers (`0xBD0`, `0xBE0..=0xBE5`, `0xBF0`).
//
/// PMP regions enforced in M-mode even when unlocked.
pub const PMPCFGM0: CsrSpecifier = 0xBD0;
/// External interrupt enable array.
pub const MEIEA: CsrSpecifier = 0xBE0;
/// External interrupt pending array.
pub const MEIPA: CsrSpecifier = 0xBE1;
/// External interrupt force array.
pub const MEIFA: CsrSpecifier = 0xBE2;
/// External interrupt priority array.
pub const MEIPRA: CsrSpecifier = 0xBE3;
/// Next external interrupt.
pub const MEINEXT: CsrSpecifier = 0xBE4;
/// External interrupt context register.
pub const MEICONTEXT: CsrSpecifier = 0xBE5;
/// Sleep control register.
pub const MSLEEP: CsrSpecifier = 0xBF0;

/// Returns `true` if `specifier` is valid, which is the case if it fits in 12 bits.
pub fn is_valid(specifier: CsrSpecifier) -> bool {
    specifier < 1 << 12
}

/// Returns `true` if this CSR only supports read access.
///
/// Requires [`is_valid(specifier)`](is_valid), otherwise the return value is undefined.
pub fn is_read_only(specifier: CsrSpecifier) -> bool {
    // The top two bits of a CSR specifier indicate whether the CSR is read-only (0b11) or
    // read/write (0b00, 0b01, 0b10)
    specifier >> 10 == 0b11
}

/// Returns the minimum required privilege level to access this CSR.
///
/// Requires [`is_valid(specifier)`](is_valid), otherwise the return value is undefined.
pub fn required_privilege_level(specifier: CsrSpecifier) -> RawPrivilegeLevel {
    // Bits `9:8` indicate the minimum required privilege level
    RawPrivilegeLevel::from_u2(((specifier >> 8) & 0b11) as u8)
}

/// Returns `true` for the array CSRs of the external interrupt controller, whose write data
/// selects the window that is read.
pub fn is_indexed(specifier: CsrSpecifier) -> bool {
    (MEIEA..=MEIPRA).contains(&specifier)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_only() {
        assert!(is_read_only(CYCLE));
        assert!(is_read_only(MHARTID));
        assert!(!is_read_only(MCYCLE));
        assert!(!is_read_only(MEINEXT));
    }

    #[test]
    fn test_privilege() {
        assert_eq!(RawPrivilegeLevel::User, required_privilege_level(CYCLEH));
        assert_eq!(RawPrivilegeLevel::Machine, required_privilege_level(MSTATUS));
        assert_eq!(RawPrivilegeLevel::Machine, required_privilege_level(MSLEEP));
        assert!(is_valid(0xFFF));
        assert!(!is_valid(0x1000));
    }
}
