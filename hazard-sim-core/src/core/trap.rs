use super::{Exception, Interrupt};

/// Writable bits of mtvec: the base address and the vectored-mode bit (bit 0).
const MTVEC_MASK: u32 = 0xffff_fffd;
const MEPC_MASK: u32 = 0xffff_fffe;
/// The interrupt flag plus a 5-bit exception code.
const MCAUSE_MASK: u32 = 0x8000_001f;

/// Machine trap setup and handling registers: mtvec, mscratch, mepc and mcause.
///
/// mtval is hardwired to zero and not stored.
#[derive(Debug, Clone, Default)]
pub struct Trap {
    mtvec: u32,
    mscratch: u32,
    mepc: u32,
    mcause: u32,
}

impl Trap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read_mtvec(&self) -> u32 {
        self.mtvec
    }

    pub fn write_mtvec(&mut self, value: u32) {
        self.mtvec = value & MTVEC_MASK;
    }

    pub fn read_mscratch(&self) -> u32 {
        self.mscratch
    }

    pub fn write_mscratch(&mut self, value: u32) {
        self.mscratch = value;
    }

    pub fn read_mepc(&self) -> u32 {
        self.mepc
    }

    pub fn write_mepc(&mut self, value: u32) {
        self.mepc = value & MEPC_MASK;
    }

    pub fn read_mcause(&self) -> u32 {
        self.mcause
    }

    pub fn write_mcause(&mut self, value: u32) {
        self.mcause = value & MCAUSE_MASK;
    }

    /// Returns the address of the trap handler for `cause`.
    ///
    /// In vectored mode (`mtvec[0]` set) interrupts jump to `base + 4 * code`, exceptions always
    /// jump to the base address.
    pub fn handler_address(&self, cause: &TrapCause) -> u32 {
        let base = self.mtvec & !0b11;
        match cause {
            TrapCause::Interrupt(interrupt) if self.mtvec & 1 != 0 => {
                base.wrapping_add(4 * interrupt.code())
            }
            _ => base,
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum TrapCause {
    Exception(Exception),
    Interrupt(Interrupt),
}

impl TrapCause {
    /// Returns the value written to mcause when this trap is taken.
    pub fn mcause(&self) -> u32 {
        match self {
            Self::Exception(exception) => exception.code(),
            Self::Interrupt(interrupt) => 0x8000_0000 | interrupt.code(),
        }
    }
}

impl From<Exception> for TrapCause {
    fn from(value: Exception) -> Self {
        Self::Exception(value)
    }
}

impl From<Interrupt> for TrapCause {
    fn from(value: Interrupt) -> Self {
        Self::Interrupt(value)
    }
}
