use bitvec::{array::BitArray, order::Lsb0};

use super::Interrupt;

const MACHINE_SOFTWARE_INTERRUPT: usize = Interrupt::MachineSoftwareInterrupt as usize;
const MACHINE_TIMER_INTERRUPT: usize = Interrupt::MachineTimerInterrupt as usize;
const MACHINE_EXTERNAL_INTERRUPT: usize = Interrupt::MachineExternalInterrupt as usize;

#[allow(clippy::identity_op)]
const VALID_INTERRUPTS_MASK: u32 = 0
    | (1 << MACHINE_SOFTWARE_INTERRUPT)
    | (1 << MACHINE_TIMER_INTERRUPT)
    | (1 << MACHINE_EXTERNAL_INTERRUPT);

const_assert_eq!(VALID_INTERRUPTS_MASK, 0x888);

/// The mie register and the interrupt lines that make up mip.
///
/// mip has no software-writable bits: MSIP and MTIP follow the lines driven by the testbench, and
/// MEIP follows the external interrupt controller.
#[derive(Debug, Clone)]
pub struct Interrupts {
    mie: BitArray<[u32; 1], Lsb0>,
    /// Latched MSIP and MTIP lines. MEIP is not stored, it is supplied by the caller of
    /// [`mip`](Self::mip).
    lines: BitArray<[u32; 1], Lsb0>,
}

impl Default for Interrupts {
    fn default() -> Self {
        Self::new()
    }
}

impl Interrupts {
    pub fn new() -> Self {
        Self {
            mie: BitArray::new([0]),
            lines: BitArray::new([0]),
        }
    }

    pub fn read_mie(&self) -> u32 {
        self.mie.data[0]
    }

    pub fn write_mie(&mut self, value: u32) {
        self.mie.data[0] = value & VALID_INTERRUPTS_MASK;
    }

    pub fn is_enabled(&self, interrupt: Interrupt) -> bool {
        self.mie[interrupt as usize]
    }

    pub fn set_enabled(&mut self, interrupt: Interrupt, value: bool) {
        self.mie.set(interrupt as usize, value);
    }

    /// Indicate whether an M-level software interrupt is pending (MSIP).
    ///
    /// Controlled by the testbench's software interrupt register.
    pub fn set_m_soft(&mut self, value: bool) {
        self.lines.set(MACHINE_SOFTWARE_INTERRUPT, value);
    }

    /// Indicate whether an M-level timer interrupt is pending (MTIP).
    ///
    /// Controlled externally based on memory-mapped mtime and mtimecmp registers.
    pub fn set_m_timer(&mut self, value: bool) {
        self.lines.set(MACHINE_TIMER_INTERRUPT, value);
    }

    /// Returns the effective mip value, given the current level of MEIP.
    pub fn mip(&self, meip: bool) -> u32 {
        let mut mip = self.lines;
        mip.set(MACHINE_EXTERNAL_INTERRUPT, meip);
        mip.data[0]
    }

    /// Returns the pending and enabled interrupt with the lowest code, ignoring the global enable
    /// in mstatus. MSI therefore wins over MTI, which wins over MEI.
    pub fn next_pending(&self, meip: bool) -> Option<Interrupt> {
        let pending = self.mip(meip) & self.read_mie();
        match pending.trailing_zeros() as usize {
            MACHINE_SOFTWARE_INTERRUPT => Some(Interrupt::MachineSoftwareInterrupt),
            MACHINE_TIMER_INTERRUPT => Some(Interrupt::MachineTimerInterrupt),
            MACHINE_EXTERNAL_INTERRUPT => Some(Interrupt::MachineExternalInterrupt),
            _ => None,
        }
    }
}
