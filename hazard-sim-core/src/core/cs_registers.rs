//! Control and Status Registers.
//!
//! Part of the "Zicsr" extension, plus the machine-level state of the privileged architecture that
//! is reachable through CSRs: privilege level, traps, counters, PMP and interrupts.

use log::{debug, trace};
use thiserror::Error;

use super::counters::{CounterHalf, Counters};
use super::csr::{self, CsrSpecifier};
use super::interrupts::Interrupts;
use super::irq_controller::{context, IrqController};
use super::pmp::{AccessType, Permissions, Pmp, PmpRegion};
use super::status::Status;
use super::trap::{Trap, TrapCause};
use super::{Config, Exception, Interrupt};
use crate::instruction::CsrOp;
use crate::{PrivilegeLevel, RawPrivilegeLevel};

/// RV32, with extensions A, C, I, M, U and X.
const MISA_VALUE: u32 = 0x4090_1105;
const MVENDORID_VALUE: u32 = 0xdead_beef;
const MARCHID_VALUE: u32 = 0x1b;
const MIMPID_VALUE: u32 = 0x1234_5678;
const MCONFIGPTR_VALUE: u32 = 0x9abc_def0;

/// Writable bits of mcounteren: CY and IR.
const MCOUNTEREN_MASK: u32 = 0b101;
const MSLEEP_MASK: u32 = 0b111;
/// Bits of an array CSR write that select the window.
const ARRAY_INDEX_MASK: u32 = 0x1f;

/// Control and Status Registers for a single hart.
///
/// Writes are two-phase: [`write`](Self::write) checks access and stages the new value, which is
/// only committed by the next call to [`step`](Self::step). A staged write to one half of a
/// counter takes precedence over that cycle's increment.
///
/// > RISC-V defines a separate address space of 4096 Control and Status registers associated with
/// > each hart.
///
/// > The top two bits (csr\[11:10]) indicate whether the register is read/write (00, 01, or 10) or
/// > read-only (11). The next two bits (csr\[9:8]) encode the lowest privilege level that can
/// > access the CSR.
#[derive(Debug, Clone)]
pub struct CsRegisters {
    hart_id: u32,
    privilege_level: PrivilegeLevel,
    status: Status,
    trap: Trap,
    counters: Counters,
    interrupts: Interrupts,
    pmp: Pmp,
    irq_controller: IrqController,
    mcounteren: u32,
    msleep: u32,
    pending_write: Option<(CsrSpecifier, u32)>,
    /// Counter half written by a write that was committed early, at trap entry.
    held_counter_half: Option<CounterHalf>,
}

impl CsRegisters {
    /// Creates a fresh collection of registers initialized to their reset values.
    pub fn new(config: &Config) -> Self {
        Self {
            hart_id: config.hart_id,
            privilege_level: PrivilegeLevel::Machine,
            status: Status::new(),
            trap: Trap::new(),
            counters: Counters::new(),
            interrupts: Interrupts::new(),
            pmp: Pmp::new(config.pmp_regions),
            irq_controller: IrqController::new(config.num_irqs),
            mcounteren: 0,
            msleep: 0,
            pending_write: None,
            held_counter_half: None,
        }
    }

    pub fn privilege_level(&self) -> PrivilegeLevel {
        self.privilege_level
    }

    pub fn status(&self) -> &Status {
        &self.status
    }

    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    pub fn mepc(&self) -> u32 {
        self.trap.read_mepc()
    }

    pub fn mcause(&self) -> u32 {
        self.trap.read_mcause()
    }

    pub fn irq_controller(&self) -> &IrqController {
        &self.irq_controller
    }

    /// Drive an external interrupt line of the interrupt controller.
    pub fn set_external_irq(&mut self, irq: usize, level: bool) {
        self.irq_controller.set_line(irq, level);
    }

    /// Latch the software and timer interrupt lines into mip.
    pub fn set_irq_lines(&mut self, software: bool, timer: bool) {
        self.interrupts.set_m_soft(software);
        self.interrupts.set_m_timer(timer);
    }

    /// Returns the effective value of mip.
    pub fn mip(&self) -> u32 {
        self.interrupts.mip(self.irq_controller.meip())
    }

    /// Returns `true` if any interrupt is both pending and enabled in mie, regardless of
    /// mstatus.MIE. This is the condition that ends a WFI stall.
    pub fn wakeup_pending(&self) -> bool {
        self.mip() & self.interrupts.read_mie() != 0
    }

    /// Read the value of a CSR by its specifier, at the current privilege level.
    ///
    /// `hint` is the write operand of the CSR instruction performing the read. It selects the
    /// window of the interrupt controller's array CSRs and affects the save bits of meicontext.
    pub fn read(&self, specifier: CsrSpecifier, hint: u32) -> Result<u32, AccessError> {
        self.check_access(specifier)?;
        self.peek(specifier, hint)
            .ok_or(AccessError::CsrUnsupported(specifier))
    }

    /// Stage a write to a CSR, which is committed at the end of the current [`step`](Self::step).
    ///
    /// [`CsrOp::Set`] and [`CsrOp::Clear`] combine `value` with the current value of the CSR. For
    /// the array CSRs only the window in bits 31:16 is combined, the index always comes from
    /// `value`.
    pub fn write(
        &mut self,
        specifier: CsrSpecifier,
        value: u32,
        op: CsrOp,
    ) -> Result<(), WriteError> {
        self.check_access(specifier)
            .map_err(WriteError::AccessError)?;
        if csr::is_read_only(specifier) {
            return Err(WriteError::WriteToReadOnly(specifier));
        }
        let current = self
            .peek(specifier, value)
            .ok_or(WriteError::AccessError(AccessError::CsrUnsupported(
                specifier,
            )))?;
        let mut updated = match op {
            CsrOp::Write => value,
            CsrOp::Set => current | value,
            CsrOp::Clear => current & !value,
        };
        if csr::is_indexed(specifier) {
            updated = updated & !ARRAY_INDEX_MASK | value & ARRAY_INDEX_MASK;
        }
        self.pending_write = Some((specifier, updated));
        Ok(())
    }

    /// Advance the counters and commit the staged write, if any.
    pub fn step(&mut self) {
        let pending = self.pending_write.take();
        let held = self
            .held_counter_half
            .take()
            .or_else(|| pending.and_then(|(specifier, _)| counter_half(specifier)));
        self.counters.increment(held);
        if let Some((specifier, value)) = pending {
            self.commit(specifier, value);
        }
    }

    /// Commit the staged write ahead of the next [`step`](Self::step), e.g. because a trap is
    /// about to overwrite trap state in this cycle.
    fn flush_pending_write(&mut self) {
        if let Some((specifier, value)) = self.pending_write.take() {
            self.held_counter_half = counter_half(specifier);
            self.commit(specifier, value);
        }
    }

    /// Enter the trap handler for `exception`, raised by the instruction at `pc`.
    ///
    /// Returns the address of the trap handler.
    pub fn trap_enter_exception(&mut self, exception: Exception, pc: u32) -> u32 {
        self.enter_trap(exception.into(), pc)
    }

    /// Take the highest-priority pending interrupt, if interrupts are enabled at the current
    /// privilege level. `pc` is the address of the next instruction, which will be saved to mepc.
    ///
    /// > An interrupt i will trap to M-mode if all of the following are true: (a) either the
    /// > current privilege mode is M and the MIE bit in the mstatus register is set, or the current
    /// > privilege mode has less privilege than M-mode; (b) bit i is set in both mip and mie.
    pub fn trap_check_enter_irq(&mut self, pc: u32) -> Option<(Interrupt, u32)> {
        let interrupt = self
            .interrupts
            .next_pending(self.irq_controller.meip())?;
        if !self.status.mie() && self.privilege_level == PrivilegeLevel::Machine {
            return None;
        }
        Some((interrupt, self.enter_trap(interrupt.into(), pc)))
    }

    fn enter_trap(&mut self, cause: TrapCause, epc: u32) -> u32 {
        self.flush_pending_write();
        self.status
            .set_mpp(RawPrivilegeLevel::from(self.privilege_level));
        self.privilege_level = PrivilegeLevel::Machine;
        self.status.set_mpie(self.status.mie());
        self.status.set_mie(false);
        self.trap.write_mcause(cause.mcause());
        self.trap.write_mepc(epc);
        if cause == TrapCause::Interrupt(Interrupt::MachineExternalInterrupt) {
            self.irq_controller.enter_trap();
        }
        let handler = self.trap.handler_address(&cause);
        debug!(
            "Hart {} trap, mcause {:#010x}, mepc {epc:#010x}, handler {handler:#010x}",
            self.hart_id,
            cause.mcause()
        );
        handler
    }

    /// Return from an M-mode trap handler. Returns the address to resume at (mepc).
    ///
    /// Must only be called from M-mode, `mret` is illegal in U-mode.
    pub fn trap_mret(&mut self) -> u32 {
        let mpp = self.status.mpp();
        self.privilege_level = mpp;
        self.status.set_mpp(RawPrivilegeLevel::User);
        if mpp != PrivilegeLevel::Machine {
            self.status.set_mprv(false);
        }
        self.status.set_mie(self.status.mpie());
        self.status.set_mpie(false);
        if self.trap.read_mcause()
            == TrapCause::from(Interrupt::MachineExternalInterrupt).mcause()
        {
            self.irq_controller.return_from_trap();
        }
        debug!(
            "Hart {} mret to {mpp}-mode at {:#010x}",
            self.hart_id,
            self.trap.read_mepc()
        );
        self.trap.read_mepc()
    }

    /// Returns the lowest-numbered PMP region matching `address`.
    pub fn pmp_match(&self, address: u32) -> Option<PmpRegion> {
        self.pmp.match_region(address)
    }

    /// Returns the PMP permissions that apply to `address` at `privilege_level`.
    pub fn pmp_xwr(&self, address: u32, privilege_level: PrivilegeLevel) -> Permissions {
        self.pmp.permissions(address, privilege_level)
    }

    /// Returns the privilege level at which an access of type `access` is checked.
    ///
    /// > When MPRV=1, load and store memory addresses are [...] protected [...] as though the
    /// > current privilege mode were set to MPP. Instruction address-translation and protection are
    /// > unaffected by the setting of MPRV.
    pub fn effective_privilege_level(&self, access: AccessType) -> PrivilegeLevel {
        match access {
            AccessType::Read | AccessType::Write if self.status.mprv() => self.status.mpp(),
            _ => self.privilege_level,
        }
    }

    /// Returns `true` if `access` to `address` is allowed by PMP.
    pub fn pmp_allows(&self, address: u32, access: AccessType) -> bool {
        self.pmp_xwr(address, self.effective_privilege_level(access))
            .allows(access)
    }

    fn check_access(&self, specifier: CsrSpecifier) -> Result<(), AccessError> {
        if !csr::is_valid(specifier) {
            return Err(AccessError::CsrUnsupported(specifier));
        }
        let required_level = csr::required_privilege_level(specifier);
        if self.privilege_level < required_level {
            return Err(AccessError::Privileged {
                specifier,
                required_level,
                actual_level: self.privilege_level,
            });
        }
        let counter_enable_bit = match specifier {
            csr::CYCLE | csr::CYCLEH => Some(0),
            csr::INSTRET | csr::INSTRETH => Some(2),
            _ => None,
        };
        match counter_enable_bit {
            Some(bit)
                if self.privilege_level == PrivilegeLevel::User
                    && self.mcounteren & (1 << bit) == 0 =>
            {
                Err(AccessError::CounterDisabled(specifier))
            }
            _ => Ok(()),
        }
    }

    /// Read a CSR without access checks. Returns `None` if the CSR doesn't exist.
    fn peek(&self, specifier: CsrSpecifier, hint: u32) -> Option<u32> {
        let value = match specifier {
            csr::MISA => MISA_VALUE,
            csr::MVENDORID => MVENDORID_VALUE,
            csr::MARCHID => MARCHID_VALUE,
            csr::MIMPID => MIMPID_VALUE,
            csr::MHARTID => self.hart_id,
            csr::MCONFIGPTR => MCONFIGPTR_VALUE,
            csr::MSTATUS => self.status.read(),
            csr::MIE => self.interrupts.read_mie(),
            csr::MTVEC => self.trap.read_mtvec(),
            csr::MCOUNTEREN => self.mcounteren,
            csr::MSCRATCH => self.trap.read_mscratch(),
            csr::MEPC => self.trap.read_mepc(),
            csr::MCAUSE => self.trap.read_mcause(),
            csr::MIP => self.mip(),
            csr::PMPCFG0..=csr::PMPCFG3 => {
                self.pmp.read_cfg((specifier - csr::PMPCFG0) as usize)
            }
            csr::PMPADDR0..=csr::PMPADDR15 => {
                self.pmp.read_addr((specifier - csr::PMPADDR0) as usize)
            }
            csr::PMPCFGM0 => self.pmp.read_m_enforced(),
            csr::MCYCLE | csr::CYCLE => self.counters.read(CounterHalf::McycleLow),
            csr::MCYCLEH | csr::CYCLEH => self.counters.read(CounterHalf::McycleHigh),
            csr::MINSTRET | csr::INSTRET => self.counters.read(CounterHalf::MinstretLow),
            csr::MINSTRETH | csr::INSTRETH => self.counters.read(CounterHalf::MinstretHigh),
            csr::MCOUNTINHIBIT => self.counters.read_mcountinhibit(),
            csr::MEIEA..=csr::MEIPRA => self.irq_controller.read_array(specifier, hint),
            csr::MEINEXT => self.irq_controller.read_meinext(),
            csr::MEICONTEXT => {
                let mut value = self.irq_controller.read_meicontext();
                if hint & (1 << context::CLEARTS) != 0 {
                    if self.interrupts.is_enabled(Interrupt::MachineTimerInterrupt) {
                        value |= 1 << context::MTIESAVE;
                    }
                    if self.interrupts.is_enabled(Interrupt::MachineSoftwareInterrupt) {
                        value |= 1 << context::MSIESAVE;
                    }
                }
                value
            }
            csr::MSLEEP => self.msleep,
            // Hardwired to zero
            csr::MSTATUSH
            | csr::MTVAL
            | csr::MHPMCOUNTER3..=csr::MHPMCOUNTER31
            | csr::MHPMCOUNTER3H..=csr::MHPMCOUNTER31H
            | csr::MHPMEVENT3..=csr::MHPMEVENT31
            | csr::TSELECT
            | csr::TDATA1
            | csr::TDATA2
            | csr::TINFO
            | csr::TCONTROL => 0,
            _ => return None,
        };
        Some(value)
    }

    fn commit(&mut self, specifier: CsrSpecifier, value: u32) {
        trace!(
            "Hart {} CSR {specifier:#05x} <- {value:#010x}",
            self.hart_id
        );
        match specifier {
            csr::MSTATUS => self.status.write(value),
            csr::MIE => self.interrupts.write_mie(value),
            csr::MTVEC => self.trap.write_mtvec(value),
            csr::MCOUNTEREN => self.mcounteren = value & MCOUNTEREN_MASK,
            csr::MSCRATCH => self.trap.write_mscratch(value),
            csr::MEPC => self.trap.write_mepc(value),
            csr::MCAUSE => self.trap.write_mcause(value),
            csr::PMPCFG0..=csr::PMPCFG3 => self
                .pmp
                .write_cfg((specifier - csr::PMPCFG0) as usize, value),
            csr::PMPADDR0..=csr::PMPADDR15 => self
                .pmp
                .write_addr((specifier - csr::PMPADDR0) as usize, value),
            csr::PMPCFGM0 => self.pmp.write_m_enforced(value),
            csr::MCOUNTINHIBIT => self.counters.write_mcountinhibit(value),
            csr::MEIEA..=csr::MEIPRA => self.irq_controller.write_array(specifier, value),
            csr::MEINEXT => self.irq_controller.write_meinext(value),
            csr::MEICONTEXT => {
                self.irq_controller.write_meicontext(value);
                if value & (1 << context::CLEARTS) != 0 {
                    self.interrupts
                        .set_enabled(Interrupt::MachineTimerInterrupt, false);
                    self.interrupts
                        .set_enabled(Interrupt::MachineSoftwareInterrupt, false);
                } else {
                    if value & (1 << context::MTIESAVE) != 0 {
                        self.interrupts
                            .set_enabled(Interrupt::MachineTimerInterrupt, true);
                    }
                    if value & (1 << context::MSIESAVE) != 0 {
                        self.interrupts
                            .set_enabled(Interrupt::MachineSoftwareInterrupt, true);
                    }
                }
            }
            csr::MSLEEP => self.msleep = value & MSLEEP_MASK,
            _ => {
                // Everything else ignores writes.
                if let Some(half) = counter_half(specifier) {
                    self.counters.write(half, value);
                }
            }
        }
    }
}

/// Returns the counter half backing a writable counter CSR.
fn counter_half(specifier: CsrSpecifier) -> Option<CounterHalf> {
    match specifier {
        csr::MCYCLE => Some(CounterHalf::McycleLow),
        csr::MCYCLEH => Some(CounterHalf::McycleHigh),
        csr::MINSTRET => Some(CounterHalf::MinstretLow),
        csr::MINSTRETH => Some(CounterHalf::MinstretHigh),
        _ => None,
    }
}

/// Errors that can occur when attempting to access a CSR.
#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum AccessError {
    #[error("unsupported CSR: {0:#05X}")]
    CsrUnsupported(CsrSpecifier),
    /// Attempt to access a CSR that requires a higher privilege level.
    #[error(
        "cannot access CSR {specifier:#05X} from privilege level {actual_level}, \
             since it requires privilege level {required_level}"
    )]
    Privileged {
        /// The CSR for which access was requested.
        specifier: CsrSpecifier,
        /// The minimum required privilege level to access that CSR.
        required_level: RawPrivilegeLevel,
        /// The actual privilege level from which the access was performed.
        actual_level: PrivilegeLevel,
    },
    /// Attempt to read a user-level counter that is not enabled in mcounteren.
    #[error("counter CSR {0:#05X} is not enabled for U-mode")]
    CounterDisabled(CsrSpecifier),
}

/// Errors that can occur when attempting to write to a CSR.
#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum WriteError {
    /// A non-write specific access error. See [`AccessError`].
    #[error("{0}")]
    AccessError(AccessError),
    /// Attempt to write to a read-only register.
    #[error("writing to read-only CSR {0:#05X} is invalid")]
    WriteToReadOnly(CsrSpecifier),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registers() -> CsRegisters {
        CsRegisters::new(&Config::default())
    }

    fn write_now(registers: &mut CsRegisters, specifier: CsrSpecifier, value: u32) {
        registers.write(specifier, value, CsrOp::Write).unwrap();
        registers.step();
    }

    #[test]
    fn test_id_registers() {
        let registers = CsRegisters::new(&Config {
            hart_id: 3,
            ..Config::default()
        });
        assert_eq!(Ok(0x4090_1105), registers.read(csr::MISA, 0));
        assert_eq!(Ok(3), registers.read(csr::MHARTID, 0));
        assert_eq!(Ok(0x1b), registers.read(csr::MARCHID, 0));
        assert_eq!(Ok(0xdead_beef), registers.read(csr::MVENDORID, 0));
    }

    #[test]
    fn test_illegal_accesses() {
        let mut registers = registers();
        assert!(matches!(
            registers.read(0x302, 0),
            Err(AccessError::CsrUnsupported(0x302))
        ));
        assert!(matches!(
            registers.read(csr::CYCLE + 1, 0),
            Err(AccessError::CsrUnsupported(_))
        ));
        assert_eq!(
            Err(WriteError::WriteToReadOnly(csr::MHARTID)),
            registers.write(csr::MHARTID, 0, CsrOp::Write)
        );
        assert!(registers.write(0x7b0, 0, CsrOp::Write).is_err());
        assert!(registers.read(0x1000, 0).is_err());
    }

    #[test]
    fn test_write_is_staged() {
        let mut registers = registers();
        registers.write(csr::MSCRATCH, 0x1234, CsrOp::Write).unwrap();
        assert_eq!(Ok(0), registers.read(csr::MSCRATCH, 0));
        registers.step();
        assert_eq!(Ok(0x1234), registers.read(csr::MSCRATCH, 0));
        registers.write(csr::MSCRATCH, 0x1030, CsrOp::Clear).unwrap();
        registers.step();
        assert_eq!(Ok(0x0204), registers.read(csr::MSCRATCH, 0));
        registers.write(csr::MSCRATCH, 0x8000_0000, CsrOp::Set).unwrap();
        registers.step();
        assert_eq!(Ok(0x8000_0204), registers.read(csr::MSCRATCH, 0));
    }

    #[test]
    fn test_counter_write_wins_over_increment() {
        let mut registers = registers();
        registers.step();
        registers.step();
        assert_eq!(Ok(2), registers.read(csr::MCYCLE, 0));
        write_now(&mut registers, csr::MCYCLE, 0);
        assert_eq!(Ok(0), registers.read(csr::MCYCLE, 0));
        registers.step();
        assert_eq!(Ok(1), registers.read(csr::MCYCLE, 0));
        assert_eq!(Ok(4), registers.read(csr::MINSTRET, 0));
    }

    #[test]
    fn test_trap_flushes_pending_write() {
        let mut registers = registers();
        registers.write(csr::MCYCLE, 100, CsrOp::Write).unwrap();
        registers.trap_enter_exception(Exception::IllegalInstruction, 0x40);
        assert_eq!(Ok(100), registers.read(csr::MCYCLE, 0));
        registers.step();
        assert_eq!(Ok(100), registers.read(csr::MCYCLE, 0));
        registers.step();
        assert_eq!(Ok(101), registers.read(csr::MCYCLE, 0));
    }

    #[test]
    fn test_trap_overrides_pending_mepc_write() {
        let mut registers = registers();
        registers.write(csr::MEPC, 0x1000, CsrOp::Write).unwrap();
        registers.trap_enter_exception(Exception::Breakpoint, 0x40);
        registers.step();
        assert_eq!(0x40, registers.mepc());
        assert_eq!(3, registers.mcause());
    }

    #[test]
    fn test_user_mode_and_mret() {
        let mut registers = registers();
        write_now(&mut registers, csr::MEPC, 0x100);
        write_now(&mut registers, csr::MSTATUS, 0x0002_0080);
        assert_eq!(0x100, registers.trap_mret());
        assert_eq!(PrivilegeLevel::User, registers.privilege_level());
        // MIE <- MPIE, MPIE <- 0, MPP <- U, and MPRV is cleared when leaving M-mode.
        assert_eq!(0x8, registers.status().read());
        assert!(matches!(
            registers.read(csr::MSTATUS, 0),
            Err(AccessError::Privileged { .. })
        ));
        assert!(matches!(
            registers.read(csr::CYCLE, 0),
            Err(AccessError::CounterDisabled(csr::CYCLE))
        ));
        let handler = registers.trap_enter_exception(Exception::EnvironmentCallFromUMode, 0x104);
        assert_eq!(0, handler);
        assert_eq!(PrivilegeLevel::Machine, registers.privilege_level());
        assert_eq!(8, registers.mcause());
        assert_eq!(PrivilegeLevel::User, registers.status().mpp());
        assert_eq!(0x80, registers.status().read());
    }

    #[test]
    fn test_mcounteren_gates_user_counters() {
        let mut registers = registers();
        write_now(&mut registers, csr::MCOUNTEREN, 0xffff_ffff);
        assert_eq!(Ok(0b101), registers.read(csr::MCOUNTEREN, 0));
        write_now(&mut registers, csr::MEPC, 0x100);
        registers.trap_mret();
        assert!(registers.read(csr::CYCLE, 0).is_ok());
        assert!(registers.read(csr::INSTRETH, 0).is_ok());
        assert!(registers.write(csr::CYCLE, 0, CsrOp::Write).is_err());
    }

    #[test]
    fn test_interrupt_entry() {
        let mut registers = registers();
        registers.set_irq_lines(false, true);
        assert!(registers.trap_check_enter_irq(0x44).is_none());
        write_now(&mut registers, csr::MIE, 0x80);
        assert!(registers.wakeup_pending());
        // Masked by mstatus.MIE in M-mode.
        assert!(registers.trap_check_enter_irq(0x44).is_none());
        write_now(&mut registers, csr::MTVEC, 0x201);
        write_now(&mut registers, csr::MSTATUS, 0x8);
        assert_eq!(
            Some((Interrupt::MachineTimerInterrupt, 0x21c)),
            registers.trap_check_enter_irq(0x44)
        );
        assert_eq!(0x8000_0007, registers.mcause());
        assert_eq!(0x44, registers.mepc());
        assert!(!registers.status().mie());
        assert!(registers.status().mpie());
    }

    #[test]
    fn test_external_interrupt_preemption() {
        let mut registers = registers();
        write_now(&mut registers, csr::MEIEA, 0x0001_0000);
        write_now(&mut registers, csr::MIE, 0x800);
        write_now(&mut registers, csr::MSTATUS, 0x8);
        registers.set_external_irq(0, true);
        assert_eq!(0x800, registers.mip());
        let (interrupt, _) = registers.trap_check_enter_irq(0x40).unwrap();
        assert_eq!(Interrupt::MachineExternalInterrupt, interrupt);
        // Claim the interrupt: csrrsi meinext, 1
        assert_eq!(Ok(0), registers.read(csr::MEINEXT, 1));
        registers.write(csr::MEINEXT, 1, CsrOp::Set).unwrap();
        registers.step();
        assert_eq!(1, registers.irq_controller().preempt());
        assert_eq!(0, registers.mip());
        registers.trap_mret();
        assert_eq!(0, registers.irq_controller().preempt());
    }

    #[test]
    fn test_array_clear_keeps_index() {
        let mut registers = registers();
        write_now(&mut registers, csr::MEIEA, 0xffff_0001);
        registers
            .write(csr::MEIEA, 0x0001_0001, CsrOp::Clear)
            .unwrap();
        registers.step();
        assert_eq!(Ok(0xfffe_0000), registers.read(csr::MEIEA, 1));
        assert_eq!(Ok(0), registers.read(csr::MEIEA, 0));
    }

    #[test]
    fn test_meicontext_save_bits() {
        let mut registers = registers();
        write_now(&mut registers, csr::MIE, 0x888);
        assert_eq!(Ok(0x8000), registers.read(csr::MEICONTEXT, 0));
        assert_eq!(Ok(0x8006), registers.read(csr::MEICONTEXT, 1));
        // csrrsi meicontext, CLEARTS
        registers
            .write(csr::MEICONTEXT, 1, CsrOp::Set)
            .unwrap();
        registers.step();
        assert_eq!(Ok(0x800), registers.read(csr::MIE, 0));
        write_now(&mut registers, csr::MEICONTEXT, 0x8006);
        assert_eq!(Ok(0x888), registers.read(csr::MIE, 0));
    }

    #[test]
    fn test_hardwired_registers() {
        let mut registers = registers();
        write_now(&mut registers, csr::MTVAL, 0xffff_ffff);
        write_now(&mut registers, csr::MIP, 0xffff_ffff);
        write_now(&mut registers, csr::TDATA1, 0xffff_ffff);
        write_now(&mut registers, csr::MHPMCOUNTER3 + 4, 0xffff_ffff);
        assert_eq!(Ok(0), registers.read(csr::MTVAL, 0));
        assert_eq!(Ok(0), registers.read(csr::MIP, 0));
        assert_eq!(Ok(0), registers.read(csr::TDATA1, 0));
        assert_eq!(Ok(0), registers.read(csr::MHPMCOUNTER3 + 4, 0));
        write_now(&mut registers, csr::MSLEEP, 0xff);
        assert_eq!(Ok(0x7), registers.read(csr::MSLEEP, 0));
    }
}
