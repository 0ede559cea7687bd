//! Provides a simulatable Hazard3-style RV32IMAC core implementation.

mod alu;
pub mod counters;
pub mod cs_registers;
pub mod csr;
mod execute;
pub mod interrupts;
pub mod irq_controller;
pub mod memory;
pub mod pmp;
pub mod status;
mod trace;
pub mod trap;

use crate::bus::Bus;
use crate::instruction::{BranchCondition, Instruction, LoadWidth, StoreWidth};
use crate::registers::{Registers, Specifier};
use cs_registers::CsRegisters;
use execute::Executor;
use log::{debug, trace, warn};
use memory::Memory;

pub use trace::{RawInstruction, Step, TrapRecord};

#[derive(Debug, Clone)]
pub struct Config {
    /// Value of mhartid.
    pub hart_id: u32,
    /// Address to which the core's PC register is reset.
    pub reset_vector: u32,
    /// Number of implemented PMP regions, at most [`pmp::MAX_REGIONS`].
    pub pmp_regions: usize,
    /// Number of external interrupts handled by the interrupt controller, at most
    /// [`irq_controller::MAX_IRQS`].
    pub num_irqs: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            hart_id: 0,
            reset_vector: 0x40,
            pmp_regions: 4,
            num_irqs: 32,
        }
    }
}

/// RISC-V core implementing RV32IMAC, with a single hart.
///
/// > A component is termed a core if it contains an independent instruction fetch unit.
///
/// Every call to [`step`](Self::step) is one cycle: fetch, decode and execute one instruction,
/// then either enter an exception handler or commit the results, then check for interrupts, and
/// finally advance the counters and commit any staged CSR write. A core waiting in `wfi` or
/// `h3.block` only advances its counters.
///
/// > The execution environment is responsible for ensuring the eventual forward progress of each of
/// > its harts. For a given hart, that responsibility is suspended while the hart is exercising a
/// > mechanism that explicitly waits for an event, such as the wait-for-interrupt instruction.
#[derive(Debug)]
pub struct Core {
    config: Config,
    registers: Registers,
    cs_registers: CsRegisters,
    /// Word address reserved by `lr.w`.
    reservation: Option<u32>,
    wait: Option<Wait>,
    /// Set by `h3.unblock` on any hart, consumed by `h3.block`.
    unblock_latch: bool,
    irq_table: ExternalIrqTable,
}

impl Core {
    pub fn new(config: Config) -> Self {
        Self {
            registers: Registers::new(config.reset_vector),
            cs_registers: CsRegisters::new(&config),
            reservation: None,
            wait: None,
            unblock_latch: false,
            irq_table: ExternalIrqTable::new(config.num_irqs),
            config,
        }
    }

    /// Provide a read-only view of this core's configuration.
    ///
    /// It is not possible to modify the configuration after creation.
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registers(&self) -> &Registers {
        &self.registers
    }

    pub fn registers_mut(&mut self) -> &mut Registers {
        &mut self.registers
    }

    pub fn cs_registers(&self) -> &CsRegisters {
        &self.cs_registers
    }

    pub fn cs_registers_mut(&mut self) -> &mut CsRegisters {
        &mut self.cs_registers
    }

    pub fn irq_table(&self) -> &ExternalIrqTable {
        &self.irq_table
    }

    pub fn irq_table_mut(&mut self) -> &mut ExternalIrqTable {
        &mut self.irq_table
    }

    /// Returns the address reserved by the last `lr.w`, if the reservation is still valid.
    pub fn reservation(&self) -> Option<u32> {
        self.reservation
    }

    /// Invalidate this core's reservation if it covers the word containing `address`.
    ///
    /// Called for stores performed by other harts.
    pub fn observe_store(&mut self, address: u32) {
        if self.reservation == Some(address & !0b11) {
            debug!(
                "Hart {} reservation at {address:#010x} lost",
                self.config.hart_id
            );
            self.reservation = None;
        }
    }

    /// Set the unblock latch, releasing a pending or future `h3.block`.
    pub fn unblock(&mut self) {
        self.unblock_latch = true;
    }

    /// Returns `true` if the core is stalled in `wfi` or `h3.block`.
    pub fn is_waiting(&self) -> bool {
        self.wait.is_some()
    }

    /// Drive the software and timer interrupt lines.
    pub fn set_interrupt_lines(&mut self, software: bool, timer: bool) {
        self.cs_registers.set_irq_lines(software, timer);
    }

    /// Drive external interrupt line `irq` of the interrupt controller.
    pub fn set_external_irq(&mut self, irq: usize, level: bool) {
        self.cs_registers.set_external_irq(irq, level);
    }

    /// Simulate one cycle with `bus` as the system bus.
    pub fn step<B: Bus>(&mut self, bus: &mut B) -> Step {
        let pc = self.registers.pc();
        let mut step = Step {
            pc,
            ..Step::default()
        };

        if let Some(wait) = self.wait {
            let woken = self.cs_registers.wakeup_pending()
                || (wait == Wait::Unblock && std::mem::take(&mut self.unblock_latch));
            if !woken {
                step.stalled = true;
                self.cs_registers.step();
                return step;
            }
            self.wait = None;
            if self.check_interrupt(&mut step, pc) {
                self.cs_registers.step();
                return step;
            }
        }

        let mut stores = Vec::new();
        let result = self.fetch(bus, pc).and_then(|raw| {
            step.instruction = Some(raw);
            self.execute_raw_instruction(bus, &mut stores, raw, pc)
        });

        let next_pc = match result {
            Ok(retired) => {
                for (dest, value) in retired.extra_writes {
                    self.registers.set_x(dest, value);
                }
                if let Some((dest, value)) = retired.rd {
                    self.registers.set_x(dest, value);
                    if dest != Specifier::X0 {
                        step.rd = Some((dest, value));
                    }
                }
                if retired.unblock {
                    self.unblock_latch = true;
                    step.unblock = true;
                }
                match retired.wait {
                    Some(Wait::Unblock) if std::mem::take(&mut self.unblock_latch) => {}
                    wait => self.wait = wait,
                }
                step.next_pc = retired.next_pc;
                let length = step.instruction.map_or(4, RawInstruction::len);
                retired.next_pc.unwrap_or(pc.wrapping_add(length))
            }
            Err(exception) => {
                let target = self.cs_registers.trap_enter_exception(exception, pc);
                step.trap = Some(TrapRecord {
                    mcause: exception.code(),
                    target,
                });
                target
            }
        };
        *self.registers.pc_mut() = next_pc;
        self.check_interrupt(&mut step, next_pc);

        if self.wait.is_some() && self.cs_registers.wakeup_pending() {
            self.wait = None;
        }
        step.stalled = self.wait.is_some();
        step.stores = stores;
        self.cs_registers.step();
        step
    }

    /// Take a pending interrupt, with `pc` as the address to return to. Returns `true` if an
    /// interrupt was taken.
    fn check_interrupt(&mut self, step: &mut Step, pc: u32) -> bool {
        let Some((interrupt, target)) = self.cs_registers.trap_check_enter_irq(pc) else {
            return false;
        };
        if interrupt == Interrupt::MachineExternalInterrupt {
            self.irq_table
                .record_entry(self.cs_registers.irq_controller().next_irq());
        }
        *self.registers.pc_mut() = target;
        self.wait = None;
        step.trap = Some(TrapRecord {
            mcause: trap::TrapCause::from(interrupt).mcause(),
            target,
        });
        true
    }

    /// "Independent instruction fetch unit"
    ///
    /// > Instructions are stored in memory as a sequence of 16-bit little-endian parcels,
    /// > regardless of memory system endianness. Parcels forming one instruction are stored at
    /// > increasing halfword addresses, with the lowest-addressed parcel holding the
    /// > lowest-numbered bits in the instruction specification.
    fn fetch<B: Bus>(&self, bus: &mut B, address: u32) -> Result<RawInstruction, Exception> {
        let mut no_stores = Vec::new();
        let mut memory = Memory {
            cs_registers: &self.cs_registers,
            bus,
            stores: &mut no_stores,
        };
        let low = memory
            .fetch_halfword(address)
            .map_err(|_| Exception::InstructionAccessFault)?;
        if low & 0b11 != 0b11 {
            return Ok(RawInstruction::Compressed(low));
        }
        let high = memory
            .fetch_halfword(address.wrapping_add(2))
            .map_err(|_| Exception::InstructionAccessFault)?;
        Ok(RawInstruction::Full(low as u32 | (high as u32) << 16))
    }

    /// Decode and execute `raw_instruction`.
    ///
    /// # Unspecified behavior
    ///
    /// > The behavior upon decoding a reserved instruction is UNSPECIFIED.
    ///
    /// This implementation chooses to raise an [`Exception::IllegalInstruction`] when
    /// `raw_instruction` is reserved or not supported.
    fn execute_raw_instruction<B: Bus>(
        &mut self,
        bus: &mut B,
        stores: &mut Vec<u32>,
        raw_instruction: RawInstruction,
        pc: u32,
    ) -> ExecutionResult {
        let decoded = match raw_instruction {
            RawInstruction::Full(raw) => Instruction::decode(raw),
            RawInstruction::Compressed(raw) => Instruction::decode_compressed(raw),
        };
        let instruction = decoded.map_err(|err| {
            match raw_instruction {
                RawInstruction::Full(raw) => {
                    warn!("Invalid instruction {raw:08x} at {pc:08x}: {err}")
                }
                RawInstruction::Compressed(raw) => {
                    warn!("Invalid instruction {raw:04x} at {pc:08x}: {err}")
                }
            }
            Exception::IllegalInstruction
        })?;
        trace!("Hart {} {pc:#010x}: {instruction:?}", self.config.hart_id);
        let mut executor = Executor {
            registers: &self.registers,
            cs_registers: &mut self.cs_registers,
            reservation: &mut self.reservation,
            bus,
            stores,
            pc,
            length: raw_instruction.len(),
        };
        execute_instruction(&mut executor, instruction)
    }
}

fn execute_instruction<B: Bus>(
    executor: &mut Executor<B>,
    instruction: Instruction,
) -> ExecutionResult {
    match instruction {
        Instruction::OpImm {
            op,
            dest,
            src,
            immediate,
        } => executor.reg_imm_op(dest, src, immediate, alu::reg_imm(op)),
        Instruction::OpShiftImm {
            op,
            dest,
            src,
            shift_amount_u5,
        } => executor.reg_shamt_op(dest, src, shift_amount_u5, alu::shift_imm(op)),
        Instruction::OpUnary { op, dest, src } => {
            executor.unary_op(dest, src, alu::unary(op))
        }
        Instruction::Auipc { dest, immediate } => executor.auipc(dest, immediate),
        Instruction::Lui { dest, immediate } => executor.lui(dest, immediate),
        Instruction::Op {
            op,
            dest,
            src1,
            src2,
        } => executor.reg_reg_op(dest, src1, src2, alu::reg_reg(op)),
        Instruction::Jal { dest, offset } => executor.jal(dest, offset),
        Instruction::Jalr { dest, base, offset } => executor.jalr(dest, base, offset),
        Instruction::Branch {
            condition,
            src1,
            src2,
            offset,
        } => {
            let predicate: fn(u32, u32) -> bool = match condition {
                BranchCondition::Beq => |s1, s2| s1 == s2,
                BranchCondition::Bne => |s1, s2| s1 != s2,
                BranchCondition::Blt => |s1, s2| (s1 as i32) < (s2 as i32),
                BranchCondition::Bltu => |s1, s2| s1 < s2,
                BranchCondition::Bge => |s1, s2| (s1 as i32) >= (s2 as i32),
                BranchCondition::Bgeu => |s1, s2| s1 >= s2,
            };
            executor.cond_branch(src1, src2, offset, predicate)
        }
        Instruction::Load {
            width,
            dest,
            base,
            offset,
        } => match width {
            LoadWidth::Lb => executor.load_op(dest, base, offset, |memory, address| {
                memory.read_byte(address).map(|value| value as i8 as u32)
            }),
            LoadWidth::Lbu => executor.load_op(dest, base, offset, |memory, address| {
                memory.read_byte(address).map(|value| value as u32)
            }),
            LoadWidth::Lh => executor.load_op(dest, base, offset, |memory, address| {
                memory.read_halfword(address).map(|value| value as i16 as u32)
            }),
            LoadWidth::Lhu => executor.load_op(dest, base, offset, |memory, address| {
                memory.read_halfword(address).map(|value| value as u32)
            }),
            LoadWidth::Lw => executor.load_op(dest, base, offset, |memory, address| {
                memory.read_word(address)
            }),
        },
        Instruction::Store {
            width,
            src,
            base,
            offset,
        } => match width {
            StoreWidth::Sb => executor.store_op(src, base, offset, |memory, address, value| {
                memory.write_byte(address, value as u8)
            }),
            StoreWidth::Sh => executor.store_op(src, base, offset, |memory, address, value| {
                memory.write_halfword(address, value as u16)
            }),
            StoreWidth::Sw => executor.store_op(src, base, offset, |memory, address, value| {
                memory.write_word(address, value)
            }),
        },
        Instruction::Amo {
            op,
            dest,
            address,
            src,
        } => executor.amo(op, dest, address, src),
        Instruction::Fence | Instruction::FenceI => executor.fence(),
        Instruction::Csr {
            op,
            dest,
            csr,
            source,
        } => executor.csr(op, dest, csr, source),
        Instruction::Ecall => executor.ecall(),
        Instruction::Ebreak => executor.ebreak(),
        Instruction::Mret => executor.mret(),
        Instruction::Wfi => executor.wfi(),
        Instruction::Block => executor.block(),
        Instruction::Unblock => executor.unblock(),
        Instruction::BextM {
            dest,
            src1,
            src2,
            size,
        } => executor.bextm(dest, src1, src2, size),
        Instruction::BextMi {
            dest,
            src,
            shift_amount_u5,
            size,
        } => executor.bextmi(dest, src, shift_amount_u5, size),
        Instruction::CmPush { rlist, stack_adj } => executor.cm_push(rlist, stack_adj),
        Instruction::CmPop {
            rlist,
            stack_adj,
            ret,
        } => executor.cm_pop(rlist, stack_adj, ret),
        Instruction::CmMvsa01 { r1s, r2s } => executor.cm_mvsa01(r1s, r2s),
        Instruction::CmMva01s { r1s, r2s } => executor.cm_mva01s(r1s, r2s),
    }
}

/// Table of handler addresses for external interrupts, plus a count of external interrupt
/// entries.
///
/// The core never jumps through this table, trap entry always goes through mtvec. It is
/// bookkeeping for the host, which may register handlers to have external interrupt entries
/// attributed to them in the log.
#[derive(Debug, Clone, Default)]
pub struct ExternalIrqTable {
    handlers: Vec<Option<u32>>,
    entry_count: u64,
}

impl ExternalIrqTable {
    pub fn new(num_irqs: usize) -> Self {
        Self {
            handlers: vec![None; num_irqs.min(irq_controller::MAX_IRQS)],
            entry_count: 0,
        }
    }

    pub fn handler(&self, irq: usize) -> Option<u32> {
        self.handlers.get(irq).copied().flatten()
    }

    /// Register (or with `None`, remove) the handler for `irq`. Out of range IRQs are ignored.
    pub fn set_handler(&mut self, irq: usize, handler: Option<u32>) {
        if let Some(slot) = self.handlers.get_mut(irq) {
            *slot = handler;
        }
    }

    /// Number of external interrupt trap entries since reset.
    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }

    fn record_entry(&mut self, irq: Option<usize>) {
        self.entry_count += 1;
        match irq.and_then(|irq| Some((irq, self.handler(irq)?))) {
            Some((irq, handler)) => {
                debug!("External interrupt {irq} entry, handler at {handler:#010x}")
            }
            None => debug!("External interrupt entry {}", self.entry_count),
        }
    }
}

/// State of a core that is stalled until some event occurs.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(crate) enum Wait {
    /// `wfi`: wait until an interrupt is pending and enabled in mie.
    Interrupt,
    /// `h3.block`: wait until the unblock latch is set, or as for [`Wait::Interrupt`].
    Unblock,
}

/// Result of an instruction that completed without raising an exception.
#[derive(Debug, Default)]
pub(crate) struct Retired {
    /// Write to the destination register, shown in the trace.
    pub rd: Option<(Specifier, u32)>,
    /// Further register writes, committed before `rd`.
    pub extra_writes: Vec<(Specifier, u32)>,
    /// Overrides the address of the next sequential instruction.
    pub next_pc: Option<u32>,
    pub wait: Option<Wait>,
    pub unblock: bool,
}

pub(crate) type ExecutionResult = Result<Retired, Exception>;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Exception {
    /// Instruction fetch denied by PMP or by the bus.
    InstructionAccessFault,
    /// Generic exception used to communicate one of many possible scenarios:
    ///
    /// - (*UNSPECIFIED*) Attempt to decode a reserved instruction.
    /// - Attempt to access a non-existent CSR.
    /// - Attempt to access a CSR without the appropriate privilege level.
    /// - Attempt to write to a read-only CSR.
    /// - `mret` outside M-mode, or `wfi` in U-mode with mstatus.TW set.
    IllegalInstruction,
    Breakpoint,
    LoadAddressMisaligned,
    LoadAccessFault,
    /// Misaligned store, or misaligned AMO including `lr.w`.
    StoreOrAmoAddressMisaligned,
    StoreOrAmoAccessFault,
    EnvironmentCallFromUMode,
    EnvironmentCallFromMMode,
}

impl Exception {
    /// Returns the exception code (cause) for this exception.
    pub fn code(&self) -> u32 {
        match self {
            Self::InstructionAccessFault => 1,
            Self::IllegalInstruction => 2,
            Self::Breakpoint => 3,
            Self::LoadAddressMisaligned => 4,
            Self::LoadAccessFault => 5,
            Self::StoreOrAmoAddressMisaligned => 6,
            Self::StoreOrAmoAccessFault => 7,
            Self::EnvironmentCallFromUMode => 8,
            Self::EnvironmentCallFromMMode => 11,
        }
    }
}

/// Machine-level interrupts, with their exception code as discriminant, which is also their bit
/// index in mip and mie.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Interrupt {
    MachineSoftwareInterrupt = 3,
    MachineTimerInterrupt = 7,
    MachineExternalInterrupt = 11,
}

impl Interrupt {
    /// Returns the exception code (cause) for this interrupt.
    pub fn code(&self) -> u32 {
        *self as u32
    }
}
