use super::alu::{self, RegImmFn, RegRegFn, UnaryFn};
use super::cs_registers::CsRegisters;
use super::csr::CsrSpecifier;
use super::memory::{Memory, MemoryError};
use super::{Exception, ExecutionResult, Retired, Wait};
use crate::bus::Bus;
use crate::instruction::{AmoOp, CsrOp, CsrSource, PopReturn, RegisterList};
use crate::registers::{Registers, Specifier};
use crate::{Alignment, PrivilegeLevel};
use log::debug;

/// Executes a single decoded instruction against a snapshot of the register file.
///
/// Register writes and the next PC are returned in [`Retired`] and only committed by the core if
/// the instruction completes, so an instruction that raises an exception has no effect on the
/// register file. Memory writes and CSR writes are performed (respectively staged) directly, and
/// always come last.
#[derive(Debug)]
pub(super) struct Executor<'a, B: Bus> {
    pub registers: &'a Registers,
    pub cs_registers: &'a mut CsRegisters,
    pub reservation: &'a mut Option<u32>,
    pub bus: &'a mut B,
    pub stores: &'a mut Vec<u32>,
    /// Address of the instruction being executed.
    pub pc: u32,
    /// Length of the instruction being executed in bytes, 2 or 4.
    pub length: u32,
}

impl<'a, B: Bus> Executor<'a, B> {
    fn memory(&mut self) -> Memory<'_, B> {
        Memory {
            cs_registers: &*self.cs_registers,
            bus: &mut *self.bus,
            stores: &mut *self.stores,
        }
    }

    /// Executes an instruction of the OP-IMM group with a 12-bit immediate.
    ///
    /// > ADDI adds the sign-extended 12-bit immediate to register rs1. Arithmetic overflow is
    /// > ignored and the result is simply the low XLEN bits of the result.
    pub fn reg_imm_op(
        &mut self,
        dest: Specifier,
        src: Specifier,
        immediate: i32,
        op: RegImmFn,
    ) -> ExecutionResult {
        write_rd(dest, op(self.registers.x(src), immediate))
    }

    /// Executes an immediate shift or single-bit instruction. `shift_amount_u5` is masked to five
    /// bits by the operation itself.
    pub fn reg_shamt_op(
        &mut self,
        dest: Specifier,
        src: Specifier,
        shift_amount_u5: u32,
        op: RegRegFn,
    ) -> ExecutionResult {
        write_rd(dest, op(self.registers.x(src), shift_amount_u5))
    }

    pub fn reg_reg_op(
        &mut self,
        dest: Specifier,
        src1: Specifier,
        src2: Specifier,
        op: RegRegFn,
    ) -> ExecutionResult {
        write_rd(dest, op(self.registers.x(src1), self.registers.x(src2)))
    }

    pub fn unary_op(&mut self, dest: Specifier, src: Specifier, op: UnaryFn) -> ExecutionResult {
        write_rd(dest, op(self.registers.x(src)))
    }

    /// Executes a `lui` instruction.
    ///
    /// > LUI (load upper immediate) is used to build 32-bit constants and uses the U-type format.
    /// > LUI places the 32-bit U-immediate value into the destination register rd, filling in the
    /// > lowest 12 bits with zeros.
    pub fn lui(&mut self, dest: Specifier, immediate: i32) -> ExecutionResult {
        write_rd(dest, immediate as u32)
    }

    /// Executes an `auipc` instruction.
    ///
    /// > AUIPC (add upper immediate to pc) is used to build pc-relative addresses and uses the
    /// > U-type format. AUIPC forms a 32-bit offset from the U-immediate, filling in the lowest 12
    /// > bits with zeros, adds this offset to the address of the AUIPC instruction, then places the
    /// > result in register rd.
    pub fn auipc(&mut self, dest: Specifier, immediate: i32) -> ExecutionResult {
        write_rd(dest, self.pc.wrapping_add_signed(immediate))
    }

    /// Executes `jal`, or `c.j`/`c.jal`. The link address is the address of the next instruction.
    pub fn jal(&mut self, dest: Specifier, offset: i32) -> ExecutionResult {
        self.jump_op(dest, self.pc.wrapping_add_signed(offset))
    }

    /// Executes `jalr`, or `c.jr`/`c.jalr`.
    ///
    /// > The target address is obtained by adding the sign-extended 12-bit I-immediate to the
    /// > register rs1, then setting the least-significant bit of the result to zero.
    pub fn jalr(&mut self, dest: Specifier, base: Specifier, offset: i32) -> ExecutionResult {
        let target = self.registers.x(base).wrapping_add_signed(offset) & !1;
        self.jump_op(dest, target)
    }

    /// Takes the branch if `predicate` returns `true`.
    pub fn cond_branch(
        &mut self,
        src1: Specifier,
        src2: Specifier,
        offset: i32,
        predicate: fn(u32, u32) -> bool,
    ) -> ExecutionResult {
        let taken = predicate(self.registers.x(src1), self.registers.x(src2));
        Ok(Retired {
            next_pc: taken.then(|| self.pc.wrapping_add_signed(offset)),
            ..Retired::default()
        })
    }

    pub fn load_op<F>(
        &mut self,
        dest: Specifier,
        base: Specifier,
        offset: i32,
        op: F,
    ) -> ExecutionResult
    where
        F: FnOnce(&mut Memory<B>, u32) -> Result<u32, MemoryError>,
    {
        let address = self.registers.x(base).wrapping_add_signed(offset);
        let value = op(&mut self.memory(), address).map_err(load_exception)?;
        write_rd(dest, value)
    }

    pub fn store_op<F>(
        &mut self,
        src: Specifier,
        base: Specifier,
        offset: i32,
        op: F,
    ) -> ExecutionResult
    where
        F: FnOnce(&mut Memory<B>, u32, u32) -> Result<(), MemoryError>,
    {
        let value = self.registers.x(src);
        let address = self.registers.x(base).wrapping_add_signed(offset);
        op(&mut self.memory(), address, value).map_err(store_exception)?;
        Ok(Retired::default())
    }

    /// Executes an instruction of the A extension.
    ///
    /// All of them require a word-aligned address, a misaligned `lr.w` is reported as a store/AMO
    /// misalignment too. Apart from `lr.w`, any access fault is a store/AMO access fault.
    pub fn amo(
        &mut self,
        op: AmoOp,
        dest: Specifier,
        address: Specifier,
        src: Specifier,
    ) -> ExecutionResult {
        let address = self.registers.x(address);
        let value = self.registers.x(src);
        if !Alignment::WORD.is_aligned(address) {
            return Err(Exception::StoreOrAmoAddressMisaligned);
        }
        match op {
            AmoOp::LrW => {
                let loaded = self
                    .memory()
                    .read_word(address)
                    .map_err(|_| Exception::LoadAccessFault)?;
                *self.reservation = Some(address);
                write_rd(dest, loaded)
            }
            AmoOp::ScW => {
                // The reservation is lost even if the store faults.
                if self.reservation.take() != Some(address) {
                    return write_rd(dest, 1);
                }
                self.memory()
                    .write_word(address, value)
                    .map_err(|_| Exception::StoreOrAmoAccessFault)?;
                write_rd(dest, 0)
            }
            _ => {
                let loaded = self
                    .memory()
                    .read_word(address)
                    .map_err(|_| Exception::StoreOrAmoAccessFault)?;
                let result = match op {
                    AmoOp::Add => loaded.wrapping_add(value),
                    AmoOp::Xor => loaded ^ value,
                    AmoOp::And => loaded & value,
                    AmoOp::Or => loaded | value,
                    AmoOp::Min => (loaded as i32).min(value as i32) as u32,
                    AmoOp::Max => (loaded as i32).max(value as i32) as u32,
                    AmoOp::Minu => loaded.min(value),
                    AmoOp::Maxu => loaded.max(value),
                    _ => value,
                };
                self.memory()
                    .write_word(address, result)
                    .map_err(|_| Exception::StoreOrAmoAccessFault)?;
                write_rd(dest, loaded)
            }
        }
    }

    /// Executes one of the six Zicsr instructions.
    ///
    /// > If rd=x0, then the instruction shall not read the CSR and shall not cause any of the side
    /// > effects that might occur on a CSR read.
    ///
    /// > For both CSRRS and CSRRC, if rs1=x0, then the instruction will not write to the CSR at
    /// > all, and so shall not cause any of the side effects that might otherwise occur on a CSR
    /// > write, nor raise illegal-instruction exceptions on accesses to read-only CSRs.
    pub fn csr(
        &mut self,
        op: CsrOp,
        dest: Specifier,
        csr: CsrSpecifier,
        source: CsrSource,
    ) -> ExecutionResult {
        let operand = match source {
            CsrSource::Register(src) => self.registers.x(src),
            CsrSource::Immediate(value) => value,
        };
        let read = if op == CsrOp::Write && dest == Specifier::X0 {
            None
        } else {
            let value = self.cs_registers.read(csr, operand).map_err(|err| {
                debug!("CSR read at {:#010x} failed: {err}", self.pc);
                Exception::IllegalInstruction
            })?;
            Some(value)
        };
        if op == CsrOp::Write || !source.is_zero_field() {
            self.cs_registers
                .write(csr, operand, op)
                .map_err(|err| {
                    debug!("CSR write at {:#010x} failed: {err}", self.pc);
                    Exception::IllegalInstruction
                })?;
        }
        Ok(Retired {
            rd: read.map(|value| (dest, value)),
            ..Retired::default()
        })
    }

    /// Executes an `ecall` instruction.
    ///
    /// > The ECALL instruction is used to make a request to the supporting execution environment.
    pub fn ecall(&mut self) -> ExecutionResult {
        Err(match self.cs_registers.privilege_level() {
            PrivilegeLevel::User => Exception::EnvironmentCallFromUMode,
            PrivilegeLevel::Machine => Exception::EnvironmentCallFromMMode,
        })
    }

    /// Executes an `ebreak` or `c.ebreak` instruction.
    pub fn ebreak(&mut self) -> ExecutionResult {
        Err(Exception::Breakpoint)
    }

    pub fn mret(&mut self) -> ExecutionResult {
        if self.cs_registers.privilege_level() != PrivilegeLevel::Machine {
            return Err(Exception::IllegalInstruction);
        }
        Ok(Retired {
            next_pc: Some(self.cs_registers.trap_mret()),
            ..Retired::default()
        })
    }

    /// Executes a `wfi` instruction.
    ///
    /// > When TW=1, then if WFI is executed in any less-privileged mode, and it does not complete
    /// > within an implementation-specific, bounded time limit, the WFI instruction causes an
    /// > illegal instruction exception.
    ///
    /// The time limit is zero here. The instruction retires, the core decides whether to stall.
    pub fn wfi(&mut self) -> ExecutionResult {
        if self.cs_registers.status().tw()
            && self.cs_registers.privilege_level() == PrivilegeLevel::User
        {
            return Err(Exception::IllegalInstruction);
        }
        Ok(Retired {
            wait: Some(Wait::Interrupt),
            ..Retired::default()
        })
    }

    /// Executes `h3.block`, which waits for an `h3.unblock` from any hart.
    pub fn block(&mut self) -> ExecutionResult {
        Ok(Retired {
            wait: Some(Wait::Unblock),
            ..Retired::default()
        })
    }

    /// Executes `h3.unblock`, which releases `h3.block` on all harts.
    pub fn unblock(&mut self) -> ExecutionResult {
        Ok(Retired {
            unblock: true,
            ..Retired::default()
        })
    }

    /// `fence` and `fence.i` are no-ops: memory is accessed in program order, and instruction
    /// fetch always observes preceding stores.
    pub fn fence(&mut self) -> ExecutionResult {
        Ok(Retired::default())
    }

    pub fn bextm(
        &mut self,
        dest: Specifier,
        src1: Specifier,
        src2: Specifier,
        size: u32,
    ) -> ExecutionResult {
        let shamt = self.registers.x(src2);
        write_rd(dest, alu::bextm(self.registers.x(src1), shamt, size))
    }

    pub fn bextmi(
        &mut self,
        dest: Specifier,
        src: Specifier,
        shift_amount_u5: u32,
        size: u32,
    ) -> ExecutionResult {
        write_rd(dest, alu::bextm(self.registers.x(src), shift_amount_u5, size))
    }

    /// Executes `cm.push`.
    ///
    /// Registers are stored below `sp` starting from the highest-numbered one. The first failing
    /// store aborts the instruction, stores before it are not undone.
    pub fn cm_push(&mut self, rlist: RegisterList, stack_adj: u32) -> ExecutionResult {
        let sp = self.registers.x(Specifier::SP);
        let mut address = sp;
        for register in rlist.iter_descending() {
            address = address.wrapping_sub(4);
            let value = self.registers.x(register);
            self.memory()
                .write_word(address, value)
                .map_err(store_exception)?;
        }
        write_rd(Specifier::SP, sp.wrapping_sub(stack_adj))
    }

    /// Executes `cm.pop`, `cm.popret` or `cm.popretz`.
    ///
    /// All loads complete before any register is written, so a faulting pop leaves the register
    /// file untouched.
    pub fn cm_pop(
        &mut self,
        rlist: RegisterList,
        stack_adj: u32,
        ret: PopReturn,
    ) -> ExecutionResult {
        let sp = self.registers.x(Specifier::SP);
        let mut address = sp.wrapping_add(stack_adj);
        let mut loaded = Vec::with_capacity(rlist.len() as usize + 1);
        for register in rlist.iter_descending() {
            address = address.wrapping_sub(4);
            let value = self
                .memory()
                .read_word(address)
                .map_err(load_exception)?;
            loaded.push((register, value));
        }
        let return_address = loaded
            .iter()
            .find(|(register, _)| *register == Specifier::RA)
            .map(|&(_, value)| value);
        let next_pc = match ret {
            PopReturn::None => None,
            PopReturn::Ret => return_address,
            PopReturn::RetZero => {
                loaded.push((Specifier::A0, 0));
                return_address
            }
        };
        Ok(Retired {
            rd: Some((Specifier::SP, sp.wrapping_add(stack_adj))),
            extra_writes: loaded,
            next_pc,
            ..Retired::default()
        })
    }

    /// Executes `cm.mvsa01`: move `a0` and `a1` into two saved registers.
    pub fn cm_mvsa01(&mut self, r1s: Specifier, r2s: Specifier) -> ExecutionResult {
        Ok(Retired {
            extra_writes: vec![
                (r1s, self.registers.x(Specifier::A0)),
                (r2s, self.registers.x(Specifier::A1)),
            ],
            ..Retired::default()
        })
    }

    /// Executes `cm.mva01s`: move two saved registers into `a0` and `a1`.
    pub fn cm_mva01s(&mut self, r1s: Specifier, r2s: Specifier) -> ExecutionResult {
        Ok(Retired {
            extra_writes: vec![
                (Specifier::A0, self.registers.x(r1s)),
                (Specifier::A1, self.registers.x(r2s)),
            ],
            ..Retired::default()
        })
    }

    fn jump_op(&mut self, dest: Specifier, target: u32) -> ExecutionResult {
        Ok(Retired {
            rd: Some((dest, self.pc.wrapping_add(self.length))),
            next_pc: Some(target),
            ..Retired::default()
        })
    }
}

fn write_rd(dest: Specifier, value: u32) -> ExecutionResult {
    Ok(Retired {
        rd: Some((dest, value)),
        ..Retired::default()
    })
}

fn load_exception(err: MemoryError) -> Exception {
    match err {
        MemoryError::MisalignedAccess => Exception::LoadAddressMisaligned,
        MemoryError::AccessFault => Exception::LoadAccessFault,
    }
}

fn store_exception(err: MemoryError) -> Exception {
    match err {
        MemoryError::MisalignedAccess => Exception::StoreOrAmoAddressMisaligned,
        MemoryError::AccessFault => Exception::StoreOrAmoAccessFault,
    }
}
