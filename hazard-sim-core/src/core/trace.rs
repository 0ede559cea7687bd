use crate::registers::Specifier;
use std::fmt;

/// Raw encoding of an executed instruction.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum RawInstruction {
    Full(u32),
    Compressed(u16),
}

impl RawInstruction {
    /// Returns the length of the instruction in bytes.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(self) -> u32 {
        match self {
            Self::Full(_) => 4,
            Self::Compressed(_) => 2,
        }
    }
}

/// A trap taken during a step.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct TrapRecord {
    /// Value written to mcause.
    pub mcause: u32,
    /// Address of the trap handler.
    pub target: u32,
}

/// Everything that happened during one [`Core::step`](super::Core::step).
///
/// The [`Display`](fmt::Display) impl renders the instruction trace line, plus a second line if a
/// trap was taken. Stalled steps render as nothing.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct Step {
    /// PC at the start of the step.
    pub pc: u32,
    /// The instruction that was executed, `None` if the core was stalled or the fetch faulted.
    pub instruction: Option<RawInstruction>,
    /// Write to a register other than `x0`.
    pub rd: Option<(Specifier, u32)>,
    /// PC override by a jump, taken branch, `mret` or `cm.popret`.
    pub next_pc: Option<u32>,
    pub trap: Option<TrapRecord>,
    /// Addresses of all successful stores, including AMOs.
    pub stores: Vec<u32>,
    /// The instruction was an `h3.unblock`.
    pub unblock: bool,
    /// The core is waiting for an interrupt or unblock after this step.
    pub stalled: bool,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(instruction) = self.instruction {
            write!(f, "{:08x}: ", self.pc)?;
            match instruction {
                RawInstruction::Full(raw) => write!(f, "{raw:08x} : ")?,
                RawInstruction::Compressed(raw) => write!(f, "    {raw:04x} : ")?,
            }
            match self.rd {
                Some((dest, value)) => write!(f, "{:<3} <- {value:08x} ", dest.abi_name())?,
                None => write!(f, "{:16}", "")?,
            }
            match self.next_pc {
                Some(next_pc) => writeln!(f, ": pc <- {next_pc:08x}")?,
                None => writeln!(f, ":")?,
            }
        }
        if let Some(trap) = self.trap {
            writeln!(f, "Trap cause {:2}: pc <- {:08x}", trap.mcause, trap.target)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_instruction_line() {
        let step = Step {
            pc: 0x40,
            instruction: Some(RawInstruction::Full(0x0010_0513)),
            rd: Some((Specifier::A0, 1)),
            ..Step::default()
        };
        assert_eq!(
            "00000040: 00100513 : a0  <- 00000001 :\n",
            step.to_string()
        );
    }

    #[test]
    fn test_compressed_jump_line() {
        let step = Step {
            pc: 0x44,
            instruction: Some(RawInstruction::Compressed(0xa001)),
            next_pc: Some(0x44),
            ..Step::default()
        };
        assert_eq!(
            "00000044:     a001 :                 : pc <- 00000044\n",
            step.to_string()
        );
    }

    #[test]
    fn test_trap_line() {
        let step = Step {
            pc: 0x48,
            instruction: Some(RawInstruction::Full(0x0000_0073)),
            trap: Some(TrapRecord {
                mcause: 11,
                target: 0x100,
            }),
            ..Step::default()
        };
        assert_eq!(
            "00000048: 00000073 :                 :\nTrap cause 11: pc <- 00000100\n",
            step.to_string()
        );
        assert_eq!("", Step::default().to_string());
    }
}
