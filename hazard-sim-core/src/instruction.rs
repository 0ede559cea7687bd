//! Decoding of raw 32-bit and 16-bit instructions into [`Instruction`].

mod compressed;

use crate::core::csr::CsrSpecifier;
use crate::registers::Specifier;
use thiserror::Error;

/// Data structure that can hold any supported instruction in its decoded form.
///
/// Compressed instructions decode into the same variants as their 32-bit counterparts, e.g.
/// `c.addi` becomes an [`Instruction::OpImm`]. Only the Zcmp instructions have no 32-bit
/// equivalent.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Instruction {
    OpImm {
        op: RegImmOp,
        dest: Specifier,
        src: Specifier,
        immediate: i32,
    },
    OpShiftImm {
        op: RegShiftImmOp,
        dest: Specifier,
        src: Specifier,
        shift_amount_u5: u32,
    },
    /// Single-source bit manipulation instructions (Zbb, Zbkb).
    OpUnary {
        op: UnaryOp,
        dest: Specifier,
        src: Specifier,
    },
    Auipc {
        dest: Specifier,
        immediate: i32,
    },
    Lui {
        dest: Specifier,
        immediate: i32,
    },
    Op {
        op: RegRegOp,
        dest: Specifier,
        src1: Specifier,
        src2: Specifier,
    },
    Jal {
        dest: Specifier,
        offset: i32,
    },
    Jalr {
        dest: Specifier,
        base: Specifier,
        offset: i32,
    },
    Branch {
        condition: BranchCondition,
        src1: Specifier,
        src2: Specifier,
        offset: i32,
    },
    Load {
        width: LoadWidth,
        dest: Specifier,
        base: Specifier,
        offset: i32,
    },
    Store {
        width: StoreWidth,
        src: Specifier,
        base: Specifier,
        offset: i32,
    },
    /// Atomic memory operation on a word, including `lr.w` and `sc.w`.
    ///
    /// The `aq` and `rl` ordering bits have no effect in this single-issue model and are dropped.
    Amo {
        op: AmoOp,
        dest: Specifier,
        address: Specifier,
        src: Specifier,
    },
    Fence,
    FenceI,
    Csr {
        op: CsrOp,
        dest: Specifier,
        csr: CsrSpecifier,
        source: CsrSource,
    },
    Ecall,
    Ebreak,
    Mret,
    Wfi,
    /// `h3.block`: sleep until another hart executes `h3.unblock` (encoded as `slt x0, x0, x0`).
    Block,
    /// `h3.unblock`: wake all harts sleeping on `h3.block` (encoded as `slt x0, x0, x1`).
    Unblock,
    /// `h3.bextm`: extract a `size`-bit field starting at bit `rs2[4:0]`.
    BextM {
        dest: Specifier,
        src1: Specifier,
        src2: Specifier,
        size: u32,
    },
    /// `h3.bextmi`: extract a `size`-bit field starting at a constant bit index.
    BextMi {
        dest: Specifier,
        src: Specifier,
        shift_amount_u5: u32,
        size: u32,
    },
    /// `cm.push`: store `rlist` below the stack pointer, then decrement it by `stack_adj`.
    CmPush { rlist: RegisterList, stack_adj: u32 },
    /// `cm.pop`, `cm.popret`, `cm.popretz`: reload `rlist` and release the stack frame.
    CmPop {
        rlist: RegisterList,
        stack_adj: u32,
        ret: PopReturn,
    },
    /// `cm.mvsa01`: move `a0` and `a1` into two saved registers.
    CmMvsa01 { r1s: Specifier, r2s: Specifier },
    /// `cm.mva01s`: move two saved registers into `a0` and `a1`.
    CmMva01s { r1s: Specifier, r2s: Specifier },
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum RegImmOp {
    Addi,
    Slti,
    Sltiu,
    Xori,
    Ori,
    Andi,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum RegShiftImmOp {
    Slli,
    Srli,
    Srai,
    Rori,
    Bclri,
    Bseti,
    Binvi,
    Bexti,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum UnaryOp {
    Clz,
    Ctz,
    Cpop,
    SextB,
    SextH,
    OrcB,
    Rev8,
    Brev8,
    Zip,
    Unzip,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum RegRegOp {
    Add,
    Slt,
    Sltu,
    And,
    Or,
    Xor,
    Sll,
    Srl,
    Sub,
    Sra,
    // M
    Mul,
    Mulh,
    Mulhsu,
    Mulhu,
    Div,
    Divu,
    Rem,
    Remu,
    // Zba
    Sh1add,
    Sh2add,
    Sh3add,
    // Zbb, Zbkb
    Andn,
    Orn,
    Xnor,
    Min,
    Minu,
    Max,
    Maxu,
    Rol,
    Ror,
    Pack,
    Packh,
    // Zbc
    Clmul,
    Clmulh,
    Clmulr,
    // Zbs
    Bclr,
    Bset,
    Binv,
    Bext,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum BranchCondition {
    Beq,
    Bne,
    Blt,
    Bltu,
    Bge,
    Bgeu,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum LoadWidth {
    Lb,
    Lh,
    Lw,
    Lbu,
    Lhu,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum StoreWidth {
    Sb,
    Sh,
    Sw,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum AmoOp {
    LrW,
    ScW,
    Swap,
    Add,
    Xor,
    And,
    Or,
    Min,
    Max,
    Minu,
    Maxu,
}

/// How a CSR instruction combines its source with the current CSR value.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum CsrOp {
    /// `csrrw`/`csrrwi`: replace the CSR value.
    Write,
    /// `csrrs`/`csrrsi`: set the bits that are set in the source.
    Set,
    /// `csrrc`/`csrrci`: clear the bits that are set in the source.
    Clear,
}

/// Source operand of a CSR instruction.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum CsrSource {
    Register(Specifier),
    /// Zero-extended 5-bit immediate, found in the `rs1` field.
    Immediate(u32),
}

impl CsrSource {
    /// Returns `true` if the `rs1`/`uimm` field is zero, in which case `csrrs` and `csrrc` don't
    /// write the CSR.
    pub fn is_zero_field(self) -> bool {
        match self {
            Self::Register(specifier) => specifier == Specifier::X0,
            Self::Immediate(value) => value == 0,
        }
    }
}

/// What happens after the registers are reloaded by a Zcmp pop.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum PopReturn {
    /// `cm.pop`: fall through.
    None,
    /// `cm.popret`: return to `ra`.
    Ret,
    /// `cm.popretz`: zero `a0` and return to `ra`.
    RetZero,
}

/// The `rlist` field of a Zcmp push/pop: `ra` plus zero or more of `s0..=s11`.
///
/// Valid values are `4..=15`. Value `15` selects 13 registers, since `s10` is never saved without
/// `s11`.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct RegisterList(u8);

/// Saved registers in the order they are added to a register list.
const RLIST_ORDER: [u8; 13] = [1, 8, 9, 18, 19, 20, 21, 22, 23, 24, 25, 26, 27];

impl RegisterList {
    /// Create a register list from the 4-bit `rlist` field, returning `None` for the reserved
    /// values `0..=3`.
    pub fn new(rlist_u4: u8) -> Option<Self> {
        let rlist_u4 = rlist_u4 & 0xF;
        (rlist_u4 >= 4).then_some(Self(rlist_u4))
    }

    /// Returns the number of registers in the list.
    pub fn len(self) -> u32 {
        if self.0 == 15 {
            13
        } else {
            self.0 as u32 - 3
        }
    }

    /// A register list always contains at least `ra`.
    pub fn is_empty(self) -> bool {
        false
    }

    /// Returns the minimum stack adjustment needed to save the registers, a multiple of 16.
    pub fn stack_adj_base(self) -> u32 {
        match self.len() {
            13.. => 0x40,
            9.. => 0x30,
            5.. => 0x20,
            _ => 0x10,
        }
    }

    /// Iterate over the registers in the list from the highest register number to the lowest,
    /// which is the order in which they are placed on the stack starting at the top.
    pub fn iter_descending(self) -> impl Iterator<Item = Specifier> {
        RLIST_ORDER[..self.len() as usize]
            .iter()
            .rev()
            .map(|&index| Specifier::from_u5(index))
    }
}

impl Instruction {
    /// Decode a 32-bit instruction.
    ///
    /// `raw_instruction & 0b11` must be `0b11`, otherwise [`DecodeError::UnsupportedOpcode`] is
    /// returned. Use [`Instruction::decode_compressed`] for 16-bit instructions.
    pub fn decode(raw_instruction: u32) -> Result<Self, DecodeError> {
        let opcode = opcode(raw_instruction)
            .ok_or(DecodeError::UnsupportedOpcode((raw_instruction & 0x7F) as u8))?;
        match opcode {
            Opcode::OpImm => decode_op_imm(raw_instruction),
            Opcode::Auipc => Ok(Self::Auipc {
                dest: rd(raw_instruction),
                immediate: u_imm(raw_instruction),
            }),
            Opcode::Lui => Ok(Self::Lui {
                dest: rd(raw_instruction),
                immediate: u_imm(raw_instruction),
            }),
            Opcode::Op => {
                let dest = rd(raw_instruction);
                let src1 = rs1(raw_instruction);
                let src2 = rs2(raw_instruction);
                let op = r_funct(raw_instruction).ok_or(DecodeError::IllegalInstruction)?;
                Ok(match (op, u8::from(dest), u8::from(src1), u8::from(src2)) {
                    (RegRegOp::Slt, 0, 0, 0) => Self::Block,
                    (RegRegOp::Slt, 0, 0, 1) => Self::Unblock,
                    _ => Self::Op {
                        op,
                        dest,
                        src1,
                        src2,
                    },
                })
            }
            Opcode::Jal => Ok(Self::Jal {
                dest: rd(raw_instruction),
                offset: j_imm(raw_instruction),
            }),
            Opcode::Jalr if funct3(raw_instruction) == 0 => Ok(Self::Jalr {
                dest: rd(raw_instruction),
                base: rs1(raw_instruction),
                offset: i_imm(raw_instruction),
            }),
            Opcode::Jalr => Err(DecodeError::IllegalInstruction),
            Opcode::Branch => match b_funct(raw_instruction) {
                Some(condition) => Ok(Self::Branch {
                    condition,
                    src1: rs1(raw_instruction),
                    src2: rs2(raw_instruction),
                    offset: b_imm(raw_instruction),
                }),
                None => Err(DecodeError::IllegalInstruction),
            },
            Opcode::Load => match i_width(raw_instruction) {
                Some(width) => Ok(Self::Load {
                    width,
                    dest: rd(raw_instruction),
                    base: rs1(raw_instruction),
                    offset: i_imm(raw_instruction),
                }),
                None => Err(DecodeError::IllegalInstruction),
            },
            Opcode::Store => match s_width(raw_instruction) {
                Some(width) => Ok(Self::Store {
                    width,
                    src: rs2(raw_instruction),
                    base: rs1(raw_instruction),
                    offset: s_imm(raw_instruction),
                }),
                None => Err(DecodeError::IllegalInstruction),
            },
            Opcode::Amo => match a_funct(raw_instruction) {
                Some(AmoOp::LrW) if u8::from(rs2(raw_instruction)) != 0 => {
                    Err(DecodeError::IllegalInstruction)
                }
                Some(op) => Ok(Self::Amo {
                    op,
                    dest: rd(raw_instruction),
                    address: rs1(raw_instruction),
                    src: rs2(raw_instruction),
                }),
                None => Err(DecodeError::IllegalInstruction),
            },
            // The fence fields (fm, pred, succ) carry no meaning for a single in-order hart
            // without caches, so every fence is an ordinary one.
            Opcode::MiscMem => match funct3(raw_instruction) {
                0b000 => Ok(Self::Fence),
                0b001 => Ok(Self::FenceI),
                _ => Err(DecodeError::IllegalInstruction),
            },
            Opcode::System => decode_system(raw_instruction),
            Opcode::Custom0 => decode_custom0(raw_instruction),
        }
    }
}

fn decode_op_imm(raw_instruction: u32) -> Result<Instruction, DecodeError> {
    let dest = rd(raw_instruction);
    let src = rs1(raw_instruction);
    if let Some(op) = i_funct(raw_instruction) {
        return Ok(Instruction::OpImm {
            op,
            dest,
            src,
            immediate: i_imm(raw_instruction),
        });
    }
    if let Some(op) = i_unary_funct(raw_instruction) {
        return Ok(Instruction::OpUnary { op, dest, src });
    }
    match i_shfunct(raw_instruction) {
        Some(op) => Ok(Instruction::OpShiftImm {
            op,
            dest,
            src,
            shift_amount_u5: shamt(raw_instruction),
        }),
        None => Err(DecodeError::IllegalInstruction),
    }
}

fn decode_system(raw_instruction: u32) -> Result<Instruction, DecodeError> {
    let dest = rd(raw_instruction);
    let csr = (raw_instruction >> 20) as CsrSpecifier;
    let register = CsrSource::Register(rs1(raw_instruction));
    let immediate = CsrSource::Immediate((raw_instruction >> 15) & 0x1F);
    let (op, source) = match funct3(raw_instruction) {
        0b000 => {
            return match raw_instruction {
                ECALL => Ok(Instruction::Ecall),
                EBREAK => Ok(Instruction::Ebreak),
                MRET => Ok(Instruction::Mret),
                WFI => Ok(Instruction::Wfi),
                _ => Err(DecodeError::IllegalInstruction),
            }
        }
        0b001 => (CsrOp::Write, register),
        0b010 => (CsrOp::Set, register),
        0b011 => (CsrOp::Clear, register),
        0b101 => (CsrOp::Write, immediate),
        0b110 => (CsrOp::Set, immediate),
        0b111 => (CsrOp::Clear, immediate),
        _ => return Err(DecodeError::IllegalInstruction),
    };
    Ok(Instruction::Csr {
        op,
        dest,
        csr,
        source,
    })
}

/// Decodes the Xh3b instructions in the custom-0 opcode space.
///
/// Both instructions encode `size - 1` in bits `28:26`. Bits `31:29` and `25` must be zero.
fn decode_custom0(raw_instruction: u32) -> Result<Instruction, DecodeError> {
    if raw_instruction & 0xE200_0000 != 0 {
        return Err(DecodeError::IllegalInstruction);
    }
    let size = ((raw_instruction >> 26) & 0b111) + 1;
    match funct3(raw_instruction) {
        0b000 => Ok(Instruction::BextM {
            dest: rd(raw_instruction),
            src1: rs1(raw_instruction),
            src2: rs2(raw_instruction),
            size,
        }),
        0b100 => Ok(Instruction::BextMi {
            dest: rd(raw_instruction),
            src: rs1(raw_instruction),
            shift_amount_u5: shamt(raw_instruction),
            size,
        }),
        _ => Err(DecodeError::IllegalInstruction),
    }
}

const ECALL: u32 = 0x0000_0073;
const EBREAK: u32 = 0x0010_0073;
const MRET: u32 = 0x3020_0073;
const WFI: u32 = 0x1050_0073;

#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum DecodeError {
    #[error("instruction has unsupported opcode {0:#04x}")]
    UnsupportedOpcode(u8),
    #[error("illegal instruction")]
    IllegalInstruction,
    #[error("reserved compressed instruction")]
    Reserved,
}

/// Returns the 7-bit *opcode* value of the instruction, or `None` if it isn't supported.
fn opcode(raw_instruction: u32) -> Option<Opcode> {
    #[allow(clippy::unusual_byte_groupings)]
    match raw_instruction & 0x7F {
        0b00_000_11 => Some(Opcode::Load),
        0b00_010_11 => Some(Opcode::Custom0),
        0b00_011_11 => Some(Opcode::MiscMem),
        0b00_100_11 => Some(Opcode::OpImm),
        0b00_101_11 => Some(Opcode::Auipc),
        0b01_000_11 => Some(Opcode::Store),
        0b01_011_11 => Some(Opcode::Amo),
        0b01_100_11 => Some(Opcode::Op),
        0b01_101_11 => Some(Opcode::Lui),
        0b11_000_11 => Some(Opcode::Branch),
        0b11_001_11 => Some(Opcode::Jalr),
        0b11_011_11 => Some(Opcode::Jal),
        0b11_100_11 => Some(Opcode::System),
        _ => None,
    }
}

/// Returns the 5-bit *rd* value for R-type, I-type, U-type, J-type instructions.
fn rd(raw_instruction: u32) -> Specifier {
    Specifier::from_u5(((raw_instruction >> 7) & 0x1F) as u8)
}

/// Returns the 5-bit *rs1* value for R-type, I-type, S-type, B-type instructions.
fn rs1(raw_instruction: u32) -> Specifier {
    Specifier::from_u5(((raw_instruction >> 15) & 0x1F) as u8)
}

/// Returns the 5-bit *rs2* value for R-type, S-type, B-type instructions.
fn rs2(raw_instruction: u32) -> Specifier {
    Specifier::from_u5(((raw_instruction >> 20) & 0x1F) as u8)
}

fn i_funct(raw_instruction: u32) -> Option<RegImmOp> {
    match funct3(raw_instruction) {
        0b000 => Some(RegImmOp::Addi),
        0b010 => Some(RegImmOp::Slti),
        0b011 => Some(RegImmOp::Sltiu),
        0b100 => Some(RegImmOp::Xori),
        0b110 => Some(RegImmOp::Ori),
        0b111 => Some(RegImmOp::Andi),
        _ => None,
    }
}

/// Single-source operations are identified by the full 12-bit immediate field.
fn i_unary_funct(raw_instruction: u32) -> Option<UnaryOp> {
    match (funct3(raw_instruction), raw_instruction >> 20) {
        (0b001, 0x600) => Some(UnaryOp::Clz),
        (0b001, 0x601) => Some(UnaryOp::Ctz),
        (0b001, 0x602) => Some(UnaryOp::Cpop),
        (0b001, 0x604) => Some(UnaryOp::SextB),
        (0b001, 0x605) => Some(UnaryOp::SextH),
        (0b001, 0x08F) => Some(UnaryOp::Zip),
        (0b101, 0x08F) => Some(UnaryOp::Unzip),
        (0b101, 0x287) => Some(UnaryOp::OrcB),
        (0b101, 0x698) => Some(UnaryOp::Rev8),
        (0b101, 0x687) => Some(UnaryOp::Brev8),
        _ => None,
    }
}

/// Shift-like immediate operations, where `imm[11:5]` acts as a *funct7*. Since the shift amount
/// is only 5 bits on RV32, `imm[5]` set is an illegal encoding.
fn i_shfunct(raw_instruction: u32) -> Option<RegShiftImmOp> {
    match (funct7(raw_instruction), funct3(raw_instruction)) {
        (0b0000000, 0b001) => Some(RegShiftImmOp::Slli),
        (0b0000000, 0b101) => Some(RegShiftImmOp::Srli),
        (0b0100000, 0b101) => Some(RegShiftImmOp::Srai),
        (0b0110000, 0b101) => Some(RegShiftImmOp::Rori),
        (0b0100100, 0b001) => Some(RegShiftImmOp::Bclri),
        (0b0010100, 0b001) => Some(RegShiftImmOp::Bseti),
        (0b0110100, 0b001) => Some(RegShiftImmOp::Binvi),
        (0b0100100, 0b101) => Some(RegShiftImmOp::Bexti),
        _ => None,
    }
}

fn i_width(raw_instruction: u32) -> Option<LoadWidth> {
    match funct3(raw_instruction) {
        0b000 => Some(LoadWidth::Lb),
        0b001 => Some(LoadWidth::Lh),
        0b010 => Some(LoadWidth::Lw),
        0b100 => Some(LoadWidth::Lbu),
        0b101 => Some(LoadWidth::Lhu),
        _ => None,
    }
}

fn s_width(raw_instruction: u32) -> Option<StoreWidth> {
    match funct3(raw_instruction) {
        0b000 => Some(StoreWidth::Sb),
        0b001 => Some(StoreWidth::Sh),
        0b010 => Some(StoreWidth::Sw),
        _ => None,
    }
}

fn r_funct(raw_instruction: u32) -> Option<RegRegOp> {
    use RegRegOp::*;
    match (funct7(raw_instruction), funct3(raw_instruction)) {
        (0b0000000, 0b000) => Some(Add),
        (0b0000000, 0b001) => Some(Sll),
        (0b0000000, 0b010) => Some(Slt),
        (0b0000000, 0b011) => Some(Sltu),
        (0b0000000, 0b100) => Some(Xor),
        (0b0000000, 0b101) => Some(Srl),
        (0b0000000, 0b110) => Some(Or),
        (0b0000000, 0b111) => Some(And),
        (0b0100000, 0b000) => Some(Sub),
        (0b0100000, 0b100) => Some(Xnor),
        (0b0100000, 0b101) => Some(Sra),
        (0b0100000, 0b110) => Some(Orn),
        (0b0100000, 0b111) => Some(Andn),
        (0b0000001, 0b000) => Some(Mul),
        (0b0000001, 0b001) => Some(Mulh),
        (0b0000001, 0b010) => Some(Mulhsu),
        (0b0000001, 0b011) => Some(Mulhu),
        (0b0000001, 0b100) => Some(Div),
        (0b0000001, 0b101) => Some(Divu),
        (0b0000001, 0b110) => Some(Rem),
        (0b0000001, 0b111) => Some(Remu),
        (0b0010000, 0b010) => Some(Sh1add),
        (0b0010000, 0b100) => Some(Sh2add),
        (0b0010000, 0b110) => Some(Sh3add),
        (0b0000101, 0b001) => Some(Clmul),
        (0b0000101, 0b010) => Some(Clmulr),
        (0b0000101, 0b011) => Some(Clmulh),
        (0b0000101, 0b100) => Some(Min),
        (0b0000101, 0b101) => Some(Minu),
        (0b0000101, 0b110) => Some(Max),
        (0b0000101, 0b111) => Some(Maxu),
        (0b0110000, 0b001) => Some(Rol),
        (0b0110000, 0b101) => Some(Ror),
        (0b0100100, 0b001) => Some(Bclr),
        (0b0100100, 0b101) => Some(Bext),
        (0b0110100, 0b001) => Some(Binv),
        (0b0010100, 0b001) => Some(Bset),
        (0b0000100, 0b100) => Some(Pack),
        (0b0000100, 0b111) => Some(Packh),
        _ => None,
    }
}

fn b_funct(raw_instruction: u32) -> Option<BranchCondition> {
    match funct3(raw_instruction) {
        0b000 => Some(BranchCondition::Beq),
        0b001 => Some(BranchCondition::Bne),
        0b100 => Some(BranchCondition::Blt),
        0b101 => Some(BranchCondition::Bge),
        0b110 => Some(BranchCondition::Bltu),
        0b111 => Some(BranchCondition::Bgeu),
        _ => None,
    }
}

/// Decodes the A extension, only word-sized operations (funct3 `0b010`) exist on RV32.
fn a_funct(raw_instruction: u32) -> Option<AmoOp> {
    if funct3(raw_instruction) != 0b010 {
        return None;
    }
    match raw_instruction >> 27 {
        0b00010 => Some(AmoOp::LrW),
        0b00011 => Some(AmoOp::ScW),
        0b00001 => Some(AmoOp::Swap),
        0b00000 => Some(AmoOp::Add),
        0b00100 => Some(AmoOp::Xor),
        0b01100 => Some(AmoOp::And),
        0b01000 => Some(AmoOp::Or),
        0b10000 => Some(AmoOp::Min),
        0b10100 => Some(AmoOp::Max),
        0b11000 => Some(AmoOp::Minu),
        0b11100 => Some(AmoOp::Maxu),
        _ => None,
    }
}

/// Returns the 3-bit *funct3* value for R-type, I-type, S-type, B-type instructions.
fn funct3(raw_instruction: u32) -> u8 {
    ((raw_instruction >> 12) & 0b111) as u8
}

/// Returns the 7-bit *funct7* value for R-type instructions.
fn funct7(raw_instruction: u32) -> u8 {
    (raw_instruction >> 25) as u8
}

/// Returns the 5-bit *shamt* value for shift-immediate instructions.
fn shamt(raw_instruction: u32) -> u32 {
    (raw_instruction >> 20) & 0x1F
}

/// Returns the 12-bit I-immediate sign-extended to 32 bits.
fn i_imm(raw_instruction: u32) -> i32 {
    raw_instruction as i32 >> 20
}

/// Returns the 12-bit S-immediate sign-extended to 32 bits.
fn s_imm(raw_instruction: u32) -> i32 {
    let imm_11_5 = raw_instruction & 0xFE00_0000;
    let imm_4_0 = raw_instruction & 0x0000_0F80;
    (imm_11_5 | (imm_4_0 << 13)) as i32 >> 20
}

/// Returns the 13-bit B-immediate sign-extended to 32 bits.
fn b_imm(raw_instruction: u32) -> i32 {
    let imm_12 = raw_instruction & 0x8000_0000;
    let imm_10_5 = raw_instruction & 0x7E00_0000;
    let imm_4_1 = raw_instruction & 0x0000_0F00;
    let imm_11 = raw_instruction & 0x0000_0080;
    (imm_12 | (imm_11 << 23) | (imm_10_5 >> 1) | (imm_4_1 << 12)) as i32 >> 19
}

/// Returns the signed 32-bit U-immediate.
fn u_imm(raw_instruction: u32) -> i32 {
    (raw_instruction & 0xFFFF_F000) as i32
}

/// Returns the 21-bit J-immediate sign-extended to 32 bits.
fn j_imm(raw_instruction: u32) -> i32 {
    let imm_20 = raw_instruction & 0x8000_0000;
    let imm_10_1 = raw_instruction & 0x7FE0_0000;
    let imm_11 = raw_instruction & 0x0010_0000;
    let imm_19_12 = raw_instruction & 0x000F_F000;
    (imm_20 | (imm_19_12 << 11) | (imm_11 << 2) | (imm_10_1 >> 9)) as i32 >> 11
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum Opcode {
    OpImm,
    Auipc,
    Lui,
    Op,
    Jal,
    Jalr,
    Branch,
    Load,
    Store,
    Amo,
    MiscMem,
    System,
    Custom0,
}
