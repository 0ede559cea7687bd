//! Pure integer operations of the base ISA and the M, Zba, Zbb, Zbc, Zbs and Zbkb extensions.
//!
//! Every operation is a plain function on register values, so the executor can select one by
//! opcode and apply it uniformly.

use crate::instruction::{RegImmOp, RegRegOp, RegShiftImmOp, UnaryOp};

pub type RegRegFn = fn(u32, u32) -> u32;
pub type RegImmFn = fn(u32, i32) -> u32;
pub type UnaryFn = fn(u32) -> u32;

pub fn reg_imm(op: RegImmOp) -> RegImmFn {
    match op {
        RegImmOp::Addi => |s, imm| s.wrapping_add_signed(imm),
        RegImmOp::Slti => |s, imm| ((s as i32) < imm) as u32,
        RegImmOp::Sltiu => |s, imm| (s < imm as u32) as u32,
        RegImmOp::Xori => |s, imm| s ^ imm as u32,
        RegImmOp::Ori => |s, imm| s | imm as u32,
        RegImmOp::Andi => |s, imm| s & imm as u32,
    }
}

/// Immediate shifts and single-bit operations behave like their register-register counterparts,
/// with the shift amount in place of `rs2`.
pub fn shift_imm(op: RegShiftImmOp) -> RegRegFn {
    reg_reg(match op {
        RegShiftImmOp::Slli => RegRegOp::Sll,
        RegShiftImmOp::Srli => RegRegOp::Srl,
        RegShiftImmOp::Srai => RegRegOp::Sra,
        RegShiftImmOp::Rori => RegRegOp::Ror,
        RegShiftImmOp::Bclri => RegRegOp::Bclr,
        RegShiftImmOp::Bseti => RegRegOp::Bset,
        RegShiftImmOp::Binvi => RegRegOp::Binv,
        RegShiftImmOp::Bexti => RegRegOp::Bext,
    })
}

pub fn reg_reg(op: RegRegOp) -> RegRegFn {
    match op {
        RegRegOp::Add => |s1, s2| s1.wrapping_add(s2),
        RegRegOp::Sub => |s1, s2| s1.wrapping_sub(s2),
        RegRegOp::Slt => |s1, s2| ((s1 as i32) < (s2 as i32)) as u32,
        RegRegOp::Sltu => |s1, s2| (s1 < s2) as u32,
        RegRegOp::And => |s1, s2| s1 & s2,
        RegRegOp::Or => |s1, s2| s1 | s2,
        RegRegOp::Xor => |s1, s2| s1 ^ s2,
        RegRegOp::Sll => |s1, s2| s1 << (s2 & 0x1f),
        RegRegOp::Srl => |s1, s2| s1 >> (s2 & 0x1f),
        RegRegOp::Sra => |s1, s2| ((s1 as i32) >> (s2 & 0x1f)) as u32,
        RegRegOp::Mul => |s1, s2| s1.wrapping_mul(s2),
        RegRegOp::Mulh => |s1, s2| ((s1 as i32 as i64 * s2 as i32 as i64) >> 32) as u32,
        RegRegOp::Mulhsu => |s1, s2| ((s1 as i32 as i64 * s2 as i64) >> 32) as u32,
        RegRegOp::Mulhu => |s1, s2| ((s1 as u64 * s2 as u64) >> 32) as u32,
        RegRegOp::Div => div,
        RegRegOp::Divu => |s1, s2| s1.checked_div(s2).unwrap_or(u32::MAX),
        RegRegOp::Rem => rem,
        RegRegOp::Remu => |s1, s2| s1.checked_rem(s2).unwrap_or(s1),
        RegRegOp::Sh1add => |s1, s2| (s1 << 1).wrapping_add(s2),
        RegRegOp::Sh2add => |s1, s2| (s1 << 2).wrapping_add(s2),
        RegRegOp::Sh3add => |s1, s2| (s1 << 3).wrapping_add(s2),
        RegRegOp::Andn => |s1, s2| s1 & !s2,
        RegRegOp::Orn => |s1, s2| s1 | !s2,
        RegRegOp::Xnor => |s1, s2| !(s1 ^ s2),
        RegRegOp::Min => |s1, s2| (s1 as i32).min(s2 as i32) as u32,
        RegRegOp::Max => |s1, s2| (s1 as i32).max(s2 as i32) as u32,
        RegRegOp::Minu => |s1, s2| s1.min(s2),
        RegRegOp::Maxu => |s1, s2| s1.max(s2),
        RegRegOp::Rol => |s1, s2| s1.rotate_left(s2 & 0x1f),
        RegRegOp::Ror => |s1, s2| s1.rotate_right(s2 & 0x1f),
        RegRegOp::Pack => |s1, s2| s1 & 0xffff | s2 << 16,
        RegRegOp::Packh => |s1, s2| s1 & 0xff | (s2 & 0xff) << 8,
        RegRegOp::Clmul => clmul,
        RegRegOp::Clmulh => clmulh,
        RegRegOp::Clmulr => clmulr,
        RegRegOp::Bclr => |s1, s2| s1 & !(1 << (s2 & 0x1f)),
        RegRegOp::Bset => |s1, s2| s1 | 1 << (s2 & 0x1f),
        RegRegOp::Binv => |s1, s2| s1 ^ 1 << (s2 & 0x1f),
        RegRegOp::Bext => |s1, s2| (s1 >> (s2 & 0x1f)) & 1,
    }
}

pub fn unary(op: UnaryOp) -> UnaryFn {
    match op {
        UnaryOp::Clz => u32::leading_zeros,
        UnaryOp::Ctz => u32::trailing_zeros,
        UnaryOp::Cpop => u32::count_ones,
        UnaryOp::SextB => |s| s as i8 as u32,
        UnaryOp::SextH => |s| s as i16 as u32,
        UnaryOp::OrcB => |s| {
            u32::from_le_bytes(s.to_le_bytes().map(|byte| if byte == 0 { 0 } else { 0xff }))
        },
        UnaryOp::Rev8 => u32::swap_bytes,
        UnaryOp::Brev8 => |s| u32::from_le_bytes(s.to_le_bytes().map(u8::reverse_bits)),
        UnaryOp::Zip => zip,
        UnaryOp::Unzip => unzip,
    }
}

/// `h3.bextm`: extract a field of `size` bits (`1..=8`) starting at bit `shamt[4:0]`.
pub fn bextm(s1: u32, shamt: u32, size: u32) -> u32 {
    (s1 >> (shamt & 0x1f)) & !(u32::MAX << size)
}

/// > The quotient of division by zero has all bits set, and the remainder of division by zero
/// > equals the dividend. Signed division overflow occurs only when the most-negative integer is
/// > divided by −1. The quotient of a signed division with overflow is equal to the dividend, and
/// > the remainder is zero.
fn div(s1: u32, s2: u32) -> u32 {
    match s2 {
        0 => u32::MAX,
        _ => (s1 as i32).wrapping_div(s2 as i32) as u32,
    }
}

fn rem(s1: u32, s2: u32) -> u32 {
    match s2 {
        0 => s1,
        _ => (s1 as i32).wrapping_rem(s2 as i32) as u32,
    }
}

fn clmul(s1: u32, s2: u32) -> u32 {
    (0..32)
        .filter(|i| (s2 >> i) & 1 != 0)
        .fold(0, |acc, i| acc ^ s1 << i)
}

fn clmulh(s1: u32, s2: u32) -> u32 {
    (1..32)
        .filter(|i| (s2 >> i) & 1 != 0)
        .fold(0, |acc, i| acc ^ s1 >> (32 - i))
}

fn clmulr(s1: u32, s2: u32) -> u32 {
    (0..32)
        .filter(|i| (s2 >> i) & 1 != 0)
        .fold(0, |acc, i| acc ^ s1 >> (31 - i))
}

/// Interleave the low half into the even bits and the high half into the odd bits.
fn zip(s: u32) -> u32 {
    (0..16).fold(0, |acc, i| {
        acc | ((s >> i) & 1) << (2 * i) | ((s >> (i + 16)) & 1) << (2 * i + 1)
    })
}

fn unzip(s: u32) -> u32 {
    (0..16).fold(0, |acc, i| {
        acc | ((s >> (2 * i)) & 1) << i | ((s >> (2 * i + 1)) & 1) << (i + 16)
    })
}
