//! Decoding of the C and Zcmp 16-bit instruction formats.

use super::{
    BranchCondition, DecodeError, Instruction, LoadWidth, PopReturn, RegImmOp, RegRegOp,
    RegShiftImmOp, RegisterList, StoreWidth,
};
use crate::registers::Specifier;

impl Instruction {
    /// Decode a 16-bit compressed instruction into its 32-bit equivalent.
    ///
    /// `raw_instruction & 0b11` must not be `0b11`. Reserved encodings, including the all-zero
    /// halfword, decode to [`DecodeError::Reserved`].
    pub fn decode_compressed(raw_instruction: u16) -> Result<Self, DecodeError> {
        let raw = raw_instruction as u32;
        match raw & 0b11 {
            0b00 => decode_quadrant0(raw),
            0b01 => decode_quadrant1(raw),
            0b10 => decode_quadrant2(raw),
            _ => Err(DecodeError::UnsupportedOpcode((raw & 0x7F) as u8)),
        }
    }
}

fn decode_quadrant0(raw: u32) -> Result<Instruction, DecodeError> {
    match funct3(raw) {
        // c.addi4spn
        0b000 => {
            let immediate = (bits(raw, 12, 11) << 4)
                | (bits(raw, 10, 7) << 6)
                | (bit(raw, 6) << 2)
                | (bit(raw, 5) << 3);
            if immediate == 0 {
                // Also covers the all-zero illegal instruction.
                return Err(DecodeError::Reserved);
            }
            Ok(Instruction::OpImm {
                op: RegImmOp::Addi,
                dest: rs2_s(raw),
                src: Specifier::SP,
                immediate: immediate as i32,
            })
        }
        0b010 => Ok(Instruction::Load {
            width: LoadWidth::Lw,
            dest: rs2_s(raw),
            base: rs1_s(raw),
            offset: clsw_offset(raw),
        }),
        0b110 => Ok(Instruction::Store {
            width: StoreWidth::Sw,
            src: rs2_s(raw),
            base: rs1_s(raw),
            offset: clsw_offset(raw),
        }),
        _ => Err(DecodeError::IllegalInstruction),
    }
}

fn decode_quadrant1(raw: u32) -> Result<Instruction, DecodeError> {
    let rd = rs1_l(raw);
    match funct3(raw) {
        // c.addi, c.nop
        0b000 => Ok(Instruction::OpImm {
            op: RegImmOp::Addi,
            dest: rd,
            src: rd,
            immediate: ci_imm(raw),
        }),
        // c.jal
        0b001 => Ok(Instruction::Jal {
            dest: Specifier::RA,
            offset: cj_imm(raw),
        }),
        // c.li
        0b010 => Ok(Instruction::OpImm {
            op: RegImmOp::Addi,
            dest: rd,
            src: Specifier::X0,
            immediate: ci_imm(raw),
        }),
        // c.addi16sp
        0b011 if rd == Specifier::SP => {
            let immediate = -((bit(raw, 12) << 9) as i32)
                + ((bit(raw, 6) << 4)
                    | (bit(raw, 5) << 6)
                    | (bits(raw, 4, 3) << 7)
                    | (bit(raw, 2) << 5)) as i32;
            if immediate == 0 {
                return Err(DecodeError::Reserved);
            }
            Ok(Instruction::OpImm {
                op: RegImmOp::Addi,
                dest: Specifier::SP,
                src: Specifier::SP,
                immediate,
            })
        }
        // c.lui
        0b011 => {
            let immediate = ci_imm(raw) << 12;
            if immediate == 0 {
                return Err(DecodeError::Reserved);
            }
            Ok(Instruction::Lui {
                dest: rd,
                immediate,
            })
        }
        0b100 => decode_arith(raw),
        // c.j
        0b101 => Ok(Instruction::Jal {
            dest: Specifier::X0,
            offset: cj_imm(raw),
        }),
        // c.beqz, c.bnez
        _ => Ok(Instruction::Branch {
            condition: if funct3(raw) == 0b110 {
                BranchCondition::Beq
            } else {
                BranchCondition::Bne
            },
            src1: rs1_s(raw),
            src2: Specifier::X0,
            offset: cb_imm(raw),
        }),
    }
}

/// Decodes `c.srli`, `c.srai`, `c.andi` and the register-register group (`c.sub` etc.).
fn decode_arith(raw: u32) -> Result<Instruction, DecodeError> {
    let rd = rs1_s(raw);
    let shift = |op| {
        if bit(raw, 12) != 0 {
            // shamt[5] must be zero on RV32
            Err(DecodeError::Reserved)
        } else {
            Ok(Instruction::OpShiftImm {
                op,
                dest: rd,
                src: rd,
                shift_amount_u5: bits(raw, 6, 2),
            })
        }
    };
    match bits(raw, 11, 10) {
        0b00 => shift(RegShiftImmOp::Srli),
        0b01 => shift(RegShiftImmOp::Srai),
        0b10 => Ok(Instruction::OpImm {
            op: RegImmOp::Andi,
            dest: rd,
            src: rd,
            immediate: ci_imm(raw),
        }),
        _ => {
            if bit(raw, 12) != 0 {
                return Err(DecodeError::Reserved);
            }
            let op = match bits(raw, 6, 5) {
                0b00 => RegRegOp::Sub,
                0b01 => RegRegOp::Xor,
                0b10 => RegRegOp::Or,
                _ => RegRegOp::And,
            };
            Ok(Instruction::Op {
                op,
                dest: rd,
                src1: rd,
                src2: rs2_s(raw),
            })
        }
    }
}

fn decode_quadrant2(raw: u32) -> Result<Instruction, DecodeError> {
    let rd = rs1_l(raw);
    let rs2 = rs2_l(raw);
    match funct3(raw) {
        // c.slli
        0b000 => {
            if bit(raw, 12) != 0 {
                return Err(DecodeError::Reserved);
            }
            Ok(Instruction::OpShiftImm {
                op: RegShiftImmOp::Slli,
                dest: rd,
                src: rd,
                shift_amount_u5: bits(raw, 6, 2),
            })
        }
        // c.lwsp
        0b010 => {
            if rd == Specifier::X0 {
                return Err(DecodeError::Reserved);
            }
            let offset = (bit(raw, 12) << 5) | (bits(raw, 6, 4) << 2) | (bits(raw, 3, 2) << 6);
            Ok(Instruction::Load {
                width: LoadWidth::Lw,
                dest: rd,
                base: Specifier::SP,
                offset: offset as i32,
            })
        }
        0b100 => match (bit(raw, 12), rd, rs2) {
            // c.jr
            (0, Specifier::X0, Specifier::X0) => Err(DecodeError::Reserved),
            (0, base, Specifier::X0) => Ok(Instruction::Jalr {
                dest: Specifier::X0,
                base,
                offset: 0,
            }),
            // c.mv
            (0, dest, src2) => Ok(Instruction::Op {
                op: RegRegOp::Add,
                dest,
                src1: Specifier::X0,
                src2,
            }),
            (_, Specifier::X0, Specifier::X0) => Ok(Instruction::Ebreak),
            // c.jalr
            (_, base, Specifier::X0) => Ok(Instruction::Jalr {
                dest: Specifier::RA,
                base,
                offset: 0,
            }),
            // c.add
            (_, dest, src2) => Ok(Instruction::Op {
                op: RegRegOp::Add,
                dest,
                src1: dest,
                src2,
            }),
        },
        0b101 => decode_zcmp(raw),
        // c.swsp
        0b110 => {
            let offset = (bits(raw, 12, 9) << 2) | (bits(raw, 8, 7) << 6);
            Ok(Instruction::Store {
                width: StoreWidth::Sw,
                src: rs2,
                base: Specifier::SP,
                offset: offset as i32,
            })
        }
        _ => Err(DecodeError::IllegalInstruction),
    }
}

/// Decodes the Zcmp push/pop and move instructions, which live in the `c.fsdsp` encoding space.
fn decode_zcmp(raw: u32) -> Result<Instruction, DecodeError> {
    if bits(raw, 12, 10) == 0b011 {
        let r1s = Specifier::from_saved_u3(bits(raw, 9, 7) as u8);
        let r2s = Specifier::from_saved_u3(bits(raw, 4, 2) as u8);
        return match bits(raw, 6, 5) {
            0b01 if r1s == r2s => Err(DecodeError::Reserved),
            0b01 => Ok(Instruction::CmMvsa01 { r1s, r2s }),
            0b11 => Ok(Instruction::CmMva01s { r1s, r2s }),
            _ => Err(DecodeError::IllegalInstruction),
        };
    }
    let rlist = RegisterList::new(bits(raw, 7, 4) as u8).ok_or(DecodeError::Reserved)?;
    let stack_adj = rlist.stack_adj_base() + 16 * bits(raw, 3, 2);
    match bits(raw, 12, 8) {
        0b11000 => Ok(Instruction::CmPush { rlist, stack_adj }),
        0b11010 => Ok(Instruction::CmPop {
            rlist,
            stack_adj,
            ret: PopReturn::None,
        }),
        0b11100 => Ok(Instruction::CmPop {
            rlist,
            stack_adj,
            ret: PopReturn::RetZero,
        }),
        0b11110 => Ok(Instruction::CmPop {
            rlist,
            stack_adj,
            ret: PopReturn::Ret,
        }),
        _ => Err(DecodeError::IllegalInstruction),
    }
}

fn funct3(raw: u32) -> u32 {
    bits(raw, 15, 13)
}

/// Returns bits `high..=low` of `raw`, shifted down to bit 0.
fn bits(raw: u32, high: u32, low: u32) -> u32 {
    (raw >> low) & ((1 << (high - low + 1)) - 1)
}

fn bit(raw: u32, index: u32) -> u32 {
    (raw >> index) & 1
}

/// Full register specifier in bits `11:7`.
fn rs1_l(raw: u32) -> Specifier {
    Specifier::from_u5(bits(raw, 11, 7) as u8)
}

/// Full register specifier in bits `6:2`.
fn rs2_l(raw: u32) -> Specifier {
    Specifier::from_u5(bits(raw, 6, 2) as u8)
}

/// Compressed register specifier in bits `9:7`.
fn rs1_s(raw: u32) -> Specifier {
    Specifier::from_compressed_u3(bits(raw, 9, 7) as u8)
}

/// Compressed register specifier in bits `4:2`.
fn rs2_s(raw: u32) -> Specifier {
    Specifier::from_compressed_u3(bits(raw, 4, 2) as u8)
}

/// Sign-extended 6-bit immediate of the CI format.
fn ci_imm(raw: u32) -> i32 {
    bits(raw, 6, 2) as i32 - ((bit(raw, 12) << 5) as i32)
}

/// Sign-extended 12-bit jump offset of the CJ format.
fn cj_imm(raw: u32) -> i32 {
    let magnitude = (bit(raw, 11) << 4)
        | (bits(raw, 10, 9) << 8)
        | (bit(raw, 8) << 10)
        | (bit(raw, 7) << 6)
        | (bit(raw, 6) << 7)
        | (bits(raw, 5, 3) << 1)
        | (bit(raw, 2) << 5);
    magnitude as i32 - ((bit(raw, 12) << 11) as i32)
}

/// Sign-extended 9-bit branch offset of the CB format.
fn cb_imm(raw: u32) -> i32 {
    let magnitude = (bits(raw, 11, 10) << 3)
        | (bits(raw, 6, 5) << 6)
        | (bits(raw, 4, 3) << 1)
        | (bit(raw, 2) << 5);
    magnitude as i32 - ((bit(raw, 12) << 8) as i32)
}

/// Zero-extended word offset shared by `c.lw` and `c.sw`.
fn clsw_offset(raw: u32) -> i32 {
    ((bit(raw, 6) << 2) | (bits(raw, 12, 10) << 3) | (bit(raw, 5) << 6)) as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn x(index: u8) -> Specifier {
        Specifier::from_u5(index)
    }

    #[test]
    fn test_reserved() {
        assert_eq!(
            Err(DecodeError::Reserved),
            Instruction::decode_compressed(0x0000)
        );
        // c.jr zero
        assert_eq!(
            Err(DecodeError::Reserved),
            Instruction::decode_compressed(0x8002)
        );
        // c.lui a0, 0
        assert_eq!(
            Err(DecodeError::Reserved),
            Instruction::decode_compressed(0x6501)
        );
        // c.slli a0, 32
        assert_eq!(
            Err(DecodeError::Reserved),
            Instruction::decode_compressed(0x1502)
        );
    }

    #[test]
    fn test_quadrant0() {
        // c.addi4spn a0, sp, 16
        assert_eq!(
            Ok(Instruction::OpImm {
                op: RegImmOp::Addi,
                dest: x(10),
                src: x(2),
                immediate: 16
            }),
            Instruction::decode_compressed(0x0808)
        );
        // c.lw a0, 4(a1)
        assert_eq!(
            Ok(Instruction::Load {
                width: LoadWidth::Lw,
                dest: x(10),
                base: x(11),
                offset: 4
            }),
            Instruction::decode_compressed(0x41c8)
        );
        // c.sw a0, 124(a1)
        assert_eq!(
            Ok(Instruction::Store {
                width: StoreWidth::Sw,
                src: x(10),
                base: x(11),
                offset: 124
            }),
            Instruction::decode_compressed(0xdde8)
        );
    }

    #[test]
    fn test_quadrant1() {
        // c.li a0, -1
        assert_eq!(
            Ok(Instruction::OpImm {
                op: RegImmOp::Addi,
                dest: x(10),
                src: x(0),
                immediate: -1
            }),
            Instruction::decode_compressed(0x557d)
        );
        // c.addi16sp sp, -64
        assert_eq!(
            Ok(Instruction::OpImm {
                op: RegImmOp::Addi,
                dest: x(2),
                src: x(2),
                immediate: -64
            }),
            Instruction::decode_compressed(0x7139)
        );
        // c.lui a0, 0xfffff
        assert_eq!(
            Ok(Instruction::Lui {
                dest: x(10),
                immediate: -4096
            }),
            Instruction::decode_compressed(0x757d)
        );
        // c.j -2
        assert_eq!(
            Ok(Instruction::Jal {
                dest: x(0),
                offset: -2
            }),
            Instruction::decode_compressed(0xbffd)
        );
        // c.bnez a0, 8
        assert_eq!(
            Ok(Instruction::Branch {
                condition: BranchCondition::Bne,
                src1: x(10),
                src2: x(0),
                offset: 8
            }),
            Instruction::decode_compressed(0xe501)
        );
        // c.sub a0, a1
        assert_eq!(
            Ok(Instruction::Op {
                op: RegRegOp::Sub,
                dest: x(10),
                src1: x(10),
                src2: x(11)
            }),
            Instruction::decode_compressed(0x8d0d)
        );
        // c.srai a0, 3
        assert_eq!(
            Ok(Instruction::OpShiftImm {
                op: RegShiftImmOp::Srai,
                dest: x(10),
                src: x(10),
                shift_amount_u5: 3
            }),
            Instruction::decode_compressed(0x850d)
        );
    }

    #[test]
    fn test_quadrant2() {
        // c.mv a0, a1
        assert_eq!(
            Ok(Instruction::Op {
                op: RegRegOp::Add,
                dest: x(10),
                src1: x(0),
                src2: x(11)
            }),
            Instruction::decode_compressed(0x852e)
        );
        // c.jr ra
        assert_eq!(
            Ok(Instruction::Jalr {
                dest: x(0),
                base: x(1),
                offset: 0
            }),
            Instruction::decode_compressed(0x8082)
        );
        // c.jalr a0
        assert_eq!(
            Ok(Instruction::Jalr {
                dest: x(1),
                base: x(10),
                offset: 0
            }),
            Instruction::decode_compressed(0x9502)
        );
        assert_eq!(Ok(Instruction::Ebreak), Instruction::decode_compressed(0x9002));
        // c.lwsp ra, 12(sp)
        assert_eq!(
            Ok(Instruction::Load {
                width: LoadWidth::Lw,
                dest: x(1),
                base: x(2),
                offset: 12
            }),
            Instruction::decode_compressed(0x40b2)
        );
        // c.swsp ra, 12(sp)
        assert_eq!(
            Ok(Instruction::Store {
                width: StoreWidth::Sw,
                src: x(1),
                base: x(2),
                offset: 12
            }),
            Instruction::decode_compressed(0xc606)
        );
    }

    #[test]
    fn test_zcmp() {
        // cm.push {ra, s0-s1}, -16
        let Ok(Instruction::CmPush { rlist, stack_adj }) = Instruction::decode_compressed(0xb862)
        else {
            panic!("expected cm.push");
        };
        assert_eq!(3, rlist.len());
        assert_eq!(16, stack_adj);
        // cm.popret {ra, s0-s11}, 112
        assert_eq!(
            Ok(Instruction::CmPop {
                rlist: RegisterList::new(15).unwrap(),
                stack_adj: 112,
                ret: PopReturn::Ret
            }),
            Instruction::decode_compressed(0xbefe)
        );
        // cm.popretz {ra}, 16
        assert_eq!(
            Ok(Instruction::CmPop {
                rlist: RegisterList::new(4).unwrap(),
                stack_adj: 16,
                ret: PopReturn::RetZero
            }),
            Instruction::decode_compressed(0xbc42)
        );
        // cm.push with rlist < 4 is reserved
        assert_eq!(
            Err(DecodeError::Reserved),
            Instruction::decode_compressed(0xb832)
        );
        // cm.mvsa01 s0, s2
        assert_eq!(
            Ok(Instruction::CmMvsa01 {
                r1s: x(8),
                r2s: x(18)
            }),
            Instruction::decode_compressed(0xac2a)
        );
        // cm.mva01s s1, s0
        assert_eq!(
            Ok(Instruction::CmMva01s {
                r1s: x(9),
                r2s: x(8)
            }),
            Instruction::decode_compressed(0xace2)
        );
        // cm.mvsa01 s0, s0
        assert_eq!(
            Err(DecodeError::Reserved),
            Instruction::decode_compressed(0xac22)
        );
    }
}
