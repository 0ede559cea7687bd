//! Minimal assembler for hand-written test programs.

#![allow(dead_code)]

use hazard_sim_core::bus::Bus;
use hazard_sim_core::core::{Config, Core, Step};
use hazard_sim_core::resources::ram::Ram;

pub const ZERO: u32 = 0;
pub const RA: u32 = 1;
pub const SP: u32 = 2;
pub const T0: u32 = 5;
pub const T1: u32 = 6;
pub const T2: u32 = 7;
pub const S0: u32 = 8;
pub const A0: u32 = 10;
pub const A1: u32 = 11;
pub const A2: u32 = 12;

pub const MSTATUS: u32 = 0x300;
pub const MIE: u32 = 0x304;
pub const MTVEC: u32 = 0x305;
pub const MEPC: u32 = 0x341;
pub const MCAUSE: u32 = 0x342;
pub const PMPCFG0: u32 = 0x3a0;
pub const PMPADDR0: u32 = 0x3b0;
pub const MCYCLE: u32 = 0xb00;
pub const MHARTID: u32 = 0xf14;
pub const MEIEA: u32 = 0xbe0;
pub const MEIPRA: u32 = 0xbe3;
pub const MEINEXT: u32 = 0xbe4;

fn i_type(imm: i32, rs1: u32, funct3: u32, rd: u32, opcode: u32) -> u32 {
    (imm as u32) << 20 | rs1 << 15 | funct3 << 12 | rd << 7 | opcode
}

fn s_type(imm: i32, rs2: u32, rs1: u32, funct3: u32) -> u32 {
    let imm = imm as u32;
    (imm >> 5 & 0x7f) << 25 | rs2 << 20 | rs1 << 15 | funct3 << 12 | (imm & 0x1f) << 7 | 0x23
}

pub fn addi(rd: u32, rs1: u32, imm: i32) -> u32 {
    i_type(imm, rs1, 0, rd, 0x13)
}

pub fn lui(rd: u32, imm_u20: u32) -> u32 {
    imm_u20 << 12 | rd << 7 | 0x37
}

pub fn lw(rd: u32, rs1: u32, imm: i32) -> u32 {
    i_type(imm, rs1, 2, rd, 0x03)
}

pub fn sw(rs2: u32, rs1: u32, imm: i32) -> u32 {
    s_type(imm, rs2, rs1, 2)
}

pub fn bne(rs1: u32, rs2: u32, offset: i32) -> u32 {
    let imm = offset as u32;
    (imm >> 12 & 1) << 31
        | (imm >> 5 & 0x3f) << 25
        | rs2 << 20
        | rs1 << 15
        | 1 << 12
        | (imm >> 1 & 0xf) << 8
        | (imm >> 11 & 1) << 7
        | 0x63
}

/// `jal x0, 0`, an endless loop.
pub fn spin() -> u32 {
    0x0000_006f
}

pub fn csrrw(rd: u32, csr: u32, rs1: u32) -> u32 {
    csr << 20 | rs1 << 15 | 1 << 12 | rd << 7 | 0x73
}

pub fn csrrs(rd: u32, csr: u32, rs1: u32) -> u32 {
    csr << 20 | rs1 << 15 | 2 << 12 | rd << 7 | 0x73
}

pub fn csrrsi(rd: u32, csr: u32, uimm: u32) -> u32 {
    csr << 20 | uimm << 15 | 6 << 12 | rd << 7 | 0x73
}

pub fn csrw(csr: u32, rs1: u32) -> u32 {
    csrrw(ZERO, csr, rs1)
}

pub fn csrr(rd: u32, csr: u32) -> u32 {
    csrrs(rd, csr, ZERO)
}

pub fn ecall() -> u32 {
    0x0000_0073
}

pub fn mret() -> u32 {
    0x3020_0073
}

fn amo(funct5: u32, rd: u32, rs1: u32, rs2: u32) -> u32 {
    funct5 << 27 | rs2 << 20 | rs1 << 15 | 2 << 12 | rd << 7 | 0x2f
}

pub fn lr_w(rd: u32, rs1: u32) -> u32 {
    amo(0b00010, rd, rs1, ZERO)
}

pub fn sc_w(rd: u32, rs1: u32, rs2: u32) -> u32 {
    amo(0b00011, rd, rs1, rs2)
}

pub fn amoadd_w(rd: u32, rs1: u32, rs2: u32) -> u32 {
    amo(0b00000, rd, rs1, rs2)
}

/// Place `words` in `bus` starting at `address`.
pub fn place(bus: &mut impl Bus, address: u32, words: &[u32]) {
    for (i, &word) in words.iter().enumerate() {
        assert!(bus.write_word(address + 4 * i as u32, word));
    }
}

/// A single hart with 4 KiB of RAM, with `program` at the reset vector.
pub fn hart(program: &[u32]) -> (Core, Ram) {
    let mut ram = Ram::new(0x1000).unwrap();
    let core = Core::new(Config::default());
    place(&mut ram, core.config().reset_vector, program);
    (core, ram)
}

pub fn run(core: &mut Core, ram: &mut Ram, cycles: usize) -> Vec<Step> {
    (0..cycles).map(|_| core.step(ram)).collect()
}
