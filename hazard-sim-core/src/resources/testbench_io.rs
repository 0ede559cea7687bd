use crate::bus::Bus;
use log::{info, warn};
use std::io::Write;

/// Offsets of the testbench registers, relative to the base of the device.
pub mod offset {
    /// Write a character (low 8 bits) to the console.
    pub const PRINT_CHAR: u32 = 0x000;
    /// Write a word to the console as 8 hex digits followed by a newline.
    pub const PRINT_U32: u32 = 0x004;
    /// Halt the simulation with the written value as exit code.
    pub const EXIT: u32 = 0x008;
    /// Set software interrupt lines, bit *i* targets hart *i*. Reads return the lines.
    pub const SET_SOFTIRQ: u32 = 0x010;
    /// Clear software interrupt lines, bit *i* targets hart *i*. Reads return the lines.
    pub const CLR_SOFTIRQ: u32 = 0x014;
    /// Global monitor enable. Storage only.
    pub const GLOBMON_EN: u32 = 0x018;
    /// Set external interrupt lines, 32 per word (`0x020..=0x02c`).
    pub const SET_IRQ: u32 = 0x020;
    /// Clear external interrupt lines, 32 per word (`0x030..=0x03c`).
    pub const CLR_IRQ: u32 = 0x030;
    pub const MTIME: u32 = 0x100;
    pub const MTIMEH: u32 = 0x104;
    pub const MTIMECMP: u32 = 0x108;
    pub const MTIMECMPH: u32 = 0x10c;
}

/// Size in bytes of the address window decoded by [`TestbenchIo`].
pub const WINDOW_SIZE: u32 = 0x200;

/// Number of external interrupt lines the testbench can drive.
pub const NUM_IRQ_LINES: usize = 128;

const IRQ_WORDS: usize = NUM_IRQ_LINES / 32;

const_assert_eq!(IRQ_WORDS * 4, (offset::CLR_IRQ - offset::SET_IRQ) as usize);

/// Memory-mapped testbench device used by guest software to talk to the host.
///
/// Only word accesses are decoded. Any other access size, and any offset that isn't one of the
/// registers in [`offset`], fails.
///
/// Console output is written to `W`. When `trace` is set, every print is prefixed with the name of
/// the register, so it can be told apart from the instruction trace.
#[derive(Debug)]
pub struct TestbenchIo<W: Write> {
    out: W,
    trace: bool,
    mtime: u64,
    mtimecmp: u64,
    softirq: u32,
    irq: [u32; IRQ_WORDS],
    globmon_en: u32,
    exit_code: Option<u32>,
}

impl<W: Write> TestbenchIo<W> {
    pub fn new(out: W, trace: bool) -> Self {
        Self {
            out,
            trace,
            mtime: 0,
            // Tests expect an immediately pending timer interrupt out of reset.
            mtimecmp: 0,
            softirq: 0,
            irq: [0; IRQ_WORDS],
            globmon_en: 0,
            exit_code: None,
        }
    }

    /// Advance the timer by one tick.
    pub fn step(&mut self) {
        self.mtime = self.mtime.wrapping_add(1);
    }

    pub fn timer_irq_pending(&self) -> bool {
        self.mtime >= self.mtimecmp
    }

    pub fn soft_irq_pending(&self, hart_id: u32) -> bool {
        hart_id < u32::BITS && self.softirq & (1 << hart_id) != 0
    }

    /// Returns the level of external interrupt line `irq`.
    pub fn irq_line(&self, irq: usize) -> bool {
        irq < NUM_IRQ_LINES && self.irq[irq / 32] & (1 << (irq % 32)) != 0
    }

    /// Returns the exit code written by the guest, if it requested a halt.
    pub fn exit_code(&self) -> Option<u32> {
        self.exit_code
    }

    pub fn mtime(&self) -> u64 {
        self.mtime
    }

    pub fn globmon_en(&self) -> bool {
        self.globmon_en & 1 != 0
    }

    /// Returns the console sink.
    pub fn output(&self) -> &W {
        &self.out
    }

    fn print(&mut self, args: std::fmt::Arguments) {
        if let Err(err) = self.out.write_fmt(args).and_then(|()| self.out.flush()) {
            warn!("Failed to write testbench output: {err}");
        }
    }

    fn irq_word(address: u32, base: u32) -> Option<usize> {
        let index = address.checked_sub(base)? / 4;
        (address % 4 == 0 && (index as usize) < IRQ_WORDS).then_some(index as usize)
    }
}

impl<W: Write + std::fmt::Debug> Bus for TestbenchIo<W> {
    fn read_byte(&mut self, _address: u32) -> Option<u8> {
        None
    }

    fn read_halfword(&mut self, _address: u32) -> Option<u16> {
        None
    }

    fn read_word(&mut self, address: u32) -> Option<u32> {
        match address {
            offset::MTIME => Some(self.mtime as u32),
            offset::MTIMEH => Some((self.mtime >> 32) as u32),
            offset::MTIMECMP => Some(self.mtimecmp as u32),
            offset::MTIMECMPH => Some((self.mtimecmp >> 32) as u32),
            offset::SET_SOFTIRQ | offset::CLR_SOFTIRQ => Some(self.softirq),
            offset::GLOBMON_EN => Some(self.globmon_en),
            _ => Self::irq_word(address, offset::SET_IRQ)
                .or_else(|| Self::irq_word(address, offset::CLR_IRQ))
                .map(|index| self.irq[index]),
        }
    }

    fn write_byte(&mut self, _address: u32, _value: u8) -> bool {
        false
    }

    fn write_halfword(&mut self, _address: u32, _value: u16) -> bool {
        false
    }

    fn write_word(&mut self, address: u32, value: u32) -> bool {
        match address {
            offset::PRINT_CHAR => {
                let c = value as u8 as char;
                if self.trace {
                    self.print(format_args!("IO_PRINT_CHAR: {c}\n"));
                } else {
                    self.print(format_args!("{c}"));
                }
            }
            offset::PRINT_U32 => {
                if self.trace {
                    self.print(format_args!("IO_PRINT_U32: {value:08x}\n"));
                } else {
                    self.print(format_args!("{value:08x}\n"));
                }
            }
            offset::EXIT => {
                info!("Guest requested halt with exit code {}", value as i32);
                self.exit_code = Some(value);
            }
            offset::SET_SOFTIRQ => self.softirq |= value,
            offset::CLR_SOFTIRQ => self.softirq &= !value,
            offset::GLOBMON_EN => self.globmon_en = value,
            offset::MTIME => self.mtime = self.mtime & !0xffff_ffff | value as u64,
            offset::MTIMEH => self.mtime = self.mtime & 0xffff_ffff | (value as u64) << 32,
            offset::MTIMECMP => self.mtimecmp = self.mtimecmp & !0xffff_ffff | value as u64,
            offset::MTIMECMPH => {
                self.mtimecmp = self.mtimecmp & 0xffff_ffff | (value as u64) << 32
            }
            _ => {
                if let Some(index) = Self::irq_word(address, offset::SET_IRQ) {
                    self.irq[index] |= value;
                } else if let Some(index) = Self::irq_word(address, offset::CLR_IRQ) {
                    self.irq[index] &= !value;
                } else {
                    return false;
                }
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn io() -> TestbenchIo<Vec<u8>> {
        TestbenchIo::new(Vec::new(), false)
    }

    #[test]
    fn test_print() {
        let mut io = io();
        assert!(io.write_word(offset::PRINT_CHAR, 'h' as u32));
        assert!(io.write_word(offset::PRINT_CHAR, 'i' as u32));
        assert!(io.write_word(offset::PRINT_U32, 0xdead_beef));
        assert_eq!(b"hideadbeef\n", io.output().as_slice());
    }

    #[test]
    fn test_traced_print() {
        let mut io = TestbenchIo::new(Vec::new(), true);
        assert!(io.write_word(offset::PRINT_CHAR, 'x' as u32));
        assert!(io.write_word(offset::PRINT_U32, 0x12));
        assert_eq!(
            "IO_PRINT_CHAR: x\nIO_PRINT_U32: 00000012\n",
            String::from_utf8_lossy(io.output())
        );
    }

    #[test]
    fn test_exit() {
        let mut io = io();
        assert_eq!(None, io.exit_code());
        assert!(io.write_word(offset::EXIT, 123));
        assert_eq!(Some(123), io.exit_code());
    }

    #[test]
    fn test_timer() {
        let mut io = io();
        // mtimecmp resets to 0, so the timer starts out pending.
        assert!(io.timer_irq_pending());
        assert!(io.write_word(offset::MTIMECMP, 2));
        assert!(!io.timer_irq_pending());
        io.step();
        io.step();
        assert!(io.timer_irq_pending());
        assert_eq!(Some(2), io.read_word(offset::MTIME));
        assert!(io.write_word(offset::MTIMEH, 1));
        assert_eq!(Some(1), io.read_word(offset::MTIMEH));
        assert_eq!(0x1_0000_0002, io.mtime());
    }

    #[test]
    fn test_softirq() {
        let mut io = io();
        assert!(io.write_word(offset::SET_SOFTIRQ, 0b10));
        assert!(!io.soft_irq_pending(0));
        assert!(io.soft_irq_pending(1));
        assert_eq!(Some(0b10), io.read_word(offset::CLR_SOFTIRQ));
        assert!(io.write_word(offset::CLR_SOFTIRQ, 0b11));
        assert!(!io.soft_irq_pending(1));
        assert!(!io.soft_irq_pending(40));
    }

    #[test]
    fn test_irq_lines() {
        let mut io = io();
        assert!(io.write_word(offset::SET_IRQ, 0x8000_0001));
        assert!(io.write_word(offset::SET_IRQ + 4, 0x1));
        assert!(io.irq_line(0));
        assert!(io.irq_line(31));
        assert!(io.irq_line(32));
        assert!(!io.irq_line(1));
        assert!(io.write_word(offset::CLR_IRQ, 0x1));
        assert!(!io.irq_line(0));
        assert_eq!(Some(0x8000_0000), io.read_word(offset::SET_IRQ));
        assert!(!io.irq_line(NUM_IRQ_LINES));
    }

    #[test]
    fn test_unmapped_access_fails() {
        let mut io = io();
        assert_eq!(None, io.read_word(offset::PRINT_CHAR));
        assert_eq!(None, io.read_word(0x1fc));
        assert!(!io.write_word(0x0c, 0));
        assert!(!io.write_byte(offset::PRINT_CHAR, b'a'));
        assert_eq!(None, io.read_halfword(offset::MTIME));
    }
}
