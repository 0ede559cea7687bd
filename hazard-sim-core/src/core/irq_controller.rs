//! Hazard3 external interrupt controller.
//!
//! Up to 512 external interrupt lines are funneled into the single MEIP bit of mip. Each line has
//! an enable bit, a software force bit and a 4-bit priority. The controller tracks a preemption
//! level in meicontext, so that only interrupts of at least that priority assert MEIP.

use bitvec::{field::BitField, order::Lsb0, vec::BitVec, view::BitView};
use log::debug;

use super::csr::{self, CsrSpecifier};

/// Maximum number of external interrupts that can be configured.
pub const MAX_IRQS: usize = 512;

/// Number of IRQs covered by one window of meiea, meipa or meifa.
const FLAG_WINDOW: usize = 16;
/// Number of IRQs covered by one window of meipra.
const PRIORITY_WINDOW: usize = 4;
/// Bits of write data that select the window of an array CSR.
const INDEX_MASK: u32 = 0x1f;

/// Bit indices and masks for the fields of meicontext.
pub mod context {
    pub const PPPREEMPT: usize = 28;
    pub const PPREEMPT: usize = 24;
    pub const PREEMPT: usize = 16;
    pub const NOIRQ: usize = 15;
    pub const IRQ: usize = 4;
    pub const MTIESAVE: usize = 2;
    pub const MSIESAVE: usize = 1;
    pub const CLEARTS: usize = 0;

    /// Fields stored by the controller. The low bits are handled together with mie.
    pub const STORED_MASK: u32 = 0xff1f_9ff0;
}

/// Bit indices for the fields of meinext.
mod next {
    pub const NOIRQ: usize = 31;
    pub const IRQ: usize = 2;
    pub const UPDATE: usize = 0;
}

const_assert_eq!(MAX_IRQS, FLAG_WINDOW * (INDEX_MASK as usize + 1));

#[derive(Debug, Clone)]
pub struct IrqController {
    lines: BitVec<u32, Lsb0>,
    enable: BitVec<u32, Lsb0>,
    force: BitVec<u32, Lsb0>,
    priority: Vec<u8>,
    meicontext: u32,
}

impl IrqController {
    /// Create a controller for `num_irqs` interrupts, clamped to [`MAX_IRQS`].
    pub fn new(num_irqs: usize) -> Self {
        let num_irqs = num_irqs.min(MAX_IRQS);
        Self {
            lines: BitVec::repeat(false, num_irqs),
            enable: BitVec::repeat(false, num_irqs),
            force: BitVec::repeat(false, num_irqs),
            priority: vec![0; num_irqs],
            meicontext: 1 << context::NOIRQ,
        }
    }

    pub fn num_irqs(&self) -> usize {
        self.priority.len()
    }

    /// Drive external interrupt line `irq`. Lines beyond the configured count are ignored.
    pub fn set_line(&mut self, irq: usize, level: bool) {
        if irq < self.num_irqs() {
            self.lines.set(irq, level);
        }
    }

    pub fn is_pending(&self, irq: usize) -> bool {
        irq < self.num_irqs() && (self.lines[irq] || self.force[irq])
    }

    fn field(&self, lsb: usize, width: usize) -> u32 {
        self.meicontext.view_bits::<Lsb0>()[lsb..lsb + width].load_le()
    }

    fn set_field(&mut self, lsb: usize, width: usize, value: u32) {
        self.meicontext.view_bits_mut::<Lsb0>()[lsb..lsb + width].store_le(value);
    }

    /// Returns the current preemption priority level.
    pub fn preempt(&self) -> u32 {
        self.field(context::PREEMPT, 5)
    }

    /// Returns the highest-priority IRQ that is pending, enabled, and not masked by the current
    /// preemption level. Equal priorities are resolved in favor of the lowest IRQ number.
    pub fn next_irq(&self) -> Option<usize> {
        let preempt = self.preempt();
        (0..self.num_irqs())
            .filter(|&irq| self.is_pending(irq) && self.enable[irq])
            .filter(|&irq| self.priority[irq] as u32 >= preempt)
            // `max_by_key` keeps the last maximum, so iterate in reverse for the lowest index.
            .rev()
            .max_by_key(|&irq| self.priority[irq])
    }

    /// Returns `true` if MEIP should be asserted.
    pub fn meip(&self) -> bool {
        self.next_irq().is_some()
    }

    /// Read a window of an array CSR. `index` is taken from the write data of the same CSR
    /// instruction, and the window is returned in bits 31:16.
    pub fn read_array(&self, specifier: CsrSpecifier, index: u32) -> u32 {
        let index = (index & INDEX_MASK) as usize;
        let window = match specifier {
            csr::MEIEA => Self::flag_window(&self.enable, index),
            csr::MEIPA => (0..FLAG_WINDOW)
                .filter(|&bit| self.is_pending(FLAG_WINDOW * index + bit))
                .fold(0, |window, bit| window | 1 << bit),
            csr::MEIFA => Self::flag_window(&self.force, index),
            csr::MEIPRA => (0..PRIORITY_WINDOW).fold(0, |window, slot| {
                let priority = self
                    .priority
                    .get(PRIORITY_WINDOW * index + slot)
                    .copied()
                    .unwrap_or(0);
                window | (priority as u32) << (4 * slot)
            }),
            _ => 0,
        };
        window << 16
    }

    /// Write a window of an array CSR. The window index is in bits 4:0 of `value`, the new
    /// window contents in bits 31:16. meipa is read-only and ignores writes.
    pub fn write_array(&mut self, specifier: CsrSpecifier, value: u32) {
        let index = (value & INDEX_MASK) as usize;
        let window = value >> 16;
        match specifier {
            csr::MEIEA => Self::set_flag_window(&mut self.enable, index, window),
            csr::MEIFA => Self::set_flag_window(&mut self.force, index, window),
            csr::MEIPRA => {
                for slot in 0..PRIORITY_WINDOW {
                    if let Some(priority) = self.priority.get_mut(PRIORITY_WINDOW * index + slot) {
                        *priority = ((window >> (4 * slot)) & 0xf) as u8;
                    }
                }
            }
            _ => {}
        }
    }

    fn flag_window(flags: &BitVec<u32, Lsb0>, index: usize) -> u32 {
        (0..FLAG_WINDOW)
            .filter(|&bit| flags.get(FLAG_WINDOW * index + bit).is_some_and(|flag| *flag))
            .fold(0, |window, bit| window | 1 << bit)
    }

    fn set_flag_window(flags: &mut BitVec<u32, Lsb0>, index: usize, window: u32) {
        for bit in 0..FLAG_WINDOW {
            if let Some(mut flag) = flags.get_mut(FLAG_WINDOW * index + bit) {
                *flag = window & (1 << bit) != 0;
            }
        }
    }

    pub fn read_meinext(&self) -> u32 {
        match self.next_irq() {
            Some(irq) => (irq as u32) << next::IRQ,
            None => 1 << next::NOIRQ,
        }
    }

    /// Write meinext. Setting UPDATE claims the IRQ that meinext currently reports: its priority
    /// becomes the new preemption level and its force bit is cleared.
    pub fn write_meinext(&mut self, value: u32) {
        if value & (1 << next::UPDATE) == 0 {
            return;
        }
        match self.next_irq() {
            Some(irq) => {
                debug!("Claiming external interrupt {irq}");
                self.set_field(context::PREEMPT, 5, self.priority[irq] as u32 + 1);
                self.set_field(context::IRQ, 9, irq as u32);
                self.set_field(context::NOIRQ, 1, 0);
                self.force.set(irq, false);
            }
            None => self.set_field(context::NOIRQ, 1, 1),
        }
    }

    /// Returns the fields of meicontext held by the controller. The MTIESAVE, MSIESAVE and
    /// CLEARTS bits read as zero here.
    pub fn read_meicontext(&self) -> u32 {
        self.meicontext
    }

    pub fn write_meicontext(&mut self, value: u32) {
        self.meicontext = value & context::STORED_MASK;
    }

    /// Save the preemption priority on entry to an external interrupt handler.
    ///
    /// PPREEMPT is only 4 bits wide, so only PREEMPT[3:0] is saved. A PREEMPT of 16, left by
    /// claiming a priority-15 IRQ, is saved as 0.
    pub fn enter_trap(&mut self) {
        let ppreempt = self.field(context::PPREEMPT, 4);
        let preempt = self.field(context::PREEMPT, 4);
        self.set_field(context::PPPREEMPT, 4, ppreempt);
        self.set_field(context::PPREEMPT, 4, preempt);
    }

    /// Restore the preemption priority on return from an external interrupt handler.
    pub fn return_from_trap(&mut self) {
        let ppreempt = self.field(context::PPREEMPT, 4);
        let pppreempt = self.field(context::PPPREEMPT, 4);
        self.set_field(context::PREEMPT, 5, ppreempt);
        self.set_field(context::PPREEMPT, 4, pppreempt);
        self.set_field(context::PPPREEMPT, 4, 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enable_all(controller: &mut IrqController) {
        controller.write_array(csr::MEIEA, 0xffff_0000);
        controller.write_array(csr::MEIEA, 0xffff_0001);
    }

    #[test]
    fn test_reset_state() {
        let controller = IrqController::new(32);
        assert_eq!(0x8000, controller.read_meicontext());
        assert_eq!(0x8000_0000, controller.read_meinext());
        assert!(!controller.meip());
    }

    #[test]
    fn test_enable_and_force() {
        let mut controller = IrqController::new(32);
        controller.set_line(5, true);
        assert!(!controller.meip());
        controller.write_array(csr::MEIEA, 1 << (16 + 5));
        assert_eq!(1 << (16 + 5), controller.read_array(csr::MEIEA, 0));
        assert!(controller.meip());
        assert_eq!(5 << 2, controller.read_meinext());
        controller.set_line(5, false);
        assert!(!controller.meip());
        // Force IRQ 17, in the second window.
        controller.write_array(csr::MEIEA, 0x0002_0001);
        controller.write_array(csr::MEIFA, 0x0002_0001);
        assert_eq!(0x0002_0000, controller.read_array(csr::MEIPA, 1));
        assert_eq!(17 << 2, controller.read_meinext());
        // meipa ignores writes.
        controller.write_array(csr::MEIPA, 0xffff_0000);
        assert_eq!(0, controller.read_array(csr::MEIPA, 0));
    }

    #[test]
    fn test_priority_order() {
        let mut controller = IrqController::new(32);
        enable_all(&mut controller);
        for irq in [1, 2, 3] {
            controller.set_line(irq, true);
        }
        // IRQ 0..=3 priorities: 0, 1, 3, 3.
        controller.write_array(csr::MEIPRA, 0x3310_0000);
        assert_eq!(0x3310_0000, controller.read_array(csr::MEIPRA, 0));
        // Highest priority first, lowest index on ties.
        assert_eq!(2 << 2, controller.read_meinext());
        controller.write_meinext(1);
        assert_eq!(4, controller.preempt());
        assert_eq!(2, (controller.read_meicontext() >> 4) & 0x1ff);
        // Nothing has priority 4 or higher.
        assert!(!controller.meip());
        controller.write_meinext(1);
        assert_eq!(0x8000, controller.read_meicontext() & 0x8000);
    }

    #[test]
    fn test_update_clears_force() {
        let mut controller = IrqController::new(32);
        enable_all(&mut controller);
        controller.write_array(csr::MEIFA, 1 << 16);
        controller.write_meinext(1);
        assert_eq!(0, controller.read_array(csr::MEIFA, 0));
        assert_eq!(1, controller.preempt());
    }

    #[test]
    fn test_preempt_save_restore() {
        let mut controller = IrqController::new(32);
        controller.write_meicontext(0x0200_0000 | 0x0003_0000);
        controller.enter_trap();
        assert_eq!(0x2300_0000, controller.read_meicontext() & 0xff00_0000);
        controller.write_meicontext(controller.read_meicontext() & !0x001f_0000 | 0x0005_0000);
        controller.return_from_trap();
        assert_eq!(3, controller.preempt());
        assert_eq!(0x0200_0000, controller.read_meicontext() & 0xff00_0000);
    }

    #[test]
    fn test_preempt_save_truncates_to_four_bits() {
        let mut controller = IrqController::new(32);
        controller.write_meicontext(0x0010_0000);
        assert_eq!(16, controller.preempt());
        controller.enter_trap();
        assert_eq!(0, controller.read_meicontext() & 0xff00_0000);
        assert_eq!(16, controller.preempt());
        controller.return_from_trap();
        assert_eq!(0, controller.preempt());
    }

    #[test]
    fn test_out_of_range_irqs() {
        let mut controller = IrqController::new(20);
        controller.set_line(40, true);
        controller.write_array(csr::MEIEA, 0xffff_0001);
        assert_eq!(0x000f_0000, controller.read_array(csr::MEIEA, 1));
        assert_eq!(0, controller.read_array(csr::MEIEA, 31));
        assert!(!controller.is_pending(40));
    }
}
