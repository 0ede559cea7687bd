/// Collection of counter registers and associated read/write logic.
///
/// Only `mcycle` and `minstret` are implemented. Both advance once per call to
/// [`increment`](Self::increment) (every core step, including stalled ones), unless inhibited by
/// the matching bit of `mcountinhibit`. The `mhpmcounter*` and `mhpmevent*` registers are
/// hardwired to zero and are not represented here.
///
/// > The cycle, instret, and hpmcountern CSRs are read-only shadows of mcycle, minstret, and
/// > mhpmcountern, respectively.
#[derive(Debug, Clone, Default)]
pub struct Counters {
    mcycle: u64,
    minstret: u64,
    mcountinhibit: u32,
}

/// One 32-bit half of a 64-bit counter.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum CounterHalf {
    McycleLow,
    McycleHigh,
    MinstretLow,
    MinstretHigh,
}

/// Writable bits of `mcountinhibit`: CY, TM and IR.
const MCOUNTINHIBIT_MASK: u32 = 0b111;

mod idx {
    pub const CY: u32 = 0;
    pub const IR: u32 = 2;
}

impl Counters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance both counters, unless inhibited.
    ///
    /// The half given by `held` keeps its current value, so a CSR write to it in the same cycle
    /// takes precedence over the increment.
    pub fn increment(&mut self, held: Option<CounterHalf>) {
        if self.mcountinhibit & (1 << idx::CY) == 0 {
            self.mcycle = Self::increment_counter(
                self.mcycle,
                held,
                CounterHalf::McycleLow,
                CounterHalf::McycleHigh,
            );
        }
        if self.mcountinhibit & (1 << idx::IR) == 0 {
            self.minstret = Self::increment_counter(
                self.minstret,
                held,
                CounterHalf::MinstretLow,
                CounterHalf::MinstretHigh,
            );
        }
    }

    fn increment_counter(
        value: u64,
        held: Option<CounterHalf>,
        low: CounterHalf,
        high: CounterHalf,
    ) -> u64 {
        let next = value.wrapping_add(1);
        match held {
            Some(half) if half == low => next & !0xffff_ffff | value & 0xffff_ffff,
            Some(half) if half == high => next & 0xffff_ffff | value & !0xffff_ffff,
            _ => next,
        }
    }

    pub fn mcycle(&self) -> u64 {
        self.mcycle
    }

    pub fn minstret(&self) -> u64 {
        self.minstret
    }

    pub fn read(&self, half: CounterHalf) -> u32 {
        match half {
            CounterHalf::McycleLow => self.mcycle as u32,
            CounterHalf::McycleHigh => (self.mcycle >> 32) as u32,
            CounterHalf::MinstretLow => self.minstret as u32,
            CounterHalf::MinstretHigh => (self.minstret >> 32) as u32,
        }
    }

    pub fn write(&mut self, half: CounterHalf, value: u32) {
        let value = value as u64;
        match half {
            CounterHalf::McycleLow => self.mcycle = self.mcycle & !0xffff_ffff | value,
            CounterHalf::McycleHigh => self.mcycle = self.mcycle & 0xffff_ffff | value << 32,
            CounterHalf::MinstretLow => self.minstret = self.minstret & !0xffff_ffff | value,
            CounterHalf::MinstretHigh => {
                self.minstret = self.minstret & 0xffff_ffff | value << 32
            }
        }
    }

    pub fn read_mcountinhibit(&self) -> u32 {
        self.mcountinhibit
    }

    pub fn write_mcountinhibit(&mut self, value: u32) {
        self.mcountinhibit = value & MCOUNTINHIBIT_MASK;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_increment_carries() {
        let mut counters = Counters::new();
        counters.write(CounterHalf::McycleLow, u32::MAX);
        counters.increment(None);
        assert_eq!(0x1_0000_0000, counters.mcycle());
        assert_eq!(1, counters.minstret());
    }

    #[test]
    fn test_held_half_wins() {
        let mut counters = Counters::new();
        counters.write(CounterHalf::McycleLow, u32::MAX);
        counters.increment(Some(CounterHalf::McycleLow));
        // The carry into the high half still happens.
        assert_eq!(0x1_ffff_ffff, counters.mcycle());
        counters.increment(Some(CounterHalf::MinstretHigh));
        assert_eq!(2, counters.minstret());
    }

    #[test]
    fn test_inhibit() {
        let mut counters = Counters::new();
        counters.write_mcountinhibit(0xffff_ffff);
        assert_eq!(0b111, counters.read_mcountinhibit());
        counters.increment(None);
        assert_eq!(0, counters.mcycle());
        assert_eq!(0, counters.minstret());
        counters.write_mcountinhibit(0b100);
        counters.increment(None);
        assert_eq!(1, counters.mcycle());
        assert_eq!(0, counters.minstret());
    }
}
