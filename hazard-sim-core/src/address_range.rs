use std::fmt;
use std::fmt::{Display, Formatter};
use std::ops::RangeInclusive;
use thiserror::Error;

/// A non-empty range in a 32-bit address space bounded inclusively below and above.
///
/// Enforces the invariant that `self.start() <= self.end()`.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct AddressRange {
    start: u32,
    end: u32,
}

impl Display for AddressRange {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "[{:#x}, {:#x}]", self.start, self.end)
    }
}

impl AddressRange {
    pub fn new(start: u32, end: u32) -> Result<Self, InvalidBoundsError> {
        (start <= end)
            .then_some(Self { start, end })
            .ok_or(InvalidBoundsError { start, end })
    }

    /// Create the range of `size` bytes starting at `base`.
    ///
    /// Fails if `size` is zero, or if the range would extend past the end of the address space.
    pub fn from_base_size(base: u32, size: u32) -> Result<Self, InvalidBoundsError> {
        size.checked_sub(1)
            .and_then(|delta| base.checked_add(delta))
            .map(|end| Self { start: base, end })
            .ok_or(InvalidBoundsError {
                start: base,
                end: base.wrapping_add(size),
            })
    }

    pub fn start(self) -> u32 {
        self.start
    }

    pub fn end(self) -> u32 {
        self.end
    }

    /// Check if an address is contained within this address range.
    pub fn contains(self, address: u32) -> bool {
        self.start <= address && address <= self.end
    }

    /// Check if all `size` bytes starting at `address` lie within this range.
    ///
    /// An access of size zero is never contained.
    pub fn contains_access(self, address: u32, size: u32) -> bool {
        self.contains(address)
            && size
                .checked_sub(1)
                .map(|delta| self.end - address >= delta)
                .unwrap_or(false)
    }

    /// Returns `self.end() - self.start()`, which is the size minus 1.
    pub fn delta(self) -> u32 {
        self.end - self.start
    }

    /// Returns the size of this address range if it is representable by a `u32`.
    pub fn size(self) -> Option<u32> {
        self.delta().checked_add(1)
    }
}

impl TryFrom<RangeInclusive<u32>> for AddressRange {
    type Error = InvalidBoundsError;

    fn try_from(value: RangeInclusive<u32>) -> Result<Self, Self::Error> {
        Self::new(*value.start(), *value.end())
    }
}

#[derive(Error, Debug, Clone)]
#[error("bounds [{start:#x}, {end:#x}] do not form a valid 32-bit address range")]
pub struct InvalidBoundsError {
    start: u32,
    end: u32,
}

#[macro_export]
macro_rules! address_range {
    ($start:expr, $end:expr) => {
        $crate::address_range::AddressRange::new($start, $end).unwrap()
    };
}
