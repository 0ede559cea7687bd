use crate::{address_range, AddressRange};
use std::cmp::Ordering;
use thiserror::Error;

/// Generic map of 32-bit address ranges to values of type `T`.
///
/// The ranges cannot overlap. Lookups resolve an address to the region containing it, or to the
/// vacant gap around it.
#[derive(Debug)]
pub struct AddressMap<T> {
    ordered_ranges: Vec<(AddressRange, T)>,
}

impl<T> Default for AddressMap<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> AddressMap<T> {
    /// Create new empty map.
    pub fn new() -> Self {
        Self {
            ordered_ranges: Vec::new(),
        }
    }

    /// Returns the value that the address range containing `address` maps to, or `None` if that
    /// address range is vacant.
    pub fn value(&self, address: u32) -> Option<&T> {
        self.range_value(address).1
    }

    /// Returns the address range that contains `address`, and the value that it maps to.
    ///
    /// The second item will be `None` if `address` is in a vacant region, in which case the
    /// returned range spans that whole vacant region.
    pub fn range_value(&self, address: u32) -> (AddressRange, Option<&T>) {
        match self.ordered_ranges.binary_search_by(|(range, _)| {
            if address < range.start() {
                Ordering::Greater
            } else if address <= range.end() {
                Ordering::Equal
            } else {
                Ordering::Less
            }
        }) {
            Ok(index) => {
                let (range, value) = &self.ordered_ranges[index];
                (*range, Some(value))
            }
            Err(index) => {
                let start = index
                    .checked_sub(1)
                    .and_then(|i| self.ordered_ranges.get(i))
                    // Cannot overflow: the previous range ends below `address`.
                    .map(|(range, _)| range.end() + 1)
                    .unwrap_or(0);
                let end = self
                    .ordered_ranges
                    .get(index)
                    // Cannot underflow: the next range starts above `address`.
                    .map(|(range, _)| range.start() - 1)
                    .unwrap_or(u32::MAX);
                (address_range![start, end], None)
            }
        }
    }

    /// Iterate over all mapped regions in ascending address order.
    pub fn iter(&self) -> impl Iterator<Item = &(AddressRange, T)> {
        self.ordered_ranges.iter()
    }
}

impl<T> TryFrom<Vec<(AddressRange, T)>> for AddressMap<T> {
    type Error = AddressMapError;

    fn try_from(mut value: Vec<(AddressRange, T)>) -> Result<Self, Self::Error> {
        value.sort_by_key(|(range, _)| range.start());

        for pair in value.windows(2) {
            let (prev_range, _) = &pair[0];
            let (range, _) = &pair[1];
            if range.start() <= prev_range.end() {
                return Err(AddressMapError::OverlappingAddressRanges {
                    first: *prev_range,
                    second: *range,
                });
            }
        }

        Ok(Self {
            ordered_ranges: value,
        })
    }
}

#[derive(Error, Debug)]
pub enum AddressMapError {
    /// Attempt to map two address ranges that overlap.
    #[error("address range {second} overlaps with address range {first}")]
    OverlappingAddressRanges {
        first: AddressRange,
        second: AddressRange,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> AddressMap<char> {
        AddressMap::try_from(vec![
            (address_range![0x8000_0000, 0x8000_01ff], 'b'),
            (address_range![0x0000_0000, 0x00ff_ffff], 'a'),
        ])
        .unwrap()
    }

    #[test]
    fn test_lookup() {
        let map = sample();
        assert_eq!(Some(&'a'), map.value(0));
        assert_eq!(Some(&'a'), map.value(0x00ff_ffff));
        assert_eq!(Some(&'b'), map.value(0x8000_0008));
        assert_eq!(None, map.value(0x0100_0000));
        assert_eq!(None, map.value(0xffff_ffff));
    }

    #[test]
    fn test_vacant_range() {
        let map = sample();
        let (range, value) = map.range_value(0x4000_0000);
        assert_eq!(None, value);
        assert_eq!(address_range![0x0100_0000, 0x7fff_ffff], range);
        let (range, value) = map.range_value(0x9000_0000);
        assert_eq!(None, value);
        assert_eq!(address_range![0x8000_0200, 0xffff_ffff], range);
    }

    #[test]
    fn test_overlap_rejected() {
        let result = AddressMap::try_from(vec![
            (address_range![0x0, 0x1ff], 1),
            (address_range![0x100, 0x2ff], 2),
        ]);
        assert!(matches!(
            result,
            Err(AddressMapError::OverlappingAddressRanges { .. })
        ));
    }
}
