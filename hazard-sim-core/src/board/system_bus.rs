use crate::address_map::AddressMap;
use crate::bus::Bus;
use crate::resources::ram::Ram;
use crate::resources::testbench_io::TestbenchIo;
use std::fmt::Debug;
use std::io::Write;

/// Enum that uniquely identifies every device attached to a [`SystemBus`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub(super) enum Resource {
    Ram,
    TestbenchIo,
}

/// Abstraction of the board's main bus connecting all devices to the harts.
///
/// Accesses are forwarded to the device that `address` maps to, if and only if the entire range
/// `address..(address+size)` lies within that device's region. Accesses to vacant regions, or
/// straddling two regions, fail and turn into access faults in the core.
#[derive(Debug)]
pub(super) struct SystemBus<W: Write + Debug> {
    pub memory_map: AddressMap<Resource>,
    pub ram: Ram,
    pub io: TestbenchIo<W>,
}

impl<W: Write + Debug> SystemBus<W> {
    /// Validates the `(address, size)` pair, returning `Some((resource, mapped_address))` if the
    /// access is accepted, and `None` otherwise.
    fn check_access(&self, address: u32, size: u32) -> Option<(Resource, u32)> {
        let (range, Some(&resource)) = self.memory_map.range_value(address) else {
            return None;
        };
        range
            .contains_access(address, size)
            .then(|| (resource, address - range.start()))
    }

    fn bus_of(&mut self, resource: Resource) -> &mut dyn Bus {
        match resource {
            Resource::Ram => &mut self.ram,
            Resource::TestbenchIo => &mut self.io,
        }
    }
}

macro_rules! forward {
    ( $( $read_fn:ident, $write_fn:ident => $u:ident ),* $(,)? ) => {
        $(
            fn $read_fn(&mut self, address: u32) -> Option<$u> {
                let (resource, mapped_address) =
                    self.check_access(address, std::mem::size_of::<$u>() as u32)?;
                self.bus_of(resource).$read_fn(mapped_address)
            }

            fn $write_fn(&mut self, address: u32, value: $u) -> bool {
                match self.check_access(address, std::mem::size_of::<$u>() as u32) {
                    Some((resource, mapped_address)) => {
                        self.bus_of(resource).$write_fn(mapped_address, value)
                    }
                    None => false,
                }
            }
        )*
    };
}

impl<W: Write + Debug> Bus for SystemBus<W> {
    forward! {
        read_byte, write_byte => u8,
        read_halfword, write_halfword => u16,
        read_word, write_word => u32,
    }
}
