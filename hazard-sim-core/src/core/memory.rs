use super::cs_registers::CsRegisters;
use super::pmp::AccessType;
use crate::bus::Bus;
use crate::Alignment;
use thiserror::Error;

macro_rules! access_fns {
    ( $( $read_fn:ident, $write_fn:ident => $u:ident ),* $(,)? ) => {
        $(
            /// Invoke a read for the specified address.
            ///
            /// Misaligned addresses fail with [`MemoryError::MisalignedAccess`] before PMP or the
            /// bus are consulted.
            pub fn $read_fn(&mut self, address: u32) -> Result<$u, MemoryError> {
                self.check(address, std::mem::size_of::<$u>() as u32, AccessType::Read)?;
                self.bus.$read_fn(address).ok_or(MemoryError::AccessFault)
            }

            /// Invoke a write for the specified address.
            ///
            /// Misaligned addresses fail with [`MemoryError::MisalignedAccess`] before PMP or the
            /// bus are consulted.
            pub fn $write_fn(&mut self, address: u32, value: $u) -> Result<(), MemoryError> {
                self.check(address, std::mem::size_of::<$u>() as u32, AccessType::Write)?;
                if self.bus.$write_fn(address, value) {
                    self.stores.push(address);
                    Ok(())
                } else {
                    Err(MemoryError::AccessFault)
                }
            }
        )*
    };
}

/// Access wrapper around the system bus to address it as memory from a core's point of view.
///
/// This takes into account the core's current privilege level, its PMP configuration and the
/// natural alignment requirement of every access. Addresses of successful stores are recorded, so
/// reservations of other harts on the same word can be cleared.
#[derive(Debug)]
pub struct Memory<'c, B: Bus> {
    pub(super) cs_registers: &'c CsRegisters,
    pub(super) bus: &'c mut B,
    pub(super) stores: &'c mut Vec<u32>,
}

impl<'c, B: Bus> Memory<'c, B> {
    access_fns! {
        read_byte, write_byte => u8,
        read_halfword, write_halfword => u16,
        read_word, write_word => u32,
    }

    /// Fetch one 16-bit instruction parcel.
    ///
    /// Checked against the PMP execute permission at the real privilege level, MPRV does not
    /// apply to instruction fetches.
    pub fn fetch_halfword(&mut self, address: u32) -> Result<u16, MemoryError> {
        self.check(address, 2, AccessType::Execute)?;
        self.bus
            .read_halfword(address)
            .ok_or(MemoryError::AccessFault)
    }

    /// Performs the necessary checks for an access at `address` of `size` bytes.
    fn check(&self, address: u32, size: u32, access: AccessType) -> Result<(), MemoryError> {
        if !Alignment::natural_for_size(size)
            .map(|alignment| alignment.is_aligned(address))
            .unwrap_or(false)
        {
            return Err(MemoryError::MisalignedAccess);
        }
        if !self.cs_registers.pmp_allows(address, access) {
            return Err(MemoryError::AccessFault);
        }
        Ok(())
    }
}

#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum MemoryError {
    #[error("misaligned access")]
    MisalignedAccess,
    #[error("access fault")]
    AccessFault,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Config;
    use crate::resources::ram::Ram;

    #[test]
    fn test_alignment_checked_first() {
        let cs_registers = CsRegisters::new(&Config::default());
        let mut ram = Ram::new(16).unwrap();
        let mut stores = Vec::new();
        let mut memory = Memory {
            cs_registers: &cs_registers,
            bus: &mut ram,
            stores: &mut stores,
        };
        assert_eq!(Err(MemoryError::MisalignedAccess), memory.read_word(0x1002));
        assert_eq!(Err(MemoryError::AccessFault), memory.read_word(0x1000));
        assert_eq!(Err(MemoryError::MisalignedAccess), memory.write_halfword(1, 0));
        assert_eq!(Ok(()), memory.write_word(4, 0x1234_5678));
        assert_eq!(Ok(0x1234), memory.read_halfword(6));
        assert_eq!(Ok(0x5678), memory.fetch_halfword(4));
        assert_eq!(vec![4], stores);
    }
}
