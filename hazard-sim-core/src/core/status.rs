use bitvec::{field::BitField, order::Lsb0, view::BitView};

use crate::{PrivilegeLevel, RawPrivilegeLevel};

/// Provides the mstatus register.
///
/// Only the fields relevant to an M/U hart are implemented: MIE, MPIE, MPP, MPRV and TW. All other
/// fields are read-only zero. `mstatush` has no writable fields and always reads zero.
///
/// > The mstatus register is an MXLEN-bit read/write register [...]. The mstatus register keeps
/// > track of and controls the hart's current operating state.
#[derive(Debug, Clone, Default)]
pub struct Status {
    mstatus: u32,
}

impl Status {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the raw register value.
    pub fn read(&self) -> u32 {
        self.mstatus
    }

    /// Update the writable fields from `value`, ignoring illegal values of WARL fields.
    pub fn write(&mut self, value: u32) {
        let bits = value.view_bits::<Lsb0>();
        self.set_mie(bits[idx::MIE]);
        self.set_mpie(bits[idx::MPIE]);
        self.set_mpp(RawPrivilegeLevel::from_u2(
            bits[idx::MPP..(idx::MPP + 2)].load_le(),
        ));
        self.set_mprv(bits[idx::MPRV]);
        self.set_tw(bits[idx::TW]);
    }

    /// Returns `true` if the MIE (M-mode Interrupt Enable) bit is set.
    pub fn mie(&self) -> bool {
        self.mstatus.view_bits::<Lsb0>()[idx::MIE]
    }

    /// Sets the MIE (M-mode Interrupt Enable) bit to `value`.
    pub fn set_mie(&mut self, value: bool) {
        self.mstatus.view_bits_mut::<Lsb0>().set(idx::MIE, value);
    }

    /// Returns `true` if the MPIE (M-mode Previous Interrupt Enable) bit is set.
    pub fn mpie(&self) -> bool {
        self.mstatus.view_bits::<Lsb0>()[idx::MPIE]
    }

    /// Sets the MPIE (M-mode Previous Interrupt Enable) bit to `value`.
    pub fn set_mpie(&mut self, value: bool) {
        self.mstatus.view_bits_mut::<Lsb0>().set(idx::MPIE, value);
    }

    /// Returns the privilege level encoded by the MPP (M-mode Previous Privilege level) field.
    ///
    /// The MPP field is **WARL**, it only ever holds `U` or `M`.
    pub fn mpp(&self) -> PrivilegeLevel {
        let raw = RawPrivilegeLevel::from_u2(
            self.mstatus.view_bits::<Lsb0>()[idx::MPP..(idx::MPP + 2)].load_le(),
        );
        PrivilegeLevel::try_from(raw).unwrap_or(PrivilegeLevel::User)
    }

    /// Sets the privilege level encoded by the MPP field to `value`.
    ///
    /// Unsupported privilege levels are ignored.
    pub fn set_mpp(&mut self, value: RawPrivilegeLevel) {
        let Ok(value) = PrivilegeLevel::try_from(value) else {
            return;
        };
        self.mstatus.view_bits_mut::<Lsb0>()[idx::MPP..(idx::MPP + 2)].store_le(value as u8);
    }

    /// Returns `true` if the MPRV (Modify PRiVilege) bit is set.
    ///
    /// > When MPRV=1, load and store memory addresses are translated and protected, and endianness
    /// > is applied, as though the current privilege mode were set to MPP.
    pub fn mprv(&self) -> bool {
        self.mstatus.view_bits::<Lsb0>()[idx::MPRV]
    }

    /// Sets the MPRV (Modify PRiVilege) bit to `value`.
    pub fn set_mprv(&mut self, value: bool) {
        self.mstatus.view_bits_mut::<Lsb0>().set(idx::MPRV, value);
    }

    /// Returns `true` if the TW (Timeout Wait) bit is set.
    ///
    /// When set, executing WFI in U-mode raises an illegal instruction exception.
    pub fn tw(&self) -> bool {
        self.mstatus.view_bits::<Lsb0>()[idx::TW]
    }

    /// Sets the TW (Timeout Wait) bit to `value`.
    pub fn set_tw(&mut self, value: bool) {
        self.mstatus.view_bits_mut::<Lsb0>().set(idx::TW, value);
    }
}

/// Bit indices for the fields of the mstatus register.
mod idx {
    pub const MIE: usize = 3;
    pub const MPIE: usize = 7;
    pub const MPP: usize = 11;
    pub const MPRV: usize = 17;
    pub const TW: usize = 21;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_masks_fields() {
        let mut status = Status::new();
        status.write(0xffff_ffff);
        assert_eq!(0x0022_1888, status.read());
        assert_eq!(PrivilegeLevel::Machine, status.mpp());
        status.write(0);
        assert_eq!(0, status.read());
    }

    #[test]
    fn test_mpp_warl() {
        let mut status = Status::new();
        status.set_mpp(RawPrivilegeLevel::Machine);
        // Supervisor and reserved levels don't exist, so the field keeps its value.
        status.write(0x0000_0800);
        assert_eq!(PrivilegeLevel::Machine, status.mpp());
        status.set_mpp(RawPrivilegeLevel::Reserved);
        assert_eq!(PrivilegeLevel::Machine, status.mpp());
        status.set_mpp(RawPrivilegeLevel::User);
        assert_eq!(PrivilegeLevel::User, status.mpp());
    }
}
