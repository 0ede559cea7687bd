//! Physical memory protection.
//!
//! > PMP entries are described by an 8-bit configuration register and one XLEN-bit address
//! > register. [...] PMP entries are statically prioritized. The lowest-numbered PMP entry that
//! > matches any byte of an access determines whether that access succeeds or fails.

use crate::PrivilegeLevel;

/// Maximum number of PMP regions addressable through the CSRs.
pub const MAX_REGIONS: usize = 16;

/// Writable bits of a pmpcfg byte: L, A and XWR. Bits 6:5 are reserved.
const CFG_MASK: u8 = 0x9f;
/// pmpaddr holds bits 33:2 of an address, only 32 address bits exist.
const ADDR_MASK: u32 = 0x3fff_ffff;

mod cfg {
    pub const R: u8 = 1 << 0;
    pub const W: u8 = 1 << 1;
    pub const X: u8 = 1 << 2;
    pub const A_SHIFT: u8 = 3;
    pub const L: u8 = 1 << 7;
}

/// Address-matching mode of a PMP region, encoded in the A field of its cfg byte.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum AddressMatching {
    Off,
    /// Top of range: matches `[pmpaddr[i-1] << 2, pmpaddr[i] << 2)`.
    Tor,
    /// Naturally aligned four-byte region.
    Na4,
    /// Naturally aligned power-of-two region, of at least eight bytes.
    Napot,
}

impl AddressMatching {
    fn from_cfg(cfg: u8) -> Self {
        match (cfg >> cfg::A_SHIFT) & 0b11 {
            0 => Self::Off,
            1 => Self::Tor,
            2 => Self::Na4,
            _ => Self::Napot,
        }
    }
}

/// A set of R/W/X permissions, stored in the same bit positions as in a pmpcfg byte (`0bxwr`).
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Permissions(u8);

impl Permissions {
    pub const NONE: Self = Self(0);
    pub const ALL: Self = Self(cfg::R | cfg::W | cfg::X);

    pub fn from_xwr(xwr: u8) -> Self {
        Self(xwr & 0b111)
    }

    /// Returns the permissions as a 3-bit `xwr` value.
    pub fn xwr(self) -> u8 {
        self.0
    }

    pub fn allows(self, access: AccessType) -> bool {
        let bit = match access {
            AccessType::Read => cfg::R,
            AccessType::Write => cfg::W,
            AccessType::Execute => cfg::X,
        };
        self.0 & bit != 0
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum AccessType {
    Read,
    Write,
    Execute,
}

/// Decoded view of a single PMP region.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct PmpRegion {
    pub index: usize,
    pub address: u32,
    pub matching: AddressMatching,
    pub locked: bool,
    pub permissions: Permissions,
}

/// PMP configuration and address registers for a configurable number of regions.
///
/// Registers of regions beyond the configured count read as zero and ignore writes.
#[derive(Debug, Clone)]
pub struct Pmp {
    regions: usize,
    cfg: [u8; MAX_REGIONS],
    addr: [u32; MAX_REGIONS],
    /// Hazard3 pmpcfgm0: bit *i* makes region *i* apply to M-mode even when unlocked.
    m_enforced: u16,
}

impl Pmp {
    /// Create the registers for `regions` regions, clamped to [`MAX_REGIONS`].
    pub fn new(regions: usize) -> Self {
        Self {
            regions: regions.min(MAX_REGIONS),
            cfg: [0; MAX_REGIONS],
            addr: [0; MAX_REGIONS],
            m_enforced: 0,
        }
    }

    /// Returns the number of implemented regions.
    pub fn regions(&self) -> usize {
        self.regions
    }

    /// Read pmpcfg`n`, which packs the cfg bytes of regions `4n..4n+4`.
    pub fn read_cfg(&self, n: usize) -> u32 {
        (0..4).fold(0, |word, byte| {
            word | (self.cfg.get(4 * n + byte).copied().unwrap_or(0) as u32) << (8 * byte)
        })
    }

    /// Write pmpcfg`n`. Bytes of locked or unimplemented regions are left unchanged.
    pub fn write_cfg(&mut self, n: usize, value: u32) {
        for byte in 0..4 {
            let index = 4 * n + byte;
            if index < self.regions && !self.is_locked(index) {
                self.cfg[index] = (value >> (8 * byte)) as u8 & CFG_MASK;
            }
        }
    }

    pub fn read_addr(&self, index: usize) -> u32 {
        self.addr.get(index).copied().unwrap_or(0)
    }

    /// Write pmpaddr`index`.
    ///
    /// The write is dropped if the region is locked, or if the next region is a locked TOR region
    /// (which uses this address as its lower bound).
    pub fn write_addr(&mut self, index: usize, value: u32) {
        if index >= self.regions || self.is_locked(index) {
            return;
        }
        let next = index + 1;
        if next < self.regions
            && self.is_locked(next)
            && AddressMatching::from_cfg(self.cfg[next]) == AddressMatching::Tor
        {
            return;
        }
        self.addr[index] = value & ADDR_MASK;
    }

    pub fn read_m_enforced(&self) -> u32 {
        self.m_enforced as u32
    }

    pub fn write_m_enforced(&mut self, value: u32) {
        let implemented = (1u32 << self.regions) - 1;
        self.m_enforced = (value & implemented) as u16;
    }

    fn is_locked(&self, index: usize) -> bool {
        self.cfg[index] & cfg::L != 0
    }

    pub fn region(&self, index: usize) -> Option<PmpRegion> {
        (index < self.regions).then(|| {
            let cfg = self.cfg[index];
            PmpRegion {
                index,
                address: self.addr[index],
                matching: AddressMatching::from_cfg(cfg),
                locked: cfg & cfg::L != 0,
                permissions: Permissions::from_xwr(cfg),
            }
        })
    }

    /// Returns the lowest-numbered region that matches `address`, skipping disabled regions.
    pub fn match_region(&self, address: u32) -> Option<PmpRegion> {
        let address = address as u64;
        (0..self.regions)
            .filter_map(|index| self.region(index))
            .find(|region| match region.matching {
                AddressMatching::Off => false,
                AddressMatching::Tor => {
                    let bottom = match region.index {
                        0 => 0,
                        index => (self.addr[index - 1] as u64) << 2,
                    };
                    let top = (region.address as u64) << 2;
                    (bottom..top).contains(&address)
                }
                AddressMatching::Na4 => address >> 2 == region.address as u64,
                AddressMatching::Napot => {
                    // The number of trailing ones selects the size: `n` ones encode a region of
                    // `2^(n+3)` bytes.
                    let ones = region.address.trailing_ones();
                    if ones >= 30 {
                        return true;
                    }
                    let mask = !((1u64 << (ones + 1)) - 1);
                    (address >> 2) & mask == region.address as u64 & mask
                }
            })
    }

    /// Returns the permissions for an access to `address` at `privilege_level`.
    ///
    /// M-mode accesses are only restricted by regions that are locked or listed in pmpcfgm0. An
    /// access that matches no region is allowed in M-mode and denied in U-mode.
    pub fn permissions(&self, address: u32, privilege_level: PrivilegeLevel) -> Permissions {
        match (self.match_region(address), privilege_level) {
            (Some(region), PrivilegeLevel::Machine) => {
                if region.locked || self.m_enforced & (1 << region.index) != 0 {
                    region.permissions
                } else {
                    Permissions::ALL
                }
            }
            (Some(region), PrivilegeLevel::User) => region.permissions,
            (None, PrivilegeLevel::Machine) => Permissions::ALL,
            (None, PrivilegeLevel::User) => Permissions::NONE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NAPOT: u8 = 3 << cfg::A_SHIFT;
    const TOR: u8 = 1 << cfg::A_SHIFT;
    const NA4: u8 = 2 << cfg::A_SHIFT;

    #[test]
    fn test_unmatched() {
        let pmp = Pmp::new(4);
        assert_eq!(None, pmp.match_region(0x1000));
        assert_eq!(Permissions::ALL, pmp.permissions(0x1000, PrivilegeLevel::Machine));
        assert_eq!(Permissions::NONE, pmp.permissions(0x1000, PrivilegeLevel::User));
    }

    #[test]
    fn test_napot() {
        let mut pmp = Pmp::new(4);
        // 4 KiB region at 0x2000: (0x2000 >> 2) | (0x1000 / 8 - 1)
        pmp.write_addr(0, 0x0800 | 0x1ff);
        pmp.write_cfg(0, (NAPOT | cfg::R) as u32);
        assert_eq!(Some(0), pmp.match_region(0x2000).map(|r| r.index));
        assert_eq!(Some(0), pmp.match_region(0x2ffc).map(|r| r.index));
        assert_eq!(None, pmp.match_region(0x3000));
        assert_eq!(None, pmp.match_region(0x1ffc));
        let permissions = pmp.permissions(0x2004, PrivilegeLevel::User);
        assert!(permissions.allows(AccessType::Read));
        assert!(!permissions.allows(AccessType::Write));
        // Unlocked regions don't restrict M-mode.
        assert_eq!(Permissions::ALL, pmp.permissions(0x2004, PrivilegeLevel::Machine));
    }

    #[test]
    fn test_napot_all_ones_matches_everything() {
        let mut pmp = Pmp::new(4);
        pmp.write_addr(3, 0xffff_ffff);
        pmp.write_cfg(0, ((NAPOT | cfg::X) as u32) << 24);
        assert_eq!(0x3fff_ffff, pmp.read_addr(3));
        assert_eq!(Some(3), pmp.match_region(0).map(|r| r.index));
        assert_eq!(Some(3), pmp.match_region(0xffff_fffc).map(|r| r.index));
        assert_eq!(0b100, pmp.permissions(0x40, PrivilegeLevel::User).xwr());
    }

    #[test]
    fn test_lowest_index_wins() {
        let mut pmp = Pmp::new(4);
        pmp.write_addr(0, 0x1000 >> 2);
        pmp.write_addr(1, 0xffff_ffff);
        pmp.write_cfg(0, (TOR | cfg::R) as u32 | ((NAPOT | 0b111) as u32) << 8);
        assert_eq!(0b001, pmp.permissions(0xffc, PrivilegeLevel::User).xwr());
        assert_eq!(0b111, pmp.permissions(0x1000, PrivilegeLevel::User).xwr());
    }

    #[test]
    fn test_tor_and_na4() {
        let mut pmp = Pmp::new(4);
        pmp.write_addr(0, 0x100 >> 2);
        pmp.write_addr(1, 0x200 >> 2);
        pmp.write_addr(2, 0x300 >> 2);
        pmp.write_cfg(0, ((TOR | cfg::W) as u32) << 8 | ((NA4 | cfg::X) as u32) << 16);
        assert_eq!(None, pmp.match_region(0xfc));
        assert_eq!(Some(1), pmp.match_region(0x100).map(|r| r.index));
        assert_eq!(Some(1), pmp.match_region(0x1fc).map(|r| r.index));
        assert_eq!(Some(2), pmp.match_region(0x300).map(|r| r.index));
        assert_eq!(None, pmp.match_region(0x304));
    }

    #[test]
    fn test_locking() {
        let mut pmp = Pmp::new(4);
        pmp.write_addr(0, 0x40);
        pmp.write_addr(1, 0x80);
        pmp.write_cfg(0, ((cfg::L | TOR) as u32) << 8);
        // Region 1 is locked, and its TOR bottom (pmpaddr0) is locked with it.
        pmp.write_addr(0, 0x10);
        pmp.write_addr(1, 0x10);
        assert_eq!(0x40, pmp.read_addr(0));
        assert_eq!(0x80, pmp.read_addr(1));
        pmp.write_cfg(0, 0xffff_ffff);
        assert_eq!(0x9f9f_889f, pmp.read_cfg(0));
        // Locked regions apply to M-mode.
        assert_eq!(Permissions::NONE, pmp.permissions(0x180, PrivilegeLevel::Machine));
    }

    #[test]
    fn test_m_enforced() {
        let mut pmp = Pmp::new(4);
        pmp.write_addr(0, 0xffff_ffff);
        pmp.write_cfg(0, (NAPOT | cfg::R) as u32);
        pmp.write_m_enforced(0xffff);
        assert_eq!(0xf, pmp.read_m_enforced());
        assert_eq!(0b001, pmp.permissions(0, PrivilegeLevel::Machine).xwr());
    }

    #[test]
    fn test_unimplemented_regions() {
        let mut pmp = Pmp::new(4);
        pmp.write_cfg(1, 0xffff_ffff);
        pmp.write_addr(4, 0x1234);
        assert_eq!(0, pmp.read_cfg(1));
        assert_eq!(0, pmp.read_addr(4));
        assert_eq!(0, pmp.read_cfg(7));
        assert_eq!(0, pmp.read_addr(99));
    }
}
