use core::ops::BitOr;

use super::address::PhysAddr;

/// Permission and status bits of a page table entry (the low ten bits,
/// minus the two software bits this kernel does not use).
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PteFlags(u32);

impl PteFlags {
    pub const EMPTY: PteFlags = PteFlags(0);
    pub const READ: PteFlags = PteFlags(1 << 1);
    pub const WRITE: PteFlags = PteFlags(1 << 2);
    pub const EXECUTE: PteFlags = PteFlags(1 << 3);
    pub const USER: PteFlags = PteFlags(1 << 4);
    pub const GLOBAL: PteFlags = PteFlags(1 << 5);

    pub const READ_WRITE: PteFlags = PteFlags(1 << 1 | 1 << 2);
    pub const READ_EXECUTE: PteFlags = PteFlags(1 << 1 | 1 << 3);

    pub const fn contains(self, other: PteFlags) -> bool {
        self.0 & other.0 == other.0
    }

    /// Any of R/W/X set, which is what makes a valid entry a leaf.
    pub const fn is_mapping(self) -> bool {
        self.0 & (Self::READ.0 | Self::WRITE.0 | Self::EXECUTE.0) != 0
    }

    /// The architectural leaf rule: readable, or execute-only. A
    /// writable-but-unreadable encoding is reserved.
    pub const fn is_legal_leaf(self) -> bool {
        self.contains(Self::READ) || (self.contains(Self::EXECUTE) && !self.contains(Self::WRITE))
    }

    pub const fn union(self, other: PteFlags) -> PteFlags {
        PteFlags(self.0 | other.0)
    }

    const fn raw(self) -> u32 {
        self.0
    }
}

impl BitOr for PteFlags {
    type Output = PteFlags;
    fn bitor(self, rhs: PteFlags) -> PteFlags {
        self.union(rhs)
    }
}

impl core::fmt::Debug for PteFlags {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        for (bit, name) in [
            (Self::READ, "R"),
            (Self::WRITE, "W"),
            (Self::EXECUTE, "X"),
            (Self::USER, "U"),
            (Self::GLOBAL, "G"),
        ] {
            f.write_str(if self.contains(bit) { name } else { "-" })?;
        }
        Ok(())
    }
}

const VALID: u32 = 1 << 0;
const ACCESSED: u32 = 1 << 6;
const DIRTY: u32 = 1 << 7;
const FLAG_MASK: u32 = (1 << 10) - 1;
const PPN_SHIFT: u32 = 10;

/// One 32-bit Sv32 page table entry.
#[derive(Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct Pte(u32);

impl Pte {
    pub const INVALID: Pte = Pte(0);

    /// A leaf mapping `phys` with the given permissions. Accessed and
    /// dirty are pre-set so the hardware never needs to update them.
    pub fn leaf(phys: PhysAddr, flags: PteFlags) -> Pte {
        assert!(flags.is_legal_leaf(), "reserved leaf permission encoding");
        Pte(phys.ppn() << PPN_SHIFT | flags.raw() | ACCESSED | DIRTY | VALID)
    }

    /// A non-leaf entry pointing at the next-level table. Carries no
    /// permission, user, or status bits.
    pub fn branch(phys: PhysAddr) -> Pte {
        Pte(phys.ppn() << PPN_SHIFT | VALID)
    }

    pub const fn is_valid(self) -> bool {
        self.0 & VALID != 0
    }

    pub const fn is_leaf(self) -> bool {
        self.is_valid() && self.flags().is_mapping()
    }

    pub const fn is_branch(self) -> bool {
        self.is_valid() && !self.flags().is_mapping()
    }

    pub const fn flags(self) -> PteFlags {
        PteFlags(self.0 & FLAG_MASK & !(VALID | ACCESSED | DIRTY))
    }

    pub const fn phys(self) -> PhysAddr {
        PhysAddr::from_ppn(self.0 >> PPN_SHIFT)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl core::fmt::Debug for Pte {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        if !self.is_valid() {
            return f.write_str("Pte(invalid)");
        }
        write!(
            f,
            "Pte({:?} {:#x} {})",
            self.flags(),
            self.phys().as_u64(),
            if self.is_leaf() { "leaf" } else { "branch" }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaf_presets_accessed_and_dirty() {
        let pte = Pte::leaf(PhysAddr::from_ppn(0x1234), PteFlags::READ_WRITE);
        assert!(pte.is_valid() && pte.is_leaf());
        assert_eq!(pte.raw() & (ACCESSED | DIRTY), ACCESSED | DIRTY);
        assert_eq!(pte.phys(), PhysAddr::from_ppn(0x1234));
        assert!(pte.flags().contains(PteFlags::READ_WRITE));
    }

    #[test]
    fn branch_has_no_permissions() {
        let pte = Pte::branch(PhysAddr::from_ppn(7));
        assert!(pte.is_branch() && !pte.is_leaf());
        assert_eq!(pte.flags(), PteFlags::EMPTY);
    }

    #[test]
    #[should_panic(expected = "reserved leaf permission")]
    fn write_only_leaves_are_rejected() {
        Pte::leaf(PhysAddr::from_ppn(1), PteFlags::WRITE);
    }

    #[test]
    fn execute_only_is_a_legal_leaf() {
        assert!(PteFlags::EXECUTE.is_legal_leaf());
        assert!(!(PteFlags::WRITE | PteFlags::EXECUTE).is_legal_leaf());
    }
}
