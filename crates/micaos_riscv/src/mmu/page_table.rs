use super::address::{PhysAddr, VirtAddr};
use super::entry::Pte;
use super::PAGE_SIZE;

pub const ENTRIES_PER_TABLE: usize = PAGE_SIZE / core::mem::size_of::<Pte>();

/// Page source handed into the walk for mid-level table creation. Returns
/// a zeroed, page-aligned page or None when memory is exhausted.
pub type ZAlloc<'a> = &'a mut dyn FnMut(usize) -> Option<*mut u8>;

/// One level of an Sv32 page table: 1024 entries, exactly a page, page
/// aligned. The same type serves as root and as second level.
#[repr(C, align(4096))]
pub struct PageTable {
    entries: [Pte; ENTRIES_PER_TABLE],
}

impl PageTable {
    /// The table's physical location; Sv32 tables live at their physical
    /// address, so the pointer is the address.
    pub fn phys(&self) -> PhysAddr {
        PhysAddr::new(self as *const PageTable as usize as u64)
    }

    fn next_level(&self, entry: Pte) -> &PageTable {
        unsafe { &*(entry.phys().as_mut_ptr() as *const PageTable) }
    }

    fn next_level_mut(&mut self, entry: Pte) -> &mut PageTable {
        unsafe { &mut *(entry.phys().as_mut_ptr() as *mut PageTable) }
    }

    /// Read-only walk to the level-two entry covering `va`. `None` when
    /// the mid-level entry is absent. Superpages are forbidden in this
    /// kernel, so a level-one leaf is a corrupt table and panics.
    pub fn leaf_entry(&self, va: VirtAddr) -> Option<&Pte> {
        let mid = self.entries[va.vpn1()];
        if !mid.is_valid() {
            return None;
        }
        assert!(
            mid.is_branch(),
            "superpage entry for {:#x} in table {:#x}",
            va.as_u32(),
            self.phys().as_u64()
        );
        Some(&self.next_level(mid).entries[va.vpn0()])
    }

    /// Walk to the level-two entry covering `va`, creating the mid-level
    /// table from `zalloc` if it is absent. `None` means allocation
    /// failed; in that case the table is left exactly as it was.
    pub fn leaf_entry_mut(&mut self, va: VirtAddr, zalloc: ZAlloc) -> Option<&mut Pte> {
        let mid = self.entries[va.vpn1()];
        let mid = if mid.is_valid() {
            assert!(
                mid.is_branch(),
                "superpage entry for {:#x} in table {:#x}",
                va.as_u32(),
                self.phys().as_u64()
            );
            mid
        } else {
            // only install the branch once the allocation has succeeded,
            // so failure cannot leave a dangling mid-level entry
            let table = zalloc(1)?;
            let branch = Pte::branch(PhysAddr::new(table as usize as u64));
            self.entries[va.vpn1()] = branch;
            branch
        };
        Some(&mut self.next_level_mut(mid).entries[va.vpn0()])
    }

    /// Translates `va` if a valid leaf covers it.
    pub fn virt_to_phys(&self, va: VirtAddr) -> Option<PhysAddr> {
        let entry = *self.leaf_entry(va)?;
        if !entry.is_leaf() {
            return None;
        }
        Some(entry.phys().add_offset(va.offset()))
    }
}
