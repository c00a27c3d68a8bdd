//! Kernel-side paging: root-table management and the user stack-growth
//! policy. The Sv32 mechanics live in `micaos_riscv::mmu`; this module
//! marries them to the page allocator.

use micaos_allocator::{OutOfMemory, Page, PageAllocator};
use micaos_riscv::mmu::{PageTable, PhysAddr, Pte, PteFlags, VirtAddr, PAGE_SIZE};

use crate::kernel::Kernel;
use crate::process::{Process, ProcessState, REG_SP};

pub type KernelAllocator = PageAllocator<PAGE_SIZE>;

/// Ceiling on demand-grown user stacks: 8 MiB below the top of the
/// 32-bit address space.
pub const MAX_USER_STACK: u32 = 8 * 1024 * 1024;

/// An extra leaf to install in a fresh address space, typically the UART
/// window user programs expect at VA 0x5000.
#[derive(Clone, Copy)]
pub struct Mapping {
    pub virt: u32,
    pub phys: u64,
    pub flags: PteFlags,
}

/// Allocates an empty root table.
pub fn create_root(allocator: &mut KernelAllocator) -> Result<*mut PageTable, OutOfMemory> {
    // zalloc'd pages are all-invalid entries already
    Ok(allocator.zalloc(1)? as *mut Page<PAGE_SIZE> as *mut PageTable)
}

fn walk_mut<'t>(
    root: &'t mut PageTable,
    allocator: &mut KernelAllocator,
    va: VirtAddr,
) -> Result<&'t mut Pte, OutOfMemory> {
    let mut zalloc =
        |count: usize| allocator.zalloc(count).ok().map(|p| p as *mut Page<PAGE_SIZE> as *mut u8);
    root.leaf_entry_mut(va, &mut zalloc).ok_or(OutOfMemory)
}

/// Ensures a user-visible page exists at `va` and returns the physical
/// address backing the exact byte `va` points at.
///
/// A second call for the same page unions the permissions into the
/// existing leaf and keeps its backing page; use [`set_mapping`] for
/// replacement semantics.
pub fn create_page(
    root: &mut PageTable,
    allocator: &mut KernelAllocator,
    va: VirtAddr,
    flags: PteFlags,
) -> Result<PhysAddr, OutOfMemory> {
    let entry = walk_mut(root, allocator, va)?;
    if entry.is_valid() {
        assert!(entry.is_leaf(), "permissionless leaf entry for {:#x}", va.as_u32());
        *entry = Pte::leaf(entry.phys(), entry.flags().union(flags));
    } else {
        let page = allocator.zalloc(1)?;
        *entry = Pte::leaf(PhysAddr::new(page as *mut u8 as usize as u64), flags);
    }
    Ok(entry.phys().add_offset(va.offset()))
}

/// Installs a leaf pointing at an externally owned page, such as an MMIO
/// window. Permissions replace the previous mapping's; if the displaced
/// backing page belonged to the allocator it is returned to the pool.
pub fn set_mapping(
    root: &mut PageTable,
    allocator: &mut KernelAllocator,
    va: VirtAddr,
    phys: PhysAddr,
    flags: PteFlags,
) -> Result<(), OutOfMemory> {
    let entry = walk_mut(root, allocator, va)?;
    if entry.is_leaf() {
        let old = entry.phys().as_mut_ptr();
        if allocator.owns(old) {
            allocator.dealloc(old as *mut Page<PAGE_SIZE>);
        }
    }
    *entry = Pte::leaf(phys, flags);
    Ok(())
}

/// Read-only translation.
pub fn phys_from_virt(root: &PageTable, va: VirtAddr) -> Option<PhysAddr> {
    root.virt_to_phys(va)
}

/// Points translation at `root` for the next `mret` to user mode.
#[cfg(target_arch = "riscv32")]
pub fn enable(root: &PageTable) {
    use micaos_riscv::cpu::registers::satp;
    unsafe { satp::write(satp::Satp::sv32(root as *const PageTable as usize)) };
}

#[cfg(target_arch = "riscv32")]
pub fn disable() {
    use micaos_riscv::cpu::registers::satp;
    unsafe { satp::write(satp::Satp::BARE) };
}

/// The stack-growth policy: a fault is a legitimate stack access when it
/// lands between the process's stack pointer and the top of the address
/// space, and the stack pointer itself is within the stack ceiling. All
/// comparisons are unsigned.
pub fn grows_stack(fault_addr: u32, sp: u32) -> bool {
    fault_addr >= sp && sp >= u32::MAX - MAX_USER_STACK
}

/// Handler for instruction, load, and store page faults. Grows the user
/// stack when the policy allows; any other fault kills the process.
pub fn page_fault_handler(kernel: &mut Kernel, process: &mut Process) {
    let fault = process.fault_cause as u32;
    let sp = process.saved[REG_SP] as u32;
    if grows_stack(fault, sp) {
        let root = unsafe { &mut *process.page_table };
        let grown = create_page(
            root,
            &mut kernel.allocator,
            VirtAddr::new(fault),
            PteFlags::READ_WRITE | PteFlags::USER,
        );
        if grown.is_ok() {
            return;
        }
        // no memory left for the stack: fall through and kill
    }
    process.state = ProcessState::Dying;
    #[cfg(target_arch = "riscv32")]
    {
        use micaos_peripherals::println;
        // safety: debug output only
        let mut uart = unsafe { micaos_virtio::uart::Uart0::new() };
        println!(
            uart,
            "killing '{}' (pid {}): bad access {:#x} at pc {:#x}",
            process.name(),
            process.id,
            fault,
            process.pc
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testmem::Arena;

    fn resident_pages(root: &PageTable) -> usize {
        let mut count = 0;
        for vpn1 in 0..1024 {
            for vpn0 in 0..1024 {
                let va = VirtAddr::new(((vpn1 as u32) << 22) | ((vpn0 as u32) << 12));
                if let Some(entry) = root.leaf_entry(va) {
                    if entry.is_leaf() {
                        count += 1;
                    }
                } else {
                    break; // whole mid-level table absent
                }
            }
        }
        count
    }

    fn fresh(arena: &Arena) -> (KernelAllocator, &'static mut PageTable) {
        let mut allocator = arena.allocator();
        let root = create_root(&mut allocator).unwrap();
        (allocator, unsafe { &mut *root })
    }

    #[test]
    fn mapping_round_trips_at_address_extremes() {
        let arena = Arena::new(32);
        let (mut allocator, root) = fresh(&arena);
        for va in [0x0000_0000u32, 0xFFFF_F000, 0x0000_1000] {
            let va = VirtAddr::new(va);
            let phys = create_page(root, &mut allocator, va, PteFlags::READ_WRITE).unwrap();
            assert_eq!(phys_from_virt(root, va), Some(phys));
        }
        assert_eq!(phys_from_virt(root, VirtAddr::new(0x8000_0000)), None);
    }

    #[test]
    fn translation_covers_in_page_offsets() {
        let arena = Arena::new(16);
        let (mut allocator, root) = fresh(&arena);
        let base = create_page(root, &mut allocator, VirtAddr::new(0x4_0000), PteFlags::READ).unwrap();
        let offset = phys_from_virt(root, VirtAddr::new(0x4_0123)).unwrap();
        assert_eq!(offset, base.add_offset(0x123));
    }

    #[test]
    fn repeated_create_page_unions_permissions() {
        let arena = Arena::new(16);
        let (mut allocator, root) = fresh(&arena);
        let va = VirtAddr::new(0x7000);
        let first = create_page(root, &mut allocator, va, PteFlags::READ).unwrap();
        let second = create_page(root, &mut allocator, va, PteFlags::READ_WRITE).unwrap();
        // same backing page, widened permissions
        assert_eq!(first, second);
        let entry = *root.leaf_entry(va).unwrap();
        assert!(entry.flags().contains(PteFlags::READ_WRITE));
    }

    #[test]
    fn set_mapping_replaces_and_frees_owned_pages() {
        let arena = Arena::new(16);
        let (mut allocator, root) = fresh(&arena);
        let va = VirtAddr::new(0x5000);

        // allocator-owned page first
        let owned = create_page(root, &mut allocator, va, PteFlags::READ_WRITE).unwrap();
        assert!(allocator.owns(owned.as_mut_ptr()));

        // remap over it to a device window: owned page goes back to the pool
        let device = PhysAddr::new(0x1000_0000);
        set_mapping(root, &mut allocator, va, device, PteFlags::READ_WRITE | PteFlags::USER)
            .unwrap();
        assert_eq!(phys_from_virt(root, va), Some(device));

        // remapping a device window frees nothing
        let device2 = PhysAddr::new(0x1000_1000);
        set_mapping(root, &mut allocator, va, device2, PteFlags::READ_WRITE).unwrap();
        assert_eq!(phys_from_virt(root, va), Some(device2));

        // the freed page is available again
        let again = create_page(root, &mut allocator, VirtAddr::new(0x9000), PteFlags::READ)
            .unwrap();
        assert_eq!(again.ppn(), owned.ppn());
    }

    #[test]
    fn set_mapping_permissions_replace() {
        let arena = Arena::new(16);
        let (mut allocator, root) = fresh(&arena);
        let va = VirtAddr::new(0x5000);
        let device = PhysAddr::new(0x1000_0000);
        set_mapping(root, &mut allocator, va, device, PteFlags::READ_WRITE | PteFlags::USER)
            .unwrap();
        set_mapping(root, &mut allocator, va, device, PteFlags::READ).unwrap();
        let entry = *root.leaf_entry(va).unwrap();
        assert!(!entry.flags().contains(PteFlags::WRITE));
        assert!(!entry.flags().contains(PteFlags::USER));
    }

    #[test]
    fn exhausted_allocator_reports_out_of_memory() {
        let arena = Arena::new(4);
        let mut allocator = arena.allocator();
        let root = create_root(&mut allocator).unwrap();
        let root = unsafe { &mut *root };
        let mut failed = false;
        for i in 0..8u32 {
            // spread across mid-level tables to burn pages faster
            let va = VirtAddr::new(i << 22);
            if create_page(root, &mut allocator, va, PteFlags::READ).is_err() {
                failed = true;
                break;
            }
        }
        assert!(failed);
    }

    #[test]
    #[should_panic(expected = "superpage")]
    fn superpage_walks_panic() {
        let arena = Arena::new(8);
        let (mut allocator, root) = fresh(&arena);
        let va = VirtAddr::new(0x4000_0000);
        create_page(root, &mut allocator, va, PteFlags::READ).unwrap();
        // forge a permission bit onto the mid-level entry
        unsafe {
            let raw = root as *mut PageTable as *mut u32;
            let index = va.vpn1();
            *raw.add(index) |= 0b10; // READ on a branch
        }
        let _ = phys_from_virt(root, va);
    }

    #[test]
    fn stack_policy_is_unsigned() {
        let top = u32::MAX;
        let sp = USER_SP;
        assert!(grows_stack(sp, sp));
        assert!(grows_stack(top - 0x100, sp.min(top - 0x100)));
        assert!(!grows_stack(0x1000, sp)); // far below the stack
        assert!(!grows_stack(top, 0x1000)); // sp outside the stack ceiling
        assert!(grows_stack(top, top - MAX_USER_STACK));
        assert!(!grows_stack(top, top - MAX_USER_STACK - 1));
    }

    const USER_SP: u32 = crate::process::USER_STACK_TOP;

    #[test]
    fn fault_in_stack_range_grows_by_one_page() {
        let arena = Arena::new(32);
        let mut kernel = crate::kernel::Kernel::for_tests(&arena);
        let root = create_root(&mut kernel.allocator).unwrap();
        let mut process = crate::process::Process::new(1, "grower", crate::process::Priority::User, root);
        let before = resident_pages(unsafe { &*root });

        process.fault_cause = (u32::MAX - 0x100) as usize;
        process.saved[REG_SP] = (u32::MAX - 0x100) as usize & !0xF;
        page_fault_handler(&mut kernel, &mut process);

        assert_ne!(process.state, ProcessState::Dying);
        let after = resident_pages(unsafe { &*root });
        assert_eq!(after, before + 1);
        let mapped = phys_from_virt(unsafe { &*root }, VirtAddr::new(u32::MAX - 0x100)).unwrap();
        let entry = *unsafe { &*root }.leaf_entry(VirtAddr::new(u32::MAX - 0x100)).unwrap();
        assert!(entry.flags().contains(PteFlags::READ_WRITE | PteFlags::USER));
        assert!(!entry.flags().contains(PteFlags::EXECUTE));
        assert!(kernel.allocator.owns(mapped.as_mut_ptr()));
    }

    #[test]
    fn fault_far_from_sp_kills_the_process() {
        let arena = Arena::new(32);
        let mut kernel = crate::kernel::Kernel::for_tests(&arena);
        let root = create_root(&mut kernel.allocator).unwrap();
        let mut process = crate::process::Process::new(2, "stray", crate::process::Priority::User, root);
        let before = resident_pages(unsafe { &*root });

        process.fault_cause = 0x1000;
        page_fault_handler(&mut kernel, &mut process);

        assert_eq!(process.state, ProcessState::Dying);
        assert_eq!(resident_pages(unsafe { &*root }), before);
    }
}
