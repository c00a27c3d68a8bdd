//! The process record.
//!
//! One record is exactly one page. The trap stub in `assembly/trap.s`
//! addresses the fields below with hard-coded offsets and takes the
//! kernel stack to be the tail of the record, so the layout here is
//! `repr(C)` and checked against the stub's constants at compile time.

use micaos_riscv::mmu::PageTable;

use crate::list::ListElem;

/// Value of [`Process::magic`]; the trap stub refuses an `mscratch`
/// pointer whose record does not carry it.
pub const PROCESS_MAGIC: u16 = 0x242;

pub const NAME_LEN: usize = 16;

/// Bytes of per-process kernel stack: the remainder of the page after
/// the header fields (sized for the rv32 layout).
pub const KSTACK_LEN: usize = 3912;

/// Initial user stack pointer, just under the top of the 32-bit address
/// space. Nothing is mapped there: the first push page-faults and the
/// stack-growth policy maps it.
pub const USER_STACK_TOP: u32 = 0xFFFF_FF00;

// indices into Process::saved; saved[i] holds x(i+1)
pub const REG_RA: usize = 0;
pub const REG_SP: usize = 1;
pub const REG_A0: usize = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ProcessState {
    Running,
    Ready,
    Blocked,
    /// Killed, awaiting its final descheduling. Never runs again.
    Dying,
}

/// Which ready queue a process is created on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Priority {
    Driver = 0,
    Server = 1,
    User = 2,
}

#[repr(C, align(4096))]
pub struct Process {
    /// General purpose registers in trap-stub order:
    /// ra, sp, gp, tp, t0-t2, s0, s1, a0-a7, s2-s11, t3-t6.
    pub saved: [usize; 31],
    /// Resume address, copied from mepc on trap.
    pub pc: usize,
    /// mtval at the last trap.
    pub fault_cause: usize,
    /// Owning pointer to the Sv32 root table.
    pub page_table: *mut PageTable,
    pub magic: u16,
    pub id: u16,
    pub state: ProcessState,
    pub priority: Priority,
    /// Zero-padded, truncated on overflow.
    pub name: [u8; NAME_LEN],
    /// Membership in the scheduler's `all` list.
    pub allelem: ListElem,
    /// Membership in one ready list or the blocked list.
    pub elem: ListElem,
    /// Kernel stack; the stub sets sp to the end of the record, which is
    /// also the end of this field.
    pub stack: [u8; KSTACK_LEN],
}

impl Process {
    pub fn new(id: u16, name: &str, priority: Priority, page_table: *mut PageTable) -> Process {
        let mut process = Process {
            saved: [0; 31],
            pc: 0,
            fault_cause: 0,
            page_table,
            magic: PROCESS_MAGIC,
            id,
            state: ProcessState::Ready,
            priority,
            name: [0; NAME_LEN],
            allelem: ListElem::new(),
            elem: ListElem::new(),
            stack: [0; KSTACK_LEN],
        };
        process.set_name(name);
        process.saved[REG_SP] = USER_STACK_TOP as usize;
        process
    }

    pub fn set_name(&mut self, name: &str) {
        self.name = [0; NAME_LEN];
        let len = name.len().min(NAME_LEN);
        self.name[..len].copy_from_slice(&name.as_bytes()[..len]);
    }

    pub fn name(&self) -> &str {
        let len = self.name.iter().position(|&b| b == 0).unwrap_or(NAME_LEN);
        core::str::from_utf8(&self.name[..len]).unwrap_or("<non-utf8>")
    }
}

// The offsets the trap stub compiles in. Any change to the record must
// keep these in sync with assembly/trap.s.
#[cfg(target_arch = "riscv32")]
mod stub_abi {
    use super::*;
    use core::mem::{offset_of, size_of};

    const _: () = assert!(size_of::<Process>() == 4096);
    const _: () = assert!(offset_of!(Process, saved) == 0);
    const _: () = assert!(offset_of!(Process, pc) == 124);
    const _: () = assert!(offset_of!(Process, fault_cause) == 128);
    const _: () = assert!(offset_of!(Process, magic) == 136);
    const _: () = assert!(offset_of!(Process, stack) + KSTACK_LEN == 4096);
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::ptr::null_mut;

    #[test]
    fn names_are_zero_padded_and_truncated() {
        let mut p = Process::new(1, "uart", Priority::Driver, null_mut());
        assert_eq!(p.name(), "uart");
        assert!(p.name[4..].iter().all(|&b| b == 0));

        p.set_name("a-name-well-beyond-sixteen-bytes");
        assert_eq!(p.name().len(), NAME_LEN);
        assert_eq!(p.name(), "a-name-well-beyo");
    }

    #[test]
    fn fresh_records_are_stamped() {
        let p = Process::new(3, "init", Priority::User, null_mut());
        assert_eq!(p.magic, PROCESS_MAGIC);
        assert_eq!(p.id, 3);
        assert_eq!(p.state, ProcessState::Ready);
        assert_eq!(p.saved[REG_SP], USER_STACK_TOP as usize);
        assert_eq!(p.pc, 0);
    }
}
