//! Host-test backing memory.
//!
//! Sv32 PTEs hold 22-bit physical page numbers, so test memory must live
//! at 32-bit-representable addresses. Each arena is an anonymous mapping
//! at a fixed low address, carved from a process-wide cursor so parallel
//! tests never overlap.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::paging::KernelAllocator;
use micaos_riscv::mmu::PAGE_SIZE;

static NEXT_WINDOW: AtomicUsize = AtomicUsize::new(0x4000_0000);

pub struct Arena {
    base: usize,
    len: usize,
}

impl Arena {
    pub fn new(pages: usize) -> Arena {
        let len = pages * PAGE_SIZE;
        // a guard page's worth of slack between arenas
        let base = NEXT_WINDOW.fetch_add(len + PAGE_SIZE, Ordering::SeqCst);
        let mapped = unsafe {
            libc::mmap(
                base as *mut libc::c_void,
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS | libc::MAP_FIXED_NOREPLACE,
                -1,
                0,
            )
        };
        assert!(
            mapped != libc::MAP_FAILED && mapped as usize == base,
            "failed to map a fixed low-address arena"
        );
        Arena { base, len }
    }

    pub fn bounds(&self) -> (usize, usize) {
        (self.base, self.base + self.len)
    }

    /// A page allocator owning this arena.
    pub fn allocator(&self) -> KernelAllocator {
        unsafe { KernelAllocator::new(self.base, self.base + self.len) }
    }
}

impl Drop for Arena {
    fn drop(&mut self) {
        unsafe { libc::munmap(self.base as *mut libc::c_void, self.len) };
    }
}
