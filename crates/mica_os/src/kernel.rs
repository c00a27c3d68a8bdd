//! The kernel singleton.
//!
//! The scheduler, the page allocator, and the trap handler table have
//! init-once, process-wide lifecycles, so they live together in one
//! struct behind a lock. On this single hart the lock never contends; it
//! is the static-cell idiom, not SMP support. The struct must be
//! initialized in its final location: the scheduler's list sentinels are
//! self-referential and pin it in place.

use spin::Mutex;

use crate::paging::{KernelAllocator, Mapping};
use crate::process::{Priority, Process};
use crate::scheduler::{CreateError, Scheduler};
use crate::trap::HandlerTable;

pub static KERNEL: Mutex<Option<Kernel>> = Mutex::new(None);

pub struct Kernel {
    pub allocator: KernelAllocator,
    pub scheduler: Scheduler,
    pub handlers: HandlerTable,
}

// raw process pointers throughout; the single hart is the actual
// exclusion mechanism
unsafe impl Send for Kernel {}

impl Kernel {
    /// # Safety
    /// Hands `heap_start..heap_tail` to the page allocator; see
    /// [`KernelAllocator::new`].
    pub unsafe fn new(heap_start: usize, heap_tail: usize) -> Kernel {
        Kernel {
            allocator: KernelAllocator::new(heap_start, heap_tail),
            scheduler: Scheduler::new(),
            handlers: HandlerTable::new(),
        }
    }

    /// Finishes construction in place: list sentinels and the idle
    /// process. Call exactly once, after the struct has reached its
    /// final address.
    pub fn init(&mut self) -> Result<(), CreateError> {
        self.scheduler.init(&mut self.allocator)
    }

    pub fn create_process(
        &mut self,
        name: &str,
        binary: &[u8],
        priority: Priority,
        mappings: &[Mapping],
    ) -> Result<*mut Process, CreateError> {
        self.scheduler
            .create(&mut self.allocator, name, binary, priority, mappings)
    }

    #[cfg(test)]
    pub fn for_tests(arena: &crate::testmem::Arena) -> Kernel {
        let (head, tail) = arena.bounds();
        unsafe { Kernel::new(head, tail) }
    }
}
