//! Three-priority round-robin scheduling with a dedicated idle process.

use core::cell::UnsafeCell;
use core::mem::MaybeUninit;
use core::ptr::null_mut;
use core::sync::atomic::{AtomicBool, Ordering};

use micaos_allocator::OutOfMemory;
use micaos_riscv::mmu::VirtAddr;

use crate::elf::{self, ElfError, LoadError};
use crate::list::{self, List};
use crate::owner_of;
use crate::paging::{self, KernelAllocator, Mapping};
use crate::process::{Priority, Process, ProcessState};
use crate::programs;

/// Capacity of the static process pool.
pub const MAX_PROCS: usize = 4096;

struct Pool(UnsafeCell<[MaybeUninit<Process>; MAX_PROCS]>);

// Single-hart kernel; slot claims below are what arbitrates access.
unsafe impl Sync for Pool {}

static POOL: Pool = Pool(UnsafeCell::new([const { MaybeUninit::uninit() }; MAX_PROCS]));
static POOL_CLAIMED: [AtomicBool; MAX_PROCS] = [const { AtomicBool::new(false) }; MAX_PROCS];

/// Claims a free record slot. Slots of dead processes are not reused
/// (reclamation is out of scope), so this is a high-water-mark scan.
fn claim_slot() -> Option<*mut Process> {
    for (i, claimed) in POOL_CLAIMED.iter().enumerate() {
        if claimed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            let slots = POOL.0.get() as *mut MaybeUninit<Process>;
            return Some(unsafe { (*slots.add(i)).as_mut_ptr() });
        }
    }
    None
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateError {
    OutOfMemory,
    Format(ElfError),
    /// All [`MAX_PROCS`] record slots are in use.
    PoolExhausted,
}

impl From<OutOfMemory> for CreateError {
    fn from(_: OutOfMemory) -> CreateError {
        CreateError::OutOfMemory
    }
}

impl From<LoadError> for CreateError {
    fn from(e: LoadError) -> CreateError {
        match e {
            LoadError::Format(f) => CreateError::Format(f),
            LoadError::OutOfMemory => CreateError::OutOfMemory,
        }
    }
}

pub struct Scheduler {
    /// Every live process.
    all: List,
    /// Ready queues, indexed by [`Priority`].
    ready: [List; 3],
    blocked: List,
    running: *mut Process,
    idle: *mut Process,
    next_id: u16,
}

impl Scheduler {
    pub const fn new() -> Scheduler {
        Scheduler {
            all: List::new(),
            ready: [List::new(), List::new(), List::new()],
            blocked: List::new(),
            running: null_mut(),
            idle: null_mut(),
            next_id: 1,
        }
    }

    /// Brings the lists up in place and loads the idle process. Must run
    /// at the scheduler's final address; the sentinels pin it there.
    pub fn init(&mut self, allocator: &mut KernelAllocator) -> Result<(), CreateError> {
        self.all.init();
        for queue in self.ready.iter_mut() {
            queue.init();
        }
        self.blocked.init();

        let idle = self.create(allocator, "idle", programs::IDLE, Priority::User, &[])?;
        // idle is dispatched only when every queue is empty; it never
        // sits on a ready list
        unsafe { list::remove(&mut (*idle).elem) };
        self.idle = idle;
        Ok(())
    }

    pub fn idle(&self) -> *mut Process {
        self.idle
    }

    pub fn running(&self) -> *mut Process {
        self.running
    }

    /// Builds a process: a record slot, a fresh root table, the ELF
    /// image, and any extra device windows, then queues it as Ready.
    pub fn create(
        &mut self,
        allocator: &mut KernelAllocator,
        name: &str,
        binary: &[u8],
        priority: Priority,
        mappings: &[Mapping],
    ) -> Result<*mut Process, CreateError> {
        let slot = claim_slot().ok_or(CreateError::PoolExhausted)?;
        let root = paging::create_root(allocator)?;
        let entry = elf::load(unsafe { &mut *root }, allocator, binary)?;
        for mapping in mappings {
            paging::set_mapping(
                unsafe { &mut *root },
                allocator,
                VirtAddr::new(mapping.virt),
                micaos_riscv::mmu::PhysAddr::new(mapping.phys),
                mapping.flags,
            )?;
        }

        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        let process = unsafe {
            core::ptr::write(slot, Process::new(id, name, priority, root));
            &mut *slot
        };
        process.pc = entry as usize;
        unsafe {
            self.all.push_back(&mut process.allelem);
            self.ready[priority as usize].push_back(&mut process.elem);
        }
        Ok(process)
    }

    /// The scheduling decision: requeue `current` according to its
    /// state, then dispatch the highest-priority ready process, falling
    /// back to idle.
    pub fn next(&mut self, current: *mut Process) -> *mut Process {
        unsafe {
            if current != self.idle {
                let current = &mut *current;
                match current.state {
                    ProcessState::Running => return current,
                    ProcessState::Ready => {
                        // TODO: requeue on current.priority once the
                        // driver/server queues gain real users
                        self.ready[Priority::User as usize].push_back(&mut current.elem);
                    }
                    ProcessState::Blocked => self.blocked.push_back(&mut current.elem),
                    ProcessState::Dying => {
                        // drops out of scheduling entirely; its pages and
                        // record slot are not reclaimed
                        list::remove(&mut current.allelem);
                    }
                }
            } else {
                (*self.idle).state = ProcessState::Ready;
            }

            for queue in self.ready.iter_mut() {
                if let Some(elem) = queue.pop_front() {
                    let process = owner_of!(elem, Process, elem);
                    (*process).state = ProcessState::Running;
                    self.running = process;
                    return process;
                }
            }
            (*self.idle).state = ProcessState::Running;
            self.running = self.idle;
            self.idle
        }
    }

    /// Moves a blocked process back to the ready side. It becomes
    /// `Ready` now and `Running` when `next` eventually picks it.
    pub fn unblock(&mut self, process: *mut Process) {
        unsafe {
            assert_eq!(
                (*process).state,
                ProcessState::Blocked,
                "unblocking a process that is not blocked"
            );
            list::remove(&mut (*process).elem);
            (*process).state = ProcessState::Ready;
            self.ready[Priority::User as usize].push_back(&mut (*process).elem);
        }
    }

    /// Finds a process on the blocked list by id and unblocks it.
    pub fn unblock_by_id(&mut self, id: u16) -> bool {
        let mut elem = self.blocked.begin();
        while !self.blocked.at_end(elem) {
            let process = owner_of!(elem, Process, elem);
            unsafe {
                if (*process).id == id {
                    self.unblock(process);
                    return true;
                }
                elem = (*elem).next();
            }
        }
        false
    }

    /// Number of live processes, idle included.
    pub fn live_count(&self) -> usize {
        let mut count = 0;
        let mut elem = self.all.begin();
        while !self.all.at_end(elem) {
            count += 1;
            elem = unsafe { (*elem).next() };
        }
        count
    }
}
