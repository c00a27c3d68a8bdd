//! The trap core: handler registry, dispatch, and the Rust halves of the
//! machine-mode stub in `assembly/trap.s`.

use micaos_riscv::cpu::registers::mcause::{TrapKind, TRAP_KIND_LIMIT};

use crate::kernel::Kernel;
use crate::process::{Process, ProcessState};

/// Seconds between timer preemptions.
pub const TICK_SECONDS: u64 = 1;

/// A kernel-level trap handler. Runs on the interrupted process's kernel
/// stack with interrupts masked; may mutate the process's state,
/// registers, or address space.
pub type TrapHandler = fn(&mut Kernel, &mut Process);

/// A handler is already installed for that trap kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandlerInstalled(pub TrapKind);

pub struct HandlerTable {
    handlers: [Option<TrapHandler>; TRAP_KIND_LIMIT],
}

impl HandlerTable {
    pub const fn new() -> HandlerTable {
        HandlerTable {
            handlers: [None; TRAP_KIND_LIMIT],
        }
    }

    /// Installs `handler` for `kind`; one handler per kind.
    pub fn register(
        &mut self,
        kind: TrapKind,
        handler: TrapHandler,
    ) -> Result<(), HandlerInstalled> {
        let slot = &mut self.handlers[kind.index()];
        if slot.is_some() {
            return Err(HandlerInstalled(kind));
        }
        *slot = Some(handler);
        Ok(())
    }

    pub fn get(&self, kind: TrapKind) -> Option<TrapHandler> {
        self.handlers[kind.index()]
    }
}

/// The kernel half of every trap: find the handler, run it, and make the
/// scheduling decision. Returns the process to resume.
pub fn dispatch(kernel: &mut Kernel, kind: TrapKind, running: *mut Process) -> *mut Process {
    let handler = kernel
        .handlers
        .get(kind)
        .unwrap_or_else(|| panic!("no handler registered for {:?}", kind));
    handler(kernel, unsafe { &mut *running });
    kernel.scheduler.next(running)
}

/// Machine timer: the running process has used its slice. Mark it Ready
/// and arm the next tick; the generic scheduling step does the rest.
pub fn timer_handler(_kernel: &mut Kernel, running: &mut Process) {
    running.state = ProcessState::Ready;
    // safety: the single timer owner is this handler
    let mut clint = unsafe { micaos_virtio::clint::Clint::new() };
    let wake = clint.offset(TICK_SECONDS);
    clint.set(wake);
}

/// Landing point from the trap stub. `running` is the validated
/// `mscratch` pointer whose registers the stub has just saved.
#[cfg(target_arch = "riscv32")]
#[no_mangle]
extern "C" fn trap_handler(running: *mut Process) {
    use micaos_riscv::cpu::registers::{mcause, raw};

    let cause = mcause::read();
    let kind = TrapKind::from_mcause(cause)
        .unwrap_or_else(|| panic!("trap with unrecognized mcause {:#x}", cause));

    let mut guard = crate::kernel::KERNEL.lock();
    let kernel = guard.as_mut().expect("trap before kernel init");
    let next = dispatch(kernel, kind, running);
    unsafe {
        crate::paging::enable(&*(*next).page_table);
        raw::mscratch_write(next as usize);
    }
    // back to the stub, which restores `next` from mscratch and mrets
}

/// Called by the stub when the `mscratch` pointer fails validation:
/// outside the kernel memory window or missing the record magic. The
/// stub has already re-established the boot stack.
#[cfg(target_arch = "riscv32")]
#[no_mangle]
extern "C" fn invalid_running_process(pc: usize, bad_pointer: usize) -> ! {
    use micaos_peripherals::println;
    // safety: diagnostics on the way down
    let mut uart = unsafe { micaos_virtio::uart::Uart0::new() };
    println!(
        uart,
        "trap at pc {:#x} with corrupt process pointer {:#x}", pc, bad_pointer
    );
    panic!("mscratch does not refer to a live process");
}
