#![cfg_attr(target_arch = "riscv32", no_std)]
#![cfg_attr(target_arch = "riscv32", no_main)]

#[cfg(target_arch = "riscv32")]
mod kinit {
    use micaos_peripherals::{print, print_title, println};
    use micaos_riscv::cpu::registers::mstatus::{MStatus, PrivilegeMode};
    use micaos_riscv::cpu::registers::{mtvec, raw};
    use micaos_riscv::mmu::PteFlags;
    use micaos_virtio::clint::Clint;
    use micaos_virtio::uart::UART_BASE_ADDRESS;
    use micaos_virtio::{Peripherals, PERIPHERALS};

    use mica_os::assembly::{asm_restore_context, asm_trap_vector};
    use mica_os::kernel::Kernel;
    use mica_os::layout::LinkerLayout;
    use mica_os::paging::{self, Mapping};
    use mica_os::process::Priority;
    use mica_os::programs;
    use mica_os::trap::{self, TICK_SECONDS};
    use micaos_riscv::cpu::registers::mcause::TrapKind;

    /// First Rust code out of boot.s. `fdtb` is the device tree blob
    /// handed over by the machine; this kernel does not walk it.
    #[no_mangle]
    extern "C" fn entry(_fdtb: *const u8) -> ! {
        // safety: we only call this once
        let Peripherals { mut uart } = unsafe { PERIPHERALS.take().unwrap_unchecked() };
        uart.init();

        print_title!(uart, "mica os");
        unsafe {
            println!(
                uart,
                "vendor {:x} arch {:x}",
                raw::mvendorid(),
                raw::marchid()
            );
        }

        let layout = LinkerLayout::get();
        print!(uart, "{:?}", layout);

        unsafe { mtvec::install(asm_trap_vector as usize) };

        let mut guard = mica_os::kernel::KERNEL.lock();
        *guard = Some(unsafe {
            Kernel::new(layout.heap_start, layout.heap_start + layout.heap_size)
        });
        let kernel = guard.as_mut().unwrap();
        println!(
            uart,
            "page allocator: {} pages at {:x}",
            kernel.allocator.page_count(),
            kernel.allocator.first_page()
        );

        kernel
            .handlers
            .register(TrapKind::MachineTimerInterrupt, trap::timer_handler)
            .expect("timer handler already installed");
        for kind in [
            TrapKind::InstructionPageFault,
            TrapKind::LoadPageFault,
            TrapKind::StorePageFault,
        ] {
            kernel
                .handlers
                .register(kind, paging::page_fault_handler)
                .expect("page fault handler already installed");
        }

        kernel.init().expect("failed to load the idle process");

        // user programs talk to the UART through a window at VA 0x5000
        let uart_window = [Mapping {
            virt: 0x5000,
            phys: UART_BASE_ADDRESS as u64,
            flags: PteFlags::READ_WRITE | PteFlags::USER,
        }];
        kernel
            .create_process("hello", programs::HELLO, Priority::User, &uart_window)
            .expect("failed to create hello");
        kernel
            .create_process("fibonacci", programs::FIBONACCI, Priority::User, &uart_window)
            .expect("failed to create fibonacci");

        // pick the first process and stage the one-shot launch
        let first = kernel.scheduler.next(kernel.scheduler.idle());
        unsafe {
            println!(uart, "launching '{}'", (*first).name());
            paging::enable(&*(*first).page_table);
            raw::pmp_open_all();
            raw::mscratch_write(first as usize);
        }
        drop(guard);

        // mret drops to user mode with machine interrupts armed; MIE
        // stays clear so nothing preempts the kernel itself
        let mstatus = MStatus {};
        mstatus.set_mpp(PrivilegeMode::User);
        mstatus.set_mpie(false);
        unsafe { raw::mie_enable_mtimer() };
        let mut clint = unsafe { Clint::new() };
        let wake = clint.offset(TICK_SECONDS);
        clint.set(wake);

        // every later entry to user mode goes through the trap stub;
        // this first one borrows its restore tail
        unsafe { asm_restore_context() }
    }
}

#[cfg(not(target_arch = "riscv32"))]
fn main() {}
