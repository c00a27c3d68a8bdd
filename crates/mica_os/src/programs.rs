//! User programs embedded in the kernel image.
//!
//! Statically linked RV32 ELF executables, generated by
//! `tools/mkprograms.py`. By convention they expect the UART data
//! register mapped read-write at virtual address 0x5000.

/// Parks the hart in a wfi loop. Loaded by the scheduler at init and
/// dispatched whenever every ready queue is empty.
pub static IDLE: &[u8] = include_bytes!("programs/idle.elf");

/// Prints "Hello there\r\n", then jumps to address zero; the resulting
/// fault is outside the stack-growth policy and kills the process.
pub static HELLO: &[u8] = include_bytes!("programs/hello.elf");

/// Computes fib(40) iteratively and prints "Fib(40) = 102334155\r\n".
/// Its digit buffer lives on the user stack, so the first store
/// demand-grows a stack page.
pub static FIBONACCI: &[u8] = include_bytes!("programs/fibonacci.elf");
