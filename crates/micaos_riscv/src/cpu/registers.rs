pub mod mcause;
pub mod mtvec;
pub mod satp;

#[cfg(target_arch = "riscv32")]
pub mod mstatus;
#[cfg(target_arch = "riscv32")]
pub mod raw;
