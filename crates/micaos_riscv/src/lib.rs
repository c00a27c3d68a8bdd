#![no_std]

//! RV32 architecture support: CSR access and the Sv32 MMU.
//!
//! Everything that executes a `csr*` or fence instruction is gated on
//! `target_arch = "riscv32"`; the MMU layer is plain memory manipulation
//! and compiles (and unit-tests) anywhere.

#[cfg(test)]
#[macro_use]
extern crate std;

pub mod cpu;
pub mod mmu;
