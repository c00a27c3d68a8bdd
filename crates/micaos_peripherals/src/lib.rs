#![no_std]

//! Writer-argument console macros.
//!
//! Every macro takes the output `core::fmt::Write` target as its first
//! argument, so the same code can log to the hardware UART, a test
//! string, or a `Debug` formatter.

pub mod macros;
