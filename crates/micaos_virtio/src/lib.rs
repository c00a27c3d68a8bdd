#![no_std]

//! Drivers for the fixed-address MMIO devices of the QEMU `virt` board.

use uart::Uart0;

pub mod clint;
pub mod syscon;
pub mod uart;

pub static mut PERIPHERALS: Option<Peripherals> = Some(Peripherals {
    uart: unsafe { Uart0::new() },
});

/// Take-once bundle of the board's byte-oriented devices.
pub struct Peripherals {
    pub uart: Uart0,
}
