//! NS16550-compatible UART driver.

pub const UART_BASE_ADDRESS: usize = 0x1000_0000;
pub const UART_SIZE: usize = 0x100;
pub const UART_END_ADDRESS: usize = UART_BASE_ADDRESS + UART_SIZE;

use core::{
    fmt::{Error, Write},
    ops::{Deref, DerefMut},
};

// register offsets from the base address
const RBR_THR: usize = 0; // receive buffer / transmit holding
const IER: usize = 1; // interrupt enable
const FCR: usize = 2; // fifo control
const LCR: usize = 3; // line control
const LSR: usize = 5; // line status

const LSR_RX_READY: u8 = 1 << 0;
const LSR_TX_EMPTY: u8 = 1 << 5;

/// The board's UART, fixed at its `virt` address.
pub struct Uart0(pub(crate) Uart<UART_BASE_ADDRESS>);

impl Uart0 {
    /// Safety: aliases the device; the caller keeps instances from racing.
    pub const unsafe fn new() -> Self {
        Uart0(Uart::new())
    }
}

impl Write for Uart0 {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        <Uart<UART_BASE_ADDRESS> as Write>::write_str(&mut self.0, s)
    }
}

impl Deref for Uart0 {
    type Target = Uart<UART_BASE_ADDRESS>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for Uart0 {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

/// ZST for direct access to an NS16550 at base address B.
pub struct Uart<const B: usize> {}

impl<const B: usize> Uart<B> {
    /// Safety: the user is expected to ensure only one instance exists
    /// per base address.
    pub const unsafe fn new() -> Self {
        Uart {}
    }

    fn reg(&self, offset: usize) -> *mut u8 {
        (B + offset) as *mut u8
    }

    /// Blocks until the transmit holding register drains, then sends.
    pub fn put(&mut self, c: u8) {
        unsafe {
            while self.reg(LSR).read_volatile() & LSR_TX_EMPTY == 0 {}
            self.reg(RBR_THR).write_volatile(c);
        }
    }

    pub fn get(&mut self) -> Option<u8> {
        unsafe {
            if self.reg(LSR).read_volatile() & LSR_RX_READY == 0 {
                None
            } else {
                Some(self.reg(RBR_THR).read_volatile())
            }
        }
    }

    pub fn init(&mut self) {
        unsafe {
            // 8-bit words
            self.reg(LCR).write_volatile(0b11);
            // enable fifos
            self.reg(FCR).write_volatile(1);
            // no interrupts; the kernel polls
            self.reg(IER).write_volatile(0);
        }
    }
}

impl<const B: usize> Write for Uart<B> {
    fn write_str(&mut self, s: &str) -> Result<(), Error> {
        for c in s.bytes() {
            self.put(c);
        }
        Ok(())
    }
}
