//! Machine trap vector setup.

/// Low-bit encoding for a single shared trap entry point.
pub const MODE_DIRECT: usize = 0b00;

/// Installs the machine trap vector in DIRECT mode.
///
/// # Safety
/// `address` must be the 4-byte-aligned entry of a trap stub that obeys
/// the machine trap ABI; every future trap will jump there.
#[cfg(target_arch = "riscv32")]
#[inline]
pub unsafe fn install(address: usize) {
    assert!(address & 0b11 == 0, "trap vector must be 4-byte aligned");
    core::arch::asm!("csrw mtvec, {tmp}", tmp = in(reg) address | MODE_DIRECT);
}

/// Reads back the current mtvec value.
#[cfg(target_arch = "riscv32")]
#[inline]
pub fn read() -> usize {
    let out: usize;
    unsafe { core::arch::asm!("csrr {tmp}, mtvec", tmp = out(reg) out) };
    out
}
