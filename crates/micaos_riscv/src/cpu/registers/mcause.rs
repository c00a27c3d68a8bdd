use num_enum::{IntoPrimitive, TryFromPrimitive};

const XLEN: usize = core::mem::size_of::<usize>() * 8;

/// High bit of mcause: set for interrupts, clear for exceptions.
pub const INTERRUPT_BIT: usize = 1 << (XLEN - 1);

/// Index range of [`TrapKind`]: exceptions occupy 0..16, interrupts
/// 16..32 (interrupt cause code plus 16).
pub const TRAP_KIND_LIMIT: usize = 32;

/// Every trap this kernel can be entered for, folded into one enum.
/// Exception codes keep their architectural value; interrupt codes are
/// offset by 16 in place of the mcause interrupt bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum TrapKind {
    InstructionAddressMisaligned = 0,
    InstructionAccessFault = 1,
    IllegalInstruction = 2,
    Breakpoint = 3,
    LoadAddressMisaligned = 4,
    LoadAccessFault = 5,
    StoreAddressMisaligned = 6,
    StoreAccessFault = 7,
    EnvironmentCallFromUser = 8,
    EnvironmentCallFromSupervisor = 9,
    EnvironmentCallFromMachine = 11,
    InstructionPageFault = 12,
    LoadPageFault = 13,
    StorePageFault = 15,
    SupervisorSoftwareInterrupt = 17,
    MachineSoftwareInterrupt = 19,
    SupervisorTimerInterrupt = 21,
    MachineTimerInterrupt = 23,
    SupervisorExternalInterrupt = 25,
    MachineExternalInterrupt = 27,
}

impl TrapKind {
    /// Decodes a raw mcause value: the interrupt bit plus the low four
    /// cause bits. Reserved encodings come back as `None`.
    pub fn from_mcause(raw: usize) -> Option<TrapKind> {
        let code = raw & 0xf;
        let index = if raw & INTERRUPT_BIT != 0 { code + 16 } else { code };
        TrapKind::try_from(index as u8).ok()
    }

    /// Position in a handler table of size [`TRAP_KIND_LIMIT`].
    pub fn index(self) -> usize {
        u8::from(self) as usize
    }

    pub fn is_interrupt(self) -> bool {
        self.index() >= 16
    }
}

/// Reads the raw mcause value.
#[cfg(target_arch = "riscv32")]
#[inline]
pub fn read() -> usize {
    let out: usize;
    unsafe { core::arch::asm!("csrr {tmp}, mcause", tmp = out(reg) out) };
    out
}
