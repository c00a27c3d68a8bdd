//! Access to the mstatus csr, RISC-V Privileged Architecture v1.12 subset.

use core::arch::asm;
use num_enum::{FromPrimitive, IntoPrimitive};
use paste::paste;

macro_rules! bool_access {
    ($field_name:ident, $desc:literal, $mask:ident) => {
        paste! {
            #[doc="Get the \"" $desc "\" field from the mstatus register"]
            #[inline]
            pub fn [< get_ $field_name >](&self) -> bool {
                let tmp: usize;
                unsafe { asm!("csrr {tmp}, mstatus", tmp = out(reg) tmp); }
                (tmp & mask::$mask) != 0
            }

            #[doc="Set the \"" $desc "\" field in the mstatus register"]
            #[inline]
            pub fn [< set_ $field_name >](&self, value: bool) {
                if value {
                    unsafe { asm!("csrs mstatus, {tmp}", tmp = in(reg) mask::$mask); }
                } else {
                    unsafe { asm!("csrc mstatus, {tmp}", tmp = in(reg) mask::$mask); }
                }
            }
        }
    };
}

macro_rules! enum_access {
    ($field_name:ident, $desc:literal, $enum_name:ident, $mask_offset:ident) => {
        paste! {
            #[doc="Get the \"" $desc "\" field from the mstatus register"]
            #[inline]
            pub fn [< get_ $field_name >](&self) -> $enum_name {
                let tmp: usize;
                unsafe { asm!("csrr {tmp}, mstatus", tmp = out(reg) tmp); }
                let tmp: usize = (tmp & mask::$mask_offset.0) >> mask::$mask_offset.1;
                <$enum_name as From<u8>>::from(tmp as u8)
            }
            #[doc="Set the \"" $desc "\" field in the mstatus register, first clearing that field."]
            #[inline]
            pub fn [< set_ $field_name >](&self, value: $enum_name) {
                let tmp = (<$enum_name as Into<u8>>::into(value) as usize) << mask::$mask_offset.1;
                let mask = mask::$mask_offset.0;
                unsafe { asm!("csrc mstatus, {mask}", "csrs mstatus, {tmp}", mask = in(reg) mask, tmp = in(reg) tmp); }
            }
        }
    };
}

/// ZST for accessing the mstatus register
#[derive(Clone, Copy)]
pub struct MStatus {}

impl MStatus {
    bool_access!(mie, "machine interrupts enabled", MIE);
    bool_access!(mpie, "machine interrupts enabled previously", MPIE);
    enum_access!(mpp, "machine previous privilege", PrivilegeMode, MPP);
}

/// The privilege mode `mret` will drop to.
#[derive(Debug, Eq, PartialEq, FromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum PrivilegeMode {
    #[num_enum(default)]
    User = 0,
    Supervisor = 1,
    Machine = 3,
}

mod mask {
    //! masks for the mstatus fields used by this kernel

    pub const MIE: usize = 1 << 3;
    pub const MPIE: usize = 1 << 7;
    pub const MPP: (usize, usize) = (0b11 << 11, 11);
}
