use core::fmt::Debug;

use micaos_peripherals::println;

extern "C" {
    static _text_start: usize;
    static _text_end: usize;
    static _rodata_start: usize;
    static _rodata_end: usize;
    static _data_start: usize;
    static _data_end: usize;
    static _bss_start: usize;
    static _bss_end: usize;
    static _stack_start: usize;
    static _stack_end: usize;
    static _heap_start: usize;
    static _heap_size: usize;
    static _memory_end: usize;
}

/// Access to the addresses PROVIDE'd in the linker script. The linker
/// knows them and rustc does not, so they are read at runtime through
/// extern statics; this struct keeps the unsafe in one place.
pub struct LinkerLayout {
    pub text_start: usize,
    pub text_end: usize,
    pub rodata_start: usize,
    pub rodata_end: usize,
    pub data_start: usize,
    pub data_end: usize,
    pub bss_start: usize,
    pub bss_end: usize,
    pub stack_start: usize,
    pub stack_end: usize,
    pub heap_start: usize,
    pub heap_size: usize,
    pub memory_end: usize,
}

impl LinkerLayout {
    pub fn get() -> LinkerLayout {
        unsafe {
            LinkerLayout {
                text_start: &_text_start as *const _ as usize,
                text_end: &_text_end as *const _ as usize,
                rodata_start: &_rodata_start as *const _ as usize,
                rodata_end: &_rodata_end as *const _ as usize,
                data_start: &_data_start as *const _ as usize,
                data_end: &_data_end as *const _ as usize,
                bss_start: &_bss_start as *const _ as usize,
                bss_end: &_bss_end as *const _ as usize,
                stack_start: &_stack_start as *const _ as usize,
                stack_end: &_stack_end as *const _ as usize,
                heap_start: &_heap_start as *const _ as usize,
                heap_size: &_heap_size as *const _ as usize,
                memory_end: &_memory_end as *const _ as usize,
            }
        }
    }
}

impl Debug for LinkerLayout {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        println!(
            f,
            "text:\t{:x} - {:x}\t{}-bytes",
            self.text_start,
            self.text_end,
            self.text_end - self.text_start
        );
        println!(
            f,
            "rodata:\t{:x} - {:x}\t{}-bytes",
            self.rodata_start,
            self.rodata_end,
            self.rodata_end - self.rodata_start
        );
        println!(
            f,
            "data:\t{:x} - {:x}\t{}-bytes",
            self.data_start,
            self.data_end,
            self.data_end - self.data_start
        );
        println!(
            f,
            "bss:\t{:x} - {:x}\t{}-bytes",
            self.bss_start,
            self.bss_end,
            self.bss_end - self.bss_start
        );
        println!(
            f,
            "stack:\t{:x} - {:x}\t{}-bytes",
            self.stack_start,
            self.stack_end,
            self.stack_end - self.stack_start
        );
        println!(
            f,
            "heap:\t{:x} - {:x}\t{}-bytes",
            self.heap_start,
            self.heap_start + self.heap_size,
            self.heap_size
        );
        Ok(())
    }
}
