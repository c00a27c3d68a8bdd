#![no_std]

//! Page-grained allocation over a fixed memory region.

#[cfg(test)]
#[macro_use]
extern crate std;

pub mod page;

pub use page::{OutOfMemory, Page, PageAllocator};
