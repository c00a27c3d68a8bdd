//! Loader for statically linked RV32 ELF executables.
//!
//! Images are embedded in the kernel, validated, and copied one
//! page-sized chunk at a time into a fresh address space. BSS tails
//! (`p_memsz` beyond `p_filesz`) are left unmapped; demand growth is the
//! user stack's story, not the loader's.

use micaos_allocator::OutOfMemory;
use micaos_riscv::mmu::{PageTable, PteFlags, VirtAddr, PAGE_SIZE};
use zerocopy::{FromBytes, Immutable, KnownLayout};

use crate::paging::{self, KernelAllocator};

const ELF_MAGIC: [u8; 4] = [0x7f, b'E', b'L', b'F'];
const CLASS_ELF32: u8 = 1;
const DATA_LITTLE_ENDIAN: u8 = 1;
const IDENT_VERSION_CURRENT: u8 = 1;
const TYPE_EXECUTABLE: u16 = 2;
const MACHINE_RISCV: u16 = 0x00f3;
const VERSION_CURRENT: u32 = 1;

const PT_LOAD: u32 = 1;
const PF_X: u32 = 1 << 0;
const PF_W: u32 = 1 << 1;
const PF_R: u32 = 1 << 2;

#[derive(FromBytes, KnownLayout, Immutable)]
#[repr(C)]
struct ElfHeader {
    magic: [u8; 4],
    class: u8,
    data: u8,
    ident_version: u8,
    osabi: u8,
    abi_version: u8,
    pad: [u8; 7],
    e_type: u16,
    machine: u16,
    version: u32,
    entry: u32,
    phoff: u32,
    shoff: u32,
    flags: u32,
    ehsize: u16,
    phentsize: u16,
    phnum: u16,
    shentsize: u16,
    shnum: u16,
    shstrndx: u16,
}

#[derive(FromBytes, KnownLayout, Immutable)]
#[repr(C)]
struct ProgramHeader {
    p_type: u32,
    p_offset: u32,
    p_vaddr: u32,
    p_paddr: u32,
    p_filesz: u32,
    p_memsz: u32,
    p_flags: u32,
    p_align: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElfError {
    /// The image does not begin with `\x7fELF`.
    InvalidMagic,
    /// Well-formed ELF, but not a static RV32 little-endian executable.
    UnsupportedBinary,
    /// A program header or segment reaches outside the image.
    SegmentOffsetOutsideBinary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadError {
    Format(ElfError),
    OutOfMemory,
}

impl From<ElfError> for LoadError {
    fn from(e: ElfError) -> LoadError {
        LoadError::Format(e)
    }
}

impl From<OutOfMemory> for LoadError {
    fn from(_: OutOfMemory) -> LoadError {
        LoadError::OutOfMemory
    }
}

fn parse_header(binary: &[u8]) -> Result<ElfHeader, ElfError> {
    if binary.len() < 4 || binary[..4] != ELF_MAGIC {
        return Err(ElfError::InvalidMagic);
    }
    let (header, _) =
        ElfHeader::read_from_prefix(binary).map_err(|_| ElfError::UnsupportedBinary)?;
    let supported = header.class == CLASS_ELF32
        && header.data == DATA_LITTLE_ENDIAN
        && header.ident_version == IDENT_VERSION_CURRENT
        && header.machine == MACHINE_RISCV
        && header.version == VERSION_CURRENT
        && header.e_type == TYPE_EXECUTABLE;
    if !supported {
        return Err(ElfError::UnsupportedBinary);
    }
    if (header.phentsize as usize) < core::mem::size_of::<ProgramHeader>() {
        return Err(ElfError::UnsupportedBinary);
    }
    Ok(header)
}

/// Copies `data` into the target address space starting at `vaddr`,
/// splitting at every page boundary so each copy lands in one freshly
/// mapped physical page.
fn place_segment(
    root: &mut PageTable,
    allocator: &mut KernelAllocator,
    vaddr: u32,
    data: &[u8],
    flags: PteFlags,
) -> Result<(), LoadError> {
    let mut copied = 0usize;
    while copied < data.len() {
        let va = vaddr
            .checked_add(copied as u32)
            .ok_or(ElfError::UnsupportedBinary)?;
        let until_boundary = PAGE_SIZE - (va as usize & (PAGE_SIZE - 1));
        let chunk = until_boundary.min(data.len() - copied);
        let phys = paging::create_page(root, allocator, VirtAddr::new(va), flags)?;
        unsafe {
            core::ptr::copy_nonoverlapping(data.as_ptr().add(copied), phys.as_mut_ptr(), chunk);
        }
        copied += chunk;
    }
    Ok(())
}

/// Installs every LOAD segment of `binary` into `root` and returns the
/// entry-point virtual address.
pub fn load(
    root: &mut PageTable,
    allocator: &mut KernelAllocator,
    binary: &[u8],
) -> Result<u32, LoadError> {
    let header = parse_header(binary)?;

    for i in 0..header.phnum as usize {
        let offset = i
            .checked_mul(header.phentsize as usize)
            .and_then(|o| o.checked_add(header.phoff as usize))
            .ok_or(ElfError::SegmentOffsetOutsideBinary)?;
        let bytes = binary
            .get(offset..)
            .ok_or(ElfError::SegmentOffsetOutsideBinary)?;
        let (ph, _) = ProgramHeader::read_from_prefix(bytes)
            .map_err(|_| ElfError::SegmentOffsetOutsideBinary)?;
        if ph.p_type != PT_LOAD {
            continue;
        }
        if ph.p_flags & (PF_R | PF_W | PF_X) == 0 {
            // the hardware rejects permissionless leaves; nothing to map
            continue;
        }
        if ph.p_filesz == 0 {
            continue;
        }

        let mut flags = PteFlags::USER;
        if ph.p_flags & PF_R != 0 {
            flags = flags | PteFlags::READ;
        }
        if ph.p_flags & PF_W != 0 {
            // a writable-but-unreadable page is a reserved encoding;
            // widening to readable is permitted
            flags = flags | PteFlags::READ | PteFlags::WRITE;
        }
        if ph.p_flags & PF_X != 0 {
            flags = flags | PteFlags::EXECUTE;
        }

        let end = ph
            .p_offset
            .checked_add(ph.p_filesz)
            .ok_or(ElfError::SegmentOffsetOutsideBinary)?;
        let data = binary
            .get(ph.p_offset as usize..end as usize)
            .ok_or(ElfError::SegmentOffsetOutsideBinary)?;
        place_segment(root, allocator, ph.p_vaddr, data, flags)?;
    }

    Ok(header.entry)
}
