/// Per-page marker byte kept at the head of the allocator's region.
///
/// Bit 0: page is taken. Bit 1: page is the tail of its allocation run,
/// so multi-page runs can be walked and released from their first page.
#[repr(transparent)]
pub struct PageMarker(u8);

const TAKEN: u8 = 1 << 0;
const TAIL: u8 = 1 << 1;

impl PageMarker {
    pub fn is_free(&self) -> bool {
        self.0 & TAKEN == 0
    }
    pub fn is_taken(&self) -> bool {
        !self.is_free()
    }
    pub fn is_tail(&self) -> bool {
        self.0 & TAIL != 0
    }
    pub fn claim(&mut self) {
        self.0 = TAKEN;
    }
    pub fn mark_tail(&mut self) {
        self.0 |= TAIL;
    }
    pub fn release(&mut self) {
        self.0 = 0;
    }
}
