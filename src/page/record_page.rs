//! Slotted record page layout (spec §3, §4.3, §6): a small fixed header,
//! a one-bit-per-slot occupancy bitmap, then `record_capacity` fixed-size
//! slots. Layout constants are carried over arithmetically unchanged from
//! the original `record_manager.cpp` free functions.

use super::{Page, PAGE_BODY_SIZE};

const RECORD_COUNT_OFFSET: usize = 0;
const RECORD_CAPACITY_OFFSET: usize = 4;
const RECORD_SIZE_UNALIGNED_OFFSET: usize = 8;
const RECORD_SIZE_ALIGNED_OFFSET: usize = 12;
const FIRST_RECORD_OFFSET_OFFSET: usize = 16;

/// Size in bytes of the five `u32` header fields that precede the bitmap.
pub const HEADER_SIZE: usize = 20;

/// Round `n` up to the next multiple of 8.
pub const fn align8(n: usize) -> usize {
    (n + 7) & !7
}

/// Number of fixed-size slots that fit in a record page body once the
/// header and a 1-bit-per-slot bitmap are accounted for.
///
/// `record_capacity = floor((PAGE_SIZE - header_size - 1) / (record_aligned
/// + 1/8))`; the `+1/8` folds the bitmap's per-slot bit cost into the
/// per-slot byte cost. Scaling both sides by 8 keeps the arithmetic in
/// integers: `capacity = floor(8*(body - header - 1) / (8*aligned + 1))`.
pub const fn page_record_capacity(record_size_aligned: usize) -> usize {
    let body = PAGE_BODY_SIZE - HEADER_SIZE - 1;
    (8 * body) / (8 * record_size_aligned + 1)
}

/// Bytes needed for a 1-bit-per-slot occupancy bitmap over `capacity` slots.
pub const fn page_bitmap_size(capacity: usize) -> usize {
    (capacity + 7) / 8
}

/// Total header size including the occupancy bitmap, 8-byte aligned —
/// this is where the first record slot begins.
pub const fn page_header_size(capacity: usize) -> usize {
    align8(HEADER_SIZE + page_bitmap_size(capacity))
}

/// A typed view over a page known to hold record-page contents.
pub struct RecordPageView<'a> {
    page: &'a mut Page,
}

impl<'a> RecordPageView<'a> {
    pub fn new(page: &'a mut Page) -> Self {
        Self { page }
    }

    /// Stamp a freshly allocated page as an empty record page sized for
    /// `record_size_unaligned`-byte records (the hidden `__trx` field's 4
    /// bytes plus every declared user field, per spec §6).
    pub fn init(&mut self, record_size_unaligned: usize) {
        let aligned = align8(record_size_unaligned);
        let capacity = page_record_capacity(aligned);
        let first_offset = page_header_size(capacity);
        self.set_record_count(0);
        self.set_record_capacity(capacity as u32);
        self.page
            .write_u32(RECORD_SIZE_UNALIGNED_OFFSET, record_size_unaligned as u32);
        self.page.write_u32(RECORD_SIZE_ALIGNED_OFFSET, aligned as u32);
        self.set_first_record_offset(first_offset as u32);
        let bitmap_bytes = page_bitmap_size(capacity);
        for byte in self.page.as_bytes_mut()[HEADER_SIZE..HEADER_SIZE + bitmap_bytes].iter_mut() {
            *byte = 0;
        }
    }

    pub fn record_count(&self) -> u32 {
        self.page.read_u32(RECORD_COUNT_OFFSET)
    }

    pub fn set_record_count(&mut self, n: u32) {
        self.page.write_u32(RECORD_COUNT_OFFSET, n);
    }

    pub fn record_capacity(&self) -> u32 {
        self.page.read_u32(RECORD_CAPACITY_OFFSET)
    }

    fn set_record_capacity(&mut self, n: u32) {
        self.page.write_u32(RECORD_CAPACITY_OFFSET, n);
    }

    pub fn record_size_aligned(&self) -> u32 {
        self.page.read_u32(RECORD_SIZE_ALIGNED_OFFSET)
    }

    /// The declared (pre-padding) record width — what callers actually
    /// insert/update/read; `slot_bytes` spans the wider 8-byte-aligned slot.
    pub fn record_size_unaligned(&self) -> u32 {
        self.page.read_u32(RECORD_SIZE_UNALIGNED_OFFSET)
    }

    pub fn first_record_offset(&self) -> u32 {
        self.page.read_u32(FIRST_RECORD_OFFSET_OFFSET)
    }

    fn set_first_record_offset(&mut self, n: u32) {
        self.page.write_u32(FIRST_RECORD_OFFSET_OFFSET, n);
    }

    pub fn is_full(&self) -> bool {
        self.record_count() == self.record_capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.record_count() == 0
    }

    fn bitmap_byte_and_bit(&self, slot: u32) -> (usize, u32) {
        (HEADER_SIZE + (slot as usize) / 8, slot % 8)
    }

    pub fn is_slot_occupied(&self, slot: u32) -> bool {
        let (byte, bit) = self.bitmap_byte_and_bit(slot);
        self.page.read_bytes(byte, byte + 1)[0] & (1 << bit) != 0
    }

    fn set_slot_occupied(&mut self, slot: u32, occupied: bool) {
        let (byte, bit) = self.bitmap_byte_and_bit(slot);
        let mut b = self.page.read_bytes(byte, byte + 1)[0];
        if occupied {
            b |= 1 << bit;
        } else {
            b &= !(1 << bit);
        }
        self.page.write_bytes(byte, &[b]);
    }

    /// First slot index whose bitmap bit is clear, or `None` if the page
    /// is full.
    pub fn first_free_slot(&self) -> Option<u32> {
        let capacity = self.record_capacity();
        (0..capacity).find(|&slot| !self.is_slot_occupied(slot))
    }

    fn slot_range(&self, slot: u32) -> (usize, usize) {
        let start = self.first_record_offset() as usize + slot as usize * self.record_size_aligned() as usize;
        let end = start + self.record_size_aligned() as usize;
        (start, end)
    }

    pub fn slot_bytes(&self, slot: u32) -> &[u8] {
        let (start, end) = self.slot_range(slot);
        self.page.read_bytes(start, end)
    }

    /// Insert `data` into the first free slot; caller must have already
    /// confirmed `!is_full()`.
    pub fn insert(&mut self, data: &[u8]) -> u32 {
        let slot = self.first_free_slot().expect("record page is full");
        let (start, _) = self.slot_range(slot);
        self.page.write_bytes(start, data);
        self.set_slot_occupied(slot, true);
        self.set_record_count(self.record_count() + 1);
        slot
    }

    pub fn update(&mut self, slot: u32, data: &[u8]) {
        let (start, _) = self.slot_range(slot);
        self.page.write_bytes(start, data);
    }

    /// Clear the slot's occupancy bit and decrement the live count;
    /// returns `true` if the page is now empty (caller should dispose it).
    pub fn delete(&mut self, slot: u32) -> bool {
        self.set_slot_occupied(slot, false);
        self.set_record_count(self.record_count() - 1);
        self.record_count() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_computes_consistent_layout() {
        let mut page = Page::new();
        let mut view = RecordPageView::new(&mut page);
        view.init(104);
        assert_eq!(view.record_count(), 0);
        assert!(view.record_capacity() > 0);
        assert_eq!(view.record_size_aligned(), 104);
        assert!(view.first_record_offset() as usize >= HEADER_SIZE);
    }

    #[test]
    fn insert_update_delete_round_trip() {
        let mut page = Page::new();
        let mut view = RecordPageView::new(&mut page);
        view.init(16);
        let data = [7u8; 16];
        let slot = view.insert(&data);
        assert!(view.is_slot_occupied(slot));
        assert_eq!(view.slot_bytes(slot), &data[..]);

        let updated = [9u8; 16];
        view.update(slot, &updated);
        assert_eq!(view.slot_bytes(slot), &updated[..]);

        assert!(view.delete(slot));
        assert!(!view.is_slot_occupied(slot));
        assert!(view.is_empty());
    }

    #[test]
    fn fills_to_capacity_then_reports_full() {
        let mut page = Page::new();
        let mut view = RecordPageView::new(&mut page);
        view.init(100);
        let capacity = view.record_capacity();
        let data = [0u8; 100];
        for _ in 0..capacity {
            view.insert(&data);
        }
        assert!(view.is_full());
        assert_eq!(view.first_free_slot(), None);
    }
}
