//! B+ tree node page layout (spec §3, §4.4, §6): a common header shared by
//! leaf and internal nodes, leaf-only sibling pointers, then a packed array
//! of `(key, payload)` entries. Entry width depends on `key_length`, which
//! is fixed per index but varies across indexes, so node capacity is
//! computed at runtime rather than compiled in.

use super::{Page, PageNum, INVALID_PAGE_NUM, PAGE_BODY_SIZE};
use crate::rid::{Rid, RID_BYTES};

const IS_LEAF_OFFSET: usize = 0;
const KEY_COUNT_OFFSET: usize = 4;
const PARENT_OFFSET: usize = 8;
/// Size of the header fields common to leaf and internal nodes.
pub const COMMON_HEADER_SIZE: usize = 12;

const PREV_LEAF_OFFSET: usize = COMMON_HEADER_SIZE;
const NEXT_LEAF_OFFSET: usize = COMMON_HEADER_SIZE + 4;
/// Size of a leaf node's header, including the sibling pointers.
pub const LEAF_HEADER_SIZE: usize = COMMON_HEADER_SIZE + 8;
/// Size of an internal node's header (no sibling pointers).
pub const INTERNAL_HEADER_SIZE: usize = COMMON_HEADER_SIZE;

/// Bytes per child pointer in an internal node's entry array.
pub const CHILD_PTR_BYTES: usize = 4;

/// Maximum entries a leaf node with the given composite key length can
/// hold (spec §4.4: `leaf_max_size` computed from `PAGE_SIZE` and
/// `key_length`).
pub const fn calc_leaf_max_size(key_length: usize) -> usize {
    (PAGE_BODY_SIZE - LEAF_HEADER_SIZE) / (key_length + RID_BYTES)
}

/// Maximum entries an internal node with the given composite key length
/// can hold.
pub const fn calc_internal_max_size(key_length: usize) -> usize {
    (PAGE_BODY_SIZE - INTERNAL_HEADER_SIZE) / (key_length + CHILD_PTR_BYTES)
}

/// `min_size = max_size - max_size/2`, per spec §4.4; applies to non-root
/// nodes only.
pub const fn min_size(max_size: usize) -> usize {
    max_size - max_size / 2
}

/// A typed view over a page known to hold a B+ tree node, parameterized by
/// the tree's composite key length (`attr_length + RID_BYTES`).
pub struct NodeView<'a> {
    page: &'a mut Page,
    key_length: usize,
}

impl<'a> NodeView<'a> {
    pub fn new(page: &'a mut Page, key_length: usize) -> Self {
        Self { page, key_length }
    }

    pub fn key_length(&self) -> usize {
        self.key_length
    }

    pub fn is_leaf(&self) -> bool {
        self.page.read_bytes(IS_LEAF_OFFSET, IS_LEAF_OFFSET + 1)[0] != 0
    }

    pub fn key_count(&self) -> u32 {
        self.page.read_u32(KEY_COUNT_OFFSET)
    }

    pub fn set_key_count(&mut self, n: u32) {
        self.page.write_u32(KEY_COUNT_OFFSET, n);
    }

    pub fn parent_page_num(&self) -> PageNum {
        self.page.read_u32(PARENT_OFFSET)
    }

    pub fn set_parent_page_num(&mut self, parent: PageNum) {
        self.page.write_u32(PARENT_OFFSET, parent);
    }

    pub fn init_leaf(&mut self) {
        self.page.write_bytes(IS_LEAF_OFFSET, &[1]);
        self.set_key_count(0);
        self.set_parent_page_num(INVALID_PAGE_NUM);
        self.set_prev_leaf_page(INVALID_PAGE_NUM);
        self.set_next_leaf_page(INVALID_PAGE_NUM);
    }

    pub fn init_internal(&mut self) {
        self.page.write_bytes(IS_LEAF_OFFSET, &[0]);
        self.set_key_count(0);
        self.set_parent_page_num(INVALID_PAGE_NUM);
    }

    pub fn prev_leaf_page(&self) -> PageNum {
        self.page.read_u32(PREV_LEAF_OFFSET)
    }

    pub fn set_prev_leaf_page(&mut self, page_num: PageNum) {
        self.page.write_u32(PREV_LEAF_OFFSET, page_num);
    }

    pub fn next_leaf_page(&self) -> PageNum {
        self.page.read_u32(NEXT_LEAF_OFFSET)
    }

    pub fn set_next_leaf_page(&mut self, page_num: PageNum) {
        self.page.write_u32(NEXT_LEAF_OFFSET, page_num);
    }

    fn entry_size_leaf(&self) -> usize {
        self.key_length + RID_BYTES
    }

    fn entry_size_internal(&self) -> usize {
        self.key_length + CHILD_PTR_BYTES
    }

    fn leaf_entry_offset(&self, index: usize) -> usize {
        LEAF_HEADER_SIZE + index * self.entry_size_leaf()
    }

    fn internal_entry_offset(&self, index: usize) -> usize {
        INTERNAL_HEADER_SIZE + index * self.entry_size_internal()
    }

    /// Read leaf entry `index`'s composite key bytes.
    pub fn leaf_key_at(&self, index: usize) -> &[u8] {
        let off = self.leaf_entry_offset(index);
        self.page.read_bytes(off, off + self.key_length)
    }

    pub fn leaf_rid_at(&self, index: usize) -> Rid {
        let off = self.leaf_entry_offset(index) + self.key_length;
        Rid::from_bytes(self.page.read_bytes(off, off + RID_BYTES))
    }

    /// Shift entries `[index..key_count)` right by one slot and write a
    /// new entry at `index`.
    pub fn leaf_insert_at(&mut self, index: usize, key: &[u8], rid: Rid) {
        let count = self.key_count() as usize;
        let entry_size = self.entry_size_leaf();
        for i in (index..count).rev() {
            let (src, _) = (self.leaf_entry_offset(i), ());
            let dst = self.leaf_entry_offset(i + 1);
            let bytes = self.page.read_bytes(src, src + entry_size).to_vec();
            self.page.write_bytes(dst, &bytes);
        }
        let off = self.leaf_entry_offset(index);
        self.page.write_bytes(off, key);
        self.page.write_bytes(off + self.key_length, &rid.to_bytes());
        self.set_key_count(count as u32 + 1);
    }

    /// Shift entries `[index+1..key_count)` left by one slot, removing
    /// entry `index`.
    pub fn leaf_remove_at(&mut self, index: usize) {
        let count = self.key_count() as usize;
        let entry_size = self.entry_size_leaf();
        for i in index..count - 1 {
            let src = self.leaf_entry_offset(i + 1);
            let dst = self.leaf_entry_offset(i);
            let bytes = self.page.read_bytes(src, src + entry_size).to_vec();
            self.page.write_bytes(dst, &bytes);
        }
        self.set_key_count(count as u32 - 1);
    }

    pub fn internal_key_at(&self, index: usize) -> &[u8] {
        let off = self.internal_entry_offset(index);
        self.page.read_bytes(off, off + self.key_length)
    }

    pub fn internal_child_at(&self, index: usize) -> PageNum {
        let off = self.internal_entry_offset(index) + self.key_length;
        u32::from_be_bytes(self.page.read_bytes(off, off + CHILD_PTR_BYTES).try_into().unwrap())
    }

    pub fn internal_set_child_at(&mut self, index: usize, child: PageNum) {
        let off = self.internal_entry_offset(index) + self.key_length;
        self.page.write_bytes(off, &child.to_be_bytes());
    }

    /// Overwrite entry `index`'s key bytes in place, leaving its child
    /// pointer and every other entry untouched. Used when redistributing
    /// one entry across a sibling boundary rewrites only the separator.
    pub fn internal_set_key_at(&mut self, index: usize, key: &[u8]) {
        let off = self.internal_entry_offset(index);
        self.page.write_bytes(off, key);
    }

    pub fn internal_insert_at(&mut self, index: usize, key: &[u8], child: PageNum) {
        let count = self.key_count() as usize;
        let entry_size = self.entry_size_internal();
        for i in (index..count).rev() {
            let src = self.internal_entry_offset(i);
            let dst = self.internal_entry_offset(i + 1);
            let bytes = self.page.read_bytes(src, src + entry_size).to_vec();
            self.page.write_bytes(dst, &bytes);
        }
        let off = self.internal_entry_offset(index);
        self.page.write_bytes(off, key);
        self.page.write_bytes(off + self.key_length, &child.to_be_bytes());
        self.set_key_count(count as u32 + 1);
    }

    pub fn internal_remove_at(&mut self, index: usize) {
        let count = self.key_count() as usize;
        let entry_size = self.entry_size_internal();
        for i in index..count - 1 {
            let src = self.internal_entry_offset(i + 1);
            let dst = self.internal_entry_offset(i);
            let bytes = self.page.read_bytes(src, src + entry_size).to_vec();
            self.page.write_bytes(dst, &bytes);
        }
        self.set_key_count(count as u32 - 1);
    }
}

const ATTR_TYPE_OFFSET: usize = 0;
const ATTR_LENGTH_OFFSET: usize = 4;
const KEY_LENGTH_OFFSET: usize = 8;
const INTERNAL_MAX_SIZE_OFFSET: usize = 12;
const LEAF_MAX_SIZE_OFFSET: usize = 16;
const ROOT_PAGE_NUM_OFFSET: usize = 20;

/// The B+ tree's own metadata, distinct from the generic buffer-pool file
/// header that already occupies page 0 (spec §3 "Index file header"). The
/// generic header's bitmap fills the whole of page 0's body, so this view
/// is stamped onto page 1 instead, with tree nodes starting at page 2 —
/// a decision recorded in `DESIGN.md`.
pub struct IndexMetaView<'a> {
    page: &'a mut Page,
}

impl<'a> IndexMetaView<'a> {
    pub fn new(page: &'a mut Page) -> Self {
        Self { page }
    }

    pub fn init(&mut self, attr_type: u8, attr_length: u32, internal_max_size: u32, leaf_max_size: u32) {
        self.page.write_bytes(ATTR_TYPE_OFFSET, &[attr_type]);
        self.page.write_u32(ATTR_LENGTH_OFFSET, attr_length);
        self.page
            .write_u32(KEY_LENGTH_OFFSET, attr_length + RID_BYTES as u32);
        self.page.write_u32(INTERNAL_MAX_SIZE_OFFSET, internal_max_size);
        self.page.write_u32(LEAF_MAX_SIZE_OFFSET, leaf_max_size);
        self.set_root_page_num(INVALID_PAGE_NUM);
    }

    pub fn attr_type(&self) -> u8 {
        self.page.read_bytes(ATTR_TYPE_OFFSET, ATTR_TYPE_OFFSET + 1)[0]
    }

    pub fn attr_length(&self) -> u32 {
        self.page.read_u32(ATTR_LENGTH_OFFSET)
    }

    pub fn key_length(&self) -> u32 {
        self.page.read_u32(KEY_LENGTH_OFFSET)
    }

    pub fn internal_max_size(&self) -> u32 {
        self.page.read_u32(INTERNAL_MAX_SIZE_OFFSET)
    }

    pub fn leaf_max_size(&self) -> u32 {
        self.page.read_u32(LEAF_MAX_SIZE_OFFSET)
    }

    pub fn root_page_num(&self) -> PageNum {
        self.page.read_u32(ROOT_PAGE_NUM_OFFSET)
    }

    pub fn set_root_page_num(&mut self, page_num: PageNum) {
        self.page.write_u32(ROOT_PAGE_NUM_OFFSET, page_num);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rid(n: u32) -> Rid {
        Rid::new(n, 0)
    }

    #[test]
    fn leaf_insert_keeps_ascending_order() {
        let mut page = Page::new();
        let mut view = NodeView::new(&mut page, 4 + RID_BYTES);
        view.init_leaf();
        view.leaf_insert_at(0, &5u32.to_be_bytes(), rid(5));
        view.leaf_insert_at(0, &3u32.to_be_bytes(), rid(3));
        view.leaf_insert_at(2, &9u32.to_be_bytes(), rid(9));
        assert_eq!(view.key_count(), 3);
        assert_eq!(view.leaf_key_at(0), &3u32.to_be_bytes());
        assert_eq!(view.leaf_key_at(1), &5u32.to_be_bytes());
        assert_eq!(view.leaf_key_at(2), &9u32.to_be_bytes());
        assert_eq!(view.leaf_rid_at(1), rid(5));
    }

    #[test]
    fn leaf_remove_shifts_tail_left() {
        let mut page = Page::new();
        let mut view = NodeView::new(&mut page, 4 + RID_BYTES);
        view.init_leaf();
        view.leaf_insert_at(0, &1u32.to_be_bytes(), rid(1));
        view.leaf_insert_at(1, &2u32.to_be_bytes(), rid(2));
        view.leaf_insert_at(2, &3u32.to_be_bytes(), rid(3));
        view.leaf_remove_at(1);
        assert_eq!(view.key_count(), 2);
        assert_eq!(view.leaf_key_at(0), &1u32.to_be_bytes());
        assert_eq!(view.leaf_key_at(1), &3u32.to_be_bytes());
    }

    #[test]
    fn internal_entries_round_trip_children() {
        let mut page = Page::new();
        let mut view = NodeView::new(&mut page, 4 + RID_BYTES);
        view.init_internal();
        view.internal_insert_at(0, &[0u8; 12], 10);
        view.internal_insert_at(1, &7u32.to_be_bytes(), 20);
        assert_eq!(view.internal_child_at(0), 10);
        assert_eq!(view.internal_child_at(1), 20);
        assert_eq!(view.internal_key_at(1)[8..12], 7u32.to_be_bytes());
    }

    #[test]
    fn capacity_formulas_are_positive_for_small_keys() {
        assert!(calc_leaf_max_size(12) > 0);
        assert!(calc_internal_max_size(12) > 0);
        assert!(min_size(calc_leaf_max_size(12)) <= calc_leaf_max_size(12));
    }
}
