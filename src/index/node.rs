//! Single B+ tree node operations layered over a pinned page handle,
//! mirroring [`crate::record::page_handler::RecordPageHandler`]'s split
//! between "one page" and "the whole file".

use std::cmp::Ordering;

use crate::buffer_pool::{BufferPoolManager, PageHandle};
use crate::page::btree_page::NodeView;
use crate::page::PageNum;
use crate::rid::Rid;

use super::key::{cmp_composite_key, AttrType};

pub struct NodeHandler<'a> {
    bpm: &'a BufferPoolManager,
    handle: PageHandle<'a>,
    key_length: usize,
}

impl<'a> NodeHandler<'a> {
    pub fn new(bpm: &'a BufferPoolManager, handle: PageHandle<'a>, key_length: usize) -> Self {
        Self {
            bpm,
            handle,
            key_length,
        }
    }

    pub fn handle(&self) -> &PageHandle<'a> {
        &self.handle
    }

    pub fn page_num(&self) -> PageNum {
        self.handle.page_num
    }

    fn view_mut<T>(&self, f: impl FnOnce(&mut NodeView) -> T) -> T {
        self.bpm
            .with_page_mut(&self.handle, |p| f(&mut NodeView::new(p, self.key_length)))
    }

    pub fn is_leaf(&self) -> bool {
        self.view_mut(|v| v.is_leaf())
    }

    pub fn key_count(&self) -> u32 {
        self.view_mut(|v| v.key_count())
    }

    pub fn set_key_count(&self, n: u32) {
        self.view_mut(|v| v.set_key_count(n));
    }

    pub fn parent_page_num(&self) -> PageNum {
        self.view_mut(|v| v.parent_page_num())
    }

    pub fn set_parent_page_num(&self, parent: PageNum) {
        self.view_mut(|v| v.set_parent_page_num(parent));
    }

    pub fn init_leaf(&self) {
        self.view_mut(|v| v.init_leaf());
    }

    pub fn init_internal(&self) {
        self.view_mut(|v| v.init_internal());
    }

    pub fn prev_leaf(&self) -> PageNum {
        self.view_mut(|v| v.prev_leaf_page())
    }

    pub fn set_prev_leaf(&self, page_num: PageNum) {
        self.view_mut(|v| v.set_prev_leaf_page(page_num));
    }

    pub fn next_leaf(&self) -> PageNum {
        self.view_mut(|v| v.next_leaf_page())
    }

    pub fn set_next_leaf(&self, page_num: PageNum) {
        self.view_mut(|v| v.set_next_leaf_page(page_num));
    }

    pub fn leaf_key_at(&self, i: usize) -> Vec<u8> {
        self.view_mut(|v| v.leaf_key_at(i).to_vec())
    }

    pub fn leaf_rid_at(&self, i: usize) -> Rid {
        self.view_mut(|v| v.leaf_rid_at(i))
    }

    pub fn leaf_insert_at(&self, i: usize, key: &[u8], rid: Rid) {
        self.view_mut(|v| v.leaf_insert_at(i, key, rid));
    }

    pub fn leaf_remove_at(&self, i: usize) {
        self.view_mut(|v| v.leaf_remove_at(i));
    }

    pub fn internal_key_at(&self, i: usize) -> Vec<u8> {
        self.view_mut(|v| v.internal_key_at(i).to_vec())
    }

    pub fn internal_child_at(&self, i: usize) -> PageNum {
        self.view_mut(|v| v.internal_child_at(i))
    }

    pub fn internal_set_child_at(&self, i: usize, child: PageNum) {
        self.view_mut(|v| v.internal_set_child_at(i, child));
    }

    pub fn internal_insert_at(&self, i: usize, key: &[u8], child: PageNum) {
        self.view_mut(|v| v.internal_insert_at(i, key, child));
    }

    pub fn internal_remove_at(&self, i: usize) {
        self.view_mut(|v| v.internal_remove_at(i));
    }

    pub fn internal_set_key_at(&self, i: usize, key: &[u8]) {
        self.view_mut(|v| v.internal_set_key_at(i, key));
    }

    /// All `(key, rid)` entries in order, for splits/merges/redistributes.
    pub fn leaf_entries(&self) -> Vec<(Vec<u8>, Rid)> {
        let count = self.key_count() as usize;
        (0..count).map(|i| (self.leaf_key_at(i), self.leaf_rid_at(i))).collect()
    }

    /// All `(key, child)` entries in order, including the ignored
    /// sentinel at index 0.
    pub fn internal_entries(&self) -> Vec<(Vec<u8>, PageNum)> {
        let count = self.key_count() as usize;
        (0..count)
            .map(|i| (self.internal_key_at(i), self.internal_child_at(i)))
            .collect()
    }

    /// Replace this leaf's entire entry array, in order.
    pub fn rewrite_leaf_entries(&self, entries: &[(Vec<u8>, Rid)]) {
        self.set_key_count(0);
        for (i, (key, rid)) in entries.iter().enumerate() {
            self.leaf_insert_at(i, key, *rid);
        }
    }

    /// Replace this internal node's entire entry array, in order.
    pub fn rewrite_internal_entries(&self, entries: &[(Vec<u8>, PageNum)]) {
        self.set_key_count(0);
        for (i, (key, child)) in entries.iter().enumerate() {
            self.internal_insert_at(i, key, *child);
        }
    }

    /// Spec §4.4 insert step 4: binary-search insertion position; returns
    /// `(index, true)` if an identical composite key already exists there.
    pub fn leaf_find_insert_pos(&self, key: &[u8], attr_type: AttrType, attr_length: usize) -> (usize, bool) {
        let count = self.key_count() as usize;
        let mut lo = 0usize;
        let mut hi = count;
        while lo < hi {
            let mid = (lo + hi) / 2;
            let mid_key = self.leaf_key_at(mid);
            match cmp_composite_key(&mid_key, key, attr_type, attr_length) {
                Ordering::Less => lo = mid + 1,
                _ => hi = mid,
            }
        }
        let exact = lo < count && {
            let at_lo = self.leaf_key_at(lo);
            cmp_composite_key(&at_lo, key, attr_type, attr_length) == Ordering::Equal
        };
        (lo, exact)
    }

    /// Spec §4.4 `find_leaf`'s descent rule: the largest index `i` such
    /// that `cmp(keys[i], key) <= 0`, defaulting to 0 when every key
    /// exceeds the target (index 0's key is the ignored sentinel, so this
    /// always terminates in bounds for a non-empty internal node).
    pub fn internal_find_child_index(&self, key: &[u8], attr_type: AttrType, attr_length: usize) -> usize {
        let count = self.key_count() as usize;
        let mut result = 0usize;
        for i in 1..count {
            let candidate = self.internal_key_at(i);
            if cmp_composite_key(&candidate, key, attr_type, attr_length) != Ordering::Greater {
                result = i;
            } else {
                break;
            }
        }
        result
    }
}
