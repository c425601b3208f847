//! Range-scan iterator over a B+ tree's leaf chain (spec §4.4): walks
//! leaves left to right from the leaf `open` located, filtering entries
//! against the optional lower/upper user-key bounds and stopping the first
//! time an entry is found past the upper bound.

use std::cmp::Ordering;

use crate::buffer_pool::{BufferPoolManager, FileId};
use crate::page::{PageNum, INVALID_PAGE_NUM};
use crate::rid::Rid;

use super::key::{cmp_user_key, AttrType};
use super::node::NodeHandler;

pub struct BplusTreeScanner<'a> {
    bpm: &'a BufferPoolManager,
    file: FileId,
    attr_type: AttrType,
    attr_length: usize,
    key_length: usize,
    left_key: Option<Vec<u8>>,
    left_inclusive: bool,
    right_key: Option<Vec<u8>>,
    right_inclusive: bool,
    next_leaf: PageNum,
    pending: std::vec::IntoIter<(Vec<u8>, Rid)>,
    finished: bool,
}

impl<'a> BplusTreeScanner<'a> {
    #[allow(clippy::too_many_arguments)]
    pub(super) fn new(
        bpm: &'a BufferPoolManager,
        file: FileId,
        attr_type: AttrType,
        attr_length: usize,
        key_length: usize,
        left_key: Option<Vec<u8>>,
        left_inclusive: bool,
        right_key: Option<Vec<u8>>,
        right_inclusive: bool,
        start_leaf: PageNum,
        tree_is_empty: bool,
    ) -> Self {
        Self {
            bpm,
            file,
            attr_type,
            attr_length,
            key_length,
            left_key,
            left_inclusive,
            right_key,
            right_inclusive,
            next_leaf: start_leaf,
            pending: Vec::new().into_iter(),
            finished: tree_is_empty,
        }
    }

    fn load_next_leaf(&mut self) -> bool {
        if self.next_leaf == INVALID_PAGE_NUM {
            return false;
        }
        let Ok(handle) = self.bpm.get_this_page(self.file, self.next_leaf) else {
            self.finished = true;
            return false;
        };
        let node = NodeHandler::new(self.bpm, handle, self.key_length);
        let entries = node.leaf_entries();
        self.next_leaf = node.next_leaf();
        drop(node);
        self.pending = entries.into_iter().collect::<Vec<_>>().into_iter();
        true
    }
}

impl<'a> Iterator for BplusTreeScanner<'a> {
    type Item = Rid;

    fn next(&mut self) -> Option<Rid> {
        loop {
            while let Some((key, rid)) = self.pending.next() {
                let user_key = &key[..self.attr_length];
                if let Some(left) = &self.left_key {
                    let cmp = cmp_user_key(user_key, left, self.attr_type);
                    let before = cmp == Ordering::Less || (cmp == Ordering::Equal && !self.left_inclusive);
                    if before {
                        continue;
                    }
                }
                if let Some(right) = &self.right_key {
                    let cmp = cmp_user_key(user_key, right, self.attr_type);
                    let past = cmp == Ordering::Greater || (cmp == Ordering::Equal && !self.right_inclusive);
                    if past {
                        self.finished = true;
                        return None;
                    }
                }
                return Some(rid);
            }
            if self.finished || !self.load_next_leaf() {
                return None;
            }
        }
    }
}
