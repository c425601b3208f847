//! B+ tree index core (spec §4.4): `find_leaf`, `insert`/`insert_into_parent`,
//! `delete`/redistribute-or-coalesce, point lookup and `validate_tree`.
//! Grounded in `original_source`'s `bplus_tree_handler.cpp`, expressed over
//! this crate's [`NodeHandler`]/[`BufferPoolManager`] instead of raw frame
//! pointers.

use std::cmp::Ordering;
use std::path::Path;

use anyhow::{bail, Result};

use crate::buffer_pool::{BufferPoolManager, FileId};
use crate::error::Error;
use crate::page::btree_page::{calc_internal_max_size, calc_leaf_max_size, min_size, IndexMetaView};
use crate::page::{PageNum, INVALID_PAGE_NUM};
use crate::rid::{Rid, MAX_RID, MIN_RID};

use super::key::{cmp_user_key, compose_key, fix_char_bound, key_length, AttrType};
use super::node::NodeHandler;
use super::scanner::BplusTreeScanner;

/// Index-wide metadata page number (spec §3: distinct from the buffer
/// pool's own file header on page 0; see `IndexMetaView`'s doc comment).
const META_PAGE_NUM: PageNum = 1;

fn attr_type_to_u8(attr_type: AttrType) -> u8 {
    match attr_type {
        AttrType::Int => 0,
        AttrType::Float => 1,
        AttrType::Char => 2,
    }
}

fn u8_to_attr_type(raw: u8) -> AttrType {
    match raw {
        0 => AttrType::Int,
        1 => AttrType::Float,
        _ => AttrType::Char,
    }
}

pub struct BPlusTreeHandler<'a> {
    bpm: &'a BufferPoolManager,
    file: FileId,
    attr_type: AttrType,
    attr_length: usize,
    key_length: usize,
    leaf_max_size: usize,
    internal_max_size: usize,
}

impl<'a> BPlusTreeHandler<'a> {
    /// Spec §4.4 `create`: allocate the index metadata page and stamp it
    /// with the tree's fixed shape; the tree itself starts out empty
    /// (`root_page_num = INVALID_PAGE_NUM`).
    pub fn create(
        bpm: &'a BufferPoolManager,
        path: impl AsRef<Path>,
        attr_type: AttrType,
        attr_length: usize,
    ) -> Result<Self> {
        let file = bpm.create_file(path)?;
        let meta_handle = bpm.allocate_page(file)?;
        debug_assert_eq!(meta_handle.page_num, META_PAGE_NUM);

        let key_len = key_length(attr_length);
        let leaf_max = calc_leaf_max_size(key_len);
        let internal_max = calc_internal_max_size(key_len);
        if leaf_max < 3 || internal_max < 3 {
            bail!(Error::InvalidArgument(format!(
                "attr_length {attr_length} leaves no room for a usable B+ tree node"
            )));
        }

        bpm.with_page_mut(&meta_handle, |p| {
            IndexMetaView::new(p).init(
                attr_type_to_u8(attr_type),
                attr_length as u32,
                internal_max as u32,
                leaf_max as u32,
            )
        });
        bpm.flush_page(&meta_handle)?;
        drop(meta_handle);

        Ok(Self {
            bpm,
            file,
            attr_type,
            attr_length,
            key_length: key_len,
            leaf_max_size: leaf_max,
            internal_max_size: internal_max,
        })
    }

    /// Spec §4.4 `open`: read the tree's shape back off the metadata page.
    pub fn open(bpm: &'a BufferPoolManager, path: impl AsRef<Path>) -> Result<Self> {
        let file = bpm.open_file(path)?;
        let meta_handle = bpm.get_this_page(file, META_PAGE_NUM)?;
        let (attr_type_raw, attr_length, key_len, leaf_max, internal_max) =
            bpm.with_page_mut(&meta_handle, |p| {
                let v = IndexMetaView::new(p);
                (
                    v.attr_type(),
                    v.attr_length() as usize,
                    v.key_length() as usize,
                    v.leaf_max_size() as usize,
                    v.internal_max_size() as usize,
                )
            });
        drop(meta_handle);

        Ok(Self {
            bpm,
            file,
            attr_type: u8_to_attr_type(attr_type_raw),
            attr_length,
            key_length: key_len,
            leaf_max_size: leaf_max,
            internal_max_size: internal_max,
        })
    }

    pub fn file(&self) -> FileId {
        self.file
    }

    pub fn attr_type(&self) -> AttrType {
        self.attr_type
    }

    fn read_root(&self) -> PageNum {
        let handle = self
            .bpm
            .get_this_page(self.file, META_PAGE_NUM)
            .expect("index metadata page missing");
        self.bpm
            .with_page_mut(&handle, |p| IndexMetaView::new(p).root_page_num())
    }

    fn write_root(&self, root: PageNum) {
        let handle = self
            .bpm
            .get_this_page(self.file, META_PAGE_NUM)
            .expect("index metadata page missing");
        self.bpm
            .with_page_mut(&handle, |p| IndexMetaView::new(p).set_root_page_num(root));
        self.bpm.flush_page(&handle).expect("flush index metadata page");
    }

    fn node(&self, page_num: PageNum) -> Result<NodeHandler<'a>> {
        let handle = self.bpm.get_this_page(self.file, page_num)?;
        Ok(NodeHandler::new(self.bpm, handle, self.key_length))
    }

    fn parent_of(&self, page_num: PageNum) -> Result<PageNum> {
        let node = self.node(page_num)?;
        Ok(node.parent_page_num())
    }

    fn set_parent(&self, page_num: PageNum, parent: PageNum) -> Result<()> {
        if page_num == INVALID_PAGE_NUM {
            return Ok(());
        }
        let node = self.node(page_num)?;
        node.set_parent_page_num(parent);
        Ok(())
    }

    fn set_next_leaf_prev(&self, page_num: PageNum, prev: PageNum) -> Result<()> {
        let node = self.node(page_num)?;
        node.set_prev_leaf(prev);
        Ok(())
    }

    /// Spec §4.4 `find_leaf`: descend from the root following
    /// `internal_find_child_index` until a leaf is reached. Returns the
    /// leaf pinned; the returned handle releases its pin when dropped.
    fn find_leaf(&self, key: &[u8]) -> Result<NodeHandler<'a>> {
        let root = self.read_root();
        if root == INVALID_PAGE_NUM {
            bail!(Error::Empty);
        }
        let mut page_num = root;
        loop {
            let node = self.node(page_num)?;
            if node.is_leaf() {
                return Ok(node);
            }
            let idx = node.internal_find_child_index(key, self.attr_type, self.attr_length);
            page_num = node.internal_child_at(idx);
        }
    }

    fn leftmost_leaf(&self, root: PageNum) -> Result<PageNum> {
        let mut page_num = root;
        loop {
            let node = self.node(page_num)?;
            if node.is_leaf() {
                return Ok(page_num);
            }
            page_num = node.internal_child_at(0);
        }
    }

    fn child_index(&self, parent: &NodeHandler, child_page: PageNum) -> usize {
        let count = parent.key_count() as usize;
        (0..count)
            .find(|&i| parent.internal_child_at(i) == child_page)
            .expect("child page not present in its own parent")
    }

    /// Spec §4.4 `insert` steps 1-6: compose the key, handle the
    /// empty-tree case, otherwise find the target leaf, insert (splitting
    /// and propagating upward if the leaf is full).
    pub fn insert(&self, user_key: &[u8], rid: Rid) -> Result<()> {
        let key = compose_key(user_key, rid);
        let root = self.read_root();

        if root == INVALID_PAGE_NUM {
            let leaf_handle = self.bpm.allocate_page(self.file)?;
            let leaf = NodeHandler::new(self.bpm, leaf_handle, self.key_length);
            leaf.init_leaf();
            leaf.leaf_insert_at(0, &key, rid);
            self.write_root(leaf.page_num());
            return Ok(());
        }

        let leaf = self.find_leaf(&key)?;
        let (pos, exact) = leaf.leaf_find_insert_pos(&key, self.attr_type, self.attr_length);
        if exact {
            bail!(Error::DuplicateKey);
        }

        if (leaf.key_count() as usize) < self.leaf_max_size {
            leaf.leaf_insert_at(pos, &key, rid);
            return Ok(());
        }

        // Leaf is full: split into two, in ascending key order.
        let mut entries = leaf.leaf_entries();
        entries.insert(pos, (key, rid));
        let mid = entries.len() / 2;
        let right_entries = entries.split_off(mid);
        let left_entries = entries;

        let right_handle = self.bpm.allocate_page(self.file)?;
        let right = NodeHandler::new(self.bpm, right_handle, self.key_length);
        right.init_leaf();
        right.rewrite_leaf_entries(&right_entries);
        right.set_parent_page_num(leaf.parent_page_num());

        leaf.rewrite_leaf_entries(&left_entries);

        let old_next = leaf.next_leaf();
        right.set_prev_leaf(leaf.page_num());
        right.set_next_leaf(old_next);
        leaf.set_next_leaf(right.page_num());
        if old_next != INVALID_PAGE_NUM {
            self.set_next_leaf_prev(old_next, right.page_num())?;
        }

        let sep_key = right_entries[0].0.clone();
        let left_page = leaf.page_num();
        let right_page = right.page_num();
        drop(leaf);
        drop(right);

        self.insert_into_parent(left_page, &sep_key, right_page)
    }

    /// Spec §4.4 `insert_into_parent`: attach `right_page` to `left_page`'s
    /// parent under separator `sep_key`, splitting the parent (recursively)
    /// if it's already full, or minting a new root if `left_page` had none.
    fn insert_into_parent(&self, left_page: PageNum, sep_key: &[u8], right_page: PageNum) -> Result<()> {
        let parent_page = self.parent_of(left_page)?;

        if parent_page == INVALID_PAGE_NUM {
            let new_root_handle = self.bpm.allocate_page(self.file)?;
            let new_root = NodeHandler::new(self.bpm, new_root_handle, self.key_length);
            new_root.init_internal();
            let sentinel = vec![0u8; self.key_length];
            new_root.internal_insert_at(0, &sentinel, left_page);
            new_root.internal_insert_at(1, sep_key, right_page);
            let new_root_page = new_root.page_num();
            drop(new_root);

            self.set_parent(left_page, new_root_page)?;
            self.set_parent(right_page, new_root_page)?;
            self.write_root(new_root_page);
            return Ok(());
        }

        self.set_parent(right_page, parent_page)?;
        let parent = self.node(parent_page)?;
        let left_index = self.child_index(&parent, left_page);
        let insert_pos = left_index + 1;

        if (parent.key_count() as usize) < self.internal_max_size {
            parent.internal_insert_at(insert_pos, sep_key, right_page);
            return Ok(());
        }

        // Parent is full: split it too, pushing its middle key up a level.
        let mut entries = parent.internal_entries();
        entries.insert(insert_pos, (sep_key.to_vec(), right_page));
        let mid = entries.len() / 2;
        let pushed_up_key = entries[mid].0.clone();
        let mut right_entries = entries.split_off(mid);
        let left_entries = entries;
        right_entries[0].0 = vec![0u8; self.key_length]; // new node's sentinel

        let new_sibling_handle = self.bpm.allocate_page(self.file)?;
        let new_sibling = NodeHandler::new(self.bpm, new_sibling_handle, self.key_length);
        new_sibling.init_internal();
        new_sibling.rewrite_internal_entries(&right_entries);
        new_sibling.set_parent_page_num(parent.parent_page_num());

        parent.rewrite_internal_entries(&left_entries);

        let parent_page_num = parent.page_num();
        let new_sibling_page = new_sibling.page_num();
        drop(parent);

        for (_, child) in &right_entries {
            self.set_parent(*child, new_sibling_page)?;
        }
        drop(new_sibling);

        self.insert_into_parent(parent_page_num, &pushed_up_key, new_sibling_page)
    }

    /// Spec §4.4 `delete` steps 1-3: locate the exact composite key and
    /// remove it, then rebalance upward from the leaf it lived in.
    pub fn delete(&self, user_key: &[u8], rid: Rid) -> Result<()> {
        let key = compose_key(user_key, rid);
        let leaf = self.find_leaf(&key)?;
        let (pos, exact) = leaf.leaf_find_insert_pos(&key, self.attr_type, self.attr_length);
        if !exact {
            bail!(Error::RecordNotExist);
        }
        leaf.leaf_remove_at(pos);
        let leaf_page = leaf.page_num();
        drop(leaf);
        self.rebalance_after_delete(leaf_page)
    }

    /// Spec §4.4 `delete` steps 4-6: if `page_num` underflows its minimum
    /// occupancy, redistribute an entry from a sibling or coalesce with
    /// one, recursing upward as needed. The root is handled separately: it
    /// has no minimum occupancy except "at least one child" (shrinks the
    /// tree by a level) or "at least one entry" (empties the tree).
    fn rebalance_after_delete(&self, page_num: PageNum) -> Result<()> {
        let root = self.read_root();
        let node = self.node(page_num)?;
        let is_leaf = node.is_leaf();
        let count = node.key_count() as usize;

        if page_num == root {
            if is_leaf {
                if count == 0 {
                    drop(node);
                    self.write_root(INVALID_PAGE_NUM);
                    self.bpm.dispose_page(self.file, page_num)?;
                }
            } else if count == 1 {
                let only_child = node.internal_child_at(0);
                drop(node);
                self.set_parent(only_child, INVALID_PAGE_NUM)?;
                self.write_root(only_child);
                self.bpm.dispose_page(self.file, page_num)?;
            }
            return Ok(());
        }

        let max_size = if is_leaf { self.leaf_max_size } else { self.internal_max_size };
        let min = min_size(max_size);
        if count >= min {
            return Ok(());
        }
        let parent_page = node.parent_page_num();
        drop(node);

        let parent = self.node(parent_page)?;
        let my_index = self.child_index(&parent, page_num);
        let parent_count = parent.key_count() as usize;
        let left_sibling_index = if my_index > 0 { Some(my_index - 1) } else { None };
        let right_sibling_index = if my_index + 1 < parent_count { Some(my_index + 1) } else { None };

        let (sibling_index, sibling_is_left) = match (left_sibling_index, right_sibling_index) {
            (Some(l), _) => (l, true),
            (None, Some(r)) => (r, false),
            (None, None) => return Ok(()),
        };
        let sibling_page = parent.internal_child_at(sibling_index);

        let node = self.node(page_num)?;
        let sibling = self.node(sibling_page)?;
        let node_count = node.key_count() as usize;
        let sibling_count = sibling.key_count() as usize;

        if node_count + sibling_count > max_size {
            if is_leaf {
                self.redistribute_leaf(&node, &sibling, sibling_is_left, &parent, my_index, sibling_index);
            } else {
                self.redistribute_internal(&node, &sibling, sibling_is_left, &parent, my_index, sibling_index)?;
            }
            return Ok(());
        }

        // Coalesce: always keep the left-hand node of the pair and merge
        // the right-hand node's entries into it, so a leaf merge never has
        // to touch more than one sibling-chain pointer on each side.
        let (left, right, right_index) = if sibling_is_left {
            (&sibling, &node, my_index)
        } else {
            (&node, &sibling, sibling_index)
        };

        if is_leaf {
            let mut merged = left.leaf_entries();
            merged.extend(right.leaf_entries());
            left.rewrite_leaf_entries(&merged);
            let right_next = right.next_leaf();
            left.set_next_leaf(right_next);
            if right_next != INVALID_PAGE_NUM {
                self.set_next_leaf_prev(right_next, left.page_num())?;
            }
        } else {
            let mut merged = left.internal_entries();
            let mut right_entries = right.internal_entries();
            right_entries[0].0 = parent.internal_key_at(right_index).to_vec();
            for (_, child) in &right_entries {
                self.set_parent(*child, left.page_num())?;
            }
            merged.extend(right_entries);
            left.rewrite_internal_entries(&merged);
        }

        let right_page = right.page_num();
        drop(node);
        drop(sibling);

        parent.internal_remove_at(right_index);
        let parent_page_num = parent.page_num();
        drop(parent);

        self.bpm.dispose_page(self.file, right_page)?;
        self.rebalance_after_delete(parent_page_num)
    }

    /// Move exactly one entry across the `node`/`sibling` boundary so both
    /// sides meet their minimum occupancy, then fix the parent's separator.
    fn redistribute_leaf(
        &self,
        node: &NodeHandler,
        sibling: &NodeHandler,
        sibling_is_left: bool,
        parent: &NodeHandler,
        my_index: usize,
        sibling_index: usize,
    ) {
        if sibling_is_left {
            let mut sib_entries = sibling.leaf_entries();
            let moved = sib_entries.pop().expect("sibling had spare entries to redistribute");
            sibling.rewrite_leaf_entries(&sib_entries);
            let mut node_entries = node.leaf_entries();
            node_entries.insert(0, moved.clone());
            node.rewrite_leaf_entries(&node_entries);
            parent.internal_set_key_at(my_index, &moved.0);
        } else {
            let mut sib_entries = sibling.leaf_entries();
            let moved = sib_entries.remove(0);
            sibling.rewrite_leaf_entries(&sib_entries);
            let mut node_entries = node.leaf_entries();
            node_entries.push(moved);
            node.rewrite_leaf_entries(&node_entries);
            let new_sibling_first = sib_entries[0].0.clone();
            parent.internal_set_key_at(sibling_index, &new_sibling_first);
        }
    }

    /// Internal-node analog of [`Self::redistribute_leaf`]: the moved
    /// child's old separator key is threaded through the parent, since an
    /// internal node's own index-0 key is always the ignored sentinel.
    fn redistribute_internal(
        &self,
        node: &NodeHandler,
        sibling: &NodeHandler,
        sibling_is_left: bool,
        parent: &NodeHandler,
        my_index: usize,
        sibling_index: usize,
    ) -> Result<()> {
        if sibling_is_left {
            let mut sib_entries = sibling.internal_entries();
            let (moved_key, moved_child) = sib_entries.pop().expect("sibling had spare entries");
            sibling.rewrite_internal_entries(&sib_entries);

            let old_separator = parent.internal_key_at(my_index).to_vec();
            let mut node_entries = node.internal_entries();
            let old_first_child = node_entries[0].1;
            node_entries[0].1 = moved_child;
            node_entries.insert(1, (old_separator, old_first_child));
            node.rewrite_internal_entries(&node_entries);

            self.set_parent(moved_child, node.page_num())?;
            parent.internal_set_key_at(my_index, &moved_key);
        } else {
            let mut sib_entries = sibling.internal_entries();
            let (_, moved_child) = sib_entries.remove(0);
            let old_separator = parent.internal_key_at(sibling_index).to_vec();
            let promoted_key = if sib_entries.is_empty() {
                vec![0u8; self.key_length]
            } else {
                sib_entries[0].0.clone()
            };
            if !sib_entries.is_empty() {
                sib_entries[0].0 = vec![0u8; self.key_length];
            }
            sibling.rewrite_internal_entries(&sib_entries);

            let mut node_entries = node.internal_entries();
            node_entries.push((old_separator, moved_child));
            node.rewrite_internal_entries(&node_entries);

            self.set_parent(moved_child, node.page_num())?;
            parent.internal_set_key_at(sibling_index, &promoted_key);
        }
        Ok(())
    }

    /// Spec §4.4 point lookup: every RID stored under `user_key`, in leaf
    /// (ascending RID) order.
    pub fn get(&self, user_key: &[u8]) -> Result<Vec<Rid>> {
        let root = self.read_root();
        if root == INVALID_PAGE_NUM {
            return Ok(Vec::new());
        }
        let probe = compose_key(user_key, MIN_RID);
        let mut current = Some(self.find_leaf(&probe)?);
        let mut result = Vec::new();

        'outer: while let Some(node) = current.take() {
            let entries = node.leaf_entries();
            let next_page = node.next_leaf();
            drop(node);

            for (key, rid) in entries {
                match cmp_user_key(&key[..self.attr_length], user_key, self.attr_type) {
                    Ordering::Equal => result.push(rid),
                    Ordering::Greater => break 'outer,
                    Ordering::Less => {}
                }
            }
            if next_page != INVALID_PAGE_NUM {
                current = Some(self.node(next_page)?);
            }
        }
        Ok(result)
    }

    /// Spec §4.4 range scan: open a scanner bounded by optional
    /// inclusive/exclusive user-key bounds.
    pub fn scan(
        &self,
        left_key: Option<&[u8]>,
        left_inclusive: bool,
        right_key: Option<&[u8]>,
        right_inclusive: bool,
    ) -> Result<BplusTreeScanner<'a>> {
        // CHAR bounds whose length doesn't match the indexed column are
        // widened/padded rather than silently truncated or mismatch-compared
        // (Open Question, decided in DESIGN.md) — a plain `&key[..attr_length]`
        // truncation would tie an over-length bound with rows it was meant to
        // exclude, and comparing mismatched lengths directly is undefined.
        let (left_key, left_inclusive) = match (left_key, self.attr_type) {
            (Some(k), AttrType::Char) => {
                let (fixed, inc) = fix_char_bound(k, self.attr_length, left_inclusive, true);
                (Some(fixed), inc)
            }
            (Some(k), _) => (Some(k.to_vec()), left_inclusive),
            (None, _) => (None, left_inclusive),
        };
        let (right_key, right_inclusive) = match (right_key, self.attr_type) {
            (Some(k), AttrType::Char) => {
                let (fixed, inc) = fix_char_bound(k, self.attr_length, right_inclusive, false);
                (Some(fixed), inc)
            }
            (Some(k), _) => (Some(k.to_vec()), right_inclusive),
            (None, _) => (None, right_inclusive),
        };

        let root = self.read_root();
        let start_leaf = if root == INVALID_PAGE_NUM {
            INVALID_PAGE_NUM
        } else if let Some(lk) = &left_key {
            let probe_rid = if left_inclusive { MIN_RID } else { MAX_RID };
            let probe = compose_key(lk, probe_rid);
            let leaf = self.find_leaf(&probe)?;
            leaf.page_num()
        } else {
            self.leftmost_leaf(root)?
        };

        Ok(BplusTreeScanner::new(
            self.bpm,
            self.file,
            self.attr_type,
            self.attr_length,
            self.key_length,
            left_key,
            left_inclusive,
            right_key,
            right_inclusive,
            start_leaf,
            root == INVALID_PAGE_NUM,
        ))
    }

    /// Spec §8 testable invariant: every non-root node is within
    /// `[min_size, max_size]` occupancy and every leaf is at the same
    /// depth. Intended for tests, not the hot path.
    pub fn validate_tree(&self) -> bool {
        let root = self.read_root();
        if root == INVALID_PAGE_NUM {
            return true;
        }
        self.validate_node(root, true).is_some()
    }

    fn validate_node(&self, page_num: PageNum, is_root: bool) -> Option<usize> {
        let node = self.node(page_num).ok()?;
        let is_leaf = node.is_leaf();
        let count = node.key_count() as usize;
        let max_size = if is_leaf { self.leaf_max_size } else { self.internal_max_size };
        let min = min_size(max_size);
        if !is_root && !(min..=max_size).contains(&count) {
            return None;
        }
        if is_leaf {
            return Some(1);
        }
        let children: Vec<PageNum> = (0..count).map(|i| node.internal_child_at(i)).collect();
        drop(node);

        let mut depth = None;
        for child in children {
            let d = self.validate_node(child, false)?;
            match depth {
                None => depth = Some(d),
                Some(existing) if existing != d => return None,
                _ => {}
            }
        }
        depth.map(|d| d + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer_pool::BufferPoolManager;
    use crate::disk_manager::test_path;

    fn int_key(n: i32) -> [u8; 4] {
        n.to_be_bytes()
    }

    #[test]
    fn insert_get_and_delete_round_trip() {
        let bpm = BufferPoolManager::new(32);
        let path = test_path();
        let tree = BPlusTreeHandler::create(&bpm, &path, AttrType::Int, 4).unwrap();

        let rid = Rid::new(5, 0);
        tree.insert(&int_key(42), rid).unwrap();
        assert_eq!(tree.get(&int_key(42)).unwrap(), vec![rid]);

        tree.delete(&int_key(42), rid).unwrap();
        assert!(tree.get(&int_key(42)).unwrap().is_empty());

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn duplicate_composite_key_is_rejected() {
        let bpm = BufferPoolManager::new(32);
        let path = test_path();
        let tree = BPlusTreeHandler::create(&bpm, &path, AttrType::Int, 4).unwrap();

        let rid = Rid::new(1, 1);
        tree.insert(&int_key(7), rid).unwrap();
        assert!(tree.insert(&int_key(7), rid).is_err());

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn splits_cascade_and_tree_stays_valid() {
        let bpm = BufferPoolManager::new(64);
        let path = test_path();
        let tree = BPlusTreeHandler::create(&bpm, &path, AttrType::Int, 4).unwrap();

        for i in 0..200i32 {
            tree.insert(&int_key(i), Rid::new(1, i as u32)).unwrap();
            assert!(tree.validate_tree(), "tree invalid after inserting {i}");
        }
        for i in 0..200i32 {
            assert_eq!(tree.get(&int_key(i)).unwrap(), vec![Rid::new(1, i as u32)]);
        }

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn deletes_cascade_and_tree_stays_valid() {
        let bpm = BufferPoolManager::new(64);
        let path = test_path();
        let tree = BPlusTreeHandler::create(&bpm, &path, AttrType::Int, 4).unwrap();

        for i in 0..200i32 {
            tree.insert(&int_key(i), Rid::new(1, i as u32)).unwrap();
        }
        for i in 0..200i32 {
            tree.delete(&int_key(i), Rid::new(1, i as u32)).unwrap();
            assert!(tree.validate_tree(), "tree invalid after deleting {i}");
        }
        assert!(tree.get(&int_key(5)).unwrap().is_empty());

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn range_scan_respects_inclusive_and_exclusive_bounds() {
        let bpm = BufferPoolManager::new(64);
        let path = test_path();
        let tree = BPlusTreeHandler::create(&bpm, &path, AttrType::Int, 4).unwrap();

        for i in 0..50i32 {
            tree.insert(&int_key(i), Rid::new(1, i as u32)).unwrap();
        }

        let inclusive: Vec<Rid> = tree
            .scan(Some(&int_key(10)), true, Some(&int_key(15)), true)
            .unwrap()
            .collect();
        assert_eq!(inclusive.len(), 6);

        let exclusive: Vec<Rid> = tree
            .scan(Some(&int_key(10)), false, Some(&int_key(15)), false)
            .unwrap()
            .collect();
        assert_eq!(exclusive.len(), 4);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn unbounded_scan_visits_every_entry_in_order() {
        let bpm = BufferPoolManager::new(64);
        let path = test_path();
        let tree = BPlusTreeHandler::create(&bpm, &path, AttrType::Int, 4).unwrap();

        for i in (0..30i32).rev() {
            tree.insert(&int_key(i), Rid::new(1, i as u32)).unwrap();
        }

        let rids: Vec<Rid> = tree.scan(None, true, None, true).unwrap().collect();
        assert_eq!(rids.len(), 30);
        let slots: Vec<u32> = rids.iter().map(|r| r.slot_num).collect();
        let mut sorted = slots.clone();
        sorted.sort();
        assert_eq!(slots, sorted);

        let _ = std::fs::remove_file(&path);
    }
}
