//! Fixed-size page buffers and the on-disk page formats built on top of
//! them (file header, slotted record page, B+ tree node).
//!
//! A [`Page`] is a dumb byte array; it knows nothing about which file or
//! buffer pool it belongs to (that's [`crate::buffer_pool::Frame`]'s job)
//! and nothing about the meaning of its bytes (that's [`file_header`],
//! [`record_page`] and [`btree_page`]'s job). Keeping it dumb means every
//! page-typed view borrows the same underlying buffer rather than copying
//! it, matching the teacher's `Page`/`TablePage` split.

pub mod btree_page;
pub mod file_header;
pub mod record_page;

use crc32fast::Hasher;

/// Page size in bytes, including the trailing CRC. Spec §3 names this a
/// parameter; the crate fixes it to the spec's own worked example (8 KiB)
/// since the capacity formulas and scenarios in spec §4/§8 are written
/// against that value.
pub const PAGE_SIZE: usize = 8192;

/// Bytes reserved at the tail of every page for the CRC-32 trailer (spec
/// §6: "Offset `PAGE_SIZE-4`..`PAGE_SIZE`: 32-bit CRC").
pub const CRC_TRAILER_BYTES: usize = 4;

/// Usable bytes in a page body, i.e. everything the CRC trailer doesn't
/// occupy.
pub const PAGE_BODY_SIZE: usize = PAGE_SIZE - CRC_TRAILER_BYTES;

/// A page number local to one file. Page 0 is always that file's header.
pub type PageNum = u32;

/// Sentinel for "no such page" (absent sibling/parent/child pointers).
pub const INVALID_PAGE_NUM: PageNum = PageNum::MAX;

/// Page number of every file's header page (spec §3, §4.2).
pub const HEADER_PAGE_NUM: PageNum = 0;

/// A single fixed-size in-memory page buffer.
///
/// Deliberately has no `Drop`, no pin count, no page number of its own —
/// those live one layer up in [`crate::buffer_pool::Frame`]. Safe to move,
/// cheap-ish to clone (used only by tests and `flush`).
#[derive(Clone)]
pub struct Page {
    data: [u8; PAGE_SIZE],
}

impl Default for Page {
    fn default() -> Self {
        Self::new()
    }
}

impl Page {
    pub fn new() -> Self {
        Self {
            data: [0u8; PAGE_SIZE],
        }
    }

    pub fn from_bytes(bytes: [u8; PAGE_SIZE]) -> Self {
        Self { data: bytes }
    }

    pub fn as_bytes(&self) -> &[u8; PAGE_SIZE] {
        &self.data
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8; PAGE_SIZE] {
        &mut self.data
    }

    pub fn read_bytes(&self, start: usize, end: usize) -> &[u8] {
        &self.data[start..end]
    }

    pub fn write_bytes(&mut self, start: usize, bytes: &[u8]) {
        self.data[start..start + bytes.len()].copy_from_slice(bytes);
    }

    pub fn read_u32(&self, offset: usize) -> u32 {
        u32::from_be_bytes(self.data[offset..offset + 4].try_into().unwrap())
    }

    pub fn write_u32(&mut self, offset: usize, value: u32) {
        self.write_bytes(offset, &value.to_be_bytes());
    }

    pub fn read_i32(&self, offset: usize) -> i32 {
        i32::from_be_bytes(self.data[offset..offset + 4].try_into().unwrap())
    }

    pub fn write_i32(&mut self, offset: usize, value: i32) {
        self.write_bytes(offset, &value.to_be_bytes());
    }

    /// Recompute the CRC-32 of the page body and stamp it into the trailer
    /// (spec §4.2: "compute a 32-bit checksum stored in the page trailer").
    pub fn stamp_checksum(&mut self) {
        let mut hasher = Hasher::new();
        hasher.update(&self.data[..PAGE_BODY_SIZE]);
        let crc = hasher.finalize();
        self.data[PAGE_BODY_SIZE..PAGE_SIZE].copy_from_slice(&crc.to_be_bytes());
    }

    /// Verify the trailer against the body. Spec §9: readers are not
    /// required to verify by default; this is the recovery-time pass that
    /// may call it.
    pub fn verify_checksum(&self) -> bool {
        let mut hasher = Hasher::new();
        hasher.update(&self.data[..PAGE_BODY_SIZE]);
        let expected = hasher.finalize();
        let stored = u32::from_be_bytes(self.data[PAGE_BODY_SIZE..PAGE_SIZE].try_into().unwrap());
        expected == stored
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_roundtrips() {
        let mut page = Page::new();
        page.write_bytes(0, b"hello");
        page.stamp_checksum();
        assert!(page.verify_checksum());
    }

    #[test]
    fn checksum_detects_corruption() {
        let mut page = Page::new();
        page.write_bytes(0, b"hello");
        page.stamp_checksum();
        page.write_bytes(0, b"world");
        assert!(!page.verify_checksum());
    }
}
