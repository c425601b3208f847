//! Full-file record CRUD and scan (spec §4.3 `RecordFileHandler` /
//! `RecordFileScanner`): tracks which pages are known not-full so inserts
//! don't have to probe every page, and walks the whole file in page
//! order for a scan.

use std::collections::HashSet;

use anyhow::{bail, Result};
use parking_lot::Mutex;

use crate::buffer_pool::{BufferPoolManager, FileId};
use crate::error::Error;
use crate::page::{PageNum, HEADER_PAGE_NUM};
use crate::rid::Rid;

use super::page_handler::RecordPageHandler;

pub struct RecordFileHandler<'a> {
    bpm: &'a BufferPoolManager,
    file: FileId,
    record_size_unaligned: usize,
    free_pages: Mutex<HashSet<PageNum>>,
}

impl<'a> RecordFileHandler<'a> {
    pub fn new(bpm: &'a BufferPoolManager, file: FileId, record_size_unaligned: usize) -> Self {
        Self {
            bpm,
            file,
            record_size_unaligned,
            free_pages: Mutex::new(HashSet::new()),
        }
    }

    fn pick_insert_page(&self) -> Result<PageNum> {
        if let Some(&page_num) = self.free_pages.lock().iter().next() {
            return Ok(page_num);
        }
        let handle = self.bpm.allocate_page(self.file)?;
        let page_num = handle.page_num;
        let page_handler = RecordPageHandler::new(self.bpm, handle);
        page_handler.init(self.record_size_unaligned);
        drop(page_handler);
        self.free_pages.lock().insert(page_num);
        Ok(page_num)
    }

    /// Spec §4.3 `insert`: pick a free page (allocating one if needed),
    /// write into its first clear slot, return the new RID.
    pub fn insert(&self, data: &[u8]) -> Result<Rid> {
        let page_num = self.pick_insert_page()?;
        let handle = self.bpm.get_this_page(self.file, page_num)?;
        let page_handler = RecordPageHandler::new(self.bpm, handle);
        let (slot, now_full) = page_handler.insert(data);
        if now_full {
            self.free_pages.lock().remove(&page_num);
        }
        drop(page_handler);
        Ok(Rid::new(page_num, slot))
    }

    /// Spec §4.3 `update`: overwrite in place; fails if the slot bit is 0.
    pub fn update(&self, rid: Rid, data: &[u8]) -> Result<()> {
        let handle = self.bpm.get_this_page(self.file, rid.page_num)?;
        let page_handler = RecordPageHandler::new(self.bpm, handle);
        page_handler.update(rid.slot_num, data)
    }

    /// Spec §4.3 `delete`: clear the bit; dispose the page back to the
    /// buffer pool if it's now empty.
    pub fn delete(&self, rid: Rid) -> Result<()> {
        let handle = self.bpm.get_this_page(self.file, rid.page_num)?;
        let page_handler = RecordPageHandler::new(self.bpm, handle);
        let now_empty = page_handler.delete(rid.slot_num)?;
        drop(page_handler);
        if now_empty {
            self.free_pages.lock().remove(&rid.page_num);
            self.bpm.dispose_page(self.file, rid.page_num)?;
        } else {
            self.free_pages.lock().insert(rid.page_num);
        }
        Ok(())
    }

    /// Spec §4.3 `get`: bounds/bitmap-checked read of one record's bytes.
    pub fn get(&self, rid: Rid) -> Result<Vec<u8>> {
        if rid.page_num == HEADER_PAGE_NUM {
            bail!(Error::InvalidRid(rid.to_string()));
        }
        let handle = self.bpm.get_this_page(self.file, rid.page_num)?;
        let page_handler = RecordPageHandler::new(self.bpm, handle);
        page_handler.get(rid.slot_num)
    }

    pub fn scan(&self) -> RecordFileScanner<'a> {
        RecordFileScanner::open(self.bpm, self.file)
    }
}

/// Spec §4.3 `RecordFileScanner`: exactly one emission per live RID,
/// walking pages `1..=last_page` and, within each page, slots
/// `0..capacity` in ascending order.
pub struct RecordFileScanner<'a> {
    bpm: &'a BufferPoolManager,
    file: FileId,
    next_page: PageNum,
    last_page: PageNum,
    current_page: PageNum,
    pending: std::vec::IntoIter<(u32, Vec<u8>)>,
}

impl<'a> RecordFileScanner<'a> {
    fn open(bpm: &'a BufferPoolManager, file: FileId) -> Self {
        let last_page = bpm.page_count(file).saturating_sub(1);
        Self {
            bpm,
            file,
            next_page: HEADER_PAGE_NUM + 1,
            last_page,
            current_page: HEADER_PAGE_NUM,
            pending: Vec::new().into_iter(),
        }
    }

    fn load_next_page(&mut self) -> bool {
        while self.next_page <= self.last_page {
            let page_num = self.next_page;
            self.next_page += 1;
            if !self.bpm.is_page_live(self.file, page_num) {
                continue;
            }
            let Ok(handle) = self.bpm.get_this_page(self.file, page_num) else {
                continue;
            };
            let page_handler = RecordPageHandler::new(self.bpm, handle);
            let records = page_handler.live_records();
            drop(page_handler);
            if records.is_empty() {
                continue;
            }
            self.current_page = page_num;
            self.pending = records.into_iter().collect::<Vec<_>>().into_iter();
            return true;
        }
        false
    }
}

impl<'a> Iterator for RecordFileScanner<'a> {
    type Item = (Rid, Vec<u8>);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some((slot, data)) = self.pending.next() {
                return Some((Rid::new(self.current_page, slot), data));
            }
            if !self.load_next_page() {
                return None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer_pool::BufferPoolManager;
    use crate::disk_manager::test_path;

    const RECORD_SIZE: usize = 24;

    #[test]
    fn insert_get_update_delete_round_trip() {
        let bpm = BufferPoolManager::new(16);
        let path = test_path();
        let file = bpm.create_file(&path).unwrap();
        let handler = RecordFileHandler::new(&bpm, file, RECORD_SIZE);

        let data = [1u8; RECORD_SIZE];
        let rid = handler.insert(&data).unwrap();
        assert_eq!(handler.get(rid).unwrap(), data.to_vec());

        let updated = [2u8; RECORD_SIZE];
        handler.update(rid, &updated).unwrap();
        assert_eq!(handler.get(rid).unwrap(), updated.to_vec());

        handler.delete(rid).unwrap();
        assert!(handler.get(rid).is_err());

        bpm.close_file(file, false).unwrap();
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn fills_page_then_spills_to_a_new_one() {
        let bpm = BufferPoolManager::new(16);
        let path = test_path();
        let file = bpm.create_file(&path).unwrap();
        let handler = RecordFileHandler::new(&bpm, file, RECORD_SIZE);

        let data = [9u8; RECORD_SIZE];
        let first_rid = handler.insert(&data).unwrap();
        let mut last_rid = first_rid;
        // Insert until a second page is used.
        for _ in 0..10_000 {
            last_rid = handler.insert(&data).unwrap();
            if last_rid.page_num != first_rid.page_num {
                break;
            }
        }
        assert_ne!(last_rid.page_num, first_rid.page_num);

        bpm.close_file(file, false).unwrap();
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn scan_emits_every_live_record_exactly_once() {
        let bpm = BufferPoolManager::new(16);
        let path = test_path();
        let file = bpm.create_file(&path).unwrap();
        let handler = RecordFileHandler::new(&bpm, file, RECORD_SIZE);

        let mut rids = Vec::new();
        for i in 0..20u8 {
            let data = [i; RECORD_SIZE];
            rids.push(handler.insert(&data).unwrap());
        }
        handler.delete(rids[5]).unwrap();

        let scanned: Vec<_> = handler.scan().collect();
        assert_eq!(scanned.len(), 19);
        assert!(scanned.iter().all(|(rid, _)| *rid != rids[5]));

        bpm.close_file(file, false).unwrap();
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn emptied_page_is_disposed_and_reused() {
        let bpm = BufferPoolManager::new(16);
        let path = test_path();
        let file = bpm.create_file(&path).unwrap();
        let handler = RecordFileHandler::new(&bpm, file, RECORD_SIZE);

        let data = [3u8; RECORD_SIZE];
        let rid = handler.insert(&data).unwrap();
        handler.delete(rid).unwrap();
        assert!(!bpm.is_page_live(file, rid.page_num));

        let rid2 = handler.insert(&data).unwrap();
        assert_eq!(rid2.page_num, rid.page_num);

        bpm.close_file(file, false).unwrap();
        let _ = std::fs::remove_file(&path);
    }
}
