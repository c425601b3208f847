//! Single-page record CRUD, layered directly over a pinned
//! [`PageHandle`]. [`file_handler::RecordFileHandler`] picks which page to
//! operate on; this module only knows about one page at a time, mirroring
//! the source's `RecordPageHandler`/`RecordFileHandler` split.

use anyhow::{bail, Result};

use crate::buffer_pool::{BufferPoolManager, PageHandle};
use crate::error::Error;
use crate::page::record_page::RecordPageView;

pub struct RecordPageHandler<'a> {
    bpm: &'a BufferPoolManager,
    handle: PageHandle<'a>,
}

impl<'a> RecordPageHandler<'a> {
    pub fn new(bpm: &'a BufferPoolManager, handle: PageHandle<'a>) -> Self {
        Self { bpm, handle }
    }

    pub fn handle(&self) -> &PageHandle<'a> {
        &self.handle
    }

    pub fn init(&self, record_size_unaligned: usize) {
        self.bpm.with_page_mut(&self.handle, |p| {
            RecordPageView::new(p).init(record_size_unaligned)
        });
    }

    pub fn is_full(&self) -> bool {
        self.bpm
            .with_page_mut(&self.handle, |p| RecordPageView::new(p).is_full())
    }

    pub fn record_capacity(&self) -> u32 {
        self.bpm
            .with_page_mut(&self.handle, |p| RecordPageView::new(p).record_capacity())
    }

    /// Insert `data` into the page's first free slot; returns the chosen
    /// slot and whether the page is now full.
    pub fn insert(&self, data: &[u8]) -> (u32, bool) {
        self.bpm.with_page_mut(&self.handle, |p| {
            let mut view = RecordPageView::new(p);
            let slot = view.insert(data);
            (slot, view.is_full())
        })
    }

    /// `data` must be exactly the page's declared (unaligned) record width
    /// — the same width `insert` accepts — not the wider aligned slot.
    pub fn update(&self, slot: u32, data: &[u8]) -> Result<()> {
        let result = self.bpm.with_page_mut(&self.handle, |p| {
            let mut view = RecordPageView::new(p);
            if !view.is_slot_occupied(slot) {
                return Err(None);
            }
            let expected = view.record_size_unaligned() as usize;
            if data.len() != expected {
                return Err(Some(expected));
            }
            view.update(slot, data);
            Ok(())
        });
        match result {
            Ok(()) => Ok(()),
            Err(Some(expected)) => bail!(Error::InvalidArgument(format!(
                "expected {expected} bytes, got {}",
                data.len()
            ))),
            Err(None) => bail!(Error::RecordNotExist),
        }
    }

    /// Clears the slot's occupancy bit. Returns `Ok(true)` if the page is
    /// now empty and should be disposed by the caller.
    pub fn delete(&self, slot: u32) -> Result<bool> {
        let result = self.bpm.with_page_mut(&self.handle, |p| {
            let mut view = RecordPageView::new(p);
            if !view.is_slot_occupied(slot) {
                return None;
            }
            Some(view.delete(slot))
        });
        result.ok_or_else(|| anyhow::Error::new(Error::RecordNotExist))
    }

    /// Returns the declared (unaligned) record width, not the wider
    /// 8-byte-aligned slot — the trailing alignment padding is never
    /// handed back to callers.
    pub fn get(&self, slot: u32) -> Result<Vec<u8>> {
        let data = self.bpm.with_page_mut(&self.handle, |p| {
            let view = RecordPageView::new(p);
            if view.is_slot_occupied(slot) {
                let len = view.record_size_unaligned() as usize;
                Some(view.slot_bytes(slot)[..len].to_vec())
            } else {
                None
            }
        });
        data.ok_or_else(|| anyhow::Error::new(Error::RecordNotExist))
    }

    /// Occupied `(slot, data)` pairs, in ascending slot order. `data` is
    /// the declared unaligned record width, not the wider aligned slot.
    pub fn live_records(&self) -> Vec<(u32, Vec<u8>)> {
        self.bpm.with_page_mut(&self.handle, |p| {
            let view = RecordPageView::new(p);
            let len = view.record_size_unaligned() as usize;
            (0..view.record_capacity())
                .filter(|&slot| view.is_slot_occupied(slot))
                .map(|slot| (slot, view.slot_bytes(slot)[..len].to_vec()))
                .collect()
        })
    }
}
