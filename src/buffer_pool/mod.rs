//! Buffer Pool Manager (spec §4.1, §4.2): maps `(file, page_num)` to
//! pinned in-memory frames, mediates all disk I/O, and evicts unpinned
//! frames under memory pressure using approximate LRU.
//!
//! Per Design Notes §9, there is no global singleton: a `BufferPoolManager`
//! is constructed once (typically by the host process) and threaded
//! through as a constructor argument to every file-level component
//! (`RecordFileHandler`, `BPlusTreeHandler`, `Table`).

mod frame;
mod replacer;

use crate::disk_manager::DiskManager;
use crate::error::Error;
use crate::page::file_header::FileHeaderView;
use crate::page::{Page, PageNum, HEADER_PAGE_NUM, PAGE_SIZE};
use anyhow::{bail, Result};
use frame::Frame;
use log::{debug, trace, warn};
use parking_lot::Mutex;
use replacer::{Replacer, LRU};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Handle returned by `create_file`/`open_file`, opaque to callers.
pub type FileId = usize;

/// Index into the frame table. Private to the buffer pool: callers only
/// ever see a [`PageHandle`].
pub(super) type FrameId = usize;

struct OpenFile {
    disk: DiskManager,
    header_frame: FrameId,
}

struct Inner {
    frames: Vec<Frame>,
    free_frames: Vec<FrameId>,
    page_table: HashMap<(FileId, PageNum), FrameId>,
    replacer: LRU,
    open_files: HashMap<FileId, OpenFile>,
    path_to_file_id: HashMap<PathBuf, FileId>,
    next_file_id: FileId,
}

/// A pinned handle to one resident page. Move-only: per Design Notes §9,
/// frame pins are a scoped resource, so `PageHandle` releases (unpins) its
/// page automatically on drop rather than requiring callers to remember an
/// explicit `unpin_page` call. Dirty pages are not flushed synchronously on
/// drop — they stay dirty in their frame and are written back whenever the
/// buffer pool evicts or closes the file, so nothing is lost, just as an
/// ordinary buffer pool defers write-back rather than flushing on every
/// unpin.
pub struct PageHandle<'a> {
    bpm: &'a BufferPoolManager,
    pub file: FileId,
    pub page_num: PageNum,
}

impl<'a> PageHandle<'a> {
    fn new(bpm: &'a BufferPoolManager, file: FileId, page_num: PageNum) -> Self {
        Self { bpm, file, page_num }
    }
}

impl Drop for PageHandle<'_> {
    fn drop(&mut self) {
        self.bpm.unpin_raw(self.file, self.page_num);
    }
}

pub struct BufferPoolManager {
    inner: Mutex<Inner>,
}

impl BufferPoolManager {
    pub fn new(frame_count: usize) -> Self {
        let frames = (0..frame_count).map(|_| Frame::empty()).collect();
        Self {
            inner: Mutex::new(Inner {
                frames,
                free_frames: (0..frame_count).collect(),
                page_table: HashMap::new(),
                replacer: LRU::new(frame_count),
                open_files: HashMap::new(),
                path_to_file_id: HashMap::new(),
                next_file_id: 0,
            }),
        }
    }

    /// Spec §4.2 `create_file`: fails if the path exists.
    pub fn create_file(&self, path: impl AsRef<Path>) -> Result<FileId> {
        let path = path.as_ref();
        let mut disk = DiskManager::create(path)?;
        let mut header_page = Page::new();
        FileHeaderView::new(&mut header_page).init();
        header_page.stamp_checksum();
        disk.write_page(HEADER_PAGE_NUM, &header_page)?;
        disk.sync()?;
        drop(disk);
        self.open_file(path)
    }

    /// Spec §4.2 `open_file`: fails if already opened by this BPM.
    pub fn open_file(&self, path: impl AsRef<Path>) -> Result<FileId> {
        let path = path.as_ref().to_path_buf();
        let mut inner = self.inner.lock();
        if inner.path_to_file_id.contains_key(&path) {
            bail!(Error::FileAlreadyOpen(path.display().to_string()));
        }
        let mut disk = DiskManager::open(&path)?;
        let header_bytes = disk.read_page(HEADER_PAGE_NUM)?;
        let header_page = Page::from_bytes(header_bytes);

        let file_id = inner.next_file_id;
        inner.next_file_id += 1;

        let frame_id = Self::reserve_frame(&mut *inner)?;
        inner.frames[frame_id].bind((file_id, HEADER_PAGE_NUM), header_page);
        inner.frames[frame_id].pin();
        inner.replacer.record_access(frame_id);
        inner.page_table.insert((file_id, HEADER_PAGE_NUM), frame_id);

        inner.open_files.insert(
            file_id,
            OpenFile {
                disk,
                header_frame: frame_id,
            },
        );
        inner.path_to_file_id.insert(path.clone(), file_id);
        debug!("opened file {} as handle {file_id}", path.display());
        Ok(file_id)
    }

    /// Spec §4.2 `close_file`: flushes all dirty frames for the file,
    /// unpins the header, closes the descriptor.
    pub fn close_file(&self, file: FileId, fsync: bool) -> Result<()> {
        let mut inner = self.inner.lock();
        let open_file = inner
            .open_files
            .remove(&file)
            .ok_or_else(|| anyhow::Error::new(Error::FileNotOpen(file.to_string())))?;

        let frame_ids: Vec<FrameId> = inner
            .page_table
            .iter()
            .filter(|((f, _), _)| *f == file)
            .map(|(_, frame_id)| *frame_id)
            .collect();

        let mut disk = open_file.disk;
        for frame_id in &frame_ids {
            let (_, page_num) = inner.frames[*frame_id].identity().unwrap();
            if inner.frames[*frame_id].is_dirty() {
                disk.write_page(page_num, inner.frames[*frame_id].page())?;
                inner.frames[*frame_id].mark_clean();
            }
            inner.page_table.remove(&(file, page_num));
            inner.replacer.remove_if_present(*frame_id);
            inner.free_frames.push(*frame_id);
        }
        if fsync {
            disk.sync()?;
        }
        inner.path_to_file_id.retain(|_, id| *id != file);
        debug!("closed file handle {file}");
        Ok(())
    }

    fn reserve_frame(inner: &mut Inner) -> Result<FrameId> {
        if let Some(frame_id) = inner.free_frames.pop() {
            return Ok(frame_id);
        }
        let victims = Self::purge_frames(inner, 1)?;
        victims
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::Error::new(Error::BufferPoolNoBuf))
    }

    /// Spec §4.1 `purge_frames`: walk frames in reverse-access order,
    /// pin each candidate (mark it unavailable) before releasing any lock
    /// on the frame table, flush if dirty, then free only the candidates
    /// the flush succeeded for. Grounded in `original_source`'s
    /// `BPFrameManager::purge_frames`, which pins candidates before
    /// dropping the frame-table lock so no other thread can race the same
    /// victim.
    fn purge_frames(inner: &mut Inner, count: usize) -> Result<Vec<FrameId>> {
        let mut freed = Vec::with_capacity(count);
        while freed.len() < count && inner.replacer.can_evict() {
            let frame_id = inner.replacer.evict();
            let (file, page_num) = inner.frames[frame_id].identity().unwrap();
            debug_assert_eq!(inner.frames[frame_id].pin_count(), 0);

            if inner.frames[frame_id].is_dirty() {
                let open_file = inner.open_files.get_mut(&file).unwrap();
                open_file
                    .disk
                    .write_page(page_num, inner.frames[frame_id].page())?;
                inner.frames[frame_id].mark_clean();
            }
            inner.page_table.remove(&(file, page_num));
            trace!("evicted frame {frame_id} ({file}, {page_num})");
            freed.push(frame_id);
        }
        Ok(freed)
    }

    /// Spec §4.2 `get_this_page`: resolves through the frame table; if not
    /// resident, reserves a frame and reads the page. Fails with
    /// `InvalidPageNum` if the file header doesn't mark the page live.
    pub fn get_this_page(&self, file: FileId, page_num: PageNum) -> Result<PageHandle<'_>> {
        let mut inner = self.inner.lock();
        if let Some(&frame_id) = inner.page_table.get(&(file, page_num)) {
            inner.frames[frame_id].pin();
            inner.replacer.record_access(frame_id);
            return Ok(PageHandle::new(self, file, page_num));
        }

        {
            let header_frame = inner.open_files[&file].header_frame;
            let header_page = inner.frames[header_frame].page();
            let live = FileHeaderView::new(&mut header_page.clone()).is_page_live(page_num);
            if !live {
                bail!(Error::InvalidPageNum(page_num as i64));
            }
        }

        let bytes = inner.open_files.get_mut(&file).unwrap().disk.read_page(page_num)?;
        let frame_id = Self::reserve_frame(&mut *inner)?;
        inner.frames[frame_id].bind((file, page_num), Page::from_bytes(bytes));
        inner.frames[frame_id].pin();
        inner.replacer.record_access(frame_id);
        inner.page_table.insert((file, page_num), frame_id);
        Ok(PageHandle::new(self, file, page_num))
    }

    /// Spec §4.2 `allocate_page`: finds a clear bit in the file-header
    /// bitmap, sets it, bumps `allocated_pages`, marks the header dirty,
    /// then `get_this_page`s the chosen number. Fails with
    /// `BufferPoolNoBuf` if the header bitmap has no clear bit left, or if
    /// no frame is available to resolve the freshly-allocated page — in
    /// which case the bitmap/counter bump is rolled back so a failed call
    /// leaves no trace (spec §7 kind-2: state restored on resource
    /// exhaustion).
    pub fn allocate_page(&self, file: FileId) -> Result<PageHandle<'_>> {
        let (page_num, prior_page_count) = {
            let mut inner = self.inner.lock();
            let header_frame = inner.open_files[&file].header_frame;
            let mut header_view = FileHeaderView::new(inner.frames[header_frame].page_mut());
            let page_num = header_view
                .first_free_page_num()
                .ok_or_else(|| anyhow::Error::new(Error::BufferPoolNoBuf))?;
            let prior_page_count = header_view.page_count();
            header_view.set_page_live(page_num, true);
            header_view.set_allocated_pages(header_view.allocated_pages() + 1);
            if page_num + 1 > prior_page_count {
                header_view.set_page_count(page_num + 1);
            }
            (page_num, prior_page_count)
        };
        self.get_this_page(file, page_num).map_err(|e| {
            let mut inner = self.inner.lock();
            let header_frame = inner.open_files[&file].header_frame;
            let mut header_view = FileHeaderView::new(inner.frames[header_frame].page_mut());
            header_view.set_page_live(page_num, false);
            header_view.set_allocated_pages(header_view.allocated_pages() - 1);
            header_view.set_page_count(prior_page_count);
            e
        })
    }

    /// Spec §4.2 `dispose_page`: clears the bit and decrements
    /// `allocated_pages`. The caller must already have dropped its
    /// `PageHandle` for `page_num` (pin_count == 0) before calling this —
    /// disposal and pinning are mutually exclusive.
    pub fn dispose_page(&self, file: FileId, page_num: PageNum) -> Result<()> {
        let mut inner = self.inner.lock();
        if let Some(&frame_id) = inner.page_table.get(&(file, page_num)) {
            debug_assert_eq!(
                inner.frames[frame_id].pin_count(),
                0,
                "dispose_page called while the page is still pinned"
            );
            inner.page_table.remove(&(file, page_num));
            inner.replacer.remove_if_present(frame_id);
            inner.free_frames.push(frame_id);
        }
        let header_frame = inner.open_files[&file].header_frame;
        let mut header_view = FileHeaderView::new(inner.frames[header_frame].page_mut());
        header_view.set_page_live(page_num, false);
        header_view.set_allocated_pages(header_view.allocated_pages() - 1);
        Ok(())
    }

    /// Releases one pin on `(file, page_num)`. Called only from
    /// `PageHandle::drop`; there is no public unpin — pins are released by
    /// letting the owning `PageHandle` go out of scope.
    fn unpin_raw(&self, file: FileId, page_num: PageNum) {
        let mut inner = self.inner.lock();
        if let Some(&frame_id) = inner.page_table.get(&(file, page_num)) {
            inner.frames[frame_id].unpin();
            if inner.frames[frame_id].pin_count() == 0 {
                inner.replacer.set_evictable(frame_id, true);
            }
        } else {
            warn!("unpin on non-resident ({file}, {page_num})");
        }
    }

    /// Spec §4.2 `flush_page`: write the frame's bytes at
    /// `page_num * PAGE_SIZE`, clear dirty, stamp the CRC trailer.
    pub fn flush_page(&self, handle: &PageHandle<'_>) -> Result<()> {
        let mut inner = self.inner.lock();
        let frame_id = *inner
            .page_table
            .get(&(handle.file, handle.page_num))
            .ok_or_else(|| anyhow::Error::new(Error::InvalidPageNum(handle.page_num as i64)))?;
        inner.frames[frame_id].page_mut().stamp_checksum();
        let page_num = handle.page_num;
        let disk = &mut inner.open_files.get_mut(&handle.file).unwrap().disk;
        disk.write_page(page_num, inner.frames[frame_id].page())?;
        inner.frames[frame_id].mark_clean();
        Ok(())
    }

    pub fn with_page<T>(&self, handle: &PageHandle<'_>, f: impl FnOnce(&Page) -> T) -> T {
        let inner = self.inner.lock();
        let frame_id = inner.page_table[&(handle.file, handle.page_num)];
        f(inner.frames[frame_id].page())
    }

    pub fn with_page_mut<T>(&self, handle: &PageHandle<'_>, f: impl FnOnce(&mut Page) -> T) -> T {
        let mut inner = self.inner.lock();
        let frame_id = inner.page_table[&(handle.file, handle.page_num)];
        f(inner.frames[frame_id].page_mut())
    }

    #[cfg(test)]
    pub fn pin_count(&self, handle: &PageHandle<'_>) -> u32 {
        let inner = self.inner.lock();
        let frame_id = inner.page_table[&(handle.file, handle.page_num)];
        inner.frames[frame_id].pin_count()
    }

    /// High-water mark of page numbers ever handed out for `file`. Record
    /// and B+ tree scanners use this to bound a full-file page walk.
    pub fn page_count(&self, file: FileId) -> PageNum {
        let inner = self.inner.lock();
        let header_frame = inner.open_files[&file].header_frame;
        let mut header_page = inner.frames[header_frame].page().clone();
        FileHeaderView::new(&mut header_page).page_count()
    }

    pub fn is_page_live(&self, file: FileId, page_num: PageNum) -> bool {
        let inner = self.inner.lock();
        let header_frame = inner.open_files[&file].header_frame;
        let mut header_page = inner.frames[header_frame].page().clone();
        FileHeaderView::new(&mut header_page).is_page_live(page_num)
    }
}

const _: () = assert!(PAGE_SIZE > 0);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk_manager::test_path;

    #[test]
    fn create_file_then_allocate_and_flush_page() {
        let bpm = BufferPoolManager::new(8);
        let path = test_path();
        let file = bpm.create_file(&path).unwrap();

        let handle = bpm.allocate_page(file).unwrap();
        bpm.with_page_mut(&handle, |p| p.write_bytes(0, b"abc"));
        bpm.flush_page(&handle).unwrap();
        drop(handle);

        bpm.close_file(file, true).unwrap();
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn get_this_page_rejects_non_live_page_num() {
        let bpm = BufferPoolManager::new(8);
        let path = test_path();
        let file = bpm.create_file(&path).unwrap();
        assert!(bpm.get_this_page(file, 41).is_err());
        bpm.close_file(file, false).unwrap();
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn eviction_only_touches_unpinned_frames() {
        let bpm = BufferPoolManager::new(2);
        let path = test_path();
        let file = bpm.create_file(&path).unwrap();

        // 2 frames total; the header page stays pinned for the file's whole
        // lifetime, so only one frame is ever free for data pages. `h1` must
        // be dropped before `h2` can be allocated, or `reserve_frame` finds
        // no evictable frame (both resident frames pinned) and fails.
        let h1 = bpm.allocate_page(file).unwrap();
        drop(h1);
        let h2 = bpm.allocate_page(file).unwrap();
        drop(h2);

        let h3 = bpm.allocate_page(file).unwrap();
        drop(h3);

        bpm.close_file(file, false).unwrap();
        let _ = std::fs::remove_file(&path);
    }
}
