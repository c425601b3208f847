//! Storage core configuration.
//!
//! The core has no dependency on whatever configuration-loading layer the
//! host process uses (INI file, env vars, CLI flags); it only needs a typed
//! place to land the handful of knobs that affect durability and memory use.
//! Construct a [`StorageConfig`] however the host prefers and pass it to
//! [`crate::buffer_pool::BufferPoolManager::new`].

#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Number of page-sized frames held in memory per buffer pool.
    pub buffer_pool_frames: usize,
    /// Directory new/opened files are resolved relative to.
    pub data_dir: String,
    /// Whether `close_file` issues an `fsync` after flushing dirty frames.
    /// Spec leaves this undocumented in the source; the crate defaults to
    /// `true` for durability (see DESIGN.md Open Questions).
    pub fsync_on_close: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            buffer_pool_frames: 10_000,
            data_dir: "data".to_string(),
            fsync_on_close: true,
        }
    }
}

impl StorageConfig {
    pub fn with_frames(mut self, frames: usize) -> Self {
        self.buffer_pool_frames = frames;
        self
    }

    pub fn with_data_dir(mut self, dir: impl Into<String>) -> Self {
        self.data_dir = dir.into();
        self
    }
}
