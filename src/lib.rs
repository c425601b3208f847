//! Storage and indexing core: buffer pool manager, paged record store, B+
//! tree index, and the transaction hook that ties them together (see
//! `DESIGN.md` for how each module is grounded).
//!
//! Dependency order, leaves first: [`page`] → [`disk_manager`] →
//! [`buffer_pool`] → [`record`] / [`index`] → [`txn`] → [`table`]. The SQL
//! front end, planner, executor, and network layer are external
//! collaborators that consume this crate through [`table::Table`] and have
//! no presence here.

pub mod buffer_pool;
pub mod config;
pub mod disk_manager;
pub mod error;
pub mod index;
pub mod page;
pub mod record;
pub mod rid;
pub mod table;
pub mod txn;

pub use buffer_pool::BufferPoolManager;
pub use config::StorageConfig;
pub use error::Error;
pub use rid::Rid;
pub use table::Table;
