//! Typed error payloads for the storage core.
//!
//! Every fallible operation returns `anyhow::Result<T>`; call sites that need
//! to distinguish a failure kind (rather than just propagate and log it)
//! downcast via `err.downcast_ref::<Error>()`. This mirrors how the rest of
//! the crate's lineage (and its teacher) uses `anyhow::bail!(Error::Variant)`
//! instead of a bespoke exception hierarchy.

use std::fmt;

/// The named return-code families from the storage core's external
/// interface. Variants that need context carry it as a `String` rather than
/// structured fields, matching the teacher's `Error::TableExists(String)`
/// style.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A `(page_num, slot_num)` pair does not address a live record, or is
    /// out of bounds for the page's slot capacity.
    InvalidRid(String),
    /// `get`/`update`/`delete` addressed a slot whose bitmap bit is clear.
    RecordNotExist,
    /// A B+ tree insert found an existing entry with the identical
    /// `(user_key, rid)` composite key.
    DuplicateKey,
    /// A scan or iterator has been exhausted.
    Eof,
    /// The buffer pool has no frame to give out and no evictable frame to
    /// reclaim it from.
    BufferPoolNoBuf,
    /// A page number does not address a page the file's header bitmap marks
    /// live.
    InvalidPageNum(i64),
    /// A named file could not be created because it already exists.
    FileExists(String),
    /// A named file has not been opened by this buffer pool manager.
    FileNotOpen(String),
    /// A named file is already open in this buffer pool manager.
    FileAlreadyOpen(String),
    IoOpen(String),
    IoRead(String),
    IoWrite(String),
    IoSeek(String),
    IoClose(String),
    /// A declared field was not found in a table's schema.
    FieldMissing(String),
    /// A value's runtime type didn't match its field's declared type.
    FieldTypeMismatch(String),
    InvalidArgument(String),
    /// A violated structural invariant (corrupt page, pin-count
    /// mismatch, non-empty-on-close, ...); the affected structure should be
    /// treated as poisoned.
    Internal(String),
    Empty,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidRid(ctx) => write!(f, "invalid rid: {ctx}"),
            Error::RecordNotExist => write!(f, "record does not exist"),
            Error::DuplicateKey => write!(f, "duplicate key"),
            Error::Eof => write!(f, "end of scan"),
            Error::BufferPoolNoBuf => write!(f, "buffer pool has no free frame"),
            Error::InvalidPageNum(num) => write!(f, "invalid page number: {num}"),
            Error::FileExists(path) => write!(f, "file already exists: {path}"),
            Error::FileNotOpen(path) => write!(f, "file is not open: {path}"),
            Error::FileAlreadyOpen(path) => write!(f, "file is already open: {path}"),
            Error::IoOpen(ctx) => write!(f, "failed to open file: {ctx}"),
            Error::IoRead(ctx) => write!(f, "failed to read page: {ctx}"),
            Error::IoWrite(ctx) => write!(f, "failed to write page: {ctx}"),
            Error::IoSeek(ctx) => write!(f, "failed to seek: {ctx}"),
            Error::IoClose(ctx) => write!(f, "failed to close file: {ctx}"),
            Error::FieldMissing(name) => write!(f, "field missing from schema: {name}"),
            Error::FieldTypeMismatch(ctx) => write!(f, "field type mismatch: {ctx}"),
            Error::InvalidArgument(ctx) => write!(f, "invalid argument: {ctx}"),
            Error::Internal(ctx) => write!(f, "internal error: {ctx}"),
            Error::Empty => write!(f, "operand set is empty"),
        }
    }
}

impl std::error::Error for Error {}

/// True if `err` is the named return-code `kind`.
///
/// Convenience for tests and call sites that only care whether a particular
/// failure happened, not its context string.
pub fn is_kind(err: &anyhow::Error, kind: &Error) -> bool {
    matches!(err.downcast_ref::<Error>(), Some(e) if std::mem::discriminant(e) == std::mem::discriminant(kind))
}
