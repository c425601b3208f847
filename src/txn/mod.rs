//! Transaction Hook (spec §4.5): a minimal "in-progress vs committed"
//! boundary encoded directly in every record's hidden `__trx` field,
//! without a full write-ahead log.
//!
//! Grounded in `original_source`'s `storage/trx/trx.cpp`: the bit layout
//! (`DELETED_FLAG_BIT_MASK = 0x8000_0000`, the remaining 31 bits the trx
//! id), the field name `"__trx"` / type `INTS` / width `sizeof(int32_t)`,
//! and the exact `is_visible`/commit/rollback semantics are carried over
//! unchanged; only the surrounding idiom (atomics, `HashMap`-backed
//! operation log, `anyhow::Result`) is this crate's own.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::rid::Rid;

/// Name of the hidden field every table prepends to its declared schema.
pub const HIDDEN_FIELD_NAME: &str = "__trx";
/// Width in bytes of the hidden field (`sizeof(int32_t)` in the source).
pub const HIDDEN_FIELD_LEN: usize = 4;

const DELETED_FLAG_BIT_MASK: u32 = 0x8000_0000;
const TRX_ID_MASK: u32 = 0x7FFF_FFFF;

/// `trx_id = 0` means "default/committed"; never handed out to a real
/// transaction.
pub const COMMITTED_TRX_ID: u32 = 0;

pub type TrxId = u32;

/// One entry in a transaction's undo/redo log (spec §3 "Transaction
/// Operation").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    Insert,
    Delete,
}

/// Decode a stamped hidden-field value into `(trx_id, deleted)`.
pub fn decode(hidden_field: i32) -> (TrxId, bool) {
    let raw = hidden_field as u32;
    (raw & TRX_ID_MASK, raw & DELETED_FLAG_BIT_MASK != 0)
}

/// Encode `(trx_id, deleted)` back into the hidden-field's wire
/// representation.
pub fn encode(trx_id: TrxId, deleted: bool) -> i32 {
    let mut raw = trx_id & TRX_ID_MASK;
    if deleted {
        raw |= DELETED_FLAG_BIT_MASK;
    }
    raw as i32
}

/// Spec §3: "A record is visible to transaction `T` iff `record.trx_id ∈
/// {0, T.id}` and `record.deleted == false` when `T.id ≠ record.trx_id`."
/// Expanded per §4.5 into the asymmetric case: another transaction's
/// uncommitted delete marker still shows the row it is trying to remove,
/// since that removal hasn't committed yet.
pub fn is_visible(hidden_field: i32, viewer: TrxId) -> bool {
    let (r_trx, r_del) = decode(hidden_field);
    if r_trx == COMMITTED_TRX_ID || r_trx == viewer {
        !r_del
    } else {
        r_del
    }
}

/// Process-wide allocator for transaction ids. Held by the host and
/// passed by reference, per Design Notes §9 — not a singleton.
#[derive(Debug, Default)]
pub struct TrxIdAllocator {
    next: AtomicU32,
}

impl TrxIdAllocator {
    pub fn new() -> Self {
        // trx ids start at 1; 0 is reserved for "committed".
        Self {
            next: AtomicU32::new(1),
        }
    }

    pub fn allocate(&self) -> TrxId {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

/// One open transaction's id and its undo log, keyed by `(table, rid)`
/// exactly as spec §3 describes.
pub struct Trx {
    id: TrxId,
    operations: HashMap<(String, Rid), OpKind>,
}

impl Trx {
    pub fn begin(allocator: &TrxIdAllocator) -> Self {
        Self {
            id: allocator.allocate(),
            operations: HashMap::new(),
        }
    }

    pub fn id(&self) -> TrxId {
        self.id
    }

    /// Spec §4.5: "For insert: records `(INSERT, rid)`."
    pub fn record_insert(&mut self, table: &str, rid: Rid) {
        self.operations.insert((table.to_string(), rid), OpKind::Insert);
    }

    /// Spec §4.5: "For delete: if there is a prior `(INSERT, rid)` from the
    /// same transaction, erase it (net insert that was never committed);
    /// else record `(DELETE, rid)`." Returns `true` if the delete should
    /// stamp the record's hidden field (i.e. it wasn't an insert-then-
    /// delete within the same transaction).
    pub fn record_delete(&mut self, table: &str, rid: Rid) -> bool {
        let key = (table.to_string(), rid);
        match self.operations.get(&key) {
            Some(OpKind::Insert) => {
                self.operations.remove(&key);
                false
            }
            _ => {
                self.operations.insert(key, OpKind::Delete);
                true
            }
        }
    }

    /// Operations queued for this transaction, consumed by commit/rollback.
    pub fn operations(&self) -> impl Iterator<Item = (&str, Rid, OpKind)> {
        self.operations
            .iter()
            .map(|((table, rid), kind)| (table.as_str(), *rid, *kind))
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_round_trips() {
        assert_eq!(decode(encode(5, false)), (5, false));
        assert_eq!(decode(encode(5, true)), (5, true));
        assert_eq!(decode(encode(0, false)), (0, false));
    }

    #[test]
    fn visibility_follows_spec_truth_table() {
        // committed, not deleted: visible to everyone
        assert!(is_visible(encode(0, false), 7));
        // committed, deleted: visible to no one
        assert!(!is_visible(encode(0, true), 7));
        // own uncommitted insert: visible to self
        assert!(is_visible(encode(7, false), 7));
        // own uncommitted insert: invisible to others
        assert!(!is_visible(encode(7, false), 8));
        // someone else's uncommitted delete of a committed row: still
        // visible to other viewers (the delete hasn't landed yet)
        assert!(is_visible(encode(7, true), 8));
        // same transaction's own delete: invisible to itself
        assert!(!is_visible(encode(7, true), 7));
    }

    #[test]
    fn trx_id_allocator_never_hands_out_zero() {
        let allocator = TrxIdAllocator::new();
        assert_ne!(allocator.allocate(), COMMITTED_TRX_ID);
    }

    #[test]
    fn insert_then_delete_in_same_trx_cancels_to_empty() {
        let allocator = TrxIdAllocator::new();
        let mut trx = Trx::begin(&allocator);
        let rid = Rid::new(1, 0);
        trx.record_insert("t", rid);
        let should_stamp = trx.record_delete("t", rid);
        assert!(!should_stamp);
        assert!(trx.is_empty());
    }

    #[test]
    fn delete_of_committed_row_records_delete_op() {
        let allocator = TrxIdAllocator::new();
        let mut trx = Trx::begin(&allocator);
        let rid = Rid::new(2, 0);
        let should_stamp = trx.record_delete("t", rid);
        assert!(should_stamp);
        assert_eq!(trx.operations().count(), 1);
    }
}
