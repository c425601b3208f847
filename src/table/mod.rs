//! Table Binding (spec §4.6): glues the Record Manager, zero or more B+
//! Tree indexes, and the Transaction Hook into one handle the execution
//! layer drives through insert/update/delete/get/scan/index_scan.
//!
//! Grounded in the teacher's `table/mod.rs` (a `Table` gluing a page-based
//! heap to indexes and a txn id) and `catalog/mod.rs` (table metadata
//! storage), generalized to this crate's slotted-page/B+Tree/trx-hook
//! combination instead of the teacher's MVCC/shadow-page one.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::buffer_pool::BufferPoolManager;
use crate::error::Error;
use crate::index::{AttrType, BPlusTreeHandler, BplusTreeScanner};
use crate::record::{RecordFileHandler, RecordFileScanner};
use crate::rid::Rid;
use crate::txn::{self, OpKind, Trx, TrxId, COMMITTED_TRX_ID, HIDDEN_FIELD_NAME, HIDDEN_FIELD_LEN};

/// Spec §6 wire strings for a field's declared type. `Booleans`/`Dates`
/// compare and index as `Int` (dates are `YYYY*10000 + MM*100 + DD`
/// packed into an `i32`; booleans as 0/1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Ints,
    Floats,
    Chars,
    Booleans,
    Dates,
}

impl FieldType {
    pub fn attr_type(self) -> AttrType {
        match self {
            FieldType::Ints | FieldType::Booleans | FieldType::Dates => AttrType::Int,
            FieldType::Floats => AttrType::Float,
            FieldType::Chars => AttrType::Char,
        }
    }
}

/// One field's position within a record, spec §6's `FieldMeta`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldMeta {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub offset: usize,
    pub len: usize,
    /// `false` for the hidden `__trx` field; lets it live in the same
    /// field list as user fields without being projected out to callers.
    pub visible: bool,
}

/// One declared index, spec §6's `{name, field}` pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexMeta {
    pub name: String,
    pub field: String,
}

/// Spec §6 `TableMeta`: persisted to a sibling `<table>.json` file next to
/// the table's heap file and each index's `.idx` file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableMeta {
    pub table_id: u32,
    pub table_name: String,
    pub fields: Vec<FieldMeta>,
    pub indexes: Vec<IndexMeta>,
}

impl TableMeta {
    fn record_size_unaligned(&self) -> usize {
        self.fields.iter().map(|f| f.len).sum()
    }

    fn field(&self, name: &str) -> Result<&FieldMeta> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .ok_or_else(|| anyhow::Error::new(Error::FieldMissing(name.to_string())))
    }
}

fn heap_path(dir: &Path, table_name: &str) -> PathBuf {
    dir.join(format!("{table_name}.db"))
}

fn meta_path(dir: &Path, table_name: &str) -> PathBuf {
    dir.join(format!("{table_name}.json"))
}

fn index_path(dir: &Path, table_name: &str, field: &str) -> PathBuf {
    dir.join(format!("{table_name}.{field}.idx"))
}

struct IndexHandle<'a> {
    meta: IndexMeta,
    field_offset: usize,
    field_len: usize,
    handler: BPlusTreeHandler<'a>,
}

pub struct Table<'a> {
    meta: TableMeta,
    records: RecordFileHandler<'a>,
    indexes: Vec<IndexHandle<'a>>,
}

impl<'a> Table<'a> {
    /// Spec §4.6 `Table::create`: lay out the hidden `__trx` field plus
    /// the caller's user fields, create the heap file and one B+ tree per
    /// declared index, and persist the resulting `TableMeta`.
    pub fn create(
        bpm: &'a BufferPoolManager,
        dir: &Path,
        table_id: u32,
        table_name: &str,
        user_fields: &[(String, FieldType, usize)],
        indexed_fields: &[String],
    ) -> Result<Self> {
        fs::create_dir_all(dir).map_err(|e| anyhow::Error::new(Error::IoOpen(e.to_string())))?;

        let mut fields = Vec::with_capacity(user_fields.len() + 1);
        fields.push(FieldMeta {
            name: HIDDEN_FIELD_NAME.to_string(),
            field_type: FieldType::Ints,
            offset: 0,
            len: HIDDEN_FIELD_LEN,
            visible: false,
        });
        let mut offset = HIDDEN_FIELD_LEN;
        for (name, field_type, len) in user_fields {
            fields.push(FieldMeta {
                name: name.clone(),
                field_type: *field_type,
                offset,
                len: *len,
                visible: true,
            });
            offset += len;
        }

        let indexes_meta: Vec<IndexMeta> = indexed_fields
            .iter()
            .map(|field| IndexMeta {
                name: format!("idx_{table_name}_{field}"),
                field: field.clone(),
            })
            .collect();

        let meta = TableMeta {
            table_id,
            table_name: table_name.to_string(),
            fields,
            indexes: indexes_meta,
        };

        let file = bpm.create_file(heap_path(dir, table_name))?;
        let records = RecordFileHandler::new(bpm, file, meta.record_size_unaligned());

        let mut indexes = Vec::with_capacity(meta.indexes.len());
        for index_meta in &meta.indexes {
            let field = meta.field(&index_meta.field)?;
            let handler = BPlusTreeHandler::create(
                bpm,
                index_path(dir, table_name, &field.name),
                field.field_type.attr_type(),
                field.len,
            )?;
            indexes.push(IndexHandle {
                meta: index_meta.clone(),
                field_offset: field.offset,
                field_len: field.len,
                handler,
            });
        }

        let json = serde_json::to_vec_pretty(&meta).map_err(|e| anyhow::Error::new(Error::Internal(e.to_string())))?;
        fs::write(meta_path(dir, table_name), json).map_err(|e| anyhow::Error::new(Error::IoWrite(e.to_string())))?;

        Ok(Self { meta, records, indexes })
    }

    /// Spec §4.6 `Table::open`: read `TableMeta` back off disk and
    /// re-open the heap file and every declared index.
    pub fn open(bpm: &'a BufferPoolManager, dir: &Path, table_name: &str) -> Result<Self> {
        let bytes = fs::read(meta_path(dir, table_name)).map_err(|e| anyhow::Error::new(Error::IoOpen(e.to_string())))?;
        let meta: TableMeta = serde_json::from_slice(&bytes).map_err(|e| anyhow::Error::new(Error::Internal(e.to_string())))?;

        let file = bpm.open_file(heap_path(dir, table_name))?;
        let records = RecordFileHandler::new(bpm, file, meta.record_size_unaligned());

        let mut indexes = Vec::with_capacity(meta.indexes.len());
        for index_meta in &meta.indexes {
            let field = meta.field(&index_meta.field)?;
            let handler = BPlusTreeHandler::open(bpm, index_path(dir, table_name, &field.name))?;
            indexes.push(IndexHandle {
                meta: index_meta.clone(),
                field_offset: field.offset,
                field_len: field.len,
                handler,
            });
        }

        Ok(Self { meta, records, indexes })
    }

    pub fn meta(&self) -> &TableMeta {
        &self.meta
    }

    fn index_by_name(&self, name: &str) -> Result<&IndexHandle<'a>> {
        self.indexes
            .iter()
            .find(|idx| idx.meta.name == name)
            .ok_or_else(|| anyhow::Error::new(Error::FieldMissing(name.to_string())))
    }

    /// Spec §4.6 insert: stamp the hidden field for `trx`, persist the
    /// row, then update every index.
    pub fn insert(&self, trx: &mut Trx, user_fields: &[u8]) -> Result<Rid> {
        if user_fields.len() != self.meta.record_size_unaligned() - HIDDEN_FIELD_LEN {
            bail!(Error::InvalidArgument(format!(
                "expected {} bytes of user fields, got {}",
                self.meta.record_size_unaligned() - HIDDEN_FIELD_LEN,
                user_fields.len()
            )));
        }
        let mut full = Vec::with_capacity(self.meta.record_size_unaligned());
        full.extend_from_slice(&txn::encode(trx.id(), false).to_be_bytes());
        full.extend_from_slice(user_fields);

        let rid = self.records.insert(&full)?;
        trx.record_insert(&self.meta.table_name, rid);
        for idx in &self.indexes {
            let key = &full[idx.field_offset..idx.field_offset + idx.field_len];
            idx.handler.insert(key, rid)?;
        }
        Ok(rid)
    }

    /// Spec §4.6 update: fixed-width overwrite, same RID. Indexed fields
    /// whose bytes changed get their old entry removed and new one
    /// inserted before the record bytes are overwritten, so a failed
    /// index insert leaves the old record still findable by its old key.
    pub fn update(&self, rid: Rid, new_user_fields: &[u8]) -> Result<()> {
        let old = self.records.get(rid)?;
        if new_user_fields.len() != old.len() - HIDDEN_FIELD_LEN {
            bail!(Error::InvalidArgument("update field width mismatch".to_string()));
        }
        let mut new_full = old.clone();
        new_full[HIDDEN_FIELD_LEN..].copy_from_slice(new_user_fields);

        for idx in &self.indexes {
            let old_key = &old[idx.field_offset..idx.field_offset + idx.field_len];
            let new_key = &new_full[idx.field_offset..idx.field_offset + idx.field_len];
            if old_key != new_key {
                idx.handler.delete(old_key, rid)?;
                idx.handler.insert(new_key, rid)?;
            }
        }
        self.records.update(rid, &new_full)
    }

    /// Spec §4.6 delete: remove index entries, then stamp the trx hook's
    /// delete bit (physical removal deferred to commit, spec §4.5) unless
    /// this transaction is deleting its own uncommitted insert, in which
    /// case nothing else can ever observe the row and it's removed now.
    pub fn delete(&self, trx: &mut Trx, rid: Rid) -> Result<()> {
        let data = self.records.get(rid)?;
        for idx in &self.indexes {
            let key = &data[idx.field_offset..idx.field_offset + idx.field_len];
            idx.handler.delete(key, rid)?;
        }

        if trx.record_delete(&self.meta.table_name, rid) {
            let mut stamped = data;
            stamped[..HIDDEN_FIELD_LEN].copy_from_slice(&txn::encode(trx.id(), true).to_be_bytes());
            self.records.update(rid, &stamped)
        } else {
            self.records.delete(rid)
        }
    }

    /// Spec §4.6 `Table::scan`/read path: the row's visible user fields,
    /// or `None` if `viewer` can't see it per spec §4.5 `is_visible`.
    pub fn get(&self, viewer: TrxId, rid: Rid) -> Result<Option<Vec<u8>>> {
        let data = self.records.get(rid)?;
        let hidden = i32::from_be_bytes(data[..HIDDEN_FIELD_LEN].try_into().unwrap());
        if !txn::is_visible(hidden, viewer) {
            return Ok(None);
        }
        Ok(Some(data[HIDDEN_FIELD_LEN..].to_vec()))
    }

    /// Spec §4.6 `Table::scan`: every row visible to `viewer`, `(rid,
    /// user_fields)`.
    pub fn scan(&self, viewer: TrxId) -> TableScanner<'a> {
        TableScanner {
            inner: self.records.scan(),
            viewer,
        }
    }

    /// Spec §4.6 `Table::index_scan`: rows visible to `viewer` whose
    /// indexed field falls within the given bounds, read off `index_name`.
    pub fn index_scan(
        &self,
        viewer: TrxId,
        index_name: &str,
        left_key: Option<&[u8]>,
        left_inclusive: bool,
        right_key: Option<&[u8]>,
        right_inclusive: bool,
    ) -> Result<TableIndexScanner<'_, 'a>> {
        let idx = self.index_by_name(index_name)?;
        let inner = idx.handler.scan(left_key, left_inclusive, right_key, right_inclusive)?;
        Ok(TableIndexScanner {
            inner,
            records: &self.records,
            viewer,
        })
    }

    /// Spec §4.5 commit: this transaction's queued operations against this
    /// table become permanent — inserted rows' hidden field settles to
    /// `COMMITTED_TRX_ID`, deleted rows are physically reclaimed.
    pub fn commit(&self, trx: &Trx) -> Result<()> {
        for (table, rid, kind) in trx.operations() {
            if table != self.meta.table_name {
                continue;
            }
            match kind {
                OpKind::Insert => {
                    let mut data = self.records.get(rid)?;
                    data[..HIDDEN_FIELD_LEN].copy_from_slice(&txn::encode(COMMITTED_TRX_ID, false).to_be_bytes());
                    self.records.update(rid, &data)?;
                }
                OpKind::Delete => {
                    self.records.delete(rid)?;
                }
            }
        }
        Ok(())
    }

    /// Spec §4.5 rollback: reverse this transaction's queued operations —
    /// inserted rows are physically removed (index entries included),
    /// deleted rows' delete bit is un-stamped and their index entries
    /// reinserted.
    pub fn rollback(&self, trx: &Trx) -> Result<()> {
        for (table, rid, kind) in trx.operations() {
            if table != self.meta.table_name {
                continue;
            }
            match kind {
                OpKind::Insert => {
                    let data = self.records.get(rid)?;
                    for idx in &self.indexes {
                        let key = &data[idx.field_offset..idx.field_offset + idx.field_len];
                        idx.handler.delete(key, rid)?;
                    }
                    self.records.delete(rid)?;
                }
                OpKind::Delete => {
                    let mut data = self.records.get(rid)?;
                    data[..HIDDEN_FIELD_LEN].copy_from_slice(&txn::encode(COMMITTED_TRX_ID, false).to_be_bytes());
                    self.records.update(rid, &data)?;
                    for idx in &self.indexes {
                        let key = &data[idx.field_offset..idx.field_offset + idx.field_len];
                        idx.handler.insert(key, rid)?;
                    }
                }
            }
        }
        Ok(())
    }
}

/// Spec §4.6 `Table::scan`'s iterator: wraps [`RecordFileScanner`],
/// applying the trx hook's visibility predicate and stripping the hidden
/// field before yielding.
pub struct TableScanner<'a> {
    inner: RecordFileScanner<'a>,
    viewer: TrxId,
}

impl<'a> Iterator for TableScanner<'a> {
    type Item = (Rid, Vec<u8>);

    fn next(&mut self) -> Option<Self::Item> {
        for (rid, data) in self.inner.by_ref() {
            let hidden = i32::from_be_bytes(data[..HIDDEN_FIELD_LEN].try_into().unwrap());
            if txn::is_visible(hidden, self.viewer) {
                return Some((rid, data[HIDDEN_FIELD_LEN..].to_vec()));
            }
        }
        None
    }
}

/// Spec §4.6 `Table::index_scan`'s iterator: wraps [`BplusTreeScanner`],
/// fetching and visibility-filtering each matched RID's record.
pub struct TableIndexScanner<'b, 'a> {
    inner: BplusTreeScanner<'a>,
    records: &'b RecordFileHandler<'a>,
    viewer: TrxId,
}

impl<'b, 'a> Iterator for TableIndexScanner<'b, 'a> {
    type Item = (Rid, Vec<u8>);

    fn next(&mut self) -> Option<Self::Item> {
        for rid in self.inner.by_ref() {
            let Ok(data) = self.records.get(rid) else {
                continue;
            };
            let hidden = i32::from_be_bytes(data[..HIDDEN_FIELD_LEN].try_into().unwrap());
            if txn::is_visible(hidden, self.viewer) {
                return Some((rid, data[HIDDEN_FIELD_LEN..].to_vec()));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer_pool::BufferPoolManager;
    use crate::txn::TrxIdAllocator;
    use uuid::Uuid;

    fn temp_dir() -> PathBuf {
        PathBuf::from(format!("data/test/table_{}", Uuid::new_v4()))
    }

    fn user_fields() -> Vec<(String, FieldType, usize)> {
        vec![
            ("id".to_string(), FieldType::Ints, 4),
            ("name".to_string(), FieldType::Chars, 16),
        ]
    }

    fn row(id: i32, name: &[u8; 16]) -> Vec<u8> {
        let mut out = Vec::with_capacity(20);
        out.extend_from_slice(&id.to_be_bytes());
        out.extend_from_slice(name);
        out
    }

    #[test]
    fn insert_then_commit_is_visible_to_everyone() {
        let bpm = BufferPoolManager::new(32);
        let dir = temp_dir();
        let allocator = TrxIdAllocator::new();
        let table = Table::create(&bpm, &dir, 1, "people", &user_fields(), &["id".to_string()]).unwrap();

        let mut trx = Trx::begin(&allocator);
        let rid = table.insert(&mut trx, &row(7, b"alice\0\0\0\0\0\0\0\0\0\0\0")).unwrap();
        table.commit(&trx).unwrap();

        let visible = table.get(999, rid).unwrap();
        assert!(visible.is_some());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn uncommitted_insert_is_only_visible_to_its_own_transaction() {
        let bpm = BufferPoolManager::new(32);
        let dir = temp_dir();
        let allocator = TrxIdAllocator::new();
        let table = Table::create(&bpm, &dir, 1, "people", &user_fields(), &[]).unwrap();

        let mut trx = Trx::begin(&allocator);
        let rid = table.insert(&mut trx, &row(1, b"bob\0\0\0\0\0\0\0\0\0\0\0\0\0")).unwrap();

        assert!(table.get(trx.id(), rid).unwrap().is_some());
        assert!(table.get(trx.id() + 1, rid).unwrap().is_none());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn rollback_of_insert_removes_the_row() {
        let bpm = BufferPoolManager::new(32);
        let dir = temp_dir();
        let allocator = TrxIdAllocator::new();
        let table = Table::create(&bpm, &dir, 1, "people", &user_fields(), &["id".to_string()]).unwrap();

        let mut trx = Trx::begin(&allocator);
        let rid = table.insert(&mut trx, &row(3, b"carl\0\0\0\0\0\0\0\0\0\0\0\0")).unwrap();
        table.rollback(&trx).unwrap();

        assert!(table.get(trx.id(), rid).is_err());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn delete_then_commit_physically_removes_row() {
        let bpm = BufferPoolManager::new(32);
        let dir = temp_dir();
        let allocator = TrxIdAllocator::new();
        let table = Table::create(&bpm, &dir, 1, "people", &user_fields(), &["id".to_string()]).unwrap();

        let mut insert_trx = Trx::begin(&allocator);
        let rid = table
            .insert(&mut insert_trx, &row(9, b"dana\0\0\0\0\0\0\0\0\0\0\0\0"))
            .unwrap();
        table.commit(&insert_trx).unwrap();

        let mut delete_trx = Trx::begin(&allocator);
        assert!(table.get(999, rid).unwrap().is_some());
        table.delete(&mut delete_trx, rid).unwrap();
        // Uncommitted delete: still visible to everyone else (spec §4.5).
        assert!(table.get(999, rid).unwrap().is_some());
        // But invisible to the deleting transaction itself.
        assert!(table.get(delete_trx.id(), rid).unwrap().is_none());

        table.commit(&delete_trx).unwrap();
        assert!(table.get(999, rid).is_err());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn scan_and_index_scan_agree_on_visible_rows() {
        let bpm = BufferPoolManager::new(32);
        let dir = temp_dir();
        let allocator = TrxIdAllocator::new();
        let table = Table::create(&bpm, &dir, 1, "people", &user_fields(), &["id".to_string()]).unwrap();

        let mut trx = Trx::begin(&allocator);
        for i in 0..10i32 {
            table
                .insert(&mut trx, &row(i, b"x\0\0\0\0\0\0\0\0\0\0\0\0\0\0\0"))
                .unwrap();
        }
        table.commit(&trx).unwrap();

        let scanned: Vec<_> = table.scan(999).collect();
        assert_eq!(scanned.len(), 10);

        let key = 5i32.to_be_bytes();
        let scanned_by_index: Vec<_> = table
            .index_scan(999, "idx_people_id", Some(&key), true, Some(&key), true)
            .unwrap()
            .collect();
        assert_eq!(scanned_by_index.len(), 1);
        assert_eq!(&scanned_by_index[0].1[0..4], &5i32.to_be_bytes());

        let _ = fs::remove_dir_all(&dir);
    }

    /// `HIDDEN_FIELD_LEN (4) + 4 + 3 = 11`, not a multiple of 8: regression
    /// test for the unaligned/aligned record-width confusion between
    /// `insert`, `get`, and `update`.
    #[test]
    fn unaligned_record_width_round_trips_without_leaking_padding() {
        let bpm = BufferPoolManager::new(32);
        let dir = temp_dir();
        let allocator = TrxIdAllocator::new();
        let fields = vec![("id".to_string(), FieldType::Ints, 4), ("tag".to_string(), FieldType::Chars, 3)];
        let table = Table::create(&bpm, &dir, 1, "odd", &fields, &[]).unwrap();

        let mut trx = Trx::begin(&allocator);
        let mut data = Vec::with_capacity(7);
        data.extend_from_slice(&1i32.to_be_bytes());
        data.extend_from_slice(b"abc");
        let rid = table.insert(&mut trx, &data).unwrap();
        table.commit(&trx).unwrap();

        let fetched = table.get(999, rid).unwrap().unwrap();
        assert_eq!(fetched, data);

        let mut updated = Vec::with_capacity(7);
        updated.extend_from_slice(&2i32.to_be_bytes());
        updated.extend_from_slice(b"xyz");
        table.update(rid, &updated).unwrap();
        assert_eq!(table.get(999, rid).unwrap().unwrap(), updated);

        let _ = fs::remove_dir_all(&dir);
    }
}
