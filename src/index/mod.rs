//! B+ Tree Index (spec §4.4): a disk-resident B+ tree over composite keys
//! `user_key ∥ rid`, letting a non-unique user-key still address an exact
//! row via the RID suffix.

mod btree;
mod key;
mod node;
mod scanner;

pub use btree::BPlusTreeHandler;
pub use key::{cmp_user_key, fix_char_bound, AttrType};
pub use scanner::BplusTreeScanner;
