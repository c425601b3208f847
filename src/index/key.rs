//! Key comparator for composite B+ tree keys (spec §4.4): compare the
//! user-key prefix by attribute type, then break ties with the RID
//! suffix so every composite key is unique even across non-unique
//! indexes.

use std::cmp::Ordering;

use crate::rid::{Rid, RID_BYTES};

/// The closed set of indexable attribute types (spec §6's wire strings
/// `"ints" | "floats" | "chars"`; `"booleans"`/`"dates"` compare as `Int`
/// since both are fixed-width integers on the wire).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrType {
    Int,
    Float,
    Char,
}

/// Epsilon for float user-key comparisons (spec §4.4).
const FLOAT_EPSILON: f64 = 1e-6;

/// Compare two user-key byte slices of equal length by `attr_type`.
pub fn cmp_user_key(a: &[u8], b: &[u8], attr_type: AttrType) -> Ordering {
    match attr_type {
        AttrType::Int => {
            let ia = i32::from_be_bytes(a.try_into().expect("int key is 4 bytes"));
            let ib = i32::from_be_bytes(b.try_into().expect("int key is 4 bytes"));
            ia.cmp(&ib)
        }
        AttrType::Float => {
            let fa = f32::from_be_bytes(a.try_into().expect("float key is 4 bytes")) as f64;
            let fb = f32::from_be_bytes(b.try_into().expect("float key is 4 bytes")) as f64;
            if (fa - fb).abs() < FLOAT_EPSILON {
                Ordering::Equal
            } else {
                fa.partial_cmp(&fb).unwrap_or(Ordering::Equal)
            }
        }
        AttrType::Char => a.cmp(b),
    }
}

/// Compare two composite keys (`user_key ∥ rid`, each `attr_length +
/// RID_BYTES` bytes): user-key prefix first, RID suffix to break ties.
pub fn cmp_composite_key(a: &[u8], b: &[u8], attr_type: AttrType, attr_length: usize) -> Ordering {
    let user_cmp = cmp_user_key(&a[..attr_length], &b[..attr_length], attr_type);
    if user_cmp != Ordering::Equal {
        return user_cmp;
    }
    a[attr_length..].cmp(&b[attr_length..])
}

/// `key_length = attr_length + sizeof(RID)` (spec §3).
pub fn key_length(attr_length: usize) -> usize {
    attr_length + RID_BYTES
}

/// Compose the internal key `user_key ∥ rid` (spec §4.4 step 1).
pub fn compose_key(user_key: &[u8], rid: Rid) -> Vec<u8> {
    let mut out = Vec::with_capacity(user_key.len() + RID_BYTES);
    out.extend_from_slice(user_key);
    out.extend_from_slice(&rid.to_bytes());
    out
}

/// Widen an over-length CHAR scan bound instead of silently truncating it
/// (Open Question, decided in `DESIGN.md`). A caller-supplied bound longer
/// than the indexed column's `attr_length` either matches the stored prefix
/// exactly in its extra bytes (truncation is exact) or doesn't, in which
/// case truncating alone would tie the bound with rows the caller's longer
/// bound meant to exclude, so the bound is pushed outward by one step
/// instead.
pub fn fix_char_bound(bound: &[u8], attr_length: usize, inclusive: bool, is_lower: bool) -> (Vec<u8>, bool) {
    if bound.len() <= attr_length {
        let mut padded = bound.to_vec();
        padded.resize(attr_length, 0);
        return (padded, inclusive);
    }
    let exact = bound[attr_length..].iter().all(|&b| b == 0);
    let mut truncated = bound[..attr_length].to_vec();
    if exact {
        return (truncated, inclusive);
    }
    if is_lower {
        for byte in truncated.iter_mut().rev() {
            if *byte == 0xFF {
                *byte = 0;
                continue;
            }
            *byte += 1;
            break;
        }
        (truncated, true)
    } else {
        (truncated, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_keys_compare_numerically() {
        let a = 5i32.to_be_bytes();
        let b = 10i32.to_be_bytes();
        assert_eq!(cmp_user_key(&a, &b, AttrType::Int), Ordering::Less);
    }

    #[test]
    fn float_keys_within_epsilon_compare_equal() {
        let a = (1.000_000_1f32).to_be_bytes();
        let b = (1.0f32).to_be_bytes();
        assert_eq!(cmp_user_key(&a, &b, AttrType::Float), Ordering::Equal);
    }

    #[test]
    fn composite_key_breaks_ties_with_rid() {
        let k1 = compose_key(&5i32.to_be_bytes(), Rid::new(0, 0));
        let k2 = compose_key(&5i32.to_be_bytes(), Rid::new(0, 1));
        assert_eq!(cmp_composite_key(&k1, &k2, AttrType::Int, 4), Ordering::Less);
    }

    #[test]
    fn char_bound_exact_truncation_is_unchanged() {
        let bound = b"hi\0\0\0\0".to_vec();
        let (fixed, inclusive) = fix_char_bound(&bound, 4, true, true);
        assert_eq!(fixed, b"hi\0\0");
        assert!(inclusive);
    }

    #[test]
    fn char_bound_lossy_lower_truncation_widens_up() {
        let bound = b"hello".to_vec();
        let (fixed, inclusive) = fix_char_bound(&bound, 4, true, true);
        assert_eq!(fixed, b"helm".to_vec());
        assert!(inclusive);
    }

    #[test]
    fn char_bound_lossy_upper_truncation_stays_inclusive() {
        let bound = b"hello".to_vec();
        let (fixed, inclusive) = fix_char_bound(&bound, 4, false, false);
        assert_eq!(fixed, b"hell".to_vec());
        assert!(inclusive);
    }
}
