//! Dictionary storage with hashable keys.
//!
//! Only `None`, booleans, integers, floats, strings, bytes and tuples of
//! those are valid keys. Lists, dicts, modules and functions are not.

use ordered_float::OrderedFloat;
use rustc_hash::FxHashMap;

use crate::value::ObjectRef;

/// Hashable image of a dictionary key.
///
/// `Bool` and `Int` are distinct keys, as are `Int` and `Float`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DictKey {
    None,
    Bool(bool),
    Int(i128),
    /// Floating point key (uses OrderedFloat for hashing)
    Float(OrderedFloat<f64>),
    Str(String),
    Bytes(Vec<u8>),
    Tuple(Vec<DictKey>),
}

impl DictKey {
    #[inline]
    pub fn int(v: impl Into<i128>) -> Self {
        DictKey::Int(v.into())
    }

    #[inline]
    pub fn float(v: f64) -> Self {
        DictKey::Float(OrderedFloat(v))
    }

    #[inline]
    pub fn str(v: impl Into<String>) -> Self {
        DictKey::Str(v.into())
    }
}

/// Entries of a dictionary value.
///
/// Each entry owns one reference to its key object and one to its value
/// object. Iteration order is unspecified.
#[derive(Debug, Default)]
pub struct Dict {
    entries: FxHashMap<DictKey, (ObjectRef, ObjectRef)>,
}

impl Dict {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert or replace an entry.
    ///
    /// Returns the key and value references of a replaced entry; the caller
    /// owns them and must release them.
    pub fn insert(
        &mut self,
        key: DictKey,
        key_ref: ObjectRef,
        value_ref: ObjectRef,
    ) -> Option<(ObjectRef, ObjectRef)> {
        self.entries.insert(key, (key_ref, value_ref))
    }

    /// Borrowed reference to the value stored under `key`.
    pub fn get(&self, key: &DictKey) -> Option<ObjectRef> {
        self.entries.get(key).map(|(_, v)| *v)
    }

    /// Borrowed `(key, value)` reference pairs.
    pub fn items(&self) -> impl Iterator<Item = (ObjectRef, ObjectRef)> + '_ {
        self.entries.values().copied()
    }

    pub(crate) fn into_refs(self) -> Vec<ObjectRef> {
        self.entries
            .into_values()
            .flat_map(|(k, v)| [k, v])
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_constructors() {
        assert_eq!(DictKey::int(42i64), DictKey::Int(42));
        assert_eq!(DictKey::float(2.5), DictKey::Float(OrderedFloat(2.5)));
        assert_eq!(DictKey::str("hello"), DictKey::Str("hello".into()));
    }

    #[test]
    fn key_hash_equality() {
        use std::collections::HashSet;

        let mut set = HashSet::new();
        set.insert(DictKey::Int(1));
        set.insert(DictKey::Int(2));
        set.insert(DictKey::Int(1));
        set.insert(DictKey::Bool(true));

        assert_eq!(set.len(), 3);
        assert!(set.contains(&DictKey::Int(1)));
    }

    #[test]
    fn float_key_nan_handling() {
        use std::collections::HashSet;

        let mut set = HashSet::new();
        set.insert(DictKey::float(f64::NAN));
        set.insert(DictKey::float(f64::NAN));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn tuple_keys_compare_structurally() {
        let a = DictKey::Tuple(vec![DictKey::Int(1), DictKey::str("a")]);
        let b = DictKey::Tuple(vec![DictKey::Int(1), DictKey::str("a")]);
        assert_eq!(a, b);
    }

    #[test]
    fn insert_replaces_and_returns_old_refs() {
        let mut dict = Dict::new();
        let k1 = ObjectRef::new(1, 0);
        let v1 = ObjectRef::new(2, 0);
        let k2 = ObjectRef::new(3, 0);
        let v2 = ObjectRef::new(4, 0);

        assert!(dict.insert(DictKey::str("a"), k1, v1).is_none());
        assert_eq!(dict.insert(DictKey::str("a"), k2, v2), Some((k1, v1)));
        assert_eq!(dict.len(), 1);
        assert_eq!(dict.get(&DictKey::str("a")), Some(v2));
        assert_eq!(dict.items().collect::<Vec<_>>(), vec![(k2, v2)]);

        let mut refs = dict.into_refs();
        refs.sort_by_key(|r| r.index);
        assert_eq!(refs, vec![k2, v2]);
    }
}
