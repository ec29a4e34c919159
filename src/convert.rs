//! Conversion registry: runtime value to native value.
//!
//! [`Convertible`] is implemented for every supported native type. A
//! conversion reads through borrowed references and never changes a
//! reference count.
//!
//! ## Matching rules
//!
//! - Integers accept only an `int` within the target's range (no coercion
//!   from `float` or `bool`)
//! - `f32`/`f64` accept only a `float`
//! - `bool` accepts only a `bool`
//! - `String` accepts a `str`; `char` a `str` of exactly one character
//! - [`ByteBuf`] accepts only `bytes`
//! - `()` accepts `None`; `Option<T>` maps `None` to `None`
//! - Tuples accept a `tuple` of exactly the same arity
//! - `Vec`/`VecDeque`/`LinkedList` accept a `list`
//! - `HashMap`/`BTreeMap` accept a `dict`
//!
//! Composite conversions stop at the first failing element and build into a
//! temporary, so a failed [`convert`] leaves its output untouched.

use std::collections::{BTreeMap, HashMap, LinkedList, VecDeque};
use std::hash::{BuildHasher, Hash};

use dynwrap_core::{ObjectRef, Runtime};
use tracing::trace;

use crate::bytes::ByteBuf;

/// A native type that can be read out of a runtime value.
pub trait Convertible: Sized {
    /// Read `obj` (a borrowed reference) as `Self`.
    ///
    /// Returns `None` if the value's kind or content does not match.
    fn convert_from(rt: &Runtime, obj: ObjectRef) -> Option<Self>;
}

/// Convert `obj` into `out`.
///
/// Returns `true` and overwrites `out` on success. On failure returns
/// `false` and `out` keeps its previous value.
pub fn convert<T: Convertible>(rt: &Runtime, obj: ObjectRef, out: &mut T) -> bool {
    match T::convert_from(rt, obj) {
        Some(value) => {
            *out = value;
            true
        }
        None => {
            trace!(
                target: "dynwrap::convert",
                object = %obj,
                target_type = std::any::type_name::<T>(),
                "conversion mismatch"
            );
            false
        }
    }
}

// ============================================================================
// Scalars
// ============================================================================

macro_rules! impl_convertible_int {
    ($($ty:ty),*) => {
        $(
            impl Convertible for $ty {
                fn convert_from(rt: &Runtime, obj: ObjectRef) -> Option<Self> {
                    rt.as_int(obj).and_then(|v| <$ty>::try_from(v).ok())
                }
            }
        )*
    };
}

impl_convertible_int!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

impl Convertible for f64 {
    fn convert_from(rt: &Runtime, obj: ObjectRef) -> Option<Self> {
        rt.as_float(obj)
    }
}

impl Convertible for f32 {
    fn convert_from(rt: &Runtime, obj: ObjectRef) -> Option<Self> {
        let v = rt.as_float(obj)?;
        // Finite values outside f32's range do not fit
        if v.is_finite() && (v > f32::MAX as f64 || v < f32::MIN as f64) {
            return None;
        }
        Some(v as f32)
    }
}

impl Convertible for bool {
    fn convert_from(rt: &Runtime, obj: ObjectRef) -> Option<Self> {
        rt.as_bool(obj)
    }
}

impl Convertible for String {
    fn convert_from(rt: &Runtime, obj: ObjectRef) -> Option<Self> {
        rt.as_str(obj)
    }
}

impl Convertible for char {
    fn convert_from(rt: &Runtime, obj: ObjectRef) -> Option<Self> {
        rt.with_interpreter(|interp| {
            let mut chars = interp.as_str(obj)?.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Some(c),
                _ => None,
            }
        })
    }
}

impl Convertible for ByteBuf {
    fn convert_from(rt: &Runtime, obj: ObjectRef) -> Option<Self> {
        rt.as_bytes(obj).map(ByteBuf::from)
    }
}

impl Convertible for () {
    fn convert_from(rt: &Runtime, obj: ObjectRef) -> Option<Self> {
        rt.is_none(obj).then_some(())
    }
}

impl<T: Convertible> Convertible for Option<T> {
    fn convert_from(rt: &Runtime, obj: ObjectRef) -> Option<Self> {
        if rt.is_none(obj) {
            Some(None)
        } else {
            T::convert_from(rt, obj).map(Some)
        }
    }
}

// ============================================================================
// Ordered sequences
// ============================================================================

fn convert_list<T, C>(rt: &Runtime, obj: ObjectRef) -> Option<C>
where
    T: Convertible,
    C: FromIterator<T>,
{
    rt.list_items(obj)?
        .into_iter()
        .map(|item| T::convert_from(rt, item))
        .collect()
}

impl<T: Convertible> Convertible for Vec<T> {
    fn convert_from(rt: &Runtime, obj: ObjectRef) -> Option<Self> {
        convert_list(rt, obj)
    }
}

impl<T: Convertible> Convertible for VecDeque<T> {
    fn convert_from(rt: &Runtime, obj: ObjectRef) -> Option<Self> {
        convert_list(rt, obj)
    }
}

impl<T: Convertible> Convertible for LinkedList<T> {
    fn convert_from(rt: &Runtime, obj: ObjectRef) -> Option<Self> {
        convert_list(rt, obj)
    }
}

// ============================================================================
// Mappings
// ============================================================================

fn convert_dict<K, V, C>(rt: &Runtime, obj: ObjectRef) -> Option<C>
where
    K: Convertible,
    V: Convertible,
    C: FromIterator<(K, V)>,
{
    rt.dict_items(obj)?
        .into_iter()
        .map(|(k, v)| Some((K::convert_from(rt, k)?, V::convert_from(rt, v)?)))
        .collect()
}

impl<K, V, S> Convertible for HashMap<K, V, S>
where
    K: Convertible + Eq + Hash,
    V: Convertible,
    S: BuildHasher + Default,
{
    fn convert_from(rt: &Runtime, obj: ObjectRef) -> Option<Self> {
        convert_dict(rt, obj)
    }
}

impl<K, V> Convertible for BTreeMap<K, V>
where
    K: Convertible + Ord,
    V: Convertible,
{
    fn convert_from(rt: &Runtime, obj: ObjectRef) -> Option<Self> {
        convert_dict(rt, obj)
    }
}

// ============================================================================
// Tuples
// ============================================================================

macro_rules! impl_convertible_tuple {
    ($len:expr; $($name:ident : $idx:tt),+) => {
        impl<$($name: Convertible),+> Convertible for ($($name,)+) {
            fn convert_from(rt: &Runtime, obj: ObjectRef) -> Option<Self> {
                let items = rt.tuple_items(obj)?;
                if items.len() != $len {
                    return None;
                }
                Some(($($name::convert_from(rt, items[$idx])?,)+))
            }
        }
    };
}

impl_convertible_tuple!(1; A:0);
impl_convertible_tuple!(2; A:0, B:1);
impl_convertible_tuple!(3; A:0, B:1, C:2);
impl_convertible_tuple!(4; A:0, B:1, C:2, D:3);
impl_convertible_tuple!(5; A:0, B:1, C:2, D:3, E:4);
impl_convertible_tuple!(6; A:0, B:1, C:2, D:3, E:4, F:5);
impl_convertible_tuple!(7; A:0, B:1, C:2, D:3, E:4, F:5, G:6);
impl_convertible_tuple!(8; A:0, B:1, C:2, D:3, E:4, F:5, G:6, H:7);
impl_convertible_tuple!(9; A:0, B:1, C:2, D:3, E:4, F:5, G:6, H:7, I:8);
impl_convertible_tuple!(10; A:0, B:1, C:2, D:3, E:4, F:5, G:6, H:7, I:8, J:9);
impl_convertible_tuple!(11; A:0, B:1, C:2, D:3, E:4, F:5, G:6, H:7, I:8, J:9, K:10);
impl_convertible_tuple!(12; A:0, B:1, C:2, D:3, E:4, F:5, G:6, H:7, I:8, J:9, K:10, L:11);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::UniqueRef;

    fn owned(rt: &Runtime, raw: ObjectRef) -> UniqueRef {
        UniqueRef::from_owned(rt, raw)
    }

    #[test]
    fn integers_are_range_checked() {
        let rt = Runtime::new();
        let big = owned(&rt, rt.new_int(300));
        let neg = owned(&rt, rt.new_int(-1));

        let mut small: u8 = 7;
        assert!(!convert(&rt, big.as_ptr(), &mut small));
        assert_eq!(small, 7);
        assert!(!convert(&rt, neg.as_ptr(), &mut small));

        let mut wide: i32 = 0;
        assert!(convert(&rt, big.as_ptr(), &mut wide));
        assert_eq!(wide, 300);
    }

    #[test]
    fn u64_max_survives() {
        let rt = Runtime::new();
        let obj = owned(&rt, rt.new_int(u64::MAX.into()));
        assert_eq!(u64::convert_from(&rt, obj.as_ptr()), Some(u64::MAX));
        assert_eq!(i64::convert_from(&rt, obj.as_ptr()), None);
    }

    #[test]
    fn no_coercion_between_kinds() {
        let rt = Runtime::new();
        let int = owned(&rt, rt.new_int(1));
        let float = owned(&rt, rt.new_float(1.0));
        let flag = owned(&rt, rt.new_bool(true));

        assert_eq!(f64::convert_from(&rt, int.as_ptr()), None);
        assert_eq!(i32::convert_from(&rt, float.as_ptr()), None);
        assert_eq!(i32::convert_from(&rt, flag.as_ptr()), None);
        assert_eq!(bool::convert_from(&rt, int.as_ptr()), None);
        assert_eq!(bool::convert_from(&rt, flag.as_ptr()), Some(true));
    }

    #[test]
    fn f32_rejects_out_of_range() {
        let rt = Runtime::new();
        let huge = owned(&rt, rt.new_float(1e300));
        let inf = owned(&rt, rt.new_float(f64::INFINITY));

        assert_eq!(f32::convert_from(&rt, huge.as_ptr()), None);
        assert_eq!(f32::convert_from(&rt, inf.as_ptr()), Some(f32::INFINITY));
    }

    #[test]
    fn strings_and_chars() {
        let rt = Runtime::new();
        let s = owned(&rt, rt.new_str("é"));
        let long = owned(&rt, rt.new_str("ab"));

        assert_eq!(String::convert_from(&rt, s.as_ptr()).as_deref(), Some("é"));
        assert_eq!(char::convert_from(&rt, s.as_ptr()), Some('é'));
        assert_eq!(char::convert_from(&rt, long.as_ptr()), None);
    }

    #[test]
    fn bytes_are_distinct_from_lists() {
        let rt = Runtime::new();
        let b = owned(&rt, rt.new_bytes(b"\0\x01"));

        assert_eq!(
            ByteBuf::convert_from(&rt, b.as_ptr()),
            Some(ByteBuf::from(b"\0\x01"))
        );
        assert_eq!(Vec::<u8>::convert_from(&rt, b.as_ptr()), None);
    }

    #[test]
    fn none_converts_to_unit_and_option() {
        let rt = Runtime::new();
        let none = owned(&rt, rt.new_none());
        let one = owned(&rt, rt.new_int(1));

        assert_eq!(<()>::convert_from(&rt, none.as_ptr()), Some(()));
        assert_eq!(<()>::convert_from(&rt, one.as_ptr()), None);
        assert_eq!(Option::<i32>::convert_from(&rt, none.as_ptr()), Some(None));
        assert_eq!(Option::<i32>::convert_from(&rt, one.as_ptr()), Some(Some(1)));
    }

    #[test]
    fn tuple_requires_exact_arity() {
        let rt = Runtime::new();
        let tuple = owned(&rt, rt.tuple_new(2));
        rt.tuple_set_item(tuple.as_ptr(), 0, rt.new_int(1));
        rt.tuple_set_item(tuple.as_ptr(), 1, rt.new_str("a"));

        assert_eq!(
            <(i32, String)>::convert_from(&rt, tuple.as_ptr()),
            Some((1, "a".to_string()))
        );
        assert_eq!(<(i32,)>::convert_from(&rt, tuple.as_ptr()), None);
        assert_eq!(<(i32, String, i32)>::convert_from(&rt, tuple.as_ptr()), None);
        assert_eq!(<(String, i32)>::convert_from(&rt, tuple.as_ptr()), None);
    }

    #[test]
    fn lists_are_not_tuples() {
        let rt = Runtime::new();
        let list = owned(&rt, rt.list_new(1));
        rt.list_set_item(list.as_ptr(), 0, rt.new_int(1));

        assert_eq!(<(i32,)>::convert_from(&rt, list.as_ptr()), None);
        assert_eq!(Vec::<i32>::convert_from(&rt, list.as_ptr()), Some(vec![1]));
    }

    #[test]
    fn failed_sequence_leaves_output_untouched() {
        let rt = Runtime::new();
        let list = owned(&rt, rt.list_new(3));
        rt.list_set_item(list.as_ptr(), 0, rt.new_int(1));
        rt.list_set_item(list.as_ptr(), 1, rt.new_str("two"));
        rt.list_set_item(list.as_ptr(), 2, rt.new_int(3));

        let mut out = vec![9, 9];
        assert!(!convert(&rt, list.as_ptr(), &mut out));
        assert_eq!(out, vec![9, 9]);

        let mut strings: VecDeque<String> = VecDeque::new();
        assert!(!convert(&rt, list.as_ptr(), &mut strings));
        assert!(strings.is_empty());
    }

    #[test]
    fn dict_converts_to_maps() {
        let rt = Runtime::new();
        let dict = owned(&rt, rt.dict_new());
        for (k, v) in [("a", 1), ("b", 2)] {
            let key = owned(&rt, rt.new_str(k));
            let value = owned(&rt, rt.new_int(v));
            rt.dict_set_item(dict.as_ptr(), key.as_ptr(), value.as_ptr());
        }

        let map = HashMap::<String, i64>::convert_from(&rt, dict.as_ptr()).unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map["b"], 2);

        let tree = BTreeMap::<String, i64>::convert_from(&rt, dict.as_ptr()).unwrap();
        assert_eq!(tree.keys().collect::<Vec<_>>(), ["a", "b"]);

        assert_eq!(HashMap::<String, String>::convert_from(&rt, dict.as_ptr()), None);
        assert_eq!(HashMap::<i64, i64>::convert_from(&rt, dict.as_ptr()), None);
    }

    #[test]
    fn conversion_does_not_touch_reference_counts() {
        let rt = Runtime::new();
        let list = owned(&rt, rt.list_new(1));
        let item = rt.new_str("x");
        rt.incref(item);
        rt.list_set_item(list.as_ptr(), 0, item);

        let before = (list.ref_count(), rt.ref_count(item));
        let _ = Vec::<String>::convert_from(&rt, list.as_ptr());
        let _ = Vec::<i32>::convert_from(&rt, list.as_ptr());
        assert_eq!(before, (list.ref_count(), rt.ref_count(item)));
        rt.release(item);
    }
}
