//! Allocation registry: native value to runtime value.
//!
//! [`Allocatable`] produces a freshly owned reference wrapped in a
//! [`UniqueRef`]. Allocation does not fail for well-formed input; a runtime
//! primitive refusing an operation here means the runtime itself is broken,
//! which is treated as a fatal fault (panic).

use std::collections::{BTreeMap, HashMap, LinkedList, VecDeque};

use dynwrap_core::{ObjectRef, Runtime};
use tracing::error;

use crate::bytes::ByteBuf;
use crate::handle::UniqueRef;

/// A native value that can be copied into the runtime.
pub trait Allocatable {
    /// Allocate a new runtime value holding a copy of `self`.
    fn allocate(&self, rt: &Runtime) -> UniqueRef;
}

/// Marker for native values usable as dict keys.
///
/// Only values that allocate to hashable runtime values implement it, so an
/// unhashable key is rejected at compile time.
pub trait KeyAllocatable: Allocatable {}

/// Allocate a runtime value for `value`.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn allocate<T: Allocatable + ?Sized>(rt: &Runtime, value: &T) -> UniqueRef {
    value.allocate(rt)
}

/// Allocate a `bytes` value from the first `len` bytes of `bytes`.
///
/// The size comes from the caller, never from the content, so embedded
/// zero bytes are kept. Panics if `len` exceeds the buffer.
pub fn allocate_bytes(rt: &Runtime, bytes: &[u8], len: usize) -> UniqueRef {
    match bytes.get(..len) {
        Some(slice) => UniqueRef::from_owned(rt, rt.new_bytes(slice)),
        None => panic!(
            "byte buffer allocation of {} bytes from a {} byte buffer",
            len,
            bytes.len()
        ),
    }
}

/// Abort on a runtime primitive failure during allocation.
pub(crate) fn fault_on(rt: &Runtime, operation: &str) -> ! {
    let detail = rt
        .err_fetch()
        .map(|e| e.to_string())
        .unwrap_or_else(|| "no exception set".to_string());
    error!(target: "dynwrap::allocate", operation, detail = %detail, "runtime fault");
    panic!("runtime fault during {}: {}", operation, detail);
}

// ============================================================================
// Scalars
// ============================================================================

macro_rules! impl_allocatable_int {
    ($($ty:ty),*) => {
        $(
            impl Allocatable for $ty {
                fn allocate(&self, rt: &Runtime) -> UniqueRef {
                    UniqueRef::from_owned(rt, rt.new_int(i128::from(*self)))
                }
            }

            impl KeyAllocatable for $ty {}
        )*
    };
}

impl_allocatable_int!(i8, i16, i32, i64, u8, u16, u32, u64);

// isize/usize have no `From` into i128; both are at most 64 bits wide
impl Allocatable for isize {
    fn allocate(&self, rt: &Runtime) -> UniqueRef {
        UniqueRef::from_owned(rt, rt.new_int(*self as i128))
    }
}

impl KeyAllocatable for isize {}

impl Allocatable for usize {
    fn allocate(&self, rt: &Runtime) -> UniqueRef {
        UniqueRef::from_owned(rt, rt.new_int(*self as i128))
    }
}

impl KeyAllocatable for usize {}

impl Allocatable for f64 {
    fn allocate(&self, rt: &Runtime) -> UniqueRef {
        UniqueRef::from_owned(rt, rt.new_float(*self))
    }
}

impl Allocatable for f32 {
    fn allocate(&self, rt: &Runtime) -> UniqueRef {
        UniqueRef::from_owned(rt, rt.new_float(f64::from(*self)))
    }
}

impl Allocatable for bool {
    fn allocate(&self, rt: &Runtime) -> UniqueRef {
        UniqueRef::from_owned(rt, rt.new_bool(*self))
    }
}

impl KeyAllocatable for bool {}

impl Allocatable for str {
    fn allocate(&self, rt: &Runtime) -> UniqueRef {
        UniqueRef::from_owned(rt, rt.new_str(self))
    }
}

impl KeyAllocatable for str {}

impl Allocatable for String {
    fn allocate(&self, rt: &Runtime) -> UniqueRef {
        self.as_str().allocate(rt)
    }
}

impl KeyAllocatable for String {}

impl Allocatable for char {
    fn allocate(&self, rt: &Runtime) -> UniqueRef {
        let mut buf = [0u8; 4];
        self.encode_utf8(&mut buf).allocate(rt)
    }
}

impl KeyAllocatable for char {}

impl Allocatable for ByteBuf {
    fn allocate(&self, rt: &Runtime) -> UniqueRef {
        allocate_bytes(rt, self, self.len())
    }
}

impl KeyAllocatable for ByteBuf {}

impl Allocatable for () {
    fn allocate(&self, rt: &Runtime) -> UniqueRef {
        UniqueRef::from_owned(rt, rt.new_none())
    }
}

impl KeyAllocatable for () {}

impl<T: Allocatable> Allocatable for Option<T> {
    fn allocate(&self, rt: &Runtime) -> UniqueRef {
        match self {
            Some(value) => value.allocate(rt),
            None => UniqueRef::from_owned(rt, rt.new_none()),
        }
    }
}

impl<T: KeyAllocatable> KeyAllocatable for Option<T> {}

impl<T: Allocatable + ?Sized> Allocatable for &T {
    fn allocate(&self, rt: &Runtime) -> UniqueRef {
        (**self).allocate(rt)
    }
}

impl<T: KeyAllocatable + ?Sized> KeyAllocatable for &T {}

impl<T: Allocatable + ?Sized> Allocatable for Box<T> {
    fn allocate(&self, rt: &Runtime) -> UniqueRef {
        (**self).allocate(rt)
    }
}

// ============================================================================
// Ordered sequences
// ============================================================================

/// Allocate a list of `len` elements, inserting each at its position.
fn allocate_list<'a, T, I>(rt: &Runtime, len: usize, items: I) -> UniqueRef
where
    T: Allocatable + 'a,
    I: IntoIterator<Item = &'a T>,
{
    let list = UniqueRef::from_owned(rt, rt.list_new(len));
    for (index, item) in items.into_iter().enumerate() {
        let item: ObjectRef = item.allocate(rt).into_raw();
        if !rt.list_set_item(list.as_ptr(), index, item) {
            fault_on(rt, "list item assignment");
        }
    }
    list
}

impl<T: Allocatable> Allocatable for [T] {
    fn allocate(&self, rt: &Runtime) -> UniqueRef {
        allocate_list(rt, self.len(), self)
    }
}

impl<T: Allocatable, const N: usize> Allocatable for [T; N] {
    fn allocate(&self, rt: &Runtime) -> UniqueRef {
        allocate_list(rt, N, self)
    }
}

impl<T: Allocatable> Allocatable for Vec<T> {
    fn allocate(&self, rt: &Runtime) -> UniqueRef {
        allocate_list(rt, self.len(), self)
    }
}

impl<T: Allocatable> Allocatable for VecDeque<T> {
    fn allocate(&self, rt: &Runtime) -> UniqueRef {
        allocate_list(rt, self.len(), self)
    }
}

impl<T: Allocatable> Allocatable for LinkedList<T> {
    fn allocate(&self, rt: &Runtime) -> UniqueRef {
        allocate_list(rt, self.len(), self)
    }
}

// ============================================================================
// Mappings
// ============================================================================

fn allocate_dict<'a, K, V, I>(rt: &Runtime, entries: I) -> UniqueRef
where
    K: KeyAllocatable + 'a,
    V: Allocatable + 'a,
    I: IntoIterator<Item = (&'a K, &'a V)>,
{
    let dict = UniqueRef::from_owned(rt, rt.dict_new());
    for (key, value) in entries {
        let key = key.allocate(rt);
        let value = value.allocate(rt);
        if !rt.dict_set_item(dict.as_ptr(), key.as_ptr(), value.as_ptr()) {
            fault_on(rt, "dict item assignment");
        }
    }
    dict
}

impl<K: KeyAllocatable, V: Allocatable, S> Allocatable for HashMap<K, V, S> {
    fn allocate(&self, rt: &Runtime) -> UniqueRef {
        allocate_dict(rt, self)
    }
}

impl<K: KeyAllocatable, V: Allocatable> Allocatable for BTreeMap<K, V> {
    fn allocate(&self, rt: &Runtime) -> UniqueRef {
        allocate_dict(rt, self)
    }
}

// ============================================================================
// Tuples
// ============================================================================

macro_rules! impl_allocatable_tuple {
    ($len:expr; $($name:ident : $idx:tt),+) => {
        impl<$($name: Allocatable),+> Allocatable for ($($name,)+) {
            fn allocate(&self, rt: &Runtime) -> UniqueRef {
                let tuple = UniqueRef::from_owned(rt, rt.tuple_new($len));
                $(
                    let item = self.$idx.allocate(rt).into_raw();
                    if !rt.tuple_set_item(tuple.as_ptr(), $idx, item) {
                        fault_on(rt, "tuple item assignment");
                    }
                )+
                tuple
            }
        }

        impl<$($name: KeyAllocatable),+> KeyAllocatable for ($($name,)+) {}
    };
}

impl_allocatable_tuple!(1; A:0);
impl_allocatable_tuple!(2; A:0, B:1);
impl_allocatable_tuple!(3; A:0, B:1, C:2);
impl_allocatable_tuple!(4; A:0, B:1, C:2, D:3);
impl_allocatable_tuple!(5; A:0, B:1, C:2, D:3, E:4);
impl_allocatable_tuple!(6; A:0, B:1, C:2, D:3, E:4, F:5);
impl_allocatable_tuple!(7; A:0, B:1, C:2, D:3, E:4, F:5, G:6);
impl_allocatable_tuple!(8; A:0, B:1, C:2, D:3, E:4, F:5, G:6, H:7);
impl_allocatable_tuple!(9; A:0, B:1, C:2, D:3, E:4, F:5, G:6, H:7, I:8);
impl_allocatable_tuple!(10; A:0, B:1, C:2, D:3, E:4, F:5, G:6, H:7, I:8, J:9);
impl_allocatable_tuple!(11; A:0, B:1, C:2, D:3, E:4, F:5, G:6, H:7, I:8, J:9, K:10);
impl_allocatable_tuple!(12; A:0, B:1, C:2, D:3, E:4, F:5, G:6, H:7, I:8, J:9, K:10, L:11);
