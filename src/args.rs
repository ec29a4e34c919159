//! Call-argument builder.
//!
//! [`Args`] collects positional arguments of mixed origin and turns them
//! into one runtime tuple in a single pass:
//!
//! - [`Arg::Owned`] moves an owned reference straight into its slot
//! - [`Arg::Shared`] takes a new reference to an existing [`Object`]
//! - [`Arg::Value`] allocates a native value first
//!
//! # Example
//!
//! ```ignore
//! let args = Args::new()
//!     .with(Arg::value(3))
//!     .with(Arg::shared(&config))
//!     .with(Arg::value("label"));
//! module.call_function("render", args)?;
//!
//! // Plain tuples of native values work too
//! module.call_function("add", (1, 2))?;
//! ```

use std::fmt;

use dynwrap_core::{ObjectRef, Runtime};

use crate::allocate::{Allocatable, fault_on};
use crate::handle::UniqueRef;
use crate::object::Object;

/// One positional argument.
pub enum Arg<'a> {
    /// An owned runtime reference, moved into the tuple.
    Owned(UniqueRef),
    /// An existing object; unbound objects are passed as `None`.
    Shared(Object),
    /// A native value, allocated when the tuple is built.
    Value(Box<dyn Allocatable + 'a>),
}

impl<'a> Arg<'a> {
    pub fn owned(handle: UniqueRef) -> Self {
        Arg::Owned(handle)
    }

    pub fn shared(object: &Object) -> Self {
        Arg::Shared(object.clone())
    }

    pub fn value<T: Allocatable + 'a>(value: T) -> Self {
        Arg::Value(Box::new(value))
    }

    /// Produce the owned reference that goes into the tuple slot.
    fn into_raw(self, rt: &Runtime) -> ObjectRef {
        match self {
            Arg::Owned(handle) => {
                if !handle.runtime().ptr_eq(rt) {
                    fault_on(rt, "moving a reference into another runtime");
                }
                handle.into_raw()
            }
            Arg::Shared(object) => object.new_ref_in(rt),
            Arg::Value(value) => value.allocate(rt).into_raw(),
        }
    }
}

impl From<UniqueRef> for Arg<'_> {
    fn from(handle: UniqueRef) -> Self {
        Arg::Owned(handle)
    }
}

impl From<Object> for Arg<'_> {
    fn from(object: Object) -> Self {
        Arg::Shared(object)
    }
}

impl fmt::Debug for Arg<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arg::Owned(handle) => f.debug_tuple("Owned").field(handle).finish(),
            Arg::Shared(object) => f.debug_tuple("Shared").field(object).finish(),
            Arg::Value(_) => f.write_str("Value(..)"),
        }
    }
}

/// Ordered positional arguments.
#[derive(Debug, Default)]
pub struct Args<'a> {
    items: Vec<Arg<'a>>,
}

impl<'a> Args<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, arg: Arg<'a>) {
        self.items.push(arg);
    }

    /// Builder form of [`push`](Self::push).
    pub fn with(mut self, arg: Arg<'a>) -> Self {
        self.items.push(arg);
        self
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Build the argument tuple. Returns an owned tuple of exactly
    /// `self.len()` elements, in insertion order.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn build(self, rt: &Runtime) -> UniqueRef {
        let tuple = UniqueRef::from_owned(rt, rt.tuple_new(self.items.len()));
        for (index, arg) in self.items.into_iter().enumerate() {
            let item = arg.into_raw(rt);
            if !rt.tuple_set_item(tuple.as_ptr(), index, item) {
                fault_on(rt, "argument tuple assignment");
            }
        }
        tuple
    }
}

impl<'a> From<Vec<Arg<'a>>> for Args<'a> {
    fn from(items: Vec<Arg<'a>>) -> Self {
        Self { items }
    }
}

impl<'a> FromIterator<Arg<'a>> for Args<'a> {
    fn from_iter<I: IntoIterator<Item = Arg<'a>>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

/// Anything usable as the positional arguments of a call.
pub trait IntoArgs<'a> {
    fn into_args(self) -> Args<'a>;
}

impl<'a> IntoArgs<'a> for Args<'a> {
    fn into_args(self) -> Args<'a> {
        self
    }
}

impl<'a> IntoArgs<'a> for Vec<Arg<'a>> {
    fn into_args(self) -> Args<'a> {
        Args::from(self)
    }
}

impl<'a> IntoArgs<'a> for () {
    fn into_args(self) -> Args<'a> {
        Args::new()
    }
}

macro_rules! impl_into_args_tuple {
    ($len:expr; $($name:ident : $idx:tt),+) => {
        impl<'a, $($name: Allocatable + 'a),+> IntoArgs<'a> for ($($name,)+) {
            fn into_args(self) -> Args<'a> {
                let mut args = Args::with_capacity($len);
                $(args.push(Arg::value(self.$idx));)+
                args
            }
        }
    };
}

impl_into_args_tuple!(1; A:0);
impl_into_args_tuple!(2; A:0, B:1);
impl_into_args_tuple!(3; A:0, B:1, C:2);
impl_into_args_tuple!(4; A:0, B:1, C:2, D:3);
impl_into_args_tuple!(5; A:0, B:1, C:2, D:3, E:4);
impl_into_args_tuple!(6; A:0, B:1, C:2, D:3, E:4, F:5);
impl_into_args_tuple!(7; A:0, B:1, C:2, D:3, E:4, F:5, G:6);
impl_into_args_tuple!(8; A:0, B:1, C:2, D:3, E:4, F:5, G:6, H:7);
impl_into_args_tuple!(9; A:0, B:1, C:2, D:3, E:4, F:5, G:6, H:7, I:8);
impl_into_args_tuple!(10; A:0, B:1, C:2, D:3, E:4, F:5, G:6, H:7, I:8, J:9);
impl_into_args_tuple!(11; A:0, B:1, C:2, D:3, E:4, F:5, G:6, H:7, I:8, J:9, K:10);
impl_into_args_tuple!(12; A:0, B:1, C:2, D:3, E:4, F:5, G:6, H:7, I:8, J:9, K:10, L:11);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocate::allocate;
    use dynwrap_core::ObjectKind;

    #[test]
    fn empty_args_build_empty_tuple() {
        let rt = Runtime::new();
        let tuple = ().into_args().build(&rt);
        assert_eq!(tuple.kind(), Some(ObjectKind::Tuple));
        assert_eq!(rt.len(tuple.as_ptr()), Some(0));
    }

    #[test]
    fn mixed_args_keep_order() {
        let rt = Runtime::new();
        let owned = allocate(&rt, "owned");
        let shared = Object::from_value(&rt, &vec![1, 2]);

        let tuple = Args::new()
            .with(Arg::value(7))
            .with(Arg::owned(owned))
            .with(Arg::shared(&shared))
            .with(Arg::value(2.5))
            .build(&rt);

        assert_eq!(rt.repr(tuple.as_ptr()), "(7, 'owned', [1, 2], 2.5)");
    }

    #[test]
    fn owned_args_are_moved_without_increment() {
        let rt = Runtime::new();
        let owned = allocate(&rt, "x");
        let raw = owned.as_ptr();

        let tuple = Args::new().with(Arg::owned(owned)).build(&rt);
        assert_eq!(rt.ref_count(raw), Some(1));
        drop(tuple);
        assert_eq!(rt.kind(raw), None);
    }

    #[test]
    fn shared_args_are_incremented() {
        let rt = Runtime::new();
        let shared = Object::from_value(&rt, "x");

        let tuple = Args::new().with(Arg::shared(&shared)).build(&rt);
        assert_eq!(shared.ref_count(), Some(2));
        drop(tuple);
        assert_eq!(shared.ref_count(), Some(1));
    }

    #[test]
    fn unbound_shared_arg_becomes_none() {
        let rt = Runtime::new();
        let tuple = Args::new().with(Arg::shared(&Object::default())).build(&rt);
        assert_eq!(rt.repr(tuple.as_ptr()), "(None,)");
    }

    #[test]
    fn native_tuples_are_args() {
        let rt = Runtime::new();
        let tuple = (1, "a", true, ()).into_args().build(&rt);
        assert_eq!(rt.repr(tuple.as_ptr()), "(1, 'a', True, None)");
    }

    #[test]
    fn vec_of_args() {
        let rt = Runtime::new();
        let args: Vec<Arg<'_>> = vec![Arg::value(1), Arg::value("two")];
        assert_eq!(args.into_args().len(), 2);

        let collected: Args<'_> = (0..3).map(Arg::value).collect();
        let tuple = collected.build(&rt);
        assert_eq!(rt.repr(tuple.as_ptr()), "(0, 1, 2)");
    }

    #[test]
    fn borrowed_values_can_be_args() {
        let rt = Runtime::new();
        let names = vec!["a".to_string(), "b".to_string()];
        let tuple = (&names,).into_args().build(&rt);
        assert_eq!(rt.repr(tuple.as_ptr()), "(['a', 'b'],)");
    }
}
