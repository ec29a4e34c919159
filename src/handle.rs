//! Ownership handles for runtime references.
//!
//! A raw [`ObjectRef`] carries no ownership. These handles do:
//!
//! - [`UniqueRef`] exclusively owns one reference and releases it on drop
//! - [`SharedRef`] is a cloneable owner of one `UniqueRef`; the reference is
//!   released once, when the last clone is dropped
//!
//! Cloning a `SharedRef` never touches the runtime's reference count.

use std::fmt;
use std::rc::Rc;

use dynwrap_core::{ObjectKind, ObjectRef, Runtime};
use tracing::trace;

/// Exclusive owner of one runtime reference.
pub struct UniqueRef {
    rt: Runtime,
    ptr: ObjectRef,
    owned: bool,
}

impl UniqueRef {
    /// Claim an already-owned reference without incrementing it.
    pub fn from_owned(rt: &Runtime, ptr: ObjectRef) -> Self {
        trace!(target: "dynwrap::handle", object = %ptr, "claimed");
        Self {
            rt: rt.clone(),
            ptr,
            owned: true,
        }
    }

    /// Take a new reference to a borrowed value.
    pub fn from_borrowed(rt: &Runtime, ptr: ObjectRef) -> Self {
        rt.incref(ptr);
        trace!(target: "dynwrap::handle", object = %ptr, "acquired");
        Self {
            rt: rt.clone(),
            ptr,
            owned: true,
        }
    }

    /// The raw reference, still owned by this handle.
    pub fn as_ptr(&self) -> ObjectRef {
        self.ptr
    }

    pub fn runtime(&self) -> &Runtime {
        &self.rt
    }

    /// Give up ownership; the caller must release the returned reference
    /// (or hand it to a primitive that steals it).
    pub fn into_raw(mut self) -> ObjectRef {
        self.owned = false;
        self.ptr
    }

    pub fn into_shared(self) -> SharedRef {
        SharedRef::from(self)
    }

    pub fn kind(&self) -> Option<ObjectKind> {
        self.rt.kind(self.ptr)
    }

    /// The runtime's reference count of the value.
    pub fn ref_count(&self) -> Option<u32> {
        self.rt.ref_count(self.ptr)
    }
}

impl Drop for UniqueRef {
    fn drop(&mut self) {
        if self.owned {
            trace!(target: "dynwrap::handle", object = %self.ptr, "released");
            self.rt.release(self.ptr);
        }
    }
}

impl fmt::Debug for UniqueRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UniqueRef")
            .field("ptr", &self.ptr)
            .field("owned", &self.owned)
            .finish()
    }
}

/// Shared owner of one runtime reference.
#[derive(Clone)]
pub struct SharedRef {
    inner: Rc<UniqueRef>,
}

impl SharedRef {
    pub fn as_ptr(&self) -> ObjectRef {
        self.inner.as_ptr()
    }

    pub fn runtime(&self) -> &Runtime {
        self.inner.runtime()
    }

    /// Number of native-side owners sharing this reference.
    pub fn holders(&self) -> usize {
        Rc::strong_count(&self.inner)
    }

    pub fn ptr_eq(&self, other: &SharedRef) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl From<UniqueRef> for SharedRef {
    fn from(unique: UniqueRef) -> Self {
        Self {
            inner: Rc::new(unique),
        }
    }
}

impl fmt::Debug for SharedRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedRef")
            .field("ptr", &self.as_ptr())
            .field("holders", &self.holders())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_owned_does_not_increment() {
        let rt = Runtime::new();
        let raw = rt.new_int(1);
        let handle = UniqueRef::from_owned(&rt, raw);

        assert_eq!(handle.ref_count(), Some(1));
        drop(handle);
        assert_eq!(rt.ref_count(raw), None);
    }

    #[test]
    fn from_borrowed_increments() {
        let rt = Runtime::new();
        let raw = rt.new_int(1);
        let handle = UniqueRef::from_borrowed(&rt, raw);

        assert_eq!(handle.ref_count(), Some(2));
        drop(handle);
        assert_eq!(rt.ref_count(raw), Some(1));
        rt.release(raw);
    }

    #[test]
    fn into_raw_transfers_ownership() {
        let rt = Runtime::new();
        let handle = UniqueRef::from_owned(&rt, rt.new_str("x"));
        let raw = handle.into_raw();

        assert_eq!(rt.ref_count(raw), Some(1));
        rt.release(raw);
        assert_eq!(rt.kind(raw), None);
    }

    #[test]
    fn shared_clones_release_once() {
        let rt = Runtime::new();
        let baseline = rt.live_objects();
        let shared = UniqueRef::from_owned(&rt, rt.new_str("x")).into_shared();
        let raw = shared.as_ptr();

        let copies: Vec<_> = (0..5).map(|_| shared.clone()).collect();
        assert_eq!(shared.holders(), 6);
        assert_eq!(rt.ref_count(raw), Some(1));
        assert!(copies[0].ptr_eq(&shared));

        drop(copies);
        assert_eq!(shared.holders(), 1);
        assert_eq!(rt.ref_count(raw), Some(1));

        drop(shared);
        assert_eq!(rt.live_objects(), baseline);
    }

    #[test]
    fn none_handles_do_not_free_the_singleton() {
        let rt = Runtime::new();
        let none = rt.new_none();
        drop(UniqueRef::from_owned(&rt, none));
        drop(UniqueRef::from_borrowed(&rt, none));
        assert!(rt.is_none(none));
    }
}
