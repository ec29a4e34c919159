//! Typed helpers for native callables.
//!
//! [`CallContextExt`] lets a native function read its arguments through the
//! conversion registry and build its return value through the allocation
//! registry. [`Object::function`] exposes a Rust closure as a runtime
//! callable.
//!
//! # Example
//!
//! ```ignore
//! use dynwrap::{CallContextExt, Object, Runtime};
//!
//! let rt = Runtime::new();
//! let greet = Object::function(&rt, "greet", |ctx| {
//!     let name: String = ctx.arg_as(0)?;
//!     ctx.ret(&format!("hello {name}"))
//! });
//! let reply = greet.call(("world",))?;
//! ```

use std::any::type_name;

use dynwrap_core::{CallContext, NativeError, NativeFn, ObjectRef, Runtime};

use crate::allocate::Allocatable;
use crate::convert::Convertible;
use crate::object::Object;

/// Marshalling-aware access to a native call's arguments.
pub trait CallContextExt {
    /// Convert argument `index` to `T`.
    fn arg_as<T: Convertible>(&self, index: usize) -> Result<T, NativeError>;

    /// Argument `index` as a bound [`Object`] holding a new reference.
    fn arg_object(&self, index: usize) -> Result<Object, NativeError>;

    /// Allocate `value` as the call's return value.
    fn ret<T: Allocatable + ?Sized>(&self, value: &T) -> Result<ObjectRef, NativeError>;
}

impl CallContextExt for CallContext<'_> {
    fn arg_as<T: Convertible>(&self, index: usize) -> Result<T, NativeError> {
        let obj = self.arg(index)?;
        let rt = self.runtime();
        T::convert_from(rt, obj).ok_or_else(|| NativeError::ArgumentType {
            index,
            expected: type_name::<T>(),
            actual: rt.kind(obj).map_or("<released>", |k| k.name()),
        })
    }

    fn arg_object(&self, index: usize) -> Result<Object, NativeError> {
        let obj = self.arg(index)?;
        Ok(Object::from_borrowed(self.runtime(), obj))
    }

    fn ret<T: Allocatable + ?Sized>(&self, value: &T) -> Result<ObjectRef, NativeError> {
        Ok(value.allocate(self.runtime()).into_raw())
    }
}

impl Object {
    /// Expose `f` as a runtime callable named `name`.
    pub fn function<F>(rt: &Runtime, name: &str, f: F) -> Object
    where
        F: Fn(&mut CallContext<'_>) -> Result<ObjectRef, NativeError> + 'static,
    {
        Object::from_owned(rt, rt.new_function(NativeFn::new(name, f)))
    }
}
