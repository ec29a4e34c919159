//! Native function storage and the call context handed to native code.

use std::fmt;
use std::rc::Rc;

use crate::Runtime;
use crate::error::NativeError;
use crate::value::{ObjectKind, ObjectRef};

/// Type-erased native function.
///
/// This wraps any callable that implements `NativeCallable`, allowing
/// functions of different signatures to be stored uniformly in the heap.
/// Cloning shares the underlying callable.
#[derive(Clone)]
pub struct NativeFn {
    name: Rc<str>,
    inner: Rc<dyn NativeCallable>,
}

impl NativeFn {
    pub fn new<F>(name: impl AsRef<str>, f: F) -> Self
    where
        F: NativeCallable + 'static,
    {
        Self {
            name: Rc::from(name.as_ref()),
            inner: Rc::new(f),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Call this native function with the given context.
    pub fn call(&self, ctx: &mut CallContext<'_>) -> Result<ObjectRef, NativeError> {
        self.inner.call(ctx)
    }
}

impl fmt::Debug for NativeFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFn")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Trait for callable native functions.
///
/// The callable receives a `CallContext` giving access to the runtime and the
/// positional arguments, and returns a new owned reference to its result.
pub trait NativeCallable {
    fn call(&self, ctx: &mut CallContext<'_>) -> Result<ObjectRef, NativeError>;
}

impl<F> NativeCallable for F
where
    F: Fn(&mut CallContext<'_>) -> Result<ObjectRef, NativeError>,
{
    fn call(&self, ctx: &mut CallContext<'_>) -> Result<ObjectRef, NativeError> {
        (self)(ctx)
    }
}

/// Context for native function calls.
///
/// Arguments are *borrowed* references: they stay alive for the duration of
/// the call because the caller holds the argument tuple. No interpreter
/// borrow is held while native code runs, so the callable may allocate,
/// call back into the runtime, or load scripts.
pub struct CallContext<'rt> {
    runtime: &'rt Runtime,
    name: &'rt str,
    args: &'rt [ObjectRef],
}

impl<'rt> CallContext<'rt> {
    pub fn new(runtime: &'rt Runtime, name: &'rt str, args: &'rt [ObjectRef]) -> Self {
        Self {
            runtime,
            name,
            args,
        }
    }

    /// The runtime the call is executing in.
    pub fn runtime(&self) -> &'rt Runtime {
        self.runtime
    }

    /// Name of the function being called.
    pub fn name(&self) -> &str {
        self.name
    }

    pub fn arg_count(&self) -> usize {
        self.args.len()
    }

    /// All arguments, borrowed.
    pub fn args(&self) -> &[ObjectRef] {
        self.args
    }

    /// Get a borrowed reference to an argument.
    pub fn arg(&self, index: usize) -> Result<ObjectRef, NativeError> {
        self.args
            .get(index)
            .copied()
            .ok_or(NativeError::ArgumentIndexOutOfBounds {
                index,
                count: self.args.len(),
            })
    }

    /// Fail unless exactly `expected` arguments were passed.
    pub fn expect_args(&self, expected: usize) -> Result<(), NativeError> {
        if self.args.len() == expected {
            Ok(())
        } else {
            Err(NativeError::ArgCountMismatch {
                expected,
                got: self.args.len(),
            })
        }
    }

    /// Get an argument, checking its kind.
    pub fn arg_of_kind(&self, index: usize, kind: ObjectKind) -> Result<ObjectRef, NativeError> {
        let obj = self.arg(index)?;
        match self.runtime.kind(obj) {
            Some(actual) if actual == kind => Ok(obj),
            actual => Err(NativeError::ArgumentType {
                index,
                expected: kind.name(),
                actual: actual.map_or("<released>", |k| k.name()),
            }),
        }
    }

    /// Return `None` from the call.
    pub fn none(&self) -> Result<ObjectRef, NativeError> {
        Ok(self.runtime.new_none())
    }
}

impl fmt::Debug for CallContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallContext")
            .field("name", &self.name)
            .field("arg_count", &self.arg_count())
            .finish()
    }
}
