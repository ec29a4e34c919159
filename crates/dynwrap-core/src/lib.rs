//! Embedded, dynamically typed, reference-counted object runtime.
//!
//! This crate provides the object model that `dynwrap` marshals native
//! values into and out of:
//!
//! - [`ObjectHeap`]: generational arena; the reference count of each slot is
//!   the sole lifetime authority for a value
//! - [`Interpreter`]: object-model primitives plus the error indicator
//! - [`Runtime`]: the shared, re-entrant front used by callers
//! - [`NativeFn`] / [`CallContext`]: native callables exposed to the runtime
//! - [`ScriptLoader`] / [`DefaultLoader`]: how paths become module values
//!
//! Raw [`ObjectRef`]s carry no ownership of their own. Constructors return
//! *owned* references the caller must release exactly once; readers return
//! *borrowed* ones.

pub mod config;
pub mod dict;
pub mod error;
pub mod heap;
pub mod interpreter;
pub mod loader;
pub mod module;
pub mod native_fn;
pub mod runtime;
pub mod value;

pub use config::{PATH_ENV_VAR, RuntimeConfig};
pub use dict::{Dict, DictKey};
pub use error::{Exception, ExceptionKind, LoadError, NativeError};
pub use heap::ObjectHeap;
pub use interpreter::Interpreter;
pub use loader::{DefaultLoader, ScriptLoader};
pub use module::{Constant, Module};
pub use native_fn::{CallContext, NativeCallable, NativeFn};
pub use runtime::Runtime;
pub use value::{ModuleData, ObjectKind, ObjectRef, Value};
