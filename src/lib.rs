//! Marshalling and object-lifetime layer over an embedded, dynamically
//! typed, reference-counted runtime.
//!
//! - [`convert`](mod@convert): runtime value to native value ([`Convertible`])
//! - [`allocate`](mod@allocate): native value to runtime value ([`Allocatable`])
//! - [`handle`]: [`UniqueRef`] and [`SharedRef`], which release every
//!   reference exactly once
//! - [`object`]: the [`Object`] facade for attribute access and calls
//! - [`args`]: the one-pass call-argument builder
//!
//! # Example
//!
//! ```ignore
//! use dynwrap::prelude::*;
//!
//! let rt = Runtime::new();
//! let module = Object::from_script(&rt, "settings")?;
//! let retries: i32 = module.get_attr("retries")?.extract().unwrap_or(3);
//! let total = module.call_function("sum", (vec![1, 2, 3],))?;
//! ```

pub mod allocate;
pub mod args;
pub mod bytes;
pub mod convert;
pub mod error;
pub mod handle;
pub mod logging;
pub mod native;
pub mod object;

pub use allocate::{Allocatable, KeyAllocatable, allocate, allocate_bytes};
pub use args::{Arg, Args, IntoArgs};
pub use bytes::ByteBuf;
pub use convert::{Convertible, convert};
pub use error::{Error, ErrorKind, Result};
pub use handle::{SharedRef, UniqueRef};
pub use native::CallContextExt;
pub use object::Object;

pub use dynwrap_core::{
    CallContext, DefaultLoader, Exception, ExceptionKind, LoadError, Module, NativeError,
    ObjectKind, ObjectRef, Runtime, RuntimeConfig, ScriptLoader,
};

/// Re-exports for the common case.
pub mod prelude {
    pub use crate::allocate::{Allocatable, allocate};
    pub use crate::args::{Arg, Args, IntoArgs};
    pub use crate::bytes::ByteBuf;
    pub use crate::convert::{Convertible, convert};
    pub use crate::error::{Error, ErrorKind, Result};
    pub use crate::native::CallContextExt;
    pub use crate::object::Object;
    pub use dynwrap_core::{Module, Runtime, RuntimeConfig};
}
