//! Native modules installed into a runtime.
//!
//! A `Module` is a description: a name, native functions and constants.
//! Loading its name through the runtime instantiates a fresh module value
//! whose attributes are those functions and constants.
//!
//! # Example
//!
//! ```ignore
//! use dynwrap_core::{Module, Runtime};
//!
//! let rt = Runtime::new();
//! let math = Module::new("math")
//!     .constant("PI", std::f64::consts::PI)
//!     .function("double", |ctx| {
//!         let x = ctx.arg(0)?;
//!         let v = ctx.runtime().as_int(x).unwrap_or(0);
//!         Ok(ctx.runtime().new_int(v * 2))
//!     });
//! rt.install_module(math);
//! ```

use crate::error::NativeError;
use crate::native_fn::{CallContext, NativeFn};
use crate::runtime::Runtime;
use crate::value::ObjectRef;

/// A constant attribute of a native module.
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    None,
    Bool(bool),
    Int(i128),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
}

impl From<bool> for Constant {
    fn from(v: bool) -> Self {
        Constant::Bool(v)
    }
}

impl From<i64> for Constant {
    fn from(v: i64) -> Self {
        Constant::Int(v.into())
    }
}

impl From<i32> for Constant {
    fn from(v: i32) -> Self {
        Constant::Int(v.into())
    }
}

impl From<f64> for Constant {
    fn from(v: f64) -> Self {
        Constant::Float(v)
    }
}

impl From<&str> for Constant {
    fn from(v: &str) -> Self {
        Constant::Str(v.to_string())
    }
}

impl From<String> for Constant {
    fn from(v: String) -> Self {
        Constant::Str(v)
    }
}

impl From<Vec<u8>> for Constant {
    fn from(v: Vec<u8>) -> Self {
        Constant::Bytes(v)
    }
}

impl Constant {
    fn allocate(&self, rt: &Runtime) -> ObjectRef {
        match self {
            Constant::None => rt.new_none(),
            Constant::Bool(v) => rt.new_bool(*v),
            Constant::Int(v) => rt.new_int(*v),
            Constant::Float(v) => rt.new_float(*v),
            Constant::Str(v) => rt.new_str(v),
            Constant::Bytes(v) => rt.new_bytes(v),
        }
    }
}

/// Description of a native module.
#[derive(Debug, Clone, Default)]
pub struct Module {
    name: String,
    functions: Vec<NativeFn>,
    constants: Vec<(String, Constant)>,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            functions: Vec::new(),
            constants: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add a native function, exposed under `name`.
    pub fn function<F>(mut self, name: &str, f: F) -> Self
    where
        F: Fn(&mut CallContext<'_>) -> Result<ObjectRef, NativeError> + 'static,
    {
        self.functions.push(NativeFn::new(name, f));
        self
    }

    /// Add a constant attribute.
    pub fn constant(mut self, name: &str, value: impl Into<Constant>) -> Self {
        self.constants.push((name.to_string(), value.into()));
        self
    }

    pub fn functions(&self) -> &[NativeFn] {
        &self.functions
    }

    pub fn constants(&self) -> &[(String, Constant)] {
        &self.constants
    }

    /// Create a module value carrying this module's attributes.
    ///
    /// Returns a new owned reference.
    pub fn instantiate(&self, rt: &Runtime) -> ObjectRef {
        let module = rt.module_new(&self.name);
        for function in &self.functions {
            let value = rt.new_function(function.clone());
            rt.set_attr(module, function.name(), value);
            rt.release(value);
        }
        for (name, constant) in &self.constants {
            let value = constant.allocate(rt);
            rt.set_attr(module, name, value);
            rt.release(value);
        }
        module
    }
}
