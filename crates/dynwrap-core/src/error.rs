//! Error types for the embedded runtime.
//!
//! ## Error Hierarchy
//!
//! ```text
//! Exception      - a raised runtime error, stored in the error indicator
//! ├── kind       - ExceptionKind (TypeError, AttributeError, ...)
//! └── message
//! NativeError    - returned by native callables, becomes an Exception
//! LoadError      - returned by script loaders, becomes an ImportError
//! ```

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Category of a raised runtime error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExceptionKind {
    /// An operation was applied to a value of the wrong kind.
    TypeError,
    /// An attribute lookup failed.
    AttributeError,
    /// A sequence index was out of range.
    IndexError,
    /// A mapping key was missing.
    KeyError,
    /// A value had the right kind but an unusable content.
    ValueError,
    /// A script or module could not be loaded.
    ImportError,
    /// Anything else, including stale references.
    RuntimeError,
}

impl ExceptionKind {
    /// Returns the name used when the exception is displayed.
    pub fn as_str(&self) -> &'static str {
        match self {
            ExceptionKind::TypeError => "TypeError",
            ExceptionKind::AttributeError => "AttributeError",
            ExceptionKind::IndexError => "IndexError",
            ExceptionKind::KeyError => "KeyError",
            ExceptionKind::ValueError => "ValueError",
            ExceptionKind::ImportError => "ImportError",
            ExceptionKind::RuntimeError => "RuntimeError",
        }
    }
}

impl fmt::Display for ExceptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A raised runtime error.
///
/// At most one exception is pending at a time; it lives in the interpreter's
/// error indicator until it is fetched or cleared.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct Exception {
    pub kind: ExceptionKind,
    pub message: String,
}

impl Exception {
    pub fn new(kind: ExceptionKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new(ExceptionKind::TypeError, message)
    }

    pub fn attribute_error(message: impl Into<String>) -> Self {
        Self::new(ExceptionKind::AttributeError, message)
    }

    pub fn runtime_error(message: impl Into<String>) -> Self {
        Self::new(ExceptionKind::RuntimeError, message)
    }
}

/// Errors returned by native callables.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NativeError {
    /// The callable raised an exception explicitly.
    #[error(transparent)]
    Raised(#[from] Exception),

    /// An argument index was past the end of the argument tuple.
    #[error("argument index {index} out of bounds (call has {count} arguments)")]
    ArgumentIndexOutOfBounds { index: usize, count: usize },

    /// An argument had the wrong dynamic kind.
    #[error("argument {index}: expected {expected}, got {actual}")]
    ArgumentType {
        index: usize,
        expected: &'static str,
        actual: &'static str,
    },

    /// The callable was invoked with the wrong number of arguments.
    #[error("expected {expected} arguments, got {got}")]
    ArgCountMismatch { expected: usize, got: usize },
}

impl NativeError {
    /// Convenience constructor for raising an exception of a given kind.
    pub fn raise(kind: ExceptionKind, message: impl Into<String>) -> Self {
        NativeError::Raised(Exception::new(kind, message))
    }

    /// The exception this error turns into once it reaches the runtime.
    pub fn into_exception(self) -> Exception {
        match self {
            NativeError::Raised(exc) => exc,
            NativeError::ArgumentIndexOutOfBounds { .. } => {
                Exception::new(ExceptionKind::IndexError, self.to_string())
            }
            NativeError::ArgumentType { .. } | NativeError::ArgCountMismatch { .. } => {
                Exception::type_error(self.to_string())
            }
        }
    }
}

/// Errors returned by a [`ScriptLoader`](crate::ScriptLoader).
#[derive(Debug, Error)]
pub enum LoadError {
    /// No installed module or file matched the requested path.
    #[error("no module or script found for '{0}'")]
    NotFound(String),

    /// The script file exists but could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The script file could not be parsed.
    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    /// The runtime refused an operation while building the module value.
    #[error("failed to build module from {path}: {detail}")]
    Build { path: PathBuf, detail: String },

    /// Evaluating the loaded unit raised an exception.
    #[error("error while evaluating '{path}': {exception}")]
    Raised { path: String, exception: Exception },
}

impl LoadError {
    /// The exception this error turns into once it reaches the runtime.
    pub fn into_exception(self) -> Exception {
        match self {
            LoadError::Raised { exception, .. } => exception,
            other => Exception::new(ExceptionKind::ImportError, other.to_string()),
        }
    }
}
