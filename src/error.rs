//! Error types for the marshalling layer.
//!
//! Probing operations (conversion, `has_attr`) report failure through
//! `bool`/`Option`. Operations that are expected to succeed return
//! [`Result`] with one of the variants below; the runtime's own exception
//! message is carried along as `detail` and the runtime's error indicator is
//! always cleared before the error is returned.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Failure of a facade operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The operation needs a bound object.
    #[error("cannot {operation} '{name}' on an unbound object")]
    Unbound {
        operation: &'static str,
        name: String,
    },

    /// Attribute lookup failed.
    #[error("attribute '{name}' not found: {detail}")]
    AttributeNotFound { name: String, detail: String },

    /// Attribute assignment failed.
    #[error("cannot set attribute '{name}': {detail}")]
    AttributeNotSet { name: String, detail: String },

    /// The callable was found but invoking it failed.
    #[error("call to '{name}' failed: {detail}")]
    CallFailed { name: String, detail: String },

    /// The script factory could not produce a module.
    #[error("failed to load '{path}': {detail}")]
    LoadFailed { path: String, detail: String },
}

/// Discriminant of an [`Error`], for matching without the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Unbound,
    AttributeNotFound,
    AttributeNotSet,
    CallFailed,
    LoadFailed,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Unbound { .. } => ErrorKind::Unbound,
            Error::AttributeNotFound { .. } => ErrorKind::AttributeNotFound,
            Error::AttributeNotSet { .. } => ErrorKind::AttributeNotSet,
            Error::CallFailed { .. } => ErrorKind::CallFailed,
            Error::LoadFailed { .. } => ErrorKind::LoadFailed,
        }
    }

    /// The attribute, function or script path the error is about.
    pub fn name(&self) -> &str {
        match self {
            Error::Unbound { name, .. }
            | Error::AttributeNotFound { name, .. }
            | Error::AttributeNotSet { name, .. }
            | Error::CallFailed { name, .. } => name,
            Error::LoadFailed { path, .. } => path,
        }
    }

    /// Message forwarded from the runtime, if any.
    pub fn detail(&self) -> Option<&str> {
        match self {
            Error::Unbound { .. } => None,
            Error::AttributeNotFound { detail, .. }
            | Error::AttributeNotSet { detail, .. }
            | Error::CallFailed { detail, .. }
            | Error::LoadFailed { detail, .. } => Some(detail),
        }
    }
}
