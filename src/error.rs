//! Error channels for the type subsystem.
//!
//! Three families, per the design: user-facing Python exceptions ([`PyErr`]),
//! the stackless "slot not implemented" signal ([`Empty`]), and internal
//! invariant violations ([`CoreError`]) that are bugs, not Python-visible
//! exceptions.

use std::fmt;

use log::error;

/// The closed set of exception *kinds* the core itself can raise.
///
/// This is a taxonomy, not the full exception hierarchy (out of scope per
/// the spec) -- just enough for the core to name what went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PyExcKind {
    TypeError,
    AttributeError,
    NameError,
    StopIteration,
    LookupError,
    IndexError,
    DeprecationWarning,
}

impl fmt::Display for PyExcKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::TypeError => "TypeError",
            Self::AttributeError => "AttributeError",
            Self::NameError => "NameError",
            Self::StopIteration => "StopIteration",
            Self::LookupError => "LookupError",
            Self::IndexError => "IndexError",
            Self::DeprecationWarning => "DeprecationWarning",
        };
        f.write_str(name)
    }
}

/// A user-facing Python error: a kind plus a message.
///
/// Propagates up to whatever drives the core (an interpreter, a test, a
/// REPL); the core never attempts to recover from one of these itself.
#[derive(Debug, Clone)]
pub struct PyErr {
    pub kind: PyExcKind,
    pub message: String,
}

impl PyErr {
    pub fn new(kind: PyExcKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new(PyExcKind::TypeError, message)
    }

    pub fn attribute_error(message: impl Into<String>) -> Self {
        Self::new(PyExcKind::AttributeError, message)
    }

    pub fn lookup_error(message: impl Into<String>) -> Self {
        Self::new(PyExcKind::LookupError, message)
    }
}

impl fmt::Display for PyErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for PyErr {}

/// The stackless "slot empty" signal.
///
/// Raised when a dispatcher invokes a [`crate::special_method::SpecialMethod`]
/// slot that a representation does not implement. It is always caught within
/// one frame of its origin and never reaches user code -- see
/// [`crate::dispatch`] for the call sites that catch it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Empty;

pub type SlotResult<T> = Result<T, Empty>;

/// Internal invariants broken: bugs, not Python-visible exceptions.
///
/// [`crate::factory::TypeFactory`] surfaces these to its caller as a
/// [`PyErr::type_error`] (see [`CoreError::into_py_err`]); the bootstrap path
/// treats any of these as fatal, per the spec's propagation policy.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CoreError {
    #[error("Cannot create a consistent method resolution order (MRO) for bases: {0}")]
    MroConflict(String),

    #[error("{class} represents multiple types: '{existing}' and '{incoming}'")]
    Clash {
        class: String,
        existing: String,
        incoming: String,
    },

    #[error("type spec for '{0}' names no primary host class")]
    MissingPrimary(String),

    #[error("adopted class '{class}' already claimed by type '{owner}'")]
    AdoptedClassOverlap { class: String, owner: String },

    #[error("internal: type '{0}' published twice")]
    DoublePublication(String),
}

impl CoreError {
    /// The façade-level conversion: internal errors become `TypeError`s at
    /// the public boundary (`from_spec`, `__class__` assignment, ...).
    pub fn into_py_err(self) -> PyErr {
        error!(target: "pytype_core::error", "{self}");
        PyErr::type_error(self.to_string())
    }
}
