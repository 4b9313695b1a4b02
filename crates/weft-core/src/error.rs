//! Error types for the core model and for intercepted calls.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// A failure value raised by an interceptor or an original implementation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fault {
    /// Machine-readable failure kind (e.g. `insufficient_funds`).
    pub kind: String,
    /// Human-readable message.
    pub message: String,
    /// Optional structured payload.
    #[serde(default)]
    pub payload: Value,
}

impl Fault {
    /// Create a new fault.
    #[must_use]
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            payload: Value::Null,
        }
    }

    /// Attach a payload.
    #[must_use]
    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// A failed call.
///
/// `Transported` marks a fault that crossed a transport boundary (a remote
/// hop or an outer dispatch frame). The wrapping is bookkeeping only: the
/// fault inside keeps its identity.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CallError {
    /// A fault raised directly.
    #[error("{0}")]
    Raised(Fault),

    /// A fault carried through a transport wrapper.
    #[error("transported failure: {0}")]
    Transported(Fault),
}

impl CallError {
    /// Raise a new fault.
    #[must_use]
    pub fn raised(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Raised(Fault::new(kind, message))
    }

    /// The fault regardless of transport wrapping.
    #[must_use]
    pub fn fault(&self) -> &Fault {
        match self {
            Self::Raised(fault) | Self::Transported(fault) => fault,
        }
    }

    /// Consume the error and return the fault.
    #[must_use]
    pub fn into_fault(self) -> Fault {
        match self {
            Self::Raised(fault) | Self::Transported(fault) => fault,
        }
    }

    /// Whether the fault is transport-wrapped.
    #[must_use]
    pub fn is_transported(&self) -> bool {
        matches!(self, Self::Transported(_))
    }

    /// Apply transport wrapping (idempotent).
    #[must_use]
    pub fn transported(self) -> Self {
        Self::Transported(self.into_fault())
    }
}

impl From<Fault> for CallError {
    fn from(fault: Fault) -> Self {
        Self::Raised(fault)
    }
}

/// Result of an intercepted call.
pub type CallResult = Result<Value, CallError>;

/// Errors raised while building structural metadata.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// Two operations of a type share a signature.
    #[error("duplicate operation {signature} on {owner}")]
    DuplicateOperation {
        /// Owning type.
        owner: String,
        /// Colliding signature.
        signature: String,
    },

    /// Two fields of a type share a name.
    #[error("duplicate field {field} on {owner}")]
    DuplicateField {
        /// Owning type.
        owner: String,
        /// Colliding field name.
        field: String,
    },

    /// Access metadata names a field the type does not declare.
    #[error("operation {signature} on {owner} references unknown field {field}")]
    UnknownField {
        /// Owning type.
        owner: String,
        /// Referencing operation.
        signature: String,
        /// Missing field.
        field: String,
    },

    /// A type was declared with an empty name.
    #[error("type name must not be empty")]
    EmptyTypeName,
}

/// Result type for core model construction.
pub type CoreResult<T> = Result<T, CoreError>;
