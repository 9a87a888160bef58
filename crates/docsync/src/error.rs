//! Error types shared across the crate.

use thiserror::Error;

use crate::crdt::ElementKind;
use crate::time::Ticket;

/// How the caller should react to a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transience {
    /// A causal dependency is missing; retry once it has been applied.
    Retryable,
    /// The operation can never apply; reject it.
    Permanent,
    /// Internal invariant broken; stop processing the document.
    Fatal,
}

impl Transience {
    pub fn is_retryable(self) -> bool {
        matches!(self, Transience::Retryable)
    }
}

/// Failure to apply an operation to a [`Root`](crate::crdt::Root).
///
/// Every variant is raised before any mutation, so a failed apply leaves
/// the tree exactly as it was.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApplyError {
    #[error("element {0} not found")]
    NotFound(Ticket),
    #[error("{op} expects {expected} at {target}, found {found}")]
    TypeMismatch {
        op: &'static str,
        expected: &'static str,
        found: ElementKind,
        target: Ticket,
    },
    #[error("element {0} is already registered")]
    DuplicateIdentity(Ticket),
    #[error("executor halted after an invariant violation")]
    Halted,
}

impl ApplyError {
    pub fn transience(&self) -> Transience {
        match self {
            ApplyError::NotFound(_) => Transience::Retryable,
            ApplyError::TypeMismatch { .. } => Transience::Permanent,
            ApplyError::DuplicateIdentity(_) | ApplyError::Halted => Transience::Fatal,
        }
    }
}

/// Failure of a local change made through [`Document::update`].
///
/// [`Document::update`]: crate::document::Document::update
#[derive(Debug, Clone, PartialEq, Error)]
pub enum UpdateError {
    #[error(transparent)]
    Apply(#[from] ApplyError),
    #[error("index {index} out of range for length {len}")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("key {0:?} has no visible value")]
    KeyNotFound(String),
    #[error("{0}")]
    Rejected(String),
}
