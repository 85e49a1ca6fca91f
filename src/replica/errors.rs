//! Replica Error Types
//!
//! Controller operations fail explicitly; nothing is retried on the caller's
//! behalf.

use std::fmt;

/// Replica controller error
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicaError {
    /// Error kind
    pub kind: ReplicaErrorKind,
    /// Error message
    pub message: String,
}

/// Replica controller error kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplicaErrorKind {
    /// Operation requires `open` first
    NotOpen,

    /// `open` called twice
    AlreadyOpen,

    /// Replica was closed or aborted
    Closed,

    /// Illegal state transition attempted (e.g. decreasing epoch)
    IllegalTransition,

    /// The leader-election substrate failed the request
    Substrate,
}

impl ReplicaError {
    /// Create a new replica error.
    pub fn new(kind: ReplicaErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn not_open(message: impl Into<String>) -> Self {
        Self::new(ReplicaErrorKind::NotOpen, message)
    }

    pub fn already_open(message: impl Into<String>) -> Self {
        Self::new(ReplicaErrorKind::AlreadyOpen, message)
    }

    pub fn closed(message: impl Into<String>) -> Self {
        Self::new(ReplicaErrorKind::Closed, message)
    }

    /// Create an illegal transition error.
    pub fn illegal_transition(message: impl Into<String>) -> Self {
        Self::new(ReplicaErrorKind::IllegalTransition, message)
    }

    /// Create a substrate failure error.
    pub fn substrate(message: impl Into<String>) -> Self {
        Self::new(ReplicaErrorKind::Substrate, message)
    }

    /// Get the error kind.
    pub fn kind(&self) -> ReplicaErrorKind {
        self.kind
    }

    /// Get the error message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ReplicaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl std::error::Error for ReplicaError {}

/// Result type for replica operations.
pub type ReplicaResult<T> = Result<T, ReplicaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ReplicaError::illegal_transition("epoch went backwards");
        assert_eq!(err.to_string(), "IllegalTransition: epoch went backwards");
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(ReplicaError::closed("x").kind(), ReplicaErrorKind::Closed);
        assert_eq!(ReplicaError::not_open("x").kind(), ReplicaErrorKind::NotOpen);
        assert_eq!(ReplicaError::substrate("x").kind(), ReplicaErrorKind::Substrate);
        assert_eq!(ReplicaError::already_open("x").message(), "x");
    }
}
