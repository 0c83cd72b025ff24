//! Error taxonomy shared by every list operation.

use core::convert::Infallible;

use crate::storage::{AllocError, Full};

/// Result alias used throughout the crate.
pub type Result<T, E = ListError> = core::result::Result<T, E>;

/// Why a list operation was refused.
///
/// Preconditions are checked in a fixed order and the first failure wins:
/// handle validity, then emptiness, then index bounds, then the structural
/// invariants. No operation mutates the list before all of them pass.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ListError {
    /// The list was torn down; the handle must not be reused.
    #[error("list handle has been destroyed")]
    NullList,

    /// The operation needs at least one element.
    #[error("list is empty")]
    EmptyList,

    /// The index is outside the range the operation accepts.
    ///
    /// `[0, len)` for get/set/remove and traversal, `[0, len]` for insert.
    #[error("index {index} out of bounds for list of length {len}")]
    IndexOutOfBounds {
        /// Requested index.
        index: usize,
        /// List length at the time of the call.
        len: usize,
    },

    /// Node storage could not grow.
    #[error("node allocation failed: {0}")]
    Allocation(#[from] AllocError),

    /// Fixed node storage has no vacant slot left.
    #[error("node storage capacity exhausted")]
    CapacityExhausted,

    /// The supplied buffer cannot back a list.
    #[error("a buffer of {slots} slots cannot back a list")]
    InitFailure {
        /// Number of slots in the rejected buffer.
        slots: usize,
    },

    /// The output buffer cannot hold the full rendering.
    #[error("output buffer too small: {needed} bytes needed, {available} available")]
    InsufficientSize {
        /// Bytes the complete rendering takes.
        needed: usize,
        /// Bytes the caller provided.
        available: usize,
    },

    /// A structural invariant was found broken.
    ///
    /// This signals a defect inside the crate, never caller misuse. A list
    /// that reported it should be treated as corrupt and discarded.
    #[error("list invariant violated: {0}")]
    Internal(&'static str),
}

impl<T> From<Full<T>> for ListError {
    #[inline]
    fn from(_: Full<T>) -> Self {
        ListError::CapacityExhausted
    }
}

impl From<Infallible> for ListError {
    #[inline]
    fn from(never: Infallible) -> Self {
        match never {}
    }
}

/// Logs and builds an [`ListError::Internal`].
#[cold]
pub(crate) fn internal(what: &'static str) -> ListError {
    tracing::error!(what, "list invariant violated");
    ListError::Internal(what)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_offending_values() {
        let err = ListError::IndexOutOfBounds { index: 4, len: 3 };
        assert_eq!(
            err.to_string(),
            "index 4 out of bounds for list of length 3"
        );

        let err = ListError::InsufficientSize {
            needed: 12,
            available: 8,
        };
        assert_eq!(
            err.to_string(),
            "output buffer too small: 12 bytes needed, 8 available"
        );
    }

    #[test]
    fn internal_carries_its_reason() {
        assert_eq!(internal("dangling link"), ListError::Internal("dangling link"));
    }

    #[test]
    fn alloc_error_converts() {
        let err: ListError = AllocError::KeySpace { max: 255 }.into();
        assert!(matches!(err, ListError::Allocation(AllocError::KeySpace { max: 255 })));
    }
}
