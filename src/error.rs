use std::io;

use thiserror::Error;

use crate::primitives::concurrency::AccessReason;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ArcError>;

/// Errors raised by arc cell operations and the reference graph.
///
/// `Timeout` is the only transient variant. Every other variant signals an
/// invariant violation or bad input and must not be retried blindly.
#[derive(Debug, Error)]
pub enum ArcError {
    /// A multi-arc chain is full.
    #[error("multi-arc capacity {capacity} exceeded")]
    Capacity {
        /// Configured maximum number of keys per neighbor.
        capacity: usize,
    },
    /// The cell is in a state the operation cannot be applied to.
    #[error("invalid cell state: {0}")]
    InvalidState(&'static str),
    /// Reverse-side access did not complete within the timing budget.
    #[error("timing budget exhausted ({reason}), {removed} arc(s) removed before halt")]
    Timeout {
        /// Reason code carried by the budget.
        reason: AccessReason,
        /// Arcs removed before the operation halted.
        removed: u64,
    },
    /// Forward and reverse mutation disagreed on the number of arcs.
    #[error("asymmetric arc {op}: forward {forward}, reverse {reverse}")]
    Asymmetric {
        /// Operation that diverged.
        op: &'static str,
        /// Arcs affected on the forward side.
        forward: u64,
        /// Arcs affected on the reverse side.
        reverse: u64,
    },
    /// Caller supplied an arc or probe that cannot be applied.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// Serialized input could not be decoded.
    #[error("corruption detected: {0}")]
    Corruption(String),
    /// Referenced vertex does not exist.
    #[error("{0} not found")]
    NotFound(String),
    /// I/O failure while reading or writing configuration or streams.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl ArcError {
    /// Returns true for failures the caller may retry after backing off.
    pub fn is_transient(&self) -> bool {
        matches!(self, ArcError::Timeout { .. })
    }

    /// Returns true for invariant violations that indicate corrupted state.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ArcError::Capacity { .. }
                | ArcError::InvalidState(_)
                | ArcError::Asymmetric { .. }
                | ArcError::Corruption(_)
        )
    }

    pub(crate) fn timeout(reason: AccessReason) -> Self {
        ArcError::Timeout { reason, removed: 0 }
    }
}
