//! Failure modes for the tree.
//!
//! Not-found is deliberately absent here: lookup and delete signal it with
//! `Option::None`, not an `Err` (spec treats it as a normal outcome, not an
//! exceptional one).

use thiserror::Error;

/// Errors a [`crate::Tree`] operation can fail with.
#[derive(Debug, Error)]
pub enum BtreeError {
    /// The node pool could not grow to satisfy an `acquire`.
    #[error("node pool exhausted: allocation failed")]
    AllocationFailed,

    /// A descent or split would have exceeded the configured maximum height.
    #[error("tree height would exceed the configured maximum ({max})")]
    HeightOverflow {
        /// The configured maximum height that was about to be exceeded.
        max: usize,
    },

    /// `max_degree` failed construction-time validation.
    #[error("max_degree must be even and at least 4, got {0}")]
    InvalidMaxDegree(usize),
}
