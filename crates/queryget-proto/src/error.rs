//! Plan-level error types.

use thiserror::Error;

/// Errors raised while constructing or applying a plan.
#[derive(Debug, Error)]
pub enum Error {
    /// The requested page does not fit in a row offset.
    #[error("page {page} of size {size} overflows the row offset")]
    WindowOverflow { page: u64, size: u64 },

    /// A builder rejected part of the plan.
    #[error("builder error: {0}")]
    Builder(String),
}
