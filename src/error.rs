//! Error types.

use thiserror::Error;

/// Errors raised while building, running, or training networks.
#[derive(Debug, Error)]
pub enum Error {
    /// Supplied data does not match a declared shape.
    #[error("{context}: expected {expected}, found {found}")]
    Dimension {
        context: &'static str,
        expected: String,
        found: String,
    },
    /// A batch size of zero, or larger than the example set.
    #[error("batch size {size} does not fit {examples} examples")]
    BatchSize { size: usize, examples: usize },
    /// A search worker did not run to completion.
    #[error("search worker {worker} panicked during epoch {epoch}")]
    WorkerPanicked { epoch: usize, worker: usize },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Builds a `Dimension` error for a row of the wrong width.
    pub(crate) fn width(context: &'static str, expected: usize, rows: usize, cols: usize) -> Self {
        Error::Dimension {
            context,
            expected: format!("1x{}", expected),
            found: format!("{}x{}", rows, cols),
        }
    }

    /// Builds a `Dimension` error for two sequences of different lengths.
    pub(crate) fn length(context: &'static str, expected: usize, found: usize) -> Self {
        Error::Dimension {
            context,
            expected: format!("{} items", expected),
            found: format!("{} items", found),
        }
    }
}
