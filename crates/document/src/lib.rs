use thiserror::Error;

mod buffer;
pub use buffer::*;
mod history;
pub use history::*;
mod versions;
pub use versions::*;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DocumentError {
    #[error("invalid position {0}")]
    InvalidPosition(usize),
    #[error("history empty: {0}")]
    HistoryEmpty(&'static str),
    #[error("snapshot not found: {0}")]
    SnapshotNotFound(VersionId),
}

pub type Result<T> = std::result::Result<T, DocumentError>;

/// Zero-based index of a line within a document.
pub type Position = usize;
