//! Custom error types for the pri-reader crate.

use std::path::PathBuf;
use thiserror::Error;

/// The primary error type for all operations in this crate.
///
/// Only structural and lifecycle failures are represented here. A resource
/// name that is not present, or whose candidates all fail to produce text,
/// is reported as `Ok(None)` by [`PriReader::resolve`](crate::PriReader::resolve).
#[derive(Debug, Error)]
pub enum PriError {
    /// The container file could not be opened.
    #[error("Cannot open resource container {}: {source}", path.display())]
    Configuration {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An error originating from I/O operations after the file was opened.
    #[error("I/O error: {0:?}")]
    Io(#[from] std::io::Error),

    /// The file is structurally invalid or does not conform to the container layout.
    #[error("Malformed container: {0}")]
    MalformedContainer(String),

    /// The descriptor does not declare a primary resource map.
    #[error("Container does not declare a primary resource map")]
    MissingResourceMap,

    /// The reader was used after [`PriReader::close`](crate::PriReader::close).
    #[error("Resource container has been closed")]
    Closed,

    /// A mutex lock was poisoned, indicating a panic in another thread holding the lock.
    #[error("A mutex lock was poisoned, indicating a panic in another thread holding the lock.")]
    LockPoisoned,
}

impl PriError {
    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        PriError::MalformedContainer(message.into())
    }
}

/// A convenience `Result` type alias using the crate's `PriError` type.
pub type Result<T> = std::result::Result<T, PriError>;
