use std::io;
use std::sync::Arc;

use thiserror::Error;

/// Unified error type for the storage engine.
///
/// `Clone` so that one commit outcome can be handed to every writer that was
/// merged into the same group.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// IO error from the log stream (append, flush, sync, close).
    #[error("IO error: {0}")]
    Io(Arc<io::Error>),
    /// Data corruption detected (CRC mismatch, bad format, etc).
    #[error("Corruption: {0}")]
    Corruption(String),
    /// Key not found.
    #[error("Not found")]
    NotFound,
    /// Caller supplied an argument the engine cannot act on.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl Error {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound)
    }

    pub fn is_corruption(&self) -> bool {
        matches!(self, Error::Corruption(_))
    }

    pub fn is_io(&self) -> bool {
        matches!(self, Error::Io(_))
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(Arc::new(e))
    }
}

/// Result type alias used throughout the engine.
pub type Result<T> = std::result::Result<T, Error>;
