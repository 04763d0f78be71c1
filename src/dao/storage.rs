use std::error::Error;
use thiserror::Error;

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by storage backends regardless of the underlying medium.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backend could not be reached or refused the operation.
    #[error("storage unavailable: {message}")]
    Unavailable {
        /// Human readable context.
        message: String,
        /// Backend failure.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// A stored document does not have the expected structure.
    #[error("stored {document} document is corrupt: {message}")]
    Corrupt {
        /// Which of the two documents failed.
        document: &'static str,
        /// What was wrong with it.
        message: String,
    },
}

impl StorageError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Unavailable {
            message,
            source: Box::new(source),
        }
    }

    /// Construct a corrupt-document error.
    pub fn corrupt(document: &'static str, message: impl Into<String>) -> Self {
        StorageError::Corrupt {
            document,
            message: message.into(),
        }
    }
}
