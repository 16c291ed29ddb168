use async_trait::async_trait;
use std::pin::Pin;
use thiserror::Error;
use tokio::io::AsyncRead;

/// Byte stream of one fetched object. Dropping it releases the connection.
pub type ObjectReader = Pin<Box<dyn AsyncRead + Send>>;

/// Why an object could not be opened
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("object not found: {path}")]
    NotFound { path: String },

    #[error("failed to fetch {path}: {message}")]
    Other { path: String, message: String },
}

impl FetchError {
    pub fn other(path: &str, message: impl Into<String>) -> Self {
        FetchError::Other {
            path: path.to_string(),
            message: message.into(),
        }
    }

    pub fn path(&self) -> &str {
        match self {
            FetchError::NotFound { path } | FetchError::Other { path, .. } => path,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, FetchError::NotFound { .. })
    }
}

/// Opens objects from a key-addressed store
#[async_trait]
pub trait ObjectFetcher: Send + Sync {
    /// Open `storage_path` for streaming. A single attempt is made.
    async fn open(&self, storage_path: &str) -> Result<ObjectReader, FetchError>;
}
