//! Reference key lookup.
//!
//! A reference key is an opaque token handed out by the upstream application.
//! It resolves to the ordered list of files the archive should contain.

pub mod redis;

pub use self::redis::RedisResolver;

use async_trait::async_trait;
use thiserror::Error;

use crate::archive::FileDescriptor;

/// The only message callers ever see for a failed lookup
pub const ACCESS_DENIED: &str = "Access Denied (sorry your link has timed out)";

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("no file list stored for reference {reference:?}")]
    NotFound { reference: String },

    #[error("metadata store unavailable: {0}")]
    Store(String),

    #[error("malformed file list: {0}")]
    Decode(#[from] serde_json::Error),
}

impl LookupError {
    /// Message safe to return to the client. Causes are not distinguished.
    pub fn user_message(&self) -> &'static str {
        ACCESS_DENIED
    }
}

/// Resolves a reference key to the files to archive
#[async_trait]
pub trait FileSetResolver: Send + Sync {
    /// Ordered file list for `reference`. Order is kept as stored.
    async fn resolve(&self, reference: &str) -> Result<Vec<FileDescriptor>, LookupError>;
}

/// Decode the JSON file list stored for a reference
pub fn decode_file_list(raw: &[u8]) -> Result<Vec<FileDescriptor>, LookupError> {
    Ok(serde_json::from_slice(raw)?)
}
