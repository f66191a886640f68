//! Error taxonomy shared by the resolver, the backends and the nodes

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoraTagsError {
    #[error("LoRA file '{0}' was not found in the designated folder paths")]
    NotFound(String),

    #[error("Failed to read tag cache {path:?}: {reason}")]
    CacheRead { path: PathBuf, reason: String },

    #[error("Failed to write tag cache {path:?}: {source}")]
    CacheWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Tag lookup service unavailable: {0}")]
    RemoteUnavailable(String),

    #[error("Tag lookup service returned HTTP {0}")]
    RemoteStatus(u16),

    #[error("Invalid weights file {path:?}: {reason}")]
    InvalidWeights { path: PathBuf, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LoraTagsError {
    /// Whether the remote service should be treated as having no data
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            LoraTagsError::RemoteUnavailable(_) | LoraTagsError::RemoteStatus(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, LoraTagsError>;
