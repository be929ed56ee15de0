use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::api::FetchError;

/// Bytes could not be turned into the requested value type.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct DecodeError {
    pub message: String,
}

impl DecodeError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for DecodeError {
    fn from(err: serde_json::Error) -> Self {
        Self::new(err.to_string())
    }
}

/// Everything that can go wrong while producing a cached resource.
///
/// Clone so that a single settled fetch can be handed to every caller that
/// joined it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResourceError {
    #[error("Transport error: {0}")]
    Transport(#[from] FetchError),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Cache file {}: {message}", path.display())]
    Persistence { path: PathBuf, message: String },

    #[error("Resource {key:?} is registered as {registered}, requested as {requested}")]
    TypeMismatch {
        key: String,
        registered: &'static str,
        requested: &'static str,
    },

    #[error("Fetch task ended without reporting a result")]
    Interrupted,
}

impl ResourceError {
    pub(crate) fn persistence(path: &Path, err: impl std::fmt::Display) -> Self {
        ResourceError::Persistence {
            path: path.to_path_buf(),
            message: err.to_string(),
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, ResourceError::Transport(_))
    }

    pub fn is_decode(&self) -> bool {
        matches!(self, ResourceError::Decode(_))
    }

    pub fn is_type_mismatch(&self) -> bool {
        matches!(self, ResourceError::TypeMismatch { .. })
    }
}

pub type Result<T, E = ResourceError> = std::result::Result<T, E>;
