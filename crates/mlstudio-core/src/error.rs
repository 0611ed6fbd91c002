//! Error types for mlstudio-core.

use thiserror::Error;

use crate::session::SessionKey;
use crate::workflow::{WorkflowEvent, WorkflowState};

pub const UPLOAD_FAILED: &str = "Failed to upload file. Please try again.";
pub const TRAIN_FAILED: &str = "Training failed. Please check your configuration.";
pub const HISTORY_FAILED: &str = "Failed to load experiment history.";

#[derive(Error, Debug)]
pub enum WorkflowError {
    /// Detected locally, before any network call. Correctable in place.
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Upload(String),

    #[error("{0}")]
    Train(String),

    #[error("{0}")]
    HistoryFetch(String),

    /// Persisted state failed to parse. Purged and treated as absent, never shown.
    #[error("Session state under `{0}` is missing or corrupt")]
    StateCorruption(SessionKey),

    #[error("A {0} request is already in progress")]
    Busy(&'static str),

    #[error("The {0} request was abandoned because its page was closed")]
    Cancelled(&'static str),

    #[error("Cannot apply {event:?} while in {from:?}")]
    InvalidTransition {
        from: WorkflowState,
        event: WorkflowEvent,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl WorkflowError {
    pub fn is_validation(&self) -> bool {
        matches!(self, WorkflowError::Validation(_))
    }
}

pub type Result<T> = std::result::Result<T, WorkflowError>;

/// A failed call to the remote training service.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct ServiceError {
    /// HTTP status, when the service answered at all.
    pub status: Option<u16>,
    /// The `detail` field of the service's error body.
    pub detail: Option<String>,
    pub message: String,
}

impl ServiceError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            status: None,
            detail: None,
            message: message.into(),
        }
    }

    pub fn http(status: u16, detail: Option<String>) -> Self {
        Self {
            status: Some(status),
            detail,
            message: format!("remote service responded with HTTP {status}"),
        }
    }

    /// The message shown to the user: the service's own detail when it sent
    /// one, the caller's fixed fallback otherwise.
    pub fn user_message(&self, fallback: &str) -> String {
        match self.detail.as_deref().map(str::trim) {
            Some(detail) if !detail.is_empty() => detail.to_string(),
            _ => fallback.to_string(),
        }
    }
}
