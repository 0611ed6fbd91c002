//! Boundary to the remote training service.

use std::future::Future;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ServiceError;
use crate::models::{ExperimentConfig, HistoryEntry};

/// A file chosen for upload.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes: bytes.into(),
        }
    }

    pub fn read(path: &Path) -> std::io::Result<Self> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        Ok(Self {
            file_name,
            bytes: std::fs::read(path)?,
        })
    }
}

/// Answer of the upload endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UploadResponse {
    pub filename: String,
    #[serde(default)]
    pub details: Option<SchemaDetails>,
}

/// Schema object of an upload answer. Fields beyond `columns` are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaDetails {
    #[serde(default)]
    pub columns: Option<Vec<String>>,
}

/// The remote training/inference API.
///
/// `train` returns the raw envelope; only its `metrics` field is read, by
/// [`crate::normalizer`].
pub trait RemoteService: Send + Sync {
    fn upload(&self, file: &UploadFile) -> impl Future<Output = Result<UploadResponse, ServiceError>> + Send;

    fn train(
        &self,
        config: &ExperimentConfig,
    ) -> impl Future<Output = Result<serde_json::Value, ServiceError>> + Send;

    fn history(&self) -> impl Future<Output = Result<Vec<HistoryEntry>, ServiceError>> + Send;

    /// Link to a trained model artifact. Never fetched by the workflow itself.
    fn download_url(&self, model_id: &str) -> String;
}
