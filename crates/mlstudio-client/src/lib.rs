//! HTTP implementation of [`RemoteService`] for the mlstudio training API.
//!
//! Endpoints are resolved against [`ClientConfig::api_url`]:
//! `POST /upload` (multipart, part `file`), `POST /train` (JSON),
//! `GET /history`. Error bodies of the form `{"detail": "..."}` are surfaced
//! through [`ServiceError::detail`].

use std::time::Duration;

use mlstudio_core::models::{ExperimentConfig, HistoryEntry};
use mlstudio_core::{ClientConfig, RemoteService, ServiceError, UploadFile, UploadResponse};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const CSV_MIME: &str = "text/csv";

#[derive(Deserialize)]
struct ErrorBody {
    detail: Option<serde_json::Value>,
}

pub struct HttpService {
    client: Client,
    config: ClientConfig,
}

impl HttpService {
    pub fn new(config: ClientConfig) -> Result<Self, ServiceError> {
        let client = Client::builder()
            .user_agent(concat!("mlstudio/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| ServiceError::transport(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ServiceError> {
        let response = request.send().await.map_err(|e| {
            warn!("request to training service failed: {}", e);
            ServiceError::transport(e.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            debug!("service answered HTTP {}: {}", status, body);
            return Err(ServiceError::http(status.as_u16(), error_detail(&body)));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ServiceError::transport(format!("unreadable response body: {e}")))
    }
}

/// The `detail` of an error body. Non-string details, such as lists of
/// field errors, are rendered as their JSON text.
fn error_detail(body: &str) -> Option<String> {
    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    match parsed.detail? {
        serde_json::Value::String(s) => Some(s),
        serde_json::Value::Null => None,
        other => Some(other.to_string()),
    }
}

impl RemoteService for HttpService {
    async fn upload(&self, file: &UploadFile) -> Result<UploadResponse, ServiceError> {
        let part = Part::bytes(file.bytes.clone())
            .file_name(file.file_name.clone())
            .mime_str(CSV_MIME)
            .map_err(|e| ServiceError::transport(e.to_string()))?;
        let form = Form::new().part("file", part);
        debug!("uploading {} ({} bytes)", file.file_name, file.bytes.len());
        self.send(self.client.post(self.config.endpoint("upload")).multipart(form))
            .await
    }

    async fn train(&self, config: &ExperimentConfig) -> Result<serde_json::Value, ServiceError> {
        debug!("training {} on {}", config.model_name, config.dataset_name);
        self.send(self.client.post(self.config.endpoint("train")).json(config))
            .await
    }

    async fn history(&self) -> Result<Vec<HistoryEntry>, ServiceError> {
        self.send(self.client.get(self.config.endpoint("history")))
            .await
    }

    fn download_url(&self, model_id: &str) -> String {
        self.config.download_url(model_id)
    }
}
