//! Scripted stand-in for the remote training service.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use mlstudio_core::models::{ExperimentConfig, HistoryEntry};
use mlstudio_core::{RemoteService, ServiceError, UploadFile, UploadResponse};
use serde_json::Value;
use tokio::sync::Notify;

#[derive(Default)]
pub struct FakeService {
    pub upload_reply: Mutex<Option<Result<UploadResponse, ServiceError>>>,
    pub train_reply: Mutex<Option<Result<Value, ServiceError>>>,
    pub history_reply: Mutex<Option<Result<Vec<HistoryEntry>, ServiceError>>>,
    /// When set, `train` waits for a notification before answering.
    pub train_gate: Option<Arc<Notify>>,
    pub calls: Mutex<Vec<String>>,
    pub last_config: Mutex<Option<ExperimentConfig>>,
}

impl FakeService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_upload(self, reply: Result<UploadResponse, ServiceError>) -> Self {
        *self.upload_reply.lock().unwrap() = Some(reply);
        self
    }

    pub fn with_train(self, reply: Result<Value, ServiceError>) -> Self {
        *self.train_reply.lock().unwrap() = Some(reply);
        self
    }

    pub fn with_history(self, reply: Result<Vec<HistoryEntry>, ServiceError>) -> Self {
        *self.history_reply.lock().unwrap() = Some(reply);
        self
    }

    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.train_gate = Some(gate);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

impl RemoteService for FakeService {
    async fn upload(&self, file: &UploadFile) -> Result<UploadResponse, ServiceError> {
        self.record(format!("upload {}", file.file_name));
        let reply = self.upload_reply.lock().unwrap().clone();
        reply.unwrap_or_else(|| Err(ServiceError::transport("no upload reply scripted")))
    }

    async fn train(&self, config: &ExperimentConfig) -> Result<Value, ServiceError> {
        self.record(format!("train {}", config.model_name));
        *self.last_config.lock().unwrap() = Some(config.clone());
        if let Some(gate) = &self.train_gate {
            gate.notified().await;
        }
        let reply = self.train_reply.lock().unwrap().clone();
        reply.unwrap_or_else(|| Err(ServiceError::transport("no train reply scripted")))
    }

    async fn history(&self) -> Result<Vec<HistoryEntry>, ServiceError> {
        self.record("history".to_string());
        let reply = self.history_reply.lock().unwrap().clone();
        reply.unwrap_or_else(|| Err(ServiceError::transport("no history reply scripted")))
    }

    fn download_url(&self, model_id: &str) -> String {
        format!("http://service.test/api/download/{model_id}")
    }
}
