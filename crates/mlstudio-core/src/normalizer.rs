//! Result normalizer: turns a training envelope into the canonical [`TrainingResult`].
//!
//! The train endpoint answers with the whole stored experiment. The result the
//! results page understands is the object under its `metrics` field; the rest
//! of the envelope is discarded before anything is persisted.
//!
//! Scores sit either in a nested `metrics` object or directly on the result
//! object next to `explanation` and `visualizations`.

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{Result, WorkflowError};
use crate::models::{MetricValue, Metrics, TrainingResult, Visualizations, DEFAULT_EXPLANATION};
use crate::session::{Session, SessionStore};

pub const MALFORMED_RESPONSE: &str = "The training service returned an unexpected response.";

/// Fields of the result object that are never scores.
const RESULT_FIELDS: &[&str] = &["model_name", "model_id", "metrics", "explanation", "visualizations"];

#[derive(Deserialize)]
struct InnerResult {
    #[serde(default)]
    model_name: Option<String>,
    #[serde(default)]
    model_id: Option<String>,
    #[serde(default)]
    explanation: Option<String>,
    #[serde(default)]
    visualizations: Option<Visualizations>,
}

/// Extracts the canonical result from a training envelope.
pub fn normalize(envelope: &Value) -> Result<TrainingResult> {
    let object = envelope
        .get("metrics")
        .and_then(Value::as_object)
        .ok_or_else(|| WorkflowError::Train(MALFORMED_RESPONSE.to_string()))?;

    let metrics = match object.get("metrics") {
        Some(Value::Object(nested)) => scalar_entries(nested, &[]),
        _ => scalar_entries(object, RESULT_FIELDS),
    };

    let inner = InnerResult::deserialize(&envelope["metrics"]).map_err(|e| {
        tracing::error!("training result does not match the expected shape: {}", e);
        WorkflowError::Train(MALFORMED_RESPONSE.to_string())
    })?;

    let model_name = inner
        .model_name
        .or_else(|| envelope.get("model_name").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_default();

    Ok(TrainingResult {
        model_name,
        model_id: inner.model_id.filter(|id| !id.is_empty()),
        metrics,
        explanation: inner
            .explanation
            .unwrap_or_else(|| DEFAULT_EXPLANATION.to_string()),
        visualizations: inner.visualizations.unwrap_or_default(),
    })
}

fn scalar_entries(map: &Map<String, Value>, skip: &[&str]) -> Metrics {
    map.iter()
        .filter(|(key, _)| !skip.contains(&key.as_str()))
        .filter_map(|(key, value)| MetricValue::from_json(value).map(|v| (key.clone(), v)))
        .collect()
}

/// Normalizes `envelope` and replaces the stored result with it, whole.
pub fn persist<S: SessionStore>(session: &Session<S>, envelope: &Value) -> Result<TrainingResult> {
    let result = normalize(envelope)?;
    session.save_training_result(&result)?;
    Ok(result)
}
