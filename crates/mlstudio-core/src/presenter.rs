//! Results page: formatting rules over the canonical [`TrainingResult`].

use std::fs;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tracing::warn;

use crate::error::Result;
use crate::models::{MetricValue, TrainingResult, VisualizationKind};
use crate::service::RemoteService;
use crate::session::{Session, SessionStore};
use crate::workflow::Route;

pub const NO_RESULTS: &str =
    "It looks like you haven't trained a model yet, or your previous session expired.";
pub const START_NEW_EXPERIMENT: &str = "Start New Experiment";

/// `r2_score` -> `R2 SCORE`.
pub fn format_key(key: &str) -> String {
    key.replace('_', " ").to_uppercase()
}

/// `value` with exactly `decimals` places, ties rounded away from zero
/// (`0.03125` -> `0.0313` at four places).
pub fn format_fixed(value: f64, decimals: usize) -> String {
    let scale = 10f64.powi(decimals as i32);
    let rounded = (value * scale).round() / scale;
    format!("{rounded:.decimals$}")
}

/// Non-integral numbers below 1000 in magnitude get exactly four decimals;
/// everything else is shown as-is.
pub fn format_metric_value(value: &MetricValue) -> String {
    match value {
        MetricValue::Float(v) if v.fract() != 0.0 && v.abs() < 1000.0 => format_fixed(*v, 4),
        other => other.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricCard {
    pub label: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Plot {
    pub kind: VisualizationKind,
    pub title: &'static str,
    /// Base64 image data, without any `data:` URL prefix.
    pub payload: String,
}

impl Plot {
    pub fn decode(&self) -> std::result::Result<Vec<u8>, base64::DecodeError> {
        STANDARD.decode(self.payload.trim())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResultsPage {
    pub model_name: String,
    pub metrics: Vec<MetricCard>,
    pub explanation: String,
    pub plots: Vec<Plot>,
    /// Present only when the result carries a model id.
    pub download_url: Option<String>,
}

impl ResultsPage {
    pub fn new<R: RemoteService>(result: &TrainingResult, service: &R) -> Self {
        Self {
            model_name: result.model_name.clone(),
            metrics: result
                .metrics
                .iter()
                .map(|(key, value)| MetricCard {
                    label: format_key(key),
                    value: format_metric_value(value),
                })
                .collect(),
            explanation: result.explanation.clone(),
            plots: result
                .visualizations
                .present()
                .map(|(kind, payload)| Plot {
                    kind,
                    title: kind.title(),
                    payload: strip_data_url(payload).to_string(),
                })
                .collect(),
            download_url: result.model_id.as_deref().map(|id| service.download_url(id)),
        }
    }

    /// Writes each plot as `<kind>.png` under `dir`. Undecodable plots are skipped.
    pub fn export_plots(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(dir)?;
        let mut written = vec![];
        for plot in &self.plots {
            let bytes = match plot.decode() {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(plot = plot.kind.key(), "skipping undecodable plot: {}", e);
                    continue;
                }
            };
            let path = dir.join(format!("{}.png", plot.kind.key()));
            fs::write(&path, bytes)?;
            written.push(path);
        }
        Ok(written)
    }
}

/// What the results page shows.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultsView {
    /// Nothing trained yet (or the stored result was unreadable). Not an error.
    Missing,
    Ready(ResultsPage),
}

impl ResultsView {
    pub fn load<S: SessionStore, R: RemoteService>(session: &Session<S>, service: &R) -> Result<Self> {
        Ok(match session.training_result()? {
            Some(result) => ResultsView::Ready(ResultsPage::new(&result, service)),
            None => ResultsView::Missing,
        })
    }

    /// The single way out of the empty state.
    pub fn missing_action() -> (&'static str, Route) {
        (START_NEW_EXPERIMENT, Route::Configure)
    }
}

fn strip_data_url(payload: &str) -> &str {
    match payload.split_once(',') {
        Some((head, data)) if head.starts_with("data:") => data,
        _ => payload,
    }
}
