//! History page: past experiments with one headline metric each.

use chrono::{DateTime, Local, NaiveDateTime, Utc};
use serde_json::{Map, Value};
use tracing::error;

use crate::error::{Result, WorkflowError, HISTORY_FAILED};
use crate::lifecycle::CallSlot;
use crate::models::{HistoryEntry, TaskType};
use crate::presenter::format_fixed;
use crate::service::RemoteService;

pub const NO_HISTORY: &str = "No experiments yet. Train a model to see it here.";
pub const NOT_AVAILABLE: &str = "N/A";

const ACCURACY_KEYS: &[&str] = &["accuracy", "Accuracy"];
const R2_KEYS: &[&str] = &["r2", "R2", "r2_score"];
const SILHOUETTE_KEYS: &[&str] = &["silhouette", "Silhouette"];

/// `0.8567` -> `85.7%`.
pub fn format_percentage(value: f64) -> String {
    format!("{}%", format_fixed(value * 100.0, 1))
}

/// `0.912345` -> `0.91`.
pub fn format_two_decimals(value: f64) -> String {
    format_fixed(value, 2)
}

/// The headline for an entry, e.g. `Acc: 85.7%`, `R²: N/A`, or `N/A` for unknown tasks.
pub fn headline(task_type: &str, metrics: Option<&Map<String, Value>>) -> String {
    let Ok(task) = task_type.parse::<TaskType>() else {
        return NOT_AVAILABLE.to_string();
    };
    let Some(metrics) = metrics else {
        return NOT_AVAILABLE.to_string();
    };

    let (label, keys, format): (&str, &[&str], fn(f64) -> String) = match task {
        TaskType::Classification => ("Acc", ACCURACY_KEYS, format_percentage),
        TaskType::Regression => ("R²", R2_KEYS, format_two_decimals),
        TaskType::Clustering => ("Silhouette", SILHOUETTE_KEYS, format_two_decimals),
    };

    match lookup(metrics, keys) {
        Some(value) => format!("{label}: {}", format(value)),
        None => format!("{label}: {NOT_AVAILABLE}"),
    }
}

/// First present key wins. Stored experiments may keep the scores one level
/// down, under `metrics.metrics`.
fn lookup(metrics: &Map<String, Value>, keys: &[&str]) -> Option<f64> {
    find_number(metrics, keys).or_else(|| {
        metrics
            .get("metrics")
            .and_then(Value::as_object)
            .and_then(|inner| find_number(inner, keys))
    })
}

fn find_number(map: &Map<String, Value>, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|key| map.get(*key).and_then(as_number))
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// `14:05, 01 Mar, 2025` in local time, or the raw text when it is not a timestamp.
pub fn format_created_at(raw: Option<&str>) -> String {
    let Some(raw) = raw else {
        return String::new();
    };
    let parsed = DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").map(|dt| dt.and_utc()));
    match parsed {
        Ok(dt) => dt.with_timezone(&Local).format("%H:%M, %d %b, %Y").to_string(),
        Err(_) => raw.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryRow {
    pub id: String,
    pub model_name: String,
    pub task_type: String,
    pub dataset_name: String,
    pub headline: String,
    pub created_at: String,
}

impl From<&HistoryEntry> for HistoryRow {
    fn from(entry: &HistoryEntry) -> Self {
        Self {
            id: entry.id.to_string(),
            model_name: entry.model_name.clone(),
            task_type: entry.task_type.clone(),
            dataset_name: entry.dataset_name.clone(),
            headline: headline(&entry.task_type, entry.metrics.as_ref()),
            created_at: format_created_at(entry.created_at.as_deref()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum HistoryView {
    /// No past experiments: shown as [`NO_HISTORY`], never as a blank list.
    Empty,
    Entries(Vec<HistoryRow>),
}

impl HistoryView {
    pub fn from_entries(entries: &[HistoryEntry]) -> Self {
        if entries.is_empty() {
            HistoryView::Empty
        } else {
            HistoryView::Entries(entries.iter().map(HistoryRow::from).collect())
        }
    }
}

/// The history page. Read-only; keeps nothing beyond the current visit.
pub struct HistoryViewer<'a, R> {
    service: &'a R,
    slot: CallSlot,
}

impl<'a, R: RemoteService> HistoryViewer<'a, R> {
    pub fn new(service: &'a R) -> Self {
        Self {
            service,
            slot: CallSlot::new(),
        }
    }

    pub async fn list(&self) -> Result<HistoryView> {
        let entries = self
            .slot
            .run("history", self.service.history())
            .await?
            .map_err(|e| {
                error!("history fetch failed: {}", e);
                WorkflowError::HistoryFetch(e.user_message(HISTORY_FAILED))
            })?;
        Ok(HistoryView::from_entries(&entries))
    }

    pub fn deactivate(&self) {
        self.slot.cancel();
    }
}
