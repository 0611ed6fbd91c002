//! Data models for the mlstudio workflow.

use std::fmt;
use std::str::FromStr;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::WorkflowError;

/// Kind of learning task an experiment runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskType {
    Classification,
    Regression,
    Clustering,
}

impl TaskType {
    pub const ALL: [TaskType; 3] = [
        TaskType::Classification,
        TaskType::Regression,
        TaskType::Clustering,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TaskType::Classification => "Classification",
            TaskType::Regression => "Regression",
            TaskType::Clustering => "Clustering",
        }
    }

    /// Supervised tasks need a target column and a test split.
    pub fn is_supervised(self) -> bool {
        !matches!(self, TaskType::Clustering)
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskType {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| WorkflowError::Validation(format!("Unknown task type `{s}`.")))
    }
}

/// Identity and schema of an uploaded dataset, as the remote service knows it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetHandle {
    pub name: String,
    /// Column names in schema order.
    #[serde(default)]
    pub columns: Vec<String>,
}

impl DatasetHandle {
    pub fn new(name: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            name: name.into(),
            columns,
        }
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }
}

/// The training request submitted to the remote service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentConfig {
    pub dataset_name: String,
    pub task_type: TaskType,
    pub model_name: String,
    /// `None` for clustering.
    pub target_column: Option<String>,
    pub test_size: f64,
    pub random_state: u64,
    pub use_scaling: bool,
    pub use_cross_validation: bool,
}

/// A single metric value: number or text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl MetricValue {
    /// Converts a JSON value; arrays, objects, booleans and nulls have no metric form.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Some(MetricValue::Int(i)),
                None => n.as_f64().map(MetricValue::Float),
            },
            serde_json::Value::String(s) => Some(MetricValue::Text(s.clone())),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetricValue::Int(i) => Some(*i as f64),
            MetricValue::Float(f) => Some(*f),
            MetricValue::Text(_) => None,
        }
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Int(i) => write!(f, "{i}"),
            MetricValue::Float(v) => write!(f, "{v}"),
            MetricValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<f64> for MetricValue {
    fn from(v: f64) -> Self {
        MetricValue::Float(v)
    }
}
impl From<i64> for MetricValue {
    fn from(v: i64) -> Self {
        MetricValue::Int(v)
    }
}
impl From<i32> for MetricValue {
    fn from(v: i32) -> Self {
        MetricValue::Int(v as i64)
    }
}
impl From<String> for MetricValue {
    fn from(v: String) -> Self {
        MetricValue::Text(v)
    }
}
impl From<&str> for MetricValue {
    fn from(v: &str) -> Self {
        MetricValue::Text(v.to_string())
    }
}

/// Metric name to value, kept in insertion order (which is display order).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metrics(Vec<(String, MetricValue)>);

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a metric. A replaced key keeps its position.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<MetricValue>) -> Option<MetricValue> {
        let key = key.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.0.push((key, value));
                None
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&MetricValue> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MetricValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<MetricValue>> FromIterator<(K, V)> for Metrics {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut metrics = Metrics::new();
        for (k, v) in iter {
            metrics.insert(k, v);
        }
        metrics
    }
}

impl Serialize for Metrics {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Metrics {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct MetricsVisitor;

        impl<'de> Visitor<'de> for MetricsVisitor {
            type Value = Metrics;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of metric names to numbers or strings")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Metrics, A::Error> {
                let mut metrics = Metrics::new();
                while let Some((key, value)) = access.next_entry::<String, serde_json::Value>()? {
                    match MetricValue::from_json(&value) {
                        Some(v) => {
                            metrics.insert(key, v);
                        }
                        None => tracing::debug!(metric = %key, "dropping non-scalar metric"),
                    }
                }
                Ok(metrics)
            }
        }

        deserializer.deserialize_map(MetricsVisitor)
    }
}

/// The fixed set of plots a training run can return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VisualizationKind {
    ConfusionMatrix,
    FeatureImportance,
    ResidualPlot,
    ClusterPlot,
}

impl VisualizationKind {
    pub const ALL: [VisualizationKind; 4] = [
        VisualizationKind::ConfusionMatrix,
        VisualizationKind::FeatureImportance,
        VisualizationKind::ResidualPlot,
        VisualizationKind::ClusterPlot,
    ];

    pub fn key(self) -> &'static str {
        match self {
            VisualizationKind::ConfusionMatrix => "confusion_matrix",
            VisualizationKind::FeatureImportance => "feature_importance",
            VisualizationKind::ResidualPlot => "residual_plot",
            VisualizationKind::ClusterPlot => "cluster_plot",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            VisualizationKind::ConfusionMatrix => "Confusion Matrix",
            VisualizationKind::FeatureImportance => "Feature Importance",
            VisualizationKind::ResidualPlot => "Residuals",
            VisualizationKind::ClusterPlot => "Cluster Visualization",
        }
    }
}

/// Base64 image payloads, one optional slot per [`VisualizationKind`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Visualizations {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confusion_matrix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_importance: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub residual_plot: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_plot: Option<String>,
}

impl Visualizations {
    pub fn get(&self, kind: VisualizationKind) -> Option<&str> {
        let slot = match kind {
            VisualizationKind::ConfusionMatrix => &self.confusion_matrix,
            VisualizationKind::FeatureImportance => &self.feature_importance,
            VisualizationKind::ResidualPlot => &self.residual_plot,
            VisualizationKind::ClusterPlot => &self.cluster_plot,
        };
        slot.as_deref().filter(|payload| !payload.is_empty())
    }

    /// Present plots, in display order.
    pub fn present(&self) -> impl Iterator<Item = (VisualizationKind, &str)> {
        VisualizationKind::ALL
            .into_iter()
            .filter_map(move |kind| self.get(kind).map(|payload| (kind, payload)))
    }
}

pub const DEFAULT_EXPLANATION: &str = "No explanation available.";

fn default_explanation() -> String {
    DEFAULT_EXPLANATION.to_string()
}

/// Canonical result of one training run: the only shape the results page reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingResult {
    #[serde(default)]
    pub model_name: String,
    /// Absent means no artifact download is offered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,
    #[serde(default)]
    pub metrics: Metrics,
    #[serde(default = "default_explanation")]
    pub explanation: String,
    #[serde(default)]
    pub visualizations: Visualizations,
}

/// Remote identifier of a past experiment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntryId {
    Number(i64),
    Text(String),
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryId::Number(n) => write!(f, "{n}"),
            EntryId::Text(s) => f.write_str(s),
        }
    }
}

/// A past experiment as listed by the remote history store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: EntryId,
    #[serde(default)]
    pub model_name: String,
    /// Kept as text: entries with task types this client does not know still list.
    #[serde(default)]
    pub task_type: String,
    #[serde(default)]
    pub dataset_name: String,
    #[serde(default)]
    pub metrics: Option<serde_json::Map<String, serde_json::Value>>,
    #[serde(default)]
    pub created_at: Option<String>,
}
