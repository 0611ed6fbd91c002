//! mlstudio-core: the workflow core of the mlstudio experiment wizard.
//!
//! Upload a dataset, configure an experiment, train it remotely, inspect the
//! result. Every step reads and writes the [`Session`] only; nothing passes
//! state between pages directly, so any page can be re-entered after a reload.

pub mod catalog;
pub mod config;
pub mod configurator;
pub mod error;
pub mod history;
pub mod intake;
mod lifecycle;
pub mod models;
pub mod normalizer;
pub mod presenter;
pub mod service;
pub mod session;
pub mod workflow;

pub use config::ClientConfig;
pub use configurator::{Configurator, ExperimentForm};
pub use error::{Result, ServiceError, WorkflowError};
pub use history::{HistoryView, HistoryViewer};
pub use intake::Intake;
pub use models::{
    DatasetHandle, ExperimentConfig, HistoryEntry, MetricValue, Metrics, TaskType,
    TrainingResult, VisualizationKind, Visualizations,
};
pub use presenter::ResultsView;
pub use service::{RemoteService, UploadFile, UploadResponse};
pub use session::{FileStore, MemoryStore, Session, SessionKey, SessionStore};
pub use workflow::{Activation, Route, WorkflowEvent, WorkflowState};
