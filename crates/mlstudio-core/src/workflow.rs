//! The wizard as an explicit state machine.
//!
//! Pages do not check predecessor state ad hoc: they ask [`resolve`] where a
//! request should land and follow the answer.

use crate::error::{Result, WorkflowError};
use crate::session::{Session, SessionStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowState {
    NeedsDataset,
    Configuring,
    Training,
    HasResult,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowEvent {
    DatasetUploaded,
    TrainingStarted,
    TrainingSucceeded,
    TrainingFailed,
    DatasetInvalidated,
}

/// Pages of the wizard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Intake,
    Configure,
    Results,
    History,
}

impl Route {
    pub fn as_str(self) -> &'static str {
        match self {
            Route::Intake => "upload",
            Route::Configure => "configure",
            Route::Results => "results",
            Route::History => "history",
        }
    }
}

/// Outcome of entering a page: ready to use, or sent elsewhere.
#[derive(Debug)]
pub enum Activation<T> {
    Ready(T),
    Redirect(Route),
}

impl WorkflowState {
    /// Reconstructs the state from persisted session data, purging anything corrupt.
    pub fn derive<S: SessionStore>(session: &Session<S>) -> Result<Self> {
        let has_dataset = session.dataset()?.is_some();
        let has_result = session.training_result()?.is_some();
        Ok(match (has_dataset, has_result) {
            (_, true) => WorkflowState::HasResult,
            (true, false) => WorkflowState::Configuring,
            (false, false) => WorkflowState::NeedsDataset,
        })
    }

    pub fn transition(self, event: WorkflowEvent) -> Result<Self> {
        use WorkflowEvent::*;
        use WorkflowState::*;

        let next = match (self, event) {
            (_, DatasetInvalidated) => NeedsDataset,
            (NeedsDataset | Configuring | HasResult, DatasetUploaded) => Configuring,
            (Configuring | HasResult, TrainingStarted) => Training,
            (Training, TrainingSucceeded) => HasResult,
            (Training, TrainingFailed) => Configuring,
            (from, event) => return Err(WorkflowError::InvalidTransition { from, event }),
        };
        Ok(next)
    }

    /// The page a user in this state should be looking at.
    pub fn home(self) -> Route {
        match self {
            WorkflowState::NeedsDataset => Route::Intake,
            WorkflowState::Configuring | WorkflowState::Training => Route::Configure,
            WorkflowState::HasResult => Route::Results,
        }
    }
}

/// Where a request for `requested` actually lands.
///
/// Configuration needs a usable dataset; results and history are always
/// reachable (results has its own empty state).
pub fn resolve<S: SessionStore>(requested: Route, session: &Session<S>) -> Result<Route> {
    match requested {
        Route::Configure if session.dataset()?.is_none() => Ok(Route::Intake),
        route => Ok(route),
    }
}
