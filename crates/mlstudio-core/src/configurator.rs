//! Experiment configurator: the form, its validation rules, and the training call.

use std::ops::RangeInclusive;

use tracing::{error, info};

use crate::error::{Result, WorkflowError, TRAIN_FAILED};
use crate::lifecycle::CallSlot;
use crate::models::{DatasetHandle, ExperimentConfig, TaskType, TrainingResult};
use crate::normalizer;
use crate::service::RemoteService;
use crate::session::{Session, SessionStore};
use crate::workflow::{Activation, Route};

pub const TARGET_REQUIRED: &str = "Target column is required for supervised learning.";
pub const TEST_SIZE_RANGE: RangeInclusive<f64> = 0.1..=0.5;
pub const DEFAULT_TEST_SIZE: f64 = 0.2;
pub const DEFAULT_RANDOM_STATE: u64 = 42;

/// Field values of the configuration page.
///
/// Setters keep the model inside the task's catalog and the test size inside
/// [`TEST_SIZE_RANGE`]; the target column is only checked on submit.
#[derive(Debug, Clone, PartialEq)]
pub struct ExperimentForm {
    dataset: DatasetHandle,
    task_type: TaskType,
    model_name: String,
    target_column: String,
    test_size: f64,
    use_scaling: bool,
}

impl ExperimentForm {
    pub fn new(dataset: DatasetHandle) -> Self {
        let task_type = TaskType::Classification;
        Self {
            dataset,
            task_type,
            model_name: task_type.default_model().to_string(),
            target_column: String::new(),
            test_size: DEFAULT_TEST_SIZE,
            use_scaling: true,
        }
    }

    pub fn dataset(&self) -> &DatasetHandle {
        &self.dataset
    }

    pub fn task_type(&self) -> TaskType {
        self.task_type
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// The selected target, trimmed. `None` while no target is selected.
    pub fn target_column(&self) -> Option<&str> {
        Some(self.target_column.trim()).filter(|t| !t.is_empty())
    }

    pub fn test_size(&self) -> f64 {
        self.test_size
    }

    pub fn use_scaling(&self) -> bool {
        self.use_scaling
    }

    /// Switching task resets the model to the new catalog's first entry.
    pub fn set_task_type(&mut self, task_type: TaskType) {
        if self.task_type != task_type {
            self.task_type = task_type;
            self.model_name = task_type.default_model().to_string();
        }
    }

    pub fn set_model(&mut self, model_name: &str) -> Result<()> {
        if !self.task_type.offers_model(model_name) {
            return Err(WorkflowError::Validation(format!(
                "`{model_name}` is not a {} model. Choose one of: {}.",
                self.task_type,
                self.task_type.models().join(", ")
            )));
        }
        self.model_name = model_name.to_string();
        Ok(())
    }

    pub fn set_target_column(&mut self, column: impl Into<String>) {
        self.target_column = column.into();
    }

    pub fn set_test_size(&mut self, test_size: f64) -> Result<()> {
        if !TEST_SIZE_RANGE.contains(&test_size) {
            return Err(WorkflowError::Validation(format!(
                "Test size must be between {} and {}.",
                TEST_SIZE_RANGE.start(),
                TEST_SIZE_RANGE.end()
            )));
        }
        self.test_size = test_size;
        Ok(())
    }

    pub fn set_use_scaling(&mut self, use_scaling: bool) {
        self.use_scaling = use_scaling;
    }

    /// Submit-time rules. Enforced whether or not a UI shows the target field.
    pub fn validate(&self) -> Result<()> {
        if !self.task_type.is_supervised() {
            return Ok(());
        }
        let Some(target) = self.target_column() else {
            return Err(WorkflowError::Validation(TARGET_REQUIRED.to_string()));
        };
        // An empty schema means the service did not report columns; trust the user.
        if !self.dataset.columns.is_empty() && !self.dataset.has_column(target) {
            return Err(WorkflowError::Validation(format!(
                "Target column `{target}` is not a column of `{}`.",
                self.dataset.name
            )));
        }
        Ok(())
    }

    pub fn is_submittable(&self) -> bool {
        self.validate().is_ok()
    }

    /// The training request for the current field values.
    pub fn build(&self) -> Result<ExperimentConfig> {
        self.validate()?;
        Ok(ExperimentConfig {
            dataset_name: self.dataset.name.clone(),
            task_type: self.task_type,
            model_name: self.model_name.clone(),
            target_column: if self.task_type.is_supervised() {
                self.target_column().map(str::to_string)
            } else {
                None
            },
            test_size: self.test_size,
            random_state: DEFAULT_RANDOM_STATE,
            use_scaling: self.use_scaling,
            use_cross_validation: false,
        })
    }
}

/// The configuration page. Owns a single training call at a time.
pub struct Configurator<'a, S, R> {
    session: &'a Session<S>,
    service: &'a R,
    form: ExperimentForm,
    slot: CallSlot,
}

impl<'a, S: SessionStore, R: RemoteService> Configurator<'a, S, R> {
    /// Enters the page. Without a usable dataset the user is sent to upload
    /// and any half-written dataset state is cleared.
    pub fn activate(session: &'a Session<S>, service: &'a R) -> Result<Activation<Self>> {
        match session.dataset()? {
            Some(dataset) => Ok(Activation::Ready(Self {
                session,
                service,
                form: ExperimentForm::new(dataset),
                slot: CallSlot::new(),
            })),
            None => {
                info!("no usable dataset in session, redirecting to upload");
                Ok(Activation::Redirect(Route::Intake))
            }
        }
    }

    pub fn form(&self) -> &ExperimentForm {
        &self.form
    }

    pub fn form_mut(&mut self) -> &mut ExperimentForm {
        &mut self.form
    }

    /// Trains with the current form and hands the envelope to the normalizer.
    ///
    /// Validation failures never reach the network. Failures leave the form
    /// as it was so the user can retry.
    pub async fn submit(&self) -> Result<TrainingResult> {
        let config = self.form.build()?;
        info!(
            dataset = %config.dataset_name,
            task = %config.task_type,
            model = %config.model_name,
            "starting training"
        );

        let envelope = self
            .slot
            .run("training", self.service.train(&config))
            .await?
            .map_err(|e| {
                error!(model = %config.model_name, "training failed: {}", e);
                WorkflowError::Train(e.user_message(TRAIN_FAILED))
            })?;

        let result = normalizer::persist(self.session, &envelope)?;
        info!(model = %result.model_name, metrics = result.metrics.len(), "training finished");
        Ok(result)
    }

    pub fn is_pending(&self) -> bool {
        self.slot.is_busy()
    }

    /// Leaves the page. A pending training call is abandoned and its result discarded.
    pub fn deactivate(&self) {
        self.slot.cancel();
    }
}
