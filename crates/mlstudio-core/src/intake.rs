//! Dataset intake: validate a file, upload it, record its schema.

use tracing::{error, info};

use crate::error::{Result, WorkflowError, UPLOAD_FAILED};
use crate::lifecycle::CallSlot;
use crate::models::DatasetHandle;
use crate::service::{RemoteService, UploadFile};
use crate::session::{Session, SessionStore};

pub const NOT_A_CSV: &str = "Please upload a valid CSV file.";

/// Rejects anything without a `.csv` suffix.
pub fn check_file_name(file_name: &str) -> Result<()> {
    if file_name.ends_with(".csv") {
        Ok(())
    } else {
        Err(WorkflowError::Validation(NOT_A_CSV.to_string()))
    }
}

/// The upload page.
pub struct Intake<'a, S, R> {
    session: &'a Session<S>,
    service: &'a R,
    slot: CallSlot,
}

impl<'a, S: SessionStore, R: RemoteService> Intake<'a, S, R> {
    pub fn new(session: &'a Session<S>, service: &'a R) -> Self {
        Self {
            session,
            service,
            slot: CallSlot::new(),
        }
    }

    /// Uploads `file` and makes it the current dataset.
    ///
    /// Every submission is a new upload. On failure the session is untouched.
    pub async fn submit(&self, file: &UploadFile) -> Result<DatasetHandle> {
        check_file_name(&file.file_name)?;

        let response = self
            .slot
            .run("upload", self.service.upload(file))
            .await?
            .map_err(|e| {
                error!(file = %file.file_name, "upload failed: {}", e);
                WorkflowError::Upload(e.user_message(UPLOAD_FAILED))
            })?;

        let columns = response.details.and_then(|d| d.columns).unwrap_or_default();
        let name = if response.filename.is_empty() {
            file.file_name.clone()
        } else {
            response.filename
        };
        let dataset = DatasetHandle::new(name, columns);
        self.session.save_dataset(&dataset)?;

        info!(dataset = %dataset.name, columns = dataset.columns.len(), "dataset uploaded");
        Ok(dataset)
    }

    pub fn is_pending(&self) -> bool {
        self.slot.is_busy()
    }

    /// Leaves the page. A pending upload is abandoned and will not touch the session.
    pub fn deactivate(&self) {
        self.slot.cancel();
    }
}
