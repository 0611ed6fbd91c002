//! One-at-a-time remote calls scoped to a page's lifetime.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio_util::sync::CancellationToken;

use crate::error::{Result, WorkflowError};

/// Admits one in-flight call at a time and abandons it when the owning page
/// is deactivated.
#[derive(Debug, Default)]
pub(crate) struct CallSlot {
    busy: AtomicBool,
    token: CancellationToken,
}

impl CallSlot {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub(crate) fn cancel(&self) {
        self.token.cancel();
    }

    /// Drives `call` unless another call is pending (`Busy`) or the slot was
    /// cancelled before or during the call (`Cancelled`). A cancelled call's
    /// output is dropped, so nothing downstream of it runs.
    pub(crate) async fn run<T, F>(&self, action: &'static str, call: F) -> Result<T>
    where
        F: Future<Output = T>,
    {
        if self.token.is_cancelled() {
            return Err(WorkflowError::Cancelled(action));
        }
        if self.busy.swap(true, Ordering::AcqRel) {
            return Err(WorkflowError::Busy(action));
        }
        let _release = Release(&self.busy);

        tokio::select! {
            biased;

            _ = self.token.cancelled() => Err(WorkflowError::Cancelled(action)),
            out = call => Ok(out),
        }
    }
}

struct Release<'a>(&'a AtomicBool);

impl Drop for Release<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
