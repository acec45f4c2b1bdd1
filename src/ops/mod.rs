pub mod complexity;
pub mod delete;
pub mod expand;
pub mod import;
pub mod search;
pub mod task_ops;

use tokio_util::sync::CancellationToken;

use crate::error::ServiceError;

/// One structured progress message from a running service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progress {
    pub stage: String,
    pub current: usize,
    pub total: usize,
    pub message: String,
}

impl Progress {
    pub fn new(stage: &str, current: usize, total: usize, message: impl Into<String>) -> Self {
        Progress {
            stage: stage.to_string(),
            current,
            total,
            message: message.into(),
        }
    }

    /// Completed fraction in `0.0..=1.0`. Unknown totals report zero.
    pub fn ratio(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            (self.current.min(self.total) as f64) / (self.total as f64)
        }
    }
}

pub(crate) fn check_cancelled(cancel: &CancellationToken) -> Result<(), ServiceError> {
    if cancel.is_cancelled() {
        Err(ServiceError::Cancelled)
    } else {
        Ok(())
    }
}
