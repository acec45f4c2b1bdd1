use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::error::ServiceError;
use crate::io::task_store::TaskStore;
use crate::ops::complexity::{self, AnalyzeParams};
use crate::ops::delete::{self, DeleteParams};
use crate::ops::expand::{self, ExpandParams};
use crate::ops::import::{self, ImportParams};
use crate::workflow::{ProgressReporter, WorkflowOutput};

pub trait Job:
    FnOnce(&ProgressReporter, &CancellationToken) -> Result<WorkflowOutput, ServiceError>
    + Send
    + 'static
{
}

impl<F> Job for F where
    F: FnOnce(&ProgressReporter, &CancellationToken) -> Result<WorkflowOutput, ServiceError>
        + Send
        + 'static
{
}

pub fn analyze(store: TaskStore, params: AnalyzeParams) -> impl Job {
    move |reporter: &ProgressReporter, cancel: &CancellationToken| {
        let mut on_progress = reporter.callback();
        complexity::analyze_with_progress(&store, &params, cancel, &mut on_progress)
            .map(WorkflowOutput::Complexity)
    }
}

pub fn import(store: TaskStore, params: ImportParams) -> impl Job {
    move |reporter: &ProgressReporter, cancel: &CancellationToken| {
        let mut on_progress = reporter.callback();
        import::import_with_progress(&store, &params, cancel, &mut on_progress)
            .map(WorkflowOutput::Import)
    }
}

pub fn expand(store: TaskStore, params: ExpandParams) -> impl Job {
    move |reporter: &ProgressReporter, cancel: &CancellationToken| {
        let mut on_progress = reporter.callback();
        expand::expand_with_progress(&store, &params, cancel, &mut on_progress)
            .map(WorkflowOutput::Expand)
    }
}

pub fn delete(store: TaskStore, params: DeleteParams) -> impl Job {
    move |reporter: &ProgressReporter, cancel: &CancellationToken| {
        let mut on_progress = reporter.callback();
        delete::delete_with_progress(&store, &params, Utc::now(), cancel, &mut on_progress)
            .map(WorkflowOutput::Delete)
    }
}

pub fn undo(store: TaskStore, token_id: String) -> impl Job {
    move |_: &ProgressReporter, _: &CancellationToken| {
        delete::undo(&store, &token_id, Utc::now()).map(|restored| WorkflowOutput::Undo { restored })
    }
}
