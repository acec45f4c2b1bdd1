pub mod delete_flow;
pub mod dialog;
pub mod hold;
pub mod jobs;
pub mod orchestrator;
pub mod undo;

use std::fmt;
use std::path::PathBuf;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;

use crate::error::ServiceError;
use crate::ops::complexity::ComplexityReport;
use crate::ops::delete::DeleteSummary;
use crate::ops::expand::ExpandSummary;
use crate::ops::import::ImportSummary;

pub use crate::ops::Progress;
pub use orchestrator::Orchestrator;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum WorkflowKind {
    Complexity,
    Import,
    Expand,
    Delete,
    Undo,
}

impl WorkflowKind {
    pub fn label(self) -> &'static str {
        match self {
            WorkflowKind::Complexity => "Analyze complexity",
            WorkflowKind::Import => "Import document",
            WorkflowKind::Expand => "Expand task",
            WorkflowKind::Delete => "Delete tasks",
            WorkflowKind::Undo => "Undo delete",
        }
    }

    /// Title used when the workflow fails
    pub fn failure_title(self) -> String {
        format!("{} failed", self.label())
    }
}

impl fmt::Display for WorkflowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// What a running workflow covers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowScope {
    AllTasks,
    PendingTasks,
    Selected(Vec<String>),
    Document(PathBuf),
    Token(String),
}

impl WorkflowScope {
    pub fn describe(&self) -> String {
        match self {
            WorkflowScope::AllTasks => "all tasks".into(),
            WorkflowScope::PendingTasks => "pending tasks".into(),
            WorkflowScope::Selected(ids) if ids.len() == 1 => format!("task {}", ids[0]),
            WorkflowScope::Selected(ids) => format!("{} selected tasks", ids.len()),
            WorkflowScope::Document(path) => path.display().to_string(),
            WorkflowScope::Token(token) => format!("token {}", token),
        }
    }
}

/// Successful result of a workflow
#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowOutput {
    Complexity(ComplexityReport),
    Import(ImportSummary),
    Expand(ExpandSummary),
    Delete(DeleteSummary),
    Undo { restored: usize },
}

/// One message on a workflow channel
#[derive(Debug)]
pub enum WorkflowEvent {
    Progress(Progress),
    Completed(WorkflowOutput),
    Failed(ServiceError),
    Cancelled,
    /// The channel closed without an explicit completion
    StreamClosed,
}

impl WorkflowEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, WorkflowEvent::Progress(_))
    }
}

/// A consumed workflow event, tagged with its source
#[derive(Debug)]
pub struct WorkflowMessage {
    pub kind: WorkflowKind,
    pub generation: u64,
    pub event: WorkflowEvent,
}

/// "Wait for the next message" request handed back to the event loop.
/// Stale requests (from a replaced workflow) are ignored when armed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Await {
    pub kind: WorkflowKind,
    pub generation: u64,
}

/// Lifecycle of one workflow kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WorkflowPhase {
    #[default]
    Idle,
    Scoping,
    Running,
    Completed,
    Failed,
    Cancelled,
}

/// Sending half handed to the background unit.
///
/// Progress is forwarded with `try_send`: a full channel drops the message
/// rather than blocking the worker, and nothing is sent once cancelled.
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    tx: mpsc::Sender<WorkflowEvent>,
    cancel: CancellationToken,
}

impl ProgressReporter {
    pub(crate) fn new(tx: mpsc::Sender<WorkflowEvent>, cancel: CancellationToken) -> Self {
        ProgressReporter { tx, cancel }
    }

    pub fn report(&self, progress: Progress) {
        if self.cancel.is_cancelled() {
            return;
        }
        match self.tx.try_send(WorkflowEvent::Progress(progress)) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                tracing::trace!("progress channel full; dropping update");
            }
            Err(TrySendError::Closed(_)) => {}
        }
    }

    /// Adapter for the services' `on_progress` callbacks
    pub fn callback(&self) -> impl FnMut(Progress) + '_ {
        move |p| self.report(p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_progress_is_non_terminal() {
        assert!(!WorkflowEvent::Progress(Progress::new("x", 0, 1, "")).is_terminal());
        assert!(WorkflowEvent::Cancelled.is_terminal());
        assert!(WorkflowEvent::StreamClosed.is_terminal());
        assert!(WorkflowEvent::Failed(ServiceError::Operation("x".into())).is_terminal());
    }

    #[test]
    fn reporter_drops_when_full_and_after_cancel() {
        let (tx, mut rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();
        let reporter = ProgressReporter::new(tx, cancel.clone());

        reporter.report(Progress::new("a", 1, 3, ""));
        reporter.report(Progress::new("a", 2, 3, ""));
        assert!(matches!(rx.try_recv(), Ok(WorkflowEvent::Progress(p)) if p.current == 1));
        assert!(rx.try_recv().is_err());

        cancel.cancel();
        reporter.report(Progress::new("a", 3, 3, ""));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn scope_descriptions() {
        assert_eq!(WorkflowScope::Selected(vec!["3".into()]).describe(), "task 3");
        assert_eq!(
            WorkflowScope::Selected(vec!["3".into(), "4".into()]).describe(),
            "2 selected tasks"
        );
    }
}
