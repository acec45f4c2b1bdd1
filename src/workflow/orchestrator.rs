use std::any::Any;
use std::collections::BTreeMap;
use std::time::Instant;

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio_util::sync::CancellationToken;

use crate::error::ServiceError;
use crate::workflow::{
    Await, Progress, ProgressReporter, WorkflowEvent, WorkflowKind, WorkflowMessage,
    WorkflowOutput, WorkflowPhase, WorkflowScope,
};

const CHANNEL_CAPACITY: usize = 32;

struct Slot {
    generation: u64,
    scope: WorkflowScope,
    cancel: CancellationToken,
    rx: mpsc::Receiver<WorkflowEvent>,
    started_at: Instant,
    armed: bool,
    cancel_requested: bool,
    last_progress: Option<Progress>,
}

/// Snapshot of a running workflow for display
#[derive(Debug, Clone, PartialEq)]
pub struct RunningWorkflow {
    pub kind: WorkflowKind,
    pub scope: WorkflowScope,
    pub started_at: Instant,
    pub cancel_requested: bool,
    pub last_progress: Option<Progress>,
}

/// Each [`WorkflowKind`] has at most one live slot holding the receiving half
/// of a bounded channel and the run's cancellation token. The consumer reads
/// one message per arm; starting the same kind again cancels the previous run
/// and drops its channel.
pub struct Orchestrator {
    handle: Handle,
    slots: BTreeMap<WorkflowKind, Slot>,
    phases: BTreeMap<WorkflowKind, WorkflowPhase>,
    next_generation: u64,
}

impl Orchestrator {
    pub fn new(handle: Handle) -> Self {
        Orchestrator {
            handle,
            slots: BTreeMap::new(),
            phases: BTreeMap::new(),
            next_generation: 1,
        }
    }

    /// Run `job` on the blocking pool. Any running workflow of the same kind
    /// is cancelled and replaced. The returned [`Await`] must be armed before
    /// the first message can be read with [`Orchestrator::poll`].
    pub fn start<F>(&mut self, kind: WorkflowKind, scope: WorkflowScope, job: F) -> Await
    where
        F: FnOnce(&ProgressReporter, &CancellationToken) -> Result<WorkflowOutput, ServiceError>
            + Send
            + 'static,
    {
        if let Some(previous) = self.slots.remove(&kind) {
            tracing::info!(
                workflow = %kind,
                generation = previous.generation,
                "replacing running workflow"
            );
            previous.cancel.cancel();
        }

        let generation = self.next_generation;
        self.next_generation += 1;

        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let cancel = CancellationToken::new();
        let reporter = ProgressReporter::new(tx.clone(), cancel.clone());
        let token = cancel.clone();

        tracing::info!(workflow = %kind, generation, scope = %scope.describe(), "workflow started");

        self.handle.spawn(async move {
            let job_token = token.clone();
            let joined = tokio::task::spawn_blocking(move || job(&reporter, &job_token)).await;
            // A job that returned Ok committed its work, cancelled or not.
            let event = match joined {
                Ok(Ok(output)) => WorkflowEvent::Completed(output),
                Ok(Err(e)) if e.is_cancelled() || token.is_cancelled() => WorkflowEvent::Cancelled,
                Ok(Err(e)) => WorkflowEvent::Failed(e),
                Err(join_err) => {
                    let detail = if join_err.is_panic() {
                        panic_message(join_err.into_panic())
                    } else {
                        join_err.to_string()
                    };
                    tracing::error!(workflow = %kind, generation, %detail, "workflow crashed");
                    WorkflowEvent::Failed(ServiceError::Operation(format!(
                        "{} crashed: {}",
                        kind.label(),
                        detail
                    )))
                }
            };
            // The receiver is gone if this run was replaced.
            let _ = tx.send(event).await;
        });

        self.slots.insert(
            kind,
            Slot {
                generation,
                scope,
                cancel,
                rx,
                started_at: Instant::now(),
                armed: false,
                cancel_requested: false,
                last_progress: None,
            },
        );
        self.phases.insert(kind, WorkflowPhase::Running);
        Await { kind, generation }
    }

    /// Allow one message to be read for `wait`. Returns false for a stale
    /// request or a slot that is already armed.
    pub fn arm(&mut self, wait: Await) -> bool {
        match self.slots.get_mut(&wait.kind) {
            Some(slot) if slot.generation == wait.generation => {
                if slot.armed {
                    tracing::debug!(workflow = %wait.kind, "duplicate wait ignored");
                    false
                } else {
                    slot.armed = true;
                    true
                }
            }
            _ => {
                tracing::debug!(
                    workflow = %wait.kind,
                    generation = wait.generation,
                    "stale wait ignored"
                );
                false
            }
        }
    }

    /// Non-blocking read of every armed slot, at most one message each.
    pub fn poll(&mut self) -> Vec<WorkflowMessage> {
        let armed: Vec<WorkflowKind> = self
            .slots
            .iter()
            .filter(|(_, slot)| slot.armed)
            .map(|(kind, _)| *kind)
            .collect();

        let mut messages = Vec::new();
        for kind in armed {
            let Some(slot) = self.slots.get_mut(&kind) else {
                continue;
            };
            let received = match slot.rx.try_recv() {
                Ok(event) => Some(event),
                Err(TryRecvError::Empty) => continue,
                Err(TryRecvError::Disconnected) => None,
            };
            messages.extend(self.deliver(kind, received));
        }
        messages
    }

    /// Wait for the next message of `kind` regardless of arming. Used by
    /// callers that drive a single workflow to completion.
    pub async fn next(&mut self, kind: WorkflowKind) -> Option<WorkflowMessage> {
        let slot = self.slots.get_mut(&kind)?;
        let received = slot.rx.recv().await;
        self.deliver(kind, received)
    }

    fn deliver(
        &mut self,
        kind: WorkflowKind,
        received: Option<WorkflowEvent>,
    ) -> Option<WorkflowMessage> {
        let slot = self.slots.get_mut(&kind)?;
        slot.armed = false;
        let generation = slot.generation;

        let event = match received {
            Some(WorkflowEvent::Failed(_)) | None if slot.cancel_requested => {
                WorkflowEvent::Cancelled
            }
            Some(event) => event,
            None => WorkflowEvent::StreamClosed,
        };

        if let WorkflowEvent::Progress(progress) = &event {
            slot.last_progress = Some(progress.clone());
        }

        if event.is_terminal() {
            let elapsed_ms = slot.started_at.elapsed().as_millis() as u64;
            self.slots.remove(&kind);
            let phase = match &event {
                WorkflowEvent::Completed(_) => WorkflowPhase::Completed,
                WorkflowEvent::Cancelled => WorkflowPhase::Cancelled,
                _ => WorkflowPhase::Failed,
            };
            self.phases.insert(kind, phase);
            match &event {
                WorkflowEvent::Failed(e) => {
                    tracing::warn!(workflow = %kind, generation, elapsed_ms, error = %e, "workflow failed")
                }
                WorkflowEvent::StreamClosed => {
                    tracing::warn!(workflow = %kind, generation, "workflow stream closed without a result")
                }
                _ => tracing::info!(workflow = %kind, generation, elapsed_ms, ?phase, "workflow finished"),
            }
        }

        Some(WorkflowMessage {
            kind,
            generation,
            event,
        })
    }

    /// Request cancellation. The terminal message still has to be read. Work
    /// that finished before it saw the cancel is still reported as completed.
    pub fn cancel(&mut self, kind: WorkflowKind) -> bool {
        match self.slots.get_mut(&kind) {
            Some(slot) => {
                slot.cancel_requested = true;
                slot.cancel.cancel();
                tracing::info!(workflow = %kind, generation = slot.generation, "cancel requested");
                true
            }
            None => false,
        }
    }

    /// Cancel every running workflow and drop the channels (used on quit).
    pub fn shutdown(&mut self) {
        for (kind, slot) in std::mem::take(&mut self.slots) {
            slot.cancel.cancel();
            self.phases.insert(kind, WorkflowPhase::Cancelled);
        }
    }

    pub fn is_running(&self, kind: WorkflowKind) -> bool {
        self.slots.contains_key(&kind)
    }

    pub fn active_count(&self) -> usize {
        self.slots.len()
    }

    pub fn running(&self) -> Vec<RunningWorkflow> {
        self.slots
            .iter()
            .map(|(kind, slot)| RunningWorkflow {
                kind: *kind,
                scope: slot.scope.clone(),
                started_at: slot.started_at,
                cancel_requested: slot.cancel_requested,
                last_progress: slot.last_progress.clone(),
            })
            .collect()
    }

    pub fn phase(&self, kind: WorkflowKind) -> WorkflowPhase {
        self.phases.get(&kind).copied().unwrap_or_default()
    }

    /// A scope dialog for `kind` has opened
    pub fn begin_scoping(&mut self, kind: WorkflowKind) {
        if !self.is_running(kind) {
            self.phases.insert(kind, WorkflowPhase::Scoping);
        }
    }

    /// The scope dialog was dismissed, or the outcome was acknowledged
    pub fn settle(&mut self, kind: WorkflowKind) {
        if !self.is_running(kind) {
            self.phases.insert(kind, WorkflowPhase::Idle);
        }
    }

    /// Return every finished kind to `Idle` once its outcome has been seen.
    pub fn settle_finished(&mut self) {
        for phase in self.phases.values_mut() {
            if matches!(
                phase,
                WorkflowPhase::Completed | WorkflowPhase::Failed | WorkflowPhase::Cancelled
            ) {
                *phase = WorkflowPhase::Idle;
            }
        }
    }

    #[cfg(test)]
    fn adopt(
        &mut self,
        kind: WorkflowKind,
        rx: mpsc::Receiver<WorkflowEvent>,
        cancel: CancellationToken,
    ) -> Await {
        let generation = self.next_generation;
        self.next_generation += 1;
        self.slots.insert(
            kind,
            Slot {
                generation,
                scope: WorkflowScope::AllTasks,
                cancel,
                rx,
                started_at: Instant::now(),
                armed: false,
                cancel_requested: false,
                last_progress: None,
            },
        );
        self.phases.insert(kind, WorkflowPhase::Running);
        Await { kind, generation }
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        for slot in self.slots.values() {
            slot.cancel.cancel();
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    fn orchestrator() -> Orchestrator {
        Orchestrator::new(Handle::current())
    }

    async fn poll_until(orch: &mut Orchestrator) -> WorkflowMessage {
        for _ in 0..500 {
            if let Some(msg) = orch.poll().into_iter().next() {
                return msg;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("no workflow message arrived");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn progress_then_completion_needs_rearm() {
        let mut orch = orchestrator();
        let wait = orch.start(WorkflowKind::Import, WorkflowScope::AllTasks, |reporter, _| {
            reporter.report(Progress::new("parsing", 1, 2, "a"));
            reporter.report(Progress::new("parsing", 2, 2, "b"));
            Ok(WorkflowOutput::Undo { restored: 0 })
        });

        // Nothing is read until armed.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(orch.poll().is_empty());

        let mut seen = Vec::new();
        let mut wait = Some(wait);
        loop {
            if let Some(w) = wait.take() {
                assert!(orch.arm(w));
            }
            let msg = poll_until(&mut orch).await;
            if msg.event.is_terminal() {
                seen.push("done");
                assert!(matches!(msg.event, WorkflowEvent::Completed(_)));
                break;
            }
            seen.push("progress");
            wait = Some(Await {
                kind: msg.kind,
                generation: msg.generation,
            });
        }
        assert_eq!(seen, vec!["progress", "progress", "done"]);
        assert_eq!(orch.active_count(), 0);
        assert_eq!(orch.phase(WorkflowKind::Import), WorkflowPhase::Completed);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn restarting_a_kind_cancels_the_first_run() {
        let mut orch = orchestrator();
        let first_stopped = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&first_stopped);
        let first = orch.start(WorkflowKind::Complexity, WorkflowScope::AllTasks, move |_, cancel| {
            while !cancel.is_cancelled() {
                std::thread::sleep(Duration::from_millis(5));
            }
            flag.store(true, Ordering::SeqCst);
            Err(ServiceError::Cancelled)
        });

        let second = orch.start(WorkflowKind::Complexity, WorkflowScope::PendingTasks, |_, _| {
            Ok(WorkflowOutput::Undo { restored: 1 })
        });

        assert_eq!(orch.active_count(), 1);
        assert!(!orch.arm(first), "stale wait must not arm the new slot");
        assert!(orch.arm(second));
        let msg = poll_until(&mut orch).await;
        assert_eq!(msg.generation, second.generation);
        assert!(matches!(
            msg.event,
            WorkflowEvent::Completed(WorkflowOutput::Undo { restored: 1 })
        ));

        for _ in 0..400 {
            if first_stopped.load(Ordering::SeqCst) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(first_stopped.load(Ordering::SeqCst));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn completion_sent_before_cancel_is_kept() {
        let mut orch = orchestrator();
        let (tx, rx) = mpsc::channel(4);
        let wait = orch.adopt(WorkflowKind::Delete, rx, CancellationToken::new());

        tx.send(WorkflowEvent::Completed(WorkflowOutput::Undo { restored: 3 }))
            .await
            .unwrap();
        assert!(orch.cancel(WorkflowKind::Delete));

        orch.arm(wait);
        let msg = poll_until(&mut orch).await;
        assert!(matches!(
            msg.event,
            WorkflowEvent::Completed(WorkflowOutput::Undo { restored: 3 })
        ));
        assert_eq!(orch.phase(WorkflowKind::Delete), WorkflowPhase::Completed);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn failure_after_cancel_reads_as_cancelled() {
        let mut orch = orchestrator();
        let (tx, rx) = mpsc::channel(4);
        let wait = orch.adopt(WorkflowKind::Expand, rx, CancellationToken::new());

        assert!(orch.cancel(WorkflowKind::Expand));
        tx.send(WorkflowEvent::Failed(ServiceError::Operation("interrupted".into())))
            .await
            .unwrap();

        orch.arm(wait);
        let msg = poll_until(&mut orch).await;
        assert!(matches!(msg.event, WorkflowEvent::Cancelled));
        assert_eq!(orch.phase(WorkflowKind::Expand), WorkflowPhase::Cancelled);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn job_that_finishes_despite_cancel_completes() {
        let mut orch = orchestrator();
        let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();
        let wait = orch.start(WorkflowKind::Delete, WorkflowScope::AllTasks, move |_, _| {
            let _ = release_rx.recv();
            Ok(WorkflowOutput::Undo { restored: 2 })
        });
        assert!(orch.cancel(WorkflowKind::Delete));
        release_tx.send(()).unwrap();

        orch.arm(wait);
        let msg = poll_until(&mut orch).await;
        assert!(matches!(
            msg.event,
            WorkflowEvent::Completed(WorkflowOutput::Undo { restored: 2 })
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn cancelled_job_reports_cancelled() {
        let mut orch = orchestrator();
        let wait = orch.start(WorkflowKind::Complexity, WorkflowScope::AllTasks, |_, cancel| {
            while !cancel.is_cancelled() {
                std::thread::sleep(Duration::from_millis(5));
            }
            Err(ServiceError::Cancelled)
        });
        orch.cancel(WorkflowKind::Complexity);
        orch.arm(wait);
        let msg = poll_until(&mut orch).await;
        assert!(matches!(msg.event, WorkflowEvent::Cancelled));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn closed_channel_is_terminal() {
        let mut orch = orchestrator();
        let (tx, rx) = mpsc::channel::<WorkflowEvent>(4);
        let wait = orch.adopt(WorkflowKind::Import, rx, CancellationToken::new());
        drop(tx);

        orch.arm(wait);
        let msg = poll_until(&mut orch).await;
        assert!(matches!(msg.event, WorkflowEvent::StreamClosed));
        assert_eq!(orch.active_count(), 0);
        assert_eq!(orch.phase(WorkflowKind::Import), WorkflowPhase::Failed);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn failures_and_panics_become_failed_events() {
        let mut orch = orchestrator();
        orch.start(WorkflowKind::Expand, WorkflowScope::AllTasks, |_, _| {
            Err(ServiceError::NotFound("9".into()))
        });
        let msg = orch.next(WorkflowKind::Expand).await.unwrap();
        assert!(matches!(msg.event, WorkflowEvent::Failed(ServiceError::NotFound(_))));

        orch.start(WorkflowKind::Delete, WorkflowScope::AllTasks, |_, _| {
            panic!("boom");
        });
        let msg = orch.next(WorkflowKind::Delete).await.unwrap();
        match msg.event {
            WorkflowEvent::Failed(ServiceError::Operation(text)) => {
                assert!(text.contains("crashed"));
                assert!(text.contains("boom"));
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn double_arm_is_ignored() {
        let mut orch = orchestrator();
        let (_tx, rx) = mpsc::channel::<WorkflowEvent>(4);
        let wait = orch.adopt(WorkflowKind::Import, rx, CancellationToken::new());
        assert!(orch.arm(wait));
        assert!(!orch.arm(wait));
    }

    #[tokio::test]
    async fn scoping_phase_round_trip() {
        let mut orch = orchestrator();
        assert_eq!(orch.phase(WorkflowKind::Delete), WorkflowPhase::Idle);
        orch.begin_scoping(WorkflowKind::Delete);
        assert_eq!(orch.phase(WorkflowKind::Delete), WorkflowPhase::Scoping);
        orch.settle(WorkflowKind::Delete);
        assert_eq!(orch.phase(WorkflowKind::Delete), WorkflowPhase::Idle);
    }
}
