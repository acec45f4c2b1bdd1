use std::time::{Duration, Instant};

use crate::workflow::{WorkflowEvent, WorkflowMessage};

/// Holds a successful result that arrives before its progress dialog has
/// been on screen for `min_visible`. Failures and cancellations pass through.
#[derive(Debug)]
pub struct CompletionHold {
    min_visible: Duration,
    held: Vec<(Instant, WorkflowMessage)>,
}

impl CompletionHold {
    pub fn new(min_visible: Duration) -> Self {
        CompletionHold {
            min_visible,
            held: Vec::new(),
        }
    }

    /// Pass `msg` through now, or keep it until the dialog opened at
    /// `opened_at` has been visible long enough.
    pub fn admit(
        &mut self,
        msg: WorkflowMessage,
        opened_at: Option<Instant>,
        now: Instant,
    ) -> Option<WorkflowMessage> {
        let Some(opened_at) = opened_at else {
            return Some(msg);
        };
        if !matches!(msg.event, WorkflowEvent::Completed(_)) {
            return Some(msg);
        }
        let release_at = opened_at + self.min_visible;
        if now >= release_at {
            Some(msg)
        } else {
            tracing::trace!(workflow = %msg.kind, "holding completion");
            self.held.push((release_at, msg));
            None
        }
    }

    /// Messages whose hold has elapsed, in arrival order
    pub fn release(&mut self, now: Instant) -> Vec<WorkflowMessage> {
        let (ready, waiting): (Vec<_>, Vec<_>) =
            std::mem::take(&mut self.held).into_iter().partition(|(at, _)| *at <= now);
        self.held = waiting;
        ready.into_iter().map(|(_, msg)| msg).collect()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.held.iter().map(|(at, _)| *at).min()
    }

    pub fn is_empty(&self) -> bool {
        self.held.is_empty()
    }
}
