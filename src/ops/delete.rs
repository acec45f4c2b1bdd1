use std::collections::HashSet;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use crate::error::ServiceError;
use crate::io::task_store::{StoreError, TaskStore};
use crate::io::undo_log::{self, UndoRecord, UndoToken};
use crate::model::id;
use crate::model::task::{Task, TaskStatus};
use crate::ops::{Progress, check_cancelled, task_ops};
use crate::util::plural;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeleteOptions {
    /// Allow deleting tasks that have subtasks
    pub recursive: bool,
    /// Delete even when other tasks depend on the targets, stripping the references
    pub force: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    UnknownTask,
    HasSubtasks,
    HasDependents,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blocker {
    pub kind: BlockKind,
    pub reason: String,
}

/// Read-only assessment of a pending delete
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteImpact {
    pub total_delete_count: usize,
    pub blocker: Option<Blocker>,
    pub warnings: Vec<String>,
    /// Tasks outside the deletion set that depend on something inside it
    pub dependents: Vec<String>,
}

impl DeleteImpact {
    pub fn blocking_reason(&self) -> Option<&str> {
        self.blocker.as_ref().map(|b| b.reason.as_str())
    }

    pub fn is_blocked(&self) -> bool {
        self.blocker.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct DeleteParams {
    pub ids: Vec<String>,
    pub options: DeleteOptions,
    /// Undo token lifetime; zero disables undo
    pub undo_seconds: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteSummary {
    pub deleted_count: usize,
    pub warnings: Vec<String>,
    pub undo_token: Option<UndoToken>,
}

/// Targets with duplicates and already-covered descendants removed
fn normalize_targets(ids: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for target in ids {
        let target = target.trim();
        if target.is_empty() || out.iter().any(|t| t == target) {
            continue;
        }
        out.push(target.to_string());
    }
    let snapshot = out.clone();
    out.retain(|t| {
        !snapshot
            .iter()
            .any(|other| other != t && id::is_self_or_descendant(t, other))
    });
    out
}

fn block(kind: BlockKind, reason: String) -> Option<Blocker> {
    Some(Blocker { kind, reason })
}

/// Pure impact analysis. Errors only when no targets are given; every other
/// problem is reported as a blocker so the caller can offer different options.
pub fn analyze_impact(
    tasks: &[Task],
    ids: &[String],
    opts: DeleteOptions,
) -> Result<DeleteImpact, ServiceError> {
    let targets = normalize_targets(ids);
    if targets.is_empty() {
        return Err(ServiceError::Validation("no tasks selected for deletion".into()));
    }

    let mut impact = DeleteImpact::default();
    let mut doomed: HashSet<String> = HashSet::new();

    for target in &targets {
        let Some(task) = task_ops::find_task(tasks, target) else {
            if impact.blocker.is_none() {
                impact.blocker = block(BlockKind::UnknownTask, format!("task {} not found", target));
            }
            continue;
        };
        if task.has_subtasks() && !opts.recursive && impact.blocker.is_none() {
            impact.blocker = block(
                BlockKind::HasSubtasks,
                format!(
                    "task {} has {}",
                    task.id,
                    plural(task.descendant_count(), "subtask")
                ),
            );
        }
        task_ops::for_each_task(std::slice::from_ref(task), &mut |t| {
            doomed.insert(t.id.clone());
            if t.status == TaskStatus::InProgress {
                impact
                    .warnings
                    .push(format!("task {} is in progress", t.id));
            }
        });
    }
    impact.total_delete_count = doomed.len();

    let mut references = 0;
    task_ops::for_each_task(tasks, &mut |t| {
        if doomed.contains(&t.id) {
            return;
        }
        let hits = t.dependencies.iter().filter(|d| doomed.contains(*d)).count();
        if hits > 0 {
            impact.dependents.push(t.id.clone());
            references += hits;
        }
    });

    if !impact.dependents.is_empty() {
        if opts.force {
            impact.warnings.push(format!(
                "{} will be removed from {}",
                plural(references, "dependency reference"),
                impact.dependents.join(", ")
            ));
        } else if impact.blocker.is_none() {
            impact.blocker = block(
                BlockKind::HasDependents,
                format!("has {}", plural(impact.dependents.len(), "dependent")),
            );
        }
    }

    Ok(impact)
}

fn blocker_error(blocker: &Blocker) -> ServiceError {
    match blocker.kind {
        BlockKind::UnknownTask => ServiceError::Validation(blocker.reason.clone()),
        BlockKind::HasSubtasks => ServiceError::Validation(format!(
            "{} (enable recursive delete)",
            blocker.reason
        )),
        BlockKind::HasDependents => ServiceError::Dependency(blocker.reason.clone()),
    }
}

/// Delete the targets, then record what was removed for undo. Cancellation
/// is honoured up to the write; after that the delete is committed.
pub fn delete_with_progress(
    store: &TaskStore,
    params: &DeleteParams,
    now: DateTime<Utc>,
    cancel: &CancellationToken,
    on_progress: &mut dyn FnMut(Progress),
) -> Result<DeleteSummary, ServiceError> {
    on_progress(Progress::new("analyzing", 0, 3, "checking impact"));
    let snapshot = store.load_tasks()?;
    let impact = analyze_impact(&snapshot, &params.ids, params.options)?;
    if let Some(blocker) = &impact.blocker {
        return Err(blocker_error(blocker));
    }
    check_cancelled(cancel)?;

    on_progress(Progress::new("deleting", 1, 3, plural(impact.total_delete_count, "task")));
    let targets: HashSet<String> = normalize_targets(&params.ids).into_iter().collect();
    let (removed, stripped) = store.update(|tasks| {
        let removed = task_ops::take_tasks(tasks, &targets, None);
        let mut removed_ids = HashSet::new();
        for entry in &removed {
            task_ops::for_each_task(std::slice::from_ref(&entry.task), &mut |t| {
                removed_ids.insert(t.id.clone());
            });
        }
        let stripped = task_ops::strip_dependencies(tasks, &removed_ids);
        Ok((removed, stripped))
    })?;
    let deleted_count: usize = removed.iter().map(|r| 1 + r.task.descendant_count()).sum();
    tracing::info!(
        deleted = deleted_count,
        stripped = stripped.iter().map(|s| s.dependencies.len()).sum::<usize>(),
        "tasks deleted"
    );

    let mut warnings = impact.warnings;
    let mut undo_token = None;
    if params.undo_seconds > 0 {
        on_progress(Progress::new("deleting", 2, 3, "saving undo record"));
        let token = UndoToken::issue(
            format!("Deleted {}", plural(deleted_count, "task")),
            now,
            params.undo_seconds,
        );
        let record = UndoRecord {
            token: token.clone(),
            tag: store.tag().to_string(),
            removed,
            stripped,
        };
        match undo_log::write_record(store.deck_dir(), &record) {
            Ok(()) => {
                tracing::info!(token = %token.id, expires_at = %token.expires_at, "undo token issued");
                undo_token = Some(token);
            }
            Err(e) => {
                tracing::warn!(error = %e, "could not save undo record");
                warnings.push(format!("undo unavailable: {}", e));
            }
        }
    }
    on_progress(Progress::new("deleting", 3, 3, "done"));

    Ok(DeleteSummary {
        deleted_count,
        warnings,
        undo_token,
    })
}

/// Re-insert the tasks removed by the delete behind `token_id` into the
/// current tree and restore the stripped references. Expired or unknown
/// tokens fail with `UndoUnavailable` and consume the record. Returns the
/// number of tasks re-inserted.
pub fn undo(store: &TaskStore, token_id: &str, now: DateTime<Utc>) -> Result<usize, ServiceError> {
    let Some(record) = undo_log::take_record(store.deck_dir(), token_id)? else {
        return Err(ServiceError::UndoUnavailable);
    };
    if record.token.is_expired(now) {
        tracing::info!(token = token_id, "undo token expired");
        return Err(ServiceError::UndoUnavailable);
    }
    let target = TaskStore::open(store.deck_dir(), &record.tag);
    let restored = target.update(|tasks| {
        let mut existing = HashSet::new();
        task_ops::for_each_task(tasks, &mut |t| {
            existing.insert(t.id.clone());
        });
        for entry in &record.removed {
            let mut clash = None;
            task_ops::for_each_task(std::slice::from_ref(&entry.task), &mut |t| {
                if clash.is_none() && existing.contains(&t.id) {
                    clash = Some(t.id.clone());
                }
            });
            if let Some(id) = clash {
                return Err(StoreError::DuplicateId(id));
            }
        }
        let restored = task_ops::restore_tasks(tasks, record.removed.clone());
        task_ops::restore_dependencies(tasks, &record.stripped);
        Ok(restored)
    });
    let restored = match restored {
        Ok(n) => n,
        Err(e @ StoreError::DuplicateId(_)) => {
            // Nothing was written; keep the record so undo can be retried.
            if let Err(write) = undo_log::write_record(store.deck_dir(), &record) {
                tracing::warn!(error = %write, "could not keep undo record");
            }
            return Err(e.into());
        }
        Err(e) => return Err(e.into()),
    };
    tracing::info!(token = token_id, restored, "delete undone");
    Ok(restored)
}
