use tokio_util::sync::CancellationToken;

use crate::error::ServiceError;
use crate::io::task_store::{StoreError, TaskStore};
use crate::model::task::Task;
use crate::ops::{Progress, check_cancelled, task_ops};

pub const MAX_SUBTASKS: usize = 20;

const PHASES: &[&str] = &["Design", "Implement", "Test", "Document", "Review"];

#[derive(Debug, Clone)]
pub struct ExpandParams {
    pub id: String,
    pub num: usize,
    /// Replace existing subtasks instead of appending
    pub force: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpandSummary {
    pub parent_id: String,
    pub created_ids: Vec<String>,
    /// Subtasks dropped because of `force`
    pub replaced_count: usize,
}

/// Step titles mined from the task's details, then its description.
/// Bullets and numbering are stripped; each sentence is a candidate.
pub fn candidate_steps(task: &Task) -> Vec<String> {
    let mut steps: Vec<String> = Vec::new();
    for source in [&task.details, &task.description] {
        for line in source.lines() {
            let line = strip_bullet(line.trim());
            for sentence in line.split(". ") {
                let step = sentence.trim().trim_end_matches('.').trim();
                if step.len() < 3 {
                    continue;
                }
                if !steps.iter().any(|s| s.eq_ignore_ascii_case(step)) {
                    steps.push(step.to_string());
                }
            }
        }
    }
    steps
}

fn strip_bullet(line: &str) -> &str {
    if let Some(rest) = line
        .strip_prefix("- ")
        .or_else(|| line.strip_prefix("* "))
        .or_else(|| line.strip_prefix("+ "))
    {
        return rest;
    }
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0
        && let Some(rest) = line[digits..]
            .strip_prefix(". ")
            .or_else(|| line[digits..].strip_prefix(") "))
    {
        return rest;
    }
    line
}

/// Titles for `num` new subtasks: mined steps first, then standard phases.
pub fn plan_subtasks(task: &Task, num: usize) -> Vec<String> {
    let mut titles = candidate_steps(task);
    titles.truncate(num);
    let mut phase = 0;
    while titles.len() < num {
        let title = match PHASES.get(phase) {
            Some(p) => format!("{} {}", p, task.title),
            None => format!("Follow-up {} for {}", phase - PHASES.len() + 1, task.title),
        };
        titles.push(title);
        phase += 1;
    }
    titles
}

/// Attach subtasks built from `titles` to `task`. Each new subtask depends on
/// the one before it.
pub fn apply_expansion(task: &mut Task, titles: &[String], force: bool) -> ExpandSummary {
    let replaced_count = if force {
        let n = task.subtasks.len();
        task.subtasks.clear();
        n
    } else {
        0
    };
    let mut next = task_ops::next_subtask_number(task);
    let mut created_ids: Vec<String> = Vec::with_capacity(titles.len());
    for title in titles {
        let id = format!("{}.{}", task.id, next);
        let mut sub = Task::new(id.clone(), title.clone());
        sub.priority = task.priority;
        if let Some(prev) = created_ids.last() {
            sub.dependencies.push(prev.clone());
        }
        task.subtasks.push(sub);
        created_ids.push(id);
        next += 1;
    }
    ExpandSummary {
        parent_id: task.id.clone(),
        created_ids,
        replaced_count,
    }
}

fn validate(params: &ExpandParams) -> Result<(), ServiceError> {
    if params.num == 0 || params.num > MAX_SUBTASKS {
        return Err(ServiceError::Validation(format!(
            "subtask count must be between 1 and {}",
            MAX_SUBTASKS
        )));
    }
    Ok(())
}

pub fn expand_with_progress(
    store: &TaskStore,
    params: &ExpandParams,
    cancel: &CancellationToken,
    on_progress: &mut dyn FnMut(Progress),
) -> Result<ExpandSummary, ServiceError> {
    validate(params)?;
    let snapshot = store.load_tasks()?;
    let task = task_ops::find_task(&snapshot, &params.id)
        .ok_or_else(|| ServiceError::NotFound(params.id.clone()))?;
    let titles = plan_subtasks(task, params.num);
    for (i, title) in titles.iter().enumerate() {
        check_cancelled(cancel)?;
        on_progress(Progress::new("generating", i + 1, titles.len(), title.clone()));
    }

    check_cancelled(cancel)?;
    let summary = store.update(|tasks| {
        let task = task_ops::find_task_mut(tasks, &params.id)
            .ok_or_else(|| StoreError::NotFound(params.id.clone()))?;
        Ok(apply_expansion(task, &titles, params.force))
    })?;
    tracing::info!(
        id = %summary.parent_id,
        created = summary.created_ids.len(),
        force = params.force,
        "task expanded"
    );
    Ok(summary)
}
