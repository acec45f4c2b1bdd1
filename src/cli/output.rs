use serde::Serialize;

use crate::io::undo_log::UndoToken;
use crate::model::task::{Task, TaskStatus};
use crate::ops::complexity::ComplexityReport;
use crate::ops::delete::DeleteSummary;
use crate::ops::expand::ExpandSummary;
use crate::ops::import::ImportSummary;
use crate::util::plural;

// ---------------------------------------------------------------------------
// JSON output structs
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct TaskListJson<'a> {
    pub tag: &'a str,
    pub tasks: &'a [Task],
}

#[derive(Serialize)]
pub struct ImportJson<'a> {
    pub assigned_ids: &'a [String],
    pub total_count: usize,
    pub replaced_count: usize,
}

impl<'a> From<&'a ImportSummary> for ImportJson<'a> {
    fn from(s: &'a ImportSummary) -> Self {
        ImportJson {
            assigned_ids: &s.assigned_ids,
            total_count: s.total_count,
            replaced_count: s.replaced_count,
        }
    }
}

#[derive(Serialize)]
pub struct ExpandJson<'a> {
    pub parent_id: &'a str,
    pub created_ids: &'a [String],
    pub replaced_count: usize,
}

impl<'a> From<&'a ExpandSummary> for ExpandJson<'a> {
    fn from(s: &'a ExpandSummary) -> Self {
        ExpandJson {
            parent_id: &s.parent_id,
            created_ids: &s.created_ids,
            replaced_count: s.replaced_count,
        }
    }
}

#[derive(Serialize)]
pub struct DeleteJson<'a> {
    pub deleted_count: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: &'a Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub undo_token: Option<&'a UndoToken>,
}

impl<'a> From<&'a DeleteSummary> for DeleteJson<'a> {
    fn from(s: &'a DeleteSummary) -> Self {
        DeleteJson {
            deleted_count: s.deleted_count,
            warnings: &s.warnings,
            undo_token: s.undo_token.as_ref(),
        }
    }
}

// ---------------------------------------------------------------------------
// Human-readable formatting
// ---------------------------------------------------------------------------

/// Format a single task as a one-line summary
pub fn format_task_line(task: &Task) -> String {
    let mut line = format!("[{}] {} {}", task.status.glyph(), task.id, task.title);
    if let Some(score) = task.complexity {
        line.push_str(&format!("  (complexity {})", score));
    }
    if !task.dependencies.is_empty() {
        line.push_str(&format!("  <- {}", task.dependencies.join(", ")));
    }
    line
}

/// Format a task with its subtasks, indented. With a status filter, tasks
/// that don't match are still printed when a descendant does.
pub fn format_task_tree(task: &Task, indent: usize, status: Option<TaskStatus>) -> Vec<String> {
    let mut children = Vec::new();
    for sub in &task.subtasks {
        children.extend(format_task_tree(sub, indent + 1, status));
    }
    let matches = status.is_none_or(|s| task.status == s);
    if !matches && children.is_empty() {
        return Vec::new();
    }
    let mut lines = vec![format!("{}{}", "  ".repeat(indent), format_task_line(task))];
    lines.extend(children);
    lines
}

/// Every task in pre-order, one line each
pub fn format_flat(tasks: &[Task], status: Option<TaskStatus>) -> Vec<String> {
    let mut lines = Vec::new();
    crate::ops::task_ops::for_each_task(tasks, &mut |t| {
        if status.is_none_or(|s| t.status == s) {
            lines.push(format_task_line(t));
        }
    });
    lines
}

/// Format detailed task view
pub fn format_task_detail(task: &Task, parent: Option<&Task>) -> Vec<String> {
    let mut lines = vec![format!("[{}] {} {}", task.status.glyph(), task.id, task.title)];
    if let Some(parent) = parent {
        lines.push(format!("parent: {} {}", parent.id, parent.title));
    }
    lines.push(format!("status: {}", task.status));
    lines.push(format!("priority: {}", task.priority));
    if let Some(score) = task.complexity {
        lines.push(format!("complexity: {}", score));
    }
    if !task.dependencies.is_empty() {
        lines.push(format!("dependencies: {}", task.dependencies.join(", ")));
    }
    for (label, text) in [
        ("description", &task.description),
        ("details", &task.details),
        ("test strategy", &task.test_strategy),
    ] {
        if text.is_empty() {
            continue;
        }
        lines.push(format!("{}:", label));
        for line in text.lines() {
            lines.push(format!("  {}", line));
        }
    }
    if !task.subtasks.is_empty() {
        lines.push(String::new());
        lines.push("subtasks:".to_string());
        for sub in &task.subtasks {
            lines.extend(format_task_tree(sub, 1, None));
        }
    }
    lines
}

pub fn format_report(report: &ComplexityReport) -> Vec<String> {
    let mut lines = Vec::new();
    for entry in &report.entries {
        let marker = if entry.score >= report.threshold { "*" } else { " " };
        lines.push(format!(
            "{} {:>2}  {} {}  ({} subtasks suggested)",
            marker, entry.score, entry.id, entry.title, entry.recommended_subtasks
        ));
        if !entry.reasoning.is_empty() {
            lines.push(format!("       {}", entry.reasoning));
        }
    }
    lines.push(format!(
        "analyzed {}, average {:.1}, {} at or above {}",
        plural(report.entries.len(), "task"),
        report.average_score(),
        report.needing_expansion().count(),
        report.threshold
    ));
    lines
}

pub fn format_import(summary: &ImportSummary) -> Vec<String> {
    let mut lines = vec![format!(
        "imported {} ({} top-level)",
        plural(summary.total_count, "task"),
        summary.assigned_ids.len()
    )];
    if summary.replaced_count > 0 {
        lines.push(format!("replaced {}", plural(summary.replaced_count, "existing task")));
    }
    for id in &summary.assigned_ids {
        lines.push(format!("  {}", id));
    }
    lines
}

pub fn format_expand(summary: &ExpandSummary) -> Vec<String> {
    let mut lines = vec![format!(
        "expanded {} into {}",
        summary.parent_id,
        plural(summary.created_ids.len(), "subtask")
    )];
    if summary.replaced_count > 0 {
        lines.push(format!("replaced {}", plural(summary.replaced_count, "previous subtask")));
    }
    for id in &summary.created_ids {
        lines.push(format!("  {}", id));
    }
    lines
}

pub fn format_delete(summary: &DeleteSummary) -> Vec<String> {
    let mut lines = vec![format!("deleted {}", plural(summary.deleted_count, "task"))];
    for warning in &summary.warnings {
        lines.push(format!("warning: {}", warning));
    }
    if let Some(token) = &summary.undo_token {
        lines.push(format!(
            "undo with `td undo {}` within {}s",
            token.id, token.duration_secs
        ));
    }
    lines
}

/// Parse a status string, listing the accepted values on failure
pub fn parse_status(s: &str) -> Result<TaskStatus, String> {
    TaskStatus::parse(s).ok_or_else(|| {
        let names: Vec<&str> = TaskStatus::ALL.iter().map(|s| s.as_str()).collect();
        format!("unknown status '{}' (expected: {})", s, names.join(", "))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn tree() -> Task {
        let mut parent = Task::new("1", "Parent");
        let mut done = Task::new("1.1", "Finished child");
        done.status = TaskStatus::Done;
        parent.subtasks.push(done);
        parent.subtasks.push(Task::new("1.2", "Open child"));
        parent
    }

    #[test]
    fn tree_filter_keeps_ancestors() {
        let lines = format_task_tree(&tree(), 0, Some(TaskStatus::Done));
        assert_eq!(lines, vec!["[ ] 1 Parent", "  [x] 1.1 Finished child"]);
    }

    #[test]
    fn flat_lists_every_match() {
        let lines = format_flat(&[tree()], Some(TaskStatus::Pending));
        assert_eq!(lines, vec!["[ ] 1 Parent", "[ ] 1.2 Open child"]);
    }

    #[test]
    fn unknown_status_names_choices() {
        let err = parse_status("started").unwrap_err();
        assert!(err.contains("in-progress"));
        assert_eq!(parse_status("done"), Ok(TaskStatus::Done));
    }
}
