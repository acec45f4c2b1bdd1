use std::fs;
use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;

use crate::error::ServiceError;
use crate::io::task_store::{StoreError, TaskStore};
use crate::model::task::{Priority, Task, TaskStatus};
use crate::ops::{Progress, check_cancelled, task_ops};
use crate::util::plural;

/// Headings always nest above list items
const LIST_LEVEL_BASE: usize = 100;

#[derive(Debug, Clone)]
pub struct ImportParams {
    pub path: PathBuf,
    /// Keep existing tasks and number new ones after them
    pub append: bool,
}

/// Result of an import operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSummary {
    /// The IDs assigned to the imported top-level tasks
    pub assigned_ids: Vec<String>,
    /// Total number of tasks imported (including subtasks)
    pub total_count: usize,
    /// Number of pre-existing tasks dropped by a replacing import
    pub replaced_count: usize,
}

/// Parse a markdown-like document into an unnumbered task tree.
///
/// Headings and list items become tasks. Heading depth and list indentation
/// decide nesting; list items always sit below the nearest heading. Plain
/// paragraphs are appended to the description of the task above them.
pub fn parse_document(text: &str) -> Vec<Task> {
    let mut roots: Vec<Task> = Vec::new();
    // (nesting level, path into `roots`)
    let mut stack: Vec<(usize, Vec<usize>)> = Vec::new();
    let mut last: Option<Vec<usize>> = None;
    let mut in_fence = false;
    let mut paragraph_break = false;

    for raw in text.lines() {
        let line = raw.replace('\t', "    ");
        let trimmed = line.trim();

        if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            in_fence = !in_fence;
            continue;
        }
        if in_fence {
            continue;
        }
        if trimmed.is_empty() {
            paragraph_break = true;
            continue;
        }

        let parsed = parse_heading(trimmed).or_else(|| {
            let indent = line.len() - line.trim_start().len();
            parse_list_item(trimmed).map(|(title, done)| (LIST_LEVEL_BASE + indent, title, done))
        });

        let Some((level, title, done)) = parsed else {
            if let Some(path) = &last
                && let Some(task) = node_at_mut(&mut roots, path)
            {
                if !task.description.is_empty() {
                    task.description.push(if paragraph_break { '\n' } else { ' ' });
                }
                task.description.push_str(trimmed);
            }
            paragraph_break = false;
            continue;
        };
        paragraph_break = false;

        let task = build_task(&title, done);
        while stack.last().is_some_and(|(l, _)| *l >= level) {
            stack.pop();
        }
        let path = match stack.last() {
            Some((_, parent_path)) => {
                let parent_path = parent_path.clone();
                match node_at_mut(&mut roots, &parent_path) {
                    Some(parent) => {
                        parent.subtasks.push(task);
                        let mut path = parent_path;
                        path.push(parent.subtasks.len() - 1);
                        path
                    }
                    None => continue,
                }
            }
            None => {
                roots.push(task);
                vec![roots.len() - 1]
            }
        };
        stack.push((level, path.clone()));
        last = Some(path);
    }

    roots
}

fn parse_heading(line: &str) -> Option<(usize, String, bool)> {
    let hashes = line.chars().take_while(|c| *c == '#').count();
    if hashes == 0 || hashes > 6 {
        return None;
    }
    let rest = line[hashes..].strip_prefix(' ')?;
    let (title, done) = strip_checkbox(rest.trim());
    if title.is_empty() {
        return None;
    }
    Some((hashes, title.to_string(), done))
}

fn parse_list_item(line: &str) -> Option<(String, bool)> {
    let rest = if let Some(rest) = line
        .strip_prefix("- ")
        .or_else(|| line.strip_prefix("* "))
        .or_else(|| line.strip_prefix("+ "))
    {
        rest
    } else {
        let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
        if digits == 0 {
            return None;
        }
        line[digits..]
            .strip_prefix(". ")
            .or_else(|| line[digits..].strip_prefix(") "))?
    };
    let (title, done) = strip_checkbox(rest.trim());
    if title.is_empty() {
        return None;
    }
    Some((title.to_string(), done))
}

fn strip_checkbox(text: &str) -> (&str, bool) {
    if let Some(rest) = text.strip_prefix("[x]").or_else(|| text.strip_prefix("[X]")) {
        (rest.trim_start(), true)
    } else if let Some(rest) = text.strip_prefix("[ ]") {
        (rest.trim_start(), false)
    } else {
        (text, false)
    }
}

/// Build a task from a title, pulling out `!high` / `!medium` / `!low` markers.
fn build_task(title: &str, done: bool) -> Task {
    let mut priority = Priority::Medium;
    let words: Vec<&str> = title
        .split_whitespace()
        .filter(|w| match w.to_ascii_lowercase().as_str() {
            "!high" => {
                priority = Priority::High;
                false
            }
            "!medium" => {
                priority = Priority::Medium;
                false
            }
            "!low" => {
                priority = Priority::Low;
                false
            }
            _ => true,
        })
        .collect();
    let mut task = Task::new(String::new(), words.join(" "));
    task.priority = priority;
    if done {
        task.status = TaskStatus::Done;
    }
    task
}

fn node_at_mut<'a>(roots: &'a mut [Task], path: &[usize]) -> Option<&'a mut Task> {
    let (first, rest) = path.split_first()?;
    let mut node = roots.get_mut(*first)?;
    for idx in rest {
        node = node.subtasks.get_mut(*idx)?;
    }
    Some(node)
}

/// Number parsed tasks starting at top-level `first_id`.
pub fn assign_ids(tasks: &mut [Task], first_id: u64) -> Vec<String> {
    let mut assigned = Vec::with_capacity(tasks.len());
    for (i, task) in tasks.iter_mut().enumerate() {
        task.id = (first_id + i as u64).to_string();
        task_ops::renumber_subtasks(task);
        assigned.push(task.id.clone());
    }
    assigned
}

/// Merge imported tasks into `existing`, appending or replacing.
pub fn merge_into(existing: &mut Vec<Task>, mut imported: Vec<Task>, append: bool) -> ImportSummary {
    let total_count = task_ops::count_tasks(&imported);
    let replaced_count = if append {
        0
    } else {
        let n = task_ops::count_tasks(existing);
        existing.clear();
        n
    };
    let first_id = task_ops::max_top_level_id(existing) + 1;
    let assigned_ids = assign_ids(&mut imported, first_id);
    existing.extend(imported);
    ImportSummary {
        assigned_ids,
        total_count,
        replaced_count,
    }
}

fn read_document(path: &Path) -> Result<String, ServiceError> {
    fs::read_to_string(path).map_err(|source| {
        ServiceError::Store(StoreError::Io {
            path: path.to_path_buf(),
            source,
        })
    })
}

/// Read, parse, and merge a document into the store's active tag.
pub fn import_with_progress(
    store: &TaskStore,
    params: &ImportParams,
    cancel: &CancellationToken,
    on_progress: &mut dyn FnMut(Progress),
) -> Result<ImportSummary, ServiceError> {
    on_progress(Progress::new("reading", 0, 3, params.path.display().to_string()));
    let text = read_document(&params.path)?;
    check_cancelled(cancel)?;

    on_progress(Progress::new("parsing", 1, 3, plural(text.lines().count(), "line")));
    let parsed = parse_document(&text);
    if parsed.is_empty() {
        return Err(ServiceError::Validation(format!(
            "no tasks found in {}",
            params.path.display()
        )));
    }
    check_cancelled(cancel)?;

    on_progress(Progress::new("merging", 2, 3, plural(parsed.len(), "top-level task")));
    let summary = store.update(|tasks| Ok(merge_into(tasks, parsed, params.append)))?;
    on_progress(Progress::new("merging", 3, 3, "done"));
    tracing::info!(
        path = %params.path.display(),
        imported = summary.total_count,
        append = params.append,
        "document imported"
    );
    Ok(summary)
}
