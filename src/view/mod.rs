pub mod cursor;
pub mod index;
pub mod projection;

use std::collections::HashSet;

use crate::model::id;
use crate::model::task::{Task, TaskStatus};
use crate::ops::search;

pub use cursor::Cursor;
pub use index::TaskIndex;
pub use projection::{SortMode, ViewMode, ViewOptions, VisibleRow};

/// Index, derived rows and selection kept consistent. Every upstream change
/// rebuilds the rows and re-finds the selection by ID.
#[derive(Debug, Clone, Default)]
pub struct TaskView {
    index: TaskIndex,
    options: ViewOptions,
    rows: Vec<VisibleRow>,
    cursor: Cursor,
}

impl TaskView {
    pub fn new(tasks: Vec<Task>, options: ViewOptions) -> Self {
        let mut view = TaskView {
            index: TaskIndex::build(tasks),
            options,
            rows: Vec::new(),
            cursor: Cursor::default(),
        };
        view.rebuild();
        view
    }

    pub fn index(&self) -> &TaskIndex {
        &self.index
    }

    pub fn options(&self) -> &ViewOptions {
        &self.options
    }

    pub fn rows(&self) -> &[VisibleRow] {
        &self.rows
    }

    pub fn cursor(&self) -> &Cursor {
        &self.cursor
    }

    pub fn selected_index(&self) -> Option<usize> {
        self.cursor.index()
    }

    pub fn selected_id(&self) -> Option<&str> {
        self.cursor.selected_id()
    }

    /// The selected task, resolved through the index. `None` when nothing is
    /// selected or the selection went stale.
    pub fn selected_task(&self) -> Option<&Task> {
        self.selected_id().and_then(|id| self.index.resolve(id))
    }

    /// Replace the canonical collection after a reload or a finished workflow.
    /// Expanded and multi-selected IDs that no longer exist are dropped.
    pub fn replace_tasks(&mut self, tasks: Vec<Task>) {
        self.index.replace(tasks);
        let index = &self.index;
        self.options.expanded.retain(|id| index.contains(id));
        self.cursor.retain_multi(|id| index.contains(id));
        self.rebuild();
    }

    /// Recompute rows, then restore the selection: same ID if still visible,
    /// else its nearest visible ancestor, else the old position clamped.
    pub fn rebuild(&mut self) {
        self.rows = projection::rebuild(&self.index, &self.options);
        if self.rows.is_empty() {
            self.cursor.clear();
            return;
        }
        let previous_id = self.cursor.selected_id().map(str::to_string);
        let target = previous_id
            .as_deref()
            .and_then(|id| projection::nearest_visible(&self.rows, id))
            .or(self.cursor.index())
            .unwrap_or(0);
        self.cursor.set(target, &self.rows);
    }

    pub fn next(&mut self) -> bool {
        self.cursor.next(&self.rows)
    }

    pub fn previous(&mut self) -> bool {
        self.cursor.previous(&self.rows)
    }

    pub fn first(&mut self) {
        self.cursor.first(&self.rows);
    }

    pub fn last(&mut self) {
        self.cursor.last(&self.rows);
    }

    /// Expand every ancestor of `task_id`, rebuild, and move the cursor onto
    /// it. On failure (unknown or filtered out) nothing changes.
    pub fn select_by_id(&mut self, task_id: &str) -> bool {
        if !self.index.contains(task_id) {
            return false;
        }
        let before = self.options.expanded.clone();
        for ancestor in id::ancestors(task_id) {
            self.options.expanded.insert(ancestor.to_string());
        }
        self.rows = projection::rebuild(&self.index, &self.options);
        match projection::position(&self.rows, task_id) {
            Some(pos) => {
                self.cursor.set(pos, &self.rows);
                true
            }
            None => {
                self.options.expanded = before;
                self.rebuild();
                false
            }
        }
    }

    fn selected_with_children(&self) -> Option<String> {
        self.selected_task()
            .filter(|t| t.has_subtasks())
            .map(|t| t.id.clone())
    }

    /// Toggle the selected task. No-op for leaves. Returns true if changed.
    pub fn toggle_expand(&mut self) -> bool {
        let Some(task_id) = self.selected_with_children() else {
            return false;
        };
        if !self.options.expanded.remove(&task_id) {
            self.options.expanded.insert(task_id);
        }
        self.rebuild();
        true
    }

    pub fn expand(&mut self) -> bool {
        let Some(task_id) = self.selected_with_children() else {
            return false;
        };
        let changed = self.options.expanded.insert(task_id);
        if changed {
            self.rebuild();
        }
        changed
    }

    pub fn collapse(&mut self) -> bool {
        let Some(task_id) = self.selected_with_children() else {
            return false;
        };
        let changed = self.options.expanded.remove(&task_id);
        if changed {
            self.rebuild();
        }
        changed
    }

    /// Collapse the selected task if it is expanded, otherwise move to its
    /// parent.
    pub fn collapse_or_ascend(&mut self) -> bool {
        if self.collapse() {
            return true;
        }
        let Some(parent) = self.selected_id().and_then(id::parent_id).map(str::to_string) else {
            return false;
        };
        self.select_by_id(&parent)
    }

    pub fn expand_all(&mut self) {
        let mut all = HashSet::new();
        crate::ops::task_ops::for_each_task(self.index.tasks(), &mut |t| {
            if t.has_subtasks() {
                all.insert(t.id.clone());
            }
        });
        self.options.expanded = all;
        self.rebuild();
    }

    /// Empties the expand set entirely, including paths not currently shown.
    pub fn collapse_all(&mut self) {
        self.options.expanded.clear();
        self.rebuild();
    }

    pub fn set_view_mode(&mut self, mode: ViewMode) {
        self.options.mode = mode;
        self.rebuild();
    }

    pub fn toggle_view_mode(&mut self) -> ViewMode {
        self.set_view_mode(self.options.mode.toggled());
        self.options.mode
    }

    pub fn set_status_filter(&mut self, status: Option<TaskStatus>) {
        self.options.status_filter = status;
        self.rebuild();
    }

    /// none → pending → in-progress → … → cancelled → none
    pub fn cycle_status_filter(&mut self) -> Option<TaskStatus> {
        let next = match self.options.status_filter {
            None => Some(TaskStatus::ALL[0]),
            Some(current) => TaskStatus::ALL
                .iter()
                .position(|s| *s == current)
                .and_then(|i| TaskStatus::ALL.get(i + 1))
                .copied(),
        };
        self.set_status_filter(next);
        next
    }

    pub fn set_sort(&mut self, sort: SortMode) {
        self.options.sort = sort;
        self.rebuild();
    }

    pub fn cycle_sort(&mut self) -> SortMode {
        self.set_sort(self.options.sort.cycled());
        self.options.sort
    }

    /// Apply a search query (blank clears it) and jump to the first direct
    /// match. Returns the matched ID, if any.
    pub fn set_search(&mut self, query: Option<String>) -> Option<String> {
        self.options.search = query.filter(|q| !q.trim().is_empty());
        self.rebuild();
        let first = self.first_match()?;
        self.select_by_id(&first);
        Some(first)
    }

    /// First task in pre-order that matches the search directly
    pub fn first_match(&self) -> Option<String> {
        let re = self.options.search_regex()?;
        let mut found = None;
        crate::ops::task_ops::for_each_task(self.index.tasks(), &mut |t| {
            if found.is_none()
                && self.options.status_filter.is_none_or(|s| t.status == s)
                && search::task_matches(&re, t)
            {
                found = Some(t.id.clone());
            }
        });
        found
    }

    pub fn toggle_multi_select(&mut self) -> bool {
        match self.cursor.selected_id().map(str::to_string) {
            Some(task_id) => self.cursor.toggle_multi(&task_id),
            None => false,
        }
    }

    /// IDs an action applies to: the multi-selection, or else the selection.
    pub fn action_targets(&self) -> Vec<String> {
        if self.cursor.multi_selected().is_empty() {
            self.selected_id().map(|id| vec![id.to_string()]).unwrap_or_default()
        } else {
            self.cursor.multi_selected().iter().cloned().collect()
        }
    }

    pub fn clear_multi_select(&mut self) {
        self.cursor.clear_multi();
    }

    /// Local status change. Returns false on a stale ID.
    pub fn set_status(&mut self, task_id: &str, status: TaskStatus) -> bool {
        let changed = self.index.set_status(task_id, status);
        if changed {
            self.rebuild();
        }
        changed
    }

    /// Replace the whole expand set (restoring saved state)
    pub fn set_expanded(&mut self, expanded: HashSet<String>) {
        self.options.expanded = expanded;
        self.rebuild();
    }

    /// Plain-text outline of the visible rows
    pub fn outline(&self) -> String {
        self.rows
            .iter()
            .map(|row| {
                let marker = match (row.has_children, row.is_expanded) {
                    (true, true) => '▾',
                    (true, false) => '▸',
                    (false, _) => '•',
                };
                let (glyph, title) = match self.index.resolve(&row.id) {
                    Some(t) => (t.status.glyph(), t.title.as_str()),
                    None => ('?', ""),
                };
                format!(
                    "{}{} [{}] {} {}",
                    "  ".repeat(row.depth),
                    marker,
                    glyph,
                    row.id,
                    title
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
