use std::cmp::Ordering;
use std::collections::HashSet;

use regex::Regex;

use crate::model::id;
use crate::model::task::{Task, TaskStatus};
use crate::ops::search;
use crate::view::index::TaskIndex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewMode {
    #[default]
    Tree,
    Flat,
}

impl ViewMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ViewMode::Tree => "tree",
            ViewMode::Flat => "flat",
        }
    }

    pub fn parse(s: &str) -> Option<ViewMode> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tree" => Some(ViewMode::Tree),
            "flat" | "list" => Some(ViewMode::Flat),
            _ => None,
        }
    }

    pub fn toggled(self) -> ViewMode {
        match self {
            ViewMode::Tree => ViewMode::Flat,
            ViewMode::Flat => ViewMode::Tree,
        }
    }
}

/// Ordering applied among siblings at every level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortMode {
    /// Document order
    #[default]
    Id,
    Priority,
    Status,
    /// Highest score first; unscored last
    Complexity,
}

impl SortMode {
    pub fn as_str(self) -> &'static str {
        match self {
            SortMode::Id => "id",
            SortMode::Priority => "priority",
            SortMode::Status => "status",
            SortMode::Complexity => "complexity",
        }
    }

    pub fn parse(s: &str) -> Option<SortMode> {
        match s.trim().to_ascii_lowercase().as_str() {
            "id" => Some(SortMode::Id),
            "priority" => Some(SortMode::Priority),
            "status" => Some(SortMode::Status),
            "complexity" => Some(SortMode::Complexity),
            _ => None,
        }
    }

    pub fn cycled(self) -> SortMode {
        match self {
            SortMode::Id => SortMode::Priority,
            SortMode::Priority => SortMode::Status,
            SortMode::Status => SortMode::Complexity,
            SortMode::Complexity => SortMode::Id,
        }
    }

    fn compare(self, a: &Task, b: &Task) -> Ordering {
        match self {
            SortMode::Id => Ordering::Equal,
            SortMode::Priority => a.priority.sort_rank().cmp(&b.priority.sort_rank()),
            SortMode::Status => a.status.sort_rank().cmp(&b.status.sort_rank()),
            SortMode::Complexity => match (a.complexity, b.complexity) {
                (Some(x), Some(y)) => y.cmp(&x),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            },
        }
    }
}

/// Every input the projection depends on
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewOptions {
    pub mode: ViewMode,
    pub expanded: HashSet<String>,
    pub status_filter: Option<TaskStatus>,
    pub search: Option<String>,
    pub sort: SortMode,
}

impl ViewOptions {
    pub fn is_filtered(&self) -> bool {
        self.status_filter.is_some() || self.search_regex().is_some()
    }

    pub fn search_regex(&self) -> Option<Regex> {
        self.search.as_deref().and_then(search::compile_query)
    }
}

/// One row of the visible projection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisibleRow {
    pub id: String,
    pub depth: usize,
    /// Children survive the active filter
    pub has_children: bool,
    pub is_expanded: bool,
    pub is_last_sibling: bool,
    /// For tree guides: whether each ancestor is the last sibling
    pub ancestor_last: Vec<bool>,
    /// Matches the active filter itself rather than being kept as an ancestor
    pub matched: bool,
}

/// Filtered ID skeleton of the tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilteredNode {
    pub id: String,
    pub matched: bool,
    pub children: Vec<FilteredNode>,
}

/// Keep each task that matches directly or has a matching descendant.
/// Kept ancestors carry only their surviving children.
pub fn filter_tree(
    tasks: &[Task],
    status: Option<TaskStatus>,
    re: Option<&Regex>,
) -> Vec<FilteredNode> {
    tasks
        .iter()
        .filter_map(|task| {
            let children = filter_tree(&task.subtasks, status, re);
            let matched = status.is_none_or(|s| task.status == s)
                && re.is_none_or(|re| search::task_matches(re, task));
            if matched || !children.is_empty() {
                Some(FilteredNode {
                    id: task.id.clone(),
                    matched,
                    children,
                })
            } else {
                None
            }
        })
        .collect()
}

fn sort_nodes(nodes: &mut [FilteredNode], index: &TaskIndex, sort: SortMode) {
    if sort != SortMode::Id {
        // sort_by is stable, so ties keep document order
        nodes.sort_by(|a, b| match (index.resolve(&a.id), index.resolve(&b.id)) {
            (Some(x), Some(y)) => sort.compare(x, y),
            _ => Ordering::Equal,
        });
    }
    for node in nodes.iter_mut() {
        sort_nodes(&mut node.children, index, sort);
    }
}

/// Recompute the visible rows. Never fails; an empty tree yields no rows.
pub fn rebuild(index: &TaskIndex, opts: &ViewOptions) -> Vec<VisibleRow> {
    let re = opts.search_regex();
    let mut nodes = filter_tree(index.tasks(), opts.status_filter, re.as_ref());
    sort_nodes(&mut nodes, index, opts.sort);

    let mut rows = Vec::new();
    flatten(&nodes, 0, opts, &[], &mut rows);
    rows
}

fn flatten(
    nodes: &[FilteredNode],
    depth: usize,
    opts: &ViewOptions,
    ancestor_last: &[bool],
    rows: &mut Vec<VisibleRow>,
) {
    let count = nodes.len();
    for (i, node) in nodes.iter().enumerate() {
        let is_last = i + 1 == count;
        let has_children = !node.children.is_empty();
        let descend = has_children
            && match opts.mode {
                ViewMode::Flat => true,
                ViewMode::Tree => opts.expanded.contains(&node.id),
            };

        rows.push(VisibleRow {
            id: node.id.clone(),
            depth,
            has_children,
            is_expanded: descend,
            is_last_sibling: is_last,
            ancestor_last: ancestor_last.to_vec(),
            matched: node.matched,
        });

        if descend {
            let mut next_last = ancestor_last.to_vec();
            next_last.push(is_last);
            flatten(&node.children, depth + 1, opts, &next_last, rows);
        }
    }
}

/// Position of `task_id` in `rows`
pub fn position(rows: &[VisibleRow], task_id: &str) -> Option<usize> {
    rows.iter().position(|r| r.id == task_id)
}

/// Nearest visible row for a task that is no longer shown: itself, else the
/// closest visible ancestor.
pub fn nearest_visible(rows: &[VisibleRow], task_id: &str) -> Option<usize> {
    position(rows, task_id)
        .or_else(|| id::ancestors(task_id).into_iter().find_map(|a| position(rows, a)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::task::Priority;
    use pretty_assertions::assert_eq;

    fn sample() -> TaskIndex {
        let mut one = Task::new("1", "Setup project");
        one.subtasks.push(Task::new("1.1", "Create repo"));
        let mut ci = Task::new("1.2", "Configure CI");
        ci.status = TaskStatus::Done;
        one.subtasks.push(ci);
        let mut two = Task::new("2", "Write docs");
        two.priority = Priority::High;
        TaskIndex::build(vec![one, two])
    }

    fn ids(rows: &[VisibleRow]) -> Vec<&str> {
        rows.iter().map(|r| r.id.as_str()).collect()
    }

    #[test]
    fn flat_ignores_expand_state() {
        let opts = ViewOptions {
            mode: ViewMode::Flat,
            ..Default::default()
        };
        assert_eq!(ids(&rebuild(&sample(), &opts)), vec!["1", "1.1", "1.2", "2"]);
    }

    #[test]
    fn tree_recurses_only_into_expanded() {
        let mut opts = ViewOptions::default();
        assert_eq!(ids(&rebuild(&sample(), &opts)), vec!["1", "2"]);
        opts.expanded.insert("1".into());
        let rows = rebuild(&sample(), &opts);
        assert_eq!(ids(&rows), vec!["1", "1.1", "1.2", "2"]);
        assert!(rows[0].is_expanded);
        assert_eq!(rows[2].ancestor_last, vec![false]);
        assert!(rows[2].is_last_sibling);
    }

    #[test]
    fn filter_keeps_ancestors_and_prunes_siblings() {
        let opts = ViewOptions {
            mode: ViewMode::Flat,
            status_filter: Some(TaskStatus::Done),
            ..Default::default()
        };
        let rows = rebuild(&sample(), &opts);
        assert_eq!(ids(&rows), vec!["1", "1.2"]);
        assert!(!rows[0].matched);
        assert!(rows[1].matched);
    }

    #[test]
    fn filter_and_search_combine() {
        let opts = ViewOptions {
            mode: ViewMode::Flat,
            status_filter: Some(TaskStatus::Pending),
            search: Some("repo|docs".into()),
            ..Default::default()
        };
        assert_eq!(ids(&rebuild(&sample(), &opts)), vec!["1", "1.1", "2"]);
    }

    #[test]
    fn filtered_parent_reports_surviving_children_only() {
        let nodes = filter_tree(sample().tasks(), Some(TaskStatus::Done), None);
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].children.len(), 1);
        assert_eq!(nodes[0].children[0].id, "1.2");
    }

    #[test]
    fn sort_is_stable_among_siblings() {
        let opts = ViewOptions {
            mode: ViewMode::Flat,
            sort: SortMode::Priority,
            ..Default::default()
        };
        assert_eq!(ids(&rebuild(&sample(), &opts)), vec!["2", "1", "1.1", "1.2"]);

        let opts = ViewOptions {
            mode: ViewMode::Flat,
            sort: SortMode::Status,
            ..Default::default()
        };
        assert_eq!(ids(&rebuild(&sample(), &opts)), vec!["1", "1.1", "1.2", "2"]);
    }

    #[test]
    fn complexity_sort_puts_unscored_last() {
        let mut a = Task::new("1", "a");
        a.complexity = Some(3);
        let b = Task::new("2", "b");
        let mut c = Task::new("3", "c");
        c.complexity = Some(8);
        let index = TaskIndex::build(vec![a, b, c]);
        let opts = ViewOptions {
            sort: SortMode::Complexity,
            ..Default::default()
        };
        assert_eq!(ids(&rebuild(&index, &opts)), vec!["3", "1", "2"]);
    }

    #[test]
    fn empty_tree_yields_no_rows() {
        assert!(rebuild(&TaskIndex::default(), &ViewOptions::default()).is_empty());
    }

    #[test]
    fn nearest_visible_falls_back_to_ancestor() {
        let rows = rebuild(&sample(), &ViewOptions::default());
        assert_eq!(nearest_visible(&rows, "1.2"), Some(0));
        assert_eq!(nearest_visible(&rows, "9.9"), None);
    }
}
