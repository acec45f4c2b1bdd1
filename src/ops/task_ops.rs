use std::collections::HashSet;

use crate::io::undo_log::{RemovedTask, StrippedRefs};
use crate::model::id;
use crate::model::task::Task;

// ---------------------------------------------------------------------------
// Lookup
// ---------------------------------------------------------------------------

/// Find a task by ID anywhere in the tree.
pub fn find_task<'a>(tasks: &'a [Task], task_id: &str) -> Option<&'a Task> {
    for task in tasks {
        if task.id == task_id {
            return Some(task);
        }
        if id::is_self_or_descendant(task_id, &task.id)
            && let Some(t) = find_task(&task.subtasks, task_id)
        {
            return Some(t);
        }
    }
    None
}

/// Find a task by ID anywhere in the tree, return mutable ref.
pub fn find_task_mut<'a>(tasks: &'a mut [Task], task_id: &str) -> Option<&'a mut Task> {
    for task in tasks.iter_mut() {
        if task.id == task_id {
            return Some(task);
        }
        if id::is_self_or_descendant(task_id, &task.id)
            && let Some(t) = find_task_mut(&mut task.subtasks, task_id)
        {
            return Some(t);
        }
    }
    None
}

/// Pre-order visit of every task.
pub fn for_each_task(tasks: &[Task], f: &mut dyn FnMut(&Task)) {
    for task in tasks {
        f(task);
        for_each_task(&task.subtasks, f);
    }
}

pub fn count_tasks(tasks: &[Task]) -> usize {
    let mut n = 0;
    for_each_task(tasks, &mut |_| n += 1);
    n
}

/// All IDs in pre-order
pub fn collect_ids(tasks: &[Task]) -> Vec<String> {
    let mut ids = Vec::new();
    for_each_task(tasks, &mut |t| ids.push(t.id.clone()));
    ids
}

// ---------------------------------------------------------------------------
// Numbering
// ---------------------------------------------------------------------------

/// Highest numeric top-level ID (0 when there are none)
pub fn max_top_level_id(tasks: &[Task]) -> u64 {
    tasks
        .iter()
        .filter_map(|t| t.id.parse::<u64>().ok())
        .max()
        .unwrap_or(0)
}

/// Next free local number for a new subtask of `task`
pub fn next_subtask_number(task: &Task) -> u64 {
    task.subtasks
        .iter()
        .filter_map(|s| id::last_number(&s.id))
        .max()
        .unwrap_or(0)
        + 1
}

/// Recursively renumber subtask IDs beneath `task`, starting at 1.
pub fn renumber_subtasks(task: &mut Task) {
    let parent_id = task.id.clone();
    for (i, sub) in task.subtasks.iter_mut().enumerate() {
        sub.id = format!("{}.{}", parent_id, i + 1);
        renumber_subtasks(sub);
    }
}

// ---------------------------------------------------------------------------
// Removal
// ---------------------------------------------------------------------------

/// Take every task whose ID is in `ids` (with its subtree) out of the tree,
/// remembering each one's parent and sibling position.
pub fn take_tasks(
    tasks: &mut Vec<Task>,
    ids: &HashSet<String>,
    parent: Option<&str>,
) -> Vec<RemovedTask> {
    let mut taken = Vec::new();
    for (position, task) in std::mem::take(tasks).into_iter().enumerate() {
        if ids.contains(&task.id) {
            taken.push(RemovedTask {
                parent_id: parent.map(str::to_string),
                position,
                task,
            });
        } else {
            tasks.push(task);
        }
    }
    for task in tasks.iter_mut() {
        taken.extend(take_tasks(&mut task.subtasks, ids, Some(&task.id)));
    }
    taken
}

/// Drop dependency references pointing at any ID in `removed`.
/// Returns what was dropped, per task.
pub fn strip_dependencies(tasks: &mut [Task], removed: &HashSet<String>) -> Vec<StrippedRefs> {
    let mut stripped = Vec::new();
    for task in tasks.iter_mut() {
        let (gone, kept): (Vec<String>, Vec<String>) = std::mem::take(&mut task.dependencies)
            .into_iter()
            .partition(|d| removed.contains(d));
        task.dependencies = kept;
        if !gone.is_empty() {
            stripped.push(StrippedRefs {
                id: task.id.clone(),
                dependencies: gone,
            });
        }
        stripped.extend(strip_dependencies(&mut task.subtasks, removed));
    }
    stripped
}

// ---------------------------------------------------------------------------
// Restore
// ---------------------------------------------------------------------------

/// Put removed subtrees back at their old positions, clamped to the current
/// sibling count. A subtree whose parent no longer exists goes to the end of
/// the top level. Returns the number of tasks re-inserted.
pub fn restore_tasks(tasks: &mut Vec<Task>, mut removed: Vec<RemovedTask>) -> usize {
    removed.sort_by(|a, b| {
        (a.parent_id.is_some(), &a.parent_id, a.position)
            .cmp(&(b.parent_id.is_some(), &b.parent_id, b.position))
    });
    let mut restored = 0;
    for entry in removed {
        restored += 1 + entry.task.descendant_count();
        let siblings = match &entry.parent_id {
            None => Some(&mut *tasks),
            Some(parent) => find_task_mut(tasks, parent).map(|p| &mut p.subtasks),
        };
        match siblings {
            Some(siblings) => {
                let at = entry.position.min(siblings.len());
                siblings.insert(at, entry.task);
            }
            None => {
                tracing::warn!(
                    id = %entry.task.id,
                    parent = entry.parent_id.as_deref().unwrap_or(""),
                    "parent gone, restoring at top level"
                );
                tasks.push(entry.task);
            }
        }
    }
    restored
}

/// Re-add stripped dependency references to the tasks that still exist.
pub fn restore_dependencies(tasks: &mut [Task], stripped: &[StrippedRefs]) {
    for refs in stripped {
        let Some(task) = find_task_mut(tasks, &refs.id) else {
            continue;
        };
        for dep in &refs.dependencies {
            if !task.dependencies.contains(dep) {
                task.dependencies.push(dep.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<Task> {
        let mut one = Task::new("1", "One");
        one.subtasks.push(Task::new("1.1", "One.One"));
        let mut nested = Task::new("1.2", "One.Two");
        nested.subtasks.push(Task::new("1.2.1", "Deep"));
        one.subtasks.push(nested);
        let mut two = Task::new("2", "Two");
        two.dependencies = vec!["1.2.1".into(), "1".into()];
        vec![one, two, Task::new("10", "Ten")]
    }

    #[test]
    fn find_nested() {
        let tasks = sample();
        assert_eq!(find_task(&tasks, "1.2.1").unwrap().title, "Deep");
        assert!(find_task(&tasks, "1.3").is_none());
        assert!(find_task(&tasks, "").is_none());
    }

    #[test]
    fn find_mut_and_edit() {
        let mut tasks = sample();
        find_task_mut(&mut tasks, "1.1").unwrap().title = "Renamed".into();
        assert_eq!(find_task(&tasks, "1.1").unwrap().title, "Renamed");
    }

    #[test]
    fn ids_in_preorder() {
        assert_eq!(
            collect_ids(&sample()),
            vec!["1", "1.1", "1.2", "1.2.1", "2", "10"]
        );
    }

    #[test]
    fn numbering() {
        let tasks = sample();
        assert_eq!(max_top_level_id(&tasks), 10);
        assert_eq!(next_subtask_number(&tasks[0]), 3);
        assert_eq!(next_subtask_number(&tasks[1]), 1);
    }

    #[test]
    fn take_records_positions_and_strips_refs() {
        let mut tasks = sample();
        let ids: HashSet<String> = ["1.2".to_string()].into();
        let taken = take_tasks(&mut tasks, &ids, None);
        assert_eq!(taken.len(), 1);
        assert_eq!(taken[0].parent_id.as_deref(), Some("1"));
        assert_eq!(taken[0].position, 1);
        assert_eq!(count_tasks(&tasks), 4);

        let gone: HashSet<String> = ["1.2".to_string(), "1.2.1".to_string()].into();
        let stripped = strip_dependencies(&mut tasks, &gone);
        assert_eq!(
            stripped,
            vec![StrippedRefs {
                id: "2".into(),
                dependencies: vec!["1.2.1".into()],
            }]
        );
        assert_eq!(tasks[1].dependencies, vec!["1"]);
    }

    #[test]
    fn restore_puts_subtrees_back_in_order() {
        let mut tasks = sample();
        let ids: HashSet<String> = ["1.1".to_string(), "2".to_string()].into();
        let taken = take_tasks(&mut tasks, &ids, None);
        let stripped = strip_dependencies(&mut tasks, &ids);
        assert_eq!(collect_ids(&tasks), vec!["1", "1.2", "1.2.1", "10"]);

        tasks.push(Task::new("11", "Added meanwhile"));
        assert_eq!(restore_tasks(&mut tasks, taken), 2);
        restore_dependencies(&mut tasks, &stripped);
        assert_eq!(
            collect_ids(&tasks),
            vec!["1", "1.1", "1.2", "1.2.1", "2", "10", "11"]
        );
        assert_eq!(tasks[1].dependencies, vec!["1.2.1", "1"]);
    }

    #[test]
    fn restore_without_parent_goes_to_top_level() {
        let mut tasks = vec![Task::new("2", "Two")];
        let orphan = RemovedTask {
            parent_id: Some("1".into()),
            position: 0,
            task: Task::new("1.1", "Orphan"),
        };
        assert_eq!(restore_tasks(&mut tasks, vec![orphan]), 1);
        assert_eq!(collect_ids(&tasks), vec!["2", "1.1"]);
    }

    #[test]
    fn renumber_closes_gaps() {
        let mut task = Task::new("4", "P");
        task.subtasks.push(Task::new("4.3", "a"));
        task.subtasks.push(Task::new("4.7", "b"));
        renumber_subtasks(&mut task);
        assert_eq!(task.subtasks[1].id, "4.2");
    }
}
