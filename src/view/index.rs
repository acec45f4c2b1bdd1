use indexmap::IndexMap;

use crate::model::id;
use crate::model::task::{Task, TaskStatus};

/// Owns the canonical task tree plus an ID → tree-path map built by a
/// pre-order walk. Every lookup by ID goes through here; nothing else holds
/// references into the tree across a rebuild.
#[derive(Debug, Clone, Default)]
pub struct TaskIndex {
    tasks: Vec<Task>,
    paths: IndexMap<String, Vec<usize>>,
}

impl TaskIndex {
    pub fn build(tasks: Vec<Task>) -> Self {
        let mut index = TaskIndex {
            tasks,
            paths: IndexMap::new(),
        };
        index.reindex();
        index
    }

    /// Swap in a new canonical collection (reload, command completion).
    pub fn replace(&mut self, tasks: Vec<Task>) {
        self.tasks = tasks;
        self.reindex();
    }

    fn reindex(&mut self) {
        self.paths.clear();
        let mut duplicates = Vec::new();
        index_level(&self.tasks, &mut Vec::new(), &mut self.paths, &mut duplicates);
        if !duplicates.is_empty() {
            tracing::warn!(?duplicates, "duplicate task IDs; first occurrence wins");
        }
    }

    /// Look up a task. A miss means the caller holds a stale ID.
    pub fn resolve(&self, task_id: &str) -> Option<&Task> {
        let path = self.paths.get(task_id)?;
        node_at(&self.tasks, path)
    }

    pub fn resolve_mut(&mut self, task_id: &str) -> Option<&mut Task> {
        let path = self.paths.get(task_id)?;
        node_at_mut(&mut self.tasks, path)
    }

    pub fn contains(&self, task_id: &str) -> bool {
        self.paths.contains_key(task_id)
    }

    /// Parent task, derived from the dotted ID
    pub fn parent(&self, task_id: &str) -> Option<&Task> {
        id::parent_id(task_id).and_then(|p| self.resolve(p))
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Local status change. Returns false on a stale ID.
    pub fn set_status(&mut self, task_id: &str, status: TaskStatus) -> bool {
        match self.resolve_mut(task_id) {
            Some(task) => {
                task.status = status;
                true
            }
            None => false,
        }
    }
}

fn index_level(
    tasks: &[Task],
    prefix: &mut Vec<usize>,
    paths: &mut IndexMap<String, Vec<usize>>,
    duplicates: &mut Vec<String>,
) {
    for (i, task) in tasks.iter().enumerate() {
        prefix.push(i);
        if paths.contains_key(&task.id) {
            duplicates.push(task.id.clone());
        } else {
            paths.insert(task.id.clone(), prefix.clone());
        }
        index_level(&task.subtasks, prefix, paths, duplicates);
        prefix.pop();
    }
}

fn node_at<'a>(tasks: &'a [Task], path: &[usize]) -> Option<&'a Task> {
    let (first, rest) = path.split_first()?;
    let mut node = tasks.get(*first)?;
    for idx in rest {
        node = node.subtasks.get(*idx)?;
    }
    Some(node)
}

fn node_at_mut<'a>(tasks: &'a mut [Task], path: &[usize]) -> Option<&'a mut Task> {
    let (first, rest) = path.split_first()?;
    let mut node = tasks.get_mut(*first)?;
    for idx in rest {
        node = node.subtasks.get_mut(*idx)?;
    }
    Some(node)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn tree() -> Vec<Task> {
        let mut one = Task::new("1", "One");
        let mut nested = Task::new("1.1", "Nested");
        nested.subtasks.push(Task::new("1.1.1", "Deep"));
        one.subtasks.push(nested);
        vec![one, Task::new("2", "Two")]
    }

    #[test]
    fn build_indexes_in_preorder() {
        let index = TaskIndex::build(tree());
        assert_eq!(
            index.paths.keys().map(String::as_str).collect::<Vec<_>>(),
            vec!["1", "1.1", "1.1.1", "2"]
        );
        assert_eq!(index.paths["1.1.1"], vec![0, 0, 0]);
        assert_eq!(index.resolve("1.1.1").unwrap().title, "Deep");
        assert_eq!(index.parent("1.1.1").unwrap().id, "1.1");
    }

    #[test]
    fn miss_is_none() {
        let index = TaskIndex::build(tree());
        assert!(index.resolve("7").is_none());
        assert!(index.parent("1").is_none());
    }

    #[test]
    fn replace_drops_stale_ids() {
        let mut index = TaskIndex::build(tree());
        index.replace(vec![Task::new("3", "Three")]);
        assert!(index.resolve("1.1").is_none());
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn set_status_through_index() {
        let mut index = TaskIndex::build(tree());
        assert!(index.set_status("1.1", TaskStatus::Done));
        assert_eq!(index.resolve("1.1").unwrap().status, TaskStatus::Done);
        assert!(!index.set_status("9", TaskStatus::Done));
    }

    #[test]
    fn duplicate_ids_keep_first() {
        let index = TaskIndex::build(vec![Task::new("1", "First"), Task::new("1", "Second")]);
        assert_eq!(index.resolve("1").unwrap().title, "First");
        assert_eq!(index.len(), 1);
    }
}
