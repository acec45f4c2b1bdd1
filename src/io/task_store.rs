use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::io::atomic_write;
use crate::io::lock::{LockError, TaskFileLock};
use crate::io::watcher::TaskWatcher;
use crate::model::task::{Task, TaskStatus, normalize_ids};
use crate::ops::task_ops;

pub const TASKS_FILE: &str = "tasks.json";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("could not access {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("invalid task file {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error(transparent)]
    Lock(#[from] LockError),
    #[error("task {0} already exists")]
    DuplicateId(String),
    #[error("task not found: {0}")]
    NotFound(String),
}

/// Handle to `tasks.json`, a JSON object keyed by tag where each tag holds
/// `{"tasks": [...]}`. A legacy top-level `{"tasks": [...]}` file reads as
/// the `master` tag. Only paths are held, so clones go to background jobs.
#[derive(Debug, Clone)]
pub struct TaskStore {
    deck_dir: PathBuf,
    tag: String,
}

impl TaskStore {
    pub fn open(deck_dir: &Path, tag: &str) -> Self {
        TaskStore {
            deck_dir: deck_dir.to_path_buf(),
            tag: tag.to_string(),
        }
    }

    pub fn deck_dir(&self) -> &Path {
        &self.deck_dir
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn tasks_path(&self) -> PathBuf {
        self.deck_dir.join(TASKS_FILE)
    }

    /// Read the active tag's tasks plus every tag name (sorted).
    /// A missing file is an empty task list.
    pub fn get_tasks(&self) -> Result<(Vec<Task>, Vec<String>), StoreError> {
        let root = self.read_root()?;
        let mut tags: Vec<String> = root.keys().cloned().collect();
        if !tags.iter().any(|t| t == &self.tag) {
            tags.push(self.tag.clone());
        }
        tags.sort();
        let tasks = self.tasks_from_root(&root)?;
        Ok((tasks, tags))
    }

    /// Verify the file parses and return the active tag's tasks.
    pub fn load_tasks(&self) -> Result<Vec<Task>, StoreError> {
        let root = self.read_root()?;
        let tasks = self.tasks_from_root(&root)?;
        tracing::debug!(tag = %self.tag, count = tasks.len(), "loaded tasks");
        Ok(tasks)
    }

    /// Replace the active tag's tasks, preserving other tags.
    pub fn save_tasks(&self, tasks: &[Task]) -> Result<(), StoreError> {
        let _lock = TaskFileLock::acquire_default(&self.deck_dir)?;
        self.write_tag(tasks)
    }

    /// Read-modify-write of the active tag under the file lock.
    pub fn update<R, F>(&self, f: F) -> Result<R, StoreError>
    where
        F: FnOnce(&mut Vec<Task>) -> Result<R, StoreError>,
    {
        let _lock = TaskFileLock::acquire_default(&self.deck_dir)?;
        let root = self.read_root()?;
        let mut tasks = self.tasks_from_root(&root)?;
        let result = f(&mut tasks)?;
        self.write_tag(&tasks)?;
        Ok(result)
    }

    pub fn set_status(&self, id: &str, status: TaskStatus) -> Result<(), StoreError> {
        self.update(|tasks| {
            let task = task_ops::find_task_mut(tasks, id)
                .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
            task.status = status;
            Ok(())
        })?;
        tracing::info!(id, status = %status, "status changed");
        Ok(())
    }

    /// Start watching the task file for external changes.
    pub fn reload_events(&self) -> Result<TaskWatcher, notify::Error> {
        TaskWatcher::start(&self.deck_dir, TASKS_FILE)
    }

    fn read_root(&self) -> Result<Map<String, Value>, StoreError> {
        let path = self.tasks_path();
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(source) => return Err(StoreError::Io { path, source }),
        };
        if text.trim().is_empty() {
            return Ok(Map::new());
        }
        let value: Value =
            serde_json::from_str(&text).map_err(|source| StoreError::Json {
                path: path.clone(),
                source,
            })?;
        Ok(match value {
            Value::Object(mut map) => {
                if matches!(map.get("tasks"), Some(Value::Array(_))) {
                    let mut legacy = Map::new();
                    let tasks = map.remove("tasks").unwrap_or(Value::Array(Vec::new()));
                    let mut tag = Map::new();
                    tag.insert("tasks".into(), tasks);
                    legacy.insert("master".into(), Value::Object(tag));
                    legacy
                } else {
                    map
                }
            }
            _ => Map::new(),
        })
    }

    fn tasks_from_root(&self, root: &Map<String, Value>) -> Result<Vec<Task>, StoreError> {
        let Some(tag) = root.get(&self.tag) else {
            return Ok(Vec::new());
        };
        let Some(raw) = tag.get("tasks") else {
            return Ok(Vec::new());
        };
        let mut tasks: Vec<Task> =
            serde_json::from_value(raw.clone()).map_err(|source| StoreError::Json {
                path: self.tasks_path(),
                source,
            })?;
        normalize_ids(&mut tasks);
        Ok(tasks)
    }

    fn write_tag(&self, tasks: &[Task]) -> Result<(), StoreError> {
        let path = self.tasks_path();
        let mut root = self.read_root()?;
        let tasks_value = serde_json::to_value(tasks).map_err(|source| StoreError::Json {
            path: path.clone(),
            source,
        })?;
        let entry = root
            .entry(self.tag.clone())
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(tag) = entry {
            tag.insert("tasks".into(), tasks_value);
        } else {
            let mut tag = Map::new();
            tag.insert("tasks".into(), tasks_value);
            *entry = Value::Object(tag);
        }
        let mut text =
            serde_json::to_string_pretty(&Value::Object(root)).map_err(|source| {
                StoreError::Json {
                    path: path.clone(),
                    source,
                }
            })?;
        text.push('\n');
        atomic_write(&path, text.as_bytes()).map_err(|source| StoreError::Io { path, source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn store_with(json: &str) -> (TempDir, TaskStore) {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(TASKS_FILE), json).unwrap();
        let store = TaskStore::open(tmp.path(), "master");
        (tmp, store)
    }

    #[test]
    fn missing_file_is_empty() {
        let tmp = TempDir::new().unwrap();
        let store = TaskStore::open(tmp.path(), "master");
        let (tasks, tags) = store.get_tasks().unwrap();
        assert!(tasks.is_empty());
        assert_eq!(tags, vec!["master"]);
    }

    #[test]
    fn reads_tagged_file_and_lists_tags() {
        let (_tmp, store) = store_with(
            r#"{"master": {"tasks": [{"id": 1, "title": "A"}]},
                "feature": {"tasks": []}}"#,
        );
        let (tasks, tags) = store.get_tasks().unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].id, "1");
        assert_eq!(tags, vec!["feature", "master"]);
    }

    #[test]
    fn legacy_layout_is_master() {
        let (_tmp, store) = store_with(r#"{"tasks": [{"id": "1", "title": "A"}]}"#);
        assert_eq!(store.load_tasks().unwrap().len(), 1);
    }

    #[test]
    fn save_preserves_other_tags() {
        let (tmp, store) = store_with(
            r#"{"master": {"tasks": []}, "feature": {"tasks": [{"id": 9, "title": "Keep"}]}}"#,
        );
        store.save_tasks(&[Task::new("1", "New")]).unwrap();

        let feature = TaskStore::open(tmp.path(), "feature");
        let kept = feature.load_tasks().unwrap();
        assert_eq!(kept[0].title, "Keep");
        assert_eq!(store.load_tasks().unwrap()[0].title, "New");
    }

    #[test]
    fn set_status_writes_through() {
        let (_tmp, store) = store_with(
            r#"{"master": {"tasks": [{"id": 1, "title": "A", "subtasks": [{"id": 1, "title": "B"}]}]}}"#,
        );
        store.set_status("1.1", TaskStatus::Done).unwrap();
        let tasks = store.load_tasks().unwrap();
        assert_eq!(tasks[0].subtasks[0].status, TaskStatus::Done);
    }

    #[test]
    fn set_status_unknown_id() {
        let (_tmp, store) = store_with(r#"{"master": {"tasks": []}}"#);
        assert!(matches!(
            store.set_status("42", TaskStatus::Done),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn malformed_json_is_an_error() {
        let (_tmp, store) = store_with("{ nope");
        assert!(matches!(store.load_tasks(), Err(StoreError::Json { .. })));
    }
}
