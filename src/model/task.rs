use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Task lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Done,
    Blocked,
    Deferred,
    Cancelled,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 6] = [
        TaskStatus::Pending,
        TaskStatus::InProgress,
        TaskStatus::Done,
        TaskStatus::Blocked,
        TaskStatus::Deferred,
        TaskStatus::Cancelled,
    ];

    /// The glyph shown in the task list
    pub fn glyph(self) -> char {
        match self {
            TaskStatus::Pending => ' ',
            TaskStatus::InProgress => '>',
            TaskStatus::Done => 'x',
            TaskStatus::Blocked => '-',
            TaskStatus::Deferred => '~',
            TaskStatus::Cancelled => '/',
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in-progress",
            TaskStatus::Done => "done",
            TaskStatus::Blocked => "blocked",
            TaskStatus::Deferred => "deferred",
            TaskStatus::Cancelled => "cancelled",
        }
    }

    /// Cycle used by the dashboard's status key: pending → in-progress → done → pending.
    /// The remaining states fall back to pending.
    pub fn cycled(self) -> TaskStatus {
        match self {
            TaskStatus::Pending => TaskStatus::InProgress,
            TaskStatus::InProgress => TaskStatus::Done,
            TaskStatus::Done => TaskStatus::Pending,
            TaskStatus::Blocked | TaskStatus::Deferred | TaskStatus::Cancelled => {
                TaskStatus::Pending
            }
        }
    }

    /// Ordering weight for status sort (active work first)
    pub fn sort_rank(self) -> u8 {
        match self {
            TaskStatus::InProgress => 0,
            TaskStatus::Pending => 1,
            TaskStatus::Blocked => 2,
            TaskStatus::Deferred => 3,
            TaskStatus::Done => 4,
            TaskStatus::Cancelled => 5,
        }
    }

    pub fn parse(s: &str) -> Option<TaskStatus> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" | "todo" => Some(TaskStatus::Pending),
            "in-progress" | "in_progress" | "inprogress" | "active" => {
                Some(TaskStatus::InProgress)
            }
            "done" | "completed" => Some(TaskStatus::Done),
            "blocked" => Some(TaskStatus::Blocked),
            "deferred" => Some(TaskStatus::Deferred),
            "cancelled" | "canceled" => Some(TaskStatus::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Task priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }

    pub fn sort_rank(self) -> u8 {
        match self {
            Priority::High => 0,
            Priority::Medium => 1,
            Priority::Low => 2,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A task node. Subtasks are owned and kept in canonical document order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Dotted hierarchical ID, e.g. `2.3.1`
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub details: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub test_strategy: String,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complexity: Option<u32>,
    #[serde(default, deserialize_with = "ids_string_or_number")]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub subtasks: Vec<Task>,
}

impl Task {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Task {
            id: id.into(),
            title: title.into(),
            description: String::new(),
            details: String::new(),
            test_strategy: String::new(),
            status: TaskStatus::Pending,
            priority: Priority::Medium,
            complexity: None,
            dependencies: Vec::new(),
            subtasks: Vec::new(),
        }
    }

    pub fn has_subtasks(&self) -> bool {
        !self.subtasks.is_empty()
    }

    /// Total number of descendants (not counting self)
    pub fn descendant_count(&self) -> usize {
        self.subtasks
            .iter()
            .map(|s| 1 + s.descendant_count())
            .sum()
    }

    /// Depth derived from the dotted ID (0 = top-level)
    pub fn depth(&self) -> usize {
        super::id::depth(&self.id)
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Str(String),
        Num(u64),
    }
    Ok(match Raw::deserialize(deserializer)? {
        Raw::Str(s) => s,
        Raw::Num(n) => n.to_string(),
    })
}

fn ids_string_or_number<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Str(String),
        Num(u64),
    }
    let raw: Vec<Raw> = Vec::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|r| match r {
            Raw::Str(s) => s,
            Raw::Num(n) => n.to_string(),
        })
        .collect())
}

/// Rewrite subtask IDs so each one carries its parent's dotted prefix.
///
/// Task files commonly number subtasks locally (`"id": 1`); after this pass
/// every subtask ID is `parent.N`. Dependencies written in the local form
/// are rewritten the same way.
pub fn normalize_ids(tasks: &mut [Task]) {
    for task in tasks.iter_mut() {
        normalize_children(task);
    }
}

fn normalize_children(parent: &mut Task) {
    let parent_id = parent.id.clone();
    let prefix = format!("{}.", parent_id);
    let local_ids: Vec<String> = parent
        .subtasks
        .iter()
        .map(|s| local_segment(&s.id).to_string())
        .collect();
    for sub in &mut parent.subtasks {
        if !sub.id.starts_with(&prefix) {
            sub.id = format!("{}.{}", parent_id, local_segment(&sub.id));
        }
        for dep in &mut sub.dependencies {
            if !dep.contains('.') && local_ids.iter().any(|l| l == dep) {
                *dep = format!("{}.{}", parent_id, dep);
            }
        }
        normalize_children(sub);
    }
}

fn local_segment(id: &str) -> &str {
    id.rsplit('.').next().unwrap_or(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_numeric_ids_and_defaults() {
        let json = r#"{"id": 3, "title": "Setup", "dependencies": [1, "2"]}"#;
        let task: Task = serde_json::from_str(json).unwrap();
        assert_eq!(task.id, "3");
        assert_eq!(task.dependencies, vec!["1", "2"]);
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.priority, Priority::Medium);
        assert!(task.subtasks.is_empty());
    }

    #[test]
    fn status_uses_kebab_case() {
        let task: Task =
            serde_json::from_str(r#"{"id":"1","title":"t","status":"in-progress"}"#).unwrap();
        assert_eq!(task.status, TaskStatus::InProgress);
        let out = serde_json::to_string(&task).unwrap();
        assert!(out.contains(r#""status":"in-progress""#));
    }

    #[test]
    fn normalize_prefixes_local_subtask_ids() {
        let json = r#"[{"id": 2, "title": "Parent", "subtasks": [
            {"id": 1, "title": "A"},
            {"id": 2, "title": "B", "dependencies": [1]}
        ]}]"#;
        let mut tasks: Vec<Task> = serde_json::from_str(json).unwrap();
        normalize_ids(&mut tasks);
        assert_eq!(tasks[0].subtasks[0].id, "2.1");
        assert_eq!(tasks[0].subtasks[1].id, "2.2");
        assert_eq!(tasks[0].subtasks[1].dependencies, vec!["2.1"]);
    }

    #[test]
    fn normalize_keeps_prefixed_ids() {
        let mut parent = Task::new("1", "P");
        parent.subtasks.push(Task::new("1.1", "A"));
        let mut tasks = vec![parent];
        normalize_ids(&mut tasks);
        assert_eq!(tasks[0].subtasks[0].id, "1.1");
    }

    #[test]
    fn status_cycle() {
        assert_eq!(TaskStatus::Pending.cycled(), TaskStatus::InProgress);
        assert_eq!(TaskStatus::InProgress.cycled(), TaskStatus::Done);
        assert_eq!(TaskStatus::Done.cycled(), TaskStatus::Pending);
        assert_eq!(TaskStatus::Blocked.cycled(), TaskStatus::Pending);
    }

    #[test]
    fn descendant_count_is_recursive() {
        let mut root = Task::new("1", "root");
        let mut child = Task::new("1.1", "child");
        child.subtasks.push(Task::new("1.1.1", "grandchild"));
        root.subtasks.push(child);
        root.subtasks.push(Task::new("1.2", "child 2"));
        assert_eq!(root.descendant_count(), 3);
    }
}
