use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::ServiceError;
use crate::io::atomic_write;
use crate::io::task_store::{StoreError, TaskStore};
use crate::model::task::{Task, TaskStatus};
use crate::ops::{Progress, check_cancelled, task_ops};

pub const REPORT_FILE: &str = "complexity-report.json";

const HARD_KEYWORDS: &[&str] = &[
    "architecture",
    "refactor",
    "migration",
    "migrate",
    "concurrent",
    "concurrency",
    "async",
    "distributed",
    "security",
    "performance",
    "optimize",
    "algorithm",
    "protocol",
    "integration",
    "database",
    "schema",
];

/// Which tasks an analysis run covers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisScope {
    /// Every top-level task
    All,
    /// Top-level tasks still pending
    Pending,
    /// Explicit IDs, at any depth
    Ids(Vec<String>),
}

#[derive(Debug, Clone)]
pub struct AnalyzeParams {
    pub scope: AnalysisScope,
    pub threshold: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplexityEntry {
    pub id: String,
    pub title: String,
    pub score: u32,
    pub recommended_subtasks: usize,
    pub reasoning: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplexityReport {
    pub analyzed_at: DateTime<Utc>,
    pub threshold: u32,
    pub entries: Vec<ComplexityEntry>,
}

impl ComplexityReport {
    /// Entries at or above the threshold
    pub fn needing_expansion(&self) -> impl Iterator<Item = &ComplexityEntry> {
        self.entries.iter().filter(|e| e.score >= self.threshold)
    }

    pub fn average_score(&self) -> f64 {
        if self.entries.is_empty() {
            return 0.0;
        }
        let total: u32 = self.entries.iter().map(|e| e.score).sum();
        total as f64 / self.entries.len() as f64
    }
}

/// Score a single task. Returns the score and the signals that raised it.
pub fn score_task(task: &Task) -> (u32, Vec<String>) {
    let text = format!("{} {} {}", task.title, task.description, task.details);
    let mut reasons = Vec::new();
    let mut score = 1;

    let length = score_text_length(&text);
    if length > 0 {
        reasons.push(format!("{} words of description", text.split_whitespace().count()));
    }
    score += length;

    let (kw_score, hits) = score_keywords(&text);
    if !hits.is_empty() {
        reasons.push(format!("mentions {}", hits.join(", ")));
    }
    score += kw_score;

    let deps = task.dependencies.len();
    let dep_score = match deps {
        0 => 0,
        1..=2 => 1,
        _ => 2,
    };
    if dep_score > 0 {
        reasons.push(format!("{} dependencies", deps));
    }
    score += dep_score;

    // Long descriptions with no breakdown yet
    if task.subtasks.is_empty() && length > 1 {
        reasons.push("not yet broken down".into());
        score += 1;
    }

    if reasons.is_empty() {
        reasons.push("short, self-contained".into());
    }
    (score.clamp(1, 10), reasons)
}

fn score_text_length(text: &str) -> u32 {
    let words = text.split_whitespace().count();
    if words < 10 {
        0
    } else if words < 30 {
        1
    } else if words < 60 {
        2
    } else {
        3
    }
}

fn score_keywords(text: &str) -> (u32, Vec<String>) {
    let lower = text.to_lowercase();
    let hits: Vec<String> = HARD_KEYWORDS
        .iter()
        .filter(|kw| lower.contains(*kw))
        .map(|kw| kw.to_string())
        .collect();
    ((hits.len() as u32).min(3), hits)
}

/// Suggested subtask count for a score
pub fn recommended_subtasks(score: u32) -> usize {
    match score {
        0..=3 => 0,
        4..=5 => 3,
        6..=7 => 4,
        8..=9 => 5,
        _ => 6,
    }
}

/// Resolve the tasks covered by `scope`. Unknown explicit IDs are an error.
pub fn select_targets<'a>(
    tasks: &'a [Task],
    scope: &AnalysisScope,
) -> Result<Vec<&'a Task>, ServiceError> {
    match scope {
        AnalysisScope::All => Ok(tasks.iter().collect()),
        AnalysisScope::Pending => Ok(tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Pending)
            .collect()),
        AnalysisScope::Ids(ids) => ids
            .iter()
            .map(|id| {
                task_ops::find_task(tasks, id).ok_or_else(|| ServiceError::NotFound(id.clone()))
            })
            .collect(),
    }
}

/// Score the tasks in `scope` from a snapshot. Pure apart from progress
/// reporting; checks `cancel` before each task.
pub fn analyze(
    tasks: &[Task],
    params: &AnalyzeParams,
    now: DateTime<Utc>,
    cancel: &CancellationToken,
    on_progress: &mut dyn FnMut(Progress),
) -> Result<ComplexityReport, ServiceError> {
    let targets = select_targets(tasks, &params.scope)?;
    if targets.is_empty() {
        return Err(ServiceError::Validation("no tasks in scope to analyze".into()));
    }
    let total = targets.len();
    let mut entries = Vec::with_capacity(total);
    for (i, task) in targets.into_iter().enumerate() {
        check_cancelled(cancel)?;
        on_progress(Progress::new(
            "analyzing",
            i,
            total,
            format!("{} {}", task.id, task.title),
        ));
        let (score, reasons) = score_task(task);
        entries.push(ComplexityEntry {
            id: task.id.clone(),
            title: task.title.clone(),
            score,
            recommended_subtasks: recommended_subtasks(score),
            reasoning: reasons.join("; "),
        });
    }
    on_progress(Progress::new("analyzing", total, total, "done"));
    Ok(ComplexityReport {
        analyzed_at: now,
        threshold: params.threshold,
        entries,
    })
}

/// Write scores back into the tree. Returns how many tasks were updated.
pub fn apply_scores(tasks: &mut [Task], report: &ComplexityReport) -> usize {
    let mut updated = 0;
    for entry in &report.entries {
        if let Some(task) = task_ops::find_task_mut(tasks, &entry.id) {
            task.complexity = Some(entry.score);
            updated += 1;
        }
    }
    updated
}

pub fn write_report(deck_dir: &Path, report: &ComplexityReport) -> Result<PathBuf, StoreError> {
    let path = deck_dir.join(REPORT_FILE);
    let json = serde_json::to_string_pretty(report).map_err(|source| StoreError::Json {
        path: path.clone(),
        source,
    })?;
    atomic_write(&path, json.as_bytes()).map_err(|source| StoreError::Io {
        path: path.clone(),
        source,
    })?;
    Ok(path)
}

/// Full analysis against the store: snapshot, score, then persist scores
/// and the report. Nothing is written if cancelled before scoring ends.
pub fn analyze_with_progress(
    store: &TaskStore,
    params: &AnalyzeParams,
    cancel: &CancellationToken,
    on_progress: &mut dyn FnMut(Progress),
) -> Result<ComplexityReport, ServiceError> {
    let snapshot = store.load_tasks()?;
    let report = analyze(&snapshot, params, Utc::now(), cancel, on_progress)?;
    check_cancelled(cancel)?;
    store.update(|tasks| Ok(apply_scores(tasks, &report)))?;
    write_report(store.deck_dir(), &report)?;
    tracing::info!(
        analyzed = report.entries.len(),
        above_threshold = report.needing_expansion().count(),
        "complexity analysis finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn params(scope: AnalysisScope) -> AnalyzeParams {
        AnalyzeParams {
            scope,
            threshold: 5,
        }
    }

    #[test]
    fn trivial_task_scores_low() {
        let (score, reasons) = score_task(&Task::new("1", "Fix typo"));
        assert_eq!(score, 1);
        assert_eq!(reasons, vec!["short, self-contained"]);
    }

    #[test]
    fn keywords_and_dependencies_raise_score() {
        let mut task = Task::new("1", "Refactor async database layer");
        task.dependencies = vec!["2".into(), "3".into(), "4".into()];
        let (score, reasons) = score_task(&task);
        // 1 base + 3 keywords (capped) + 2 dependencies
        assert_eq!(score, 6);
        assert!(reasons.iter().any(|r| r.starts_with("mentions")));
    }

    #[test]
    fn score_never_exceeds_ten() {
        let mut task = Task::new("1", "architecture refactor migration concurrency");
        task.details = "word ".repeat(80);
        task.dependencies = (0..5).map(|i| i.to_string()).collect();
        assert_eq!(score_task(&task).0, 10);
    }

    #[test]
    fn pending_scope_skips_other_statuses() {
        let mut done = Task::new("2", "Done");
        done.status = TaskStatus::Done;
        let tasks = vec![Task::new("1", "Open"), done];
        let targets = select_targets(&tasks, &AnalysisScope::Pending).unwrap();
        assert_eq!(targets.len(), 1);
    }

    #[test]
    fn unknown_id_in_scope_is_not_found() {
        let tasks = vec![Task::new("1", "Open")];
        let err = select_targets(&tasks, &AnalysisScope::Ids(vec!["9".into()])).unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(id) if id == "9"));
    }

    #[test]
    fn analyze_reports_progress_per_task() {
        let tasks = vec![Task::new("1", "A"), Task::new("2", "B")];
        let mut seen = Vec::new();
        let report = analyze(
            &tasks,
            &params(AnalysisScope::All),
            now(),
            &CancellationToken::new(),
            &mut |p| seen.push((p.current, p.total)),
        )
        .unwrap();
        assert_eq!(report.entries.len(), 2);
        assert_eq!(seen, vec![(0, 2), (1, 2), (2, 2)]);
    }

    #[test]
    fn analyze_stops_when_cancelled() {
        let tasks = vec![Task::new("1", "A")];
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = analyze(&tasks, &params(AnalysisScope::All), now(), &cancel, &mut |_| {})
            .unwrap_err();
        assert!(err.is_cancelled());
    }

    #[test]
    fn empty_scope_is_a_validation_error() {
        let err = analyze(
            &[],
            &params(AnalysisScope::All),
            now(),
            &CancellationToken::new(),
            &mut |_| {},
        )
        .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[test]
    fn apply_writes_complexity_fields() {
        let mut tasks = vec![Task::new("1", "A")];
        let report = analyze(
            &tasks,
            &params(AnalysisScope::All),
            now(),
            &CancellationToken::new(),
            &mut |_| {},
        )
        .unwrap();
        assert_eq!(apply_scores(&mut tasks, &report), 1);
        assert_eq!(tasks[0].complexity, Some(1));
    }
}
