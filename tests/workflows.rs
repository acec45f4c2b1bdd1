//! End-to-end workflow runs against a real task file, driven through the
//! orchestrator the same way the dashboard and CLI drive them.

use std::fs;
use std::path::Path;
use std::time::Duration;

use pretty_assertions::assert_eq;
use tokio_util::sync::CancellationToken;

use taskdeck::error::ServiceError;
use taskdeck::io::task_store::TaskStore;
use taskdeck::ops::complexity::{AnalysisScope, AnalyzeParams};
use taskdeck::ops::delete::{DeleteOptions, DeleteParams};
use taskdeck::ops::task_ops;
use taskdeck::view::TaskIndex;
use taskdeck::workflow::jobs;
use taskdeck::workflow::{
    Orchestrator, ProgressReporter, WorkflowEvent, WorkflowKind, WorkflowOutput, WorkflowPhase,
    WorkflowScope,
};

fn write_tasks(deck: &Path) {
    fs::create_dir_all(deck).unwrap();
    fs::write(
        deck.join("tasks.json"),
        r#"{"master": {"tasks": [
            {"id": 1, "title": "Parent", "subtasks": [
                {"id": "1.1", "title": "Child"},
                {"id": "1.2", "title": "Other child"}
            ]},
            {"id": 2, "title": "Needs parent", "dependencies": [1]},
            {"id": 3, "title": "Refactor the database migration for concurrency"}
        ]}}"#,
    )
    .unwrap();
}

/// Drive `kind` to its terminal event, returning the progress count too.
async fn finish(orchestrator: &mut Orchestrator, kind: WorkflowKind) -> (usize, WorkflowEvent) {
    let mut progress = 0;
    while let Some(msg) = orchestrator.next(kind).await {
        match msg.event {
            WorkflowEvent::Progress(_) => progress += 1,
            event => return (progress, event),
        }
    }
    panic!("{} produced no terminal event", kind.label());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn delete_and_undo_through_orchestrator() {
    let tmp = tempfile::TempDir::new().unwrap();
    write_tasks(tmp.path());
    let store = TaskStore::open(tmp.path(), "master");
    let mut orchestrator = Orchestrator::new(tokio::runtime::Handle::current());

    let params = DeleteParams {
        ids: vec!["1".into()],
        options: DeleteOptions {
            recursive: true,
            force: true,
        },
        undo_seconds: 30,
    };
    orchestrator.start(
        WorkflowKind::Delete,
        WorkflowScope::Selected(vec!["1".into()]),
        jobs::delete(store.clone(), params),
    );
    let (progress, event) = finish(&mut orchestrator, WorkflowKind::Delete).await;
    assert!(progress > 0);
    let WorkflowEvent::Completed(WorkflowOutput::Delete(summary)) = event else {
        panic!("delete did not complete: {:?}", event);
    };
    assert_eq!(summary.deleted_count, 3);
    assert_eq!(orchestrator.phase(WorkflowKind::Delete), WorkflowPhase::Completed);

    let tasks = store.load_tasks().unwrap();
    assert_eq!(task_ops::collect_ids(&tasks), vec!["2", "3"]);
    assert!(tasks[0].dependencies.is_empty());

    let token = summary.undo_token.expect("undo token issued");
    orchestrator.start(
        WorkflowKind::Undo,
        WorkflowScope::Token(token.id.clone()),
        jobs::undo(store.clone(), token.id.clone()),
    );
    let (_, event) = finish(&mut orchestrator, WorkflowKind::Undo).await;
    assert!(matches!(
        event,
        WorkflowEvent::Completed(WorkflowOutput::Undo { restored: 3 })
    ));

    let index = TaskIndex::build(store.load_tasks().unwrap());
    assert_eq!(index.parent("1.2").map(|t| t.title.as_str()), Some("Parent"));
    assert_eq!(index.len(), 5);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancel_after_commit_still_returns_undo_token() {
    let tmp = tempfile::TempDir::new().unwrap();
    write_tasks(tmp.path());
    let store = TaskStore::open(tmp.path(), "master");
    let mut orchestrator = Orchestrator::new(tokio::runtime::Handle::current());

    let params = DeleteParams {
        ids: vec!["3".into()],
        options: DeleteOptions::default(),
        undo_seconds: 30,
    };
    let delete = jobs::delete(store.clone(), params);
    let (committed_tx, committed_rx) = tokio::sync::oneshot::channel::<()>();
    let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();
    orchestrator.start(
        WorkflowKind::Delete,
        WorkflowScope::Selected(vec!["3".into()]),
        move |reporter: &ProgressReporter, cancel: &CancellationToken| {
            let result = delete(reporter, cancel);
            let _ = committed_tx.send(());
            let _ = release_rx.recv();
            result
        },
    );

    committed_rx.await.unwrap();
    assert!(orchestrator.cancel(WorkflowKind::Delete));
    release_tx.send(()).unwrap();

    let (_, event) = finish(&mut orchestrator, WorkflowKind::Delete).await;
    let WorkflowEvent::Completed(WorkflowOutput::Delete(summary)) = event else {
        panic!("committed delete was not reported: {:?}", event);
    };
    assert_eq!(summary.deleted_count, 1);
    assert_eq!(orchestrator.phase(WorkflowKind::Delete), WorkflowPhase::Completed);
    assert_eq!(
        task_ops::collect_ids(&store.load_tasks().unwrap()),
        vec!["1", "1.1", "1.2", "2"]
    );

    let token = summary.undo_token.expect("undo token issued");
    orchestrator.start(
        WorkflowKind::Undo,
        WorkflowScope::Token(token.id.clone()),
        jobs::undo(store.clone(), token.id),
    );
    let (_, event) = finish(&mut orchestrator, WorkflowKind::Undo).await;
    assert!(matches!(
        event,
        WorkflowEvent::Completed(WorkflowOutput::Undo { restored: 1 })
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn analysis_persists_scores() {
    let tmp = tempfile::TempDir::new().unwrap();
    write_tasks(tmp.path());
    let store = TaskStore::open(tmp.path(), "master");
    let mut orchestrator = Orchestrator::new(tokio::runtime::Handle::current());

    let params = AnalyzeParams {
        scope: AnalysisScope::Ids(vec!["3".into()]),
        threshold: 3,
    };
    orchestrator.start(
        WorkflowKind::Complexity,
        WorkflowScope::Selected(vec!["3".into()]),
        jobs::analyze(store.clone(), params),
    );
    let (_, event) = finish(&mut orchestrator, WorkflowKind::Complexity).await;
    let WorkflowEvent::Completed(WorkflowOutput::Complexity(report)) = event else {
        panic!("analysis did not complete: {:?}", event);
    };
    assert_eq!(report.entries.len(), 1);
    let score = report.entries[0].score;
    assert!(score >= 3, "keywords should raise the score, got {}", score);

    let tasks = store.load_tasks().unwrap();
    let stored = task_ops::find_task(&tasks, "3").unwrap();
    assert_eq!(stored.complexity, Some(score));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancel_wins_over_running_job() {
    let mut orchestrator = Orchestrator::new(tokio::runtime::Handle::current());
    orchestrator.start(
        WorkflowKind::Import,
        WorkflowScope::Document("plan.md".into()),
        |_: &ProgressReporter, cancel: &CancellationToken| {
            while !cancel.is_cancelled() {
                std::thread::sleep(Duration::from_millis(5));
            }
            Err(ServiceError::Cancelled)
        },
    );
    assert!(orchestrator.is_running(WorkflowKind::Import));
    assert!(orchestrator.cancel(WorkflowKind::Import));

    let (_, event) = finish(&mut orchestrator, WorkflowKind::Import).await;
    assert!(matches!(event, WorkflowEvent::Cancelled));
    assert_eq!(orchestrator.phase(WorkflowKind::Import), WorkflowPhase::Cancelled);
    assert_eq!(orchestrator.active_count(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn restarting_a_kind_replaces_the_old_run() {
    let mut orchestrator = Orchestrator::new(tokio::runtime::Handle::current());
    let first = orchestrator.start(
        WorkflowKind::Undo,
        WorkflowScope::Token("a".into()),
        |_: &ProgressReporter, cancel: &CancellationToken| {
            while !cancel.is_cancelled() {
                std::thread::sleep(Duration::from_millis(5));
            }
            Err(ServiceError::Cancelled)
        },
    );
    let second = orchestrator.start(
        WorkflowKind::Undo,
        WorkflowScope::Token("b".into()),
        |_: &ProgressReporter, _: &CancellationToken| Ok(WorkflowOutput::Undo { restored: 2 }),
    );
    assert!(second.generation > first.generation);
    assert!(!orchestrator.arm(first));
    assert_eq!(orchestrator.active_count(), 1);

    let msg = orchestrator.next(WorkflowKind::Undo).await.unwrap();
    assert_eq!(msg.generation, second.generation);
    assert!(matches!(
        msg.event,
        WorkflowEvent::Completed(WorkflowOutput::Undo { restored: 2 })
    ));
}
