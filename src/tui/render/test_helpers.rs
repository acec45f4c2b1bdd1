use ratatui::Terminal;
use ratatui::backend::TestBackend;
use tempfile::TempDir;
use tokio::runtime::Handle;

use crate::io::task_store::TaskStore;
use crate::model::{DeckConfig, Priority, Task, TaskStatus};
use crate::tui::app::App;

pub const TERM_W: u16 = 80;
pub const TERM_H: u16 = 24;

/// Render the whole dashboard into an in-memory buffer and return plain
/// text (no styles), trailing blank lines trimmed.
pub fn render_to_string(w: u16, h: u16, app: &mut App) -> String {
    let backend = TestBackend::new(w, h);
    let mut terminal = Terminal::new(backend).unwrap();
    terminal
        .draw(|frame| super::render(frame, app))
        .unwrap();

    let buf = terminal.backend().buffer().clone();
    let w = buf.area.width as usize;
    let lines: Vec<String> = buf
        .content
        .chunks(w)
        .map(|row| {
            let s: String = row.iter().map(|cell| cell.symbol()).collect();
            s.trim_end().to_string()
        })
        .collect();

    let end = lines
        .iter()
        .rposition(|l| !l.is_empty())
        .map_or(0, |i| i + 1);
    lines[..end].join("\n")
}

pub fn sample_tasks() -> Vec<Task> {
    let mut one = Task::new("1", "Set up the storage layer");
    one.priority = Priority::High;
    one.status = TaskStatus::InProgress;
    one.complexity = Some(7);
    one.subtasks.push(Task::new("1.1", "Pick a file format"));
    let mut done = Task::new("1.2", "Write the loader");
    done.status = TaskStatus::Done;
    one.subtasks.push(done);
    let mut two = Task::new("2", "Expose the HTTP API");
    two.dependencies = vec!["1".into()];
    vec![one, two, Task::new("3", "Write the docs")]
}

/// An App over a temp project seeded with `tasks`. Keep the TempDir alive
/// for as long as the App is used.
pub fn app_with_tasks(tasks: Vec<Task>) -> (TempDir, App) {
    let dir = TempDir::new().unwrap();
    let deck = dir.path().join(".taskdeck");
    std::fs::create_dir_all(&deck).unwrap();
    let store = TaskStore::open(&deck, "master");
    store.save_tasks(&tasks).unwrap();
    let mut config = DeckConfig::default();
    config.ui.min_progress_ms = 0;
    let (tasks, tags) = store.get_tasks().unwrap();
    let app = App::new(store, config, tasks, tags, Handle::current());
    (dir, app)
}
