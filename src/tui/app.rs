use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use crossterm::event::{self, Event, KeyEventKind};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use tokio::runtime::Handle;

use crate::error::{AppError, ErrorKind};
use crate::io::project_io::ProjectPaths;
use crate::io::task_store::{StoreError, TaskStore};
use crate::io::undo_log;
use crate::io::watcher::TaskWatcher;
use crate::model::{DeckConfig, Task, TaskStatus};
use crate::ops::complexity::{AnalysisScope, AnalyzeParams, ComplexityReport};
use crate::ops::delete::{self, DeleteParams, DeleteSummary};
use crate::ops::expand::{ExpandParams, ExpandSummary};
use crate::ops::import::{ImportParams, ImportSummary};
use crate::util::plural;
use crate::view::{SortMode, TaskView, ViewMode, ViewOptions};
use crate::workflow::delete_flow::{self, DeleteStep};
use crate::workflow::dialog::{
    ChoiceDialog, ChoicePurpose, ConfirmAction, ConfirmDialog, DeleteOptionsDialog, Dialog,
    DialogOutcome, DialogStack, ImpactReviewDialog, InputPurpose, ProgressDialog, ResultDialog,
    TextInputDialog, UndoDialog,
};
use crate::workflow::hold::CompletionHold;
use crate::workflow::jobs::{self, Job};
use crate::workflow::undo::{UndoSlot, UndoTick};
use crate::workflow::{
    Await, Orchestrator, WorkflowEvent, WorkflowKind, WorkflowMessage, WorkflowOutput,
    WorkflowScope,
};

use super::input;
use super::render;
use super::theme::Theme;

const INPUT_POLL: Duration = Duration::from_millis(50);

/// Current interaction mode (dialogs take precedence over both)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Navigate,
    Search,
}

/// Follow-up work returned by handlers and executed by the event loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Read one more message from a workflow channel
    Await(Await),
    /// Persist the view state
    SaveState,
}

/// Dashboard state. Everything the event loop touches lives here.
pub struct App {
    pub store: TaskStore,
    pub config: DeckConfig,
    pub tags: Vec<String>,
    pub view: TaskView,
    pub dialogs: DialogStack,
    pub orchestrator: Orchestrator,
    pub undo: UndoSlot,
    pub hold: CompletionHold,
    pub mode: Mode,
    /// Query being typed in search mode
    pub search_input: String,
    /// Search in effect when search mode was entered (restored on Esc)
    pub search_before: Option<String>,
    pub status_message: Option<String>,
    pub show_help: bool,
    /// First visible row of the task list
    pub scroll_offset: usize,
    pub should_quit: bool,
    pub theme: Theme,
}

impl App {
    pub fn new(
        store: TaskStore,
        config: DeckConfig,
        tasks: Vec<Task>,
        tags: Vec<String>,
        handle: Handle,
    ) -> Self {
        let options = ViewOptions {
            mode: ViewMode::parse(&config.ui.view_mode).unwrap_or_default(),
            ..Default::default()
        };
        let theme = Theme::from_config(&config.ui);
        let hold = CompletionHold::new(Duration::from_millis(config.ui.min_progress_ms));

        App {
            store,
            config,
            tags,
            view: TaskView::new(tasks, options),
            dialogs: DialogStack::default(),
            orchestrator: Orchestrator::new(handle),
            undo: UndoSlot::default(),
            hold,
            mode: Mode::Navigate,
            search_input: String::new(),
            search_before: None,
            status_message: None,
            show_help: false,
            scroll_offset: 0,
            should_quit: false,
            theme,
        }
    }

    pub fn project_root(&self) -> &Path {
        self.store.deck_dir().parent().unwrap_or(self.store.deck_dir())
    }

    /// Re-read the task file and rebuild the view around the current selection.
    pub fn reload(&mut self) {
        match self.store.get_tasks() {
            Ok((tasks, tags)) => {
                self.view.replace_tasks(tasks);
                self.tags = tags;
                tracing::debug!(tasks = self.view.index().len(), "view reloaded");
            }
            Err(e) => {
                tracing::warn!(error = %e, "reload failed");
                self.dialogs.push(Dialog::Error(AppError::from(&e)));
            }
        }
    }

    /// A lookup by ID missed. The view is older than the data it points at.
    fn stale_notice(&mut self, task_id: &str) {
        tracing::warn!(id = task_id, "selection no longer resolves");
        self.status_message = Some("view out of date, press r to reload".into());
    }

    /// The selected task, cloned. A selection that no longer resolves shows
    /// the stale-view notice instead.
    fn selected_task_or_notice(&mut self) -> Option<Task> {
        let task_id = self.view.selected_id()?.to_string();
        match self.view.index().resolve(&task_id) {
            Some(task) => Some(task.clone()),
            None => {
                self.stale_notice(&task_id);
                None
            }
        }
    }

    /// Action targets that still resolve
    fn live_targets(&mut self) -> Vec<String> {
        let (live, stale): (Vec<String>, Vec<String>) = self
            .view
            .action_targets()
            .into_iter()
            .partition(|id| self.view.index().contains(id));
        if !stale.is_empty() {
            self.stale_notice(&stale.join(", "));
        }
        live
    }

    /// Execute handler output: arm waits and persist state.
    pub fn apply(&mut self, commands: Vec<Command>) {
        let mut save = false;
        for command in commands {
            match command {
                Command::Await(wait) => {
                    self.orchestrator.arm(wait);
                }
                Command::SaveState => save = true,
            }
        }
        if save {
            save_ui_state(self);
        }
    }

    // -----------------------------------------------------------------
    // Direct actions

    pub fn cycle_selected_status(&mut self) {
        let Some(task) = self.selected_task_or_notice() else {
            return;
        };
        let next = task.status.cycled();
        match self.store.set_status(&task.id, next) {
            Ok(()) => {
                self.view.set_status(&task.id, next);
                self.status_message = Some(format!("task {} is now {}", task.id, next));
            }
            Err(StoreError::NotFound(id)) => self.stale_notice(&id),
            Err(e) => self.dialogs.push(Dialog::Error(AppError::from(&e))),
        }
    }

    pub fn open_go_to(&mut self) {
        self.dialogs.push(Dialog::TextInput(TextInputDialog::new(
            "Go to task",
            "ID:",
            "",
            InputPurpose::GoToId,
        )));
    }

    pub fn quit(&mut self) {
        if self.orchestrator.active_count() > 0 {
            tracing::info!(running = self.orchestrator.active_count(), "cancelling workflows on quit");
        }
        self.orchestrator.shutdown();
        self.should_quit = true;
    }

    // -----------------------------------------------------------------
    // Workflow entry points (open the first dialog)

    pub fn begin_analyze(&mut self) {
        let selection = self.live_targets();
        self.orchestrator.begin_scoping(WorkflowKind::Complexity);
        self.dialogs
            .push(Dialog::Choice(ChoiceDialog::analyze_scope(selection)));
    }

    pub fn begin_import(&mut self) {
        self.orchestrator.begin_scoping(WorkflowKind::Import);
        self.dialogs.push(Dialog::TextInput(TextInputDialog::new(
            "Import document",
            "Path:",
            "",
            InputPurpose::ImportPath,
        )));
    }

    pub fn begin_expand(&mut self) {
        let Some(task) = self.selected_task_or_notice() else {
            return;
        };
        self.orchestrator.begin_scoping(WorkflowKind::Expand);
        self.dialogs.push(Dialog::TextInput(TextInputDialog::new(
            &format!("Expand task {}", task.id),
            "Subtasks:",
            &self.config.expand.default_subtasks.to_string(),
            InputPurpose::ExpandCount { id: task.id },
        )));
    }

    pub fn begin_delete(&mut self) {
        let ids = self.live_targets();
        if DeleteStep::begin(&ids) == DeleteStep::Aborted {
            self.status_message = Some("nothing selected".into());
            return;
        }
        self.orchestrator.begin_scoping(WorkflowKind::Delete);
        let message = match ids.len() {
            1 => format!("Delete task {}?", ids[0]),
            n => format!("Delete {} tasks ({})?", n, ids.join(", ")),
        };
        self.dialogs.push(Dialog::Confirm(ConfirmDialog {
            title: "Delete".into(),
            message,
            action: ConfirmAction::Delete { ids },
        }));
    }

    /// Redeem the live undo token, if any.
    pub fn request_undo(&mut self) -> Vec<Command> {
        self.dialogs.close_undo();
        match self.undo.redeem(Utc::now()) {
            Ok(token) => {
                let scope = WorkflowScope::Token(token.id.clone());
                let job = jobs::undo(self.store.clone(), token.id);
                self.launch(WorkflowKind::Undo, scope, job)
            }
            Err(e) => {
                self.status_message = Some(e.to_string());
                Vec::new()
            }
        }
    }

    /// Ask the running workflow behind the top progress dialog to stop.
    pub fn cancel_top_workflow(&mut self) {
        let Some(Dialog::Progress(progress)) = self.dialogs.top_mut() else {
            return;
        };
        progress.cancelling = true;
        let kind = progress.kind;
        self.orchestrator.cancel(kind);
    }

    fn launch<J: Job>(&mut self, kind: WorkflowKind, scope: WorkflowScope, job: J) -> Vec<Command> {
        let wait = self.orchestrator.start(kind, scope, job);
        self.dialogs.close_progress(kind);
        self.dialogs.push(Dialog::Progress(ProgressDialog {
            kind,
            opened_at: Instant::now(),
            progress: None,
            cancelling: false,
        }));
        vec![Command::Await(wait)]
    }

    fn start_expand(&mut self, id: String, num: usize, force: bool) -> Vec<Command> {
        let params = ExpandParams {
            id: id.clone(),
            num,
            force,
        };
        let job = jobs::expand(self.store.clone(), params);
        self.launch(WorkflowKind::Expand, WorkflowScope::Selected(vec![id]), job)
    }

    // -----------------------------------------------------------------
    // Dialog resolution

    /// Pop the top dialog with `outcome` and run its continuation.
    pub fn resolve_dialog(&mut self, outcome: DialogOutcome) -> Vec<Command> {
        let Some((dialog, outcome)) = self.dialogs.resolve(outcome) else {
            return Vec::new();
        };
        match (dialog, outcome) {
            (Dialog::Choice(choice), DialogOutcome::Accepted) => self.on_choice(choice),
            (Dialog::Confirm(confirm), DialogOutcome::Accepted) => self.on_confirm(confirm.action),
            (Dialog::DeleteOptions(options), DialogOutcome::Accepted) => {
                self.on_delete_options(options);
                Vec::new()
            }
            (Dialog::ImpactReview(review), DialogOutcome::Accepted) => self.on_impact_review(review),
            (Dialog::TextInput(input), DialogOutcome::Accepted) => self.on_text_input(input),
            (Dialog::Progress(progress), _) => {
                // Progress dialogs close when their workflow ends, not on input.
                self.dialogs.push(Dialog::Progress(progress));
                Vec::new()
            }
            (Dialog::Undo(_), _) => {
                self.undo.dismiss();
                Vec::new()
            }
            (Dialog::Result(_) | Dialog::Error(_), _) => {
                self.orchestrator.settle_finished();
                Vec::new()
            }
            (dialog, DialogOutcome::Cancelled) => {
                if let Some(kind) = scoping_kind(&dialog) {
                    self.orchestrator.settle(kind);
                    if kind == WorkflowKind::Delete {
                        self.status_message = Some("delete cancelled".into());
                    }
                }
                Vec::new()
            }
        }
    }

    fn on_choice(&mut self, choice: ChoiceDialog) -> Vec<Command> {
        match choice.purpose {
            ChoicePurpose::AnalyzeScope { selection } => {
                let (scope, label) = match choice.selected {
                    0 => (AnalysisScope::All, WorkflowScope::AllTasks),
                    1 => (AnalysisScope::Pending, WorkflowScope::PendingTasks),
                    _ => (
                        AnalysisScope::Ids(selection.clone()),
                        WorkflowScope::Selected(selection),
                    ),
                };
                let params = AnalyzeParams {
                    scope,
                    threshold: self.config.analysis.threshold,
                };
                let job = jobs::analyze(self.store.clone(), params);
                self.launch(WorkflowKind::Complexity, label, job)
            }
            ChoicePurpose::ImportMode { path } => {
                let params = ImportParams {
                    path: path.clone(),
                    append: choice.selected == 0,
                };
                let job = jobs::import(self.store.clone(), params);
                self.launch(WorkflowKind::Import, WorkflowScope::Document(path), job)
            }
        }
    }

    fn on_confirm(&mut self, action: ConfirmAction) -> Vec<Command> {
        match action {
            ConfirmAction::Delete { ids } => {
                if delete_flow::advance(DeleteStep::Confirm, true, None) == DeleteStep::Options {
                    self.dialogs
                        .push(Dialog::DeleteOptions(DeleteOptionsDialog::new(ids)));
                }
                Vec::new()
            }
            ConfirmAction::ReplaceSubtasks { id, num } => self.start_expand(id, num, true),
        }
    }

    fn on_delete_options(&mut self, dialog: DeleteOptionsDialog) {
        if delete_flow::advance(DeleteStep::Options, true, None) != DeleteStep::ImpactReview {
            return;
        }
        match delete::analyze_impact(self.view.index().tasks(), &dialog.ids, dialog.options) {
            Ok(impact) => {
                tracing::debug!(
                    total = impact.total_delete_count,
                    blocked = impact.is_blocked(),
                    "delete impact reviewed"
                );
                self.dialogs.push(Dialog::ImpactReview(ImpactReviewDialog {
                    ids: dialog.ids,
                    options: dialog.options,
                    impact,
                }));
            }
            Err(e) => {
                self.orchestrator.settle(WorkflowKind::Delete);
                if let Some(err) =
                    AppError::from_service(&WorkflowKind::Delete.failure_title(), &e)
                {
                    self.dialogs.push(Dialog::Error(err));
                }
            }
        }
    }

    fn on_impact_review(&mut self, review: ImpactReviewDialog) -> Vec<Command> {
        match delete_flow::advance(DeleteStep::ImpactReview, true, Some(&review.impact)) {
            DeleteStep::Options => {
                let mut options = DeleteOptionsDialog::new(review.ids);
                options.options = review.options;
                options.notice = review.impact.blocking_reason().map(str::to_string);
                self.dialogs.push(Dialog::DeleteOptions(options));
                Vec::new()
            }
            DeleteStep::Execute => {
                let params = DeleteParams {
                    ids: review.ids.clone(),
                    options: review.options,
                    undo_seconds: self.config.ui.undo_seconds,
                };
                let job = jobs::delete(self.store.clone(), params);
                self.launch(WorkflowKind::Delete, WorkflowScope::Selected(review.ids), job)
            }
            _ => {
                self.orchestrator.settle(WorkflowKind::Delete);
                Vec::new()
            }
        }
    }

    fn on_text_input(&mut self, input: TextInputDialog) -> Vec<Command> {
        let value = input.value.trim();
        match input.purpose {
            InputPurpose::ImportPath => {
                if value.is_empty() {
                    self.orchestrator.settle(WorkflowKind::Import);
                    self.status_message = Some("no file given".into());
                    return Vec::new();
                }
                let path = self.resolve_path(value);
                self.dialogs
                    .push(Dialog::Choice(ChoiceDialog::import_mode(path)));
                Vec::new()
            }
            InputPurpose::ExpandCount { id } => {
                let num = if value.is_empty() {
                    self.config.expand.default_subtasks
                } else {
                    match value.parse::<usize>() {
                        Ok(n) => n,
                        Err(_) => {
                            self.orchestrator.settle(WorkflowKind::Expand);
                            self.dialogs.push(Dialog::Error(
                                AppError::new(
                                    ErrorKind::Validation,
                                    WorkflowKind::Expand.failure_title(),
                                    format!("'{}' is not a number", value),
                                )
                                .with_hint("Enter how many subtasks to generate"),
                            ));
                            return Vec::new();
                        }
                    }
                };
                let existing = self.view.index().resolve(&id).map(|t| t.subtasks.len());
                match existing {
                    None => {
                        self.orchestrator.settle(WorkflowKind::Expand);
                        self.stale_notice(&id);
                        Vec::new()
                    }
                    Some(0) => self.start_expand(id, num, false),
                    Some(count) => {
                        self.dialogs.push(Dialog::Confirm(ConfirmDialog {
                            title: format!("Expand task {}", id),
                            message: format!(
                                "Task {} already has {} subtasks. Replace them?",
                                id, count
                            ),
                            action: ConfirmAction::ReplaceSubtasks { id, num },
                        }));
                        Vec::new()
                    }
                }
            }
            InputPurpose::GoToId => {
                if value.is_empty() {
                    return Vec::new();
                }
                if self.view.select_by_id(value) {
                    vec![Command::SaveState]
                } else {
                    self.status_message = Some(format!("task {} not found or filtered out", value));
                    Vec::new()
                }
            }
        }
    }

    fn resolve_path(&self, raw: &str) -> PathBuf {
        let path = PathBuf::from(raw);
        if path.is_absolute() {
            path
        } else {
            self.project_root().join(path)
        }
    }

    // -----------------------------------------------------------------
    // Workflow messages and timers

    /// Consume one workflow message. Progress always re-arms the channel;
    /// a successful result may be held until the progress dialog has been
    /// visible long enough.
    pub fn handle_workflow_message(&mut self, msg: WorkflowMessage, now: Instant) -> Vec<Command> {
        if let WorkflowEvent::Progress(progress) = &msg.event {
            if let Some(dialog) = self.dialogs.progress_mut(msg.kind) {
                dialog.progress = Some(progress.clone());
            }
            return vec![Command::Await(Await {
                kind: msg.kind,
                generation: msg.generation,
            })];
        }
        let opened_at = self.dialogs.progress_mut(msg.kind).map(|d| d.opened_at);
        match self.hold.admit(msg, opened_at, now) {
            Some(msg) => self.finish_workflow(msg),
            None => Vec::new(),
        }
    }

    /// How long the loop may wait for input before timer work is due
    pub fn input_timeout(&self, now: Instant) -> Duration {
        match self.hold.next_deadline() {
            Some(at) => at.saturating_duration_since(now).min(INPUT_POLL),
            None => INPUT_POLL,
        }
    }

    /// Timer work: release held results and advance the undo countdown.
    pub fn tick(&mut self, now: Instant, wall: DateTime<Utc>) -> Vec<Command> {
        let mut commands = Vec::new();
        for msg in self.hold.release(now) {
            commands.extend(self.finish_workflow(msg));
        }
        match self.undo.poll(wall) {
            Some(UndoTick::Tick { remaining_secs, .. }) => {
                if let Some(dialog) = self.dialogs.undo_mut() {
                    dialog.remaining_secs = remaining_secs;
                }
            }
            Some(UndoTick::Expired { .. }) => {
                self.dialogs.close_undo();
                self.status_message = Some("undo expired".into());
            }
            None => {}
        }
        commands
    }

    fn finish_workflow(&mut self, msg: WorkflowMessage) -> Vec<Command> {
        self.dialogs.close_progress(msg.kind);
        match msg.event {
            WorkflowEvent::Completed(output) => return self.on_completed(output),
            WorkflowEvent::Failed(err) => {
                if let Some(app_err) = AppError::from_service(&msg.kind.failure_title(), &err) {
                    self.dialogs.push(Dialog::Error(app_err));
                }
                self.reload();
            }
            WorkflowEvent::Cancelled => {
                self.status_message = Some(format!("{}: operation cancelled", msg.kind.label()));
                self.reload();
                self.orchestrator.settle_finished();
            }
            WorkflowEvent::StreamClosed => {
                self.status_message = Some(format!("{} ended without a result", msg.kind.label()));
                self.reload();
                self.orchestrator.settle_finished();
            }
            WorkflowEvent::Progress(_) => {}
        }
        Vec::new()
    }

    fn on_completed(&mut self, output: WorkflowOutput) -> Vec<Command> {
        self.reload();
        match output {
            WorkflowOutput::Complexity(report) => {
                self.push_result("Complexity analysis", complexity_lines(&report));
            }
            WorkflowOutput::Import(summary) => {
                if let Some(first) = summary.assigned_ids.first() {
                    self.view.select_by_id(first);
                }
                self.push_result("Import finished", import_lines(&summary));
            }
            WorkflowOutput::Expand(summary) => {
                if self.view.select_by_id(&summary.parent_id) {
                    self.view.expand();
                }
                self.push_result("Expand finished", expand_lines(&summary));
            }
            WorkflowOutput::Delete(summary) => {
                self.view.clear_multi_select();
                self.on_deleted(summary);
            }
            WorkflowOutput::Undo { restored } => {
                self.status_message = Some(format!("restored {}", plural(restored, "task")));
                self.orchestrator.settle_finished();
            }
        }
        vec![Command::SaveState]
    }

    fn on_deleted(&mut self, summary: DeleteSummary) {
        let mut message = format!("deleted {}", plural(summary.deleted_count, "task"));
        if !summary.warnings.is_empty() {
            message.push_str(&format!(" ({})", summary.warnings.join("; ")));
        }
        self.status_message = Some(message);
        match summary.undo_token {
            Some(token) => {
                self.undo.open(token.clone(), Utc::now());
                let remaining_secs = self.undo.session().map_or(0, |s| s.remaining_secs());
                self.dialogs.push(Dialog::Undo(UndoDialog {
                    token,
                    remaining_secs,
                }));
            }
            None => self.orchestrator.settle_finished(),
        }
    }

    fn push_result(&mut self, title: &str, lines: Vec<String>) {
        self.dialogs.push(Dialog::Result(ResultDialog {
            title: title.to_string(),
            lines,
        }));
    }
}

/// Workflow a scoping dialog belongs to
fn scoping_kind(dialog: &Dialog) -> Option<WorkflowKind> {
    match dialog {
        Dialog::Choice(c) => Some(match c.purpose {
            ChoicePurpose::AnalyzeScope { .. } => WorkflowKind::Complexity,
            ChoicePurpose::ImportMode { .. } => WorkflowKind::Import,
        }),
        Dialog::Confirm(c) => Some(match c.action {
            ConfirmAction::Delete { .. } => WorkflowKind::Delete,
            ConfirmAction::ReplaceSubtasks { .. } => WorkflowKind::Expand,
        }),
        Dialog::DeleteOptions(_) | Dialog::ImpactReview(_) => Some(WorkflowKind::Delete),
        Dialog::TextInput(t) => match t.purpose {
            InputPurpose::ImportPath => Some(WorkflowKind::Import),
            InputPurpose::ExpandCount { .. } => Some(WorkflowKind::Expand),
            InputPurpose::GoToId => None,
        },
        _ => None,
    }
}

fn complexity_lines(report: &ComplexityReport) -> Vec<String> {
    let mut lines = vec![format!(
        "Analyzed {} (average score {:.1})",
        plural(report.entries.len(), "task"),
        report.average_score()
    )];
    let above: Vec<_> = report.needing_expansion().collect();
    if above.is_empty() {
        lines.push(format!("Nothing scores at or above {}", report.threshold));
    } else {
        lines.push(format!("At or above {}:", report.threshold));
        for entry in above {
            lines.push(format!(
                "  {} [{}] {} ({} subtasks suggested)",
                entry.id, entry.score, entry.title, entry.recommended_subtasks
            ));
        }
    }
    lines
}

fn import_lines(summary: &ImportSummary) -> Vec<String> {
    let mut lines = vec![format!("Imported {}", plural(summary.total_count, "task"))];
    if let (Some(first), Some(last)) = (summary.assigned_ids.first(), summary.assigned_ids.last()) {
        if first == last {
            lines.push(format!("New top-level task: {}", first));
        } else {
            lines.push(format!("New top-level tasks: {} to {}", first, last));
        }
    }
    if summary.replaced_count > 0 {
        lines.push(format!("Replaced {}", plural(summary.replaced_count, "existing task")));
    }
    lines
}

fn expand_lines(summary: &ExpandSummary) -> Vec<String> {
    let mut lines = vec![format!(
        "Added {} to task {}",
        plural(summary.created_ids.len(), "subtask"),
        summary.parent_id
    )];
    if summary.replaced_count > 0 {
        lines.push(format!("Replaced {}", plural(summary.replaced_count, "previous subtask")));
    }
    lines
}

/// Restore view state from `.taskdeck/state.json`
pub fn restore_ui_state(app: &mut App) {
    use crate::io::state::read_ui_state;

    let Some(state) = read_ui_state(app.store.deck_dir()) else {
        return;
    };

    if let Some(mode) = state.view_mode.as_deref().and_then(ViewMode::parse) {
        app.view.set_view_mode(mode);
    }
    if let Some(sort) = state.sort.as_deref().and_then(SortMode::parse) {
        app.view.set_sort(sort);
    }
    if let Some(status) = state.status_filter.as_deref().and_then(TaskStatus::parse) {
        app.view.set_status_filter(Some(status));
    }
    let expanded: HashSet<String> = state
        .expanded
        .into_iter()
        .filter(|id| app.view.index().contains(id))
        .collect();
    app.view.set_expanded(expanded);
    if state.last_search.is_some() {
        app.view.set_search(state.last_search);
    }
    if let Some(selected) = state.selected_id {
        app.view.select_by_id(&selected);
    }
}

/// Save view state. Failures are logged and otherwise ignored.
pub fn save_ui_state(app: &App) {
    use crate::io::state::{UiState, write_ui_state};

    let options = app.view.options();
    let state = UiState {
        view_mode: Some(options.mode.as_str().to_string()),
        expanded: options.expanded.iter().cloned().collect(),
        selected_id: app.view.selected_id().map(str::to_string),
        status_filter: options.status_filter.map(|s| s.as_str().to_string()),
        sort: Some(options.sort.as_str().to_string()),
        last_search: options.search.clone(),
    };
    if let Err(e) = write_ui_state(app.store.deck_dir(), &state) {
        tracing::warn!(error = %e, "could not save UI state");
    }
}

/// Run the dashboard until the user quits. Background work is spawned on
/// `handle`; this thread owns the terminal and all UI state.
pub fn run(
    handle: Handle,
    paths: &ProjectPaths,
    config: DeckConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = TaskStore::open(&paths.deck_dir, &config.project.tag);
    let (tasks, tags) = store.get_tasks()?;
    let pruned = undo_log::prune_expired(&paths.deck_dir, Utc::now());
    if pruned > 0 {
        tracing::debug!(pruned, "removed expired undo records");
    }

    let mut app = App::new(store, config, tasks, tags, handle);
    restore_ui_state(&mut app);

    let watcher = match app.store.reload_events() {
        Ok(w) => Some(w),
        Err(e) => {
            tracing::warn!(error = %e, "file watcher unavailable; press r to reload");
            None
        }
    };

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    // Restore the terminal before the default hook prints the panic
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        original_hook(panic_info);
    }));

    tracing::info!(tag = %app.store.tag(), tasks = app.view.index().len(), "dashboard started");
    let result = run_event_loop(&mut terminal, &mut app, watcher.as_ref());

    app.orchestrator.shutdown();
    save_ui_state(&app);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn run_event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    watcher: Option<&TaskWatcher>,
) -> Result<(), Box<dyn std::error::Error>> {
    loop {
        terminal.draw(|frame| render::render(frame, app))?;

        let mut commands = Vec::new();
        if event::poll(app.input_timeout(Instant::now()))?
            && let Event::Key(key) = event::read()?
            && key.kind == KeyEventKind::Press
        {
            commands.extend(input::handle_key(app, key));
        }

        let now = Instant::now();
        for msg in app.orchestrator.poll() {
            commands.extend(app.handle_workflow_message(msg, now));
        }
        commands.extend(app.tick(now, Utc::now()));

        if let Some(watcher) = watcher
            && watcher.poll().is_some()
        {
            tracing::debug!("task file changed on disk");
            app.reload();
        }

        app.apply(commands);

        if app.should_quit {
            break;
        }
    }
    Ok(())
}
