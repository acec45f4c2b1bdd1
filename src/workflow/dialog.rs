use std::path::PathBuf;
use std::time::Instant;

use crate::error::AppError;
use crate::io::undo_log::UndoToken;
use crate::ops::delete::{DeleteImpact, DeleteOptions};
use crate::workflow::{Progress, WorkflowKind};

/// How a dialog was resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogOutcome {
    Accepted,
    Cancelled,
}

/// What an accepted choice feeds into
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChoicePurpose {
    /// Options: all tasks, pending tasks, then the selection if any
    AnalyzeScope { selection: Vec<String> },
    /// Options: append, replace
    ImportMode { path: PathBuf },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChoiceDialog {
    pub title: String,
    pub options: Vec<String>,
    pub selected: usize,
    pub purpose: ChoicePurpose,
}

impl ChoiceDialog {
    pub fn analyze_scope(selection: Vec<String>) -> Self {
        let mut options = vec!["All tasks".to_string(), "Pending tasks".to_string()];
        match selection.len() {
            0 => {}
            1 => options.push(format!("Task {}", selection[0])),
            n => options.push(format!("{} selected tasks", n)),
        }
        ChoiceDialog {
            title: "Analyze complexity".into(),
            options,
            selected: 0,
            purpose: ChoicePurpose::AnalyzeScope { selection },
        }
    }

    pub fn import_mode(path: PathBuf) -> Self {
        ChoiceDialog {
            title: format!("Import {}", path.display()),
            options: vec![
                "Append to existing tasks".into(),
                "Replace existing tasks".into(),
            ],
            selected: 0,
            purpose: ChoicePurpose::ImportMode { path },
        }
    }

    pub fn next(&mut self) {
        if self.selected + 1 < self.options.len() {
            self.selected += 1;
        }
    }

    pub fn previous(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmAction {
    /// First step of the delete flow
    Delete { ids: Vec<String> },
    /// Expanding a task that already has subtasks replaces them
    ReplaceSubtasks { id: String, num: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmDialog {
    pub title: String,
    pub message: String,
    pub action: ConfirmAction,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteOptionsDialog {
    pub ids: Vec<String>,
    pub options: DeleteOptions,
    /// 0 = recursive, 1 = force
    pub focus: usize,
    /// Why the previous review sent the user back here
    pub notice: Option<String>,
}

impl DeleteOptionsDialog {
    pub fn new(ids: Vec<String>) -> Self {
        DeleteOptionsDialog {
            ids,
            options: DeleteOptions::default(),
            focus: 0,
            notice: None,
        }
    }

    pub fn toggle_focus(&mut self) {
        self.focus = (self.focus + 1) % 2;
    }

    pub fn toggle_focused(&mut self) {
        match self.focus {
            0 => self.options.recursive = !self.options.recursive,
            _ => self.options.force = !self.options.force,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImpactReviewDialog {
    pub ids: Vec<String>,
    pub options: DeleteOptions,
    pub impact: DeleteImpact,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputPurpose {
    ImportPath,
    ExpandCount { id: String },
    GoToId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextInputDialog {
    pub title: String,
    pub prompt: String,
    pub value: String,
    pub purpose: InputPurpose,
}

impl TextInputDialog {
    pub fn new(title: &str, prompt: &str, initial: &str, purpose: InputPurpose) -> Self {
        TextInputDialog {
            title: title.to_string(),
            prompt: prompt.to_string(),
            value: initial.to_string(),
            purpose,
        }
    }

    pub fn push(&mut self, c: char) {
        self.value.push(c);
    }

    pub fn backspace(&mut self) {
        crate::util::unicode::pop_grapheme(&mut self.value);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProgressDialog {
    pub kind: WorkflowKind,
    pub opened_at: Instant,
    pub progress: Option<Progress>,
    pub cancelling: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultDialog {
    pub title: String,
    pub lines: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UndoDialog {
    pub token: UndoToken,
    pub remaining_secs: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Dialog {
    Choice(ChoiceDialog),
    Confirm(ConfirmDialog),
    DeleteOptions(DeleteOptionsDialog),
    ImpactReview(ImpactReviewDialog),
    TextInput(TextInputDialog),
    Progress(ProgressDialog),
    Result(ResultDialog),
    Error(AppError),
    Undo(UndoDialog),
}

impl Dialog {
    pub fn title(&self) -> String {
        match self {
            Dialog::Choice(d) => d.title.clone(),
            Dialog::Confirm(d) => d.title.clone(),
            Dialog::DeleteOptions(_) => "Delete options".into(),
            Dialog::ImpactReview(_) => "Review delete".into(),
            Dialog::TextInput(d) => d.title.clone(),
            Dialog::Progress(d) => d.kind.label().into(),
            Dialog::Result(d) => d.title.clone(),
            Dialog::Error(e) => e.title.clone(),
            Dialog::Undo(_) => "Undo".into(),
        }
    }
}

/// LIFO of modal dialogs. Only the top one receives input; resolving pops it
/// and hands back the dialog with its outcome.
#[derive(Debug, Default)]
pub struct DialogStack {
    stack: Vec<Dialog>,
}

impl DialogStack {
    pub fn push(&mut self, dialog: Dialog) {
        tracing::debug!(dialog = %dialog.title(), depth = self.stack.len() + 1, "dialog opened");
        self.stack.push(dialog);
    }

    pub fn pop(&mut self) -> Option<Dialog> {
        self.stack.pop()
    }

    pub fn top(&self) -> Option<&Dialog> {
        self.stack.last()
    }

    pub fn top_mut(&mut self) -> Option<&mut Dialog> {
        self.stack.last_mut()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    pub fn len(&self) -> usize {
        self.stack.len()
    }

    /// Bottom to top, the order dialogs are drawn in
    pub fn iter(&self) -> impl Iterator<Item = &Dialog> {
        self.stack.iter()
    }

    /// Pop the top dialog and pair it with how it was resolved.
    pub fn resolve(&mut self, outcome: DialogOutcome) -> Option<(Dialog, DialogOutcome)> {
        let dialog = self.stack.pop()?;
        tracing::debug!(dialog = %dialog.title(), ?outcome, "dialog resolved");
        Some((dialog, outcome))
    }

    pub fn progress_mut(&mut self, kind: WorkflowKind) -> Option<&mut ProgressDialog> {
        self.stack.iter_mut().rev().find_map(|d| match d {
            Dialog::Progress(p) if p.kind == kind => Some(p),
            _ => None,
        })
    }

    /// Remove the progress dialog for `kind` wherever it sits.
    pub fn close_progress(&mut self, kind: WorkflowKind) -> Option<ProgressDialog> {
        let pos = self
            .stack
            .iter()
            .rposition(|d| matches!(d, Dialog::Progress(p) if p.kind == kind))?;
        match self.stack.remove(pos) {
            Dialog::Progress(p) => Some(p),
            _ => None,
        }
    }

    pub fn undo_mut(&mut self) -> Option<&mut UndoDialog> {
        self.stack.iter_mut().rev().find_map(|d| match d {
            Dialog::Undo(u) => Some(u),
            _ => None,
        })
    }

    pub fn close_undo(&mut self) -> bool {
        let before = self.stack.len();
        self.stack.retain(|d| !matches!(d, Dialog::Undo(_)));
        before != self.stack.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(title: &str) -> Dialog {
        Dialog::Result(ResultDialog {
            title: title.into(),
            lines: vec![],
        })
    }

    #[test]
    fn stack_is_lifo() {
        let mut stack = DialogStack::default();
        stack.push(result("first"));
        stack.push(result("second"));
        assert_eq!(stack.top().map(Dialog::title).as_deref(), Some("second"));
        let (dialog, outcome) = stack.resolve(DialogOutcome::Accepted).unwrap();
        assert_eq!(dialog.title(), "second");
        assert_eq!(outcome, DialogOutcome::Accepted);
        assert_eq!(stack.top().map(Dialog::title).as_deref(), Some("first"));
        stack.pop();
        assert!(stack.resolve(DialogOutcome::Cancelled).is_none());
    }

    #[test]
    fn progress_dialog_found_below_top() {
        let mut stack = DialogStack::default();
        stack.push(Dialog::Progress(ProgressDialog {
            kind: WorkflowKind::Import,
            opened_at: Instant::now(),
            progress: None,
            cancelling: false,
        }));
        stack.push(result("other"));
        stack.progress_mut(WorkflowKind::Import).unwrap().progress =
            Some(Progress::new("parsing", 1, 2, "x"));
        assert!(stack.progress_mut(WorkflowKind::Expand).is_none());
        let closed = stack.close_progress(WorkflowKind::Import).unwrap();
        assert_eq!(closed.progress.unwrap().current, 1);
        assert_eq!(stack.len(), 1);
    }

    #[test]
    fn analyze_scope_lists_selection_last() {
        let choice = ChoiceDialog::analyze_scope(vec!["2".into(), "5".into()]);
        assert_eq!(choice.options.last().unwrap(), "2 selected tasks");
        let none = ChoiceDialog::analyze_scope(vec![]);
        assert_eq!(none.options.len(), 2);
    }

    #[test]
    fn choice_navigation_clamps() {
        let mut choice = ChoiceDialog::import_mode(PathBuf::from("plan.md"));
        choice.previous();
        assert_eq!(choice.selected, 0);
        choice.next();
        choice.next();
        assert_eq!(choice.selected, 1);
    }

    #[test]
    fn delete_options_toggle_focused_flag() {
        let mut dialog = DeleteOptionsDialog::new(vec!["1".into()]);
        dialog.toggle_focused();
        assert!(dialog.options.recursive);
        dialog.toggle_focus();
        dialog.toggle_focused();
        assert!(dialog.options.force);
        dialog.toggle_focus();
        assert_eq!(dialog.focus, 0);
    }
}
