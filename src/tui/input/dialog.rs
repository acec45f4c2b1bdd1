use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::tui::app::{App, Command};
use crate::workflow::dialog::{Dialog, DialogOutcome};

/// Route a key to the top dialog. Dialogs below it never see input.
pub(super) fn handle_dialog(app: &mut App, key: KeyEvent) -> Vec<Command> {
    let Some(top) = app.dialogs.top_mut() else {
        return Vec::new();
    };

    match top {
        Dialog::Choice(choice) => match key.code {
            KeyCode::Char('j') | KeyCode::Down | KeyCode::Tab => {
                choice.next();
                Vec::new()
            }
            KeyCode::Char('k') | KeyCode::Up | KeyCode::BackTab => {
                choice.previous();
                Vec::new()
            }
            KeyCode::Enter | KeyCode::Char('y') => app.resolve_dialog(DialogOutcome::Accepted),
            KeyCode::Esc | KeyCode::Char('n') | KeyCode::Char('q') => {
                app.resolve_dialog(DialogOutcome::Cancelled)
            }
            _ => Vec::new(),
        },

        Dialog::Confirm(_) | Dialog::ImpactReview(_) => match key.code {
            KeyCode::Enter | KeyCode::Char('y') => app.resolve_dialog(DialogOutcome::Accepted),
            KeyCode::Esc | KeyCode::Char('n') => app.resolve_dialog(DialogOutcome::Cancelled),
            _ => Vec::new(),
        },

        Dialog::DeleteOptions(options) => match key.code {
            KeyCode::Tab | KeyCode::BackTab | KeyCode::Char('j') | KeyCode::Char('k')
            | KeyCode::Down | KeyCode::Up => {
                options.toggle_focus();
                Vec::new()
            }
            KeyCode::Char(' ') => {
                options.toggle_focused();
                Vec::new()
            }
            KeyCode::Char('r') => {
                options.options.recursive = !options.options.recursive;
                Vec::new()
            }
            KeyCode::Char('f') => {
                options.options.force = !options.options.force;
                Vec::new()
            }
            KeyCode::Enter | KeyCode::Char('y') => app.resolve_dialog(DialogOutcome::Accepted),
            KeyCode::Esc | KeyCode::Char('n') => app.resolve_dialog(DialogOutcome::Cancelled),
            _ => Vec::new(),
        },

        Dialog::TextInput(input) => match (key.modifiers, key.code) {
            (_, KeyCode::Enter) => app.resolve_dialog(DialogOutcome::Accepted),
            (_, KeyCode::Esc) => app.resolve_dialog(DialogOutcome::Cancelled),
            (_, KeyCode::Backspace) => {
                input.backspace();
                Vec::new()
            }
            (m, KeyCode::Char(c)) if !m.contains(KeyModifiers::CONTROL) => {
                input.push(c);
                Vec::new()
            }
            _ => Vec::new(),
        },

        Dialog::Progress(progress) => {
            if key.code == KeyCode::Esc && !progress.cancelling {
                app.cancel_top_workflow();
            }
            Vec::new()
        }

        Dialog::Result(_) | Dialog::Error(_) => match key.code {
            KeyCode::Enter | KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char(' ') => {
                app.resolve_dialog(DialogOutcome::Accepted)
            }
            _ => Vec::new(),
        },

        Dialog::Undo(_) => match key.code {
            KeyCode::Char('u') => app.request_undo(),
            KeyCode::Esc | KeyCode::Enter | KeyCode::Char('q') => {
                app.resolve_dialog(DialogOutcome::Cancelled)
            }
            _ => Vec::new(),
        },
    }
}
