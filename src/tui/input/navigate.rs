use crossterm::event::{KeyCode, KeyEvent};

use crate::tui::app::{App, Command, Mode};

pub(super) fn handle_navigate(app: &mut App, key: KeyEvent) -> Vec<Command> {
    // Any key clears the previous notice
    app.status_message = None;

    match key.code {
        KeyCode::Char('q') => {
            app.quit();
            Vec::new()
        }
        KeyCode::Char('?') => {
            app.show_help = true;
            Vec::new()
        }

        KeyCode::Char('j') | KeyCode::Down => {
            app.view.next();
            Vec::new()
        }
        KeyCode::Char('k') | KeyCode::Up => {
            app.view.previous();
            Vec::new()
        }
        KeyCode::Char('g') | KeyCode::Home => {
            app.view.first();
            Vec::new()
        }
        KeyCode::Char('G') | KeyCode::End => {
            app.view.last();
            Vec::new()
        }

        KeyCode::Char('h') | KeyCode::Left => {
            app.view.collapse_or_ascend();
            vec![Command::SaveState]
        }
        KeyCode::Char('l') | KeyCode::Right => {
            app.view.expand();
            vec![Command::SaveState]
        }
        KeyCode::Char(' ') | KeyCode::Enter => {
            app.view.toggle_expand();
            vec![Command::SaveState]
        }
        KeyCode::Char('E') => {
            app.view.expand_all();
            vec![Command::SaveState]
        }
        KeyCode::Char('C') => {
            app.view.collapse_all();
            vec![Command::SaveState]
        }

        KeyCode::Char('v') => {
            let mode = app.view.toggle_view_mode();
            app.status_message = Some(format!("{} view", mode.as_str()));
            vec![Command::SaveState]
        }
        KeyCode::Char('f') => {
            let filter = app.view.cycle_status_filter();
            app.status_message = Some(match filter {
                Some(status) => format!("showing {} tasks", status),
                None => "showing all tasks".into(),
            });
            vec![Command::SaveState]
        }
        KeyCode::Char('o') => {
            let sort = app.view.cycle_sort();
            app.status_message = Some(format!("sorted by {}", sort.as_str()));
            vec![Command::SaveState]
        }

        KeyCode::Char('/') => {
            app.search_before = app.view.options().search.clone();
            app.search_input = app.search_before.clone().unwrap_or_default();
            app.mode = Mode::Search;
            Vec::new()
        }
        KeyCode::Char(':') => {
            app.open_go_to();
            Vec::new()
        }
        KeyCode::Char('x') => {
            app.view.toggle_multi_select();
            Vec::new()
        }
        KeyCode::Esc => {
            app.view.clear_multi_select();
            Vec::new()
        }
        KeyCode::Char('s') => {
            app.cycle_selected_status();
            Vec::new()
        }

        KeyCode::Char('a') => {
            app.begin_analyze();
            Vec::new()
        }
        KeyCode::Char('i') => {
            app.begin_import();
            Vec::new()
        }
        KeyCode::Char('e') => {
            app.begin_expand();
            Vec::new()
        }
        KeyCode::Char('d') => {
            app.begin_delete();
            Vec::new()
        }
        KeyCode::Char('u') => app.request_undo(),

        KeyCode::Char('r') => {
            app.reload();
            app.status_message = Some("reloaded".into());
            Vec::new()
        }

        _ => Vec::new(),
    }
}
