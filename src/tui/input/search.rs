use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::tui::app::{App, Command, Mode};
use crate::util::unicode::pop_grapheme;

/// Incremental search: every edit re-applies the query to the view.
pub(super) fn handle_search(app: &mut App, key: KeyEvent) -> Vec<Command> {
    match (key.modifiers, key.code) {
        (_, KeyCode::Esc) => {
            let previous = app.search_before.take();
            app.view.set_search(previous);
            app.search_input.clear();
            app.mode = Mode::Navigate;
            Vec::new()
        }
        (_, KeyCode::Enter) => {
            app.search_before = None;
            app.search_input.clear();
            app.mode = Mode::Navigate;
            if app.view.options().search.is_some() && app.view.first_match().is_none() {
                app.status_message = Some("no matches".into());
            }
            vec![Command::SaveState]
        }
        (_, KeyCode::Backspace) => {
            pop_grapheme(&mut app.search_input);
            apply_query(app);
            Vec::new()
        }
        (m, KeyCode::Char(c)) if !m.contains(KeyModifiers::CONTROL) => {
            app.search_input.push(c);
            apply_query(app);
            Vec::new()
        }
        _ => Vec::new(),
    }
}

fn apply_query(app: &mut App) {
    let query = (!app.search_input.is_empty()).then(|| app.search_input.clone());
    app.view.set_search(query);
}
