mod dialog;
mod navigate;
mod search;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use super::app::{App, Command, Mode};

use dialog::handle_dialog;
use navigate::handle_navigate;
use search::handle_search;

/// Handle a key event. Only the top dialog receives input while any dialog
/// is open.
pub fn handle_key(app: &mut App, key: KeyEvent) -> Vec<Command> {
    // Ignore bare modifier key presses (Shift, Ctrl, Alt, etc.)
    if matches!(key.code, KeyCode::Modifier(_)) {
        return Vec::new();
    }
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        app.quit();
        return Vec::new();
    }

    let key = normalize_key(key);
    if !app.dialogs.is_empty() {
        return handle_dialog(app, key);
    }
    if app.show_help {
        if matches!(key.code, KeyCode::Char('?') | KeyCode::Esc | KeyCode::Char('q')) {
            app.show_help = false;
        }
        return Vec::new();
    }
    match app.mode {
        Mode::Navigate => handle_navigate(app, key),
        Mode::Search => handle_search(app, key),
    }
}

/// Kitty-protocol terminals send `Char(lowercase) + SHIFT` and unshifted
/// symbols; fold them into what a traditional terminal would send.
fn normalize_key(mut key: KeyEvent) -> KeyEvent {
    if let KeyCode::Char(c) = key.code
        && key.modifiers.contains(KeyModifiers::SHIFT)
    {
        if c.is_ascii_lowercase() {
            key.code = KeyCode::Char(c.to_ascii_uppercase());
        } else if let Some(shifted) = shift_symbol(c) {
            key.code = KeyCode::Char(shifted);
            key.modifiers.remove(KeyModifiers::SHIFT);
        }
    }
    key
}

fn shift_symbol(c: char) -> Option<char> {
    match c {
        ';' => Some(':'),
        '/' => Some('?'),
        _ => None,
    }
}
