use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::io::atomic_write;

const STATE_FILE: &str = "state.json";

/// Persisted dashboard state (written to .taskdeck/state.json)
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct UiState {
    /// "tree" or "flat"
    #[serde(default)]
    pub view_mode: Option<String>,
    #[serde(default)]
    pub expanded: BTreeSet<String>,
    #[serde(default)]
    pub selected_id: Option<String>,
    #[serde(default)]
    pub status_filter: Option<String>,
    #[serde(default)]
    pub sort: Option<String>,
    #[serde(default)]
    pub last_search: Option<String>,
}

/// Read state.json. Missing or malformed files yield `None`.
pub fn read_ui_state(deck_dir: &Path) -> Option<UiState> {
    let path = deck_dir.join(STATE_FILE);
    let content = fs::read_to_string(&path).ok()?;
    match serde_json::from_str(&content) {
        Ok(state) => Some(state),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring malformed UI state");
            None
        }
    }
}

pub fn write_ui_state(deck_dir: &Path, state: &UiState) -> Result<(), std::io::Error> {
    let path = deck_dir.join(STATE_FILE);
    let content = serde_json::to_string_pretty(state)?;
    atomic_write(&path, content.as_bytes())
}
