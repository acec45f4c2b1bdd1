use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

/// Longest undo window accepted (one day)
pub const MAX_UNDO_SECONDS: u64 = 86_400;

/// Configuration from `.taskdeck/config.toml`. Every section is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeckConfig {
    #[serde(default)]
    pub project: ProjectSection,
    #[serde(default)]
    pub ui: UiConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub expand: ExpandConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectSection {
    /// Active tag inside tasks.json
    #[serde(default = "default_tag")]
    pub tag: String,
}

impl Default for ProjectSection {
    fn default() -> Self {
        ProjectSection { tag: default_tag() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiConfig {
    /// "tree" or "flat"
    #[serde(default = "default_view_mode")]
    pub view_mode: String,
    /// Lifetime of an undo token, in seconds
    #[serde(
        default = "default_undo_seconds",
        deserialize_with = "capped_undo_seconds"
    )]
    pub undo_seconds: u64,
    /// Minimum time a progress dialog stays up after a successful run
    #[serde(default = "default_min_progress_ms")]
    pub min_progress_ms: u64,
    /// Hex color overrides keyed by theme slot (e.g. `highlight = "#FB4196"`)
    #[serde(default)]
    pub colors: HashMap<String, String>,
}

impl Default for UiConfig {
    fn default() -> Self {
        UiConfig {
            view_mode: default_view_mode(),
            undo_seconds: default_undo_seconds(),
            min_progress_ms: default_min_progress_ms(),
            colors: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Scores at or above this recommend expansion
    #[serde(default = "default_threshold")]
    pub threshold: u32,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        AnalysisConfig {
            threshold: default_threshold(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpandConfig {
    #[serde(default = "default_subtasks")]
    pub default_subtasks: usize,
}

impl Default for ExpandConfig {
    fn default() -> Self {
        ExpandConfig {
            default_subtasks: default_subtasks(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            level: default_log_level(),
        }
    }
}

fn default_tag() -> String {
    "master".into()
}

fn default_view_mode() -> String {
    "tree".into()
}

fn default_undo_seconds() -> u64 {
    30
}

fn capped_undo_seconds<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let secs = u64::deserialize(deserializer)?;
    if secs > MAX_UNDO_SECONDS {
        tracing::warn!(undo_seconds = secs, max = MAX_UNDO_SECONDS, "undo window capped");
    }
    Ok(secs.min(MAX_UNDO_SECONDS))
}

fn default_min_progress_ms() -> u64 {
    1000
}

fn default_threshold() -> u32 {
    5
}

fn default_subtasks() -> usize {
    3
}

fn default_log_level() -> String {
    "info".into()
}
