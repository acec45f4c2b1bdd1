use std::fs;
use std::path::{Path, PathBuf};

use crate::model::config::DeckConfig;

/// Name of the per-project directory holding tasks, config, state, and logs
pub const DECK_DIR: &str = ".taskdeck";

/// Error type for project discovery and config loading
#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    #[error("not a taskdeck project: no .taskdeck/ directory found")]
    NotAProject,
    #[error("could not parse {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Resolved project locations
#[derive(Debug, Clone)]
pub struct ProjectPaths {
    pub root: PathBuf,
    pub deck_dir: PathBuf,
}

impl ProjectPaths {
    pub fn new(root: &Path) -> Self {
        ProjectPaths {
            root: root.to_path_buf(),
            deck_dir: root.join(DECK_DIR),
        }
    }

    pub fn config_path(&self) -> PathBuf {
        self.deck_dir.join("config.toml")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.deck_dir.join("logs")
    }
}

/// Discover the project by walking up from the given directory,
/// looking for a `.taskdeck/` subdirectory.
pub fn discover_project(start: &Path) -> Result<ProjectPaths, ProjectError> {
    let mut current = start.to_path_buf();
    loop {
        if current.join(DECK_DIR).is_dir() {
            return Ok(ProjectPaths::new(&current));
        }
        if !current.pop() {
            return Err(ProjectError::NotAProject);
        }
    }
}

/// Read `config.toml`. A missing file yields the defaults.
pub fn read_config(paths: &ProjectPaths) -> Result<DeckConfig, ProjectError> {
    let path = paths.config_path();
    let text = match fs::read_to_string(&path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(DeckConfig::default()),
        Err(e) => return Err(ProjectError::Io(e)),
    };
    toml::from_str(&text).map_err(|source| ProjectError::ConfigParse { path, source })
}

const CONFIG_TEMPLATE: &str = r#"[project]
tag = "master"

[ui]
view_mode = "tree"
undo_seconds = 30
min_progress_ms = 1000

[analysis]
threshold = 5

[expand]
default_subtasks = 3

[log]
level = "info"
"#;

/// Create `.taskdeck/` with a default config and an empty task file.
/// Existing files are left untouched. Returns the paths of files created.
pub fn init_project(root: &Path) -> Result<Vec<PathBuf>, ProjectError> {
    let paths = ProjectPaths::new(root);
    fs::create_dir_all(&paths.deck_dir)?;
    let mut created = Vec::new();

    let config_path = paths.config_path();
    if !config_path.exists() {
        fs::write(&config_path, CONFIG_TEMPLATE)?;
        created.push(config_path);
    }

    let tasks_path = paths.deck_dir.join("tasks.json");
    if !tasks_path.exists() {
        fs::write(&tasks_path, "{\n  \"master\": {\n    \"tasks\": []\n  }\n}\n")?;
        created.push(tasks_path);
    }

    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn discover_walks_up() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join(DECK_DIR)).unwrap();
        let nested = tmp.path().join("a/b/c");
        fs::create_dir_all(&nested).unwrap();

        let paths = discover_project(&nested).unwrap();
        assert_eq!(paths.root, tmp.path());
        assert_eq!(paths.deck_dir, tmp.path().join(DECK_DIR));
    }

    #[test]
    fn discover_fails_without_deck_dir() {
        let tmp = TempDir::new().unwrap();
        assert!(matches!(
            discover_project(tmp.path()),
            Err(ProjectError::NotAProject)
        ));
    }

    #[test]
    fn init_writes_template_that_parses() {
        let tmp = TempDir::new().unwrap();
        let created = init_project(tmp.path()).unwrap();
        assert_eq!(created.len(), 2);

        let paths = ProjectPaths::new(tmp.path());
        let config = read_config(&paths).unwrap();
        assert_eq!(config.ui.undo_seconds, 30);

        // Second run leaves everything alone
        assert!(init_project(tmp.path()).unwrap().is_empty());
    }

    #[test]
    fn invalid_config_reports_path() {
        let tmp = TempDir::new().unwrap();
        let paths = ProjectPaths::new(tmp.path());
        fs::create_dir_all(&paths.deck_dir).unwrap();
        fs::write(paths.config_path(), "[ui\nbroken").unwrap();

        match read_config(&paths) {
            Err(ProjectError::ConfigParse { path, .. }) => assert_eq!(path, paths.config_path()),
            other => panic!("expected ConfigParse, got {:?}", other),
        }
    }
}
