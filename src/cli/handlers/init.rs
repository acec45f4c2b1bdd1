use std::path::Path;

use crate::error::AppError;
use crate::io::project_io::{self, DECK_DIR};

/// Create `.taskdeck/` under `root`. Safe to re-run: existing files are kept.
pub fn cmd_init(root: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let created = project_io::init_project(root).map_err(|e| AppError::from(&e))?;
    if created.is_empty() {
        println!("{} already initialized in {}", DECK_DIR, root.display());
        return Ok(());
    }
    println!("initialized {} in {}", DECK_DIR, root.display());
    for path in created {
        let shown = path.strip_prefix(root).unwrap_or(&path);
        println!("  created {}", shown.display());
    }
    Ok(())
}
