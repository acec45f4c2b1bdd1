mod init;
mod workflows;

pub use init::cmd_init;

use std::path::{Path, PathBuf};

use tokio::runtime::Runtime;

use crate::cli::commands::*;
use crate::cli::output::*;
use crate::error::AppError;
use crate::io::project_io::{self, ProjectPaths};
use crate::io::task_store::TaskStore;
use crate::logging::{self, LogGuard};
use crate::model::DeckConfig;
use crate::view::TaskIndex;

/// Everything a project-scoped command needs
pub struct Context {
    pub paths: ProjectPaths,
    pub config: DeckConfig,
    pub store: TaskStore,
    _log: Option<LogGuard>,
}

/// Find the project, read its config, start logging, and open the store.
pub fn load_context(
    project_dir: Option<&str>,
    tag: Option<&str>,
    verbose: bool,
) -> Result<Context, Box<dyn std::error::Error>> {
    let start = match project_dir {
        Some(dir) => std::fs::canonicalize(dir)
            .map_err(|e| format!("cannot resolve -C path '{}': {}", dir, e))?,
        None => std::env::current_dir()?,
    };
    let paths = project_io::discover_project(&start).map_err(|e| AppError::from(&e))?;
    let config = project_io::read_config(&paths).map_err(|e| AppError::from(&e))?;

    // Logging is best effort; a read-only project still works
    let log = match logging::init_logging(&paths.log_dir(), &config.log.level, verbose) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("warning: logging disabled: {}", e);
            None
        }
    };

    let tag = tag.unwrap_or(config.project.tag.as_str());
    let store = TaskStore::open(&paths.deck_dir, tag);
    tracing::debug!(root = %paths.root.display(), tag, "project loaded");
    Ok(Context {
        paths,
        config,
        store,
        _log: log,
    })
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

pub fn dispatch(cli: Cli, runtime: &Runtime) -> Result<(), Box<dyn std::error::Error>> {
    let json = cli.json;
    let Some(command) = cli.command else {
        let ctx = load_context(cli.project_dir.as_deref(), cli.tag.as_deref(), cli.verbose)?;
        let mut config = ctx.config;
        config.project.tag = ctx.store.tag().to_string();
        return crate::tui::run(runtime.handle().clone(), &ctx.paths, config);
    };

    if let Commands::Init = command {
        let root = match cli.project_dir.as_deref() {
            Some(dir) => PathBuf::from(dir),
            None => std::env::current_dir()?,
        };
        return cmd_init(&root);
    }

    let ctx = load_context(cli.project_dir.as_deref(), cli.tag.as_deref(), cli.verbose)?;
    match command {
        Commands::Init => Ok(()),
        Commands::List(args) => cmd_list(&ctx, args, json),
        Commands::Show(args) => cmd_show(&ctx, args, json),
        Commands::Analyze(args) => workflows::cmd_analyze(&ctx, runtime, args, json),
        Commands::Import(args) => {
            let path = resolve_input_path(&args.file)?;
            workflows::cmd_import(&ctx, runtime, path, args.append, json)
        }
        Commands::Expand(args) => workflows::cmd_expand(&ctx, runtime, args, json),
        Commands::Delete(args) => workflows::cmd_delete(&ctx, runtime, args, json),
        Commands::Undo(args) => workflows::cmd_undo(&ctx, runtime, args, json),
    }
}

/// Relative paths are taken from the invoking directory, not the project root
fn resolve_input_path(file: &str) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let path = Path::new(file);
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

// ---------------------------------------------------------------------------
// Read commands
// ---------------------------------------------------------------------------

fn cmd_list(ctx: &Context, args: ListArgs, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let status = args.status.as_deref().map(parse_status).transpose()?;
    let tasks = ctx.store.load_tasks().map_err(|e| AppError::from(&e))?;

    if json {
        let out = TaskListJson {
            tag: ctx.store.tag(),
            tasks: &tasks,
        };
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    let lines = if args.flat {
        format_flat(&tasks, status)
    } else {
        tasks
            .iter()
            .flat_map(|t| format_task_tree(t, 0, status))
            .collect()
    };
    if lines.is_empty() {
        println!("no tasks");
    }
    for line in lines {
        println!("{}", line);
    }
    Ok(())
}

fn cmd_show(ctx: &Context, args: ShowArgs, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let index = TaskIndex::build(ctx.store.load_tasks().map_err(|e| AppError::from(&e))?);
    let task = index
        .resolve(&args.id)
        .ok_or_else(|| format!("task not found: {}", args.id))?;

    if json {
        println!("{}", serde_json::to_string_pretty(task)?);
    } else {
        for line in format_task_detail(task, index.parent(&args.id)) {
            println!("{}", line);
        }
    }
    Ok(())
}
