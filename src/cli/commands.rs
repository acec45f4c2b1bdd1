use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "td", about = concat!("taskdeck v", env!("CARGO_PKG_VERSION"), " - a terminal task dashboard"), version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Run against a different project directory
    #[arg(short = 'C', long = "project-dir", global = true)]
    pub project_dir: Option<String>,

    /// Use a different task tag than the configured one
    #[arg(long, global = true)]
    pub tag: Option<String>,

    /// Log at debug level
    #[arg(long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create .taskdeck/ in the current directory
    Init,
    /// List tasks
    List(ListArgs),
    /// Show task details
    Show(ShowArgs),
    /// Score task complexity
    Analyze(AnalyzeArgs),
    /// Import tasks from a document
    Import(ImportArgs),
    /// Break a task into subtasks
    Expand(ExpandArgs),
    /// Delete tasks
    Delete(DeleteArgs),
    /// Reverse a delete while its undo token is live
    Undo(UndoArgs),
}

#[derive(Args)]
pub struct ListArgs {
    /// Filter by status (pending, in-progress, done, blocked, deferred, cancelled)
    #[arg(long)]
    pub status: Option<String>,
    /// One line per task, without indentation
    #[arg(long)]
    pub flat: bool,
}

#[derive(Args)]
pub struct ShowArgs {
    /// Task ID to show
    pub id: String,
}

#[derive(Args)]
pub struct AnalyzeArgs {
    /// Scores at or above this recommend expansion (default from config)
    #[arg(long)]
    pub threshold: Option<u32>,
    /// Only analyze these tasks (default: every top-level task)
    pub ids: Vec<String>,
    /// Only analyze pending tasks
    #[arg(long, conflicts_with = "ids")]
    pub pending: bool,
}

#[derive(Args)]
pub struct ImportArgs {
    /// Document to import (markdown headings and bullets)
    pub file: String,
    /// Append to existing tasks instead of replacing them
    #[arg(long)]
    pub append: bool,
}

#[derive(Args)]
pub struct ExpandArgs {
    /// Task ID to expand
    pub id: String,
    /// Number of subtasks to generate (default from config)
    #[arg(long)]
    pub num: Option<usize>,
    /// Replace existing subtasks
    #[arg(long)]
    pub force: bool,
}

#[derive(Args)]
pub struct DeleteArgs {
    /// Task IDs to delete
    #[arg(required = true)]
    pub ids: Vec<String>,
    /// Also delete subtasks
    #[arg(long)]
    pub recursive: bool,
    /// Delete even if other tasks depend on these, stripping the references
    #[arg(long)]
    pub force: bool,
}

#[derive(Args)]
pub struct UndoArgs {
    /// Undo token printed by `delete`
    pub token: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_parse_after_subcommand() {
        let cli = Cli::parse_from(["td", "delete", "3", "4", "--recursive", "-C", "/tmp/p", "--tag", "beta"]);
        assert_eq!(cli.project_dir.as_deref(), Some("/tmp/p"));
        assert_eq!(cli.tag.as_deref(), Some("beta"));
        match cli.command {
            Some(Commands::Delete(args)) => {
                assert_eq!(args.ids, vec!["3", "4"]);
                assert!(args.recursive);
                assert!(!args.force);
            }
            _ => panic!("expected delete"),
        }
    }

    #[test]
    fn no_subcommand_means_dashboard() {
        let cli = Cli::parse_from(["td", "--verbose"]);
        assert!(cli.command.is_none());
        assert!(cli.verbose);
    }
}
