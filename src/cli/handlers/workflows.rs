use std::io::{IsTerminal, Write};
use std::path::PathBuf;

use tokio::runtime::Runtime;

use crate::cli::commands::{AnalyzeArgs, DeleteArgs, ExpandArgs, UndoArgs};
use crate::cli::output::*;
use crate::error::AppError;
use crate::ops::complexity::{AnalysisScope, AnalyzeParams};
use crate::ops::delete::{DeleteOptions, DeleteParams};
use crate::ops::expand::ExpandParams;
use crate::ops::import::ImportParams;
use crate::workflow::jobs::{self, Job};
use crate::workflow::{Orchestrator, WorkflowEvent, WorkflowKind, WorkflowOutput, WorkflowScope};

use super::Context;

type CmdResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Start `job` and block until it finishes. Progress lines are rewritten in
/// place when stderr is a terminal.
fn run_workflow<J: Job>(
    runtime: &Runtime,
    kind: WorkflowKind,
    scope: WorkflowScope,
    job: J,
) -> CmdResult<WorkflowOutput> {
    let mut orchestrator = Orchestrator::new(runtime.handle().clone());
    orchestrator.start(kind, scope, job);
    let interactive = std::io::stderr().is_terminal();

    let result = runtime.block_on(drive(&mut orchestrator, kind, interactive));
    if interactive {
        eprint!("\r\x1b[2K");
    }
    result
}

async fn drive(
    orchestrator: &mut Orchestrator,
    kind: WorkflowKind,
    interactive: bool,
) -> CmdResult<WorkflowOutput> {
    while let Some(msg) = orchestrator.next(kind).await {
        match msg.event {
            WorkflowEvent::Progress(p) => {
                let line = if p.total > 0 {
                    format!("[{} {}/{}] {}", p.stage, p.current, p.total, p.message)
                } else {
                    format!("[{}] {}", p.stage, p.message)
                };
                if interactive {
                    eprint!("\r\x1b[2K{}", line);
                    let _ = std::io::stderr().flush();
                } else {
                    eprintln!("{}", line);
                }
            }
            WorkflowEvent::Completed(output) => return Ok(output),
            WorkflowEvent::Failed(err) => {
                return match AppError::from_service(&kind.failure_title(), &err) {
                    Some(app_err) => Err(Box::new(app_err)),
                    None => Err("operation cancelled".into()),
                };
            }
            WorkflowEvent::Cancelled => return Err("operation cancelled".into()),
            WorkflowEvent::StreamClosed => break,
        }
    }
    Err(format!("{} ended without a result", kind.label()).into())
}

fn print_lines(lines: Vec<String>) {
    for line in lines {
        println!("{}", line);
    }
}

pub(super) fn cmd_analyze(
    ctx: &Context,
    runtime: &Runtime,
    args: AnalyzeArgs,
    json: bool,
) -> CmdResult<()> {
    let (scope, label) = if !args.ids.is_empty() {
        (AnalysisScope::Ids(args.ids.clone()), WorkflowScope::Selected(args.ids))
    } else if args.pending {
        (AnalysisScope::Pending, WorkflowScope::PendingTasks)
    } else {
        (AnalysisScope::All, WorkflowScope::AllTasks)
    };
    let params = AnalyzeParams {
        scope,
        threshold: args.threshold.unwrap_or(ctx.config.analysis.threshold),
    };
    let job = jobs::analyze(ctx.store.clone(), params);
    let WorkflowOutput::Complexity(report) = run_workflow(runtime, WorkflowKind::Complexity, label, job)? else {
        return Err("unexpected workflow output".into());
    };
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_lines(format_report(&report));
    }
    Ok(())
}

pub(super) fn cmd_import(
    ctx: &Context,
    runtime: &Runtime,
    path: PathBuf,
    append: bool,
    json: bool,
) -> CmdResult<()> {
    let params = ImportParams {
        path: path.clone(),
        append,
    };
    let job = jobs::import(ctx.store.clone(), params);
    let WorkflowOutput::Import(summary) =
        run_workflow(runtime, WorkflowKind::Import, WorkflowScope::Document(path), job)?
    else {
        return Err("unexpected workflow output".into());
    };
    if json {
        println!("{}", serde_json::to_string_pretty(&ImportJson::from(&summary))?);
    } else {
        print_lines(format_import(&summary));
    }
    Ok(())
}

pub(super) fn cmd_expand(
    ctx: &Context,
    runtime: &Runtime,
    args: ExpandArgs,
    json: bool,
) -> CmdResult<()> {
    let params = ExpandParams {
        id: args.id.clone(),
        num: args.num.unwrap_or(ctx.config.expand.default_subtasks),
        force: args.force,
    };
    let job = jobs::expand(ctx.store.clone(), params);
    let scope = WorkflowScope::Selected(vec![args.id]);
    let WorkflowOutput::Expand(summary) = run_workflow(runtime, WorkflowKind::Expand, scope, job)?
    else {
        return Err("unexpected workflow output".into());
    };
    if json {
        println!("{}", serde_json::to_string_pretty(&ExpandJson::from(&summary))?);
    } else {
        print_lines(format_expand(&summary));
    }
    Ok(())
}

pub(super) fn cmd_delete(
    ctx: &Context,
    runtime: &Runtime,
    args: DeleteArgs,
    json: bool,
) -> CmdResult<()> {
    let params = DeleteParams {
        ids: args.ids.clone(),
        options: DeleteOptions {
            recursive: args.recursive,
            force: args.force,
        },
        undo_seconds: ctx.config.ui.undo_seconds,
    };
    let job = jobs::delete(ctx.store.clone(), params);
    let scope = WorkflowScope::Selected(args.ids);
    let WorkflowOutput::Delete(summary) = run_workflow(runtime, WorkflowKind::Delete, scope, job)?
    else {
        return Err("unexpected workflow output".into());
    };
    if json {
        println!("{}", serde_json::to_string_pretty(&DeleteJson::from(&summary))?);
    } else {
        print_lines(format_delete(&summary));
    }
    Ok(())
}

pub(super) fn cmd_undo(
    ctx: &Context,
    runtime: &Runtime,
    args: UndoArgs,
    json: bool,
) -> CmdResult<()> {
    let job = jobs::undo(ctx.store.clone(), args.token.clone());
    let scope = WorkflowScope::Token(args.token);
    let WorkflowOutput::Undo { restored } = run_workflow(runtime, WorkflowKind::Undo, scope, job)?
    else {
        return Err("unexpected workflow output".into());
    };
    if json {
        println!("{}", serde_json::json!({ "restored": restored }));
    } else {
        println!("restored {}", crate::util::plural(restored, "task"));
    }
    Ok(())
}
