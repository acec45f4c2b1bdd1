use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const LOG_FILE: &str = "taskdeck.log";

/// Flushes pending log lines when dropped. Hold it for the process lifetime.
pub struct LogGuard {
    _file_guard: WorkerGuard,
}

/// Filter directive for the given config level and verbosity flag
pub fn filter_directive(config_level: &str, verbose: bool) -> String {
    let level = if verbose { "debug" } else { config_level };
    format!("taskdeck={level},td={level}")
}

/// Send logs to a daily-rolling file under `log_dir`; the dashboard owns the
/// terminal. `RUST_LOG` wins over `verbose`, which wins over `config_level`.
pub fn init_logging(
    log_dir: &Path,
    config_level: &str,
    verbose: bool,
) -> Result<LogGuard, std::io::Error> {
    std::fs::create_dir_all(log_dir)?;

    let file_appender = tracing_appender::rolling::daily(log_dir, LOG_FILE);
    let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(config_level, verbose)));

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_ansi(false)
        .with_target(true)
        .with_file(verbose)
        .with_line_number(verbose);

    // A second init (e.g. the CLI after a failed dashboard start) keeps the
    // first subscriber.
    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .try_init();

    tracing::debug!(log_dir = %log_dir.display(), verbose, "logging initialized");

    Ok(LogGuard {
        _file_guard: file_guard,
    })
}
