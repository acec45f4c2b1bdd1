use clap::Parser;
use taskdeck::cli::commands::Cli;
use taskdeck::cli::handlers;
use taskdeck::error::AppError;

fn main() {
    let cli = Cli::parse();

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("error: cannot start runtime: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = handlers::dispatch(cli, &runtime) {
        eprintln!("error: {}", e);
        if let Some(app_err) = e.downcast_ref::<AppError>() {
            for hint in &app_err.hints {
                eprintln!("  hint: {}", hint);
            }
        }
        std::process::exit(1);
    }
}
