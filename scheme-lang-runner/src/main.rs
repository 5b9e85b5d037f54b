mod repl;
mod runner;

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use scheme_lang_interpreter::evaluator;

/// Evaluation steps are logged by the evaluator at `info` once tracing is on.
const DEFAULT_LOG_FILTER: &str = "warn,scheme_lang_interpreter::evaluator=info";

#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// Script to run. Starts the REPL when omitted.
    path: Option<PathBuf>,
    /// Files evaluated before the script or the REPL.
    #[arg(short, long)]
    load: Vec<PathBuf>,
    /// Log every evaluation and application step.
    #[arg(long)]
    trace: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with_writer(std::io::stderr)
        .init();

    match scheme_lang_interpreter::run_with_large_stack(move || run(cli)) {
        Ok(code) => code,
        Err(error) => {
            eprintln!("Error: could not start the evaluator thread: {}", error);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> ExitCode {
    if cli.trace {
        evaluator::set_tracing(true);
    }

    let environment = scheme_lang_interpreter::global_environment();
    for path in &cli.load {
        tracing::info!(path = %path.display(), "preloading");
        if let Err(error) = runner::execute_file(path, &environment) {
            eprintln!("{}: {}", path.display(), error);
            return ExitCode::FAILURE;
        }
    }

    match cli.path {
        None => match repl::start(environment) {
            Ok(()) => ExitCode::SUCCESS,
            Err(error) => {
                eprintln!("Error: {}", error);
                ExitCode::FAILURE
            }
        },
        Some(path) => match runner::execute_file(&path, &environment) {
            Ok(()) => ExitCode::SUCCESS,
            Err(error) => {
                eprintln!("{}: {}", path.display(), error);
                ExitCode::FAILURE
            }
        },
    }
}
