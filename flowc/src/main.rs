//! `flowc` - a thin command-line front end over the Flow pipeline.
//!
//! `check` lexes, parses, and analyzes a program without running it.
//! `run` additionally executes it against a trigger payload and the
//! process environment, through a connector registry that always refuses
//! (no real connectors are wired up here -- see `NullConnectors` below).

mod config;
mod error;
mod trigger;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use flow_runtime::{ConnectorRegistry, Outcome, ServiceError, ServiceResult, Value};
use indexmap::IndexMap;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use config::Config;
use error::{FlowcError, Result};

#[derive(Parser, Debug)]
#[command(name = "flowc")]
#[command(author = "Flow Language Team")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Lex, parse, analyze, and run Flow workflow programs", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging.
    #[arg(short, long, global = true, env = "FLOWC_VERBOSE")]
    verbose: bool,

    /// Path to a flowc.toml configuration file.
    #[arg(short, long, global = true, env = "FLOWC_CONFIG")]
    config: Option<PathBuf>,

    /// Disable ANSI color in log output.
    #[arg(long, global = true, env = "FLOWC_NO_COLOR")]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Lex, parse, and analyze a program without running it.
    Check(CheckCommand),

    /// Lex, parse, analyze, and run a program against a trigger payload.
    Run(RunCommand),
}

#[derive(Parser, Debug)]
struct CheckCommand {
    /// Path to a .flow source file.
    file: PathBuf,
}

#[derive(Parser, Debug)]
struct RunCommand {
    /// Path to a .flow source file.
    file: PathBuf,

    /// Path to a JSON file providing the trigger payload.
    #[arg(short, long)]
    trigger: Option<PathBuf>,
}

/// A connector registry that refuses every call. Real connectors (HTTP
/// clients, AI vendor adapters) are explicitly out of scope; this is the
/// stand-in that lets `flowc run` exercise the full pipeline against
/// programs whose services are never actually reached.
struct NullConnectors;

impl ConnectorRegistry for NullConnectors {
    fn invoke(
        &self,
        service: &str,
        _verb: &str,
        _description: &str,
        _parameters: &IndexMap<String, Value>,
        _path: Option<&Value>,
    ) -> ServiceResult {
        Err(ServiceError::new(format!("no connector registered for `{service}`"), false))
    }

    fn ask_ai(&self, agent: &str, _instruction: &str, _context: &Value) -> ServiceResult {
        Err(ServiceError::new(format!("no connector registered for `{agent}`"), false))
    }

    fn has_service(&self, _service: &str) -> bool {
        false
    }
}

fn main() {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(2);
        }
    };

    if let Err(e) = init_logging(cli.verbose || config.verbose, cli.no_color) {
        eprintln!("error: {e}");
        std::process::exit(2);
    }

    let exit_code = match cli.command {
        Commands::Check(args) => run_check(args),
        Commands::Run(args) => run_run(args),
    };

    std::process::exit(exit_code);
}

fn init_logging(verbose: bool, no_color: bool) -> Result<()> {
    let filter = if verbose { EnvFilter::new("debug") } else { EnvFilter::new("info") };

    let subscriber = fmt::layer().with_ansi(!no_color).with_target(false).with_thread_ids(false).with_thread_names(false);

    tracing_subscriber::registry()
        .with(filter)
        .with(subscriber)
        .try_init()
        .map_err(|e| FlowcError::Logging(e.to_string()))
}

fn load_config(config_path: Option<&std::path::Path>) -> Result<Config> {
    match config_path {
        Some(path) => Config::load_from_path(path),
        None => Config::load(),
    }
}

/// Exit codes: 0 clean, 1 diagnostics were reported, 2 the file could not
/// be read or lexing failed outright.
fn run_check(args: CheckCommand) -> i32 {
    let diagnostics = match flow_drv::check_file(&args.file) {
        Ok(diagnostics) => diagnostics,
        Err(e) => {
            eprintln!("error: {e}");
            return 2;
        }
    };

    let file_name = args.file.display().to_string();
    let has_errors = diagnostics.iter().any(|d| d.level == flow_util::diagnostic::Level::Error);
    for diagnostic in &diagnostics {
        eprintln!("{}\n", diagnostic.render(&file_name));
    }

    if has_errors {
        1
    } else {
        println!("{file_name}: no errors");
        0
    }
}

/// Exit codes: 0 completed, 1 rejected/errored/diagnostics reported,
/// 2 the file or trigger could not be read.
fn run_run(args: RunCommand) -> i32 {
    let trigger_value = match &args.trigger {
        Some(path) => match trigger::load_trigger_file(path) {
            Ok(value) => value,
            Err(e) => {
                eprintln!("error: {e}");
                return 2;
            }
        },
        None => Value::Empty,
    };

    let mut env = IndexMap::new();
    for (key, value) in std::env::vars() {
        env.insert(key, value);
    }

    let options = flow_drv::RunOptions { env, trigger: trigger_value };

    let report = match flow_drv::run_file(&args.file, options, &NullConnectors) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("error: {e}");
            return 2;
        }
    };

    let file_name = args.file.display().to_string();
    if report.has_errors() {
        eprint!("{}", report.render_diagnostics(&file_name));
        return 1;
    }

    match report.outcome {
        Some(Outcome::Completed { outputs }) => {
            println!("completed");
            for (name, value) in outputs {
                println!("  {name}: {}", value.stringify());
            }
            0
        }
        Some(Outcome::Rejected { message }) => {
            println!("rejected: {message}");
            1
        }
        Some(Outcome::Error { message, location }) => {
            match location {
                Some((line, column)) => eprintln!("error at {line}:{column}: {message}"),
                None => eprintln!("error: {message}"),
            }
            1
        }
        None => 1,
    }
}
