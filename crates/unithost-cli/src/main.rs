use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod testing;

/// Run the unit tests exported by a compiled test module.
///
/// Loads a shared library built against the test macro layer, discovers its
/// test methods from the export table, runs them one at a time in name order
/// and optionally writes a TRX results file.
///
/// EXAMPLES:
///     unithost ./libsuite.so                    Run every test
///     unithost ./libsuite.so Parser             Only tests whose name contains 'Parser'
///     unithost ./libsuite.so --trx out.trx      Also write a TRX report
///     unithost ./libsuite.so --json             Machine-readable summary
///
/// ENVIRONMENT VARIABLES:
///     UNITHOST_TRX       Default TRX output path
///     UNITHOST_JSON      Set to '1' for JSON output by default
///     UNITHOST_LOG       Log filter (e.g. 'debug'), defaults to 'warn'
///     NO_COLOR           Set to disable colored output
#[derive(Parser, Debug)]
#[command(name = "unithost")]
#[command(version)]
struct Cli {
    /// Path to the test module (.so / .dylib / .dll)
    module: PathBuf,

    /// Only run tests whose qualified name contains this text (case sensitive)
    filter: Option<String>,

    /// Write a TRX report to this path
    #[arg(long, value_name = "PATH")]
    trx: Option<PathBuf>,

    /// Announce each test before it runs and show per-test durations
    #[arg(long, short = 'v')]
    verbose: bool,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Print a JSON summary instead of the human-readable one
    #[arg(long)]
    json: bool,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "info" } else { "warn" };
    let filter =
        EnvFilter::try_from_env("UNITHOST_LOG").unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let cli_config = config::Config::from_env();

    init_logging(cli.verbose);

    // Command-line flags override environment variables
    let args = commands::run::RunArgs {
        module: cli.module,
        filter: cli.filter,
        trx: cli.trx.or(cli_config.default_trx),
        verbose: cli.verbose,
        no_color: cli.no_color || cli_config.no_color,
        json: cli.json || cli_config.default_json,
    };

    commands::run::run(args)
}
