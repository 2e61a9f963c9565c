use clap::Parser;
use sortwatch::cli::{Cli, run_cli};
use sortwatch::output::OutputFormatter;
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run_cli(cli) {
        OutputFormatter::error(&format!("Error: {:#}", e));
        std::process::exit(1);
    }
}

/// Logs go to stderr so they never mix with `--json` output on stdout.
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "sortwatch=debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
