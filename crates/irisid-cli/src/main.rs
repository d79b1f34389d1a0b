use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use irisid_cli::cli::Cli;
use irisid_cli::commands::CommandHandler;
use irisid_cli::output::render_error;

fn main() -> ExitCode {
    let cli = Cli::parse();
    let mode = cli.output_mode();
    let verbose = cli.verbose;
    init_tracing(verbose);

    let handler: Box<dyn CommandHandler> = cli.command.into();
    match handler.execute(mode, verbose > 0) {
        Ok(code) => code,
        Err(err) => {
            render_error(&err, mode);
            err.exit_code()
        }
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let fmt_layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(env_filter);

    let registry = tracing_subscriber::registry().with(fmt_layer);
    if tracing::subscriber::set_global_default(registry).is_err() {
        // Already initialised.
    }
}
