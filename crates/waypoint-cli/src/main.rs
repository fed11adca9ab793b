//! Waypoint CLI - command-line access to the Waypoint API
//!
//! Sends requests through the same authenticated client the app uses and
//! prints responses or normalized errors.

mod cli;
mod config;
mod error;
mod handlers;
mod logging;
mod output;
mod session;

use cli::{Cli, Commands};
use colored::control;
use config::Config;
use error::Result;
use logging::{timing::Timer, LoggingConfig};
use output::OutputWriter;
use std::process;
use tracing::instrument;

#[tokio::main]
async fn main() {
    let cli = Cli::parse_args();

    control::set_override(cli.use_color());

    if let Err(e) = init_logging(&cli) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    match run(cli).await {
        Ok(()) => process::exit(0),
        Err(e) => {
            eprintln!("{}", error::format_error(&e, control::SHOULD_COLORIZE.should_colorize()));

            if e.should_show_help() {
                eprintln!("\nFor more information, try '--help'");
            }

            process::exit(e.exit_code());
        }
    }
}

/// Main application logic
#[instrument(skip(cli), fields(request_id = logging::current_request_id()))]
async fn run(cli: Cli) -> Result<()> {
    let _timer = Timer::new("cli_execution");

    if let Commands::Completions(args) = cli.command {
        return handlers::handle_completions(args);
    }

    let config = Config::load_with_file(cli.config.as_deref())?;
    let use_color = cli.use_color() && config.output.color;
    control::set_override(use_color);

    let mut output = OutputWriter::new(cli.output, use_color, cli.quiet, config.output.redact);

    tracing::debug!(
        command = ?cli.command,
        verbosity = cli.verbosity_level(),
        base_url = %config.api.base_url,
        "Executing command"
    );

    match cli.command {
        Commands::Request(args) => handlers::handle_request(args, &config, &mut output).await,
        Commands::Config(args) => handlers::handle_config(args, &config, &mut output).await,
        Commands::Completions(_) => Ok(()),
    }
}

/// Initialize the logging system
fn init_logging(cli: &Cli) -> Result<()> {
    let mut logging_config = LoggingConfig::from_verbosity(cli.verbosity_level());
    logging_config.merge_with_env();

    if cli.quiet {
        logging_config.level = "error".to_string();
    }
    logging_config.console = !cli.no_color;

    logging::init_logging(logging_config)
}
