//! Command-line interface argument parsing and definitions
//!
//! This module defines the CLI structure using clap's derive API.

use clap::{Parser, Subcommand, ValueEnum};
use is_terminal::IsTerminal;
use std::path::PathBuf;

/// Waypoint CLI - send authenticated requests to the Waypoint API
///
/// Requests go through the same client the app uses: tokens are attached and
/// refreshed, server errors are retried, and failures are printed in their
/// normalized form.
#[derive(Parser, Debug)]
#[command(
    name = "waypoint",
    version,
    author,
    about,
    long_about = None,
    propagate_version = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Enable verbose output (can be used multiple times for increased verbosity)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all non-essential output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Path to configuration file
    #[arg(short, long, global = true, env = "WAYPOINT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output format for results
    #[arg(short, long, value_enum, global = true, default_value = "human")]
    pub output: OutputFormat,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// The subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Send one request through the authenticated client
    Request(RequestArgs),

    /// Manage configuration files and settings
    Config(ConfigArgs),

    /// Generate shell completions for the specified shell
    Completions(CompletionsArgs),
}

/// Arguments for the request command
#[derive(Parser, Debug)]
pub struct RequestArgs {
    /// HTTP method (GET, POST, PUT, PATCH, DELETE)
    #[arg(value_name = "METHOD")]
    pub method: String,

    /// Path relative to the API base URL, e.g. /trips/t_1
    #[arg(value_name = "PATH")]
    pub path: String,

    /// JSON request body, or @file to read it from a file
    #[arg(short, long, value_name = "JSON")]
    pub data: Option<String>,

    /// Extra header as NAME:VALUE (repeatable)
    #[arg(short = 'H', long = "header", value_name = "NAME:VALUE")]
    pub headers: Vec<String>,

    /// Query parameter as KEY=VALUE (repeatable)
    #[arg(long = "query", value_name = "KEY=VALUE")]
    pub query: Vec<String>,

    /// Access token to send
    #[arg(long, env = "WAYPOINT_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Refresh token used when the access token is missing or expiring
    #[arg(long, env = "WAYPOINT_REFRESH_TOKEN", hide_env_values = true)]
    pub refresh_token: Option<String>,

    /// Send without credentials
    #[arg(long, conflicts_with_all = ["token", "refresh_token"])]
    pub no_auth: bool,

    /// Base URL override
    #[arg(long, value_name = "URL")]
    pub base_url: Option<String>,

    /// Timeout in seconds for this request
    #[arg(long, value_name = "SECONDS")]
    pub timeout: Option<u64>,

    /// Maximum retries for server errors
    #[arg(long)]
    pub max_retries: Option<u32>,

    /// Also print status and rate-limit information
    #[arg(short, long)]
    pub include: bool,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Configuration management actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Write a configuration file with default values
    Init(ConfigInitArgs),

    /// Show the effective configuration
    Show(ConfigShowArgs),
}

/// Arguments for config init
#[derive(Parser, Debug)]
pub struct ConfigInitArgs {
    /// Where to write the file (defaults to the user config directory)
    #[arg(value_name = "PATH")]
    pub path: Option<PathBuf>,

    /// Overwrite an existing file
    #[arg(long)]
    pub force: bool,
}

/// Arguments for config show
#[derive(Parser, Debug)]
pub struct ConfigShowArgs {
    /// Show configuration in specified format
    #[arg(short, long, value_enum, default_value = "yaml")]
    pub format: ConfigFormat,
}

/// Configuration file formats
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum ConfigFormat {
    /// JSON format
    Json,
    /// YAML format
    Yaml,
}

/// Arguments for generating shell completions
#[derive(Parser, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

/// Output format options
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable formatted output
    Human,
    /// JSON output
    Json,
    /// Pretty-printed JSON output
    JsonPretty,
}

/// Supported shells for completion generation
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

impl Cli {
    /// Parse command-line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Get the effective verbosity level (considering quiet flag)
    pub fn verbosity_level(&self) -> u8 {
        if self.quiet {
            0
        } else {
            self.verbose
        }
    }

    /// Check if colored output should be used
    pub fn use_color(&self) -> bool {
        !self.no_color && std::io::stdout().is_terminal()
    }
}

impl Shell {
    /// Convert to clap_complete shell type
    pub fn to_clap_shell(self) -> clap_complete::Shell {
        match self {
            Shell::Bash => clap_complete::Shell::Bash,
            Shell::Zsh => clap_complete::Shell::Zsh,
            Shell::Fish => clap_complete::Shell::Fish,
            Shell::PowerShell => clap_complete::Shell::PowerShell,
            Shell::Elvish => clap_complete::Shell::Elvish,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_request_parsing() {
        let cli = Cli::parse_from([
            "waypoint",
            "-vv",
            "request",
            "post",
            "/trips",
            "--data",
            r#"{"name":"Lisbon"}"#,
            "-H",
            "X-Request-Source:cli",
            "--query",
            "page=2",
            "--timeout",
            "5",
        ]);
        assert_eq!(cli.verbosity_level(), 2);

        let Commands::Request(args) = cli.command else {
            panic!("expected request command");
        };
        assert_eq!(args.method, "post");
        assert_eq!(args.path, "/trips");
        assert_eq!(args.data.as_deref(), Some(r#"{"name":"Lisbon"}"#));
        assert_eq!(args.headers, vec!["X-Request-Source:cli"]);
        assert_eq!(args.query, vec!["page=2"]);
        assert_eq!(args.timeout, Some(5));
        assert!(!args.no_auth);
    }

    #[test]
    fn test_no_auth_conflicts_with_token() {
        let result = Cli::try_parse_from([
            "waypoint", "request", "GET", "/me", "--no-auth", "--token", "abc",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_verbosity_level() {
        let cli = Cli::parse_from(["waypoint", "-vv", "config", "show"]);
        assert_eq!(cli.verbosity_level(), 2);

        let quiet = Cli { quiet: true, ..cli };
        assert_eq!(quiet.verbosity_level(), 0);
    }

    #[test]
    fn test_output_format_parsing() {
        let cli = Cli::parse_from(["waypoint", "--output", "json-pretty", "config", "show"]);
        assert_eq!(cli.output, OutputFormat::JsonPretty);
    }
}
