//! Output formatting and writing utilities
//!
//! Writes responses, normalized errors and status messages in the selected
//! format (human-readable, JSON or pretty JSON).

use crate::cli::OutputFormat;
use crate::error::Result;
use crate::logging::redaction;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use is_terminal::IsTerminal;
use serde::Serialize;
use serde_json::{json, Value};
use std::io::{self, Write};
use std::time::Duration;
use waypoint_client::http::RateLimitInfo;
use waypoint_client::{ApiError, ApiResponse};

/// Output writer that handles different output formats and colors
pub struct OutputWriter {
    format: OutputFormat,
    use_color: bool,
    show_progress: bool,
    quiet: bool,
    redact: bool,
    writer: Box<dyn Write>,
}

impl OutputWriter {
    /// Create a new output writer
    pub fn new(format: OutputFormat, use_color: bool, quiet: bool, redact: bool) -> Self {
        Self {
            format,
            use_color,
            show_progress: !quiet && format == OutputFormat::Human && io::stderr().is_terminal(),
            quiet,
            redact,
            writer: Box::new(io::stdout()),
        }
    }

    /// Create an output writer with a custom writer
    pub fn with_writer(
        format: OutputFormat,
        use_color: bool,
        quiet: bool,
        redact: bool,
        writer: Box<dyn Write>,
    ) -> Self {
        Self {
            format,
            use_color,
            show_progress: false,
            quiet,
            redact,
            writer,
        }
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Write a line of output
    pub fn writeln(&mut self, content: &str) -> Result<()> {
        writeln!(self.writer, "{}", content)?;
        self.writer.flush()?;
        Ok(())
    }

    /// Write an info message
    pub fn info(&mut self, message: &str) -> Result<()> {
        if self.quiet || self.format != OutputFormat::Human {
            return Ok(());
        }

        if self.use_color {
            self.writeln(&format!("{} {}", "ℹ".blue(), message))
        } else {
            self.writeln(&format!("INFO: {}", message))
        }
    }

    /// Write a success message
    pub fn success(&mut self, message: &str) -> Result<()> {
        if self.quiet || self.format != OutputFormat::Human {
            return Ok(());
        }

        if self.use_color {
            self.writeln(&message.green().to_string())
        } else {
            self.writeln(message)
        }
    }

    /// Write a warning message
    pub fn warning(&mut self, message: &str) -> Result<()> {
        if self.format != OutputFormat::Human {
            return Ok(());
        }

        if self.use_color {
            self.writeln(&message.yellow().to_string())
        } else {
            self.writeln(&format!("WARNING: {}", message))
        }
    }

    /// Write data in the configured format
    pub fn data<T: Serialize>(&mut self, value: &T) -> Result<()> {
        let mut value = serde_json::to_value(value)?;
        if self.redact {
            redaction::redact_json_value(&mut value);
        }

        let formatted = match self.format {
            OutputFormat::Json => serde_json::to_string(&value)?,
            OutputFormat::JsonPretty | OutputFormat::Human => serde_json::to_string_pretty(&value)?,
        };
        self.writeln(&formatted)
    }

    /// Write a successful response
    ///
    /// With `include`, the status and rate-limit state are written too.
    pub fn response(&mut self, response: &ApiResponse<Value>, include: bool) -> Result<()> {
        match self.format {
            OutputFormat::Human => {
                if include {
                    let status = format!("HTTP {}", response.status);
                    let status = if self.use_color {
                        status.green().bold().to_string()
                    } else {
                        status
                    };
                    self.writeln(&status)?;
                    if let Some(rate_limit) = &response.rate_limit {
                        self.writeln(&format_rate_limit(rate_limit))?;
                    }
                    self.writeln("")?;
                }
                if response.data.is_null() {
                    Ok(())
                } else {
                    self.data(&response.data)
                }
            }
            _ if include => self.data(response),
            _ => self.data(&response.data),
        }
    }

    /// Write a normalized error for machine formats
    ///
    /// Human output leaves errors to stderr.
    pub fn api_error(&mut self, error: &ApiError) -> Result<()> {
        if self.format == OutputFormat::Human {
            return Ok(());
        }
        self.data(&json!({ "error": error }))
    }

    /// Create a spinner for indeterminate progress
    pub fn spinner(&self, message: &str) -> Option<ProgressBar> {
        if !self.show_progress {
            return None;
        }

        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
            pb.set_style(style);
        }
        pb.set_message(message.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));
        Some(pb)
    }
}

fn format_rate_limit(info: &RateLimitInfo) -> String {
    let mut parts = Vec::new();
    match (info.remaining, info.limit) {
        (Some(remaining), Some(limit)) => parts.push(format!("{}/{} remaining", remaining, limit)),
        (Some(remaining), None) => parts.push(format!("{} remaining", remaining)),
        (None, Some(limit)) => parts.push(format!("limit {}", limit)),
        (None, None) => {}
    }
    if let Some(reset) = info.reset {
        parts.push(format!("resets {}", reset));
    }
    if let Some(retry_after) = info.retry_after {
        parts.push(format!("retry after {}s", retry_after));
    }
    format!("Rate limit: {}", parts.join(", "))
}

#[cfg(test)]
mod tests;
