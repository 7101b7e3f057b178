//! Printing of command results
//!
//! Results go to stdout, diagnostics to stderr. In JSON mode stdout carries
//! nothing but JSON documents.

use serde::Serialize;

use super::OutputConfig;

const GREEN: &str = "32";
const RED: &str = "31";
const YELLOW: &str = "33";

/// Writes command results and status lines according to [`OutputConfig`]
#[derive(Debug, Clone, Default)]
pub struct Formatter {
    config: OutputConfig,
}

/// JSON shape of a failure on stderr
#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
}

impl Formatter {
    pub fn new(config: OutputConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &OutputConfig {
        &self.config
    }

    pub fn is_json(&self) -> bool {
        self.config.json
    }

    /// ANSI colors apply only to human output with color left on
    pub fn colors_enabled(&self) -> bool {
        !(self.config.no_color || self.config.json)
    }

    /// Print a command result as JSON or through its `Display` form
    pub fn output<T: Serialize + std::fmt::Display>(&self, value: &T) {
        match (self.config.quiet, self.config.json) {
            (true, _) => {}
            (false, true) => self.json(value),
            (false, false) => println!("{value}"),
        }
    }

    pub fn success(&self, message: &str) {
        if self.is_chatty() {
            println!("{} {message}", self.mark(GREEN, '✓'));
        }
    }

    /// Report a failure on stderr; quiet mode does not silence it
    pub fn error(&self, message: &str) {
        if self.config.json {
            let body = serde_json::to_string_pretty(&ErrorBody { error: message })
                .unwrap_or_else(|_| message.to_string());
            eprintln!("{body}");
        } else {
            eprintln!("{} {message}", self.mark(RED, '✗'));
        }
    }

    pub fn warning(&self, message: &str) {
        if self.is_chatty() {
            eprintln!("{} {message}", self.mark(YELLOW, '⚠'));
        }
    }

    /// Print `value` as pretty JSON on stdout
    pub fn json<T: Serialize>(&self, value: &T) {
        match serde_json::to_string_pretty(value) {
            Ok(json) => println!("{json}"),
            Err(e) => eprintln!("Cannot encode output as JSON: {e}"),
        }
    }

    // Status lines are human-only
    fn is_chatty(&self) -> bool {
        !(self.config.quiet || self.config.json)
    }

    fn mark(&self, color: &str, symbol: char) -> String {
        if self.colors_enabled() {
            format!("\x1b[{color}m{symbol}\x1b[0m")
        } else {
            symbol.to_string()
        }
    }
}
