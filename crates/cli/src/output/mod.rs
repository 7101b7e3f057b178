//! Output formatting utilities
//!
//! Human-readable and JSON output, plus the transfer spinner.

mod formatter;
mod progress;

pub use formatter::Formatter;
pub use progress::Spinner;

/// Output configuration derived from CLI flags and the config file
#[derive(Debug, Clone, Default)]
pub struct OutputConfig {
    /// Use JSON output format
    pub json: bool,
    /// Disable colored output
    pub no_color: bool,
    /// Disable progress display
    pub no_progress: bool,
    /// Suppress non-error output
    pub quiet: bool,
}

impl OutputConfig {
    /// Merge command line flags with the config file defaults
    pub fn from_flags(
        json: bool,
        no_color: bool,
        no_progress: bool,
        quiet: bool,
        defaults: &irs_core::config::Defaults,
    ) -> Self {
        Self {
            json: json || defaults.output == "json",
            no_color: no_color || defaults.color == "never",
            no_progress: no_progress || !defaults.progress,
            quiet,
        }
    }
}
