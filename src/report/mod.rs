use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

use crate::batch::Stage;

/// Operator-facing progress output.
///
/// Stage and info lines are suppressed in quiet mode; outcome lines
/// (`[OK]`, `[WARN]`, `[ERROR]`) are always printed.
#[derive(Debug, Clone, Copy, Default)]
pub struct Reporter {
    quiet: bool,
}

impl Reporter {
    pub fn new(quiet: bool) -> Self {
        Self { quiet }
    }

    /// `=== <title> ===` banner
    pub fn banner(&self, title: &str) {
        if !self.quiet {
            println!("=== {} ===", title);
        }
    }

    /// `[n/3] <label>` line for the stage being entered
    pub fn stage(&self, stage: Stage, label: &str) {
        if !self.quiet {
            println!("{} {}", style(format!("[{}/3]", stage.position())).dim(), label);
        }
    }

    pub fn info(&self, message: &str) {
        if !self.quiet {
            println!("{} {}", style("[INFO]").cyan(), message);
        }
    }

    pub fn ok(&self, message: &str) {
        println!("{} {}", style("[OK]").green().bold(), message);
    }

    pub fn warn(&self, message: &str) {
        println!("{} {}", style("[WARN]").yellow().bold(), message);
    }

    pub fn error(&self, message: &str) {
        println!("{} {}", style("[ERROR]").red().bold(), message);
    }

    /// Indented `key: value` line under an error
    pub fn detail(&self, key: &str, value: &str) {
        println!("  {}: {}", key, value);
    }

    /// Spinner for long external calls; hidden in quiet mode
    pub fn spinner(&self, message: impl Into<String>) -> ProgressBar {
        if self.quiet {
            return ProgressBar::hidden();
        }

        let progress = ProgressBar::new_spinner();
        if let Ok(spinner_style) =
            ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")
        {
            progress.set_style(spinner_style);
        }
        progress.set_message(message.into());
        progress.enable_steady_tick(Duration::from_millis(120));
        progress
    }
}
