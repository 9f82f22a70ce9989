//! Spinners for network calls and the explorer's `wait` command.
//!
//! Spinners are hidden when stdout is not a TTY, under `--quiet`, and for
//! `--json` output.

use std::io::IsTerminal;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use super::color::ColorMode;

/// Progress feedback mode based on output context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressMode {
    /// Interactive TTY: animated spinners
    Interactive,
    /// Non-TTY or quiet: final results only
    Quiet,
    /// Machine-readable output: nothing at all
    Silent,
}

impl ProgressMode {
    pub fn detect(quiet: bool, json: bool, color_mode: ColorMode) -> Self {
        if json {
            Self::Silent
        } else if quiet || color_mode == ColorMode::Never || !std::io::stdout().is_terminal() {
            Self::Quiet
        } else {
            Self::Interactive
        }
    }

    pub fn is_interactive(&self) -> bool {
        matches!(self, Self::Interactive)
    }
}

/// Spinner tick characters (Braille-based).
const SPINNER_CHARS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";

/// A spinner that wraps indicatif.
pub struct Progress {
    bar: ProgressBar,
    mode: ProgressMode,
}

impl Progress {
    /// ```ignore
    /// let progress = Progress::spinner("Loading connections...", mode);
    /// let connections = repository.list_connections(online, token).await?;
    /// progress.finish_clear();
    /// ```
    pub fn spinner(message: &str, mode: ProgressMode) -> Self {
        let bar = if mode.is_interactive() {
            let pb = ProgressBar::new_spinner();
            let style = ProgressStyle::default_spinner()
                .tick_chars(SPINNER_CHARS)
                .template("{spinner:.cyan} {msg} ({elapsed})")
                .unwrap_or_else(|_| ProgressStyle::default_spinner());
            pb.set_style(style);
            pb.set_message(message.to_string());
            pb.enable_steady_tick(Duration::from_millis(80));
            pb
        } else {
            ProgressBar::hidden()
        };

        Self { bar, mode }
    }

    pub fn set_message(&self, message: &str) {
        self.bar.set_message(message.to_string());
    }

    pub fn finish_clear(&self) {
        self.bar.finish_and_clear();
    }

    /// Finish, leaving `message` on the line in interactive mode.
    pub fn finish_with_message(&self, message: &str) {
        if self.mode.is_interactive() {
            self.bar.finish_with_message(message.to_string());
        } else {
            self.bar.finish_and_clear();
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.bar.elapsed()
    }

    pub fn mode(&self) -> ProgressMode {
        self.mode
    }
}
