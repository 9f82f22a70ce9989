//! Message styling for CLI output.
//!
//! | Prefix | Meaning | Color |
//! |--------|---------|-------|
//! | `[ok]` | Success | Green |
//! | `[err]` | Error | Red |
//! | `[warn]` | Warning | Yellow |
//! | `[info]` | Information | Blue |
//! | `[hint]` | Suggestion | Cyan |
//! | `[skip]` | Skipped | Dim |

use owo_colors::OwoColorize;

use kbsync_core::{IndexStatus, Resource};

use super::color::ColorMode;

/// Message severity/type for CLI output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Ok,
    Err,
    Warn,
    Info,
    /// Actionable next step or tip
    Hint,
    /// Request was intentionally not carried out
    Skip,
}

impl MessageType {
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Ok => "[ok]",
            Self::Err => "[err]",
            Self::Warn => "[warn]",
            Self::Info => "[info]",
            Self::Hint => "[hint]",
            Self::Skip => "[skip]",
        }
    }
}

/// Styling interface for CLI output.
///
/// With colors off, `style.message(MessageType::Ok, "Logged in")` renders as:
///
/// ```text
/// [ok] Logged in
/// ```
#[derive(Debug, Clone, Default)]
pub struct Style {
    color_mode: ColorMode,
}

impl Style {
    pub fn new(color_mode: ColorMode) -> Self {
        Self { color_mode }
    }

    pub fn colors_enabled(&self) -> bool {
        self.color_mode.is_enabled()
    }

    pub fn color_mode(&self) -> ColorMode {
        self.color_mode
    }

    /// Format a simple message with a type prefix.
    pub fn message(&self, msg_type: MessageType, text: &str) -> String {
        let prefix = msg_type.prefix();
        if !self.colors_enabled() {
            return format!("{} {}", prefix, text);
        }
        let colored_prefix = match msg_type {
            MessageType::Ok => prefix.green().to_string(),
            MessageType::Err => prefix.red().to_string(),
            MessageType::Warn => prefix.yellow().to_string(),
            MessageType::Info => prefix.blue().to_string(),
            MessageType::Hint => prefix.cyan().to_string(),
            MessageType::Skip => prefix.dimmed().to_string(),
        };
        format!("{} {}", colored_prefix, text)
    }

    /// Detail line under a message, indented by five spaces.
    pub fn message_detail(&self, label: &str, value: &str) -> String {
        format!("     {}: {}", label, value)
    }

    pub fn section(&self, title: &str) -> String {
        if self.colors_enabled() {
            title.bold().to_string()
        } else {
            title.to_string()
        }
    }

    /// Format a structured error with optional cause and hint.
    ///
    /// ```text
    /// [err] Failed to list connections
    ///       Cause: HTTP 500: list connections failed
    ///       Hint: Check backendUrl in ~/.kbsync/config.yaml
    /// ```
    pub fn error_with_context(&self, msg: &str, cause: Option<&str>, hint: Option<&str>) -> String {
        let mut output = self.message(MessageType::Err, msg);
        if let Some(cause_text) = cause {
            output.push_str(&format!("\n      Cause: {}", cause_text));
        }
        if let Some(hint_text) = hint {
            output.push_str(&format!("\n      Hint: {}", hint_text));
        }
        output
    }

    pub fn key_value(&self, key: &str, value: &str) -> String {
        if self.colors_enabled() {
            format!("{}: {}", key.dimmed(), value)
        } else {
            format!("{}: {}", key, value)
        }
    }

    /// First 8 characters of an id, in yellow.
    pub fn short_id(&self, id: &str) -> String {
        let short: String = id.chars().take(8).collect();
        if self.colors_enabled() {
            short.yellow().to_string()
        } else {
            short
        }
    }

    /// Status label of a resource row.
    pub fn status(&self, status: IndexStatus) -> String {
        let label = status_label(status);
        if !self.colors_enabled() {
            return label.to_string();
        }
        match status {
            IndexStatus::Indexed => label.green().to_string(),
            IndexStatus::Indexing => label.yellow().to_string(),
            IndexStatus::NotIndexed => label.dimmed().to_string(),
        }
    }

    /// Resource name, directories in cyan.
    pub fn resource_name(&self, resource: &Resource) -> String {
        let name = display_name(resource);
        if self.colors_enabled() && resource.is_directory() {
            name.cyan().to_string()
        } else {
            name
        }
    }
}

pub fn status_label(status: IndexStatus) -> &'static str {
    match status {
        IndexStatus::Indexed => "indexed",
        IndexStatus::Indexing => "indexing",
        IndexStatus::NotIndexed => "-",
    }
}

/// Last path segment, with a trailing `/` for directories.
pub fn display_name(resource: &Resource) -> String {
    if resource.is_directory() {
        format!("{}/", resource.name())
    } else {
        resource.name().to_string()
    }
}
