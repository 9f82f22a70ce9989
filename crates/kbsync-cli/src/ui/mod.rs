//! # CLI UI Module
//!
//! Consistent styling and formatting for kbsync output.
//!
//! ## Design Principles
//!
//! 1. **Scannable**: status of every resource is visible at a glance
//! 2. **Consistent**: same prefixes and tables across commands and the explorer
//! 3. **Accessible**: works without colors (respects `NO_COLOR`)
//! 4. **Scriptable**: machine-parseable with `--json`
//!
//! ## Module Structure
//!
//! - `color`: Color mode detection and terminal capability checks
//! - `style`: Message types, prefixes, and styling functions
//! - `format`: Text helpers (truncation, relative time, breadcrumbs)
//! - `table`: Table rendering with comfy-table
//! - `progress`: Spinner shown while waiting for the backend

pub mod color;
pub mod format;
pub mod progress;
pub mod style;
pub mod table;

pub use color::ColorMode;
pub use progress::{Progress, ProgressMode};
pub use style::{MessageType, Style};
