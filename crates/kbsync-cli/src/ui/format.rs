//! Formatting utilities for CLI output.

use chrono::{DateTime, Utc};

use kbsync_core::Breadcrumb;

/// Truncate to at most `max_len` characters, ending in `...` when cut.
///
/// ```text
/// truncate_str("document.pdf", 20)     -> "document.pdf"
/// truncate_str("spreadsheet.xlsx", 8)  -> "sprea..."
/// ```
pub fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        return s.to_string();
    }
    if max_len <= 3 {
        return ".".repeat(max_len);
    }
    let kept: String = s.chars().take(max_len - 3).collect();
    format!("{}...", kept)
}

/// Relative age such as "5 mins ago", or the date for anything older than a week.
pub fn format_relative_time(timestamp: DateTime<Utc>) -> String {
    let age = Utc::now().signed_duration_since(timestamp);
    if age.num_seconds() < 0 || age.num_days() >= 7 {
        timestamp.format("%Y-%m-%d").to_string()
    } else if age.num_minutes() < 1 {
        "just now".to_string()
    } else if age.num_hours() < 1 {
        format!("{} mins ago", age.num_minutes())
    } else if age.num_hours() < 24 {
        format!("{}h ago", age.num_hours())
    } else {
        format!("{}d ago", age.num_days())
    }
}

/// `root / My Documents / Subfolder A`
pub fn format_breadcrumbs(breadcrumbs: &[Breadcrumb]) -> String {
    breadcrumbs
        .iter()
        .map(|b| b.label.as_str())
        .collect::<Vec<_>>()
        .join(" / ")
}

/// `1 resource`, `3 resources`
pub fn pluralize(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("{} {}", count, noun)
    } else {
        format!("{} {}s", count, noun)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_truncate_str() {
        assert_eq!(truncate_str("hello", 5), "hello");
        assert_eq!(truncate_str("hello world", 8), "hello...");
        assert_eq!(truncate_str("hello", 3), "...");
        assert_eq!(truncate_str("Écoles françaises", 8), "École...");
    }

    #[test]
    fn test_format_relative_time() {
        let now = Utc::now();
        assert_eq!(format_relative_time(now), "just now");
        assert_eq!(format_relative_time(now - Duration::minutes(5)), "5 mins ago");
        assert_eq!(format_relative_time(now - Duration::hours(3)), "3h ago");
        assert_eq!(format_relative_time(now - Duration::days(2)), "2d ago");
        let old = now - Duration::days(30);
        assert_eq!(format_relative_time(old), old.format("%Y-%m-%d").to_string());
    }

    #[test]
    fn test_format_breadcrumbs() {
        let crumbs = vec![
            Breadcrumb { index: -1, label: "root".to_string() },
            Breadcrumb { index: 0, label: "My Documents".to_string() },
        ];
        assert_eq!(format_breadcrumbs(&crumbs), "root / My Documents");
    }

    #[test]
    fn test_pluralize() {
        assert_eq!(pluralize(1, "resource"), "1 resource");
        assert_eq!(pluralize(0, "resource"), "0 resources");
    }
}
