//! # Utilities Module
//!
//! ## Purpose
//! Common helpers used throughout the defect-intelligence core: operation
//! timing, tolerant date parsing for the mixed formats NHTSA feeds carry,
//! and small text transformations.
//!
//! ## Key Features
//! - Performance timer with debug logging
//! - Flexible date parsing (`MM/DD/YYYY`, ISO, compact `YYYYMMDD`)
//! - Text normalization and preview helpers

use chrono::NaiveDate;
use std::time::Instant;

/// Performance timer for measuring operation duration
pub struct Timer {
    start: Instant,
    name: String,
}

impl Timer {
    /// Start a new timer with a name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            start: Instant::now(),
            name: name.into(),
        }
    }

    /// Get elapsed time in milliseconds
    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    /// Stop timer and log duration
    pub fn stop(self) -> u64 {
        let elapsed = self.elapsed_ms();
        tracing::debug!("Timer '{}' completed in {}ms", self.name, elapsed);
        elapsed
    }
}

/// Date formats observed across the NHTSA complaint and recall feeds.
const DATE_FORMATS: &[&str] = &["%m/%d/%Y", "%Y-%m-%d", "%Y%m%d", "%d-%b-%Y"];

/// Parse a date string in any of the formats the feeds are known to use.
/// Returns `None` rather than guessing when nothing matches.
pub fn parse_flexible_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return Some(date);
        }
    }

    // Datetime strings occasionally appear; take the date prefix.
    if trimmed.len() >= 10 && trimmed.is_char_boundary(10) {
        if let Ok(date) = NaiveDate::parse_from_str(&trimmed[..10], "%Y-%m-%d") {
            return Some(date);
        }
    }

    None
}

/// Lowercase a narrative and collapse everything non-alphanumeric to single
/// spaces, matching how search terms are normalized before matching.
pub fn normalize_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last_was_space = true;

    for ch in text.chars() {
        if ch.is_ascii_alphanumeric() {
            out.extend(ch.to_lowercase());
            last_was_space = false;
        } else if !last_was_space {
            out.push(' ');
            last_was_space = true;
        }
    }

    while out.ends_with(' ') {
        out.pop();
    }
    out
}

/// Truncate text to the specified length with ellipsis
pub fn truncate(text: &str, max_length: usize) -> String {
    if text.chars().count() <= max_length {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max_length.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_us_style_dates() {
        assert_eq!(
            parse_flexible_date("05/02/2020"),
            NaiveDate::from_ymd_opt(2020, 5, 2)
        );
    }

    #[test]
    fn parses_iso_and_compact_dates() {
        assert_eq!(
            parse_flexible_date("2019-11-30"),
            NaiveDate::from_ymd_opt(2019, 11, 30)
        );
        assert_eq!(
            parse_flexible_date("20191130"),
            NaiveDate::from_ymd_opt(2019, 11, 30)
        );
    }

    #[test]
    fn rejects_garbage_dates() {
        assert_eq!(parse_flexible_date(""), None);
        assert_eq!(parse_flexible_date("not a date"), None);
        assert_eq!(parse_flexible_date("13/45/2020"), None);
    }

    #[test]
    fn normalizes_text() {
        assert_eq!(
            normalize_text("  Transmission SLIPPING, jerking!! "),
            "transmission slipping jerking"
        );
        assert_eq!(normalize_text("***"), "");
    }

    #[test]
    fn truncates_long_text() {
        assert_eq!(truncate("short", 20), "short");
        assert_eq!(truncate("a very long narrative", 10), "a very ...");
    }
}
