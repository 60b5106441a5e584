//! Subcommand implementations.

pub mod category;
pub mod maintenance;
pub mod stats;

use chrono::{DateTime, Utc};

/// Compact timestamp for table cells.
pub(crate) fn format_time(at: Option<DateTime<Utc>>) -> String {
    at.map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_time() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 9, 5, 0).unwrap();
        assert_eq!(format_time(Some(at)), "2024-03-01 09:05");
        assert_eq!(format_time(None), "-");
    }
}
