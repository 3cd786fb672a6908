//! # Validation Errors
//!
//! Construction-time failures for the domain primitives in this crate.
//! Each variant carries the rejected input so operators can diagnose bad
//! client payloads without guesswork.

use thiserror::Error;

/// Validation errors for domain primitives.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Day string is not a `YYYY-MM-DD` calendar date.
    #[error("invalid day: \"{0}\" (expected YYYY-MM-DD)")]
    InvalidDay(String),

    /// Status string does not name a known attendance status.
    #[error("invalid status: \"{0}\" (expected pending, present, excused, sick or absent)")]
    InvalidStatus(String),

    /// UTC offset is outside the range a fixed offset can express.
    #[error("invalid UTC offset: {0} hours (expected -23..=23)")]
    InvalidUtcOffset(i32),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_day_display_names_input() {
        let err = ValidationError::InvalidDay("10/03/2025".to_string());
        let msg = err.to_string();
        assert!(msg.contains("10/03/2025"));
        assert!(msg.contains("YYYY-MM-DD"));
    }

    #[test]
    fn invalid_status_display_lists_choices() {
        let err = ValidationError::InvalidStatus("late".to_string());
        assert!(err.to_string().contains("late"));
        assert!(err.to_string().contains("excused"));
    }

    #[test]
    fn invalid_offset_display() {
        assert!(ValidationError::InvalidUtcOffset(30).to_string().contains("30"));
    }
}
