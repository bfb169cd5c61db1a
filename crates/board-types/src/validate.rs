//! Input validation run before any network call.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use thiserror::Error;

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap());

/// Rejected input. Carries the offending field for form highlighting.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Synchronous check of a create input or patch.
pub trait Validate {
    fn validate(&self) -> Result<(), ValidationError>;
}

pub(crate) fn require_text(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, "is required"));
    }
    Ok(())
}

pub(crate) fn require_ordered_dates(
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Result<(), ValidationError> {
    if let (Some(start), Some(end)) = (start, end) {
        if end < start {
            return Err(ValidationError::new(
                "end_date",
                format!("must not be before the start date ({start})"),
            ));
        }
    }
    Ok(())
}

pub(crate) fn require_emails<'a>(
    field: &'static str,
    emails: impl IntoIterator<Item = &'a String>,
) -> Result<(), ValidationError> {
    for email in emails {
        if !EMAIL_RE.is_match(email.trim()) {
            return Err(ValidationError::new(
                field,
                format!("'{email}' is not a valid email address"),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_text_is_rejected() {
        assert!(require_text("name", "   ").is_err());
        assert!(require_text("name", "Alpha").is_ok());
    }

    #[test]
    fn test_end_before_start_is_rejected() {
        let start = NaiveDate::from_ymd_opt(2025, 2, 1);
        let end = NaiveDate::from_ymd_opt(2025, 1, 1);
        let err = require_ordered_dates(start, end).unwrap_err();
        assert_eq!(err.field, "end_date");
        assert!(require_ordered_dates(end, start).is_ok());
        assert!(require_ordered_dates(None, end).is_ok());
    }

    #[test]
    fn test_email_shapes() {
        let good = vec!["a@example.com".to_string()];
        let bad = vec!["a@example.com".to_string(), "nope".to_string()];
        assert!(require_emails("member_emails", &good).is_ok());
        let err = require_emails("member_emails", &bad).unwrap_err();
        assert!(err.message.contains("nope"));
    }

    #[test]
    fn test_email_pattern_is_shared_across_calls() {
        let first: *const Regex = &*EMAIL_RE;
        let many: Vec<String> = (0..50).map(|i| format!("user{i}@example.com")).collect();
        assert!(require_emails("member_emails", &many).is_ok());
        assert!(std::ptr::eq(first, &*EMAIL_RE));
    }
}
