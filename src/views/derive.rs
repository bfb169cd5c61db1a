//! Display fields derived from stored dates.
//!
//! Pure functions, recomputed on every projection. Nothing here is stored.

use std::fmt::Write;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};

use board_types::TaskStatus;

fn midnight(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

/// Percentage of the project's span elapsed at `now`.
///
/// 0 before the start, 100 from the end on, linear in between. A project
/// without both dates has made no measurable progress.
pub fn progress_percent(
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    now: DateTime<Utc>,
) -> u8 {
    let (Some(start), Some(end)) = (start, end) else {
        return 0;
    };
    let (start, end) = (midnight(start), midnight(end));

    if now < start {
        return 0;
    }
    if now >= end {
        return 100;
    }

    // start <= now < end, so the span is positive
    let elapsed = (now - start).num_seconds() as f64;
    let span = (end - start).num_seconds() as f64;
    (elapsed / span * 100.0).round().clamp(0.0, 100.0) as u8
}

/// Human rendering of a due date using a `chrono` format string.
///
/// Falls back to ISO format if `format` contains an unknown specifier.
pub fn format_due_date(date: Option<NaiveDate>, format: &str) -> String {
    let Some(date) = date else {
        return "No due date".to_string();
    };
    let mut out = String::new();
    if write!(out, "{}", date.format(format)).is_err() {
        return date.to_string();
    }
    out
}

pub fn is_overdue(due: Option<NaiveDate>, status: TaskStatus, today: NaiveDate) -> bool {
    status != TaskStatus::Done && due.is_some_and(|due| due < today)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_progress_midpoint_and_bounds() {
        let (start, end) = (Some(date(2025, 1, 1)), Some(date(2025, 1, 11)));
        assert_eq!(progress_percent(start, end, at(2025, 1, 6)), 50);
        assert_eq!(progress_percent(start, end, at(2024, 12, 31)), 0);
        assert_eq!(progress_percent(start, end, at(2025, 1, 12)), 100);
        assert_eq!(progress_percent(start, end, at(2025, 1, 1)), 0);
        assert_eq!(progress_percent(start, end, at(2025, 1, 11)), 100);
    }

    #[test]
    fn test_progress_without_dates() {
        assert_eq!(progress_percent(None, Some(date(2025, 1, 1)), at(2026, 1, 1)), 0);
    }

    #[test]
    fn test_progress_zero_length_span() {
        let day = Some(date(2025, 3, 1));
        assert_eq!(progress_percent(day, day, at(2025, 2, 28)), 0);
        assert_eq!(progress_percent(day, day, at(2025, 3, 1)), 100);
    }

    #[test]
    fn test_format_due_date() {
        assert_eq!(format_due_date(Some(date(2025, 2, 1)), "%b %-d, %Y"), "Feb 1, 2025");
        assert_eq!(format_due_date(None, "%b %-d, %Y"), "No due date");
        assert_eq!(format_due_date(Some(date(2025, 2, 1)), "%Q"), "2025-02-01");
    }

    #[test]
    fn test_overdue_ignores_done_tasks() {
        let today = date(2025, 1, 10);
        assert!(is_overdue(Some(date(2025, 1, 9)), TaskStatus::Todo, today));
        assert!(!is_overdue(Some(date(2025, 1, 9)), TaskStatus::Done, today));
        assert!(!is_overdue(Some(date(2025, 1, 10)), TaskStatus::InProgress, today));
        assert!(!is_overdue(None, TaskStatus::Todo, today));
    }

    proptest! {
        #[test]
        fn prop_progress_is_bounded_and_monotonic(
            span_days in 1i64..400,
            a in 0i64..500,
            b in 0i64..500,
        ) {
            let start = date(2025, 1, 1);
            let end = start + chrono::Duration::days(span_days);
            let origin = at(2024, 12, 1);
            let (early, late) = (a.min(b), a.max(b));

            let p_early = progress_percent(Some(start), Some(end), origin + chrono::Duration::days(early));
            let p_late = progress_percent(Some(start), Some(end), origin + chrono::Duration::days(late));
            prop_assert!(p_early <= 100 && p_late <= 100);
            prop_assert!(p_early <= p_late);
        }
    }
}
