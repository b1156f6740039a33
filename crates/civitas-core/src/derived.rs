//! Derived values
//!
//! Pure functions over already-loaded fields. Entity catalogs wire these
//! into computed attributes; nothing here touches storage.

use chrono::{DateTime, Utc};

use crate::value::round_to;

const HOURS_PER_WEEK: f64 = 40.0;
const WEEKS_PER_YEAR: f64 = 52.0;
const MONTHS_PER_YEAR: f64 = 12.0;

fn percentage(part: i64, total: i64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    round_to(part as f64 / total as f64 * 100.0, 2)
}

/// Share of rows an import created or updated, as a percentage
pub fn success_rate(created: i64, updated: i64, total: i64) -> f64 {
    percentage(created.saturating_add(updated), total)
}

/// Share of rows an import failed on, as a percentage
pub fn error_rate(failed: i64, total: i64) -> f64 {
    percentage(failed, total)
}

/// Share of graduates with a tracked outcome, as a percentage
pub fn tracking_rate(tracked: i64, total: i64) -> f64 {
    percentage(tracked, total)
}

/// Share of experiment participants who converted, as a percentage
pub fn conversion_rate(conversions: i64, participants: i64) -> f64 {
    percentage(conversions, participants)
}

/// Percentage change from `starting` to `current`
///
/// `None` when either figure is missing or the starting figure is zero.
pub fn salary_growth(starting: Option<f64>, current: Option<f64>) -> Option<f64> {
    let (starting, current) = (starting?, current?);
    if starting == 0.0 {
        return None;
    }
    Some(round_to((current - starting) / starting * 100.0, 2))
}

/// Salary expressed per year
///
/// Hourly rates assume a 40-hour week over 52 weeks. Unrecognised salary
/// types pass the amount through unchanged.
pub fn annualize_salary(amount: f64, salary_type: &str) -> f64 {
    match salary_type.trim().to_ascii_lowercase().as_str() {
        "hourly" => amount * HOURS_PER_WEEK * WEEKS_PER_YEAR,
        "monthly" => amount * MONTHS_PER_YEAR,
        _ => amount,
    }
}

/// Whole minutes from `start` to `end`, or to `now` while still running
pub fn duration_minutes(
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Option<i64> {
    let start = start?;
    let end = end.unwrap_or(now);
    Some((end - start).num_minutes().abs())
}

pub fn is_expired(expires_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    matches!(expires_at, Some(at) if at < now)
}

/// A campaign recipient engaged if they opened or clicked
pub fn has_engaged(opened_at: Option<DateTime<Utc>>, clicked_at: Option<DateTime<Utc>>) -> bool {
    opened_at.is_some() || clicked_at.is_some()
}

/// Completed imports that wrote rows and were not already rolled back
pub fn can_rollback(
    status: &str,
    rolled_back_at: Option<DateTime<Utc>>,
    rows_written: i64,
) -> bool {
    status == "completed" && rolled_back_at.is_none() && rows_written > 0
}
