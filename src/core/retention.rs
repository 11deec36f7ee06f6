//! Retention clock - cutoff instants for point expiry and history windows.
//!
//! Every cutoff is "now" truncated to the start of its UTC day, minus a number
//! of days. The statistics cutoff and the expiration cutoff use the same formula
//! but are kept as separate entry points: statistics, the sweeper and the
//! read-side balance reconciliation must all agree on one value. The cleanup
//! cutoff adds a grace day and exists only for storage reclamation; it must never
//! feed balance math.

use chrono::{DateTime, Duration, NaiveTime, Utc};

/// Point lifetime and history window in days.
pub const RETENTION_DAYS: u32 = 45;

/// Extra day granted to storage reclamation beyond the retention window.
pub const CLEANUP_GRACE_DAYS: u32 = 1;

/// Start of the UTC day containing `now`, minus `retention_days` days.
#[must_use]
pub fn cutoff(now: DateTime<Utc>, retention_days: u32) -> DateTime<Utc> {
    let midnight = now.date_naive().and_time(NaiveTime::MIN).and_utc();
    midnight - Duration::days(i64::from(retention_days))
}

/// Cutoff for "last N days" history and statistics views.
#[must_use]
pub fn statistics_cutoff(now: DateTime<Utc>, retention_days: u32) -> DateTime<Utc> {
    cutoff(now, retention_days)
}

/// Cutoff before which unexpired `earn` entries are exhausted.
#[must_use]
pub fn expiration_cutoff(now: DateTime<Utc>, retention_days: u32) -> DateTime<Utc> {
    cutoff(now, retention_days)
}

/// Cutoff for physically deleting old ledger rows: one grace day past expiry.
#[must_use]
pub fn cleanup_cutoff(now: DateTime<Utc>, retention_days: u32) -> DateTime<Utc> {
    cutoff(now, retention_days.saturating_add(CLEANUP_GRACE_DAYS))
}
