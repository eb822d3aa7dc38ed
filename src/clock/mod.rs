//! Delivery-zone time resolution and tolerance matching
//!
//! Every scheduling decision is made against a single fixed delivery
//! timezone (UTC+7 by default), independent of the host process timezone.
//! The batch runner fires on a periodic trigger rather than at exact
//! minutes, so time matching is tolerance-based: a tick within a few
//! minutes of a user's configured send time still counts as on time.
//!
//! Tolerance matching uses a flat minutes-since-midnight distance. A target
//! of "23:58" and a current time of "00:02" are ~1436 minutes apart and do
//! not match; there is no cross-midnight wraparound.

use chrono::{DateTime, Duration, FixedOffset, NaiveTime, TimeZone, Timelike, Utc};

/// Delivery timezone offset used when none (or an invalid one) is configured
pub const DEFAULT_UTC_OFFSET_HOURS: i32 = 7;

/// Tolerance applied to send-time matching when the caller gives none
pub const DEFAULT_TOLERANCE_MINUTES: i64 = 5;

/// Fixed-offset clock for the delivery timezone
///
/// Construction never fails: an out-of-range offset falls back to
/// [`DEFAULT_UTC_OFFSET_HOURS`] with a warning, so a misconfigured
/// environment degrades to the default zone instead of taking the
/// scheduler down.
#[derive(Debug, Clone, Copy)]
pub struct Clock {
    offset: FixedOffset,
}

impl Default for Clock {
    fn default() -> Self {
        Self::new(DEFAULT_UTC_OFFSET_HOURS)
    }
}

impl Clock {
    /// Create a clock for the given UTC offset in whole hours
    pub fn new(utc_offset_hours: i32) -> Self {
        let offset = match FixedOffset::east_opt(utc_offset_hours * 3600) {
            Some(offset) => offset,
            None => {
                tracing::warn!(
                    offset_hours = utc_offset_hours,
                    fallback_hours = DEFAULT_UTC_OFFSET_HOURS,
                    "invalid UTC offset, falling back to default delivery zone"
                );
                FixedOffset::east_opt(DEFAULT_UTC_OFFSET_HOURS * 3600)
                    .expect("default offset is in range")
            }
        };

        Self { offset }
    }

    /// Current instant in the delivery timezone
    pub fn now(&self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&self.offset)
    }

    /// The configured offset
    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Format an instant as a zero-padded "HH:MM" time-of-day string
    pub fn time_of_day(instant: &DateTime<FixedOffset>) -> String {
        instant.format("%H:%M").to_string()
    }

    /// Current time of day in the delivery timezone, "HH:MM"
    pub fn current_time_string(&self) -> String {
        Self::time_of_day(&self.now())
    }

    /// Parse an "HH:MM" time-of-day string
    pub fn parse_time_of_day(value: &str) -> Option<NaiveTime> {
        NaiveTime::parse_from_str(value, "%H:%M").ok()
    }

    /// Check whether two time-of-day strings match within a tolerance
    ///
    /// An exact string match always counts. Otherwise the absolute
    /// difference in minutes since midnight must be at most
    /// `tolerance_minutes`. Malformed input never matches.
    pub fn is_within_tolerance(target: &str, current: &str, tolerance_minutes: i64) -> bool {
        if target == current {
            return true;
        }

        let (Some(target_time), Some(current_time)) = (
            Self::parse_time_of_day(target),
            Self::parse_time_of_day(current),
        ) else {
            tracing::warn!(
                target = %target,
                current = %current,
                "malformed time-of-day value in tolerance check"
            );
            return false;
        };

        let diff = (minutes_since_midnight(target_time) - minutes_since_midnight(current_time))
            .abs();
        diff <= tolerance_minutes
    }

    /// The next instant at or after `from` whose time of day equals `target`
    ///
    /// Returns tomorrow's occurrence when the target time has already
    /// passed today, `None` only when `target` is malformed.
    pub fn next_occurrence(
        &self,
        target: &str,
        from: DateTime<FixedOffset>,
    ) -> Option<DateTime<FixedOffset>> {
        let target_time = Self::parse_time_of_day(target)?;

        let today = from.date_naive().and_time(target_time);
        let candidate = self.offset.from_local_datetime(&today).single()?;

        if candidate >= from {
            return Some(candidate);
        }

        let tomorrow = (from.date_naive() + Duration::days(1)).and_time(target_time);
        self.offset.from_local_datetime(&tomorrow).single()
    }
}

fn minutes_since_midnight(time: NaiveTime) -> i64 {
    i64::from(time.hour()) * 60 + i64::from(time.minute())
}
