//! Deadline arithmetic.
//!
//! A deadline is always rebuilt from its decomposed local components
//! (year, month, day, hour, minute) through [`LocalZone::resolve`]. No
//! instant is cached on the goal, so the device zone at evaluation time
//! decides when the local wall clock is reached.
//!
//! Malformed or missing date/time values never error out of this module:
//! they resolve to "no deadline", which reads as zero seconds remaining.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use tracing::debug;

use crate::clock::LocalZone;
use crate::goal::Goal;

/// Total duration used when the creation time is missing or not before
/// the deadline.
pub const DEFAULT_FALLBACK_DURATION_SECS: u64 = 3600;

/// Parse a `YYYY-MM-DD` calendar date.
pub fn parse_date(date: &str) -> Option<NaiveDate> {
    let mut parts = date.trim().splitn(3, '-');
    let year = parts.next()?.parse::<i32>().ok()?;
    let month = parts.next()?.parse::<u32>().ok()?;
    let day = parts.next()?.parse::<u32>().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Parse an `HH:MM` time of day. Seconds are always zero.
pub fn parse_time(time: &str) -> Option<NaiveTime> {
    let (hour, minute) = time.trim().split_once(':')?;
    let hour = hour.parse::<u32>().ok()?;
    let minute = minute.parse::<u32>().ok()?;
    NaiveTime::from_hms_opt(hour, minute, 0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeadlineCalculator {
    zone: LocalZone,
    fallback_duration_secs: u64,
}

impl Default for DeadlineCalculator {
    fn default() -> Self {
        Self::new(LocalZone::System, DEFAULT_FALLBACK_DURATION_SECS)
    }
}

impl DeadlineCalculator {
    pub fn new(zone: LocalZone, fallback_duration_secs: u64) -> Self {
        Self {
            zone,
            fallback_duration_secs,
        }
    }

    pub fn zone(&self) -> LocalZone {
        self.zone
    }

    /// Instant the local wall clock reads `date` + `time`.
    pub fn instant_at(&self, date: &str, time: &str) -> Option<DateTime<Utc>> {
        let date = parse_date(date)?;
        let time = parse_time(time)?;
        self.zone.resolve(date.and_time(time))
    }

    /// The goal's deadline instant, or `None` when its date/time are unusable.
    pub fn deadline_instant(&self, goal: &Goal) -> Option<DateTime<Utc>> {
        let instant = self.instant_at(&goal.date, &goal.time);
        if instant.is_none() {
            debug!(goal_id = %goal.id, date = %goal.date, time = %goal.time, "unresolvable deadline");
        }
        instant
    }

    /// Whole seconds until the deadline, floored, never negative.
    pub fn remaining_seconds(&self, goal: &Goal, now: DateTime<Utc>) -> u64 {
        remaining_until(self.deadline_instant(goal), now)
    }

    /// Span from creation to deadline, at least the fallback duration.
    pub fn total_duration_seconds(&self, goal: &Goal) -> u64 {
        let span = self.deadline_instant(goal).and_then(|deadline| {
            let created = self.instant_at(&goal.date, goal.created_at.as_deref()?)?;
            u64::try_from((deadline - created).num_seconds()).ok()
        });
        span.unwrap_or(0).max(self.fallback_duration_secs)
    }

    /// Integer progress 0..=100 from creation to deadline.
    pub fn percent_complete(&self, goal: &Goal, now: DateTime<Utc>) -> u8 {
        percent_of(self.remaining_seconds(goal, now), self.total_duration_seconds(goal))
    }

    /// Whether the deadline has been reached. Unusable deadlines count as
    /// reached.
    pub fn is_due(&self, goal: &Goal, now: DateTime<Utc>) -> bool {
        self.remaining_seconds(goal, now) == 0
    }
}

/// `max(0, floor((deadline - now) / 1s))`; zero when there is no deadline.
pub fn remaining_until(deadline: Option<DateTime<Utc>>, now: DateTime<Utc>) -> u64 {
    match deadline {
        Some(deadline) => u64::try_from((deadline - now).num_milliseconds())
            .map(|ms| ms / 1000)
            .unwrap_or(0),
        None => 0,
    }
}

pub(crate) fn percent_of(remaining: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    let done = 1.0 - remaining as f64 / total as f64;
    (done * 100.0).clamp(0.0, 100.0).floor() as u8
}

/// `HH:MM:SS` countdown display.
pub fn format_hms(secs: u64) -> String {
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

/// `H:MM` line for the ongoing-status notification; minutes round up.
pub fn format_ongoing(secs: u64) -> String {
    let minutes = secs.div_ceil(60);
    format!("{}:{:02}", minutes / 60, minutes % 60)
}
