//! Clock and time-zone sources.
//!
//! Everything time-dependent takes a [`Clock`] so tests can drive the
//! countdown and the arbiter with a [`ManualClock`]. The [`LocalZone`] is
//! the single place local wall-clock values are turned into instants.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, FixedOffset, Local, NaiveDateTime, Offset, TimeZone, Utc};

/// Source of the current instant.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock of the host.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    pub fn set(&self, instant: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = instant;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// The time zone goal dates and times are read in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LocalZone {
    /// The device zone, re-read at every evaluation.
    #[default]
    System,
    /// A fixed UTC offset.
    Fixed(FixedOffset),
}

impl LocalZone {
    /// Fixed zone from an offset in minutes east of UTC.
    pub fn from_offset_minutes(minutes: i32) -> Option<Self> {
        FixedOffset::east_opt(minutes.checked_mul(60)?).map(LocalZone::Fixed)
    }

    /// Resolve a local wall-clock value to an instant.
    ///
    /// Ambiguous times (clocks falling back) resolve to the earlier
    /// instant. Times inside a spring-forward gap resolve to the instant
    /// one hour later, which is where the device clock lands.
    pub fn resolve(&self, local: NaiveDateTime) -> Option<DateTime<Utc>> {
        match self {
            LocalZone::System => resolve_in(&Local, local),
            LocalZone::Fixed(offset) => resolve_in(offset, local),
        }
    }

    /// Local wall-clock reading of an instant.
    pub fn to_local(&self, instant: DateTime<Utc>) -> NaiveDateTime {
        match self {
            LocalZone::System => instant.with_timezone(&Local).naive_local(),
            LocalZone::Fixed(offset) => instant.with_timezone(offset).naive_local(),
        }
    }

    /// Current offset from UTC in seconds, for logging.
    pub fn offset_secs(&self, at: DateTime<Utc>) -> i32 {
        match self {
            LocalZone::System => at.with_timezone(&Local).offset().fix().local_minus_utc(),
            LocalZone::Fixed(offset) => offset.local_minus_utc(),
        }
    }
}

fn resolve_in<Tz: TimeZone>(tz: &Tz, local: NaiveDateTime) -> Option<DateTime<Utc>> {
    tz.from_local_datetime(&local)
        .earliest()
        .or_else(|| tz.from_local_datetime(&(local + Duration::hours(1))).earliest())
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn manual_clock_advances() {
        let start = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        let clock = ManualClock::new(start);
        clock.advance(Duration::seconds(90));
        assert_eq!(clock.now(), start + Duration::seconds(90));
    }

    #[test]
    fn fixed_zone_resolves_wall_clock() {
        let zone = LocalZone::from_offset_minutes(9 * 60).unwrap();
        let local = NaiveDate::from_ymd_opt(2025, 6, 1)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        let instant = zone.resolve(local).unwrap();
        assert_eq!(instant, Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap());
        assert_eq!(zone.to_local(instant), local);
    }

    #[test]
    fn rejects_out_of_range_offset() {
        assert!(LocalZone::from_offset_minutes(25 * 60).is_none());
    }
}
