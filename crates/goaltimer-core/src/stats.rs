//! Goal statistics.
//!
//! Pure aggregation over the goal collection. Goals are bucketed by their
//! own `date` field; a goal whose date does not parse counts toward the
//! totals but not toward any day.
//!
//! [`RangeStats`] covers a date range: success rates for goals and for
//! their constraints, each broken down by weekday, plus the range's
//! last day on its own. Range rates are whole percentages rounded down
//! and read 0 when nothing qualifies.

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::deadline::parse_date;
use crate::goal::{ConstraintStatus, Goal, GoalStatus};

/// Window, in days including today, for the recent success rate.
pub const RECENT_WINDOW_DAYS: i64 = 7;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GoalStats {
    pub total: usize,
    pub pending: usize,
    pub completed: usize,
    pub failed: usize,
    /// Goals dated today.
    pub today: usize,
    /// Completed share of resolved goals, 0..=100. `None` when nothing is
    /// resolved yet.
    pub success_rate: Option<f64>,
    /// Same ratio over goals dated within the last seven days.
    pub recent_success_rate: Option<f64>,
    pub constraints_kept: usize,
    pub constraints_broken: usize,
}

impl GoalStats {
    pub fn compute(goals: &[Goal], today: NaiveDate) -> Self {
        let window_start = today - Duration::days(RECENT_WINDOW_DAYS - 1);
        let mut stats = GoalStats {
            total: goals.len(),
            ..Default::default()
        };
        let (mut recent_completed, mut recent_resolved) = (0usize, 0usize);

        for goal in goals {
            match goal.status {
                GoalStatus::Pending => stats.pending += 1,
                GoalStatus::Completed => stats.completed += 1,
                GoalStatus::Failed => stats.failed += 1,
            }
            match goal.constraint_status {
                Some(ConstraintStatus::Kept) => stats.constraints_kept += 1,
                Some(ConstraintStatus::Broken) => stats.constraints_broken += 1,
                None => {}
            }

            let Some(date) = parse_date(&goal.date) else {
                continue;
            };
            if date == today {
                stats.today += 1;
            }
            if date >= window_start && date <= today && !goal.is_pending() {
                recent_resolved += 1;
                if goal.status == GoalStatus::Completed {
                    recent_completed += 1;
                }
            }
        }

        stats.success_rate = rate(stats.completed, stats.completed + stats.failed);
        stats.recent_success_rate = rate(recent_completed, recent_resolved);
        stats
    }
}

/// Success count over a set of goals, whole and per weekday.
///
/// Weekday arrays are indexed from Sunday (0) to Saturday (6).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateBreakdown {
    pub counted: usize,
    pub succeeded: usize,
    pub rate: u8,
    pub weekday_counted: [usize; 7],
    pub weekday_succeeded: [usize; 7],
    pub weekday_rates: [u8; 7],
}

impl RateBreakdown {
    fn add(&mut self, weekday: usize, succeeded: bool) {
        self.counted += 1;
        self.weekday_counted[weekday] += 1;
        if succeeded {
            self.succeeded += 1;
            self.weekday_succeeded[weekday] += 1;
        }
    }

    fn finish(mut self) -> Self {
        self.rate = floor_percent(self.succeeded, self.counted);
        let days = self.weekday_succeeded.iter().zip(&self.weekday_counted);
        for (rate, (succeeded, counted)) in self.weekday_rates.iter_mut().zip(days) {
            *rate = floor_percent(*succeeded, *counted);
        }
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayStats {
    pub date: Option<NaiveDate>,
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    /// Completed share of every goal that day, pending ones included.
    pub rate: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeStats {
    pub from: NaiveDate,
    pub to: NaiveDate,
    /// Every goal dated in the range; success is `completed`.
    pub goals: RateBreakdown,
    /// Goals in the range with a recorded constraint; success is `kept`.
    pub constraints: RateBreakdown,
    /// The day `to`.
    pub today: DayStats,
}

impl RangeStats {
    /// The `days` days ending with `today`, both ends included.
    pub fn last_days(goals: &[Goal], today: NaiveDate, days: u32) -> Self {
        let from = today - Duration::days(i64::from(days.max(1)) - 1);
        Self::compute_between(goals, from, today)
    }

    pub fn compute_between(goals: &[Goal], from: NaiveDate, to: NaiveDate) -> Self {
        let mut stats = RangeStats {
            from,
            to,
            goals: RateBreakdown::default(),
            constraints: RateBreakdown::default(),
            today: DayStats {
                date: Some(to),
                ..Default::default()
            },
        };

        for goal in goals {
            let Some(date) = parse_date(&goal.date) else {
                continue;
            };
            if date < from || date > to {
                continue;
            }
            let weekday = date.weekday().num_days_from_sunday() as usize;
            stats.goals.add(weekday, goal.status == GoalStatus::Completed);
            if let Some(constraint) = goal.constraint_status {
                stats.constraints.add(weekday, constraint == ConstraintStatus::Kept);
            }

            if date == to {
                stats.today.total += 1;
                match goal.status {
                    GoalStatus::Completed => stats.today.completed += 1,
                    GoalStatus::Failed => stats.today.failed += 1,
                    GoalStatus::Pending => {}
                }
            }
        }

        stats.goals = stats.goals.finish();
        stats.constraints = stats.constraints.finish();
        stats.today.rate = floor_percent(stats.today.completed, stats.today.total);
        stats
    }
}

fn floor_percent(part: usize, whole: usize) -> u8 {
    if whole == 0 {
        return 0;
    }
    (part * 100 / whole) as u8
}

fn rate(completed: usize, resolved: usize) -> Option<f64> {
    if resolved == 0 {
        return None;
    }
    Some(completed as f64 * 100.0 / resolved as f64)
}
