//! Countdown engine.
//!
//! Drives the "time remaining" readout for the goal on screen. Like the
//! rest of the core it owns no thread: the caller invokes [`CountdownEngine::tick`]
//! periodically (see [`crate::session::run_countdown`]).
//!
//! Every tick re-derives the remaining time from the goal's deadline and
//! the current instant. Nothing is decremented, so a suspended process or
//! a late tick can not put the readout out of step with the wall clock.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Running -> (Completed | Suspended)
//! Running -> Idle          (goal vanished mid-countdown)
//! Suspended -> Running     (screen revisited, goal still pending)
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::deadline::{format_hms, parse_date, percent_of, DeadlineCalculator};
use crate::events::Event;
use crate::goal::{Goal, GoalId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CountdownState {
    Idle,
    Running,
    Completed,
    Suspended,
}

/// Readout for one goal at one instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountdownSnapshot {
    pub goal_id: GoalId,
    pub state: CountdownState,
    pub remaining_secs: u64,
    pub total_secs: u64,
    pub percent_complete: u8,
    /// `HH:MM:SS`
    pub display: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CountdownEngine {
    calculator: DeadlineCalculator,
    state: CountdownState,
    goal: Option<Goal>,
    /// Last computed value, kept only for snapshots between ticks.
    remaining_secs: u64,
}

impl CountdownEngine {
    pub fn new(calculator: DeadlineCalculator) -> Self {
        Self {
            calculator,
            state: CountdownState::Idle,
            goal: None,
            remaining_secs: 0,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> CountdownState {
        self.state
    }

    pub fn goal_id(&self) -> Option<&GoalId> {
        self.goal.as_ref().map(|g| &g.id)
    }

    pub fn remaining_secs(&self) -> u64 {
        self.remaining_secs
    }

    pub fn snapshot(&self, now: DateTime<Utc>) -> Option<CountdownSnapshot> {
        let goal = self.goal.as_ref()?;
        let total_secs = self.calculator.total_duration_seconds(goal);
        Some(CountdownSnapshot {
            goal_id: goal.id.clone(),
            state: self.state,
            remaining_secs: self.remaining_secs,
            total_secs,
            percent_complete: percent_of(self.remaining_secs, total_secs),
            display: format_hms(self.remaining_secs),
            at: now,
        })
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Put `goal` on screen.
    ///
    /// A pending goal starts `Running`, even when its deadline has already
    /// passed; the next tick then completes it. A resolved goal is shown
    /// as `Completed` and never ticks.
    pub fn load(&mut self, goal: &Goal, now: DateTime<Utc>) -> Option<Event> {
        self.remaining_secs = self.calculator.remaining_seconds(goal, now);
        self.goal = Some(goal.clone());

        if !goal.is_pending() {
            self.state = CountdownState::Completed;
            return None;
        }
        if self.calculator.deadline_instant(goal).is_none() {
            warn!(goal_id = %goal.id, "goal has no usable deadline; countdown reads as expired");
        }

        self.state = CountdownState::Running;
        info!(goal_id = %goal.id, remaining_secs = self.remaining_secs, "countdown started");
        Some(Event::CountdownStarted {
            goal_id: goal.id.clone(),
            remaining_secs: self.remaining_secs,
            total_secs: self.calculator.total_duration_seconds(goal),
            at: now,
        })
    }

    /// Recompute from the live record. `current` is the goal as it is in
    /// the store right now, `None` if it has been deleted.
    ///
    /// Returns `CountdownCompleted` exactly once per run: the engine
    /// leaves `Running` in the same call.
    pub fn tick(&mut self, current: Option<&Goal>, now: DateTime<Utc>) -> Option<Event> {
        if self.state != CountdownState::Running {
            return None;
        }

        let Some(current) = current else {
            let goal_id = self.goal.take().map(|g| g.id);
            warn!(goal_id = ?goal_id, "goal disappeared mid-countdown; stopping");
            self.state = CountdownState::Idle;
            self.remaining_secs = 0;
            return Some(Event::CountdownStopped {
                goal_id,
                state: CountdownState::Idle,
                at: now,
            });
        };

        if !current.is_pending() {
            debug!(goal_id = %current.id, "goal resolved elsewhere; stopping countdown");
            self.goal = Some(current.clone());
            self.state = CountdownState::Completed;
            return Some(Event::CountdownStopped {
                goal_id: Some(current.id.clone()),
                state: CountdownState::Completed,
                at: now,
            });
        }

        self.goal = Some(current.clone());
        self.remaining_secs = self.calculator.remaining_seconds(current, now);

        if self.remaining_secs == 0 {
            self.state = CountdownState::Completed;
            info!(goal_id = %current.id, "countdown reached zero");
            return Some(Event::CountdownCompleted {
                goal_id: current.id.clone(),
                at: now,
            });
        }

        self.snapshot(now)
            .map(|snapshot| Event::CountdownTick { snapshot })
    }

    /// Leave the screen. Only the local tick stops; the goal's scheduled
    /// notification is not this engine's business.
    pub fn suspend(&mut self, now: DateTime<Utc>) -> Option<Event> {
        if self.state != CountdownState::Running {
            return None;
        }
        self.state = CountdownState::Suspended;
        let goal_id = self.goal.as_ref()?.id.clone();
        debug!(goal_id = %goal_id, "countdown suspended");
        Some(Event::CountdownSuspended {
            goal_id,
            remaining_secs: self.remaining_secs,
            at: now,
        })
    }
}

/// The pending goal dated today whose deadline comes next after `now`.
///
/// Feeds the ongoing-status line ([`crate::deadline::format_ongoing`]).
pub fn nearest_upcoming<'a>(
    goals: &'a [Goal],
    calculator: &DeadlineCalculator,
    now: DateTime<Utc>,
) -> Option<&'a Goal> {
    let today = calculator.zone().to_local(now).date();
    goals
        .iter()
        .filter(|g| g.is_pending() && parse_date(&g.date) == Some(today))
        .filter_map(|g| {
            let deadline = calculator.deadline_instant(g)?;
            (deadline > now).then_some((deadline, g))
        })
        .min_by_key(|(deadline, g)| (*deadline, g.id.clone()))
        .map(|(_, g)| g)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::LocalZone;
    use crate::goal::{GoalDraft, GoalStatus};
    use chrono::{Duration, TimeZone};

    fn engine() -> CountdownEngine {
        CountdownEngine::new(DeadlineCalculator::new(
            LocalZone::from_offset_minutes(0).unwrap(),
            3600,
        ))
    }

    fn goal() -> Goal {
        Goal::from_draft(
            GoalId::new("1"),
            GoalDraft {
                title: "Meditate".into(),
                date: "2025-06-01".into(),
                time: "09:00".into(),
                ..Default::default()
            },
            "08:00".into(),
        )
    }

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, h, m, s).unwrap()
    }

    #[test]
    fn load_starts_running() {
        let mut e = engine();
        assert_eq!(e.state(), CountdownState::Idle);
        let event = e.load(&goal(), at(8, 30, 0));
        assert!(matches!(event, Some(Event::CountdownStarted { remaining_secs: 1800, .. })));
        assert_eq!(e.state(), CountdownState::Running);
    }

    #[test]
    fn tick_recomputes_from_wall_clock() {
        let mut e = engine();
        let g = goal();
        e.load(&g, at(8, 0, 0));
        e.tick(Some(&g), at(8, 0, 1));
        assert_eq!(e.remaining_secs(), 3599);
        // A long gap between ticks (process suspended) is absorbed.
        e.tick(Some(&g), at(8, 45, 0));
        assert_eq!(e.remaining_secs(), 900);
        let snap = e.snapshot(at(8, 45, 0)).unwrap();
        assert_eq!(snap.percent_complete, 75);
        assert_eq!(snap.display, "00:15:00");
    }

    #[test]
    fn completes_exactly_once() {
        let mut e = engine();
        let g = goal();
        e.load(&g, at(8, 59, 58));
        assert!(matches!(e.tick(Some(&g), at(8, 59, 59)), Some(Event::CountdownTick { .. })));
        assert!(matches!(e.tick(Some(&g), at(9, 0, 0)), Some(Event::CountdownCompleted { .. })));
        assert_eq!(e.state(), CountdownState::Completed);
        assert!(e.tick(Some(&g), at(9, 0, 1)).is_none());
    }

    #[test]
    fn deleted_goal_stops_engine() {
        let mut e = engine();
        e.load(&goal(), at(8, 0, 0));
        let event = e.tick(None, at(8, 0, 1));
        assert!(matches!(event, Some(Event::CountdownStopped { state: CountdownState::Idle, .. })));
        assert_eq!(e.state(), CountdownState::Idle);
        assert!(e.goal_id().is_none());
    }

    #[test]
    fn resolved_elsewhere_stops_without_completing() {
        let mut e = engine();
        let mut g = goal();
        e.load(&g, at(8, 0, 0));
        g.status = GoalStatus::Completed;
        let event = e.tick(Some(&g), at(8, 0, 1));
        assert!(matches!(event, Some(Event::CountdownStopped { state: CountdownState::Completed, .. })));
    }

    #[test]
    fn suspend_then_reload_resumes_from_absolute_time() {
        let mut e = engine();
        let g = goal();
        e.load(&g, at(8, 0, 0));
        assert!(e.suspend(at(8, 0, 0)).is_some());
        assert_eq!(e.state(), CountdownState::Suspended);
        assert!(e.tick(Some(&g), at(8, 10, 0)).is_none());

        e.load(&g, at(8, 50, 0));
        assert_eq!(e.remaining_secs(), 600);
        assert_eq!(e.state(), CountdownState::Running);
    }

    #[test]
    fn resolved_goal_loads_as_completed() {
        let mut e = engine();
        let mut g = goal();
        g.status = GoalStatus::Failed;
        assert!(e.load(&g, at(8, 0, 0)).is_none());
        assert_eq!(e.state(), CountdownState::Completed);
    }

    #[test]
    fn nearest_upcoming_picks_next_deadline_today() {
        let calc = engine().calculator;
        let make = |id: &str, date: &str, time: &str| {
            Goal::from_draft(
                GoalId::new(id),
                GoalDraft {
                    title: id.into(),
                    date: date.into(),
                    time: time.into(),
                    ..Default::default()
                },
                "07:00".into(),
            )
        };
        let mut done = make("done", "2025-06-01", "08:45");
        done.status = GoalStatus::Completed;
        let goals = vec![
            make("late", "2025-06-01", "18:00"),
            make("past", "2025-06-01", "08:00"),
            make("tomorrow", "2025-06-02", "08:40"),
            done,
            make("next", "2025-06-01", "09:00"),
        ];
        let next = nearest_upcoming(&goals, &calc, at(8, 30, 0)).unwrap();
        assert_eq!(next.id, GoalId::new("next"));
        assert!(nearest_upcoming(&goals, &calc, at(18, 0, 0)).is_none());
    }

    #[test]
    fn expired_while_away_completes_on_first_tick() {
        let mut e = engine();
        let g = goal();
        e.load(&g, at(9, 0, 0) + Duration::hours(3));
        assert_eq!(e.remaining_secs(), 0);
        assert!(matches!(
            e.tick(Some(&g), at(12, 0, 1)),
            Some(Event::CountdownCompleted { .. })
        ));
    }
}
