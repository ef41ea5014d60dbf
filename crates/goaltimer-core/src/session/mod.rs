//! Goal session: the controller a host application owns.
//!
//! Wires the goal repository, the notification scheduler, the completion
//! arbiter and the countdown engine to one clock and one configuration.
//! Every user action goes through here so the side effects that belong
//! together (save, reschedule, episode reset) always happen together.
//!
//! Operations return the [`Event`]s they produced. Storage write failures
//! never fail an operation; they show up as [`Event::StorageWarning`] and
//! the in-memory collection stays authoritative.

mod driver;

pub use driver::{run_countdown, CountdownExit};

use std::sync::{Arc, Mutex};

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, info};

use crate::arbiter::{Arbitration, CompletionArbiter, CompletionPrompt, PromptChoice, Trigger};
use crate::clock::Clock;
use crate::config::Config;
use crate::countdown::{nearest_upcoming, CountdownEngine, CountdownSnapshot, CountdownState};
use crate::deadline::{format_ongoing, parse_date, DeadlineCalculator};
use crate::error::{StorageError, ValidationError};
use crate::events::Event;
use crate::goal::{ConstraintStatus, FocusGoal, Goal, GoalDraft, GoalEdit, GoalId, GoalStatus};
use crate::notify::{
    NotificationBackend, NotificationKind, NotificationScheduler, ScheduleOutcome, TapResponse,
};
use crate::stats::{GoalStats, RangeStats};
use crate::store::{GoalRepository, GoalStore};

/// A session shared between a UI thread and background tasks.
pub type SharedSession = Arc<Mutex<GoalSession>>;

/// Value of an operation plus the events it produced, in order.
#[derive(Debug)]
pub struct Outcome<T> {
    pub value: T,
    pub events: Vec<Event>,
}

impl<T> Outcome<T> {
    fn new(value: T, events: Vec<Event>) -> Self {
        Self { value, events }
    }
}

pub struct GoalSession {
    repo: GoalRepository,
    notifier: NotificationScheduler,
    arbiter: CompletionArbiter,
    countdown: CountdownEngine,
    calculator: DeadlineCalculator,
    clock: Box<dyn Clock>,
    config: Config,
}

impl GoalSession {
    pub fn new(
        store: Box<dyn GoalStore>,
        backend: Box<dyn NotificationBackend>,
        clock: Box<dyn Clock>,
        config: Config,
    ) -> Self {
        let calculator = config.calculator();
        let repo = GoalRepository::load(store, config.retry_policy());
        let notifier = NotificationScheduler::new(backend, calculator)
            .with_min_lead_secs(config.notifications.min_lead_secs)
            .with_warning_lead_secs(config.notifications.warning_lead_secs)
            .with_enabled(config.notifications.enabled);
        info!(
            goals = repo.goals().len(),
            utc_offset_secs = calculator.zone().offset_secs(clock.now()),
            "goal session started"
        );
        Self {
            repo,
            notifier,
            arbiter: CompletionArbiter::new(),
            countdown: CountdownEngine::new(calculator),
            calculator,
            clock,
            config,
        }
    }

    pub fn into_shared(self) -> SharedSession {
        Arc::new(Mutex::new(self))
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Local calendar date at the current instant.
    pub fn today(&self) -> NaiveDate {
        self.calculator.zone().to_local(self.now()).date()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn calculator(&self) -> &DeadlineCalculator {
        &self.calculator
    }

    pub fn goals(&self) -> &[Goal] {
        self.repo.goals()
    }

    pub fn goal(&self, id: &GoalId) -> Option<&Goal> {
        self.repo.get(id)
    }

    /// Goals dated `date`, in creation order.
    pub fn goals_on(&self, date: NaiveDate) -> Vec<&Goal> {
        let mut goals: Vec<&Goal> = self
            .repo
            .goals()
            .iter()
            .filter(|g| parse_date(&g.date) == Some(date))
            .collect();
        goals.sort_by(|a, b| a.id.cmp(&b.id));
        goals
    }

    pub fn remaining_seconds(&self, id: &GoalId) -> Option<u64> {
        let goal = self.repo.get(id)?;
        Some(self.calculator.remaining_seconds(goal, self.now()))
    }

    pub fn nearest_upcoming(&self) -> Option<&Goal> {
        nearest_upcoming(self.repo.goals(), &self.calculator, self.now())
    }

    /// `"<title>: H:MM left"` for the goal due next today.
    pub fn ongoing_status(&self) -> Option<String> {
        let now = self.now();
        let goal = self.nearest_upcoming()?;
        let remaining = self.calculator.remaining_seconds(goal, now);
        Some(format!("{}: {} left", goal.title, format_ongoing(remaining)))
    }

    pub fn stats(&self) -> GoalStats {
        GoalStats::compute(self.repo.goals(), self.today())
    }

    /// Range statistics for the `days` days ending today.
    pub fn stats_for_last_days(&self, days: u32) -> RangeStats {
        RangeStats::last_days(self.repo.goals(), self.today(), days)
    }

    pub fn countdown_state(&self) -> CountdownState {
        self.countdown.state()
    }

    pub fn countdown_snapshot(&self) -> Option<CountdownSnapshot> {
        self.countdown.snapshot(self.now())
    }

    pub fn has_open_prompt(&self, id: &GoalId) -> bool {
        self.arbiter.has_open_prompt(id)
    }

    // ── Goal records ─────────────────────────────────────────────────

    /// Save a new goal and schedule its deadline notification.
    pub fn create_goal(&mut self, draft: GoalDraft) -> Result<Outcome<Goal>, ValidationError> {
        draft.validate()?;
        let now = self.now();
        let created_at = self.calculator.zone().to_local(now).format("%H:%M").to_string();
        let goal = Goal::from_draft(self.fresh_id(now), draft, created_at);

        let ((), written) = self.repo.mutate(|goals| goals.push(goal.clone()));
        info!(goal_id = %goal.id, date = %goal.date, time = %goal.time, "goal created");

        let mut events = vec![Event::GoalCreated {
            goal_id: goal.id.clone(),
            at: now,
        }];
        push_storage_warning(&mut events, written, now);
        let outcome = self.notifier.schedule(&goal, now);
        events.push(schedule_event(&goal.id, outcome, now));
        Ok(Outcome::new(goal, events))
    }

    /// Ids restart from the clock in every process, so a goal saved by an
    /// earlier run can already hold the first candidate.
    fn fresh_id(&self, now: DateTime<Utc>) -> GoalId {
        let mut id = GoalId::generate(now);
        while self.repo.get(&id).is_some() {
            debug!(goal_id = %id, "generated id already taken");
            id = GoalId::generate(now);
        }
        id
    }

    /// Apply a partial edit. Moving the deadline starts a new completion
    /// episode and replaces the scheduled notification.
    pub fn edit_goal(&mut self, id: &GoalId, edit: GoalEdit) -> Result<Outcome<Goal>, ValidationError> {
        edit.validate()?;
        self.require(id)?;
        let now = self.now();

        let (edited, written) = self.repo.mutate(|goals| {
            let goal = goals.iter_mut().find(|g| &g.id == id)?;
            let moved = edit.apply(goal);
            if moved {
                goal.start_new_episode();
            }
            Some((goal.clone(), moved))
        });
        let (goal, moved) = edited.ok_or_else(|| ValidationError::GoalNotFound(id.clone()))?;
        info!(goal_id = %id, deadline_changed = moved, "goal edited");

        let mut events = vec![Event::GoalEdited {
            goal_id: id.clone(),
            deadline_changed: moved,
            at: now,
        }];
        push_storage_warning(&mut events, written, now);
        if moved {
            self.arbiter.forget(id);
            if self.notifier.cancel(id) {
                events.push(Event::NotificationCancelled {
                    goal_id: id.clone(),
                    at: now,
                });
            }
            let outcome = self.notifier.schedule(&goal, now);
            events.push(schedule_event(id, outcome, now));
        }
        Ok(Outcome::new(goal, events))
    }

    /// Manual status override, from any status to any status.
    ///
    /// Starts a new completion episode. Resolving before the deadline
    /// cancels the scheduled notification; re-opening to pending re-arms
    /// it when the deadline is still ahead.
    pub fn set_status(&mut self, id: &GoalId, status: GoalStatus) -> Result<Outcome<Goal>, ValidationError> {
        let from = self.require(id)?.status;
        let now = self.now();
        if from == status {
            let goal = self.require(id)?.clone();
            return Ok(Outcome::new(goal, Vec::new()));
        }

        let (updated, written) = self.repo.mutate(|goals| {
            let goal = goals.iter_mut().find(|g| &g.id == id)?;
            goal.status = status;
            if status == GoalStatus::Pending {
                goal.constraint_status = None;
            }
            goal.start_new_episode();
            Some(goal.clone())
        });
        let goal = updated.ok_or_else(|| ValidationError::GoalNotFound(id.clone()))?;
        self.arbiter.forget(id);
        info!(goal_id = %id, from = from.as_str(), to = status.as_str(), "status set manually");

        let mut events = vec![Event::StatusChanged {
            goal_id: id.clone(),
            from,
            to: status,
            at: now,
        }];
        push_storage_warning(&mut events, written, now);

        let before_deadline = !self.calculator.is_due(&goal, now);
        if status == GoalStatus::Pending {
            if before_deadline {
                let outcome = self.notifier.reschedule(&goal, now);
                events.push(schedule_event(id, outcome, now));
            }
        } else if before_deadline && self.notifier.cancel(id) {
            events.push(Event::NotificationCancelled {
                goal_id: id.clone(),
                at: now,
            });
        }
        Ok(Outcome::new(goal, events))
    }

    /// Record whether the reward or penalty of a resolved goal was honored.
    pub fn record_constraint(
        &mut self,
        id: &GoalId,
        constraint_status: ConstraintStatus,
    ) -> Result<Outcome<Goal>, ValidationError> {
        let goal = self.require(id)?;
        if goal.is_pending() {
            return Err(ValidationError::ConstraintNotApplicable {
                id: id.clone(),
                reason: "goal is still pending",
            });
        }
        if !goal.has_consequence() {
            return Err(ValidationError::ConstraintNotApplicable {
                id: id.clone(),
                reason: "goal has no reward or penalty",
            });
        }

        let now = self.now();
        let (updated, written) = self.repo.mutate(|goals| {
            let goal = goals.iter_mut().find(|g| &g.id == id)?;
            goal.constraint_status = Some(constraint_status);
            Some(goal.clone())
        });
        let goal = updated.ok_or_else(|| ValidationError::GoalNotFound(id.clone()))?;
        debug!(goal_id = %id, ?constraint_status, "constraint outcome recorded");

        let mut events = vec![Event::ConstraintRecorded {
            goal_id: id.clone(),
            constraint_status,
            at: now,
        }];
        push_storage_warning(&mut events, written, now);
        Ok(Outcome::new(goal, events))
    }

    /// Remove a goal and whatever notification is registered for it.
    pub fn delete_goal(&mut self, id: &GoalId) -> Result<Outcome<()>, ValidationError> {
        self.require(id)?;
        let now = self.now();
        let ((), written) = self.repo.mutate(|goals| goals.retain(|g| &g.id != id));
        self.arbiter.forget(id);
        info!(goal_id = %id, "goal deleted");

        let mut events = vec![Event::GoalDeleted {
            goal_id: id.clone(),
            at: now,
        }];
        push_storage_warning(&mut events, written, now);
        if self.notifier.cancel(id) {
            events.push(Event::NotificationCancelled {
                goal_id: id.clone(),
                at: now,
            });
        }
        Ok(Outcome::new((), events))
    }

    // ── Completion ───────────────────────────────────────────────────

    /// Report that `id`'s deadline was reached. Returns the prompt to show,
    /// or `None` when the report was a no-op.
    pub fn notify_deadline_reached(&mut self, id: &GoalId, trigger: Trigger) -> Outcome<Option<CompletionPrompt>> {
        let now = self.now();
        let arbitrated = self
            .arbiter
            .notify_deadline_reached(&mut self.repo, &mut self.notifier, id, trigger, now);

        let mut events = Vec::new();
        push_storage_warning(&mut events, arbitrated.storage_error.map_or(Ok(()), Err), now);
        let prompt = match arbitrated.value {
            Arbitration::Prompt(prompt) => {
                events.insert(
                    0,
                    Event::PromptPresented {
                        goal_id: prompt.goal_id.clone(),
                        episode: prompt.episode,
                        trigger,
                        at: now,
                    },
                );
                Some(prompt)
            }
            Arbitration::NoOp(reason) => {
                debug!(goal_id = %id, ?trigger, ?reason, "deadline report ignored");
                None
            }
        };
        Outcome::new(prompt, events)
    }

    /// The user tapped a delivered notification. Only the deadline
    /// notification leads to a prompt; the warning just opens the app.
    pub fn handle_tap(&mut self, tap: TapResponse) -> Outcome<Option<CompletionPrompt>> {
        if tap.kind == NotificationKind::Warning {
            debug!(goal_id = %tap.goal_id, "warning tapped; nothing to arbitrate");
            return Outcome::new(None, Vec::new());
        }
        self.notify_deadline_reached(&tap.goal_id, Trigger::NotificationTap)
    }

    /// Apply the user's answer to a prompt.
    pub fn resolve_prompt(
        &mut self,
        prompt: CompletionPrompt,
        choice: PromptChoice,
    ) -> Result<Outcome<Goal>, ValidationError> {
        let now = self.now();
        let resolved = self.arbiter.resolve(&mut self.repo, prompt, choice)?;
        let goal = resolved.value;

        let mut events = vec![Event::StatusChanged {
            goal_id: goal.id.clone(),
            from: GoalStatus::Pending,
            to: goal.status,
            at: now,
        }];
        push_storage_warning(&mut events, resolved.storage_error.map_or(Ok(()), Err), now);
        Ok(Outcome::new(goal, events))
    }

    /// Close a prompt without choosing. The goal stays pending and is not
    /// prompted again this episode.
    pub fn dismiss_prompt(&mut self, prompt: CompletionPrompt) {
        self.arbiter.dismiss(prompt);
    }

    /// Start-up sweep: prompt once for every pending goal whose deadline
    /// passed while the app was closed and that was never prompted in its
    /// current episode. Does nothing when `prompt.reprompt_on_launch` is off.
    pub fn catch_up(&mut self) -> Outcome<Vec<CompletionPrompt>> {
        if !self.config.prompt.reprompt_on_launch {
            return Outcome::new(Vec::new(), Vec::new());
        }
        let now = self.now();
        let expired: Vec<GoalId> = self
            .repo
            .goals()
            .iter()
            .filter(|g| g.is_pending() && !g.is_prompted() && self.calculator.is_due(g, now))
            .map(|g| g.id.clone())
            .collect();
        if !expired.is_empty() {
            info!(count = expired.len(), "expired goals found at launch");
        }

        let mut prompts = Vec::new();
        let mut events = Vec::new();
        for id in expired {
            let outcome = self.notify_deadline_reached(&id, Trigger::Launch);
            events.extend(outcome.events);
            prompts.extend(outcome.value);
        }
        Outcome::new(prompts, events)
    }

    /// Re-register notifications for pending goals whose deadline is
    /// still ahead. Requests are keyed by goal id, so this is idempotent.
    pub fn rearm_notifications(&mut self) -> Outcome<usize> {
        let now = self.now();
        let upcoming: Vec<Goal> = self
            .repo
            .goals()
            .iter()
            .filter(|g| g.is_pending() && !self.calculator.is_due(g, now))
            .cloned()
            .collect();

        let mut scheduled = 0;
        let mut events = Vec::with_capacity(upcoming.len());
        for goal in &upcoming {
            let outcome = self.notifier.schedule(goal, now);
            if matches!(outcome, ScheduleOutcome::Scheduled { .. }) {
                scheduled += 1;
            }
            events.push(schedule_event(&goal.id, outcome, now));
        }
        Outcome::new(scheduled, events)
    }

    // ── Countdown ────────────────────────────────────────────────────

    /// Put a goal on the countdown screen.
    pub fn open_countdown(&mut self, id: &GoalId) -> Result<Outcome<Option<CountdownSnapshot>>, ValidationError> {
        let goal = self.require(id)?.clone();
        let now = self.now();
        let events = self.countdown.load(&goal, now).into_iter().collect();
        Ok(Outcome::new(self.countdown.snapshot(now), events))
    }

    /// Advance the countdown. When it reaches zero the deadline is handed
    /// to the arbiter, and the resulting prompt (if any) is returned.
    pub fn tick_countdown(&mut self) -> Outcome<Option<CompletionPrompt>> {
        let now = self.now();
        let current = self
            .countdown
            .goal_id()
            .and_then(|id| self.repo.get(id))
            .cloned();
        let Some(event) = self.countdown.tick(current.as_ref(), now) else {
            return Outcome::new(None, Vec::new());
        };

        let completed = match &event {
            Event::CountdownCompleted { goal_id, .. } => Some(goal_id.clone()),
            _ => None,
        };
        let mut events = vec![event];
        let mut prompt = None;
        if let Some(goal_id) = completed {
            let outcome = self.notify_deadline_reached(&goal_id, Trigger::Tick);
            events.extend(outcome.events);
            prompt = outcome.value;
        }
        Outcome::new(prompt, events)
    }

    /// Leave the countdown screen. The scheduled notification is kept.
    pub fn close_countdown(&mut self) -> Outcome<()> {
        let events = self.countdown.suspend(self.now()).into_iter().collect();
        Outcome::new((), events)
    }

    // ── Side records ─────────────────────────────────────────────────

    pub fn focus_goal(&self) -> Result<Option<FocusGoal>, StorageError> {
        self.repo.focus_goal()
    }

    pub fn set_focus_goal(&mut self, focus: FocusGoal) -> crate::Result<FocusGoal> {
        if focus.title.trim().is_empty() {
            return Err(ValidationError::MissingField("title").into());
        }
        if parse_date(&focus.target_date).is_none() {
            return Err(ValidationError::InvalidDate(focus.target_date).into());
        }
        if let Some(start) = &focus.start_date {
            if parse_date(start).is_none() {
                return Err(ValidationError::InvalidDate(start.clone()).into());
            }
        }
        self.repo.save_focus_goal(&focus)?;
        Ok(focus)
    }

    pub fn clear_focus_goal(&mut self) -> Result<(), StorageError> {
        self.repo.clear_focus_goal()
    }

    pub fn onboarding_seen(&self) -> Result<bool, StorageError> {
        self.repo.onboarding_seen()
    }

    pub fn mark_onboarding_seen(&mut self) -> Result<(), StorageError> {
        self.repo.mark_onboarding_seen()
    }

    fn require(&self, id: &GoalId) -> Result<&Goal, ValidationError> {
        self.repo
            .get(id)
            .ok_or_else(|| ValidationError::GoalNotFound(id.clone()))
    }
}

fn push_storage_warning(events: &mut Vec<Event>, written: Result<(), StorageError>, at: DateTime<Utc>) {
    if let Err(e) = written {
        events.push(Event::StorageWarning {
            message: format!("changes kept in memory only: {e}"),
            at,
        });
    }
}

fn schedule_event(goal_id: &GoalId, outcome: ScheduleOutcome, at: DateTime<Utc>) -> Event {
    match outcome {
        ScheduleOutcome::Scheduled { fires_at, warning_at } => Event::NotificationScheduled {
            goal_id: goal_id.clone(),
            fires_at,
            warning_at,
            at,
        },
        ScheduleOutcome::Skipped { reason } => Event::NotificationSkipped {
            goal_id: goal_id.clone(),
            reason,
            at,
        },
        ScheduleOutcome::Failed { reason } => Event::NotificationSkipped {
            goal_id: goal_id.clone(),
            reason: format!("scheduling failed: {reason}"),
            at,
        },
    }
}
