//! Deadline notifications.
//!
//! The OS owns delivery. [`NotificationBackend`] is the seam to it;
//! [`NotificationScheduler`] decides what to ask the backend for and keeps
//! the one-notification-per-goal invariant. Requests are keyed by goal id
//! and [`NotificationKind`], so a later schedule for the same goal replaces
//! the earlier one even across process restarts.
//!
//! Besides the deadline notification a goal may carry a warning a few
//! minutes ahead of it. The warning is scheduled and cancelled together
//! with the deadline notification and never opens the completion prompt.

mod memory;
mod queue;

pub use memory::MemoryNotificationBackend;
pub use queue::{QueuedNotification, SqliteNotificationQueue};

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::deadline::DeadlineCalculator;
use crate::error::NotificationError;
use crate::goal::{Goal, GoalId};

/// Minimum lead time for a schedule request to be worth making.
pub const DEFAULT_MIN_LEAD_SECS: u64 = 5;

/// How long before the deadline the warning fires.
pub const DEFAULT_WARNING_LEAD_SECS: u64 = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// Fires at the deadline; tapping it reports the deadline reached.
    #[default]
    Deadline,
    /// Fires shortly before the deadline.
    Warning,
}

impl NotificationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            NotificationKind::Deadline => "deadline",
            NotificationKind::Warning => "warning",
        }
    }
}

impl std::str::FromStr for NotificationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "deadline" => Ok(NotificationKind::Deadline),
            "warning" => Ok(NotificationKind::Warning),
            other => Err(format!("unknown notification kind: {other}")),
        }
    }
}

/// Data carried by a notification and handed back on tap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPayload {
    pub goal_id: GoalId,
    #[serde(default)]
    pub kind: NotificationKind,
}

impl NotificationPayload {
    pub fn deadline(goal_id: GoalId) -> Self {
        Self {
            goal_id,
            kind: NotificationKind::Deadline,
        }
    }

    pub fn warning(goal_id: GoalId) -> Self {
        Self {
            goal_id,
            kind: NotificationKind::Warning,
        }
    }
}

/// What the app receives when the user taps a delivered notification.
pub type TapResponse = NotificationPayload;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleRequest {
    pub fires_at: DateTime<Utc>,
    pub title: String,
    pub body: String,
    pub payload: NotificationPayload,
}

impl ScheduleRequest {
    pub fn for_goal(goal: &Goal, fires_at: DateTime<Utc>) -> Self {
        let (title, body) = notification_text(goal);
        Self {
            fires_at,
            title,
            body,
            payload: NotificationPayload::deadline(goal.id.clone()),
        }
    }

    pub fn warning_for(goal: &Goal, fires_at: DateTime<Utc>, lead_secs: u64) -> Self {
        Self {
            fires_at,
            title: format!("{}: {} min left", goal.title, lead_secs.div_ceil(60)),
            body: format!("Deadline at {}.", goal.time),
            payload: NotificationPayload::warning(goal.id.clone()),
        }
    }

    pub fn key(&self) -> (&GoalId, NotificationKind) {
        (&self.payload.goal_id, self.payload.kind)
    }
}

fn notification_text(goal: &Goal) -> (String, String) {
    (
        format!("{}: time to choose the outcome", goal.title),
        "Mark it completed or failed, or set the penalty.".to_string(),
    )
}

/// The OS notification subsystem.
pub trait NotificationBackend: Send {
    /// Ask for permission to notify. Returns whether it was granted.
    fn request_permission(&mut self) -> Result<bool, NotificationError>;

    /// Register a notification keyed by its payload's goal id and kind,
    /// replacing any earlier one with the same key.
    fn schedule(&mut self, request: &ScheduleRequest) -> Result<(), NotificationError>;

    /// Remove every pending notification for `goal_id`, of any kind.
    fn cancel(&mut self, goal_id: &GoalId) -> Result<(), NotificationError>;

    /// Show a notification immediately. `at` is the session's current time.
    fn present_now(
        &mut self,
        goal_id: &GoalId,
        title: &str,
        body: &str,
        at: DateTime<Utc>,
    ) -> Result<(), NotificationError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleOutcome {
    /// The deadline notification is registered; `warning_at` is set when
    /// a warning was registered alongside it.
    Scheduled {
        fires_at: DateTime<Utc>,
        warning_at: Option<DateTime<Utc>>,
    },
    Skipped { reason: String },
    Failed { reason: String },
}

pub struct NotificationScheduler {
    backend: Box<dyn NotificationBackend>,
    calculator: DeadlineCalculator,
    min_lead_secs: u64,
    warning_lead_secs: u64,
    enabled: bool,
    permission: Option<bool>,
    outstanding: HashMap<GoalId, DateTime<Utc>>,
    warnings: HashMap<GoalId, DateTime<Utc>>,
}

impl NotificationScheduler {
    pub fn new(backend: Box<dyn NotificationBackend>, calculator: DeadlineCalculator) -> Self {
        Self {
            backend,
            calculator,
            min_lead_secs: DEFAULT_MIN_LEAD_SECS,
            warning_lead_secs: 0,
            enabled: true,
            permission: None,
            outstanding: HashMap::new(),
            warnings: HashMap::new(),
        }
    }

    /// Also warn `secs` before each deadline. Zero disables the warning.
    pub fn with_warning_lead_secs(mut self, secs: u64) -> Self {
        self.warning_lead_secs = secs;
        self
    }

    pub fn with_min_lead_secs(mut self, secs: u64) -> Self {
        self.min_lead_secs = secs;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Schedule the deadline notification for `goal`.
    ///
    /// Any notification already registered for the goal is replaced.
    /// Nothing here returns an error: failures are logged and reported as
    /// [`ScheduleOutcome::Failed`], leaving the in-app countdown as the
    /// detection path.
    pub fn schedule(&mut self, goal: &Goal, now: DateTime<Utc>) -> ScheduleOutcome {
        if !self.enabled {
            return self.skip(goal, "notifications disabled");
        }
        if !goal.is_pending() {
            return self.skip(goal, "goal already resolved");
        }
        let Some(fires_at) = self.calculator.deadline_instant(goal) else {
            warn!(goal_id = %goal.id, "deadline unresolvable; not scheduling");
            return self.skip(goal, "deadline unresolvable");
        };
        let lead = (fires_at - now).num_seconds();
        if lead < 0 || (lead as u64) < self.min_lead_secs {
            return self.skip(goal, "deadline too close or already passed");
        }
        if !self.ensure_permission() {
            return ScheduleOutcome::Failed {
                reason: NotificationError::PermissionDenied.to_string(),
            };
        }

        let request = ScheduleRequest::for_goal(goal, fires_at);
        match self.backend.schedule(&request) {
            Ok(()) => {
                info!(goal_id = %goal.id, %fires_at, "notification scheduled");
                self.outstanding.insert(goal.id.clone(), fires_at);
                let warning_at = self.schedule_warning(goal, fires_at, now);
                ScheduleOutcome::Scheduled { fires_at, warning_at }
            }
            Err(e) => {
                warn!(goal_id = %goal.id, error = %e, "notification scheduling failed");
                self.outstanding.remove(&goal.id);
                ScheduleOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }

    fn schedule_warning(&mut self, goal: &Goal, deadline: DateTime<Utc>, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.warnings.remove(&goal.id);
        if self.warning_lead_secs == 0 {
            return None;
        }
        let lead = i64::try_from(self.warning_lead_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)?;
        let warn_at = deadline.checked_sub_signed(lead)?;
        if (warn_at - now).num_seconds() < i64::try_from(self.min_lead_secs).unwrap_or(i64::MAX) {
            debug!(goal_id = %goal.id, "warning time already close or passed; not scheduling");
            return None;
        }

        let request = ScheduleRequest::warning_for(goal, warn_at, self.warning_lead_secs);
        match self.backend.schedule(&request) {
            Ok(()) => {
                debug!(goal_id = %goal.id, %warn_at, "warning scheduled");
                self.warnings.insert(goal.id.clone(), warn_at);
                Some(warn_at)
            }
            Err(e) => {
                warn!(goal_id = %goal.id, error = %e, "warning scheduling failed");
                None
            }
        }
    }

    /// Cancel whatever is registered for the goal, then schedule afresh.
    pub fn reschedule(&mut self, goal: &Goal, now: DateTime<Utc>) -> ScheduleOutcome {
        self.cancel(&goal.id);
        self.schedule(goal, now)
    }

    /// Remove any pending notification for the goal, the warning included.
    /// Returns whether this scheduler knew of one.
    pub fn cancel(&mut self, goal_id: &GoalId) -> bool {
        let warned = self.warnings.remove(goal_id).is_some();
        let known = self.outstanding.remove(goal_id).is_some() || warned;
        if let Err(e) = self.backend.cancel(goal_id) {
            warn!(goal_id = %goal_id, error = %e, "notification cancel failed");
        } else if known {
            info!(goal_id = %goal_id, "notification cancelled");
        }
        known
    }

    /// Deliver the completion notification right away and drop the
    /// scheduled one so it does not fire a second time.
    pub fn present_now(&mut self, goal: &Goal, now: DateTime<Utc>) {
        self.cancel(&goal.id);
        if !self.enabled || !self.ensure_permission() {
            return;
        }
        let (title, body) = notification_text(goal);
        if let Err(e) = self.backend.present_now(&goal.id, &title, &body, now) {
            warn!(goal_id = %goal.id, error = %e, "immediate notification failed");
        }
    }

    /// Forget a delivered notification.
    pub fn mark_delivered(&mut self, goal_id: &GoalId) {
        self.outstanding.remove(goal_id);
    }

    pub fn outstanding(&self, goal_id: &GoalId) -> Option<DateTime<Utc>> {
        self.outstanding.get(goal_id).copied()
    }

    pub fn warning(&self, goal_id: &GoalId) -> Option<DateTime<Utc>> {
        self.warnings.get(goal_id).copied()
    }

    pub fn outstanding_count(&self) -> usize {
        self.outstanding.len()
    }

    fn skip(&mut self, goal: &Goal, reason: &str) -> ScheduleOutcome {
        info!(goal_id = %goal.id, reason, "notification not scheduled");
        ScheduleOutcome::Skipped {
            reason: reason.to_string(),
        }
    }

    fn ensure_permission(&mut self) -> bool {
        if let Some(granted) = self.permission {
            return granted;
        }
        let granted = match self.backend.request_permission() {
            Ok(granted) => granted,
            Err(e) => {
                warn!(error = %e, "permission request failed");
                false
            }
        };
        if !granted {
            warn!("notification permission denied; relying on in-app countdown");
        }
        self.permission = Some(granted);
        granted
    }
}
