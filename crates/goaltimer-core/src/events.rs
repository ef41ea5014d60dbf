use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::arbiter::Trigger;
use crate::countdown::{CountdownSnapshot, CountdownState};
use crate::goal::{ConstraintStatus, GoalId, GoalStatus};

/// Every state change in the system produces an Event.
/// Hosts render them; the CLI prints them as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    GoalCreated {
        goal_id: GoalId,
        at: DateTime<Utc>,
    },
    GoalEdited {
        goal_id: GoalId,
        deadline_changed: bool,
        at: DateTime<Utc>,
    },
    GoalDeleted {
        goal_id: GoalId,
        at: DateTime<Utc>,
    },
    StatusChanged {
        goal_id: GoalId,
        from: GoalStatus,
        to: GoalStatus,
        at: DateTime<Utc>,
    },
    ConstraintRecorded {
        goal_id: GoalId,
        constraint_status: ConstraintStatus,
        at: DateTime<Utc>,
    },
    CountdownStarted {
        goal_id: GoalId,
        remaining_secs: u64,
        total_secs: u64,
        at: DateTime<Utc>,
    },
    CountdownTick {
        snapshot: CountdownSnapshot,
    },
    CountdownCompleted {
        goal_id: GoalId,
        at: DateTime<Utc>,
    },
    /// Countdown left the screen; the scheduled notification is untouched.
    CountdownSuspended {
        goal_id: GoalId,
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    /// Countdown gave up (goal vanished or resolved mid-run).
    CountdownStopped {
        goal_id: Option<GoalId>,
        state: CountdownState,
        at: DateTime<Utc>,
    },
    PromptPresented {
        goal_id: GoalId,
        episode: u32,
        trigger: Trigger,
        at: DateTime<Utc>,
    },
    NotificationScheduled {
        goal_id: GoalId,
        fires_at: DateTime<Utc>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        warning_at: Option<DateTime<Utc>>,
        at: DateTime<Utc>,
    },
    NotificationSkipped {
        goal_id: GoalId,
        reason: String,
        at: DateTime<Utc>,
    },
    NotificationCancelled {
        goal_id: GoalId,
        at: DateTime<Utc>,
    },
    /// A write to the goal store failed after all retries; in-memory state
    /// stays authoritative for the session.
    StorageWarning {
        message: String,
        at: DateTime<Utc>,
    },
}
