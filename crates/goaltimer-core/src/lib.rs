//! # Goaltimer Core Library
//!
//! Core logic for Goaltimer, a personal goal-accountability timer. The user
//! declares a goal with a deadline and an optional reward or penalty; when
//! the deadline arrives they are asked, exactly once, whether they made it.
//!
//! The library owns every rule. Hosts (the bundled CLI, or a GUI) only
//! supply a clock, a goal store and a notification backend.
//!
//! ## Architecture
//!
//! - **Deadline Calculator**: local date/time to instant, remaining time,
//!   progress. Malformed data reads as expired, never as an error
//! - **Countdown Engine**: wall-clock state machine; the caller invokes
//!   `tick()` (or runs [`run_countdown`])
//! - **Completion Arbiter**: exactly-once guard between "deadline reached"
//!   and the completion prompt
//! - **Notification Scheduler**: one OS notification per goal, keyed by id,
//!   plus an optional warning shortly before the deadline
//! - **Storage**: SQLite key/value store for the goal collection and
//!   TOML-based configuration
//!
//! ## Key Components
//!
//! - [`GoalSession`]: the controller a host owns
//! - [`CompletionArbiter`]: trigger deduplication
//! - [`CountdownEngine`]: countdown state machine
//! - [`Config`]: application configuration

pub mod arbiter;
pub mod clock;
pub mod config;
pub mod countdown;
pub mod deadline;
pub mod error;
pub mod events;
pub mod goal;
pub mod notify;
pub mod session;
pub mod stats;
pub mod store;

pub use arbiter::{Arbitration, CompletionArbiter, CompletionPrompt, NoOpReason, PromptChoice, Trigger};
pub use clock::{Clock, LocalZone, ManualClock, SystemClock};
pub use config::Config;
pub use countdown::{CountdownEngine, CountdownSnapshot, CountdownState};
pub use deadline::DeadlineCalculator;
pub use error::{ConfigError, CoreError, NotificationError, Result, StorageError, ValidationError};
pub use events::Event;
pub use goal::{ConstraintStatus, FocusGoal, Goal, GoalDraft, GoalEdit, GoalId, GoalStatus};
pub use notify::{
    MemoryNotificationBackend, NotificationBackend, NotificationKind, NotificationPayload,
    NotificationScheduler, ScheduleOutcome, SqliteNotificationQueue, TapResponse,
};
pub use session::{run_countdown, CountdownExit, GoalSession, Outcome, SharedSession};
pub use stats::{DayStats, GoalStats, RangeStats, RateBreakdown};
pub use store::{data_dir, GoalRepository, GoalStore, MemoryGoalStore, RetryPolicy, SqliteGoalStore};
