//! Goal records and the edits that can be applied to them.
//!
//! A goal's `date`/`time` are kept as the raw strings the user entered.
//! They are resolved to an instant only by [`crate::deadline`], at every
//! evaluation, so a record loaded from storage with a missing or garbled
//! field still loads and simply reads as expired.

use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::deadline::{parse_date, parse_time};
use crate::error::ValidationError;

static LAST_ID_MS: AtomicI64 = AtomicI64::new(0);

/// Opaque goal identifier.
///
/// Generated from the creation time in epoch milliseconds and bumped so
/// ids handed out by one process are strictly increasing. Ids of equal
/// length therefore sort by creation order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GoalId(String);

impl GoalId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Allocate a fresh id for a goal created at `now`.
    pub fn generate(now: DateTime<Utc>) -> Self {
        let candidate = now.timestamp_millis();
        let mut last = LAST_ID_MS.load(Ordering::Relaxed);
        loop {
            let next = candidate.max(last + 1);
            match LAST_ID_MS.compare_exchange_weak(last, next, Ordering::SeqCst, Ordering::Relaxed) {
                Ok(_) => return Self(next.to_string()),
                Err(actual) => last = actual,
            }
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GoalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for GoalId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum GoalStatus {
    #[default]
    Pending,
    Completed,
    /// Older records mark a goal whose penalty was put in force as
    /// `constrained`.
    #[serde(alias = "constrained")]
    Failed,
}

impl GoalStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            GoalStatus::Pending => "pending",
            GoalStatus::Completed => "completed",
            GoalStatus::Failed => "failed",
        }
    }
}

impl std::str::FromStr for GoalStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(GoalStatus::Pending),
            "completed" | "done" => Ok(GoalStatus::Completed),
            "failed" | "constrained" => Ok(GoalStatus::Failed),
            other => Err(format!("unknown status: {other}")),
        }
    }
}

/// Whether the reward or penalty attached to a resolved goal was honored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConstraintStatus {
    #[serde(alias = "completed")]
    Kept,
    #[serde(alias = "failed")]
    Broken,
}

impl std::str::FromStr for ConstraintStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "kept" | "completed" => Ok(ConstraintStatus::Kept),
            "broken" | "failed" => Ok(ConstraintStatus::Broken),
            other => Err(format!("unknown constraint status: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Goal {
    pub id: GoalId,
    #[serde(alias = "goal")]
    pub title: String,
    /// Local calendar date, `YYYY-MM-DD`.
    #[serde(default)]
    pub date: String,
    /// Local wall-clock time, `HH:MM`.
    #[serde(default)]
    pub time: String,
    /// Local wall-clock time the goal was saved, `HH:MM`.
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub reward: Option<String>,
    #[serde(default)]
    pub penalty: Option<String>,
    #[serde(default)]
    pub status: GoalStatus,
    #[serde(default)]
    pub constraint_status: Option<ConstraintStatus>,
    /// Completion episode counter. Bumped whenever the deadline moves or
    /// the status is changed by hand.
    #[serde(default)]
    pub episode: u32,
    /// Episode in which the completion prompt was last shown.
    #[serde(default)]
    pub prompted_episode: Option<u32>,
}

impl Goal {
    /// Build a pending goal from a validated draft.
    pub fn from_draft(id: GoalId, draft: GoalDraft, created_at: String) -> Self {
        Self {
            id,
            title: draft.title.trim().to_string(),
            date: draft.date,
            time: draft.time,
            created_at: Some(created_at),
            reward: non_blank(draft.reward),
            penalty: non_blank(draft.penalty),
            status: GoalStatus::Pending,
            constraint_status: None,
            episode: 0,
            prompted_episode: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == GoalStatus::Pending
    }

    /// True once the completion prompt has been shown in the current episode.
    pub fn is_prompted(&self) -> bool {
        self.prompted_episode == Some(self.episode)
    }

    pub fn mark_prompted(&mut self) {
        self.prompted_episode = Some(self.episode);
    }

    /// Start a fresh completion episode, clearing the prompted flag.
    pub fn start_new_episode(&mut self) {
        self.episode = self.episode.wrapping_add(1);
        self.prompted_episode = None;
    }

    /// Whether a reward or penalty is attached.
    pub fn has_consequence(&self) -> bool {
        is_filled(&self.reward) || is_filled(&self.penalty)
    }
}

/// User input for a new goal.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GoalDraft {
    pub title: String,
    pub date: String,
    pub time: String,
    #[serde(default)]
    pub reward: Option<String>,
    #[serde(default)]
    pub penalty: Option<String>,
}

impl GoalDraft {
    /// Check the required fields. Title, date and time must be present and
    /// well formed.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::MissingField("title"));
        }
        validate_date(&self.date)?;
        validate_time(&self.time)?;
        Ok(())
    }
}

/// A partial update to an existing goal.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GoalEdit {
    pub title: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub reward: Option<String>,
    pub penalty: Option<String>,
}

impl GoalEdit {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(title) = &self.title {
            if title.trim().is_empty() {
                return Err(ValidationError::MissingField("title"));
            }
        }
        if let Some(date) = &self.date {
            validate_date(date)?;
        }
        if let Some(time) = &self.time {
            validate_time(time)?;
        }
        Ok(())
    }

    /// Apply the edit. Returns `true` when the deadline moved.
    pub fn apply(self, goal: &mut Goal) -> bool {
        let old_deadline = (goal.date.clone(), goal.time.clone());
        if let Some(title) = self.title {
            goal.title = title.trim().to_string();
        }
        if let Some(date) = self.date {
            goal.date = date;
        }
        if let Some(time) = self.time {
            goal.time = time;
        }
        if let Some(reward) = self.reward {
            goal.reward = non_blank(Some(reward));
        }
        if let Some(penalty) = self.penalty {
            goal.penalty = non_blank(Some(penalty));
        }
        old_deadline != (goal.date.clone(), goal.time.clone())
    }
}

/// Long-term goal shown alongside the daily goals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FocusGoal {
    pub title: String,
    #[serde(default)]
    pub start_date: Option<String>,
    pub target_date: String,
}

impl FocusGoal {
    /// Whole days from `today` until the target date. Negative once the
    /// target has passed, `None` when the target date is malformed.
    pub fn days_remaining(&self, today: NaiveDate) -> Option<i64> {
        let target = parse_date(&self.target_date)?;
        Some((target - today).num_days())
    }
}

fn validate_date(date: &str) -> Result<(), ValidationError> {
    if date.trim().is_empty() {
        return Err(ValidationError::MissingField("date"));
    }
    parse_date(date)
        .map(|_| ())
        .ok_or_else(|| ValidationError::InvalidDate(date.to_string()))
}

fn validate_time(time: &str) -> Result<(), ValidationError> {
    if time.trim().is_empty() {
        return Err(ValidationError::MissingField("time"));
    }
    parse_time(time)
        .map(|_| ())
        .ok_or_else(|| ValidationError::InvalidTime(time.to_string()))
}

fn is_filled(text: &Option<String>) -> bool {
    text.as_deref().is_some_and(|t| !t.trim().is_empty())
}

fn non_blank(text: Option<String>) -> Option<String> {
    text.filter(|t| !t.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn draft() -> GoalDraft {
        GoalDraft {
            title: "Run 5k".into(),
            date: "2025-06-01".into(),
            time: "09:00".into(),
            reward: Some("Pancakes".into()),
            penalty: Some("   ".into()),
        }
    }

    #[test]
    fn ids_are_strictly_increasing() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap();
        let a = GoalId::generate(now);
        let b = GoalId::generate(now);
        assert!(b > a);
    }

    #[test]
    fn draft_requires_title_date_time() {
        let mut d = draft();
        d.title = "  ".into();
        assert_eq!(d.validate(), Err(ValidationError::MissingField("title")));

        let mut d = draft();
        d.time = String::new();
        assert_eq!(d.validate(), Err(ValidationError::MissingField("time")));

        let mut d = draft();
        d.date = "2025-13-01".into();
        assert!(matches!(d.validate(), Err(ValidationError::InvalidDate(_))));

        assert!(draft().validate().is_ok());
    }

    #[test]
    fn blank_penalty_is_dropped() {
        let goal = Goal::from_draft(GoalId::new("1"), draft(), "08:00".into());
        assert_eq!(goal.penalty, None);
        assert!(goal.has_consequence());
        assert_eq!(goal.status, GoalStatus::Pending);
    }

    #[test]
    fn edit_reports_deadline_change() {
        let mut goal = Goal::from_draft(GoalId::new("1"), draft(), "08:00".into());
        let moved = GoalEdit {
            title: Some("Run 10k".into()),
            ..Default::default()
        }
        .apply(&mut goal);
        assert!(!moved);

        let moved = GoalEdit {
            time: Some("10:00".into()),
            ..Default::default()
        }
        .apply(&mut goal);
        assert!(moved);
        assert_eq!(goal.time, "10:00");
    }

    #[test]
    fn new_episode_clears_prompted_flag() {
        let mut goal = Goal::from_draft(GoalId::new("1"), draft(), "08:00".into());
        goal.mark_prompted();
        assert!(goal.is_prompted());
        goal.start_new_episode();
        assert!(!goal.is_prompted());
        assert_eq!(goal.episode, 1);
    }

    #[test]
    fn legacy_records_deserialize() {
        let json = r#"{"id":"1717200000000","title":"Read","date":"2025-06-01",
            "status":"failed","constraintStatus":"completed"}"#;
        let goal: Goal = serde_json::from_str(json).unwrap();
        assert_eq!(goal.time, "");
        assert_eq!(goal.constraint_status, Some(ConstraintStatus::Kept));
        assert_eq!(goal.episode, 0);
    }

    #[test]
    fn constrained_status_reads_as_failed() {
        let json = r#"[{"id":"1","goal":"Run","date":"2025-06-01","time":"09:00","status":"completed"},
            {"id":"2","goal":"Swim","date":"2025-06-01","time":"10:00","status":"constrained"}]"#;
        let goals: Vec<Goal> = serde_json::from_str(json).unwrap();
        assert_eq!(goals.len(), 2);
        assert_eq!(goals[1].title, "Swim");
        assert_eq!(goals[1].status, GoalStatus::Failed);
        assert_eq!("constrained".parse::<GoalStatus>(), Ok(GoalStatus::Failed));
    }

    #[test]
    fn focus_goal_days_remaining() {
        let focus = FocusGoal {
            title: "Marathon".into(),
            start_date: None,
            target_date: "2025-06-11".into(),
        };
        let today = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        assert_eq!(focus.days_remaining(today), Some(10));
    }
}
