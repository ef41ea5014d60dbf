//! Completion arbiter.
//!
//! Two independent sources can report that a goal's deadline has been
//! reached: the countdown engine reaching zero, and the user tapping the
//! OS notification. A third, [`Trigger::Launch`], covers goals that
//! expired while the app was closed. All of them funnel into
//! [`CompletionArbiter::notify_deadline_reached`], which presents the
//! completion prompt at most once per completion episode.
//!
//! The "already prompted" flag lives on the goal record
//! (`prompted_episode`). Checking and setting it happens inside one
//! `&mut GoalRepository` borrow, so whichever trigger is handled first
//! wins and every later one is a no-op. Hosts that share a session across
//! threads put it behind a mutex (see [`crate::session::SharedSession`]).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{StorageError, ValidationError};
use crate::goal::{Goal, GoalId, GoalStatus};
use crate::notify::NotificationScheduler;
use crate::store::GoalRepository;

/// What reported the deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    /// The on-screen countdown reached zero.
    Tick,
    /// The user tapped the delivered OS notification.
    NotificationTap,
    /// Start-up sweep found an expired goal that was never prompted.
    Launch,
}

/// The user's answer to the completion prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "choice", rename_all = "snake_case")]
pub enum PromptChoice {
    Completed,
    Failed,
    /// Accept failure and put the penalty in force, optionally setting or
    /// replacing its text.
    Constrain { penalty: Option<String> },
}

impl PromptChoice {
    fn status(&self) -> GoalStatus {
        match self {
            PromptChoice::Completed => GoalStatus::Completed,
            PromptChoice::Failed | PromptChoice::Constrain { .. } => GoalStatus::Failed,
        }
    }
}

/// A completion prompt that has been shown and awaits the user's choice.
///
/// Not `Clone`: resolving consumes it, so one prompt yields
/// at most one status write.
#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct CompletionPrompt {
    pub goal_id: GoalId,
    pub episode: u32,
    pub title: String,
    pub reward: Option<String>,
    pub penalty: Option<String>,
    pub trigger: Trigger,
}

/// Why a trigger did not produce a prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoOpReason {
    UnknownGoal,
    AlreadyResolved,
    AlreadyPrompted,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Arbitration {
    Prompt(CompletionPrompt),
    NoOp(NoOpReason),
}

impl Arbitration {
    pub fn is_prompt(&self) -> bool {
        matches!(self, Arbitration::Prompt(_))
    }
}

/// Result of a call that may have written the goal collection.
#[derive(Debug)]
pub struct Arbitrated<T> {
    pub value: T,
    /// Set when the collection write failed after retries.
    pub storage_error: Option<StorageError>,
}

#[derive(Debug, Default)]
pub struct CompletionArbiter {
    /// Prompts shown in this process and not yet answered, by goal.
    open: HashMap<GoalId, u32>,
}

impl CompletionArbiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle a deadline report for `goal_id`.
    ///
    /// On the first qualifying call for the current episode this marks the
    /// goal prompted (persisted), makes sure an OS notification is showing,
    /// and returns the prompt to present. Every other call is a no-op and
    /// mutates nothing.
    pub fn notify_deadline_reached(
        &mut self,
        repo: &mut GoalRepository,
        notifier: &mut NotificationScheduler,
        goal_id: &GoalId,
        trigger: Trigger,
        now: DateTime<Utc>,
    ) -> Arbitrated<Arbitration> {
        let Some(goal) = repo.get(goal_id) else {
            debug!(goal_id = %goal_id, ?trigger, "deadline reported for unknown goal");
            return no_op(NoOpReason::UnknownGoal);
        };
        if !goal.is_pending() {
            debug!(goal_id = %goal_id, ?trigger, "goal already resolved; ignoring trigger");
            return no_op(NoOpReason::AlreadyResolved);
        }
        if goal.is_prompted() {
            debug!(goal_id = %goal_id, ?trigger, "prompt already shown this episode");
            return no_op(NoOpReason::AlreadyPrompted);
        }

        let ((), written) = repo.mutate(|goals| {
            if let Some(g) = goals.iter_mut().find(|g| &g.id == goal_id) {
                g.mark_prompted();
            }
        });
        let Some(goal) = repo.get(goal_id).cloned() else {
            return no_op(NoOpReason::UnknownGoal);
        };

        match trigger {
            Trigger::NotificationTap => notifier.mark_delivered(goal_id),
            Trigger::Tick | Trigger::Launch => notifier.present_now(&goal, now),
        }

        info!(goal_id = %goal_id, episode = goal.episode, ?trigger, "completion prompt presented");
        self.open.insert(goal.id.clone(), goal.episode);
        Arbitrated {
            value: Arbitration::Prompt(prompt_for(&goal, trigger)),
            storage_error: written.err(),
        }
    }

    /// Apply the user's choice. Writes the new status exactly once.
    ///
    /// Fails with [`ValidationError::StalePrompt`] when the goal has been
    /// resolved, edited or deleted since the prompt was shown.
    pub fn resolve(
        &mut self,
        repo: &mut GoalRepository,
        prompt: CompletionPrompt,
        choice: PromptChoice,
    ) -> Result<Arbitrated<Goal>, ValidationError> {
        let open_episode = self.open.remove(&prompt.goal_id);
        let current = repo
            .get(&prompt.goal_id)
            .ok_or_else(|| ValidationError::GoalNotFound(prompt.goal_id.clone()))?;
        if open_episode != Some(prompt.episode) || !current.is_pending() || current.episode != prompt.episode {
            return Err(ValidationError::StalePrompt(prompt.goal_id));
        }

        let status = choice.status();
        let (updated, written) = repo.mutate(|goals| {
            let g = goals.iter_mut().find(|g| g.id == prompt.goal_id)?;
            g.status = status;
            if let PromptChoice::Constrain { penalty: Some(text) } = &choice {
                if !text.trim().is_empty() {
                    g.penalty = Some(text.trim().to_string());
                }
            }
            Some(g.clone())
        });
        let updated = updated.ok_or_else(|| ValidationError::GoalNotFound(prompt.goal_id.clone()))?;
        info!(goal_id = %updated.id, status = status.as_str(), "completion prompt resolved");
        Ok(Arbitrated {
            value: updated,
            storage_error: written.err(),
        })
    }

    /// The user closed the prompt without choosing. The goal stays pending
    /// and stays marked as prompted for this episode.
    pub fn dismiss(&mut self, prompt: CompletionPrompt) {
        debug!(goal_id = %prompt.goal_id, "completion prompt dismissed");
        self.open.remove(&prompt.goal_id);
    }

    /// Forget any open prompt for a goal whose episode ended by other means
    /// (edit, manual status change, delete).
    pub fn forget(&mut self, goal_id: &GoalId) {
        self.open.remove(goal_id);
    }

    pub fn has_open_prompt(&self, goal_id: &GoalId) -> bool {
        self.open.contains_key(goal_id)
    }
}

fn prompt_for(goal: &Goal, trigger: Trigger) -> CompletionPrompt {
    CompletionPrompt {
        goal_id: goal.id.clone(),
        episode: goal.episode,
        title: goal.title.clone(),
        reward: goal.reward.clone(),
        penalty: goal.penalty.clone(),
        trigger,
    }
}

fn no_op(reason: NoOpReason) -> Arbitrated<Arbitration> {
    Arbitrated {
        value: Arbitration::NoOp(reason),
        storage_error: None,
    }
}
