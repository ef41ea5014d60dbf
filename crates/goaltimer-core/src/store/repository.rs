//! In-memory goal collection backed by a [`GoalStore`].
//!
//! The repository's copy is authoritative for the session. Every mutation
//! edits a clone of the collection, swaps it in, then writes the whole
//! collection back with bounded retries. A write that still fails is
//! logged and reported to the caller; the in-memory copy is kept.
//!
//! A stored collection that cannot be decoded is moved to a backup key
//! before anything is written. If it can be neither read nor moved, the
//! session runs without writing the collection at all.

use std::time::Duration;

use tracing::{error, warn};

use super::GoalStore;
use crate::error::StorageError;
use crate::goal::{FocusGoal, Goal, GoalId};

/// Retry schedule for collection writes.
///
/// The backoff sleeps the calling thread. Async callers keep writes off
/// the runtime's worker threads, as [`crate::session::run_countdown`] does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one. Zero is treated as one.
    pub attempts: u32,
    /// Delay before the first retry; doubled for each following retry.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff: Duration::from_millis(50),
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            attempts: 1,
            backoff: Duration::ZERO,
        }
    }
}

pub struct GoalRepository {
    store: Box<dyn GoalStore>,
    goals: Vec<Goal>,
    retry: RetryPolicy,
    /// False when the stored collection is still on disk but unread.
    writable: bool,
}

impl GoalRepository {
    /// Load the collection. A failed read starts the session empty.
    pub fn load(store: Box<dyn GoalStore>, retry: RetryPolicy) -> Self {
        let (goals, writable) = match store.load_goals() {
            Ok(goals) => (goals, true),
            Err(e @ StorageError::Corrupt { .. }) => match store.back_up_goals() {
                Ok(backup) => {
                    error!(error = %e, backup = ?backup, "stored goals unreadable; moved aside");
                    (Vec::new(), true)
                }
                Err(backup_err) => {
                    error!(error = %e, %backup_err, "stored goals unreadable and could not be moved; not writing goals this session");
                    (Vec::new(), false)
                }
            },
            Err(e) => {
                error!(error = %e, "failed to load goals; not writing goals this session");
                (Vec::new(), false)
            }
        };
        Self {
            store,
            goals,
            retry,
            writable,
        }
    }

    /// Whether collection writes reach the store this session.
    pub fn is_writable(&self) -> bool {
        self.writable
    }

    pub fn goals(&self) -> &[Goal] {
        &self.goals
    }

    pub fn get(&self, id: &GoalId) -> Option<&Goal> {
        self.goals.iter().find(|g| &g.id == id)
    }

    /// Apply `f` to a copy of the collection, adopt the result and persist
    /// it in full.
    ///
    /// The returned write result is independent of `f`'s value: the
    /// in-memory collection is updated even when the write fails.
    pub fn mutate<R>(&mut self, f: impl FnOnce(&mut Vec<Goal>) -> R) -> (R, Result<(), StorageError>) {
        let mut next = self.goals.clone();
        let value = f(&mut next);
        if next == self.goals {
            return (value, Ok(()));
        }
        self.goals = next;
        let written = self.write();
        (value, written)
    }

    pub fn focus_goal(&self) -> Result<Option<FocusGoal>, StorageError> {
        self.store.load_focus_goal()
    }

    pub fn save_focus_goal(&self, focus: &FocusGoal) -> Result<(), StorageError> {
        self.store.save_focus_goal(focus)
    }

    pub fn clear_focus_goal(&self) -> Result<(), StorageError> {
        self.store.clear_focus_goal()
    }

    pub fn onboarding_seen(&self) -> Result<bool, StorageError> {
        self.store.onboarding_seen()
    }

    pub fn mark_onboarding_seen(&self) -> Result<(), StorageError> {
        self.store.mark_onboarding_seen()
    }

    fn write(&self) -> Result<(), StorageError> {
        if !self.writable {
            warn!("goal collection was never loaded; keeping changes in memory");
            return Err(StorageError::NotLoaded);
        }
        let attempts = self.retry.attempts.max(1);
        let mut delay = self.retry.backoff;
        let mut attempt = 1;
        loop {
            match self.store.replace_goals(&self.goals) {
                Ok(()) => return Ok(()),
                Err(e) if attempt < attempts => {
                    warn!(attempt, error = %e, "goal write failed; retrying");
                    if !delay.is_zero() {
                        std::thread::sleep(delay);
                    }
                    delay = delay.saturating_mul(2);
                    attempt += 1;
                }
                Err(e) => {
                    error!(attempts, error = %e, "goal write failed; keeping in-memory state");
                    return Err(e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::goal::GoalDraft;
    use crate::store::MemoryGoalStore;

    fn sample(id: &str) -> Goal {
        Goal::from_draft(
            GoalId::new(id),
            GoalDraft {
                title: "Walk".into(),
                date: "2025-06-01".into(),
                time: "09:00".into(),
                ..Default::default()
            },
            "08:00".into(),
        )
    }

    fn no_wait(attempts: u32) -> RetryPolicy {
        RetryPolicy {
            attempts,
            backoff: Duration::ZERO,
        }
    }

    #[test]
    fn mutate_writes_full_collection() {
        let store = MemoryGoalStore::with_goals(vec![sample("1")]);
        let mut repo = GoalRepository::load(Box::new(store.clone()), no_wait(1));
        let (_, written) = repo.mutate(|goals| goals.push(sample("2")));
        assert!(written.is_ok());
        assert_eq!(store.stored_goals().len(), 2);
        assert_eq!(store.write_count(), 1);
    }

    #[test]
    fn unchanged_collection_is_not_written() {
        let store = MemoryGoalStore::with_goals(vec![sample("1")]);
        let mut repo = GoalRepository::load(Box::new(store.clone()), no_wait(1));
        let (found, written) = repo.mutate(|goals| goals.iter().any(|g| g.id == GoalId::new("1")));
        assert!(found);
        assert!(written.is_ok());
        assert_eq!(store.write_count(), 0);
    }

    #[test]
    fn retries_transient_failures() {
        let store = MemoryGoalStore::new();
        store.fail_next_writes(2);
        let mut repo = GoalRepository::load(Box::new(store.clone()), no_wait(3));
        let (_, written) = repo.mutate(|goals| goals.push(sample("1")));
        assert!(written.is_ok());
        assert_eq!(store.stored_goals().len(), 1);
    }

    #[test]
    fn exhausted_retries_keep_memory_authoritative() {
        let store = MemoryGoalStore::new();
        store.fail_next_writes(5);
        let mut repo = GoalRepository::load(Box::new(store.clone()), no_wait(2));
        let (_, written) = repo.mutate(|goals| goals.push(sample("1")));
        assert!(written.is_err());
        assert_eq!(repo.goals().len(), 1);
        assert!(store.stored_goals().is_empty());
    }

    #[test]
    fn failed_load_starts_empty() {
        let store = MemoryGoalStore::with_goals(vec![sample("1")]);
        store.fail_reads(true);
        let repo = GoalRepository::load(Box::new(store), RetryPolicy::none());
        assert!(repo.goals().is_empty());
        assert!(!repo.is_writable());
    }

    #[test]
    fn unread_collection_is_never_overwritten() {
        let store = MemoryGoalStore::with_goals(vec![sample("1"), sample("2")]);
        store.fail_reads(true);
        let mut repo = GoalRepository::load(Box::new(store.clone()), RetryPolicy::none());

        let ((), written) = repo.mutate(|goals| goals.push(sample("3")));
        assert!(matches!(written, Err(StorageError::NotLoaded)));
        assert_eq!(repo.goals().len(), 1);
        assert_eq!(store.write_count(), 0);
        assert_eq!(store.stored_goals().len(), 2);
    }

    #[test]
    fn corrupt_collection_is_backed_up_before_writing() {
        let store = MemoryGoalStore::with_goals(vec![sample("1"), sample("2")]);
        store.corrupt_goals();
        let mut repo = GoalRepository::load(Box::new(store.clone()), RetryPolicy::none());
        assert!(repo.is_writable());

        let ((), written) = repo.mutate(|goals| goals.push(sample("3")));
        assert!(written.is_ok());
        let stored: Vec<_> = store.stored_goals().into_iter().map(|g| g.id).collect();
        assert_eq!(stored, vec![GoalId::new("3")]);
        assert_eq!(store.backups().len(), 1);
        assert_eq!(store.backups()[0].len(), 2);
    }

    #[test]
    fn failed_backup_disables_writes() {
        let store = MemoryGoalStore::with_goals(vec![sample("1")]);
        store.corrupt_goals();
        store.fail_next_writes(1);
        let mut repo = GoalRepository::load(Box::new(store.clone()), RetryPolicy::none());
        assert!(!repo.is_writable());

        let ((), written) = repo.mutate(|goals| goals.push(sample("2")));
        assert!(written.is_err());
        assert!(store.backups().is_empty());
    }
}
