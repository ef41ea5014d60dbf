use std::sync::{Arc, Mutex, MutexGuard};

use super::GoalStore;
use crate::error::StorageError;
use crate::goal::{FocusGoal, Goal};

#[derive(Debug, Default)]
struct State {
    goals: Vec<Goal>,
    focus: Option<FocusGoal>,
    onboarding_seen: bool,
    failing_writes: usize,
    failing_reads: bool,
    corrupt: bool,
    backups: Vec<Vec<Goal>>,
    writes: usize,
}

/// In-memory store for tests and ephemeral sessions.
///
/// Clones share state, so a test can keep a handle after moving the store
/// into a session. Writes can be made to fail to exercise retry paths.
#[derive(Debug, Clone, Default)]
pub struct MemoryGoalStore {
    state: Arc<Mutex<State>>,
}

impl MemoryGoalStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_goals(goals: Vec<Goal>) -> Self {
        let store = Self::default();
        store.lock().goals = goals;
        store
    }

    /// Make the next `n` writes fail.
    pub fn fail_next_writes(&self, n: usize) {
        self.lock().failing_writes = n;
    }

    /// Make every read fail until switched off.
    pub fn fail_reads(&self, on: bool) {
        self.lock().failing_reads = on;
    }

    /// Make the stored collection undecodable until it is backed up.
    pub fn corrupt_goals(&self) {
        self.lock().corrupt = true;
    }

    /// Collections moved aside by [`GoalStore::back_up_goals`].
    pub fn backups(&self) -> Vec<Vec<Goal>> {
        self.lock().backups.clone()
    }

    /// Number of successful collection writes so far.
    pub fn write_count(&self) -> usize {
        self.lock().writes
    }

    /// Snapshot of the stored collection.
    pub fn stored_goals(&self) -> Vec<Goal> {
        self.lock().goals.clone()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check_write(state: &mut State) -> Result<(), StorageError> {
        if state.failing_writes > 0 {
            state.failing_writes -= 1;
            return Err(StorageError::WriteFailed("injected write failure".into()));
        }
        Ok(())
    }

    fn check_read(state: &State) -> Result<(), StorageError> {
        if state.failing_reads {
            return Err(StorageError::QueryFailed("injected read failure".into()));
        }
        Ok(())
    }
}

impl GoalStore for MemoryGoalStore {
    fn load_goals(&self) -> Result<Vec<Goal>, StorageError> {
        let state = self.lock();
        Self::check_read(&state)?;
        if state.corrupt {
            return Err(StorageError::Corrupt {
                key: "goals".into(),
                message: "injected decode failure".into(),
            });
        }
        Ok(state.goals.clone())
    }

    fn back_up_goals(&self) -> Result<Option<String>, StorageError> {
        let mut state = self.lock();
        Self::check_write(&mut state)?;
        state.corrupt = false;
        let goals = std::mem::take(&mut state.goals);
        state.backups.push(goals);
        Ok(Some(format!("goals_backup_{}", state.backups.len())))
    }

    fn replace_goals(&self, goals: &[Goal]) -> Result<(), StorageError> {
        let mut state = self.lock();
        Self::check_write(&mut state)?;
        state.goals = goals.to_vec();
        state.writes += 1;
        Ok(())
    }

    fn load_focus_goal(&self) -> Result<Option<FocusGoal>, StorageError> {
        let state = self.lock();
        Self::check_read(&state)?;
        Ok(state.focus.clone())
    }

    fn save_focus_goal(&self, focus: &FocusGoal) -> Result<(), StorageError> {
        let mut state = self.lock();
        Self::check_write(&mut state)?;
        state.focus = Some(focus.clone());
        Ok(())
    }

    fn clear_focus_goal(&self) -> Result<(), StorageError> {
        let mut state = self.lock();
        Self::check_write(&mut state)?;
        state.focus = None;
        Ok(())
    }

    fn onboarding_seen(&self) -> Result<bool, StorageError> {
        let state = self.lock();
        Self::check_read(&state)?;
        Ok(state.onboarding_seen)
    }

    fn mark_onboarding_seen(&self) -> Result<(), StorageError> {
        let mut state = self.lock();
        Self::check_write(&mut state)?;
        state.onboarding_seen = true;
        Ok(())
    }
}
