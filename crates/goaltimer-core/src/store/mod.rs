//! Goal record store.
//!
//! The whole goal collection is the unit of persistence: callers read it,
//! change it in memory and write it back in full. No operation patches a
//! single field in place.

mod memory;
mod repository;
mod sqlite;

pub use memory::MemoryGoalStore;
pub use repository::{GoalRepository, RetryPolicy};
pub use sqlite::SqliteGoalStore;

use std::path::PathBuf;

use crate::error::{ConfigError, StorageError};
use crate::goal::{FocusGoal, Goal};

/// Backend holding the serialized goal collection and the two small
/// side records (long-term goal, onboarding flag).
pub trait GoalStore: Send {
    fn load_goals(&self) -> Result<Vec<Goal>, StorageError>;

    /// Replace the stored collection with `goals` as one write.
    fn replace_goals(&self, goals: &[Goal]) -> Result<(), StorageError>;

    /// Move an undecodable stored collection aside so a later
    /// `replace_goals` cannot overwrite it. Returns the backup key, or
    /// `None` when nothing was stored.
    fn back_up_goals(&self) -> Result<Option<String>, StorageError>;

    fn load_focus_goal(&self) -> Result<Option<FocusGoal>, StorageError>;

    fn save_focus_goal(&self, focus: &FocusGoal) -> Result<(), StorageError>;

    fn clear_focus_goal(&self) -> Result<(), StorageError>;

    fn onboarding_seen(&self) -> Result<bool, StorageError>;

    fn mark_onboarding_seen(&self) -> Result<(), StorageError>;
}

/// Returns the data directory.
///
/// `GOALTIMER_DATA_DIR` wins when set. Otherwise `~/.config/goaltimer/`,
/// or `~/.config/goaltimer-dev/` when `GOALTIMER_ENV=dev`.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let dir = match std::env::var_os("GOALTIMER_DATA_DIR") {
        Some(dir) => PathBuf::from(dir),
        None => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env = std::env::var("GOALTIMER_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("goaltimer-dev")
            } else {
                base_dir.join("goaltimer")
            }
        }
    };

    std::fs::create_dir_all(&dir).map_err(|e| ConfigError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}
