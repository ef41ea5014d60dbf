//! SQLite-backed goal store.
//!
//! A single `kv` table holds the JSON goal collection, the long-term goal
//! and the onboarding flag under separate keys.

use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::{data_dir, GoalStore};
use crate::error::{CoreError, StorageError};
use crate::goal::{FocusGoal, Goal};

const GOALS_KEY: &str = "goals";
const GOALS_BACKUP_PREFIX: &str = "goals_backup_";
const FOCUS_GOAL_KEY: &str = "focus_goal";
const ONBOARDING_KEY: &str = "onboarding_seen";

pub struct SqliteGoalStore {
    conn: Connection,
}

impl SqliteGoalStore {
    /// Open the store at `<data dir>/goaltimer.db`.
    ///
    /// # Errors
    /// Returns an error if the data directory or database cannot be opened.
    pub fn open() -> Result<Self, CoreError> {
        let path = data_dir()?.join("goaltimer.db");
        Ok(Self::open_at(&path)?)
    }

    pub fn open_at(path: &Path) -> Result<Self, StorageError> {
        let conn = Connection::open(path).map_err(|source| StorageError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    pub fn open_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> Result<(), StorageError> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );",
        )?;
        Ok(())
    }

    fn kv_get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let value = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get::<_, String>(0)
            })
            .optional()?;
        Ok(value)
    }

    fn kv_set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    fn kv_delete(&self, key: &str) -> Result<(), StorageError> {
        self.conn
            .execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }

    fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
        match self.kv_get(key)? {
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|e| StorageError::Corrupt {
                    key: key.to_string(),
                    message: e.to_string(),
                }),
            None => Ok(None),
        }
    }

    fn set_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), StorageError> {
        let raw = serde_json::to_string(value).map_err(|e| StorageError::Corrupt {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        self.kv_set(key, &raw)
    }
}

impl GoalStore for SqliteGoalStore {
    fn load_goals(&self) -> Result<Vec<Goal>, StorageError> {
        Ok(self.get_json(GOALS_KEY)?.unwrap_or_default())
    }

    fn replace_goals(&self, goals: &[Goal]) -> Result<(), StorageError> {
        let tx = self.conn.unchecked_transaction()?;
        self.set_json(GOALS_KEY, goals)?;
        tx.commit()?;
        Ok(())
    }

    fn back_up_goals(&self) -> Result<Option<String>, StorageError> {
        let tx = self.conn.unchecked_transaction()?;
        let Some(raw) = self.kv_get(GOALS_KEY)? else {
            return Ok(None);
        };
        let existing: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM kv WHERE key LIKE ?1",
            params![format!("{GOALS_BACKUP_PREFIX}%")],
            |row| row.get(0),
        )?;
        let backup_key = format!("{GOALS_BACKUP_PREFIX}{}", existing + 1);
        self.kv_set(&backup_key, &raw)?;
        self.kv_delete(GOALS_KEY)?;
        tx.commit()?;
        Ok(Some(backup_key))
    }

    fn load_focus_goal(&self) -> Result<Option<FocusGoal>, StorageError> {
        self.get_json(FOCUS_GOAL_KEY)
    }

    fn save_focus_goal(&self, focus: &FocusGoal) -> Result<(), StorageError> {
        self.set_json(FOCUS_GOAL_KEY, focus)
    }

    fn clear_focus_goal(&self) -> Result<(), StorageError> {
        self.kv_delete(FOCUS_GOAL_KEY)
    }

    fn onboarding_seen(&self) -> Result<bool, StorageError> {
        Ok(self.kv_get(ONBOARDING_KEY)?.as_deref() == Some("true"))
    }

    fn mark_onboarding_seen(&self) -> Result<(), StorageError> {
        self.kv_set(ONBOARDING_KEY, "true")
    }
}
