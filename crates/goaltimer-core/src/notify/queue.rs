//! SQLite-backed notification queue.
//!
//! Stands in for the OS notification service when no real one is
//! available (the CLI host). Pending requests survive process restarts;
//! [`SqliteNotificationQueue::take_due`] plays the part of the OS firing
//! them and the user tapping them.

use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

use super::{NotificationBackend, NotificationKind, NotificationPayload, ScheduleRequest, TapResponse};
use crate::error::{NotificationError, StorageError};
use crate::goal::GoalId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedNotification {
    pub goal_id: GoalId,
    pub kind: NotificationKind,
    pub fires_at: DateTime<Utc>,
    pub title: String,
    pub body: String,
}

pub struct SqliteNotificationQueue {
    conn: Connection,
}

impl SqliteNotificationQueue {
    pub fn open_at(path: &Path) -> Result<Self, StorageError> {
        let conn = Connection::open(path).map_err(|source| StorageError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let queue = Self { conn };
        queue.migrate()?;
        Ok(queue)
    }

    pub fn open_memory() -> Result<Self, StorageError> {
        let queue = Self {
            conn: Connection::open_in_memory()?,
        };
        queue.migrate()?;
        Ok(queue)
    }

    fn migrate(&self) -> Result<(), StorageError> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS scheduled_notifications (
                goal_id  TEXT NOT NULL,
                kind     TEXT NOT NULL DEFAULT 'deadline',
                fires_at TEXT NOT NULL,
                title    TEXT NOT NULL,
                body     TEXT NOT NULL,
                PRIMARY KEY (goal_id, kind)
            );

            CREATE TABLE IF NOT EXISTS delivered_notifications (
                id           INTEGER PRIMARY KEY AUTOINCREMENT,
                goal_id      TEXT NOT NULL,
                kind         TEXT NOT NULL DEFAULT 'deadline',
                title        TEXT NOT NULL,
                body         TEXT NOT NULL,
                delivered_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_scheduled_fires_at ON scheduled_notifications(fires_at);",
        )?;
        Ok(())
    }

    /// Requests still waiting to fire, soonest first.
    pub fn pending(&self) -> Result<Vec<QueuedNotification>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT goal_id, kind, fires_at, title, body
             FROM scheduled_notifications
             ORDER BY fires_at, goal_id, kind",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?;

        let mut pending = Vec::new();
        for row in rows {
            let (goal_id, kind, fires_at, title, body) = row?;
            let kind = kind.parse::<NotificationKind>().map_err(|message| StorageError::Corrupt {
                key: "scheduled_notifications.kind".into(),
                message,
            })?;
            pending.push(QueuedNotification {
                goal_id: GoalId::new(goal_id),
                kind,
                fires_at: parse_instant(&fires_at)?,
                title,
                body,
            });
        }
        Ok(pending)
    }

    /// Fire every request due at `now`. Fired requests move to the
    /// delivered log and come back as tap responses.
    pub fn take_due(&mut self, now: DateTime<Utc>) -> Result<Vec<TapResponse>, StorageError> {
        let due: Vec<QueuedNotification> = self
            .pending()?
            .into_iter()
            .filter(|n| n.fires_at <= now)
            .collect();
        if due.is_empty() {
            return Ok(Vec::new());
        }

        let tx = self.conn.transaction()?;
        for n in &due {
            tx.execute(
                "DELETE FROM scheduled_notifications WHERE goal_id = ?1 AND kind = ?2",
                params![n.goal_id.as_str(), n.kind.as_str()],
            )?;
            tx.execute(
                "INSERT INTO delivered_notifications (goal_id, kind, title, body, delivered_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![n.goal_id.as_str(), n.kind.as_str(), n.title, n.body, format_instant(now)],
            )?;
        }
        tx.commit()?;

        Ok(due
            .into_iter()
            .map(|n| NotificationPayload {
                goal_id: n.goal_id,
                kind: n.kind,
            })
            .collect())
    }

    /// Delivery times logged for `goal_id`, oldest first.
    pub fn delivered_at(&self, goal_id: &GoalId) -> Result<Vec<DateTime<Utc>>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT delivered_at FROM delivered_notifications WHERE goal_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![goal_id.as_str()], |row| row.get::<_, String>(0))?;
        let mut times = Vec::new();
        for row in rows {
            times.push(parse_instant(&row?)?);
        }
        Ok(times)
    }

    /// Number of notifications delivered for `goal_id`, scheduled or immediate.
    pub fn delivered_count(&self, goal_id: &GoalId) -> Result<u64, StorageError> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM delivered_notifications WHERE goal_id = ?1",
            params![goal_id.as_str()],
            |row| row.get::<_, u64>(0),
        )?;
        Ok(count)
    }
}

impl NotificationBackend for SqliteNotificationQueue {
    fn request_permission(&mut self) -> Result<bool, NotificationError> {
        Ok(true)
    }

    fn schedule(&mut self, request: &ScheduleRequest) -> Result<(), NotificationError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO scheduled_notifications (goal_id, kind, fires_at, title, body)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                request.payload.goal_id.as_str(),
                request.payload.kind.as_str(),
                format_instant(request.fires_at),
                request.title,
                request.body,
            ],
        )?;
        Ok(())
    }

    fn cancel(&mut self, goal_id: &GoalId) -> Result<(), NotificationError> {
        self.conn.execute(
            "DELETE FROM scheduled_notifications WHERE goal_id = ?1",
            params![goal_id.as_str()],
        )?;
        Ok(())
    }

    fn present_now(
        &mut self,
        goal_id: &GoalId,
        title: &str,
        body: &str,
        at: DateTime<Utc>,
    ) -> Result<(), NotificationError> {
        self.conn.execute(
            "INSERT INTO delivered_notifications (goal_id, kind, title, body, delivered_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                goal_id.as_str(),
                NotificationKind::Deadline.as_str(),
                title,
                body,
                format_instant(at)
            ],
        )?;
        Ok(())
    }
}

fn format_instant(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_instant(raw: &str) -> Result<DateTime<Utc>, StorageError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StorageError::Corrupt {
            key: "scheduled_notifications.fires_at".into(),
            message: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn request(goal_id: &str, fires_at: DateTime<Utc>) -> ScheduleRequest {
        ScheduleRequest {
            fires_at,
            title: format!("goal {goal_id}"),
            body: String::new(),
            payload: NotificationPayload::deadline(GoalId::new(goal_id)),
        }
    }

    fn nine() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap()
    }

    #[test]
    fn same_goal_replaces_pending_request() {
        let mut queue = SqliteNotificationQueue::open_memory().unwrap();
        queue.schedule(&request("1", nine())).unwrap();
        queue
            .schedule(&request("1", nine() + Duration::hours(1)))
            .unwrap();
        let pending = queue.pending().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].fires_at, nine() + Duration::hours(1));
    }

    #[test]
    fn take_due_fires_only_due_requests() {
        let mut queue = SqliteNotificationQueue::open_memory().unwrap();
        queue.schedule(&request("1", nine())).unwrap();
        queue
            .schedule(&request("2", nine() + Duration::hours(1)))
            .unwrap();

        let taps = queue.take_due(nine()).unwrap();
        assert_eq!(taps, vec![NotificationPayload::deadline(GoalId::new("1"))]);
        assert_eq!(queue.pending().unwrap().len(), 1);
        assert_eq!(queue.delivered_count(&GoalId::new("1")).unwrap(), 1);
        assert!(queue.take_due(nine()).unwrap().is_empty());
    }

    #[test]
    fn cancel_removes_request() {
        let mut queue = SqliteNotificationQueue::open_memory().unwrap();
        queue.schedule(&request("1", nine())).unwrap();
        queue.cancel(&GoalId::new("1")).unwrap();
        assert!(queue.pending().unwrap().is_empty());
        assert!(queue.take_due(nine() + Duration::days(1)).unwrap().is_empty());
    }

    #[test]
    fn warning_and_deadline_queue_side_by_side() {
        let mut queue = SqliteNotificationQueue::open_memory().unwrap();
        queue.schedule(&request("1", nine())).unwrap();
        let mut warning = request("1", nine() - Duration::minutes(5));
        warning.payload.kind = NotificationKind::Warning;
        queue.schedule(&warning).unwrap();
        assert_eq!(queue.pending().unwrap().len(), 2);

        let taps = queue.take_due(nine() - Duration::minutes(1)).unwrap();
        assert_eq!(taps, vec![NotificationPayload::warning(GoalId::new("1"))]);
        assert_eq!(queue.pending().unwrap()[0].kind, NotificationKind::Deadline);

        queue.schedule(&warning).unwrap();
        queue.cancel(&GoalId::new("1")).unwrap();
        assert!(queue.pending().unwrap().is_empty());
    }

    #[test]
    fn present_now_logs_the_given_time() {
        let mut queue = SqliteNotificationQueue::open_memory().unwrap();
        let shown_at = nine() + Duration::seconds(3);
        queue
            .present_now(&GoalId::new("1"), "Run", "Time to choose", shown_at)
            .unwrap();
        assert_eq!(queue.delivered_at(&GoalId::new("1")).unwrap(), vec![shown_at]);
    }
}
