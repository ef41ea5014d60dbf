pub mod config;
pub mod focus;
pub mod goal;
pub mod notify;
pub mod prompt;
pub mod stats;
pub mod timer;

use std::error::Error;
use std::path::PathBuf;

use goaltimer_core::{
    data_dir, Config, Event, GoalSession, SqliteGoalStore, SqliteNotificationQueue, SystemClock,
};
use serde::Serialize;

pub type CliResult = Result<(), Box<dyn Error>>;

pub fn queue_path() -> Result<PathBuf, Box<dyn Error>> {
    Ok(data_dir()?.join("notifications.db"))
}

/// Open a session over the on-disk goal store and notification queue.
pub fn open_session() -> Result<GoalSession, Box<dyn Error>> {
    let config = Config::load()?;
    let store = SqliteGoalStore::open()?;
    let queue = SqliteNotificationQueue::open_at(&queue_path()?)?;
    let mut session = GoalSession::new(
        Box::new(store),
        Box::new(queue),
        Box::new(SystemClock),
        config,
    );

    if !session.onboarding_seen().unwrap_or(true) {
        eprintln!("Welcome to goaltimer. Add a goal with: goaltimer goal add <title> --time HH:MM");
        session.mark_onboarding_seen()?;
    }
    Ok(session)
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> CliResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print an operation's result together with the events it produced.
pub fn print_outcome<T: Serialize>(result: &T, events: &[Event]) -> CliResult {
    print_json(&serde_json::json!({
        "result": result,
        "events": events,
    }))
}
