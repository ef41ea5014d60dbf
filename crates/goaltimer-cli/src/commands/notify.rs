use chrono::Utc;
use clap::Subcommand;
use goaltimer_core::{NotificationKind, SqliteNotificationQueue};

use super::{open_session, print_json, print_outcome, prompt, queue_path, CliResult};

#[derive(Subcommand)]
pub enum NotifyAction {
    /// Deliver every due notification, as if the user tapped each one
    Deliver,
    /// List notifications waiting to fire
    Pending,
}

pub fn run(action: NotifyAction) -> CliResult {
    match action {
        NotifyAction::Deliver => deliver(),
        NotifyAction::Pending => {
            let queue = SqliteNotificationQueue::open_at(&queue_path()?)?;
            print_json(&queue.pending()?)
        }
    }
}

fn deliver() -> CliResult {
    let taps = {
        let mut queue = SqliteNotificationQueue::open_at(&queue_path()?)?;
        queue.take_due(Utc::now())?
    };
    if taps.is_empty() {
        eprintln!("no notifications due");
        return Ok(());
    }

    let mut session = open_session()?;
    for tap in taps {
        if tap.kind == NotificationKind::Warning {
            if let Some(goal) = session.goal(&tap.goal_id) {
                eprintln!("reminder: \"{}\" is due at {}", goal.title, goal.time);
            }
        }
        let out = session.handle_tap(tap);
        for event in &out.events {
            println!("{}", serde_json::to_string(event)?);
        }
        if let Some(p) = out.value {
            prompt::present(&mut session, p)?;
        }
    }
    Ok(())
}

/// Start-up sweep: re-arm future notifications, then prompt for goals
/// that expired unseen.
pub fn catch_up() -> CliResult {
    let mut session = open_session()?;
    let rearmed = session.rearm_notifications();
    let swept = session.catch_up();

    let mut events = rearmed.events;
    events.extend(swept.events);
    print_outcome(
        &serde_json::json!({
            "rearmed": rearmed.value,
            "prompts": swept.value.len(),
        }),
        &events,
    )?;

    for p in swept.value {
        prompt::present(&mut session, p)?;
    }
    Ok(())
}
