//! Async countdown driver.
//!
//! Ticks the session's countdown on a tokio interval until the countdown
//! finishes or the caller cancels. Ticks that fall behind are skipped
//! rather than replayed; every tick reads the clock afresh anyway.
//!
//! A tick can write the goal collection, and a failing write backs off
//! with a blocking sleep (see [`crate::store::RetryPolicy`]). Ticks
//! therefore run on tokio's blocking pool so cancellation stays
//! responsive on a single-threaded runtime.

use std::sync::MutexGuard;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{GoalSession, SharedSession};
use crate::arbiter::CompletionPrompt;
use crate::countdown::CountdownState;
use crate::events::Event;

/// Why [`run_countdown`] returned.
#[derive(Debug)]
pub enum CountdownExit {
    /// The countdown reached zero. Carries the prompt to present, or
    /// `None` when the arbiter had nothing to show.
    Completed(Option<CompletionPrompt>),
    /// Cancelled by the caller; the countdown is suspended.
    Suspended,
    /// The goal disappeared or nothing was loaded.
    Stopped,
}

/// Drive the loaded countdown, forwarding every event to `events`.
///
/// Cancelling suspends the countdown only. Scheduled notifications are
/// left alone so the user is still told if they never come back.
pub async fn run_countdown(
    session: SharedSession,
    period: Duration,
    events: mpsc::UnboundedSender<Event>,
    cancel: CancellationToken,
) -> CountdownExit {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                let outcome = lock(&session).close_countdown();
                forward(&events, outcome.events);
                debug!("countdown driver cancelled");
                return CountdownExit::Suspended;
            }
            _ = interval.tick() => {
                let shared = session.clone();
                let ticked = tokio::task::spawn_blocking(move || {
                    let mut session = lock(&shared);
                    let outcome = session.tick_countdown();
                    (outcome, session.countdown_state())
                })
                .await;
                let (outcome, state) = match ticked {
                    Ok(ticked) => ticked,
                    Err(e) => {
                        warn!(error = %e, "countdown tick task failed");
                        return CountdownExit::Stopped;
                    }
                };
                forward(&events, outcome.events);
                match state {
                    CountdownState::Running => {}
                    CountdownState::Completed => return CountdownExit::Completed(outcome.value),
                    CountdownState::Suspended => return CountdownExit::Suspended,
                    CountdownState::Idle => return CountdownExit::Stopped,
                }
            }
        }
    }
}

fn lock(session: &SharedSession) -> MutexGuard<'_, GoalSession> {
    session.lock().unwrap_or_else(|e| e.into_inner())
}

fn forward(sink: &mpsc::UnboundedSender<Event>, events: Vec<Event>) {
    for event in events {
        if sink.send(event).is_err() {
            debug!("countdown event receiver dropped");
            return;
        }
    }
}
