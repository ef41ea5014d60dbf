use clap::Subcommand;
use goaltimer_core::{run_countdown, CountdownExit, Event, GoalId};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::{open_session, print_json, prompt, CliResult};

#[derive(Subcommand)]
pub enum TimerAction {
    /// Run the countdown for a goal until its deadline (Ctrl-C leaves)
    Watch {
        id: String,
        /// Print one snapshot and exit
        #[arg(long)]
        once: bool,
    },
}

pub fn run(action: TimerAction) -> CliResult {
    match action {
        TimerAction::Watch { id, once } => watch(GoalId::new(id), once),
    }
}

fn watch(id: GoalId, once: bool) -> CliResult {
    let mut session = open_session()?;
    let opened = session.open_countdown(&id)?;
    for event in &opened.events {
        println!("{}", serde_json::to_string(event)?);
    }

    if once {
        let tick = session.tick_countdown();
        for event in &tick.events {
            println!("{}", serde_json::to_string(event)?);
        }
        if let Some(snapshot) = session.countdown_snapshot() {
            print_json(&snapshot)?;
        }
        if let Some(p) = tick.value {
            prompt::present(&mut session, p)?;
        }
        return Ok(());
    }

    let period = session.config().tick_interval();
    let shared = session.into_shared();
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let exit = runtime.block_on(async {
        let (tx, mut rx) = mpsc::unbounded_channel::<Event>();
        let cancel = CancellationToken::new();
        let driver = tokio::spawn(run_countdown(shared.clone(), period, tx, cancel.clone()));

        let interrupt = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                interrupt.cancel();
            }
        });

        while let Some(event) = rx.recv().await {
            match serde_json::to_string(&event) {
                Ok(line) => println!("{line}"),
                Err(e) => tracing::warn!(error = %e, "failed to encode event"),
            }
        }
        driver.await
    })?;

    let mut session = shared.lock().unwrap_or_else(|e| e.into_inner());
    match exit {
        CountdownExit::Completed(Some(p)) => prompt::present(&mut session, p)?,
        CountdownExit::Completed(None) => eprintln!("countdown finished; goal already handled"),
        CountdownExit::Suspended => eprintln!("left the countdown; the deadline notification stays scheduled"),
        CountdownExit::Stopped => eprintln!("goal no longer exists"),
    }
    Ok(())
}
