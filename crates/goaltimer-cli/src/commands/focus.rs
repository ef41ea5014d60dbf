use clap::Subcommand;
use goaltimer_core::FocusGoal;

use super::{open_session, print_json, CliResult};

#[derive(Subcommand)]
pub enum FocusAction {
    /// Set the long-term focus goal
    Set {
        title: String,
        /// Target date, YYYY-MM-DD
        #[arg(long)]
        target: String,
        /// Start date, YYYY-MM-DD
        #[arg(long)]
        start: Option<String>,
    },
    /// Show the focus goal and the days left
    Show,
    /// Remove the focus goal
    Clear,
}

pub fn run(action: FocusAction) -> CliResult {
    let mut session = open_session()?;

    match action {
        FocusAction::Set { title, target, start } => {
            let focus = session.set_focus_goal(FocusGoal {
                title,
                start_date: start,
                target_date: target,
            })?;
            print_json(&focus)?;
        }
        FocusAction::Show => match session.focus_goal()? {
            Some(focus) => {
                let days_remaining = focus.days_remaining(session.today());
                print_json(&serde_json::json!({
                    "focus": focus,
                    "daysRemaining": days_remaining,
                }))?;
            }
            None => println!("null"),
        },
        FocusAction::Clear => {
            session.clear_focus_goal()?;
            println!("focus goal cleared");
        }
    }
    Ok(())
}
