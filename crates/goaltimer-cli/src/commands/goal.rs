use clap::Subcommand;
use goaltimer_core::deadline::{format_hms, parse_date};
use goaltimer_core::{ConstraintStatus, Goal, GoalDraft, GoalEdit, GoalId, GoalSession, GoalStatus};
use serde::Serialize;

use super::{open_session, print_json, print_outcome, CliResult};

#[derive(Subcommand)]
pub enum GoalAction {
    /// Create a goal
    Add {
        /// What you commit to
        title: String,
        /// Deadline time, HH:MM (local)
        #[arg(long)]
        time: String,
        /// Deadline date, YYYY-MM-DD (default: today)
        #[arg(long)]
        date: Option<String>,
        #[arg(long)]
        reward: Option<String>,
        #[arg(long)]
        penalty: Option<String>,
    },
    /// List goals
    List {
        /// Only goals dated YYYY-MM-DD
        #[arg(long)]
        date: Option<String>,
        /// Only goals dated today
        #[arg(long, conflicts_with = "date")]
        today: bool,
    },
    /// Show one goal with its remaining time
    Show { id: String },
    /// The goal due next today
    Next,
    /// Edit a goal; moving the deadline re-arms its notification
    Edit {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        date: Option<String>,
        #[arg(long)]
        time: Option<String>,
        #[arg(long)]
        reward: Option<String>,
        #[arg(long)]
        penalty: Option<String>,
    },
    /// Delete a goal and its notification
    Delete { id: String },
    /// Set the status by hand (pending, completed, failed)
    Status { id: String, status: GoalStatus },
    /// Record whether the reward or penalty was honored (kept, broken)
    Constraint { id: String, outcome: ConstraintStatus },
}

/// A goal plus its live countdown numbers.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GoalView<'a> {
    #[serde(flatten)]
    goal: &'a Goal,
    remaining_secs: u64,
    remaining: String,
    percent_complete: u8,
}

fn view<'a>(session: &GoalSession, goal: &'a Goal) -> GoalView<'a> {
    let now = session.now();
    let calc = session.calculator();
    let remaining_secs = calc.remaining_seconds(goal, now);
    GoalView {
        goal,
        remaining_secs,
        remaining: format_hms(remaining_secs),
        percent_complete: calc.percent_complete(goal, now),
    }
}

pub fn run(action: GoalAction) -> CliResult {
    let mut session = open_session()?;

    match action {
        GoalAction::Add {
            title,
            time,
            date,
            reward,
            penalty,
        } => {
            let date = date.unwrap_or_else(|| session.today().format("%Y-%m-%d").to_string());
            let out = session.create_goal(GoalDraft {
                title,
                date,
                time,
                reward,
                penalty,
            })?;
            print_outcome(&out.value, &out.events)?;
        }
        GoalAction::List { date, today } => {
            let views: Vec<GoalView<'_>> = if today {
                session
                    .goals_on(session.today())
                    .into_iter()
                    .map(|g| view(&session, g))
                    .collect()
            } else if let Some(date) = date {
                let day = parse_date(&date).ok_or_else(|| format!("invalid date: {date}"))?;
                session
                    .goals_on(day)
                    .into_iter()
                    .map(|g| view(&session, g))
                    .collect()
            } else {
                session.goals().iter().map(|g| view(&session, g)).collect()
            };
            print_json(&views)?;
        }
        GoalAction::Show { id } => {
            let id = GoalId::new(id);
            let goal = session
                .goal(&id)
                .ok_or_else(|| format!("goal not found: {id}"))?;
            print_json(&view(&session, goal))?;
        }
        GoalAction::Next => match session.nearest_upcoming() {
            Some(goal) => {
                if let Some(line) = session.ongoing_status() {
                    eprintln!("{line}");
                }
                print_json(&view(&session, goal))?;
            }
            None => println!("null"),
        },
        GoalAction::Edit {
            id,
            title,
            date,
            time,
            reward,
            penalty,
        } => {
            let out = session.edit_goal(
                &GoalId::new(id),
                GoalEdit {
                    title,
                    date,
                    time,
                    reward,
                    penalty,
                },
            )?;
            print_outcome(&out.value, &out.events)?;
        }
        GoalAction::Delete { id } => {
            let out = session.delete_goal(&GoalId::new(id))?;
            print_outcome(&out.value, &out.events)?;
        }
        GoalAction::Status { id, status } => {
            let out = session.set_status(&GoalId::new(id), status)?;
            print_outcome(&out.value, &out.events)?;
        }
        GoalAction::Constraint { id, outcome } => {
            let out = session.record_constraint(&GoalId::new(id), outcome)?;
            print_outcome(&out.value, &out.events)?;
        }
    }
    Ok(())
}
