use super::{open_session, print_json, CliResult};

pub fn run(days: Option<u32>) -> CliResult {
    let session = open_session()?;
    match days {
        Some(days) => print_json(&session.stats_for_last_days(days)),
        None => print_json(&session.stats()),
    }
}
