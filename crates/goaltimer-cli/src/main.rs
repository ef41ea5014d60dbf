use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "goaltimer", version, about = "Goaltimer CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Goal management
    Goal {
        #[command(subcommand)]
        action: commands::goal::GoalAction,
    },
    /// Countdown for a single goal
    Timer {
        #[command(subcommand)]
        action: commands::timer::TimerAction,
    },
    /// Queued deadline notifications
    Notify {
        #[command(subcommand)]
        action: commands::notify::NotifyAction,
    },
    /// Prompt for goals that expired while the app was closed
    CatchUp,
    /// Long-term focus goal
    Focus {
        #[command(subcommand)]
        action: commands::focus::FocusAction,
    },
    /// Goal statistics
    Stats {
        /// Report success rates over the last N days, today included (e.g. 7 or 30)
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..=366))]
        days: Option<u32>,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("GOALTIMER_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Goal { action } => commands::goal::run(action),
        Commands::Timer { action } => commands::timer::run(action),
        Commands::Notify { action } => commands::notify::run(action),
        Commands::CatchUp => commands::notify::catch_up(),
        Commands::Focus { action } => commands::focus::run(action),
        Commands::Stats { days } => commands::stats::run(days),
        Commands::Config { action } => commands::config::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
