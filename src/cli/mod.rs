pub mod add;
pub mod config;
pub mod dates;
pub mod report;
pub mod shutdown;
pub mod track;

use std::time::Duration;

use add::{process_add_command, AddCommand};
use anyhow::Result;
use clap::{Parser, Subcommand};
use config::{AppConfig, GlobalArgs};
use report::{
    process_day_command, process_month_command, process_week_command, DayCommand, MonthCommand,
    WeekCommand,
};
use track::{process_track_command, TrackCommand};
use tracing::debug;

use crate::utils::{
    logging::{enable_logging, CLI_PREFIX},
    runtime::single_thread_runtime,
};

/// How long the runtime waits for the blocking stdin reader once a session is over.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(100);

#[derive(Parser, Debug)]
#[command(name = "focuslog", version, long_about = None)]
#[command(about = "Stopwatch for focused work sessions with day, week and month reports", long_about = None)]
struct Args {
    #[command(subcommand)]
    commands: Commands,
    #[command(flatten)]
    global: GlobalArgs,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Start an interactive stopwatch session. Stopped sessions are recorded")]
    Track {
        #[command(flatten)]
        command: TrackCommand,
    },
    #[command(about = "Record a session that happened without the stopwatch")]
    Add {
        #[command(flatten)]
        command: AddCommand,
    },
    #[command(about = "List the records of a day")]
    Day {
        #[command(flatten)]
        command: DayCommand,
    },
    #[command(about = "Display a heatmap of a week split into mornings, afternoons and evenings")]
    Week {
        #[command(flatten)]
        command: WeekCommand,
    },
    #[command(about = "Display a calendar of a month with the time of every day")]
    Month {
        #[command(flatten)]
        command: MonthCommand,
    },
}

pub fn run_cli() -> Result<()> {
    let args = Args::parse();
    let config = AppConfig::resolve(args.global)?;
    enable_logging(
        CLI_PREFIX,
        &config.logs_dir(),
        config.log_level,
        config.log_console,
    )?;
    debug!("Resolved {config:?}");

    let runtime = single_thread_runtime()?;
    let result = runtime.block_on(dispatch(args.commands, &config));
    runtime.shutdown_timeout(SHUTDOWN_GRACE);
    result
}

async fn dispatch(commands: Commands, config: &AppConfig) -> Result<()> {
    match commands {
        Commands::Track { command } => process_track_command(command, config).await,
        Commands::Add { command } => process_add_command(command, config).await,
        Commands::Day { command } => process_day_command(command, config).await,
        Commands::Week { command } => process_week_command(command, config).await,
        Commands::Month { command } => process_month_command(command, config).await,
    }
}
