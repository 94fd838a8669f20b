use anyhow::Result;
use chrono::{DateTime, Local, NaiveDateTime};
use clap::CommandFactory;
use tracing::info;

use crate::{
    storage::record_storage::{RecordStore, RecordStoreImpl},
    tracking::interval::Interval,
};

use super::{
    config::AppConfig,
    dates::{parse_date, parse_time, DateStyle},
    Args,
};

#[derive(Debug, Clone, clap::Args)]
pub struct AddCommand {
    #[arg(short, long, help = "Start of the session, HH:MM or HH:MM:SS")]
    start: String,
    #[arg(short, long, help = "End of the session on the same day, HH:MM or HH:MM:SS")]
    end: String,
    #[arg(
        short,
        long,
        help = "Day of the session. Examples are \"yesterday\", \"15/03/2025\". Defaults to today"
    )]
    date: Option<String>,
    #[arg(short, long, default_value = "", help = "What the session was about")]
    note: String,
}

/// Validates a manual entry. Both times are on the same day and the end comes after the start.
pub fn build_interval(
    command: &AddCommand,
    date_style: DateStyle,
    now: DateTime<Local>,
) -> Result<Interval> {
    let date = parse_date(command.date.as_deref(), date_style, now)?;
    let start = NaiveDateTime::new(date, parse_time(&command.start)?);
    let end = NaiveDateTime::new(date, parse_time(&command.end)?);

    Interval::from_timestamps(start, end, command.note.trim()).map_err(|e| {
        Args::command()
            .error(clap::error::ErrorKind::ValueValidation, e.to_string())
            .into()
    })
}

pub async fn process_add_command(command: AddCommand, config: &AppConfig) -> Result<()> {
    let interval = build_interval(&command, config.date_style, Local::now())?;
    let store = RecordStoreImpl::new(config.records_dir())?;
    store.add_interval(&interval).await?;
    info!("Manually recorded {interval:?}");

    println!(
        "Recorded {} min on {}",
        interval.duration_minutes(),
        interval.date()
    );
    Ok(())
}
