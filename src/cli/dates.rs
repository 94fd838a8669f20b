use std::fmt::Display;

use anyhow::Result;
use chrono::{DateTime, Local, NaiveDate, NaiveTime};
use chrono_english::parse_date_string;
use clap::{CommandFactory, ValueEnum};

use super::Args;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DateStyle {
    Uk,
    Us,
}

impl From<DateStyle> for chrono_english::Dialect {
    fn from(value: DateStyle) -> Self {
        match value {
            DateStyle::Uk => Self::Uk,
            DateStyle::Us => Self::Us,
        }
    }
}

impl Display for DateStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DateStyle::Uk => write!(f, "uk"),
            DateStyle::Us => write!(f, "us"),
        }
    }
}

pub const DATE_HELP: &str =
    "Examples are \"yesterday\", \"last monday\", \"15/03/2025\". Defaults to today";

/// Parses a user supplied day. Missing input means the day of `now`.
pub fn parse_date(
    input: Option<&str>,
    date_style: DateStyle,
    now: DateTime<Local>,
) -> Result<NaiveDate> {
    let Some(input) = input else {
        return Ok(now.date_naive());
    };
    match parse_date_string(input, now, date_style.into()) {
        Ok(v) => Ok(v.date_naive()),
        Err(e) => Err(Args::command()
            .error(
                clap::error::ErrorKind::ValueValidation,
                format!("Failed to validate date {input:?}: {e}"),
            )
            .into()),
    }
}

/// Parses a time of day written as `HH:MM` or `HH:MM:SS`.
pub fn parse_time(input: &str) -> Result<NaiveTime> {
    let input = input.trim();
    NaiveTime::parse_from_str(input, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(input, "%H:%M"))
        .map_err(|e| {
            Args::command()
                .error(
                    clap::error::ErrorKind::ValueValidation,
                    format!("Failed to validate time {input:?}, expected HH:MM or HH:MM:SS: {e}"),
                )
                .into()
        })
}
