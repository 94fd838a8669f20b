//! Domain errors. Everything above the domain propagates [anyhow::Error].

use chrono::{NaiveDate, NaiveDateTime};
use thiserror::Error;

/// Reasons an interval can't be built from a pair of timestamps.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IntervalError {
    #[error("interval ending at {end} does not end after its start {start}")]
    NegativeDurationRejected {
        start: NaiveDateTime,
        end: NaiveDateTime,
    },
    #[error("interval from {start} to {end} crosses midnight, split it into one entry per day")]
    OvernightRejected {
        start: NaiveDateTime,
        end: NaiveDateTime,
    },
}

/// A persisted row that can't be turned into an interval. Such rows are skipped.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RowError {
    #[error("row belongs to {found} but is stored under {expected}")]
    MisplacedDate { expected: NaiveDate, found: NaiveDate },
}
