use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};

use crate::error::IntervalError;

/// The last representable second of a day. Sessions that run past midnight end here.
const LAST_SECOND: NaiveTime = match NaiveTime::from_hms_opt(23, 59, 59) {
    Some(v) => v,
    None => panic!("23:59:59 is a valid time"),
};

/// One completed work session. Intervals are immutable, every constructor derives
/// `duration_minutes` the same way, see [minutes_from_seconds].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interval {
    date: NaiveDate,
    start_time: NaiveTime,
    end_time: NaiveTime,
    duration_seconds: u64,
    duration_minutes: u64,
    note: String,
}

impl Interval {
    /// Builds an interval out of two wall clock timestamps. Used for manual entries, so both
    /// timestamps have to be on the same day and `end` has to come after `start`.
    pub fn from_timestamps(
        start: NaiveDateTime,
        end: NaiveDateTime,
        note: impl Into<String>,
    ) -> Result<Self, IntervalError> {
        if end <= start {
            return Err(IntervalError::NegativeDurationRejected { start, end });
        }
        if end.date() != start.date() {
            return Err(IntervalError::OvernightRejected { start, end });
        }
        let duration_seconds = round_seconds(end - start);
        Ok(Self {
            date: start.date(),
            start_time: truncate_to_second(start.time()),
            end_time: truncate_to_second(end.time()),
            duration_seconds,
            duration_minutes: minutes_from_seconds(duration_seconds),
            note: note.into(),
        })
    }

    /// Builds an interval from a duration measured elsewhere (the stopwatch). The measured value
    /// wins over the timestamp difference, pauses are not part of the duration.
    ///
    /// Sessions ending on a later day are kept on the day they started and their end is clamped
    /// to `23:59:59`. An end before the start (the wall clock went back) is clamped to the start.
    pub fn from_elapsed(
        start: NaiveDateTime,
        end: NaiveDateTime,
        elapsed_seconds: u64,
        note: impl Into<String>,
    ) -> Self {
        let start_time = truncate_to_second(start.time());
        let end_time = if end.date() > start.date() {
            LAST_SECOND
        } else if end < start {
            start_time
        } else {
            truncate_to_second(end.time())
        };
        Self {
            date: start.date(),
            start_time,
            end_time,
            duration_seconds: elapsed_seconds,
            duration_minutes: minutes_from_seconds(elapsed_seconds),
            note: note.into(),
        }
    }

    /// Restores an interval exactly as it was persisted.
    pub fn from_persisted(
        date: NaiveDate,
        start_time: NaiveTime,
        end_time: NaiveTime,
        duration_seconds: u64,
        duration_minutes: u64,
        note: String,
    ) -> Self {
        Self {
            date,
            start_time,
            end_time,
            duration_seconds,
            duration_minutes,
            note,
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn start_time(&self) -> NaiveTime {
        self.start_time
    }

    pub fn end_time(&self) -> NaiveTime {
        self.end_time
    }

    pub fn duration_seconds(&self) -> u64 {
        self.duration_seconds
    }

    pub fn duration_minutes(&self) -> u64 {
        self.duration_minutes
    }

    pub fn note(&self) -> &str {
        &self.note
    }

    /// Start and end as seconds from midnight. An end before the start is treated as midnight
    /// of the following day.
    pub fn day_span(&self) -> (u32, u32) {
        let start = self.start_time.num_seconds_from_midnight();
        let end = self.end_time.num_seconds_from_midnight();
        if end < start {
            (start, SECONDS_IN_DAY)
        } else {
            (start, end)
        }
    }
}

pub const SECONDS_IN_DAY: u32 = 24 * 60 * 60;

/// Canonical rounding of seconds into minutes: half a minute rounds up.
pub fn minutes_from_seconds(seconds: u64) -> u64 {
    (seconds + 30) / 60
}

/// Rounds a time difference to whole seconds, half a second rounds up. Negative differences
/// become zero.
pub fn round_seconds(duration: chrono::Duration) -> u64 {
    let millis = duration.num_milliseconds();
    if millis <= 0 {
        0
    } else {
        (millis as u64 + 500) / 1000
    }
}

fn truncate_to_second(time: NaiveTime) -> NaiveTime {
    time.with_nanosecond(0).unwrap_or(time)
}
