//! Totals over calendar buckets. Everything here is a pure function of the intervals it is
//! given, nothing is cached and nothing fails: no intervals means zero everywhere.

use std::fmt::Display;

use chrono::{Datelike, Days, NaiveDate, Weekday};
use clap::ValueEnum;

use super::interval::{minutes_from_seconds, Interval};

const HOUR: u32 = 60 * 60;

/// Sub-day windows used by the week heatmap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, ValueEnum)]
pub enum DayPeriod {
    Morning,
    Afternoon,
    Evening,
}

impl DayPeriod {
    pub const ALL: [DayPeriod; 3] = [DayPeriod::Morning, DayPeriod::Afternoon, DayPeriod::Evening];

    /// `[start, end)` in seconds from midnight.
    pub fn window(&self) -> (u32, u32) {
        match self {
            DayPeriod::Morning => (0, 12 * HOUR),
            DayPeriod::Afternoon => (12 * HOUR, 18 * HOUR),
            DayPeriod::Evening => (18 * HOUR, 24 * HOUR),
        }
    }

    pub fn index(&self) -> usize {
        match self {
            DayPeriod::Morning => 0,
            DayPeriod::Afternoon => 1,
            DayPeriod::Evening => 2,
        }
    }
}

impl Display for DayPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DayPeriod::Morning => write!(f, "Morning"),
            DayPeriod::Afternoon => write!(f, "Afternoon"),
            DayPeriod::Evening => write!(f, "Evening"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    Day(NaiveDate),
    Period(NaiveDate, DayPeriod),
    /// Monday to Sunday, keyed by the Monday.
    Week { monday: NaiveDate },
    Month { year: i32, month: u32 },
}

impl Bucket {
    pub fn week_of(date: NaiveDate) -> Self {
        Bucket::Week {
            monday: week_range(date).0,
        }
    }

    pub fn month_of(date: NaiveDate) -> Self {
        Bucket::Month {
            year: date.year(),
            month: date.month(),
        }
    }

    /// Whether an interval dated `date` is counted by this bucket at all.
    fn contains(&self, date: NaiveDate) -> bool {
        match *self {
            Bucket::Day(day) | Bucket::Period(day, _) => day == date,
            Bucket::Week { monday } => week_range(monday).0 <= date && date <= week_range(monday).1,
            Bucket::Month { year, month } => date.year() == year && date.month() == month,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketTotal {
    pub bucket: Bucket,
    pub seconds: u64,
}

impl BucketTotal {
    pub fn minutes(&self) -> u64 {
        minutes_from_seconds(self.seconds)
    }
}

/// Sums the time intervals spend inside `bucket`. Periods receive a proportional share of each
/// interval, see [period_split].
pub fn total_for_bucket(intervals: &[Interval], bucket: Bucket) -> u64 {
    intervals
        .iter()
        .filter(|v| bucket.contains(v.date()))
        .map(|v| match bucket {
            Bucket::Period(_, period) => period_split(v)[period.index()],
            Bucket::Day(_) | Bucket::Week { .. } | Bucket::Month { .. } => v.duration_seconds(),
        })
        .sum()
}

/// Sum of all intervals dated between `start` and `end`, both inclusive.
pub fn total_for_range(intervals: &[Interval], start: NaiveDate, end: NaiveDate) -> u64 {
    intervals
        .iter()
        .filter(|v| start <= v.date() && v.date() <= end)
        .map(Interval::duration_seconds)
        .sum()
}

/// Distributes an interval's duration over the periods of its day, proportionally to how long
/// its `[start, end)` span overlaps each window. Shares are floored cumulatively, so they add up
/// to the whole duration and each share is less than a second away from its exact value.
/// Intervals with an empty span contribute to no period.
pub fn period_split(interval: &Interval) -> [u64; 3] {
    let (start, end) = interval.day_span();
    let mut shares = [0u64; 3];
    if end <= start {
        return shares;
    }
    let span = u128::from(end - start);
    let duration = u128::from(interval.duration_seconds());

    let mut covered = 0u128;
    let mut assigned = 0u64;
    for period in DayPeriod::ALL {
        covered += u128::from(overlap(start, end, period));
        let cumulative = (duration * covered / span) as u64;
        shares[period.index()] = cumulative - assigned;
        assigned = cumulative;
    }
    shares
}

/// Whether the interval spends any time inside `period`.
pub fn overlaps_period(interval: &Interval, period: DayPeriod) -> bool {
    let (start, end) = interval.day_span();
    overlap(start, end, period) > 0
}

fn overlap(start: u32, end: u32, period: DayPeriod) -> u32 {
    let (period_start, period_end) = period.window();
    end.min(period_end).saturating_sub(start.max(period_start))
}

/// One total per day between `start` and `end` inclusive, days without intervals included.
pub fn day_totals(intervals: &[Interval], start: NaiveDate, end: NaiveDate) -> Vec<BucketTotal> {
    start
        .iter_days()
        .take_while(|day| *day <= end)
        .map(|day| BucketTotal {
            bucket: Bucket::Day(day),
            seconds: total_for_bucket(intervals, Bucket::Day(day)),
        })
        .collect()
}

/// Morning, afternoon and evening totals of `date`.
pub fn period_totals(intervals: &[Interval], date: NaiveDate) -> [BucketTotal; 3] {
    DayPeriod::ALL.map(|period| BucketTotal {
        bucket: Bucket::Period(date, period),
        seconds: total_for_bucket(intervals, Bucket::Period(date, period)),
    })
}

/// Monday and Sunday of the week containing `date`.
pub fn week_range(date: NaiveDate) -> (NaiveDate, NaiveDate) {
    let monday = date - Days::new(u64::from(date.weekday().num_days_from_monday()));
    let sunday = monday + Days::new(6);
    (monday, sunday)
}

/// First and last day of the month containing `date`.
pub fn month_range(date: NaiveDate) -> (NaiveDate, NaiveDate) {
    let first = date.with_day(1).unwrap_or(date);
    let last = first
        .checked_add_months(chrono::Months::new(1))
        .and_then(|v| v.pred_opt())
        .unwrap_or(date);
    (first, last)
}

/// Maps seconds to a discrete intensity level. Zero seconds is always level 0, every threshold
/// reached adds a level on top of 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntensityScale {
    thresholds: &'static [u64],
}

/// Thresholds for whole days: 1h, 3h, 5h, 7h.
pub const DAY_THRESHOLDS: [u64; 4] = [HOUR as u64, 3 * HOUR as u64, 5 * HOUR as u64, 7 * HOUR as u64];

/// Thresholds for day periods: 30m, 1h, 2h, 3h, 4h.
pub const PERIOD_THRESHOLDS: [u64; 5] = [
    HOUR as u64 / 2,
    HOUR as u64,
    2 * HOUR as u64,
    3 * HOUR as u64,
    4 * HOUR as u64,
];

impl IntensityScale {
    pub const DAY: IntensityScale = IntensityScale {
        thresholds: &DAY_THRESHOLDS,
    };
    pub const PERIOD: IntensityScale = IntensityScale {
        thresholds: &PERIOD_THRESHOLDS,
    };

    pub fn level(&self, seconds: u64) -> u8 {
        if seconds == 0 {
            return 0;
        }
        1 + self.thresholds.iter().filter(|v| seconds >= **v).count() as u8
    }

    pub fn max_level(&self) -> u8 {
        self.thresholds.len() as u8 + 1
    }
}

/// Intensity of a whole day total.
pub fn intensity_level(seconds: u64) -> u8 {
    IntensityScale::DAY.level(seconds)
}

/// Weekday labels in calendar order.
pub const WEEKDAYS: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];
