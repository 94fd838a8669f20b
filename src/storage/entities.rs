use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::tracking::interval::{minutes_from_seconds, Interval};

/// The struct used for storing intervals on the disk. Columns may be missing in rows written by
/// older versions, they are filled in when converting into an [Interval]. A row without any
/// duration column counts as zero.
#[derive(PartialEq, Eq, Debug, Serialize, Deserialize, Clone)]
pub struct IntervalEntity {
    pub date: NaiveDate,
    #[serde(with = "time_ser")]
    pub start_time: NaiveTime,
    #[serde(with = "time_ser")]
    pub end_time: NaiveTime,
    #[serde(default)]
    pub duration_sec: Option<u64>,
    #[serde(default)]
    pub duration_min: Option<u64>,
    #[serde(default)]
    pub note: Option<String>,
}

impl From<&Interval> for IntervalEntity {
    fn from(interval: &Interval) -> Self {
        IntervalEntity {
            date: interval.date(),
            start_time: interval.start_time(),
            end_time: interval.end_time(),
            duration_sec: Some(interval.duration_seconds()),
            duration_min: Some(interval.duration_minutes()),
            note: Some(interval.note().to_string()),
        }
    }
}

impl From<IntervalEntity> for Interval {
    fn from(
        IntervalEntity {
            date,
            start_time,
            end_time,
            duration_sec,
            duration_min,
            note,
        }: IntervalEntity,
    ) -> Self {
        let (seconds, minutes) = match (duration_sec, duration_min) {
            (Some(seconds), Some(minutes)) => (seconds, minutes),
            (Some(seconds), None) => (seconds, minutes_from_seconds(seconds)),
            (None, Some(minutes)) => (minutes * 60, minutes),
            (None, None) => (0, 0),
        };
        Interval::from_persisted(
            date,
            start_time,
            end_time,
            seconds,
            minutes,
            note.unwrap_or_default(),
        )
    }
}

mod time_ser {
    use chrono::NaiveTime;
    use serde::{self, de::Error, Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%H:%M:%S";

    pub fn serialize<S>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&time.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        NaiveTime::parse_from_str(&s, FORMAT)
            .or_else(|_| NaiveTime::parse_from_str(&s, "%H:%M"))
            .map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveTime};

    use crate::tracking::interval::Interval;

    use super::IntervalEntity;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 14).unwrap()
    }

    #[test]
    fn test_columns() -> anyhow::Result<()> {
        let interval = Interval::from_persisted(
            date(),
            NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(10, 30, 5).unwrap(),
            5405,
            90,
            "write \"report\"".into(),
        );
        let json = serde_json::to_string(&IntervalEntity::from(&interval))?;
        assert_eq!(
            json,
            r#"{"date":"2025-03-14","start_time":"09:00:00","end_time":"10:30:05","duration_sec":5405,"duration_min":90,"note":"write \"report\""}"#
        );
        let restored = Interval::from(serde_json::from_str::<IntervalEntity>(&json)?);
        assert_eq!(restored, interval);
        Ok(())
    }

    #[test]
    fn test_missing_seconds_column() -> anyhow::Result<()> {
        let entity: IntervalEntity = serde_json::from_str(
            r#"{"date":"2025-03-14","start_time":"09:00:00","end_time":"09:45:00","duration_min":45,"note":null}"#,
        )?;
        let interval = Interval::from(entity);
        assert_eq!(interval.duration_seconds(), 2700);
        assert_eq!(interval.duration_minutes(), 45);
        assert_eq!(interval.note(), "");
        Ok(())
    }

    #[test]
    fn test_missing_minutes_column() -> anyhow::Result<()> {
        let entity: IntervalEntity = serde_json::from_str(
            r#"{"date":"2025-03-14","start_time":"09:00","end_time":"09:02","duration_sec":125}"#,
        )?;
        let interval = Interval::from(entity);
        assert_eq!(interval.duration_minutes(), 2);
        assert_eq!(interval.end_time(), NaiveTime::from_hms_opt(9, 2, 0).unwrap());
        Ok(())
    }

    #[test]
    fn test_missing_both_durations_counts_as_zero() -> anyhow::Result<()> {
        let entity: IntervalEntity = serde_json::from_str(
            r#"{"date":"2025-03-14","start_time":"09:00:00","end_time":"09:02:00"}"#,
        )?;
        let interval = Interval::from(entity);
        assert_eq!(interval.date(), date());
        assert_eq!(interval.end_time(), NaiveTime::from_hms_opt(9, 2, 0).unwrap());
        assert_eq!(interval.duration_seconds(), 0);
        assert_eq!(interval.duration_minutes(), 0);
        Ok(())
    }

    #[test]
    fn test_bad_time_is_rejected() {
        let result = serde_json::from_str::<IntervalEntity>(
            r#"{"date":"2025-03-14","start_time":"nine","end_time":"09:02:00","duration_sec":1}"#,
        );
        assert!(result.is_err());
    }
}
