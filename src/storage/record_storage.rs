use std::{
    future::{self, Future},
    io::ErrorKind,
    ops::Deref,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::Result;
use chrono::NaiveDate;
use fs4::tokio::AsyncFileExt;
use futures::{stream, Stream, StreamExt, TryStreamExt};
use tokio::{
    fs::File,
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
};
use tracing::{debug, error, warn};

use crate::{error::RowError, tracking::interval::Interval, utils::time::date_to_record_name};

use super::entities::IntervalEntity;

/// Interface for abstracting storage of intervals. Storage is append only.
pub trait RecordStore {
    /// Retrieves all intervals recorded for a certain day.
    fn intervals_for_date(
        &self,
        date: NaiveDate,
    ) -> impl Future<Output = Result<Vec<Interval>>> + Send;

    /// Sum of the stored minutes of a day.
    fn total_minutes_for_date(&self, date: NaiveDate) -> impl Future<Output = Result<u64>> + Send;

    fn add_interval(&self, interval: &Interval) -> impl Future<Output = Result<()>>;
}

impl<T: Deref> RecordStore for T
where
    T::Target: RecordStore,
{
    fn intervals_for_date(
        &self,
        date: NaiveDate,
    ) -> impl Future<Output = Result<Vec<Interval>>> + Send {
        self.deref().intervals_for_date(date)
    }

    fn total_minutes_for_date(&self, date: NaiveDate) -> impl Future<Output = Result<u64>> + Send {
        self.deref().total_minutes_for_date(date)
    }

    fn add_interval(&self, interval: &Interval) -> impl Future<Output = Result<()>> {
        self.deref().add_interval(interval)
    }
}

/// The main realization of [RecordStore].
pub struct RecordStoreImpl {
    record_dir: PathBuf,
}

impl RecordStoreImpl {
    pub fn new(record_dir: PathBuf) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&record_dir)?;

        Ok(Self { record_dir })
    }

    fn path_for(&self, date: NaiveDate) -> PathBuf {
        self.record_dir.join(date_to_record_name(date))
    }

    async fn get_all_inner(&self, path: &Path, date: NaiveDate) -> Result<Vec<Interval>> {
        async fn extract(
            path: &Path,
            date: NaiveDate,
        ) -> std::result::Result<Vec<Interval>, std::io::Error> {
            debug!("Extracting {path:?}");
            let file = File::open(path).await?;
            file.lock_shared()?;
            let mut reader = BufReader::new(file);
            let mut buffer = vec![];
            let mut intervals = vec![];
            let read = loop {
                buffer.clear();
                match reader.read_until(b'\n', &mut buffer).await {
                    Ok(0) => break Ok(()),
                    Ok(_) => {}
                    Err(e) => break Err(e),
                }
                let row = buffer.trim_ascii();
                if row.is_empty() {
                    continue;
                }
                match parse_row(row, date) {
                    Ok(v) => intervals.push(v),
                    Err(e) => {
                        // Skipping keeps the rest of the day usable.
                        warn!(
                            "Skipping malformed row in {:?} {}: {e}",
                            path,
                            String::from_utf8_lossy(row)
                        )
                    }
                }
            };

            reader.into_inner().unlock_async().await?;
            read?;

            Ok(intervals)
        }

        match extract(path, date).await {
            Ok(s) => Ok(s),
            Err(e) => {
                if e.kind() == ErrorKind::NotFound {
                    Ok(vec![])
                } else {
                    Err(e)?
                }
            }
        }
    }
}

fn parse_row(row: &[u8], date: NaiveDate) -> Result<Interval> {
    let entity = serde_json::from_slice::<IntervalEntity>(row)?;
    if entity.date != date {
        return Err(RowError::MisplacedDate {
            expected: date,
            found: entity.date,
        }
        .into());
    }
    Ok(Interval::from(entity))
}

impl RecordStore for RecordStoreImpl {
    async fn intervals_for_date(&self, date: NaiveDate) -> Result<Vec<Interval>> {
        let path = self.path_for(date);
        self.get_all_inner(&path, date).await
    }

    async fn total_minutes_for_date(&self, date: NaiveDate) -> Result<u64> {
        let intervals = self.intervals_for_date(date).await?;
        Ok(intervals.iter().map(Interval::duration_minutes).sum())
    }

    async fn add_interval(&self, interval: &Interval) -> Result<()> {
        let mut line = serde_json::to_vec(&IntervalEntity::from(interval))?;
        line.push(b'\n');

        let mut file = File::options()
            .create(true)
            .append(true)
            .open(self.path_for(interval.date()))
            .await?;

        // Semi-safe acquire-release for a file
        file.lock_exclusive()?;
        let result = async {
            file.write_all(&line).await?;
            file.flush().await
        }
        .await;
        file.unlock_async().await?;
        result?;

        debug!("Stored interval {interval:?}");
        Ok(())
    }
}

/// Streams intervals recorded between 2 dates (both inclusive), reading a few days ahead.
pub fn intervals_between(
    storage: impl RecordStore,
    start: NaiveDate,
    end: NaiveDate,
) -> impl Stream<Item = Result<Interval>> {
    let storage = Arc::new(storage);

    let files = date_range(start, end)
        .map(move |day| {
            let storage = storage.clone();
            async move { (day, storage.intervals_for_date(day).await) }
        })
        .buffered(4);

    files.flat_map(|(day, data)| match data {
        Ok(data) => stream::iter(data).map(Ok).boxed_local(),
        Err(e) => {
            error!("Failed to process file {day} {e}");
            stream::once(future::ready(Err(e))).boxed_local()
        }
    })
}

/// Collects [intervals_between] into a vector, failing on the first unreadable day.
pub async fn collect_intervals(
    storage: impl RecordStore,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<Interval>> {
    intervals_between(storage, start, end).try_collect().await
}

/// Returns a stream of dates between start (inclusive) and end (inclusive).
fn date_range(start: NaiveDate, end: NaiveDate) -> impl Stream<Item = NaiveDate> {
    stream::unfold((Some(start), end), |(current, end)| {
        future::ready(match current {
            Some(day) if day <= end => Some((day, (day.succ_opt(), end))),
            Some(_) | None => None,
        })
    })
}
