use std::fmt::{self, Write};

use ansi_term::Colour;
use anyhow::Result;
use chrono::{Datelike, Days, Local, NaiveDate};
use tracing::debug;

use crate::{
    storage::record_storage::{collect_intervals, RecordStore, RecordStoreImpl},
    tracking::{
        aggregate::{
            day_totals, month_range, overlaps_period, period_totals, total_for_bucket,
            total_for_range, week_range, Bucket, DayPeriod, IntensityScale, WEEKDAYS,
        },
        interval::{minutes_from_seconds, Interval},
    },
    utils::time::{format_hms, format_hours_minutes},
};

use super::{
    config::AppConfig,
    dates::{parse_date, DATE_HELP},
};

const LABEL_WIDTH: usize = 10;
const CELL_WIDTH: usize = 10;

/// Background for each intensity level, from no time at all to the busiest.
const LEVEL_COLOURS: [(u8, u8, u8); 7] = [
    (0xe5, 0xe7, 0xeb),
    (0xbb, 0xf7, 0xd0),
    (0x86, 0xef, 0xac),
    (0x4a, 0xde, 0x80),
    (0x22, 0xc5, 0x5e),
    (0x16, 0xa3, 0x4a),
    (0x15, 0x80, 0x3d),
];

#[derive(Debug, Clone, clap::Args)]
pub struct DayCommand {
    #[arg(help = DATE_HELP)]
    date: Option<String>,
    #[arg(long, value_enum, help = "Only show records overlapping this part of the day")]
    period: Option<DayPeriod>,
}

#[derive(Debug, Clone, clap::Args)]
pub struct WeekCommand {
    #[arg(help = DATE_HELP)]
    date: Option<String>,
    #[arg(long, help = "Show Monday to Friday only")]
    workweek: bool,
    #[arg(long, help = "List the records of every day below the heatmap")]
    list: bool,
}

#[derive(Debug, Clone, clap::Args)]
pub struct MonthCommand {
    #[arg(help = DATE_HELP)]
    date: Option<String>,
}

/// Paints heatmap cells by intensity level. Disabled palettes return text untouched.
#[derive(Debug, Clone, Copy)]
pub struct Palette {
    enabled: bool,
}

impl Palette {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    fn paint(&self, level: u8, text: &str) -> String {
        if !self.enabled {
            return text.to_string();
        }
        let (r, g, b) = LEVEL_COLOURS[usize::from(level).min(LEVEL_COLOURS.len() - 1)];
        let foreground = if level >= 4 {
            Colour::White
        } else {
            Colour::Black
        };
        foreground.on(Colour::RGB(r, g, b)).paint(text).to_string()
    }
}

pub async fn process_day_command(
    DayCommand { date, period }: DayCommand,
    config: &AppConfig,
) -> Result<()> {
    let date = parse_date(date.as_deref(), config.date_style, Local::now())?;
    let store = RecordStoreImpl::new(config.records_dir())?;
    let intervals = store.intervals_for_date(date).await?;
    debug!("Loaded {} intervals for {date}", intervals.len());

    print!("{}", render_day(date, &intervals, period)?);
    Ok(())
}

pub async fn process_week_command(
    WeekCommand {
        date,
        workweek,
        list,
    }: WeekCommand,
    config: &AppConfig,
) -> Result<()> {
    let date = parse_date(date.as_deref(), config.date_style, Local::now())?;
    let (monday, sunday) = week_range(date);
    let store = RecordStoreImpl::new(config.records_dir())?;
    let intervals = collect_intervals(&store, monday, sunday).await?;
    debug!("Loaded {} intervals for week of {monday}", intervals.len());

    print!(
        "{}",
        render_week(date, &intervals, workweek, list, Palette::new(config.color))?
    );
    Ok(())
}

pub async fn process_month_command(
    MonthCommand { date }: MonthCommand,
    config: &AppConfig,
) -> Result<()> {
    let date = parse_date(date.as_deref(), config.date_style, Local::now())?;
    let (first, last) = month_range(date);
    let store = RecordStoreImpl::new(config.records_dir())?;
    let intervals = collect_intervals(&store, first, last).await?;
    debug!("Loaded {} intervals for month of {first}", intervals.len());

    print!("{}", render_month(date, &intervals, Palette::new(config.color))?);
    Ok(())
}

fn format_total(seconds: u64) -> String {
    format!("{} min ({})", minutes_from_seconds(seconds), format_hms(seconds))
}

fn format_record(interval: &Interval) -> String {
    format!(
        "{} - {}  {:>4} min  {}",
        interval.start_time().format("%H:%M"),
        interval.end_time().format("%H:%M"),
        interval.duration_minutes(),
        interval.note()
    )
}

/// Records of one day with the day total. A period narrows the listing to records overlapping
/// it and adds the period's share.
pub fn render_day(
    date: NaiveDate,
    intervals: &[Interval],
    period: Option<DayPeriod>,
) -> Result<String, fmt::Error> {
    let mut out = String::new();
    writeln!(out, "{} {date}", date.weekday())?;

    let listed = intervals
        .iter()
        .filter(|v| v.date() == date)
        .filter(|v| period.map_or(true, |period| overlaps_period(v, period)))
        .collect::<Vec<_>>();
    if listed.is_empty() {
        writeln!(out, "  No records")?;
    }
    for interval in listed {
        writeln!(out, "  {}", format_record(interval))?;
    }

    if let Some(period) = period {
        let share = total_for_bucket(intervals, Bucket::Period(date, period));
        writeln!(out, "{period}: {}", format_total(share))?;
    }
    let total = total_for_bucket(intervals, Bucket::Day(date));
    writeln!(out, "Total: {}", format_total(total))?;
    Ok(out)
}

/// Heatmap of the week containing `date`: one row per period, one column per day, followed by
/// the day totals.
pub fn render_week(
    date: NaiveDate,
    intervals: &[Interval],
    workweek: bool,
    list: bool,
    palette: Palette,
) -> Result<String, fmt::Error> {
    let (monday, sunday) = week_range(date);
    let last = if workweek {
        monday + Days::new(4)
    } else {
        sunday
    };
    let days = day_totals(intervals, monday, last);

    let mut out = String::new();
    writeln!(
        out,
        "Week W{:02}: {monday} ~ {last} | Total: {}",
        monday.iso_week().week(),
        format_total(total_for_range(intervals, monday, last))
    )?;

    write!(out, "{:LABEL_WIDTH$}", "")?;
    for day in monday.iter_days().take(days.len()) {
        let label = format!("{} {:02}", day.weekday(), day.day());
        write!(out, "{label:^CELL_WIDTH$}")?;
    }
    writeln!(out)?;

    for period in DayPeriod::ALL {
        write!(out, "{:LABEL_WIDTH$}", period.to_string())?;
        for day in monday.iter_days().take(days.len()) {
            let share = period_totals(intervals, day)[period.index()].seconds;
            let cell = format!("{:^CELL_WIDTH$}", format_hours_minutes(share));
            write!(out, "{}", palette.paint(IntensityScale::PERIOD.level(share), &cell))?;
        }
        writeln!(out)?;
    }

    write!(out, "{:LABEL_WIDTH$}", "Total")?;
    for total in &days {
        let cell = format!("{:^CELL_WIDTH$}", format_hours_minutes(total.seconds));
        write!(out, "{}", palette.paint(IntensityScale::DAY.level(total.seconds), &cell))?;
    }
    writeln!(out)?;

    if list {
        for total in &days {
            let Bucket::Day(day) = total.bucket else {
                continue;
            };
            let records = intervals
                .iter()
                .filter(|v| v.date() == day)
                .collect::<Vec<_>>();
            if records.is_empty() {
                continue;
            }
            writeln!(out)?;
            writeln!(out, "{} {day} | {} min", day.weekday(), total.minutes())?;
            for interval in records {
                writeln!(out, "  {}", format_record(interval))?;
            }
        }
    }
    Ok(out)
}

/// Calendar of the month containing `date`, Monday first, every day coloured by its total.
pub fn render_month(
    date: NaiveDate,
    intervals: &[Interval],
    palette: Palette,
) -> Result<String, fmt::Error> {
    let (first, last) = month_range(date);
    let days = day_totals(intervals, first, last);

    let mut out = String::new();
    writeln!(
        out,
        "{} | Total: {}",
        first.format("%B %Y"),
        format_total(total_for_range(intervals, first, last))
    )?;
    for weekday in WEEKDAYS {
        write!(out, "{:<CELL_WIDTH$}", weekday.to_string())?;
    }
    writeln!(out)?;

    let offset = first.weekday().num_days_from_monday() as usize;
    let mut cells = vec![None; offset];
    cells.extend(days.iter().map(Some));

    for week in cells.chunks(WEEKDAYS.len()) {
        for cell in week {
            match cell {
                Some(total) => {
                    let Bucket::Day(day) = total.bucket else {
                        continue;
                    };
                    write!(out, "{:<CELL_WIDTH$}", day.day())?;
                }
                None => {
                    write!(out, "{:CELL_WIDTH$}", "")?;
                }
            }
        }
        writeln!(out)?;
        for cell in week {
            match cell {
                Some(total) => {
                    let text = if total.seconds == 0 {
                        "-".to_string()
                    } else {
                        format_hours_minutes(total.seconds)
                    };
                    let cell = format!("{text:<CELL_WIDTH$}");
                    write!(out, "{}", palette.paint(IntensityScale::DAY.level(total.seconds), &cell))?;
                }
                None => {
                    write!(out, "{:CELL_WIDTH$}", "")?;
                }
            }
        }
        writeln!(out)?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

    use crate::tracking::{aggregate::DayPeriod, interval::Interval};

    use super::{render_day, render_month, render_week, Palette};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
    }

    fn interval(d: u32, start: (u32, u32), end: (u32, u32), note: &str) -> Interval {
        let at = |(h, m): (u32, u32)| {
            NaiveDateTime::new(day(d), NaiveTime::from_hms_opt(h, m, 0).unwrap())
        };
        Interval::from_timestamps(at(start), at(end), note).unwrap()
    }

    fn sample() -> Vec<Interval> {
        vec![
            // Monday 10th
            interval(10, (9, 0), (10, 30), "reading"),
            interval(10, (11, 0), (13, 0), "writing"),
            // Wednesday 12th
            interval(12, (19, 0), (19, 45), "review"),
            // Saturday 15th
            interval(15, (8, 0), (9, 0), "weekend"),
        ]
    }

    #[test]
    fn test_render_day() {
        let out = render_day(day(10), &sample(), None).unwrap();
        assert!(out.starts_with("Mon 2025-03-10\n"));
        assert!(out.contains("09:00 - 10:30    90 min  reading"));
        assert!(out.contains("11:00 - 13:00   120 min  writing"));
        assert!(out.ends_with("Total: 210 min (03:30:00)\n"));

        let out = render_day(day(11), &sample(), None).unwrap();
        assert!(out.contains("No records"));
        assert!(out.ends_with("Total: 0 min (00:00:00)\n"));
    }

    #[test]
    fn test_render_day_period() {
        let out = render_day(day(10), &sample(), Some(DayPeriod::Afternoon)).unwrap();
        assert!(!out.contains("reading"));
        assert!(out.contains("writing"));
        assert!(out.contains("Afternoon: 60 min (01:00:00)"));
        assert!(out.contains("Total: 210 min (03:30:00)"));
    }

    #[test]
    fn test_render_week() {
        let out = render_week(day(12), &sample(), false, false, Palette::new(false)).unwrap();
        let lines = out.lines().collect::<Vec<_>>();
        assert_eq!(
            lines[0],
            "Week W11: 2025-03-10 ~ 2025-03-16 | Total: 315 min (05:15:00)"
        );
        assert!(lines[1].contains("Mon 10") && lines[1].contains("Sun 16"));
        assert!(lines[2].starts_with("Morning") && lines[2].contains("2h 30m"));
        assert!(lines[3].starts_with("Afternoon") && lines[3].contains("1h 0m"));
        assert!(lines[4].starts_with("Evening") && lines[4].contains("0h 45m"));
        assert!(lines[5].starts_with("Total") && lines[5].contains("3h 30m"));
        assert_eq!(lines.len(), 6);
    }

    #[test]
    fn test_render_workweek_with_list() {
        let out = render_week(day(15), &sample(), true, true, Palette::new(false)).unwrap();
        assert!(out.starts_with("Week W11: 2025-03-10 ~ 2025-03-14 | Total: 255 min (04:15:00)"));
        assert!(!out.contains("Sat"));
        assert!(!out.contains("weekend"));
        assert!(out.contains("Mon 2025-03-10 | 210 min"));
        assert!(out.contains("Wed 2025-03-12 | 45 min"));
        assert!(out.contains("19:00 - 19:45    45 min  review"));
    }

    #[test]
    fn test_render_month() {
        let out = render_month(day(20), &sample(), Palette::new(false)).unwrap();
        let lines = out.lines().collect::<Vec<_>>();
        assert_eq!(lines[0], "March 2025 | Total: 315 min (05:15:00)");
        assert!(lines[1].starts_with("Mon"));
        // March 2025 starts on a Saturday
        assert_eq!(lines[2].trim(), "1         2");
        assert!(lines[2].starts_with(&" ".repeat(50)));
        assert!(out.contains("3h 30m"));
        // header, weekday row, and 6 weeks of 2 rows each
        assert_eq!(lines.len(), 2 + 6 * 2);
    }

    #[test]
    fn test_palette() {
        assert_eq!(Palette::new(false).paint(3, "x"), "x");
        let painted = Palette::new(true).paint(3, "x");
        assert!(painted.contains('x'));
        assert_ne!(painted, "x");
    }
}
