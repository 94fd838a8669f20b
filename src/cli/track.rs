use std::{
    io::{self, Write},
    str::FromStr,
    time::Duration,
};

use anyhow::{anyhow, Context, Result};
use chrono::{Local, TimeZone};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::mpsc,
};
use tokio_stream::{wrappers::LinesStream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};

use crate::{
    storage::record_storage::{RecordStore, RecordStoreImpl},
    tracking::{
        interval::Interval,
        stopwatch::{
            CompletedSession, Stopwatch, StopwatchEvent, StopwatchStatus, Transition,
        },
        ticker::{Ticker, DEFAULT_TICK_INTERVAL},
    },
    utils::{clock::DefaultClock, time::format_hms},
};

use super::{config::AppConfig, shutdown};

/// Typed instead of a note to throw the stopped session away.
pub const CANCEL_NOTE: &str = ":cancel";

const EVENT_BUFFER: usize = 16;

#[derive(Debug, Clone, Copy, clap::Args)]
pub struct TrackCommand {
    #[arg(
        long = "tick-ms",
        default_value_t = DEFAULT_TICK_INTERVAL.as_millis() as u64,
        help = "How often the running time is redrawn, in milliseconds"
    )]
    tick_ms: u64,
    #[arg(long, help = "Start the stopwatch right away")]
    now: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCommand {
    Start,
    Pause,
    Resume,
    Toggle,
    Stop,
    Quit,
    Help,
}

impl FromStr for SessionCommand {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "s" | "start" => Ok(SessionCommand::Start),
            "p" | "pause" => Ok(SessionCommand::Pause),
            "r" | "resume" => Ok(SessionCommand::Resume),
            "t" | "toggle" | "" => Ok(SessionCommand::Toggle),
            "x" | "stop" => Ok(SessionCommand::Stop),
            "q" | "quit" | "exit" => Ok(SessionCommand::Quit),
            "h" | "help" | "?" => Ok(SessionCommand::Help),
            other => Err(anyhow!("Unknown command {other:?}")),
        }
    }
}

/// What a line of input resulted in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    Applied(SessionCommand),
    Ignored(SessionCommand, StopwatchStatus),
    /// The stopwatch was stopped, the next line is the note.
    AwaitingNote(CompletedSession),
    Saved(Interval),
    Discarded,
    Help,
    Unknown(String),
    Quit,
}

/// Bridges the stopwatch with the store: a stopped session waits for its note and is stored
/// once the note arrives.
pub struct TrackingSession<S: RecordStore, Tz: TimeZone> {
    stopwatch: Stopwatch,
    store: S,
    timezone: Tz,
    pending: Option<CompletedSession>,
    quit_after_note: bool,
}

impl<S: RecordStore, Tz: TimeZone> TrackingSession<S, Tz> {
    pub fn new(stopwatch: Stopwatch, store: S, timezone: Tz) -> Self {
        Self {
            stopwatch,
            store,
            timezone,
            pending: None,
            quit_after_note: false,
        }
    }

    pub fn stopwatch(&self) -> &Stopwatch {
        &self.stopwatch
    }

    pub fn is_awaiting_note(&self) -> bool {
        self.pending.is_some()
    }

    pub async fn handle_line(&mut self, line: &str) -> Result<SessionOutcome> {
        if let Some(session) = self.pending {
            return self.attach_note(session, line.trim()).await;
        }

        let command = match line.parse::<SessionCommand>() {
            Ok(v) => v,
            Err(_) => return Ok(SessionOutcome::Unknown(line.trim().to_string())),
        };
        let transition = match command {
            SessionCommand::Start => self.stopwatch.start(),
            SessionCommand::Pause => self.stopwatch.pause(),
            SessionCommand::Resume => self.stopwatch.resume(),
            SessionCommand::Toggle => self.stopwatch.toggle(),
            SessionCommand::Help => return Ok(SessionOutcome::Help),
            SessionCommand::Stop => return Ok(self.stop(command)),
            SessionCommand::Quit => {
                if self.stopwatch.is_idle() {
                    return Ok(SessionOutcome::Quit);
                }
                self.quit_after_note = true;
                return Ok(self.stop(command));
            }
        };
        Ok(match transition {
            Transition::Applied => SessionOutcome::Applied(command),
            Transition::Ignored(status) => SessionOutcome::Ignored(command, status),
        })
    }

    /// Whether the loop should end after the last outcome.
    pub fn should_quit(&self) -> bool {
        self.quit_after_note && self.pending.is_none()
    }

    /// Stores whatever is still running or waiting for a note, with the note given so far.
    /// Used when input ends or the process is interrupted, so no measured time is lost.
    pub async fn finish(&mut self) -> Result<Option<Interval>> {
        if let Some(session) = self.stopwatch.stop() {
            self.pending = Some(session);
        }
        let Some(session) = self.pending else {
            return Ok(None);
        };
        match self.attach_note(session, "").await? {
            SessionOutcome::Saved(interval) => Ok(Some(interval)),
            _ => Ok(None),
        }
    }

    fn stop(&mut self, command: SessionCommand) -> SessionOutcome {
        match self.stopwatch.stop() {
            Some(session) => {
                self.pending = Some(session);
                SessionOutcome::AwaitingNote(session)
            }
            None => SessionOutcome::Ignored(command, StopwatchStatus::Idle),
        }
    }

    /// Stores the pending session. It stays pending until the store accepts it.
    async fn attach_note(&mut self, session: CompletedSession, note: &str) -> Result<SessionOutcome> {
        if note == CANCEL_NOTE {
            self.pending = None;
            info!("Discarded session of {}s", session.total_seconds);
            return Ok(SessionOutcome::Discarded);
        }
        let interval = session.to_interval(&self.timezone, note);
        self.store
            .add_interval(&interval)
            .await
            .with_context(|| format!("Failed to record {interval:?}"))?;
        self.pending = None;
        info!("Recorded {interval:?}");
        Ok(SessionOutcome::Saved(interval))
    }
}

/// Runs an interactive tracking session on stdin/stdout until the user quits, input ends or
/// Ctrl-C is pressed.
pub async fn process_track_command(
    TrackCommand { tick_ms, now }: TrackCommand,
    config: &AppConfig,
) -> Result<()> {
    let store = RecordStoreImpl::new(config.records_dir())?;
    let (sender, events) = mpsc::channel::<StopwatchEvent>(EVENT_BUFFER);
    let stopwatch = Stopwatch::new(Box::new(DefaultClock)).with_events(sender);
    let ticker = Ticker::new(Duration::from_millis(tick_ms), Box::new(DefaultClock));
    let mut session = TrackingSession::new(stopwatch, store, Local);

    print_help();
    if now {
        session.handle_line("start").await?;
    }

    let shutdown_token = CancellationToken::new();
    let (_, result) = tokio::join!(
        shutdown::detect_shutdown(shutdown_token.clone()),
        run_session(&mut session, ticker, events, shutdown_token.clone()),
    );

    // Also runs when the loop failed.
    let finished = session.finish().await;
    if let Ok(Some(interval)) = &finished {
        println!();
        println!("{}", describe_saved(interval));
    }
    result?;
    finished?;
    Ok(())
}

async fn run_session<S: RecordStore, Tz: TimeZone>(
    session: &mut TrackingSession<S, Tz>,
    ticker: Ticker,
    events: mpsc::Receiver<StopwatchEvent>,
    shutdown_token: CancellationToken,
) -> Result<()> {
    let result = session_loop(session, ticker, events, &shutdown_token).await;
    // Lets the signal watcher finish once the session is over.
    shutdown_token.cancel();
    result
}

#[instrument(skip_all)]
async fn session_loop<S: RecordStore, Tz: TimeZone>(
    session: &mut TrackingSession<S, Tz>,
    mut ticker: Ticker,
    mut events: mpsc::Receiver<StopwatchEvent>,
    shutdown_token: &CancellationToken,
) -> Result<()> {
    let mut lines = LinesStream::new(BufReader::new(tokio::io::stdin()).lines());
    loop {
        if session.stopwatch().is_idle() {
            ticker.disarm();
        } else {
            ticker.arm();
        }

        tokio::select! {
            _ = shutdown_token.cancelled() => {
                debug!("Session interrupted");
                return Ok(());
            }
            Some(event) = events.recv() => render_event(&event)?,
            _ = ticker.wait() => {
                session.stopwatch().tick();
            }
            line = lines.next() => {
                let Some(line) = line else {
                    debug!("Input ended");
                    return Ok(());
                };
                let line = line?;
                let outcome = session.handle_line(&line).await;
                for event in drain_events(&mut events) {
                    render_event(&event)?;
                }
                match outcome {
                    Ok(outcome) => {
                        render_outcome(&outcome);
                        if outcome == SessionOutcome::Quit || session.should_quit() {
                            return Ok(());
                        }
                    }
                    Err(e) => {
                        error!("Failed to handle {line:?}: {e:?}");
                        println!("{e:#}");
                        println!("Enter the note again to retry ({CANCEL_NOTE} to discard):");
                    }
                }
            }
        }
    }
}

/// Takes the events published so far. Ticks are dropped, they would only redraw a stale time.
fn drain_events(events: &mut mpsc::Receiver<StopwatchEvent>) -> Vec<StopwatchEvent> {
    let mut drained = vec![];
    while let Ok(event) = events.try_recv() {
        if !matches!(event, StopwatchEvent::Tick(_)) {
            drained.push(event);
        }
    }
    drained
}

fn render_event(event: &StopwatchEvent) -> Result<()> {
    let mut stdout = io::stdout().lock();
    match event {
        StopwatchEvent::Tick(tick) => write!(stdout, "\r{}  ", tick.formatted)?,
        StopwatchEvent::Started => writeln!(stdout, "\rStarted")?,
        StopwatchEvent::Paused => writeln!(stdout, "\nPaused")?,
        StopwatchEvent::Resumed => writeln!(stdout, "\rResumed")?,
        StopwatchEvent::Stopped { total_seconds } => {
            writeln!(stdout, "\nStopped at {}", format_hms(*total_seconds))?
        }
    }
    stdout.flush()?;
    Ok(())
}

fn render_outcome(outcome: &SessionOutcome) {
    match outcome {
        SessionOutcome::Applied(_) | SessionOutcome::Quit => {}
        SessionOutcome::Ignored(command, status) => {
            println!("\rCan't {command:?} while {status:?}")
        }
        SessionOutcome::AwaitingNote(_) => {
            println!("Note for this session ({CANCEL_NOTE} to discard):")
        }
        SessionOutcome::Saved(interval) => println!("{}", describe_saved(interval)),
        SessionOutcome::Discarded => println!("Session discarded"),
        SessionOutcome::Help => print_help(),
        SessionOutcome::Unknown(line) => println!("Unknown command {line:?}, type h for help"),
    }
}

fn describe_saved(interval: &Interval) -> String {
    format!(
        "Recorded {} min on {} ({} - {})",
        interval.duration_minutes(),
        interval.date(),
        interval.start_time().format("%H:%M"),
        interval.end_time().format("%H:%M"),
    )
}

fn print_help() {
    println!("Commands: s start, p pause, r resume, t or enter toggle, x stop, q quit, h help");
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            atomic::{AtomicUsize, Ordering},
            Mutex,
        },
        time::Duration,
    };

    use anyhow::{bail, Result};
    use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
    use tempfile::{tempdir, TempDir};
    use tokio::sync::mpsc;

    use crate::{
        storage::record_storage::{RecordStore, RecordStoreImpl},
        tracking::{
            interval::Interval,
            stopwatch::{Stopwatch, StopwatchEvent, StopwatchStatus},
        },
        utils::clock::TestClock,
    };

    use super::{drain_events, SessionCommand, SessionOutcome, TrackingSession, CANCEL_NOTE};

    /// Store whose first `failures` appends fail.
    #[derive(Default)]
    struct FlakyStore {
        failures: AtomicUsize,
        saved: Mutex<Vec<Interval>>,
    }

    impl RecordStore for FlakyStore {
        async fn intervals_for_date(&self, date: NaiveDate) -> Result<Vec<Interval>> {
            let saved = self.saved.lock().unwrap();
            Ok(saved.iter().filter(|v| v.date() == date).cloned().collect())
        }

        async fn total_minutes_for_date(&self, date: NaiveDate) -> Result<u64> {
            let saved = self.saved.lock().unwrap();
            Ok(saved
                .iter()
                .filter(|v| v.date() == date)
                .map(Interval::duration_minutes)
                .sum())
        }

        async fn add_interval(&self, interval: &Interval) -> Result<()> {
            if self.failures.load(Ordering::SeqCst) > 0 {
                self.failures.fetch_sub(1, Ordering::SeqCst);
                bail!("disk full");
            }
            self.saved.lock().unwrap().push(interval.clone());
            Ok(())
        }
    }

    fn flaky_session(failures: usize) -> TrackingSession<FlakyStore, Utc> {
        let store = FlakyStore {
            failures: AtomicUsize::new(failures),
            ..Default::default()
        };
        let clock = TestClock::starting_at(Utc.from_utc_datetime(&start_date()));
        TrackingSession::new(Stopwatch::new(Box::new(clock)), store, Utc)
    }

    fn start_date() -> NaiveDateTime {
        NaiveDateTime::new(
            NaiveDate::from_ymd_opt(2025, 3, 14).unwrap(),
            NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
        )
    }

    fn session() -> Result<(TempDir, TrackingSession<RecordStoreImpl, Utc>)> {
        let dir = tempdir()?;
        let store = RecordStoreImpl::new(dir.path().to_owned())?;
        let clock = TestClock::starting_at(Utc.from_utc_datetime(&start_date()));
        let session = TrackingSession::new(Stopwatch::new(Box::new(clock)), store, Utc);
        Ok((dir, session))
    }

    async fn advance_secs(seconds: u64) {
        tokio::time::advance(Duration::from_secs(seconds)).await;
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!("s".parse::<SessionCommand>().unwrap(), SessionCommand::Start);
        assert_eq!(" Pause ".parse::<SessionCommand>().unwrap(), SessionCommand::Pause);
        assert_eq!("".parse::<SessionCommand>().unwrap(), SessionCommand::Toggle);
        assert_eq!("x".parse::<SessionCommand>().unwrap(), SessionCommand::Stop);
        assert!("dance".parse::<SessionCommand>().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_is_stored_with_note() -> Result<()> {
        let (dir, mut session) = session()?;
        assert_eq!(
            session.handle_line("s").await?,
            SessionOutcome::Applied(SessionCommand::Start)
        );
        advance_secs(90).await;
        session.handle_line("p").await?;
        advance_secs(210).await;
        session.handle_line("r").await?;
        advance_secs(30).await;

        let SessionOutcome::AwaitingNote(completed) = session.handle_line("x").await? else {
            panic!("stop should wait for a note");
        };
        assert_eq!(completed.total_seconds, 120);
        assert!(session.is_awaiting_note());

        // lines are notes now, even if they look like commands
        let SessionOutcome::Saved(interval) = session.handle_line("  s  ").await? else {
            panic!("note should save the session");
        };
        assert_eq!(interval.note(), "s");
        assert_eq!(interval.duration_seconds(), 120);
        assert_eq!(interval.duration_minutes(), 2);
        assert_eq!(interval.start_time(), start_date().time());
        assert_eq!(interval.end_time(), NaiveTime::from_hms_opt(9, 5, 30).unwrap());

        let store = RecordStoreImpl::new(dir.path().to_owned())?;
        assert_eq!(
            store.intervals_for_date(start_date().date()).await?,
            vec![interval]
        );
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_note_discards() -> Result<()> {
        let (dir, mut session) = session()?;
        session.handle_line("start").await?;
        advance_secs(60).await;
        session.handle_line("stop").await?;
        assert_eq!(
            session.handle_line(CANCEL_NOTE).await?,
            SessionOutcome::Discarded
        );
        let store = RecordStoreImpl::new(dir.path().to_owned())?;
        assert!(store.intervals_for_date(start_date().date()).await?.is_empty());
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_commands() -> Result<()> {
        let (_dir, mut session) = session()?;
        assert_eq!(
            session.handle_line("x").await?,
            SessionOutcome::Ignored(SessionCommand::Stop, StopwatchStatus::Idle)
        );
        assert_eq!(
            session.handle_line("r").await?,
            SessionOutcome::Ignored(SessionCommand::Resume, StopwatchStatus::Idle)
        );
        session.handle_line("s").await?;
        assert_eq!(
            session.handle_line("s").await?,
            SessionOutcome::Ignored(SessionCommand::Start, StopwatchStatus::Running)
        );
        assert_eq!(
            session.handle_line("jump").await?,
            SessionOutcome::Unknown("jump".into())
        );
        assert_eq!(session.handle_line("h").await?, SessionOutcome::Help);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_quit() -> Result<()> {
        let (_dir, mut session) = session()?;
        assert_eq!(session.handle_line("q").await?, SessionOutcome::Quit);

        session.handle_line("s").await?;
        advance_secs(5).await;
        assert!(matches!(
            session.handle_line("q").await?,
            SessionOutcome::AwaitingNote(_)
        ));
        assert!(!session.should_quit());
        session.handle_line("wrap up").await?;
        assert!(session.should_quit());
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_finish_keeps_running_time() -> Result<()> {
        let (_dir, mut session) = session()?;
        assert_eq!(session.finish().await?, None);

        session.handle_line("s").await?;
        advance_secs(42).await;
        let interval = session.finish().await?.unwrap();
        assert_eq!(interval.duration_seconds(), 42);
        assert_eq!(interval.note(), "");
        assert!(session.stopwatch().is_idle());

        session.handle_line("s").await?;
        advance_secs(7).await;
        session.handle_line("x").await?;
        assert_eq!(session.finish().await?.unwrap().duration_seconds(), 7);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_save_keeps_session_pending() -> Result<()> {
        let mut session = flaky_session(1);
        session.handle_line("s").await?;
        advance_secs(3600).await;
        session.handle_line("x").await?;

        assert!(session.handle_line("report").await.is_err());
        assert!(session.is_awaiting_note());
        assert!(session.store.saved.lock().unwrap().is_empty());

        // the next line is still the note
        let SessionOutcome::Saved(interval) = session.handle_line("report").await? else {
            panic!("retry should save the session");
        };
        assert_eq!(interval.duration_seconds(), 3600);
        assert_eq!(interval.note(), "report");
        assert!(!session.is_awaiting_note());
        assert_eq!(session.store.total_minutes_for_date(start_date().date()).await?, 60);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_finish_retries_unsaved_session() -> Result<()> {
        let mut session = flaky_session(2);
        session.handle_line("s").await?;
        advance_secs(3600).await;
        session.handle_line("x").await?;
        assert!(session.handle_line("note").await.is_err());

        assert!(session.finish().await.is_err());
        assert!(session.is_awaiting_note());

        let interval = session.finish().await?.unwrap();
        assert_eq!(interval.duration_seconds(), 3600);
        assert_eq!(session.finish().await?, None);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_drain_events_skips_ticks() {
        let (sender, mut events) = mpsc::channel(16);
        let clock = TestClock::starting_at(Utc.from_utc_datetime(&start_date()));
        let mut stopwatch = Stopwatch::new(Box::new(clock)).with_events(sender);
        stopwatch.start();
        advance_secs(3).await;
        stopwatch.tick();
        stopwatch.stop();

        assert_eq!(
            drain_events(&mut events),
            vec![
                StopwatchEvent::Started,
                StopwatchEvent::Stopped { total_seconds: 3 }
            ]
        );
        assert!(drain_events(&mut events).is_empty());
    }
}
