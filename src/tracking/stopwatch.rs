use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use tokio::{sync::mpsc, time::Instant};
use tracing::{debug, trace};

use crate::utils::{clock::Clock, time::format_tick};

use super::interval::Interval;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopwatchStatus {
    Idle,
    Running,
    Paused,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopwatchState {
    Idle,
    Running {
        /// Wall time of the initial start, kept across pauses.
        first_started_at: DateTime<Utc>,
        /// Beginning of the current running span.
        started_at: Instant,
        accumulated_seconds: u64,
    },
    Paused {
        first_started_at: DateTime<Utc>,
        accumulated_seconds: u64,
    },
}

impl StopwatchState {
    pub fn status(&self) -> StopwatchStatus {
        match self {
            StopwatchState::Idle => StopwatchStatus::Idle,
            StopwatchState::Running { .. } => StopwatchStatus::Running,
            StopwatchState::Paused { .. } => StopwatchStatus::Paused,
        }
    }
}

/// Outcome of a state change request. Requests that don't fit the current state are ignored
/// and report the state they were ignored in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Applied,
    Ignored(StopwatchStatus),
}

impl Transition {
    pub fn is_applied(&self) -> bool {
        matches!(self, Transition::Applied)
    }
}

/// Result of stopping the stopwatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletedSession {
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub total_seconds: u64,
}

impl CompletedSession {
    /// Turns the session into an interval using wall time of `tz`.
    pub fn to_interval<Tz: TimeZone>(&self, tz: &Tz, note: impl Into<String>) -> Interval {
        Interval::from_elapsed(
            self.started_at.with_timezone(tz).naive_local(),
            self.ended_at.with_timezone(tz).naive_local(),
            self.total_seconds,
            note,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tick {
    /// Whole elapsed seconds, truncated.
    pub seconds: u64,
    /// `HH:MM:SS.t`
    pub formatted: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopwatchEvent {
    Started,
    Paused,
    Resumed,
    Stopped { total_seconds: u64 },
    Tick(Tick),
}

/// Measures time spent on a single work session. Elapsed time only grows while running, pauses
/// are excluded. Every running span is rounded to whole seconds when it ends.
pub struct Stopwatch {
    clock: Box<dyn Clock>,
    state: StopwatchState,
    events: Option<mpsc::Sender<StopwatchEvent>>,
}

impl Stopwatch {
    pub fn new(clock: Box<dyn Clock>) -> Self {
        Self {
            clock,
            state: StopwatchState::Idle,
            events: None,
        }
    }

    /// Publishes [StopwatchEvent]s into `events`. Publishing never waits, when the channel is
    /// full the event is dropped.
    pub fn with_events(mut self, events: mpsc::Sender<StopwatchEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn state(&self) -> StopwatchState {
        self.state
    }

    pub fn status(&self) -> StopwatchStatus {
        self.state.status()
    }

    pub fn is_idle(&self) -> bool {
        self.status() == StopwatchStatus::Idle
    }

    pub fn start(&mut self) -> Transition {
        let StopwatchState::Idle = self.state else {
            return self.ignore("start");
        };
        self.state = StopwatchState::Running {
            first_started_at: self.clock.time(),
            started_at: self.clock.instant(),
            accumulated_seconds: 0,
        };
        debug!("Stopwatch started");
        self.publish(StopwatchEvent::Started);
        Transition::Applied
    }

    pub fn pause(&mut self) -> Transition {
        let StopwatchState::Running {
            first_started_at,
            started_at,
            accumulated_seconds,
        } = self.state
        else {
            return self.ignore("pause");
        };
        let accumulated_seconds = accumulated_seconds + self.span_seconds(started_at);
        self.state = StopwatchState::Paused {
            first_started_at,
            accumulated_seconds,
        };
        debug!("Stopwatch paused at {accumulated_seconds}s");
        self.publish(StopwatchEvent::Paused);
        Transition::Applied
    }

    pub fn resume(&mut self) -> Transition {
        let StopwatchState::Paused {
            first_started_at,
            accumulated_seconds,
        } = self.state
        else {
            return self.ignore("resume");
        };
        self.state = StopwatchState::Running {
            first_started_at,
            started_at: self.clock.instant(),
            accumulated_seconds,
        };
        debug!("Stopwatch resumed");
        self.publish(StopwatchEvent::Resumed);
        Transition::Applied
    }

    /// Pauses a running stopwatch and resumes a paused one.
    pub fn toggle(&mut self) -> Transition {
        match self.state {
            StopwatchState::Running { .. } => self.pause(),
            StopwatchState::Paused { .. } => self.resume(),
            StopwatchState::Idle => self.ignore("toggle"),
        }
    }

    /// Ends the session and returns it. Returns `None` when there is no session.
    pub fn stop(&mut self) -> Option<CompletedSession> {
        let (first_started_at, total_seconds) = match self.state {
            StopwatchState::Idle => {
                self.ignore("stop");
                return None;
            }
            StopwatchState::Running {
                first_started_at,
                started_at,
                accumulated_seconds,
            } => (
                first_started_at,
                accumulated_seconds + self.span_seconds(started_at),
            ),
            StopwatchState::Paused {
                first_started_at,
                accumulated_seconds,
            } => (first_started_at, accumulated_seconds),
        };
        self.state = StopwatchState::Idle;
        let session = CompletedSession {
            started_at: first_started_at,
            ended_at: self.clock.time(),
            total_seconds,
        };
        debug!("Stopwatch stopped with {total_seconds}s");
        self.publish(StopwatchEvent::Stopped { total_seconds });
        Some(session)
    }

    /// Elapsed whole seconds as of now.
    pub fn elapsed(&self) -> u64 {
        match self.state {
            StopwatchState::Idle => 0,
            StopwatchState::Running {
                started_at,
                accumulated_seconds,
                ..
            } => accumulated_seconds + self.span_seconds(started_at),
            StopwatchState::Paused {
                accumulated_seconds,
                ..
            } => accumulated_seconds,
        }
    }

    /// Elapsed time with sub-second precision. Only meant for display.
    pub fn elapsed_precise(&self) -> Duration {
        match self.state {
            StopwatchState::Idle => Duration::ZERO,
            StopwatchState::Running {
                started_at,
                accumulated_seconds,
                ..
            } => {
                Duration::from_secs(accumulated_seconds)
                    + self.clock.instant().saturating_duration_since(started_at)
            }
            StopwatchState::Paused {
                accumulated_seconds,
                ..
            } => Duration::from_secs(accumulated_seconds),
        }
    }

    /// Produces and publishes the current display value. Nothing is produced while idle.
    pub fn tick(&self) -> Option<Tick> {
        if self.is_idle() {
            return None;
        }
        let elapsed = self.elapsed_precise();
        let tick = Tick {
            seconds: elapsed.as_secs(),
            formatted: format_tick(elapsed),
        };
        self.publish(StopwatchEvent::Tick(tick.clone()));
        Some(tick)
    }

    fn span_seconds(&self, started_at: Instant) -> u64 {
        round_to_seconds(self.clock.instant().saturating_duration_since(started_at))
    }

    fn ignore(&self, operation: &str) -> Transition {
        let status = self.status();
        trace!("Ignoring {operation} while {status:?}");
        Transition::Ignored(status)
    }

    fn publish(&self, event: StopwatchEvent) {
        if let Some(events) = &self.events {
            if let Err(e) = events.try_send(event) {
                trace!("Dropped stopwatch event {e}");
            }
        }
    }
}

/// Rounds to whole seconds, half a second rounds up.
fn round_to_seconds(duration: Duration) -> u64 {
    ((duration.as_millis() + 500) / 1000) as u64
}
