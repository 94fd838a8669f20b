use std::time::Duration;

use tokio::time::Instant;

use crate::utils::clock::Clock;

pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(100);
const MIN_TICK_INTERVAL: Duration = Duration::from_millis(10);

/// Fixed rate schedule driving display refreshes. A disarmed ticker never fires, fires that were
/// missed while nobody waited are coalesced into one.
pub struct Ticker {
    period: Duration,
    next: Option<Instant>,
    clock: Box<dyn Clock>,
}

impl Ticker {
    pub fn new(period: Duration, clock: Box<dyn Clock>) -> Self {
        Self {
            period: period.max(MIN_TICK_INTERVAL),
            next: None,
            clock,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn is_armed(&self) -> bool {
        self.next.is_some()
    }

    /// Schedules the next fire one period from now. Arming an armed ticker keeps its schedule.
    pub fn arm(&mut self) {
        if self.next.is_none() {
            self.next = Some(self.clock.instant() + self.period);
        }
    }

    pub fn disarm(&mut self) {
        self.next = None;
    }

    /// Waits for the next fire. Cancel safe: dropping the future keeps the schedule.
    pub async fn wait(&mut self) {
        let Some(next) = self.next else {
            return std::future::pending().await;
        };
        self.clock.sleep_until(next).await;

        let now = self.clock.instant();
        let mut following = next + self.period;
        if following <= now {
            following = now + self.period;
        }
        self.next = Some(following);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::Utc;
    use tokio::time::{timeout, Instant};

    use crate::utils::clock::TestClock;

    use super::{Ticker, DEFAULT_TICK_INTERVAL};

    fn ticker() -> Ticker {
        Ticker::new(DEFAULT_TICK_INTERVAL, Box::new(TestClock::starting_at(Utc::now())))
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_every_period() {
        let mut ticker = ticker();
        ticker.arm();
        let begin = Instant::now();
        for n in 1..=5 {
            ticker.wait().await;
            assert_eq!(begin.elapsed(), DEFAULT_TICK_INTERVAL * n);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_disarmed_never_fires() {
        let mut ticker = ticker();
        assert!(timeout(Duration::from_secs(5), ticker.wait()).await.is_err());

        ticker.arm();
        ticker.disarm();
        assert!(!ticker.is_armed());
        assert!(timeout(Duration::from_secs(5), ticker.wait()).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_missed_fires_are_coalesced() {
        let mut ticker = ticker();
        ticker.arm();
        tokio::time::advance(Duration::from_millis(350)).await;
        let late = Instant::now();

        ticker.wait().await;
        assert_eq!(Instant::now(), late);

        ticker.wait().await;
        assert_eq!(Instant::now(), late + DEFAULT_TICK_INTERVAL);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearming_keeps_schedule() {
        let mut ticker = ticker();
        ticker.arm();
        tokio::time::advance(Duration::from_millis(60)).await;
        ticker.arm();
        let begin = Instant::now();
        ticker.wait().await;
        assert_eq!(begin.elapsed(), Duration::from_millis(40));
    }

    #[test]
    fn test_period_has_lower_bound() {
        let ticker = Ticker::new(Duration::ZERO, Box::new(TestClock::starting_at(Utc::now())));
        assert_eq!(ticker.period(), Duration::from_millis(10));
    }
}
