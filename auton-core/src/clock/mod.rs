//! Match-time sources consumed by the autonomous routine.
//!
//! The routine only ever asks one question: how many seconds are left in the
//! current period? [`MatchClock`] captures that, and the types here answer it
//! from a fixed value, a manually driven simulation, or a real countdown on
//! top of a monotonic [`TimeSource`].

use core::time::Duration;

use crate::stages::Seconds;

/// Length of the autonomous period.
pub const AUTONOMOUS_PERIOD: Duration = Duration::from_secs(15);

/// Source of the "time remaining" reading polled once per tick.
pub trait MatchClock {
    /// Seconds left in the current period. Values `<= 0` mean the period is over.
    fn remaining(&self) -> Seconds;
}

impl<C> MatchClock for &C
where
    C: MatchClock + ?Sized,
{
    fn remaining(&self) -> Seconds {
        (**self).remaining()
    }
}

impl MatchClock for Seconds {
    fn remaining(&self) -> Seconds {
        *self
    }
}

/// Trait implemented by monotonic instant wrappers.
pub trait ClockInstant: Copy {
    /// Returns the saturating duration from `earlier` to `self`.
    fn saturating_duration_since(&self, earlier: Self) -> Duration;
}

/// Monotonic time provider.
pub trait TimeSource {
    type Instant: ClockInstant;

    /// Reads the current instant.
    fn now(&self) -> Self::Instant;
}

/// Countdown that starts at [`period`](Self::period) and runs down in real time.
///
/// Before [`start`](Self::start) is called the clock reads zero, so nothing is
/// dispatched outside of a running period. Past the end of the period the
/// reading goes negative.
pub struct CountdownClock<T>
where
    T: TimeSource,
{
    source: T,
    period: Duration,
    started_at: Option<T::Instant>,
}

impl<T> CountdownClock<T>
where
    T: TimeSource,
{
    /// Creates a stopped countdown over `period`.
    pub const fn new(source: T, period: Duration) -> Self {
        Self {
            source,
            period,
            started_at: None,
        }
    }

    /// Creates a stopped countdown over [`AUTONOMOUS_PERIOD`].
    pub const fn autonomous(source: T) -> Self {
        Self::new(source, AUTONOMOUS_PERIOD)
    }

    /// Starts (or restarts) the countdown from the full period.
    pub fn start(&mut self) {
        self.started_at = Some(self.source.now());
    }

    /// Stops the countdown; the clock reads zero until restarted.
    pub fn stop(&mut self) {
        self.started_at = None;
    }

    /// Returns `true` once [`start`](Self::start) has been called.
    pub fn is_running(&self) -> bool {
        self.started_at.is_some()
    }

    /// Total length of the period.
    pub const fn period(&self) -> Duration {
        self.period
    }

    /// Time elapsed since the countdown started, if running.
    pub fn elapsed(&self) -> Option<Duration> {
        self.started_at
            .map(|start| self.source.now().saturating_duration_since(start))
    }
}

impl<T> MatchClock for CountdownClock<T>
where
    T: TimeSource,
{
    fn remaining(&self) -> Seconds {
        match self.elapsed() {
            Some(elapsed) => Seconds::from_duration(self.period).minus(elapsed),
            None => Seconds::ZERO,
        }
    }
}

/// Manually driven clock for emulators and tests.
#[derive(Copy, Clone, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SimulatedClock {
    period: Seconds,
    remaining: Seconds,
}

impl SimulatedClock {
    /// Creates a clock with the full `period` remaining.
    pub fn new(period: Duration) -> Self {
        let period = Seconds::from_duration(period);
        Self {
            period,
            remaining: period,
        }
    }

    /// Creates a clock over [`AUTONOMOUS_PERIOD`].
    pub fn autonomous() -> Self {
        Self::new(AUTONOMOUS_PERIOD)
    }

    /// Moves the countdown forward by `step`.
    pub fn advance(&mut self, step: Duration) -> Seconds {
        self.remaining = self.remaining.minus(step);
        self.remaining
    }

    /// Overrides the remaining time.
    pub fn set_remaining(&mut self, remaining: impl Into<Seconds>) {
        self.remaining = remaining.into();
    }

    /// Restores the full period.
    pub fn reset(&mut self) {
        self.remaining = self.period;
    }

    /// Total length of the period.
    pub const fn period(&self) -> Seconds {
        self.period
    }
}

impl Default for SimulatedClock {
    fn default() -> Self {
        Self::autonomous()
    }
}

impl MatchClock for SimulatedClock {
    fn remaining(&self) -> Seconds {
        self.remaining
    }
}

/// [`TimeSource`] backed by the embassy time driver.
#[cfg(feature = "embassy")]
#[derive(Copy, Clone, Debug, Default)]
pub struct EmbassyTimeSource;

#[cfg(feature = "embassy")]
impl ClockInstant for embassy_time::Instant {
    fn saturating_duration_since(&self, earlier: Self) -> Duration {
        let elapsed = embassy_time::Instant::saturating_duration_since(self, earlier);
        Duration::from_micros(elapsed.as_micros())
    }
}

#[cfg(feature = "embassy")]
impl TimeSource for EmbassyTimeSource {
    type Instant = embassy_time::Instant;

    fn now(&self) -> Self::Instant {
        embassy_time::Instant::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::Cell;

    #[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd)]
    struct MicrosInstant(u64);

    impl ClockInstant for MicrosInstant {
        fn saturating_duration_since(&self, earlier: Self) -> Duration {
            Duration::from_micros(self.0.saturating_sub(earlier.0))
        }
    }

    struct ManualSource {
        now: Cell<u64>,
    }

    impl ManualSource {
        fn new() -> Self {
            Self { now: Cell::new(0) }
        }
    }

    impl TimeSource for &ManualSource {
        type Instant = MicrosInstant;

        fn now(&self) -> MicrosInstant {
            MicrosInstant(self.now.get())
        }
    }

    #[test]
    fn countdown_reads_zero_until_started() {
        let source = ManualSource::new();
        let clock = CountdownClock::autonomous(&source);
        assert!(!clock.is_running());
        assert!(clock.remaining().is_expired());
    }

    #[test]
    fn countdown_runs_down_from_period() {
        let source = ManualSource::new();
        let mut clock = CountdownClock::new(&source, Duration::from_secs(15));
        source.now.set(1_000_000);
        clock.start();

        source.now.set(5_000_000);
        assert_eq!(clock.remaining(), Seconds::new(11.0));
        assert_eq!(clock.elapsed(), Some(Duration::from_secs(4)));

        source.now.set(17_000_000);
        assert_eq!(clock.remaining(), Seconds::new(-1.0));

        clock.stop();
        assert_eq!(clock.remaining(), Seconds::ZERO);
    }

    #[test]
    fn simulated_clock_advances_past_zero() {
        let mut clock = SimulatedClock::new(Duration::from_secs(2));
        assert_eq!(clock.remaining(), Seconds::new(2.0));

        clock.advance(Duration::from_millis(1_500));
        assert_eq!(clock.remaining(), Seconds::new(0.5));

        clock.advance(Duration::from_secs(1));
        assert_eq!(clock.remaining(), Seconds::new(-0.5));
        assert!(clock.remaining().is_expired());

        clock.reset();
        assert_eq!(clock.remaining(), clock.period());
    }

    #[test]
    fn fixed_reading_acts_as_clock() {
        let reading = Seconds::new(7.25);
        assert_eq!(reading.remaining(), Seconds::new(7.25));
        assert_eq!((&reading).remaining(), Seconds::new(7.25));
    }
}
