//! Time-gated stage table shared by robot firmware and host tooling.
//!
//! A [`StageScheduler`] maps a threshold (seconds of autonomous time remaining)
//! to an action. Each tick it runs the single stage whose threshold is the
//! greatest value that does not exceed the remaining time. With stages at
//! `t = 10` and `t = 12` and 11 seconds left, the `t = 10` stage runs.
//!
//! The table is bounded and kept sorted, so registration order does not matter.
//! Stages are expected to be idempotent or monotonic ("drive forward", "hold arm
//! at target"): a stage is invoked again on every tick of its window.

use core::cmp::Ordering;
use core::fmt;
use core::time::Duration;

use heapless::Vec;

use crate::telemetry::{TelemetryKey, TelemetrySink};

/// Default number of stages a scheduler can hold.
pub const MAX_STAGES: usize = 16;

/// Value published as the target stage when no threshold qualifies.
pub const NO_TARGET_SENTINEL: f64 = -1.0;

/// Time measured in seconds, usually the time remaining in autonomous.
#[derive(Copy, Clone, Debug, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Seconds(f64);

impl Seconds {
    /// Expiry boundary; readings at or below this mean the period is over.
    pub const ZERO: Self = Self(0.0);

    /// Wraps a raw seconds value.
    #[must_use]
    pub const fn new(value: f64) -> Self {
        Self(value)
    }

    /// Returns the raw seconds value.
    #[must_use]
    pub const fn as_f64(self) -> f64 {
        self.0
    }

    /// Converts a [`Duration`] to seconds.
    #[must_use]
    pub fn from_duration(duration: Duration) -> Self {
        Self(duration.as_secs_f64())
    }

    /// Returns `true` when the value is not a number.
    #[must_use]
    pub fn is_nan(self) -> bool {
        self.0.is_nan()
    }

    /// Returns `true` once the countdown has run out (`<= 0`).
    ///
    /// NaN readings are not considered expired; they simply never match a
    /// threshold.
    #[must_use]
    pub fn is_expired(self) -> bool {
        self.0 <= 0.0
    }

    /// Subtracts a duration, allowing the result to go negative.
    #[must_use]
    pub fn minus(self, duration: Duration) -> Self {
        Self(self.0 - duration.as_secs_f64())
    }
}

impl From<f64> for Seconds {
    fn from(value: f64) -> Self {
        Self(value)
    }
}

impl From<u32> for Seconds {
    fn from(value: u32) -> Self {
        Self(f64::from(value))
    }
}

impl From<Seconds> for f64 {
    fn from(value: Seconds) -> Self {
        value.0
    }
}

impl PartialEq for Seconds {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Seconds {}

impl PartialOrd for Seconds {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Seconds {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl fmt::Display for Seconds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}s", self.0)
    }
}

/// Zero-argument action bound to a threshold.
pub trait Stage {
    /// Runs the stage once.
    fn execute(&mut self);
}

impl<F> Stage for F
where
    F: FnMut(),
{
    fn execute(&mut self) {
        (*self)()
    }
}

/// Heap-allocated stage, for tables that mix different closures.
#[cfg(feature = "alloc")]
pub type BoxedStage<'a> = alloc::boxed::Box<dyn FnMut() + 'a>;

/// A registered threshold and its action.
#[derive(Clone, Debug)]
pub struct StageEntry<A> {
    pub threshold: Seconds,
    pub action: A,
}

/// Errors that may occur while registering stages.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StageRegistryError {
    /// Table already holds its capacity of distinct thresholds.
    TableFull,
    /// Threshold was NaN.
    InvalidThreshold,
}

impl fmt::Display for StageRegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageRegistryError::TableFull => f.write_str("stage table full"),
            StageRegistryError::InvalidThreshold => f.write_str("threshold is not a number"),
        }
    }
}

/// Result of a single scheduler tick.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Dispatch {
    /// The stage registered at `threshold` ran.
    Ran { threshold: Seconds },
    /// No registered threshold is at or below the remaining time.
    NoMatch,
    /// The countdown had already run out.
    Expired { remaining: Seconds },
}

impl Dispatch {
    /// Returns `true` when a stage ran.
    #[must_use]
    pub const fn ran(self) -> bool {
        matches!(self, Dispatch::Ran { .. })
    }

    /// Returns the threshold of the stage that ran, if any.
    #[must_use]
    pub const fn threshold(self) -> Option<Seconds> {
        match self {
            Dispatch::Ran { threshold } => Some(threshold),
            _ => None,
        }
    }
}

/// Finds the greatest threshold that does not exceed `cap`.
///
/// Thresholds may arrive in any order. Returns `None` when every threshold is
/// above `cap` or the iterator is empty.
pub fn select_target<I>(thresholds: I, cap: Seconds) -> Option<Seconds>
where
    I: IntoIterator<Item = Seconds>,
{
    let mut best: Option<Seconds> = None;
    for threshold in thresholds {
        if threshold.as_f64() > cap.as_f64() || threshold.is_nan() || cap.is_nan() {
            continue;
        }
        best = match best {
            Some(current) if current >= threshold => Some(current),
            _ => Some(threshold),
        };
    }
    best
}

/// Ordered table of stages keyed by threshold.
pub struct StageScheduler<A, const CAPACITY: usize = MAX_STAGES> {
    stages: Vec<StageEntry<A>, CAPACITY>,
}

impl<A, const CAPACITY: usize> StageScheduler<A, CAPACITY>
where
    A: Stage,
{
    /// Creates an empty scheduler.
    #[must_use]
    pub const fn new() -> Self {
        Self { stages: Vec::new() }
    }

    /// Registers `action` at `threshold`, replacing any action already bound to
    /// that threshold.
    ///
    /// Returns the scheduler so registrations can be chained with `?`.
    pub fn add_stage(
        &mut self,
        threshold: impl Into<Seconds>,
        action: A,
    ) -> Result<&mut Self, StageRegistryError> {
        let threshold = threshold.into();
        if threshold.is_nan() {
            return Err(StageRegistryError::InvalidThreshold);
        }

        match self
            .stages
            .binary_search_by(|entry| entry.threshold.cmp(&threshold))
        {
            Ok(index) => {
                self.stages[index].action = action;
            }
            Err(index) => {
                self.stages
                    .insert(index, StageEntry { threshold, action })
                    .map_err(|_| StageRegistryError::TableFull)?;
            }
        }

        Ok(self)
    }

    /// By-value form of [`add_stage`](Self::add_stage) for building a scheduler
    /// in a single expression.
    pub fn with_stage(
        mut self,
        threshold: impl Into<Seconds>,
        action: A,
    ) -> Result<Self, StageRegistryError> {
        self.add_stage(threshold, action)?;
        Ok(self)
    }

    /// Returns the number of registered stages.
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Returns `true` when no stages are registered.
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Returns `true` when `threshold` has a stage bound to it.
    pub fn contains(&self, threshold: impl Into<Seconds>) -> bool {
        let threshold = threshold.into();
        self.stages
            .binary_search_by(|entry| entry.threshold.cmp(&threshold))
            .is_ok()
    }

    /// Iterates over registered thresholds in ascending order.
    pub fn thresholds(&self) -> impl Iterator<Item = Seconds> + '_ {
        self.stages.iter().map(|entry| entry.threshold)
    }

    /// Returns the threshold that would be selected with `remaining` seconds left.
    pub fn target_for(&self, remaining: impl Into<Seconds>) -> Option<Seconds> {
        select_target(self.thresholds(), remaining.into())
    }

    /// Runs the best-matching stage and reports whether one ran.
    pub fn run<S>(&mut self, remaining: impl Into<Seconds>, telemetry: &mut S) -> bool
    where
        S: TelemetrySink + ?Sized,
    {
        self.dispatch(remaining, telemetry).ran()
    }

    /// Runs the best-matching stage and reports what happened.
    ///
    /// Publishes the remaining time and the selected target before looking the
    /// target up. An expired countdown only emits a diagnostic line.
    pub fn dispatch<S>(&mut self, remaining: impl Into<Seconds>, telemetry: &mut S) -> Dispatch
    where
        S: TelemetrySink + ?Sized,
    {
        let remaining = remaining.into();
        if remaining.is_expired() {
            telemetry.diagnostic(format_args!(
                "StageScheduler::run time remaining <= 0 := {}",
                remaining.as_f64()
            ));
            return Dispatch::Expired { remaining };
        }

        telemetry.publish(TelemetryKey::TimeLeft, remaining.as_f64());

        let target = self.target_for(remaining);
        telemetry.publish(
            TelemetryKey::TargetStage,
            target.map_or(NO_TARGET_SENTINEL, Seconds::as_f64),
        );

        let Some(threshold) = target else {
            return Dispatch::NoMatch;
        };

        match self
            .stages
            .binary_search_by(|entry| entry.threshold.cmp(&threshold))
        {
            Ok(index) => {
                self.stages[index].action.execute();
                Dispatch::Ran { threshold }
            }
            Err(_) => Dispatch::NoMatch,
        }
    }
}

impl<A, const CAPACITY: usize> Default for StageScheduler<A, CAPACITY>
where
    A: Stage,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<A, const CAPACITY: usize> fmt::Debug for StageScheduler<A, CAPACITY> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.stages.iter().map(|entry| entry.threshold))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::NullTelemetry;
    use core::cell::Cell;

    #[test]
    fn selects_greatest_threshold_beneath_cap() {
        let thresholds = [Seconds::new(12.0), Seconds::new(5.0), Seconds::new(10.0)];
        assert_eq!(
            select_target(thresholds, Seconds::new(11.0)),
            Some(Seconds::new(10.0))
        );
        assert_eq!(
            select_target(thresholds, Seconds::new(12.0)),
            Some(Seconds::new(12.0))
        );
        assert_eq!(select_target(thresholds, Seconds::new(4.0)), None);
        assert_eq!(select_target([], Seconds::new(4.0)), None);
    }

    #[test]
    fn select_target_ignores_nan_cap() {
        let thresholds = [Seconds::new(1.0)];
        assert_eq!(select_target(thresholds, Seconds::new(f64::NAN)), None);
    }

    #[test]
    fn registration_keeps_table_sorted() {
        let mut scheduler: StageScheduler<fn()> = StageScheduler::new();
        scheduler
            .add_stage(12.0, || {})
            .and_then(|s| s.add_stage(5.0, || {}))
            .and_then(|s| s.add_stage(10.0, || {}))
            .expect("registration");

        let mut ordered = scheduler.thresholds();
        assert_eq!(ordered.next(), Some(Seconds::new(5.0)));
        assert_eq!(ordered.next(), Some(Seconds::new(10.0)));
        assert_eq!(ordered.next(), Some(Seconds::new(12.0)));
        assert_eq!(ordered.next(), None);
    }

    #[test]
    fn rejects_nan_threshold() {
        let mut scheduler: StageScheduler<fn()> = StageScheduler::new();
        let err = scheduler.add_stage(f64::NAN, || {}).unwrap_err();
        assert_eq!(err, StageRegistryError::InvalidThreshold);
        assert!(scheduler.is_empty());
    }

    #[test]
    fn full_table_still_accepts_overwrites() {
        let mut scheduler: StageScheduler<fn(), 2> = StageScheduler::new();
        scheduler
            .add_stage(1.0, || {})
            .and_then(|s| s.add_stage(2.0, || {}))
            .expect("registration");

        assert_eq!(
            scheduler.add_stage(3.0, || {}).unwrap_err(),
            StageRegistryError::TableFull
        );
        assert!(scheduler.add_stage(2.0, || {}).is_ok());
        assert_eq!(scheduler.len(), 2);
    }

    #[test]
    fn expired_dispatch_reports_remaining() {
        let hits = Cell::new(0u32);
        let mut scheduler: StageScheduler<_, 4> = StageScheduler::new();
        scheduler
            .add_stage(0.0, || hits.set(hits.get() + 1))
            .expect("registration");

        let outcome = scheduler.dispatch(-0.5, &mut NullTelemetry);
        assert_eq!(
            outcome,
            Dispatch::Expired {
                remaining: Seconds::new(-0.5)
            }
        );
        assert_eq!(hits.get(), 0);
    }

    #[test]
    fn display_uses_millisecond_precision() {
        let mut buffer: heapless::String<16> = heapless::String::new();
        core::fmt::write(&mut buffer, format_args!("{}", Seconds::new(1.5))).unwrap();
        assert_eq!(buffer.as_str(), "1.500s");
    }
}
