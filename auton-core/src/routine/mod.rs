//! Autonomous routine driver.
//!
//! [`AutonRoutine`] owns one stage table together with the clock and telemetry
//! sink it reports through, so the host periodic loop only has to call
//! [`AutonRoutine::run`] once per control cycle.

use core::time::Duration;

use crate::clock::MatchClock;
use crate::stages::{Dispatch, MAX_STAGES, Seconds, Stage, StageScheduler};
use crate::telemetry::TelemetrySink;

#[cfg(feature = "embassy")]
mod periodic;

#[cfg(feature = "embassy")]
pub use periodic::run_periodic;

/// Control-loop cadence used when the caller does not specify one.
pub const DEFAULT_TICK_PERIOD: Duration = Duration::from_millis(20);

/// A single autonomous routine: stage table, clock, and telemetry sink.
pub struct AutonRoutine<C, S, A, const CAPACITY: usize = MAX_STAGES>
where
    C: MatchClock,
    S: TelemetrySink,
    A: Stage,
{
    clock: C,
    telemetry: S,
    scheduler: StageScheduler<A, CAPACITY>,
    last_dispatch: Option<Dispatch>,
    ticks: u32,
}

impl<C, S, A, const CAPACITY: usize> AutonRoutine<C, S, A, CAPACITY>
where
    C: MatchClock,
    S: TelemetrySink,
    A: Stage,
{
    /// Bundles an already populated scheduler with its collaborators.
    pub fn new(clock: C, telemetry: S, scheduler: StageScheduler<A, CAPACITY>) -> Self {
        Self {
            clock,
            telemetry,
            scheduler,
            last_dispatch: None,
            ticks: 0,
        }
    }

    /// Reads the clock and runs the matching stage. Returns `true` when a stage ran.
    pub fn run(&mut self) -> bool {
        self.tick().ran()
    }

    /// Reads the clock and runs the matching stage, reporting the full outcome.
    pub fn tick(&mut self) -> Dispatch {
        let remaining = self.clock.remaining();
        let dispatch = self.scheduler.dispatch(remaining, &mut self.telemetry);
        self.ticks = self.ticks.saturating_add(1);
        self.last_dispatch = Some(dispatch);
        dispatch
    }

    /// Current clock reading.
    pub fn remaining(&self) -> Seconds {
        self.clock.remaining()
    }

    /// Number of ticks dispatched so far.
    pub const fn ticks(&self) -> u32 {
        self.ticks
    }

    /// Outcome of the most recent tick.
    pub const fn last_dispatch(&self) -> Option<Dispatch> {
        self.last_dispatch
    }

    /// Clears the tick counter and last outcome. Registrations are kept.
    pub fn reset_stats(&mut self) {
        self.ticks = 0;
        self.last_dispatch = None;
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn clock_mut(&mut self) -> &mut C {
        &mut self.clock
    }

    pub fn telemetry(&self) -> &S {
        &self.telemetry
    }

    pub fn telemetry_mut(&mut self) -> &mut S {
        &mut self.telemetry
    }

    pub fn scheduler(&self) -> &StageScheduler<A, CAPACITY> {
        &self.scheduler
    }

    /// Mutable access to the stage table, for setup before the periodic phase.
    pub fn scheduler_mut(&mut self) -> &mut StageScheduler<A, CAPACITY> {
        &mut self.scheduler
    }

    /// Consumes the routine and returns its parts.
    pub fn into_parts(self) -> (C, S, StageScheduler<A, CAPACITY>) {
        (self.clock, self.telemetry, self.scheduler)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SimulatedClock;
    use crate::telemetry::{NullTelemetry, TelemetryKey, TelemetryRecorder};
    use core::cell::Cell;

    #[test]
    fn run_reads_injected_clock() {
        let hits = Cell::new(0u32);
        let mut scheduler: StageScheduler<_, 4> = StageScheduler::new();
        scheduler
            .add_stage(10.0, || hits.set(hits.get() + 1))
            .expect("registration");

        let mut routine = AutonRoutine::new(Seconds::new(11.0), NullTelemetry, scheduler);
        assert!(routine.run());
        assert!(routine.run());
        assert_eq!(hits.get(), 2);
        assert_eq!(routine.ticks(), 2);
        assert_eq!(
            routine.last_dispatch(),
            Some(Dispatch::Ran {
                threshold: Seconds::new(10.0)
            })
        );
    }

    #[test]
    fn tick_publishes_through_owned_sink() {
        let scheduler: StageScheduler<fn(), 4> = StageScheduler::new();
        let mut routine = AutonRoutine::new(
            SimulatedClock::autonomous(),
            TelemetryRecorder::<8>::new(),
            scheduler,
        );

        assert_eq!(routine.tick(), Dispatch::NoMatch);
        assert_eq!(
            routine.telemetry().latest_reading(TelemetryKey::TimeLeft),
            Some(15.0)
        );

        routine.clock_mut().set_remaining(0.0);
        assert!(!routine.run());
        assert_eq!(routine.telemetry().diagnostics().count(), 1);

        routine.reset_stats();
        assert_eq!(routine.ticks(), 0);
        assert_eq!(routine.last_dispatch(), None);
    }
}
