use core::cell::{Cell, RefCell};
use core::time::Duration;

use auton_core::clock::{ClockInstant, CountdownClock, MatchClock, SimulatedClock, TimeSource};
use auton_core::plans::{self, SCORE_PLAN, StagePlan};
use auton_core::routine::{AutonRoutine, DEFAULT_TICK_PERIOD};
use auton_core::stages::{Dispatch, Seconds, StageScheduler};
use auton_core::telemetry::{NullTelemetry, TelemetryKey, TelemetryRecorder};

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd)]
struct MillisInstant(u64);

impl ClockInstant for MillisInstant {
    fn saturating_duration_since(&self, earlier: Self) -> Duration {
        Duration::from_millis(self.0.saturating_sub(earlier.0))
    }
}

#[derive(Default)]
struct SteppedSource {
    now_ms: Cell<u64>,
}

impl SteppedSource {
    fn advance(&self, step: Duration) {
        let millis = u64::try_from(step.as_millis()).expect("step fits in u64");
        self.now_ms.set(self.now_ms.get() + millis);
    }
}

impl TimeSource for &SteppedSource {
    type Instant = MillisInstant;

    fn now(&self) -> MillisInstant {
        MillisInstant(self.now_ms.get())
    }
}

fn score_routine<'a>(
    log: &'a RefCell<Vec<&'static str>>,
) -> StageScheduler<Box<dyn FnMut() + 'a>, 8> {
    let mut scheduler: StageScheduler<Box<dyn FnMut() + 'a>, 8> = StageScheduler::new();
    plans::register_plan(&mut scheduler, &SCORE_PLAN, |stage: &'static StagePlan| {
        Box::new(move || log.borrow_mut().push(stage.label)) as Box<dyn FnMut() + 'a>
    })
    .expect("plan registration");
    scheduler
}

#[test]
fn countdown_drives_stages_in_chronological_order() {
    let log = RefCell::new(Vec::new());
    let source = SteppedSource::default();
    let mut clock = CountdownClock::autonomous(&source);
    clock.start();

    let mut routine = AutonRoutine::new(clock, NullTelemetry, score_routine(&log));

    let mut ticks = 0u32;
    while routine.run() || !routine.remaining().is_expired() {
        source.advance(DEFAULT_TICK_PERIOD);
        ticks += 1;
        assert!(ticks < 1_000, "routine never expired");
    }

    let mut transitions: Vec<&'static str> = log.borrow().clone();
    transitions.dedup();
    assert_eq!(
        transitions,
        vec!["raise-arm", "release-piece", "drive-backward", "stow-arm"]
    );
    // 15s at 20ms per tick; the 0s stage covers every tick before expiry.
    assert_eq!(log.borrow().len(), 750);
    assert_eq!(
        routine.last_dispatch(),
        Some(Dispatch::Expired {
            remaining: Seconds::ZERO
        })
    );
}

#[test]
fn countdown_that_never_started_dispatches_nothing() {
    let log = RefCell::new(Vec::new());
    let source = SteppedSource::default();
    let clock = CountdownClock::autonomous(&source);
    let mut routine = AutonRoutine::new(clock, TelemetryRecorder::<16>::new(), score_routine(&log));

    assert!(!routine.run());
    assert!(log.borrow().is_empty());
    assert_eq!(routine.telemetry().diagnostics().count(), 1);
    assert_eq!(routine.telemetry().latest_reading(TelemetryKey::TimeLeft), None);
}

#[test]
fn simulated_clock_window_reinvokes_stage_each_tick() {
    let hits = Cell::new(0u32);
    let mut scheduler: StageScheduler<_, 2> = StageScheduler::new();
    scheduler
        .add_stage(10.0, || hits.set(hits.get() + 1))
        .expect("registration");

    let mut routine = AutonRoutine::new(SimulatedClock::autonomous(), NullTelemetry, scheduler);
    routine.clock_mut().set_remaining(11.0);
    for _ in 0..50 {
        assert!(routine.run());
        routine.clock_mut().advance(Duration::from_millis(20));
    }

    assert_eq!(hits.get(), 50);
    assert_eq!(routine.ticks(), 50);
}

#[test]
fn routine_parts_round_trip() {
    let scheduler: StageScheduler<fn(), 2> = StageScheduler::new();
    let routine = AutonRoutine::new(Seconds::new(3.0), NullTelemetry, scheduler);
    let (clock, _, scheduler) = routine.into_parts();

    assert_eq!(clock.remaining(), Seconds::new(3.0));
    assert!(scheduler.is_empty());
}
