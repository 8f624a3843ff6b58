use auton_core::clock::{CountdownClock, EmbassyTimeSource};
use auton_core::routine::{AutonRoutine, DEFAULT_TICK_PERIOD, run_periodic};
use auton_core::telemetry::DefmtTelemetry;
use embassy_time::{Duration, Timer};

use crate::stage::{FIRMWARE_PLAN, FirmwareScheduler};
use crate::status;

/// Settling time between boot and the start of the period.
const START_DELAY: Duration = Duration::from_secs(2);

#[embassy_executor::task]
pub async fn run(scheduler: FirmwareScheduler) -> ! {
    let clock = CountdownClock::autonomous(EmbassyTimeSource);
    let mut routine = AutonRoutine::new(clock, DefmtTelemetry, scheduler);
    let tick_period =
        Duration::try_from(DEFAULT_TICK_PERIOD).expect("tick period fits the time driver");

    Timer::after(START_DELAY).await;

    defmt::info!(
        "autonomous start: plan {=str}, {=usize} stages",
        FIRMWARE_PLAN.name,
        routine.scheduler().len()
    );
    routine.clock_mut().start();
    status::record_period_started();

    let ticks = run_periodic(&mut routine, tick_period).await;

    routine.clock_mut().stop();
    status::record_period_finished();
    match status::active_stage() {
        Some(index) => defmt::info!(
            "autonomous finished after {=u32} ticks, last stage {=u8}",
            ticks,
            index
        ),
        None => defmt::warn!("autonomous finished after {=u32} ticks without a stage", ticks),
    }

    loop {
        core::future::pending::<()>().await;
    }
}
