use embassy_time::Ticker;

use super::AutonRoutine;
use crate::clock::MatchClock;
use crate::stages::{Dispatch, Stage};
use crate::telemetry::TelemetrySink;

/// Ticks `routine` every `period` until its clock expires.
///
/// Returns the number of ticks dispatched, including the final expired tick.
pub async fn run_periodic<C, S, A, const CAPACITY: usize>(
    routine: &mut AutonRoutine<C, S, A, CAPACITY>,
    period: embassy_time::Duration,
) -> u32
where
    C: MatchClock,
    S: TelemetrySink,
    A: Stage,
{
    let mut ticker = Ticker::every(period);
    loop {
        if let Dispatch::Expired { .. } = routine.tick() {
            return routine.ticks();
        }
        ticker.next().await;
    }
}
