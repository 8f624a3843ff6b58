#![cfg_attr(not(target_os = "none"), allow(dead_code))]

//! Stage actions executed by the firmware routine.

use auton_core::plans::{self, RoutinePlan, StagePlan};
use auton_core::stages::{Stage, StageRegistryError, StageScheduler};

/// Plan executed at boot.
pub const FIRMWARE_PLAN: &RoutinePlan = &plans::SCORE_PLAN;

/// Stage table capacity used on the target.
pub const FIRMWARE_STAGES: usize = 8;

/// Scheduler type driven by the firmware routine.
pub type FirmwareScheduler = StageScheduler<StageAction, FIRMWARE_STAGES>;

/// Action bound to one stage of a plan.
///
/// Executing the action hands the stage index to `notify` on every tick.
#[derive(Copy, Clone, Debug)]
pub struct StageAction {
    index: u8,
    notify: fn(u8),
}

impl Stage for StageAction {
    fn execute(&mut self) {
        (self.notify)(self.index);
    }
}

/// Builds the scheduler for `plan`. Stage indices follow the order of
/// `plan.stages`.
pub fn build_scheduler(
    plan: &RoutinePlan,
    notify: fn(u8),
) -> Result<FirmwareScheduler, StageRegistryError> {
    let mut scheduler = FirmwareScheduler::new();
    let mut next_index = 0u8;
    plans::register_plan(&mut scheduler, plan, |_: &'static StagePlan| {
        let action = StageAction {
            index: next_index,
            notify,
        };
        next_index = next_index.saturating_add(1);
        action
    })?;
    Ok(scheduler)
}

#[cfg(test)]
mod tests {
    use super::*;
    use auton_core::stages::Seconds;
    use auton_core::telemetry::NullTelemetry;
    use portable_atomic::{AtomicU32, Ordering};

    static NOTIFIED: AtomicU32 = AtomicU32::new(0);
    static LAST_INDEX: AtomicU32 = AtomicU32::new(u32::MAX);

    fn ignore(_index: u8) {}

    fn count_notification(index: u8) {
        NOTIFIED.fetch_add(1, Ordering::Relaxed);
        LAST_INDEX.store(u32::from(index), Ordering::Relaxed);
    }

    #[test]
    fn actions_are_numbered_in_plan_order() {
        let scheduler = build_scheduler(FIRMWARE_PLAN, ignore).expect("plan fits");
        assert_eq!(scheduler.len(), FIRMWARE_PLAN.stages.len());
        assert!(scheduler.contains(13.0));
        assert!(scheduler.contains(0.0));
    }

    #[test]
    fn every_tick_notifies_the_running_stage() {
        let mut scheduler = build_scheduler(FIRMWARE_PLAN, count_notification).expect("plan fits");

        for remaining in [14.0, 13.5, 12.0, 11.5, 10.0, 5.0, 1.0] {
            assert!(scheduler.run(Seconds::new(remaining), &mut NullTelemetry));
        }

        assert_eq!(NOTIFIED.load(Ordering::Relaxed), 7);
        // stow-arm is the last of the four stages.
        assert_eq!(LAST_INDEX.load(Ordering::Relaxed), 3);
    }
}
