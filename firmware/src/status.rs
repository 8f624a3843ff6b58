#![cfg_attr(not(target_os = "none"), allow(dead_code))]

//! Shared status storage for the firmware target.
//!
//! Atomics track the active stage and the progress of the autonomous period so
//! the indicator task can read them without sharing the routine itself.

use portable_atomic::{AtomicBool, AtomicU8, Ordering};

const NO_STAGE: u8 = u8::MAX;

/// Index (within the running plan) of the last stage that executed.
static ACTIVE_STAGE: AtomicU8 = AtomicU8::new(NO_STAGE);
/// Set while the countdown is running.
static PERIOD_RUNNING: AtomicBool = AtomicBool::new(false);

/// Records that the stage at `index` executed. Returns `true` on a transition.
pub fn record_stage(index: u8) -> bool {
    ACTIVE_STAGE.swap(index, Ordering::Relaxed) != index
}

/// Returns the index of the last stage that executed, if any.
pub fn active_stage() -> Option<u8> {
    match ACTIVE_STAGE.load(Ordering::Relaxed) {
        NO_STAGE => None,
        index => Some(index),
    }
}

/// Marks the start of a new period and forgets the previous stage.
pub fn record_period_started() {
    ACTIVE_STAGE.store(NO_STAGE, Ordering::Relaxed);
    PERIOD_RUNNING.store(true, Ordering::Relaxed);
}

/// Marks the period as finished.
pub fn record_period_finished() {
    PERIOD_RUNNING.store(false, Ordering::Relaxed);
}

pub fn period_running() -> bool {
    PERIOD_RUNNING.load(Ordering::Relaxed)
}
