#![no_std]

#[cfg(feature = "alloc")]
extern crate alloc;

// Shared logic for time-gated autonomous routines.
//
// This crate stays portable across robot firmware and host tooling by avoiding
// the Rust standard library; clocks and telemetry are injected through traits.

pub mod clock;
pub mod plans;
pub mod repl;
pub mod routine;
pub mod stages;
pub mod telemetry;
