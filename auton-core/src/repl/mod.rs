//! Operator REPL for stepping through a simulated autonomous period.
//!
//! The grammar lives in [`grammar`] and is implemented with a token/parse
//! pipeline that stays compatible with `no_std`; [`commands`] executes the
//! parsed commands against a simulated routine.

pub mod catalog;
pub mod commands;
pub mod grammar;
