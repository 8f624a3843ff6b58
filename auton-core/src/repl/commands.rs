//! High-level REPL command dispatcher.
//!
//! Parsed commands drive an [`AutonRoutine`] whose clock is a
//! [`SimulatedClock`], letting an operator step through an autonomous period
//! tick by tick or play it out at a fixed cadence.

use core::fmt;
use core::time::Duration;

use heapless::Vec;

use crate::clock::SimulatedClock;
use crate::routine::{AutonRoutine, DEFAULT_TICK_PERIOD};
use crate::stages::{Dispatch, MAX_STAGES, Seconds, Stage};
use crate::telemetry::TelemetrySink;

use super::grammar::{self, Command};

/// Upper bound on ticks a single `play` may dispatch.
pub const MAX_PLAY_TICKS: u32 = 100_000;

/// Command execution successes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommandOutcome<'a, const CAPACITY: usize = MAX_STAGES> {
    Tick(TickReport),
    Advanced { remaining: Seconds },
    RemainingSet { remaining: Seconds },
    Played(PlaySummary<CAPACITY>),
    Stages(Vec<Seconds, CAPACITY>),
    Status(StatusReport),
    Reset { remaining: Seconds },
    Help { topic: Option<&'a str> },
}

/// Clock reading and outcome of a single tick.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TickReport {
    pub remaining: Seconds,
    pub dispatch: Dispatch,
}

/// Contiguous run of ticks that dispatched the same stage.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct StageWindow {
    pub threshold: Seconds,
    /// Clock reading on the first tick of the window.
    pub entered_at: Seconds,
    pub ticks: u32,
}

/// Summary of a `play` run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlaySummary<const CAPACITY: usize = MAX_STAGES> {
    pub step: Duration,
    pub ticks: u32,
    pub idle_ticks: u32,
    pub windows: Vec<StageWindow, CAPACITY>,
    /// `false` when the run stopped at [`MAX_PLAY_TICKS`] before expiring.
    pub expired: bool,
}

/// Snapshot reported by `status`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct StatusReport {
    pub remaining: Seconds,
    pub period: Seconds,
    pub ticks: u32,
    pub stage_count: usize,
    pub last_dispatch: Option<Dispatch>,
}

/// Errors surfaced while executing a command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommandError<'a> {
    Parse(grammar::ParseError<'a>),
    /// `play` was asked to step by zero.
    ZeroStep,
}

impl<'a> From<grammar::ParseError<'a>> for CommandError<'a> {
    fn from(error: grammar::ParseError<'a>) -> Self {
        Self::Parse(error)
    }
}

impl fmt::Display for CommandError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::Parse(err) => write!(f, "syntax {err}"),
            CommandError::ZeroStep => f.write_str("play step must be greater than zero"),
        }
    }
}

/// Executes REPL commands against a simulated routine.
pub struct CommandExecutor<S, A, const CAPACITY: usize = MAX_STAGES>
where
    S: TelemetrySink,
    A: Stage,
{
    routine: AutonRoutine<SimulatedClock, S, A, CAPACITY>,
}

impl<S, A, const CAPACITY: usize> CommandExecutor<S, A, CAPACITY>
where
    S: TelemetrySink,
    A: Stage,
{
    /// Creates an executor that owns the provided routine.
    pub fn new(routine: AutonRoutine<SimulatedClock, S, A, CAPACITY>) -> Self {
        Self { routine }
    }

    pub fn routine(&self) -> &AutonRoutine<SimulatedClock, S, A, CAPACITY> {
        &self.routine
    }

    pub fn routine_mut(&mut self) -> &mut AutonRoutine<SimulatedClock, S, A, CAPACITY> {
        &mut self.routine
    }

    /// Parses and executes a single command line.
    pub fn execute<'a>(
        &mut self,
        line: &'a str,
    ) -> Result<CommandOutcome<'a, CAPACITY>, CommandError<'a>> {
        let command = grammar::parse(line)?;
        self.apply(command)
    }

    /// Executes an already parsed command.
    pub fn apply<'a>(
        &mut self,
        command: Command<'a>,
    ) -> Result<CommandOutcome<'a, CAPACITY>, CommandError<'a>> {
        let outcome = match command {
            Command::Run => CommandOutcome::Tick(self.tick()),
            Command::Advance(step) => CommandOutcome::Advanced {
                remaining: self.routine.clock_mut().advance(step),
            },
            Command::Remaining(value) => {
                self.routine.clock_mut().set_remaining(value);
                CommandOutcome::RemainingSet { remaining: value }
            }
            Command::Play { step } => {
                CommandOutcome::Played(self.play(step.unwrap_or(DEFAULT_TICK_PERIOD))?)
            }
            Command::Stages => {
                CommandOutcome::Stages(self.routine.scheduler().thresholds().collect())
            }
            Command::Status => CommandOutcome::Status(self.status()),
            Command::Reset => {
                self.routine.clock_mut().reset();
                self.routine.reset_stats();
                CommandOutcome::Reset {
                    remaining: self.routine.remaining(),
                }
            }
            Command::Help(help) => CommandOutcome::Help { topic: help.topic },
        };

        Ok(outcome)
    }

    /// Dispatches one tick at the current clock reading.
    pub fn tick(&mut self) -> TickReport {
        let remaining = self.routine.remaining();
        let dispatch = self.routine.tick();
        TickReport {
            remaining,
            dispatch,
        }
    }

    /// Ticks every `step` until the clock expires.
    ///
    /// The final expired tick is counted but does not open a window.
    pub fn play<'a>(
        &mut self,
        step: Duration,
    ) -> Result<PlaySummary<CAPACITY>, CommandError<'a>> {
        if step.is_zero() {
            return Err(CommandError::ZeroStep);
        }

        let mut summary = PlaySummary {
            step,
            ticks: 0,
            idle_ticks: 0,
            windows: Vec::new(),
            expired: false,
        };

        while summary.ticks < MAX_PLAY_TICKS {
            let report = self.tick();
            summary.ticks += 1;

            match report.dispatch {
                Dispatch::Expired { .. } => {
                    summary.expired = true;
                    break;
                }
                Dispatch::NoMatch => summary.idle_ticks += 1,
                Dispatch::Ran { threshold } => {
                    record_window(&mut summary.windows, threshold, report.remaining);
                }
            }

            self.routine.clock_mut().advance(step);
        }

        Ok(summary)
    }

    /// Reports the current clock and tick statistics.
    pub fn status(&self) -> StatusReport {
        StatusReport {
            remaining: self.routine.remaining(),
            period: self.routine.clock().period(),
            ticks: self.routine.ticks(),
            stage_count: self.routine.scheduler().len(),
            last_dispatch: self.routine.last_dispatch(),
        }
    }
}

fn record_window<const CAPACITY: usize>(
    windows: &mut Vec<StageWindow, CAPACITY>,
    threshold: Seconds,
    remaining: Seconds,
) {
    if let Some(current) = windows.last_mut() {
        if current.threshold == threshold {
            current.ticks = current.ticks.saturating_add(1);
            return;
        }
    }

    // Full buffer: later windows are dropped.
    let _ = windows.push(StageWindow {
        threshold,
        entered_at: remaining,
        ticks: 1,
    });
}
