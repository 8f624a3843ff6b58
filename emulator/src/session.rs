use std::cell::RefCell;
use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::rc::Rc;
use std::time::{Duration, Instant as HostInstant};

use auton_core::clock::SimulatedClock;
use auton_core::plans::{self, RoutinePlan, StagePlan};
use auton_core::repl::catalog::{self, COMMANDS};
use auton_core::repl::commands::{
    CommandError, CommandExecutor, CommandOutcome, PlaySummary, StatusReport, TickReport,
};
use auton_core::routine::AutonRoutine;
use auton_core::stages::{BoxedStage, Dispatch, Seconds, StageScheduler};
use auton_core::telemetry::{EventId, TelemetryEvent, TelemetryRecorder};

const TRANSCRIPT_DIR: &str = "transcripts";

type ActionLog = Rc<RefCell<Vec<&'static str>>>;

#[derive(Clone, Copy, Debug)]
pub struct TranscriptProfile {
    plan: &'static RoutinePlan,
}

impl TranscriptProfile {
    pub fn drive() -> Self {
        Self {
            plan: &plans::DRIVE_PLAN,
        }
    }

    pub fn all() -> impl Iterator<Item = Self> {
        plans::ROUTINE_PLANS.iter().map(|plan| Self { plan })
    }

    pub fn name(self) -> &'static str {
        self.plan.name
    }

    pub fn plan(self) -> &'static RoutinePlan {
        self.plan
    }

    pub fn log_path(self) -> PathBuf {
        PathBuf::from(TRANSCRIPT_DIR).join(format!("emulator-{}.log", self.plan.name))
    }

    pub fn header(self) -> String {
        format!(
            "Autonomous Stage Emulator {} transcript ({})",
            self.plan.name, self.plan.description
        )
    }

    pub fn from_tag(tag: &str) -> Result<Self, String> {
        plans::find(tag).map(|plan| Self { plan }).ok_or_else(|| {
            format!(
                "Unknown transcript profile `{tag}` (expected one of: {})",
                profile_list()
            )
        })
    }
}

pub struct Session {
    executor: CommandExecutor<TelemetryRecorder, BoxedStage<'static>>,
    profile: TranscriptProfile,
    actions: ActionLog,
    transcript: TranscriptLogger,
    started_at: HostInstant,
    next_event: EventId,
}

impl Session {
    pub fn new(profile: TranscriptProfile) -> io::Result<Self> {
        let transcript = TranscriptLogger::new(profile)?;
        let actions: ActionLog = Rc::new(RefCell::new(Vec::new()));

        let mut scheduler = StageScheduler::new();
        plans::register_plan(&mut scheduler, profile.plan(), |stage: &'static StagePlan| {
            let actions = Rc::clone(&actions);
            Box::new(move || actions.borrow_mut().push(stage.label)) as BoxedStage<'static>
        })
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err.to_string()))?;

        let routine = AutonRoutine::new(
            SimulatedClock::autonomous(),
            TelemetryRecorder::new(),
            scheduler,
        );

        Ok(Self {
            executor: CommandExecutor::new(routine),
            profile,
            actions,
            transcript,
            started_at: HostInstant::now(),
            next_event: 0,
        })
    }

    pub fn profile(&self) -> TranscriptProfile {
        self.profile
    }

    pub fn handle_command(&mut self, line: &str) -> io::Result<Vec<String>> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }

        let elapsed = self.started_at.elapsed();
        self.transcript
            .append_line(elapsed, TranscriptRole::Host, trimmed)?;

        let mut lines = match self.executor.execute(trimmed) {
            Ok(outcome) => self.describe_outcome(&outcome),
            Err(CommandError::Parse(err)) => vec![format!("ERR syntax {err}")],
            Err(err) => vec![format!("ERR {err}")],
        };
        lines.extend(self.drain_actions());
        lines.extend(self.drain_diagnostics());

        self.record_output(elapsed, &lines)?;
        Ok(lines)
    }

    fn describe_outcome(&self, outcome: &CommandOutcome<'_>) -> Vec<String> {
        match outcome {
            CommandOutcome::Tick(report) => vec![self.describe_tick(report)],
            CommandOutcome::Advanced { remaining } => vec![format!("OK clock t={remaining}")],
            CommandOutcome::RemainingSet { remaining } => {
                vec![format!("OK remaining set t={remaining}")]
            }
            CommandOutcome::Played(summary) => self.describe_play(summary),
            CommandOutcome::Stages(thresholds) => {
                let mut lines = vec![format!(
                    "OK stages plan={} count={}",
                    self.profile.name(),
                    thresholds.len()
                )];
                // Chronological order: highest threshold runs first.
                for threshold in thresholds.iter().rev() {
                    lines.push(format!("  {threshold} {}", self.label_for(*threshold)));
                }
                lines
            }
            CommandOutcome::Status(status) => vec![self.describe_status(status)],
            CommandOutcome::Reset { remaining } => {
                vec![format!("OK reset t={remaining} ticks=0")]
            }
            CommandOutcome::Help { topic } => describe_help(*topic),
        }
    }

    fn describe_tick(&self, report: &TickReport) -> String {
        format!(
            "OK tick t={} {}",
            report.remaining,
            self.describe_dispatch(report.dispatch)
        )
    }

    fn describe_dispatch(&self, dispatch: Dispatch) -> String {
        match dispatch {
            Dispatch::Ran { threshold } => {
                format!("ran stage={threshold} ({})", self.label_for(threshold))
            }
            Dispatch::NoMatch => "no-match".to_string(),
            Dispatch::Expired { .. } => "expired".to_string(),
        }
    }

    fn describe_play(&self, summary: &PlaySummary) -> Vec<String> {
        let mut lines = vec![format!(
            "OK play step={} ticks={} idle={} {}",
            format_duration_short(summary.step),
            summary.ticks,
            summary.idle_ticks,
            if summary.expired {
                "expired"
            } else {
                "tick-limit"
            }
        )];

        for window in &summary.windows {
            lines.push(format!(
                "  stage={} ({}) entered t={} ticks={}",
                window.threshold,
                self.label_for(window.threshold),
                window.entered_at,
                window.ticks
            ));
        }

        lines
    }

    fn describe_status(&self, status: &StatusReport) -> String {
        let last = status
            .last_dispatch
            .map_or_else(|| "none".to_string(), |dispatch| self.describe_dispatch(dispatch));
        format!(
            "OK status plan={} t={} period={} ticks={} stages={} last={last}",
            self.profile.name(),
            status.remaining,
            status.period,
            status.ticks,
            status.stage_count,
        )
    }

    fn label_for(&self, threshold: Seconds) -> &'static str {
        self.profile
            .plan()
            .stage_at(threshold)
            .map_or("unlabelled", |stage| stage.label)
    }

    /// Echoes executed stage actions, collapsing repeats of the same label.
    fn drain_actions(&self) -> Vec<String> {
        let executed: Vec<&'static str> = self.actions.borrow_mut().drain(..).collect();
        let mut lines = Vec::new();
        let mut iter = executed.into_iter().peekable();
        while let Some(label) = iter.next() {
            let mut count = 1usize;
            while iter.next_if_eq(&label).is_some() {
                count += 1;
            }
            if count == 1 {
                lines.push(format!("  action {label}"));
            } else {
                lines.push(format!("  action {label} x{count}"));
            }
        }
        lines
    }

    /// Reports diagnostics recorded since the previous command.
    fn drain_diagnostics(&mut self) -> Vec<String> {
        let telemetry = self.executor.routine().telemetry();
        let lines = telemetry
            .oldest_first()
            .filter(|record| record.id >= self.next_event)
            .filter_map(|record| match &record.event {
                TelemetryEvent::Diagnostic { note, truncated } => Some(if *truncated {
                    format!("  diag {note}...")
                } else {
                    format!("  diag {note}")
                }),
                TelemetryEvent::Reading { .. } => None,
            })
            .collect();

        if let Some(latest) = telemetry.latest() {
            self.next_event = latest.id.wrapping_add(1);
        }
        lines
    }

    fn record_output(&mut self, elapsed: Duration, lines: &[String]) -> io::Result<()> {
        for line in lines {
            self.transcript
                .append_line(elapsed, TranscriptRole::Emulator, line)?;
        }
        Ok(())
    }
}

fn describe_help(topic: Option<&str>) -> Vec<String> {
    let mut lines = Vec::new();
    match topic {
        Some(target) => {
            if let Some(spec) = catalog::find(target) {
                lines.push(spec.usage.to_string());
            } else {
                lines.push(format!("No help available for `{target}`."));
                lines.push(format!("Available topics: {}", help_topic_list()));
            }
        }
        None => {
            lines.push("Available commands:".to_string());
            for spec in COMMANDS {
                lines.push(format!("  {}", spec.usage));
            }
            lines.push("Type `help <topic>` for a specific command.".to_string());
        }
    }
    lines
}

struct TranscriptLogger {
    writer: BufWriter<fs::File>,
}

impl TranscriptLogger {
    fn new(profile: TranscriptProfile) -> io::Result<Self> {
        let path = profile.log_path();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)?;

        let mut logger = Self {
            writer: BufWriter::new(file),
        };

        logger.write_header(profile)?;
        Ok(logger)
    }

    fn write_header(&mut self, profile: TranscriptProfile) -> io::Result<()> {
        writeln!(self.writer, "# {}", profile.header())?;
        writeln!(
            self.writer,
            "# Timestamps are milliseconds since session start"
        )?;
        writeln!(self.writer)?;
        self.writer.flush()
    }

    fn append_line(
        &mut self,
        elapsed: Duration,
        role: TranscriptRole,
        line: &str,
    ) -> io::Result<()> {
        writeln!(
            self.writer,
            "[+{:>6} ms] {} {}",
            elapsed.as_millis(),
            role.prefix(),
            line
        )?;
        self.writer.flush()
    }
}

enum TranscriptRole {
    Host,
    Emulator,
}

impl TranscriptRole {
    fn prefix(&self) -> &'static str {
        match self {
            TranscriptRole::Host => "HOST>",
            TranscriptRole::Emulator => "EMU <",
        }
    }
}

fn help_topic_list() -> String {
    COMMANDS
        .iter()
        .map(|spec| spec.name)
        .collect::<Vec<_>>()
        .join(", ")
}

fn profile_list() -> String {
    plans::ROUTINE_PLANS
        .iter()
        .map(|plan| plan.name)
        .collect::<Vec<_>>()
        .join("|")
}

fn format_duration_short(duration: Duration) -> String {
    if duration.as_secs() == 0 {
        format!("{}ms", duration.as_millis())
    } else {
        format!("{:.3}s", duration.as_secs_f64())
    }
}
