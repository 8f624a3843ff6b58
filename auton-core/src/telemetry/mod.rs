//! Dashboard telemetry and diagnostic log shared by firmware and host targets.
//!
//! The scheduler reports through a [`TelemetrySink`] instead of reaching for a
//! global dashboard. [`TelemetryRecorder`] keeps the most recent readings in a
//! fixed-size ring so host tooling and tests can inspect what was published,
//! while firmware builds may forward straight to defmt via `DefmtTelemetry`.

use core::fmt::{self, Write as _};

use heapless::{HistoryBuf, OldestOrdered, String};

/// Maximum length in bytes for a diagnostic note. Longer messages are truncated.
pub const MAX_DIAGNOSTIC_NOTE: usize = 96;

/// Total number of telemetry entries retained in memory.
pub const TELEMETRY_RING_CAPACITY: usize = 128;

/// Identifier assigned to each recorded telemetry entry.
pub type EventId = u32;

/// Named numeric readings published on every tick.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TelemetryKey {
    /// Seconds left in the autonomous period.
    TimeLeft,
    /// Threshold of the stage selected for this tick.
    TargetStage,
}

impl TelemetryKey {
    /// Dashboard key used when publishing the reading.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            TelemetryKey::TimeLeft => "Auton time left",
            TelemetryKey::TargetStage => "Auton Target Stage",
        }
    }
}

impl fmt::Display for TelemetryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fire-and-forget destination for dashboard readings and diagnostic lines.
pub trait TelemetrySink {
    /// Publishes a named numeric reading.
    fn publish(&mut self, key: TelemetryKey, value: f64);

    /// Emits a plain-text diagnostic line.
    fn diagnostic(&mut self, message: fmt::Arguments<'_>);
}

impl<T> TelemetrySink for &mut T
where
    T: TelemetrySink + ?Sized,
{
    fn publish(&mut self, key: TelemetryKey, value: f64) {
        (**self).publish(key, value);
    }

    fn diagnostic(&mut self, message: fmt::Arguments<'_>) {
        (**self).diagnostic(message);
    }
}

/// Sink that drops everything it receives.
#[derive(Copy, Clone, Debug, Default)]
pub struct NullTelemetry;

impl TelemetrySink for NullTelemetry {
    fn publish(&mut self, _: TelemetryKey, _: f64) {}

    fn diagnostic(&mut self, _: fmt::Arguments<'_>) {}
}

/// Bounded diagnostic text.
pub type DiagnosticNote = String<MAX_DIAGNOSTIC_NOTE>;

/// Payload of a telemetry record.
#[derive(Clone, Debug, PartialEq)]
pub enum TelemetryEvent {
    /// Numeric dashboard reading.
    Reading { key: TelemetryKey, value: f64 },
    /// Diagnostic log line. `truncated` is set when the note did not fit.
    Diagnostic { note: DiagnosticNote, truncated: bool },
}

/// Telemetry record stored in the ring buffer.
#[derive(Clone, Debug, PartialEq)]
pub struct TelemetryRecord {
    pub id: EventId,
    pub event: TelemetryEvent,
}

/// Telemetry ring buffer type alias.
pub type TelemetryRing<const CAPACITY: usize = TELEMETRY_RING_CAPACITY> =
    HistoryBuf<TelemetryRecord, CAPACITY>;

/// Records telemetry into a fixed-size ring buffer.
pub struct TelemetryRecorder<const CAPACITY: usize = TELEMETRY_RING_CAPACITY> {
    ring: TelemetryRing<CAPACITY>,
    next_event_id: EventId,
}

impl<const CAPACITY: usize> TelemetryRecorder<CAPACITY> {
    /// Creates a new telemetry recorder with an empty history.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ring: HistoryBuf::new(),
            next_event_id: 0,
        }
    }

    /// Returns an iterator over the recorded telemetry in chronological order.
    pub fn oldest_first(&self) -> OldestOrdered<'_, TelemetryRecord> {
        self.ring.oldest_ordered()
    }

    /// Returns the most recent telemetry record, if available.
    pub fn latest(&self) -> Option<&TelemetryRecord> {
        self.ring.recent()
    }

    /// Returns the most recent value published under `key`.
    pub fn latest_reading(&self, key: TelemetryKey) -> Option<f64> {
        self.oldest_first()
            .filter_map(|record| match record.event {
                TelemetryEvent::Reading {
                    key: recorded,
                    value,
                } if recorded == key => Some(value),
                _ => None,
            })
            .last()
    }

    /// Iterates over retained diagnostic notes, oldest first.
    pub fn diagnostics(&self) -> impl Iterator<Item = &str> + '_ {
        self.oldest_first()
            .filter_map(|record| match &record.event {
                TelemetryEvent::Diagnostic { note, .. } => Some(note.as_str()),
                TelemetryEvent::Reading { .. } => None,
            })
    }

    /// Returns the number of records currently stored.
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    /// Returns `true` when no telemetry records are stored.
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Drops all retained records. Event identifiers keep counting.
    pub fn clear(&mut self) {
        self.ring.clear();
    }

    /// Records an arbitrary telemetry event.
    pub fn record(&mut self, event: TelemetryEvent) -> EventId {
        let id = self.next_event_id;
        self.next_event_id = self.next_event_id.wrapping_add(1);

        self.ring.write(TelemetryRecord { id, event });

        id
    }
}

impl<const CAPACITY: usize> Default for TelemetryRecorder<CAPACITY> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const CAPACITY: usize> TelemetrySink for TelemetryRecorder<CAPACITY> {
    fn publish(&mut self, key: TelemetryKey, value: f64) {
        self.record(TelemetryEvent::Reading { key, value });
    }

    fn diagnostic(&mut self, message: fmt::Arguments<'_>) {
        let mut note = DiagnosticNote::new();
        let truncated = note.write_fmt(message).is_err();
        self.record(TelemetryEvent::Diagnostic { note, truncated });
    }
}

/// Sink that mirrors readings and diagnostics to the defmt logger.
#[cfg(feature = "defmt")]
#[derive(Copy, Clone, Debug, Default)]
pub struct DefmtTelemetry;

#[cfg(feature = "defmt")]
impl TelemetrySink for DefmtTelemetry {
    fn publish(&mut self, key: TelemetryKey, value: f64) {
        defmt::info!("{=str} = {=f64}", key.as_str(), value);
    }

    fn diagnostic(&mut self, message: fmt::Arguments<'_>) {
        defmt::warn!("{}", defmt::Display2Format(&message));
    }
}
