//! Structured log events and session counters.
//!
//! The sorter and the watcher report everything they do as [`LogEvent`]s sent
//! through an [`EventSender`]. Whoever holds the matching [`EventReceiver`]
//! (the terminal front end, a test) renders or inspects them. Counters live in
//! [`SortStats`] and can be read from any thread while a session runs.

use chrono::{DateTime, Local};
use crossbeam_channel::{Receiver, Sender, unbounded};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Display class of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

/// What happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum EventKind {
    /// The file matched the exclusion list and was left in place.
    Excluded { filename: String, pattern: String },
    /// No rule covers the file's extension.
    NoRule { filename: String },
    /// A rule matched but its destination directory does not exist.
    DestinationMissing {
        filename: String,
        destination: PathBuf,
    },
    /// The file was renamed to avoid overwriting an existing one.
    DuplicateRenamed { filename: String, new_name: String },
    /// The file was moved.
    Moved {
        filename: String,
        /// Name of the destination directory, e.g. `Pictures`.
        destination: String,
        /// Final path of the file.
        path: PathBuf,
    },
    /// The move failed; the file stays where the failure left it.
    MoveError { filename: String, detail: String },
    MonitoringStarted { directory: PathBuf },
    MonitoringStopped,
    StartFailed { reason: String },
}

impl EventKind {
    pub fn severity(&self) -> Severity {
        match self {
            EventKind::NoRule { .. }
            | EventKind::MonitoringStarted { .. }
            | EventKind::MonitoringStopped => Severity::Info,
            EventKind::Moved { .. } => Severity::Success,
            EventKind::Excluded { .. } | EventKind::DuplicateRenamed { .. } => Severity::Warning,
            EventKind::DestinationMissing { .. }
            | EventKind::MoveError { .. }
            | EventKind::StartFailed { .. } => Severity::Error,
        }
    }

    /// The file this event is about, if it is a per-file event.
    pub fn filename(&self) -> Option<&str> {
        match self {
            EventKind::Excluded { filename, .. }
            | EventKind::NoRule { filename }
            | EventKind::DestinationMissing { filename, .. }
            | EventKind::DuplicateRenamed { filename, .. }
            | EventKind::Moved { filename, .. }
            | EventKind::MoveError { filename, .. } => Some(filename),
            _ => None,
        }
    }

    /// Human-readable one-line message.
    pub fn message(&self) -> String {
        match self {
            EventKind::Excluded { filename, pattern } => {
                format!("Excluded: {} (matches '{}')", filename, pattern)
            }
            EventKind::NoRule { filename } => {
                format!("No sorting rule for {}, leaving it in place", filename)
            }
            EventKind::DestinationMissing {
                filename,
                destination,
            } => format!(
                "Destination {} doesn't exist, keeping {}",
                destination.display(),
                filename
            ),
            EventKind::DuplicateRenamed { filename, new_name } => {
                format!("Duplicate detected: {} renamed to {}", filename, new_name)
            }
            EventKind::Moved {
                filename,
                destination,
                ..
            } => format!("MOVED: {} → {}", filename, destination),
            EventKind::MoveError { filename, detail } => {
                format!("Error moving {}: {}", filename, detail)
            }
            EventKind::MonitoringStarted { directory } => {
                format!("Started monitoring {}", directory.display())
            }
            EventKind::MonitoringStopped => "Stopped monitoring".to_string(),
            EventKind::StartFailed { reason } => format!("Failed to start: {}", reason),
        }
    }
}

/// A timestamped event.
#[derive(Debug, Clone, Serialize)]
pub struct LogEvent {
    pub timestamp: DateTime<Local>,
    pub severity: Severity,
    #[serde(flatten)]
    pub kind: EventKind,
}

impl LogEvent {
    pub fn new(kind: EventKind) -> Self {
        Self {
            timestamp: Local::now(),
            severity: kind.severity(),
            kind,
        }
    }
}

/// Sending half of an event channel.
///
/// Cloneable; sending never blocks and silently drops events once the
/// receiver is gone.
#[derive(Clone)]
pub struct EventSender {
    inner: Sender<LogEvent>,
}

impl EventSender {
    pub fn send(&self, event: LogEvent) {
        let _ = self.inner.send(event);
    }
}

/// Receiving half of an event channel.
pub struct EventReceiver {
    inner: Receiver<LogEvent>,
}

impl EventReceiver {
    /// Blocks until the next event, or `None` once every sender is dropped.
    pub fn recv(&self) -> Option<LogEvent> {
        self.inner.recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<LogEvent> {
        self.inner.recv_timeout(timeout).ok()
    }

    pub fn try_recv(&self) -> Option<LogEvent> {
        self.inner.try_recv().ok()
    }

    /// Drains whatever is queued right now.
    pub fn drain(&self) -> Vec<LogEvent> {
        self.inner.try_iter().collect()
    }
}

/// Creates an unbounded event channel.
pub fn event_channel() -> (EventSender, EventReceiver) {
    let (sender, receiver) = unbounded();
    (
        EventSender { inner: sender },
        EventReceiver { inner: receiver },
    )
}

/// Counters for one [`crate::watcher::Monitor`], kept across stop/start.
#[derive(Debug, Default)]
pub struct SortStats {
    files_moved: AtomicU64,
    duplicates_handled: AtomicU64,
    errors: AtomicU64,
}

/// Point-in-time copy of [`SortStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub files_moved: u64,
    pub duplicates_handled: u64,
    pub errors: u64,
}

impl SortStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bumps the counter associated with `kind`, if any.
    pub fn record(&self, kind: &EventKind) {
        let counter = match kind {
            EventKind::Moved { .. } => &self.files_moved,
            EventKind::DuplicateRenamed { .. } => &self.duplicates_handled,
            EventKind::MoveError { .. } => &self.errors,
            _ => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            files_moved: self.files_moved.load(Ordering::Relaxed),
            duplicates_handled: self.duplicates_handled.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}
