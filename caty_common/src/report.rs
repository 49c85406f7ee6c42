//! Per-cycle transfer log.
//!
//! One [`CycleLogEntry`] per directive, collected in table order into a
//! [`CycleReport`]. Reports are produced by the engine every cycle and
//! handed to the reporter; nothing is kept across cycles.

use crate::link::LinkError;
use crate::mapping::{Direction, MappingDirective};
use std::fmt;
use std::time::SystemTime;

/// Outcome of one directive in one cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryStatus {
    Ok,
    /// PLC symbol does not exist.
    MissingSource,
    /// Robot signal does not exist.
    MissingTarget,
    /// Any other failure, with its message.
    TransferError(String),
}

impl EntryStatus {
    #[inline]
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }

    /// Short marker for the dashboard.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::MissingSource => "Missing",
            Self::MissingTarget => "Sig Missing",
            Self::TransferError(_) => "ERR",
        }
    }
}

impl fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TransferError(msg) => write!(f, "ERR: {msg}"),
            other => f.write_str(other.label()),
        }
    }
}

impl From<LinkError> for EntryStatus {
    fn from(err: LinkError) -> Self {
        match err {
            LinkError::UnknownSymbol(_) => Self::MissingSource,
            other => Self::TransferError(other.to_string()),
        }
    }
}

/// Log line for one directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleLogEntry {
    pub direction: Direction,
    pub source_path: String,
    pub display_value: String,
    pub target_signal: String,
    pub status: EntryStatus,
}

impl CycleLogEntry {
    /// Placeholder shown until a value is known.
    pub const NO_VALUE: &'static str = "---";

    /// Entry for `directive` with no value yet and status `Ok`.
    pub fn pending(directive: &MappingDirective) -> Self {
        Self {
            direction: directive.direction,
            source_path: directive.source_path.clone(),
            display_value: Self::NO_VALUE.to_string(),
            target_signal: directive.target_signal.clone(),
            status: EntryStatus::Ok,
        }
    }
}

/// One cycle's worth of log entries, in table order.
#[derive(Debug, Clone)]
pub struct CycleReport {
    sequence: u64,
    started_at: SystemTime,
    entries: Vec<CycleLogEntry>,
}

impl CycleReport {
    pub fn new(sequence: u64, capacity: usize) -> Self {
        Self {
            sequence,
            started_at: SystemTime::now(),
            entries: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, entry: CycleLogEntry) {
        self.entries.push(entry);
    }

    /// 1-based cycle number.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn started_at(&self) -> SystemTime {
        self.started_at
    }

    pub fn entries(&self) -> &[CycleLogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries whose status is not `Ok`.
    pub fn failures(&self) -> usize {
        self.entries.iter().filter(|e| !e.status.is_ok()).count()
    }
}
