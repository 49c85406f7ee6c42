//! Prelude module for common re-exports.
//!
//! ```rust
//! use caty_common::prelude::*;
//! ```

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{BridgeConfig, ConfigError, ConfigLoader, LogLevel};

// ─── Mapping & Codec ────────────────────────────────────────────────
pub use crate::codec::{PlcValue, SignalCommand, Width};
pub use crate::mapping::{Direction, MappingDirective, MappingTable};

// ─── Collaborators ──────────────────────────────────────────────────
pub use crate::link::{
    ConnectionError, LinkError, MastershipScope, SignalHandle, SignalKind, SignalWriter,
    SourceSystem, TargetSystem,
};

// ─── Reports ────────────────────────────────────────────────────────
pub use crate::report::{CycleLogEntry, CycleReport, EntryStatus};
