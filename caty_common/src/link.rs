//! Collaborator traits for both sides of the bridge.
//!
//! This module defines:
//! - `SourceSystem` trait - PLC variable table (read/write by symbol path)
//! - `TargetSystem` trait - robot I/O signal table with mastership
//! - `SignalWriter` trait - write access held while mastership is granted
//! - `LinkError` / `ConnectionError` - per-call and startup errors
//! - `SourceFactory` / `TargetFactory` - connector factory function types
//!
//! # Lifecycle
//!
//! 1. A factory connects once at startup (`ConnectionError` is fatal)
//! 2. The engine calls `read_value` / `get_signal` / ... every cycle;
//!    every failure comes back as a `LinkError` and stays per directive
//! 3. `disconnect()` is called exactly once at shutdown
//!
//! # Mastership
//!
//! Writing robot signals requires exclusive write access. The scope returned
//! by [`TargetSystem::request_mastership`] holds it; dropping the scope
//! releases it, whether or not the write succeeded.

use crate::codec::{CodecError, PlcValue};
use crate::config::BridgeConfig;
use crate::mapping::MappingTable;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Error returned by a single collaborator call.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LinkError {
    /// The PLC has no symbol with this path.
    #[error("unknown symbol '{0}'")]
    UnknownSymbol(String),

    /// The PLC refused the written value.
    #[error("symbol '{path}' rejected the value: {reason}")]
    WriteRejected { path: String, reason: String },

    /// The robot controller refused the written signal value.
    #[error("signal '{name}' rejected the value: {reason}")]
    SignalRejected { name: String, reason: String },

    /// Signal kind cannot carry the value of this directive.
    #[error("signal '{name}' is {kind:?}, cannot take a {bits}-bit value")]
    KindMismatch {
        name: String,
        kind: SignalKind,
        bits: u32,
    },

    /// Exclusive write access could not be obtained.
    #[error("mastership denied: {0}")]
    MastershipDenied(String),

    /// Value coercion failed.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// The connection was already released.
    #[error("link disconnected")]
    Disconnected,

    /// Transport-level failure.
    #[error("communication error: {0}")]
    Communication(String),
}

/// Error acquiring or releasing a connection.
#[derive(Debug, Clone, Error)]
pub enum ConnectionError {
    /// Subsystem could not be reached at startup.
    #[error("cannot connect to {system}: {reason}")]
    Unreachable { system: String, reason: String },

    /// No connector registered under this name.
    #[error("connector not found: {0}")]
    UnknownConnector(String),

    /// Releasing the connection failed.
    #[error("failed to release {system}: {reason}")]
    ReleaseFailed { system: String, reason: String },
}

/// Robot signal subtype, resolved once when the handle is obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalKind {
    /// Single-bit I/O (DI/DO).
    Digital,
    /// Multi-bit integer I/O (GI/GO).
    Group,
    /// Analog I/O (AI/AO).
    Analog,
}

/// Resolved reference to a robot signal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SignalHandle {
    name: String,
    kind: SignalKind,
    index: usize,
}

impl SignalHandle {
    /// `index` is opaque to the engine; connectors use it to find the
    /// signal again without a name lookup.
    pub fn new(name: impl Into<String>, kind: SignalKind, index: usize) -> Self {
        Self {
            name: name.into(),
            kind,
            index,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> SignalKind {
        self.kind
    }

    pub fn index(&self) -> usize {
        self.index
    }
}

/// PLC variable table.
pub trait SourceSystem: Send + Sync {
    /// Human-readable identification (runtime, NetID, port).
    fn name(&self) -> &str;

    /// Read a symbol. `Ok(None)` when the symbol does not exist.
    fn read_value(&self, path: &str) -> Result<Option<PlcValue>, LinkError>;

    /// Overwrite a symbol. `LinkError::UnknownSymbol` when it does not exist.
    fn write_value(&self, path: &str, value: &PlcValue) -> Result<(), LinkError>;

    /// Release the connection. Called once at shutdown.
    fn disconnect(&self) -> Result<(), ConnectionError>;
}

/// Write access to robot signals, held for the lifetime of the value.
pub trait SignalWriter {
    /// Set the signal level (0/1 for digital signals).
    fn write_signal(&mut self, handle: &SignalHandle, value: f64) -> Result<(), LinkError>;
}

/// Granted mastership. Dropping it releases the exclusive write access.
pub type MastershipScope<'a> = Box<dyn SignalWriter + 'a>;

/// Robot controller I/O signal table.
pub trait TargetSystem: Send + Sync {
    /// Controller system name.
    fn name(&self) -> &str;

    /// Resolve a signal by name. `Ok(None)` when it does not exist.
    fn get_signal(&self, name: &str) -> Result<Option<SignalHandle>, LinkError>;

    /// Current level of a signal (0/1 for digital signals).
    fn read_signal_value(&self, handle: &SignalHandle) -> Result<f64, LinkError>;

    /// Acquire exclusive write access.
    fn request_mastership(&self) -> Result<MastershipScope<'_>, LinkError>;

    /// Log off and release the controller. Called once at shutdown.
    fn disconnect(&self) -> Result<(), ConnectionError>;
}

/// Everything a connector may consult while connecting.
#[derive(Debug, Clone, Copy)]
pub struct ConnectContext<'a> {
    pub config: &'a BridgeConfig,
    pub table: &'a MappingTable,
}

/// Factory function type for PLC connectors.
pub type SourceFactory =
    fn(&ConnectContext<'_>) -> Result<Arc<dyn SourceSystem>, ConnectionError>;

/// Factory function type for robot connectors.
pub type TargetFactory =
    fn(&ConnectContext<'_>) -> Result<Arc<dyn TargetSystem>, ConnectionError>;
