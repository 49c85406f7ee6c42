//! # Caty Bridge Library
//!
//! Cyclic bridge between a PLC symbol table and a robot controller's I/O
//! signals, with pluggable connectors for both sides.
//!
//! # Module Structure
//!
//! - [`engine`] - SyncEngine, per-directive transfer, cycle loop
//! - [`state`] - Run and dashboard flags shared with the worker
//! - [`lifecycle`] - Connect, run, drain and release
//! - [`connector_registry`] - Connector factory registration
//! - [`connectors`] - Connector implementations
//! - [`reporter`] - Status screen and live dashboard
//! - [`console`] - Operator key input
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                       caty_bridge (single crate)                    │
//! │  ┌──────────────┐    ┌────────────────────┐    ┌─────────────────┐  │
//! │  │ KeyReader /  │───►│ LifecycleController│◄───│ConnectorRegistry│  │
//! │  │ ctrlc        │    │  (worker thread)   │    │                 │  │
//! │  └──────────────┘    └─────────┬──────────┘    └─────────────────┘  │
//! │                                ▼                                    │
//! │  ┌──────────────┐    ┌────────────────────┐    ┌─────────────────┐  │
//! │  │  Reporter    │◄───│    SyncEngine      │◄──►│ SourceSystem /  │  │
//! │  │ (ReportSink) │    │   (cycle loop)     │    │ TargetSystem    │  │
//! │  └──────────────┘    └────────────────────┘    └─────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

pub mod connector_registry;
pub mod connectors;
pub mod console;
pub mod engine;
pub mod lifecycle;
pub mod reporter;
pub mod state;

// Re-export key types for convenience
pub use crate::connector_registry::ConnectorRegistry;
pub use crate::engine::{DiscardSink, EngineStats, LinkSummary, ReportSink, SyncEngine};
pub use crate::lifecycle::{
    BridgeError, ConnectionSet, LifecycleController, LifecyclePhase, LifecycleTiming,
    ShutdownReport,
};
pub use crate::reporter::{Reporter, ReporterOptions, StatusInfo};
pub use crate::state::EngineState;
