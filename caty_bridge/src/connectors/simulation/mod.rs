//! Simulation connectors.
//!
//! An in-memory PLC symbol table and an in-memory robot signal table with a
//! mastership lock, for running the bridge without either controller.
//! Both sides are seeded from the `[simulation]` section; when it is empty
//! they are seeded from the mapping table instead, so every directive
//! resolves.

mod source;
mod target;

pub use source::SimulatedSource;
pub use target::{SimulatedSignal, SimulatedTarget};

use caty_common::link::{ConnectContext, ConnectionError, SourceSystem, TargetSystem};
use std::sync::Arc;
use tracing::info;

/// Registry name of both simulation connectors.
pub const CONNECTOR_NAME: &str = "simulation";

/// Factory function for the simulated PLC.
pub fn create_source(ctx: &ConnectContext<'_>) -> Result<Arc<dyn SourceSystem>, ConnectionError> {
    let source = SimulatedSource::from_context(ctx);
    info!("Connected to {} ({} symbols)", source.name(), source.symbol_count());
    Ok(Arc::new(source))
}

/// Factory function for the simulated robot controller.
pub fn create_target(ctx: &ConnectContext<'_>) -> Result<Arc<dyn TargetSystem>, ConnectionError> {
    let target = SimulatedTarget::from_context(ctx);
    info!("Connected to {} ({} signals)", target.name(), target.signal_count());
    Ok(Arc::new(target))
}
