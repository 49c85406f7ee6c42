//! Connector implementations.
//!
//! - [`simulation`] - In-memory PLC symbol table and robot signal table
//!
//! # Adding New Connectors
//!
//! 1. Create a new submodule under `connectors/`
//! 2. Implement `SourceSystem` and/or `TargetSystem` from `caty_common::link`
//! 3. Register the factories in [`register_builtin_connectors`]

pub mod simulation;

use crate::connector_registry::ConnectorRegistry;

/// Register every built-in connector with `registry`.
pub fn register_builtin_connectors(registry: &mut ConnectorRegistry) {
    registry.register_source(simulation::CONNECTOR_NAME, simulation::create_source);
    registry.register_target(simulation::CONNECTOR_NAME, simulation::create_target);
}
