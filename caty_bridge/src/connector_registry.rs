//! Connector registry.
//!
//! Maps connector names to source and target factories. Built at startup,
//! populated via `register_source()` / `register_target()`, and handed to the
//! lifecycle controller by reference.

use caty_common::link::{
    ConnectContext, ConnectionError, SourceFactory, SourceSystem, TargetFactory, TargetSystem,
};
use std::collections::HashMap;
use std::sync::Arc;

use crate::connectors::register_builtin_connectors;

/// Registry of available connectors, one namespace per side.
pub struct ConnectorRegistry {
    sources: HashMap<&'static str, SourceFactory>,
    targets: HashMap<&'static str, TargetFactory>,
}

impl ConnectorRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            sources: HashMap::new(),
            targets: HashMap::new(),
        }
    }

    /// Registry holding every built-in connector.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        register_builtin_connectors(&mut registry);
        registry
    }

    /// Register a source factory.
    ///
    /// # Panics
    /// Panics if a source connector with the same name is already registered.
    pub fn register_source(&mut self, name: &'static str, factory: SourceFactory) {
        if self.sources.contains_key(name) {
            panic!("Source connector '{name}' is already registered");
        }
        self.sources.insert(name, factory);
    }

    /// Register a target factory.
    ///
    /// # Panics
    /// Panics if a target connector with the same name is already registered.
    pub fn register_target(&mut self, name: &'static str, factory: TargetFactory) {
        if self.targets.contains_key(name) {
            panic!("Target connector '{name}' is already registered");
        }
        self.targets.insert(name, factory);
    }

    /// Connect the source side through the named connector.
    ///
    /// # Errors
    /// `ConnectionError::UnknownConnector` for an unregistered name, or
    /// whatever the factory reports.
    pub fn create_source(
        &self,
        name: &str,
        ctx: &ConnectContext<'_>,
    ) -> Result<Arc<dyn SourceSystem>, ConnectionError> {
        let factory = self
            .sources
            .get(name)
            .ok_or_else(|| ConnectionError::UnknownConnector(name.to_string()))?;
        factory(ctx)
    }

    /// Connect the target side through the named connector.
    ///
    /// # Errors
    /// `ConnectionError::UnknownConnector` for an unregistered name, or
    /// whatever the factory reports.
    pub fn create_target(
        &self,
        name: &str,
        ctx: &ConnectContext<'_>,
    ) -> Result<Arc<dyn TargetSystem>, ConnectionError> {
        let factory = self
            .targets
            .get(name)
            .ok_or_else(|| ConnectionError::UnknownConnector(name.to_string()))?;
        factory(ctx)
    }

    /// Registered source connector names, sorted.
    pub fn list_sources(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.sources.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Registered target connector names, sorted.
    pub fn list_targets(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.targets.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

impl Default for ConnectorRegistry {
    fn default() -> Self {
        Self::new()
    }
}
