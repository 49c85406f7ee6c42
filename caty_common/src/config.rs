//! Configuration loading traits and types.
//!
//! The bridge runs without any configuration file: every field has a
//! default, and the command line overrides individual values. An optional
//! TOML file can pin the settings for a cell.
//!
//! # TOML Example
//!
//! ```toml
//! [shared]
//! log_level = "debug"
//! service_name = "caty-cell-04"
//!
//! [bridge]
//! net_id = "5.80.201.232.1.1"
//! port = 851
//! mapping_file = "/etc/caty/vars_robot.txt"
//! cycle_time_ms = 50
//!
//! [simulation]
//! symbols = [{ path = "MAIN.bTrig", value = true }]
//! signals = [{ name = "DI_Start", kind = "digital" }]
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use caty_common::config::{BridgeConfig, ConfigError};
//! use std::path::Path;
//!
//! fn main() -> Result<(), ConfigError> {
//!     let config = BridgeConfig::from_file(Path::new("caty.toml"))?;
//!     println!("Cycle: {:?}", config.bridge.cycle_time());
//!     Ok(())
//! }
//! ```

use crate::codec::PlcValue;
use crate::consts::{
    DEFAULT_CONNECTOR, DEFAULT_CYCLE_TIME_MS, DEFAULT_GRACE_PERIOD_MS, DEFAULT_MAPPING_FILE,
    DEFAULT_NET_ID, DEFAULT_PORT, DEFAULT_REDRAW_INTERVAL_MS, DEFAULT_SERVICE_NAME,
};
use crate::link::SignalKind;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Error type for configuration and mapping loading.
///
/// Every variant is fatal at startup.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Configuration file not found at specified path.
    #[error("Configuration file not found")]
    FileNotFound,

    /// TOML parsing or file reading failed.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Semantic validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),

    /// Mapping file does not exist.
    #[error("Mapping file not found: '{}'", .0.display())]
    MappingNotFound(PathBuf),

    /// Mapping file yielded no directive.
    #[error("No valid mapping entries found in '{}'", .0.display())]
    EmptyMapping(PathBuf),
}

/// Log level for application logging.
///
/// Uses lowercase serde values for TOML compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Most verbose, detailed tracing information.
    Trace,
    /// Debug information useful during development.
    Debug,
    /// General information about application operation.
    #[default]
    Info,
    /// Warning messages for potentially problematic situations.
    Warn,
    /// Error messages for serious problems.
    Error,
}

impl LogLevel {
    /// Directive string understood by `tracing_subscriber::EnvFilter`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Fields shared by every Caty service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SharedConfig {
    /// Logging verbosity level.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Application instance identifier.
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

impl Default for SharedConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::default(),
            service_name: default_service_name(),
        }
    }
}

impl SharedConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if `service_name` is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service_name.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "service_name cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Link and timing settings of the bridge (`[bridge]`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BridgeSection {
    /// AMS NetID of the PLC runtime.
    pub net_id: String,
    /// ADS port of the PLC runtime.
    pub port: u16,
    /// Mapping file with one directive per line.
    pub mapping_file: PathBuf,
    /// Pause between two cycles.
    pub cycle_time_ms: u64,
    /// Minimum time between two dashboard redraws; 0 redraws every cycle.
    pub redraw_interval_ms: u64,
    /// Time the worker gets to finish its in-flight cycle on shutdown.
    pub grace_period_ms: u64,
    /// Show the live dashboard from the start.
    pub dashboard: bool,
    /// Connector name for the PLC side.
    pub source: String,
    /// Connector name for the robot side.
    pub target: String,
}

impl Default for BridgeSection {
    fn default() -> Self {
        Self {
            net_id: DEFAULT_NET_ID.to_string(),
            port: DEFAULT_PORT,
            mapping_file: PathBuf::from(DEFAULT_MAPPING_FILE),
            cycle_time_ms: DEFAULT_CYCLE_TIME_MS,
            redraw_interval_ms: DEFAULT_REDRAW_INTERVAL_MS,
            grace_period_ms: DEFAULT_GRACE_PERIOD_MS,
            dashboard: false,
            source: DEFAULT_CONNECTOR.to_string(),
            target: DEFAULT_CONNECTOR.to_string(),
        }
    }
}

impl BridgeSection {
    pub fn cycle_time(&self) -> Duration {
        Duration::from_millis(self.cycle_time_ms)
    }

    pub fn redraw_interval(&self) -> Duration {
        Duration::from_millis(self.redraw_interval_ms)
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }

    /// Validate the section.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` on empty names/paths, a zero
    /// port, a zero cycle time or a zero grace period.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fail = |msg: &str| -> Result<(), ConfigError> {
            Err(ConfigError::ValidationError(msg.to_string()))
        };

        if self.net_id.trim().is_empty() {
            return fail("net_id cannot be empty");
        }
        if self.port == 0 {
            return fail("port must be greater than 0");
        }
        if self.mapping_file.as_os_str().is_empty() {
            return fail("mapping_file cannot be empty");
        }
        if self.cycle_time_ms == 0 {
            return fail("cycle_time_ms must be at least 1");
        }
        if self.grace_period_ms == 0 {
            return fail("grace_period_ms must be at least 1");
        }
        if self.source.trim().is_empty() || self.target.trim().is_empty() {
            return fail("source and target connector names cannot be empty");
        }
        Ok(())
    }
}

/// Initial value of a simulated PLC symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SeedValue {
    Bool(bool),
    Int(i64),
    Real(f64),
    Text(String),
}

impl From<SeedValue> for PlcValue {
    fn from(seed: SeedValue) -> Self {
        match seed {
            SeedValue::Bool(b) => PlcValue::Bool(b),
            SeedValue::Int(i) => PlcValue::Int(i),
            SeedValue::Real(r) => PlcValue::Real(r),
            SeedValue::Text(s) => PlcValue::Text(s),
        }
    }
}

/// A simulated PLC symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SymbolSeed {
    pub path: String,
    pub value: SeedValue,
}

/// A simulated robot signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SignalSeed {
    pub name: String,
    pub kind: SignalKind,
    #[serde(default)]
    pub value: f64,
}

/// Seed data for the `simulation` connectors (`[simulation]`).
///
/// When both lists are empty the connectors seed themselves from the
/// mapping table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationConfig {
    pub symbols: Vec<SymbolSeed>,
    pub signals: Vec<SignalSeed>,
}

impl SimulationConfig {
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty() && self.signals.is_empty()
    }
}

/// Complete bridge configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BridgeConfig {
    pub shared: SharedConfig,
    pub bridge: BridgeSection,
    pub simulation: SimulationConfig,
}

impl BridgeConfig {
    /// Load a TOML file and validate it.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let config = Self::load(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate all sections.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;
        self.bridge.validate()
    }
}

/// Trait for loading configuration from TOML files.
///
/// # Contract
///
/// - Returns `ConfigError::FileNotFound` if the file does not exist
/// - Returns `ConfigError::ParseError` if TOML syntax is invalid
pub trait ConfigLoader: Sized + serde::de::DeserializeOwned {
    /// Load configuration from a TOML file.
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound
            } else {
                ConfigError::ParseError(e.to_string())
            }
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

// Blanket implementation for all types that implement DeserializeOwned.
impl<T: serde::de::DeserializeOwned> ConfigLoader for T {}

fn default_service_name() -> String {
    DEFAULT_SERVICE_NAME.to_string()
}
