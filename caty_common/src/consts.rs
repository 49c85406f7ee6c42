//! System-wide constants for the Caty workspace.
//!
//! Single source of truth for default settings and timing quanta.
//! Imported by all crates; no duplication permitted.

/// Default AMS NetID of the PLC runtime.
pub const DEFAULT_NET_ID: &str = "199.4.42.250.1.1";

/// Default ADS port of the PLC runtime.
pub const DEFAULT_PORT: u16 = 851;

/// Default mapping file path.
pub const DEFAULT_MAPPING_FILE: &str = "/etc/caty/vars_robot.txt";

/// Default data cycle interval in milliseconds.
pub const DEFAULT_CYCLE_TIME_MS: u64 = 100;

/// Default minimum interval between two dashboard redraws in milliseconds.
pub const DEFAULT_REDRAW_INTERVAL_MS: u64 = 500;

/// Default time the worker gets to finish its in-flight cycle on shutdown.
pub const DEFAULT_GRACE_PERIOD_MS: u64 = 4000;

/// Foreground polling quantum for operator keys and stop flags.
pub const INPUT_POLL_MS: u16 = 50;

/// Pause after a dashboard toggle before queued keys are drained.
pub const TOGGLE_DEBOUNCE_MS: u64 = 200;

/// Name of the connector used when none is configured.
pub const DEFAULT_CONNECTOR: &str = "simulation";

/// Default service name reported in logs.
pub const DEFAULT_SERVICE_NAME: &str = "caty-bridge";
