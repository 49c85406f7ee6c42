//! # Caty Bridge Binary
//!
//! Copies PLC symbols onto robot I/O signals and back, cycle by cycle, as
//! declared in a mapping file.
//!
//! # Usage
//!
//! ```bash
//! # Legacy flags (single dash, any case)
//! caty_bridge -netid 5.80.201.232.1.1 -port 851 -file vars_robot.txt -time 10 -verbose
//!
//! # TOML settings with a CLI override
//! caty_bridge --config /etc/caty/caty.toml --time 50
//!
//! # JSON logs on stderr
//! caty_bridge --log-json --debug
//! ```
//!
//! Keys while running: `V` toggles the live dashboard, `Q` or `Esc` quits.

#![deny(warnings)]

use caty_bridge::console::{Key, KeyReader};
use caty_bridge::{
    ConnectorRegistry, EngineState, LifecycleController, Reporter, ReporterOptions, StatusInfo,
};
use caty_common::config::{BridgeConfig, ConfigError, ConfigLoader, LogLevel};
use caty_common::consts::{INPUT_POLL_MS, TOGGLE_DEBOUNCE_MS};
use caty_common::mapping::MappingTable;
use clap::Parser;
use clap::error::ErrorKind;
use colored::Colorize;
use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::EnvFilter;

/// Exit code for any startup failure.
const EXIT_STARTUP_FAILURE: i32 = -1;

/// Flags accepted with a single dash and in any case.
const LEGACY_FLAGS: [&str; 6] = ["netid", "port", "file", "time", "verbose", "help"];

/// Caty Bridge - PLC symbol <-> robot I/O signal bridge
#[derive(Parser, Debug)]
#[command(name = "caty_bridge")]
#[command(author = "RTS007")]
#[command(version)]
#[command(about = "Cyclic PLC symbol <-> robot I/O signal bridge")]
#[command(long_about = None)]
struct Args {
    /// AMS NetID of the PLC runtime
    #[arg(long, value_name = "ID")]
    netid: Option<String>,

    /// ADS port of the PLC runtime
    #[arg(long, value_name = "PORT")]
    port: Option<u16>,

    /// Mapping file with one directive per line
    #[arg(long, value_name = "PATH")]
    file: Option<PathBuf>,

    /// Cycle time in milliseconds
    #[arg(long, value_name = "MS")]
    time: Option<u64>,

    /// Show the live dashboard from the start
    #[arg(long)]
    verbose: bool,

    /// Optional TOML settings file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Connector for the PLC side
    #[arg(long, value_name = "NAME")]
    source: Option<String>,

    /// Connector for the robot side
    #[arg(long, value_name = "NAME")]
    target: Option<String>,

    /// Minimum dashboard redraw interval in milliseconds (0 = every cycle)
    #[arg(long, value_name = "MS")]
    redraw: Option<u64>,

    /// Output logs in JSON format
    #[arg(long)]
    log_json: bool,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

fn main() {
    let args = match Args::try_parse_from(normalize_legacy_args(std::env::args())) {
        Ok(args) => args,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            let _ = e.print();
            return;
        }
        Err(e) => {
            let _ = e.print();
            std::process::exit(EXIT_STARTUP_FAILURE);
        }
    };

    if let Err(e) = run(&args) {
        error!("Bridge startup failed: {}", e);
        eprintln!("\n{}: {}", "Error".red().bold(), e);
        std::process::exit(EXIT_STARTUP_FAILURE);
    }
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(args);
    setup_tracing(
        args,
        config.as_ref().map(|c| c.shared.log_level).unwrap_or_default(),
    );
    let config = config?;

    info!(
        "Caty Bridge v{} starting (service={}, log_level={})",
        env!("CARGO_PKG_VERSION"),
        config.shared.service_name,
        config.shared.log_level.as_str()
    );

    // Mapping problems are fatal before anything is connected.
    let table = MappingTable::load(&config.bridge.mapping_file)?;

    let state = Arc::new(EngineState::new(config.bridge.dashboard));
    {
        let state = Arc::clone(&state);
        ctrlc::set_handler(move || {
            info!("Received shutdown signal");
            state.request_stop();
        })?;
    }

    let stdout = io::stdout();
    let clear_screen = stdout.is_terminal();
    let reporter = Reporter::new(
        stdout,
        ReporterOptions {
            cycle_time: config.bridge.cycle_time(),
            redraw_interval: config.bridge.redraw_interval(),
            clear_screen,
            status: StatusInfo {
                net_id: config.bridge.net_id.clone(),
                port: config.bridge.port,
                mapping_file: config.bridge.mapping_file.clone(),
            },
        },
    );

    let registry = ConnectorRegistry::with_builtins();
    let controller =
        LifecycleController::start(&config, table, &registry, Box::new(reporter), state)?;

    watch_console(&controller);

    info!("Stopping sync worker...");
    let report = controller.shutdown();
    if !report.drained {
        warn!("Shutdown forced after {}ms", report.elapsed.as_millis());
    }

    info!("Caty Bridge shutdown complete");
    Ok(())
}

/// Settings from the optional TOML file, overridden by the command line.
fn load_config(args: &Args) -> Result<BridgeConfig, ConfigError> {
    let mut config = match &args.config {
        Some(path) => BridgeConfig::load(path)?,
        None => BridgeConfig::default(),
    };

    let bridge = &mut config.bridge;
    if let Some(net_id) = &args.netid {
        bridge.net_id = net_id.clone();
    }
    if let Some(port) = args.port {
        bridge.port = port;
    }
    if let Some(file) = &args.file {
        bridge.mapping_file = file.clone();
    }
    if let Some(ms) = args.time {
        bridge.cycle_time_ms = ms;
    }
    if let Some(ms) = args.redraw {
        bridge.redraw_interval_ms = ms;
    }
    if let Some(source) = &args.source {
        bridge.source = source.clone();
    }
    if let Some(target) = &args.target {
        bridge.target = target.clone();
    }
    if args.verbose {
        bridge.dashboard = true;
    }

    config.validate()?;
    Ok(config)
}

/// Rewrite `-netid`, `-FILE`, `/?` and friends into clap's `--flag` form.
/// Values and unknown arguments pass through untouched.
fn normalize_legacy_args(args: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut args = args.into_iter();
    let mut out: Vec<String> = args.next().into_iter().collect();

    for arg in args {
        if arg == "/?" {
            out.push("--help".to_string());
            continue;
        }
        let lower = arg.to_ascii_lowercase();
        match lower.strip_prefix('-') {
            Some(name) if !name.starts_with('-') && LEGACY_FLAGS.contains(&name) => {
                out.push(format!("--{name}"));
            }
            _ => out.push(arg),
        }
    }
    out
}

/// Forward operator keys to the controller until it stops.
fn watch_console(controller: &LifecycleController) {
    let mut keys = KeyReader::open();
    let idle = Duration::from_millis(u64::from(INPUT_POLL_MS));

    while controller.is_running() {
        let Some(reader) = keys.as_mut() else {
            controller.state().wait_while_running(idle);
            continue;
        };

        match reader.poll_key(INPUT_POLL_MS) {
            Ok(Some(Key::Stop)) => {
                controller.request_stop();
            }
            Ok(Some(Key::ToggleDashboard)) => {
                let enabled = controller.toggle_dashboard();
                info!("Live dashboard {}", if enabled { "enabled" } else { "disabled" });
                thread::sleep(Duration::from_millis(TOGGLE_DEBOUNCE_MS));
                reader.drain();
            }
            Ok(None) => {}
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => {
                debug!("Console input closed: {}", e);
                keys = None;
            }
        }
    }
}

/// Setup tracing subscriber on stderr, keeping stdout for the console.
fn setup_tracing(args: &Args, configured: LogLevel) {
    let level = if args.debug {
        Level::DEBUG
    } else {
        match configured {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.log_json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn parse(items: &[&str]) -> Args {
        Args::try_parse_from(normalize_legacy_args(argv(items))).expect("should parse")
    }

    #[test]
    fn legacy_flags_are_normalized() {
        let out = normalize_legacy_args(argv(&[
            "caty_bridge", "-NetId", "1.2.3.4.1.1", "-FILE", "My Vars.TXT", "-verbose",
        ]));
        assert_eq!(
            out,
            argv(&["caty_bridge", "--netid", "1.2.3.4.1.1", "--file", "My Vars.TXT", "--verbose"])
        );
    }

    #[test]
    fn help_spellings() {
        assert_eq!(normalize_legacy_args(argv(&["x", "/?"])), argv(&["x", "--help"]));
        assert_eq!(normalize_legacy_args(argv(&["x", "-HELP"])), argv(&["x", "--help"]));
        let err = Args::try_parse_from(normalize_legacy_args(argv(&["x", "/?"]))).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DisplayHelp);
    }

    #[test]
    fn modern_flags_pass_through() {
        let out = normalize_legacy_args(argv(&["x", "--config", "a.toml", "--log-json", "-x"]));
        assert_eq!(out, argv(&["x", "--config", "a.toml", "--log-json", "-x"]));
    }

    #[test]
    fn overrides_apply_on_defaults() {
        let args = parse(&[
            "caty_bridge", "-port", "852", "-time", "10", "-verbose", "--redraw", "0",
        ]);
        let config = load_config(&args).expect("valid");
        assert_eq!(config.bridge.port, 852);
        assert_eq!(config.bridge.cycle_time_ms, 10);
        assert_eq!(config.bridge.redraw_interval_ms, 0);
        assert!(config.bridge.dashboard);
        assert_eq!(config.bridge.mapping_file, PathBuf::from("/etc/caty/vars_robot.txt"));
    }

    #[test]
    fn invalid_override_fails_validation() {
        let args = parse(&["caty_bridge", "-time", "0"]);
        assert!(matches!(load_config(&args), Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn bad_port_is_rejected_by_parser() {
        let result = Args::try_parse_from(normalize_legacy_args(argv(&["x", "-port", "abc"])));
        assert!(result.is_err());
    }

    #[test]
    fn missing_config_file() {
        let args = parse(&["caty_bridge", "--config", "/nonexistent/caty.toml"]);
        assert!(matches!(load_config(&args), Err(ConfigError::FileNotFound)));
    }
}
