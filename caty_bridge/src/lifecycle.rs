//! Bridge lifecycle: connect, run the worker, drain, release.
//!
//! ```text
//! Starting ──► Running ──► StopRequested ──► Draining ──► Stopped
//! ```
//!
//! Connections are acquired once and released exactly once, target first,
//! on every exit path: normal shutdown, interrupt, a crashed worker, or the
//! controller being dropped.

use caty_common::config::{BridgeConfig, ConfigError};
use caty_common::link::{ConnectContext, ConnectionError, SourceSystem, TargetSystem};
use caty_common::mapping::MappingTable;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::connector_registry::ConnectorRegistry;
use crate::engine::{EngineStats, ReportSink, SyncEngine};
use crate::state::EngineState;

/// Name of the sync worker thread.
pub const WORKER_THREAD_NAME: &str = "caty-sync";

/// Startup error of the bridge. Every variant is fatal.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error("failed to spawn sync worker: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Lifecycle phase. Phases only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LifecyclePhase {
    Starting,
    Running,
    StopRequested,
    Draining,
    Stopped,
}

/// Loop timing handed to [`LifecycleController::launch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleTiming {
    pub cycle_time: Duration,
    /// Upper bound on waiting for the in-flight cycle at shutdown.
    pub grace_period: Duration,
}

impl From<&BridgeConfig> for LifecycleTiming {
    fn from(config: &BridgeConfig) -> Self {
        Self {
            cycle_time: config.bridge.cycle_time(),
            grace_period: config.bridge.grace_period(),
        }
    }
}

/// Outcome of [`LifecycleController::shutdown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownReport {
    /// The worker finished within the grace period.
    pub drained: bool,
    /// Loop statistics, when the worker returned normally.
    pub stats: Option<EngineStats>,
    /// Time from the shutdown call to the release of the connections.
    pub elapsed: Duration,
}

/// Source and target connections, released exactly once.
pub struct ConnectionSet {
    source: Arc<dyn SourceSystem>,
    target: Arc<dyn TargetSystem>,
    released: AtomicBool,
}

impl ConnectionSet {
    pub fn new(source: Arc<dyn SourceSystem>, target: Arc<dyn TargetSystem>) -> Self {
        Self {
            source,
            target,
            released: AtomicBool::new(false),
        }
    }

    pub fn source(&self) -> &Arc<dyn SourceSystem> {
        &self.source
    }

    pub fn target(&self) -> &Arc<dyn TargetSystem> {
        &self.target
    }

    /// Disconnect target, then source.
    ///
    /// Returns `false` without doing anything when already released.
    /// Disconnect failures are logged; the connection counts as released.
    pub fn release(&self) -> bool {
        if self
            .released
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        if let Err(e) = self.target.disconnect() {
            warn!("Failed to release {}: {}", self.target.name(), e);
        }
        if let Err(e) = self.source.disconnect() {
            warn!("Failed to release {}: {}", self.source.name(), e);
        }
        info!("Connections released");
        true
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }
}

impl Drop for ConnectionSet {
    fn drop(&mut self) {
        self.release();
    }
}

/// One-shot completion flag for the worker.
#[derive(Default)]
struct Completion {
    done: Mutex<bool>,
    cv: Condvar,
}

impl Completion {
    fn signal(&self) {
        *self.done.lock() = true;
        self.cv.notify_all();
    }

    /// Wait up to `timeout`; returns whether completion was signalled.
    fn wait(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut done = self.done.lock();
        while !*done {
            if self.cv.wait_until(&mut done, deadline).timed_out() {
                break;
            }
        }
        *done
    }
}

/// Signals completion when dropped, so unwinding out of the worker counts.
/// A worker that is gone also clears the running flag, which ends the
/// foreground loop and lets shutdown release the connections.
struct CompletionGuard {
    completion: Arc<Completion>,
    state: Arc<EngineState>,
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        if self.state.request_stop() {
            error!("Sync worker exited unexpectedly; stopping bridge");
        }
        self.completion.signal();
    }
}

/// Owns the worker thread and the connections.
pub struct LifecycleController {
    state: Arc<EngineState>,
    phase: Mutex<LifecyclePhase>,
    connections: Arc<ConnectionSet>,
    completion: Arc<Completion>,
    worker: Mutex<Option<JoinHandle<EngineStats>>>,
    grace_period: Duration,
    outcome: Mutex<Option<ShutdownReport>>,
}

impl LifecycleController {
    /// Connect both sides through `registry` and start the worker.
    ///
    /// # Errors
    /// `BridgeError::Connection` when either side cannot be connected; a
    /// source connected before a failing target is released first.
    pub fn start(
        config: &BridgeConfig,
        table: MappingTable,
        registry: &ConnectorRegistry,
        sink: Box<dyn ReportSink + Send>,
        state: Arc<EngineState>,
    ) -> Result<Self, BridgeError> {
        let ctx = ConnectContext {
            config,
            table: &table,
        };

        info!("Connecting source via '{}' connector", config.bridge.source);
        let source = registry.create_source(&config.bridge.source, &ctx)?;

        info!("Connecting target via '{}' connector", config.bridge.target);
        let target = match registry.create_target(&config.bridge.target, &ctx) {
            Ok(target) => target,
            Err(e) => {
                error!("Target connection failed: {}", e);
                if let Err(release_err) = source.disconnect() {
                    warn!("Failed to release {}: {}", source.name(), release_err);
                }
                return Err(e.into());
            }
        };

        Self::launch(table, source, target, LifecycleTiming::from(config), sink, state)
    }

    /// Start the worker over already-connected systems.
    ///
    /// # Errors
    /// `BridgeError::Spawn` when the worker thread cannot be created; the
    /// connections are released before returning.
    pub fn launch(
        table: MappingTable,
        source: Arc<dyn SourceSystem>,
        target: Arc<dyn TargetSystem>,
        timing: LifecycleTiming,
        mut sink: Box<dyn ReportSink + Send>,
        state: Arc<EngineState>,
    ) -> Result<Self, BridgeError> {
        let connections = Arc::new(ConnectionSet::new(source, target));
        let completion = Arc::new(Completion::default());

        let mut engine = SyncEngine::new(
            table,
            Arc::clone(connections.source()),
            Arc::clone(connections.target()),
            timing.cycle_time,
        );
        let worker_state = Arc::clone(&state);
        let guard = CompletionGuard {
            completion: Arc::clone(&completion),
            state: Arc::clone(&state),
        };
        info!(
            "Launching sync worker: {} directives, cycle {}ms",
            engine.table().len(),
            engine.cycle_time().as_millis()
        );

        let worker = thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || {
                let _guard = guard;
                engine.run(&worker_state, sink.as_mut())
            })?;

        info!("Bridge running (grace period {}ms)", timing.grace_period.as_millis());
        Ok(Self {
            state,
            phase: Mutex::new(LifecyclePhase::Running),
            connections,
            completion,
            worker: Mutex::new(Some(worker)),
            grace_period: timing.grace_period,
            outcome: Mutex::new(None),
        })
    }

    pub fn phase(&self) -> LifecyclePhase {
        *self.phase.lock()
    }

    /// Whether the worker is still asked to run.
    pub fn is_running(&self) -> bool {
        self.state.is_running()
    }

    pub fn state(&self) -> &Arc<EngineState> {
        &self.state
    }

    pub fn connections(&self) -> &ConnectionSet {
        &self.connections
    }

    /// Ask the worker to stop after its in-flight cycle.
    ///
    /// Returns `true` for the call that actually requested the stop.
    pub fn request_stop(&self) -> bool {
        let first = self.state.request_stop();
        if first {
            info!("Stop requested");
        }
        self.advance(LifecyclePhase::StopRequested);
        first
    }

    /// Flip the dashboard flag; returns the new value.
    pub fn toggle_dashboard(&self) -> bool {
        self.state.toggle_dashboard()
    }

    /// Stop, drain and release. Idempotent: later calls return the first
    /// call's report.
    pub fn shutdown(&self) -> ShutdownReport {
        let mut outcome = self.outcome.lock();
        if let Some(report) = *outcome {
            return report;
        }

        let started = Instant::now();
        self.request_stop();
        self.advance(LifecyclePhase::Draining);

        let drained = self.completion.wait(self.grace_period);
        let stats = if drained {
            self.join_worker()
        } else {
            warn!(
                "Sync worker did not finish within {}ms; releasing connections anyway",
                self.grace_period.as_millis()
            );
            None
        };

        self.connections.release();
        self.advance(LifecyclePhase::Stopped);

        let report = ShutdownReport {
            drained,
            stats,
            elapsed: started.elapsed(),
        };
        if let Some(stats) = &report.stats {
            info!(
                "Bridge stopped: {} cycles, overruns={}, aborted={}, max={}us, avg={}us",
                stats.cycles,
                stats.overruns,
                stats.aborted_cycles,
                stats.max_cycle_time.as_micros(),
                stats.avg_cycle_time().as_micros()
            );
        }
        *outcome = Some(report);
        report
    }

    fn join_worker(&self) -> Option<EngineStats> {
        let handle = self.worker.lock().take()?;
        match handle.join() {
            Ok(stats) => Some(stats),
            Err(_) => {
                error!("Sync worker crashed");
                None
            }
        }
    }

    fn advance(&self, to: LifecyclePhase) {
        let mut phase = self.phase.lock();
        if *phase < to {
            *phase = to;
        }
    }
}

impl Drop for LifecycleController {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phases_are_ordered() {
        assert!(LifecyclePhase::Starting < LifecyclePhase::Running);
        assert!(LifecyclePhase::Running < LifecyclePhase::StopRequested);
        assert!(LifecyclePhase::StopRequested < LifecyclePhase::Draining);
        assert!(LifecyclePhase::Draining < LifecyclePhase::Stopped);
    }

    #[test]
    fn completion_guard_signals_on_unwind() {
        let completion = Arc::new(Completion::default());
        let state = Arc::new(EngineState::default());
        let guard = CompletionGuard {
            completion: Arc::clone(&completion),
            state: Arc::clone(&state),
        };
        let worker = thread::spawn(move || {
            let _guard = guard;
            panic!("connector blew up");
        });
        assert!(worker.join().is_err());
        assert!(completion.wait(Duration::from_millis(10)));
        assert!(!state.is_running());
    }

    #[test]
    fn release_counts_even_when_disconnect_fails() {
        use crate::connectors::simulation::{SimulatedSource, SimulatedTarget};

        let source = Arc::new(SimulatedSource::new("plc"));
        let target = Arc::new(SimulatedTarget::new("ctrl"));
        assert!(source.disconnect().is_ok());

        let set = ConnectionSet::new(
            Arc::clone(&source) as Arc<dyn SourceSystem>,
            Arc::clone(&target) as Arc<dyn TargetSystem>,
        );
        assert!(set.release());
        assert!(set.is_released());
        assert!(!set.release());
        assert_eq!(source.disconnect_count(), 2);
        assert_eq!(target.disconnect_count(), 1);
    }

    #[test]
    fn completion_wait_times_out() {
        let completion = Completion::default();
        assert!(!completion.wait(Duration::from_millis(10)));
    }

    #[test]
    fn timing_from_config() {
        let timing = LifecycleTiming::from(&BridgeConfig::default());
        assert_eq!(timing.cycle_time, Duration::from_millis(100));
        assert_eq!(timing.grace_period, Duration::from_secs(4));
    }
}
