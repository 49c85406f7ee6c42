//! Synchronization engine and cycle loop.
//!
//! A cycle is one pass over the mapping table in file order. Every directive
//! is isolated: its failure, a panicking connector call included, is
//! recorded in its own log entry and the scan goes on with the next one.
//! Anything else that panics inside a cycle aborts only that cycle.

use caty_common::codec::{self, SignalCommand};
use caty_common::link::{LinkError, SignalHandle, SignalKind, SourceSystem, TargetSystem};
use caty_common::mapping::{Direction, MappingDirective, MappingTable};
use caty_common::report::{CycleLogEntry, CycleReport, EntryStatus};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::state::EngineState;

/// Timing statistics are logged every this many cycles.
const STATS_LOG_INTERVAL: u64 = 100;

/// What the sink learns about the link before the first cycle.
#[derive(Debug, Clone, Copy)]
pub struct LinkSummary<'a> {
    pub source: &'a str,
    pub target: &'a str,
    pub directives: usize,
}

/// Consumer of cycle reports.
pub trait ReportSink {
    /// Called once before the first cycle.
    fn attached(&mut self, _link: &LinkSummary<'_>) {}

    /// Receives every completed cycle.
    fn publish(&mut self, report: CycleReport, dashboard_enabled: bool);
}

/// Sink that drops every report.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscardSink;

impl ReportSink for DiscardSink {
    fn publish(&mut self, _report: CycleReport, _dashboard_enabled: bool) {}
}

/// Timing statistics for the cycle loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    /// Cycles started, including aborted ones.
    pub cycles: u64,
    /// Cycles whose work took longer than the cycle interval.
    pub overruns: u64,
    /// Cycles lost to a panic.
    pub aborted_cycles: u64,
    pub max_cycle_time: Duration,
    pub total_cycle_time: Duration,
}

impl EngineStats {
    /// Mean work time per cycle.
    pub fn avg_cycle_time(&self) -> Duration {
        match u32::try_from(self.cycles) {
            Ok(0) => Duration::ZERO,
            Ok(n) => self.total_cycle_time / n,
            Err(_) => {
                Duration::from_secs_f64(self.total_cycle_time.as_secs_f64() / self.cycles as f64)
            }
        }
    }

    /// Account one cycle. Returns `true` on an overrun.
    fn record(&mut self, elapsed: Duration, budget: Duration) -> bool {
        self.cycles += 1;
        self.total_cycle_time += elapsed;
        self.max_cycle_time = self.max_cycle_time.max(elapsed);
        let overrun = elapsed > budget;
        if overrun {
            self.overruns += 1;
        }
        overrun
    }
}

/// Drives the mapping table against one source and one target.
pub struct SyncEngine {
    table: MappingTable,
    source: Arc<dyn SourceSystem>,
    target: Arc<dyn TargetSystem>,
    cycle_time: Duration,
    sequence: u64,
    stats: EngineStats,
}

impl SyncEngine {
    pub fn new(
        table: MappingTable,
        source: Arc<dyn SourceSystem>,
        target: Arc<dyn TargetSystem>,
        cycle_time: Duration,
    ) -> Self {
        Self {
            table,
            source,
            target,
            cycle_time,
            sequence: 0,
            stats: EngineStats::default(),
        }
    }

    pub fn table(&self) -> &MappingTable {
        &self.table
    }

    pub fn cycle_time(&self) -> Duration {
        self.cycle_time
    }

    pub fn stats(&self) -> EngineStats {
        self.stats
    }

    /// Execute one full scan of the table.
    pub fn run_cycle(&mut self) -> CycleReport {
        self.sequence += 1;
        let mut report = CycleReport::new(self.sequence, self.table.len());

        for directive in &self.table {
            let mut entry = CycleLogEntry::pending(directive);
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                transfer(&*self.source, &*self.target, directive, &mut entry)
            }));
            let result = outcome.unwrap_or_else(|payload| {
                let msg = panic_message(payload.as_ref()).to_string();
                error!(
                    "Cycle {}: {} {} -> {} panicked: {}",
                    self.sequence, directive.direction, directive.source_path, directive.target_signal, msg
                );
                Err(EntryStatus::TransferError(msg))
            });
            if let Err(status) = result {
                debug!(
                    "Cycle {}: {} {} -> {}: {}",
                    self.sequence, directive.direction, directive.source_path, directive.target_signal, status
                );
                entry.status = status;
            }
            report.push(entry);
        }

        report
    }

    /// Run cycles until `state` stops, publishing each report to `sink`.
    pub fn run(&mut self, state: &EngineState, sink: &mut dyn ReportSink) -> EngineStats {
        info!(
            "Starting sync loop ({} directives, cycle_time={}ms)",
            self.table.len(),
            self.cycle_time.as_millis()
        );
        sink.attached(&LinkSummary {
            source: self.source.name(),
            target: self.target.name(),
            directives: self.table.len(),
        });

        while state.is_running() {
            let cycle_start = Instant::now();

            match panic::catch_unwind(AssertUnwindSafe(|| self.run_cycle())) {
                Ok(report) => sink.publish(report, state.dashboard_enabled()),
                Err(payload) => {
                    self.stats.aborted_cycles += 1;
                    error!(
                        "Cycle {} aborted: {}",
                        self.sequence,
                        panic_message(payload.as_ref())
                    );
                }
            }

            let elapsed = cycle_start.elapsed();
            if self.stats.record(elapsed, self.cycle_time)
                && (self.stats.overruns <= 10 || self.stats.overruns % 1000 == 0)
            {
                warn!(
                    "Cycle overrun #{}: work took {}ms (interval {}ms)",
                    self.stats.overruns,
                    elapsed.as_millis(),
                    self.cycle_time.as_millis()
                );
            }

            if self.stats.cycles % STATS_LOG_INTERVAL == 0 {
                debug!(
                    "Sync loop: {} cycles, avg={}us, max={}us, overruns={}, aborted={}",
                    self.stats.cycles,
                    self.stats.avg_cycle_time().as_micros(),
                    self.stats.max_cycle_time.as_micros(),
                    self.stats.overruns,
                    self.stats.aborted_cycles
                );
            }

            if !state.wait_while_running(self.cycle_time) {
                break;
            }
        }

        info!(
            "Sync loop stopped after {} cycles (overruns: {}, aborted: {})",
            self.stats.cycles, self.stats.overruns, self.stats.aborted_cycles
        );
        self.stats
    }
}

/// Transfer one directive, filling `entry` as values become known.
fn transfer(
    source: &dyn SourceSystem,
    target: &dyn TargetSystem,
    directive: &MappingDirective,
    entry: &mut CycleLogEntry,
) -> Result<(), EntryStatus> {
    match directive.direction {
        Direction::SourceToTarget => push_to_target(source, target, directive, entry),
        Direction::TargetToSource => pull_from_target(source, target, directive, entry),
    }
}

fn push_to_target(
    source: &dyn SourceSystem,
    target: &dyn TargetSystem,
    directive: &MappingDirective,
    entry: &mut CycleLogEntry,
) -> Result<(), EntryStatus> {
    let value = source
        .read_value(&directive.source_path)?
        .ok_or(EntryStatus::MissingSource)?;
    entry.display_value = value.to_string();

    let handle = resolve(target, directive)?;
    check_kind(&handle, directive)?;
    let command = codec::to_signal(&value, directive.width).map_err(LinkError::from)?;
    entry.display_value = command.display();

    // Scope is dropped on every path out of this block.
    let mut scope = target.request_mastership()?;
    match command {
        SignalCommand::Switch(on) => {
            let level = codec::bool_level(on);
            if target.read_signal_value(&handle)? != level {
                scope.write_signal(&handle, level)?;
            }
        }
        SignalCommand::Level(level) => scope.write_signal(&handle, level)?,
    }
    Ok(())
}

fn pull_from_target(
    source: &dyn SourceSystem,
    target: &dyn TargetSystem,
    directive: &MappingDirective,
    entry: &mut CycleLogEntry,
) -> Result<(), EntryStatus> {
    let handle = resolve(target, directive)?;
    let raw = target.read_signal_value(&handle)?;
    let value = codec::from_signal(raw, directive.width);
    entry.display_value = if directive.width.is_bool() {
        value.to_string()
    } else {
        codec::format_real(raw)
    };

    source.write_value(&directive.source_path, &value)?;
    Ok(())
}

fn resolve(target: &dyn TargetSystem, directive: &MappingDirective) -> Result<SignalHandle, EntryStatus> {
    target
        .get_signal(&directive.target_signal)?
        .ok_or(EntryStatus::MissingTarget)
}

/// Boolean directives need a digital signal, every other width a group or
/// analog one.
fn check_kind(handle: &SignalHandle, directive: &MappingDirective) -> Result<(), LinkError> {
    let fits = match handle.kind() {
        SignalKind::Digital => directive.width.is_bool(),
        SignalKind::Group | SignalKind::Analog => !directive.width.is_bool(),
    };
    if fits {
        Ok(())
    } else {
        Err(LinkError::KindMismatch {
            name: handle.name().to_string(),
            kind: handle.kind(),
            bits: directive.width.bits(),
        })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        *msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.as_str()
    } else {
        "unknown panic payload"
    }
}
