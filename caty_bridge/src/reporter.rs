//! Operator console rendering.
//!
//! The reporter owns the console surface: the status screen shown at start
//! and whenever the dashboard is switched off, and the live dashboard drawn
//! from cycle reports at its own redraw cadence.

use caty_common::report::{CycleReport, EntryStatus};
use chrono::{DateTime, Local};
use colored::Colorize;
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::engine::{LinkSummary, ReportSink};

const RULE_WIDTH: usize = 80;
const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

/// Static facts shown on the status screen.
#[derive(Debug, Clone)]
pub struct StatusInfo {
    pub net_id: String,
    pub port: u16,
    pub mapping_file: PathBuf,
}

/// Reporter settings.
#[derive(Debug, Clone)]
pub struct ReporterOptions {
    /// Sampling interval, shown in the dashboard header.
    pub cycle_time: Duration,
    /// Minimum time between two dashboard frames. Zero redraws every cycle.
    pub redraw_interval: Duration,
    /// Clear the terminal before every screen.
    pub clear_screen: bool,
    pub status: StatusInfo,
}

/// Console reporter over any writer.
pub struct Reporter<W: Write> {
    out: W,
    options: ReporterOptions,
    link: Option<LinkInfo>,
    latest: Option<CycleReport>,
    last_frame: Option<Instant>,
    showing_dashboard: bool,
}

#[derive(Debug, Clone)]
struct LinkInfo {
    source: String,
    target: String,
    directives: usize,
}

impl<W: Write> Reporter<W> {
    pub fn new(out: W, options: ReporterOptions) -> Self {
        Self {
            out,
            options,
            link: None,
            latest: None,
            last_frame: None,
            showing_dashboard: false,
        }
    }

    /// Most recent report seen while the dashboard was on.
    pub fn latest(&self) -> Option<&CycleReport> {
        self.latest.as_ref()
    }

    /// Whether the last screen drawn was the dashboard.
    pub fn showing_dashboard(&self) -> bool {
        self.showing_dashboard
    }

    pub fn get_ref(&self) -> &W {
        &self.out
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// Draw the home screen: banner, link settings, connection status and
    /// key help.
    pub fn render_status_screen(&mut self) -> io::Result<()> {
        let status = &self.options.status;
        let banner = "#".repeat(47);
        let rule = "-".repeat(47);
        let mut screen = String::new();

        if self.options.clear_screen {
            screen.push_str(CLEAR_SCREEN);
        }
        screen.push_str(&format!("{banner}\n"));
        screen.push_str(&format!("#{:^45}#\n", format!("Caty Bridge v{}", env!("CARGO_PKG_VERSION"))));
        screen.push_str(&format!("#{:^45}#\n", "PLC <-> Robot I/O Interface"));
        screen.push_str(&format!("{banner}\n"));
        screen.push_str(&format!("NetID:   {}\n", status.net_id));
        screen.push_str(&format!("Port:    {}\n", status.port));
        screen.push_str(&format!("File:    {}\n", status.mapping_file.display()));
        screen.push_str(&format!("Cycle:   {} ms\n", self.options.cycle_time.as_millis()));
        screen.push_str(&format!("{rule}\n"));

        let ok = "[OK]".green().bold();
        match &self.link {
            Some(link) => {
                screen.push_str(&format!("{ok} Variables loaded: {}\n", link.directives));
                screen.push_str(&format!("{ok} Robot connected:  {}\n", link.target));
                screen.push_str(&format!("{ok} PLC link:         {} (Cyclic)\n", link.source));
            }
            None => {
                let waiting = "[--]".yellow().bold();
                screen.push_str(&format!("{waiting} Robot connected:  Waiting...\n"));
            }
        }

        screen.push_str(&format!("\n{rule}\n"));
        screen.push_str(" SYSTEM RUNNING (Background Mode).\n");
        screen.push_str(" Press [V] -> Toggle Live Dashboard\n");
        screen.push_str(" Press [Q] -> Quit Program\n");
        screen.push_str(&format!("{rule}\n"));

        self.out.write_all(screen.as_bytes())?;
        self.out.flush()
    }

    /// Draw one dashboard frame for `report`.
    pub fn render_dashboard(&mut self, report: &CycleReport) -> io::Result<()> {
        let stamp: DateTime<Local> = report.started_at().into();
        let mut frame = String::new();

        if self.options.clear_screen {
            frame.push_str(CLEAR_SCREEN);
        }
        frame.push_str(&format!(
            "{}\n",
            format!("--- CATY LIVE DASHBOARD ({}) ---", stamp.format("%H:%M:%S")).cyan().bold()
        ));
        frame.push_str(&format!(
            "Data Cycle: {}ms | Display Update: {}ms\n",
            self.options.cycle_time.as_millis(),
            self.options.redraw_interval.as_millis()
        ));
        frame.push_str(&format!(
            "{:<8} | {:<30} | {:<8} | {:<20} | {}\n",
            "DIR", "SOURCE SYMBOL", "VAL", "TARGET SIGNAL", "STATUS"
        ));
        frame.push_str(&format!("{}\n", "-".repeat(RULE_WIDTH)));

        for entry in report.entries() {
            frame.push_str(&format!(
                "{:<8} | {:<30} | {:<8} | {:<20} | {}\n",
                entry.direction.tag(),
                entry.source_path,
                entry.display_value,
                entry.target_signal,
                colorize(&entry.status)
            ));
        }

        self.out.write_all(frame.as_bytes())?;
        self.out.flush()
    }

    fn redraw_due(&self, now: Instant) -> bool {
        match self.last_frame {
            None => true,
            Some(last) => {
                self.options.redraw_interval.is_zero()
                    || now.duration_since(last) >= self.options.redraw_interval
            }
        }
    }
}

fn colorize(status: &EntryStatus) -> String {
    let text = status.to_string();
    match status {
        EntryStatus::Ok => text.green().to_string(),
        EntryStatus::MissingSource | EntryStatus::MissingTarget => text.yellow().to_string(),
        EntryStatus::TransferError(_) => text.red().to_string(),
    }
}

impl<W: Write> ReportSink for Reporter<W> {
    fn attached(&mut self, link: &LinkSummary<'_>) {
        self.link = Some(LinkInfo {
            source: link.source.to_string(),
            target: link.target.to_string(),
            directives: link.directives,
        });
        if let Err(e) = self.render_status_screen() {
            debug!("Status screen not drawn: {}", e);
        }
    }

    fn publish(&mut self, report: CycleReport, dashboard_enabled: bool) {
        if !dashboard_enabled {
            if self.showing_dashboard {
                self.showing_dashboard = false;
                self.last_frame = None;
                if let Err(e) = self.render_status_screen() {
                    debug!("Status screen not drawn: {}", e);
                }
            }
            return;
        }

        let now = Instant::now();
        if self.redraw_due(now) {
            if let Err(e) = self.render_dashboard(&report) {
                debug!("Dashboard frame not drawn: {}", e);
            }
            self.last_frame = Some(now);
            self.showing_dashboard = true;
        }
        self.latest = Some(report);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use caty_common::codec::Width;
    use caty_common::mapping::{Direction, MappingDirective};
    use caty_common::report::CycleLogEntry;

    fn options(redraw_ms: u64) -> ReporterOptions {
        ReporterOptions {
            cycle_time: Duration::from_millis(100),
            redraw_interval: Duration::from_millis(redraw_ms),
            clear_screen: false,
            status: StatusInfo {
                net_id: "5.80.201.232.1.1".to_string(),
                port: 851,
                mapping_file: PathBuf::from("/etc/caty/vars_robot.txt"),
            },
        }
    }

    fn report(sequence: u64) -> CycleReport {
        let directive = MappingDirective {
            direction: Direction::SourceToTarget,
            source_path: "MAIN.bTrig".to_string(),
            target_signal: "DI_Start".to_string(),
            width: Width::Bit,
        };
        let mut report = CycleReport::new(sequence, 2);
        let mut ok = CycleLogEntry::pending(&directive);
        ok.display_value = "TRUE".to_string();
        report.push(ok);
        let mut missing = CycleLogEntry::pending(&directive);
        missing.status = EntryStatus::MissingTarget;
        report.push(missing);
        report
    }

    fn output(reporter: &Reporter<Vec<u8>>) -> String {
        String::from_utf8_lossy(reporter.get_ref()).into_owned()
    }

    #[test]
    fn status_screen_lists_link_settings() {
        let mut reporter = Reporter::new(Vec::new(), options(500));
        reporter.attached(&LinkSummary {
            source: "simulated PLC",
            target: "IRB-120",
            directives: 7,
        });
        let text = output(&reporter);
        assert!(text.contains("NetID:   5.80.201.232.1.1"));
        assert!(text.contains("Port:    851"));
        assert!(text.contains("Cycle:   100 ms"));
        assert!(text.contains("Variables loaded: 7"));
        assert!(text.contains("IRB-120"));
        assert!(text.contains("Press [Q]"));
    }

    #[test]
    fn silent_mode_draws_nothing() {
        let mut reporter = Reporter::new(Vec::new(), options(0));
        reporter.publish(report(1), false);
        reporter.publish(report(2), false);
        assert!(reporter.get_ref().is_empty());
        assert!(reporter.latest().is_none());
    }

    #[test]
    fn dashboard_frame_layout() {
        let mut reporter = Reporter::new(Vec::new(), options(0));
        reporter.publish(report(1), true);
        let text = output(&reporter);
        assert!(text.contains("--- CATY LIVE DASHBOARD ("));
        assert!(text.contains("Data Cycle: 100ms | Display Update: 0ms"));
        assert!(text.contains(&"-".repeat(80)));
        assert!(text.contains("ADS->ROB"));
        assert!(text.contains("MAIN.bTrig"));
        assert!(text.contains("Sig Missing"));
        assert_eq!(reporter.latest().map(CycleReport::sequence), Some(1));
    }

    #[test]
    fn redraw_interval_throttles_frames() {
        let mut reporter = Reporter::new(Vec::new(), options(60_000));
        reporter.publish(report(1), true);
        let after_first = reporter.get_ref().len();
        reporter.publish(report(2), true);
        assert_eq!(reporter.get_ref().len(), after_first);
        // Sampling still advances.
        assert_eq!(reporter.latest().map(CycleReport::sequence), Some(2));
    }

    #[test]
    fn zero_interval_redraws_every_cycle() {
        let mut reporter = Reporter::new(Vec::new(), options(0));
        reporter.publish(report(1), true);
        reporter.publish(report(2), true);
        assert_eq!(output(&reporter).matches("CATY LIVE DASHBOARD").count(), 2);
    }

    #[test]
    fn switching_off_redraws_status_once() {
        let mut reporter = Reporter::new(Vec::new(), options(0));
        reporter.publish(report(1), true);
        assert!(reporter.showing_dashboard());
        reporter.publish(report(2), false);
        reporter.publish(report(3), false);
        assert!(!reporter.showing_dashboard());
        let text = String::from_utf8(reporter.into_inner()).unwrap();
        assert_eq!(text.matches("SYSTEM RUNNING").count(), 1);
    }
}
