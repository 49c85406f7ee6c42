//! Run flags shared between the foreground thread and the sync worker.
//!
//! One mutex guards both flags; the condvar wakes the worker's inter-cycle
//! sleep as soon as a stop is requested.

use parking_lot::{Condvar, Mutex};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy)]
struct Flags {
    running: bool,
    dashboard_enabled: bool,
}

/// `running` / `dashboard_enabled`, shared by `Arc`.
#[derive(Debug)]
pub struct EngineState {
    flags: Mutex<Flags>,
    wake: Condvar,
}

impl EngineState {
    /// New state in the running condition.
    pub fn new(dashboard_enabled: bool) -> Self {
        Self {
            flags: Mutex::new(Flags {
                running: true,
                dashboard_enabled,
            }),
            wake: Condvar::new(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.flags.lock().running
    }

    /// Clear the running flag and wake every waiter.
    ///
    /// Returns `true` only for the call that actually flipped the flag.
    pub fn request_stop(&self) -> bool {
        let mut flags = self.flags.lock();
        let was_running = flags.running;
        flags.running = false;
        drop(flags);
        self.wake.notify_all();
        was_running
    }

    pub fn dashboard_enabled(&self) -> bool {
        self.flags.lock().dashboard_enabled
    }

    pub fn set_dashboard(&self, enabled: bool) {
        self.flags.lock().dashboard_enabled = enabled;
    }

    /// Flip the dashboard flag and return the new value.
    pub fn toggle_dashboard(&self) -> bool {
        let mut flags = self.flags.lock();
        flags.dashboard_enabled = !flags.dashboard_enabled;
        flags.dashboard_enabled
    }

    /// Sleep for up to `timeout`, returning early on a stop request.
    ///
    /// Returns the running flag at wake-up.
    pub fn wait_while_running(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut flags = self.flags.lock();
        while flags.running {
            if self.wake.wait_until(&mut flags, deadline).timed_out() {
                break;
            }
        }
        flags.running
    }
}

impl Default for EngineState {
    fn default() -> Self {
        Self::new(false)
    }
}
