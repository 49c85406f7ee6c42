//! Simulated robot controller I/O table.

use caty_common::link::{
    ConnectContext, ConnectionError, LinkError, MastershipScope, SignalHandle, SignalKind,
    SignalWriter, TargetSystem,
};
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::debug;

/// One simulated I/O signal.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatedSignal {
    pub name: String,
    pub kind: SignalKind,
    pub value: f64,
    /// Writes applied to this signal.
    pub writes: u64,
}

/// In-memory robot controller.
///
/// Signals are fixed at construction. Writing needs the mastership scope;
/// only one scope can be held at a time.
pub struct SimulatedTarget {
    name: String,
    index: HashMap<String, usize>,
    signals: Mutex<Vec<SimulatedSignal>>,
    rejected: RwLock<HashSet<String>>,
    master_held: AtomicBool,
    deny_mastership: AtomicBool,
    connected: AtomicBool,
    grants: AtomicU64,
    disconnects: AtomicU64,
}

impl SimulatedTarget {
    /// Controller with no signals.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            index: HashMap::new(),
            signals: Mutex::new(Vec::new()),
            rejected: RwLock::new(HashSet::new()),
            master_held: AtomicBool::new(false),
            deny_mastership: AtomicBool::new(false),
            connected: AtomicBool::new(true),
            grants: AtomicU64::new(0),
            disconnects: AtomicU64::new(0),
        }
    }

    /// Add a signal. A name that already exists keeps its first definition.
    pub fn with_signal(mut self, name: impl Into<String>, kind: SignalKind, value: f64) -> Self {
        let name = name.into();
        if !self.index.contains_key(&name) {
            let signals = self.signals.get_mut();
            self.index.insert(name.clone(), signals.len());
            signals.push(SimulatedSignal {
                name,
                kind,
                value,
                writes: 0,
            });
        }
        self
    }

    /// Seed from `[simulation] signals`, or from the mapping table when the
    /// section is empty (digital for width 1, analog otherwise).
    pub fn from_context(ctx: &ConnectContext<'_>) -> Self {
        let mut target = Self::new("simulated robot controller");
        if ctx.config.simulation.is_empty() {
            for directive in ctx.table {
                let kind = if directive.width.is_bool() {
                    SignalKind::Digital
                } else {
                    SignalKind::Analog
                };
                target = target.with_signal(directive.target_signal.clone(), kind, 0.0);
            }
        } else {
            for seed in &ctx.config.simulation.signals {
                target = target.with_signal(seed.name.clone(), seed.kind, seed.value);
            }
        }
        target
    }

    pub fn signal_count(&self) -> usize {
        self.index.len()
    }

    /// Snapshot of a signal by name.
    pub fn signal(&self, name: &str) -> Option<SimulatedSignal> {
        let idx = *self.index.get(name)?;
        self.signals.lock().get(idx).cloned()
    }

    /// Set a signal level from the controller side, bypassing mastership.
    /// Returns `false` for an unknown signal.
    pub fn set_level(&self, name: &str, value: f64) -> bool {
        match self.index.get(name) {
            Some(&idx) => {
                self.signals.lock()[idx].value = value;
                true
            }
            None => false,
        }
    }

    /// Reject every future write to `name`.
    pub fn fail_writes_to(&self, name: impl Into<String>) {
        self.rejected.write().insert(name.into());
    }

    /// Refuse (or grant again) every mastership request.
    pub fn deny_mastership(&self, deny: bool) {
        self.deny_mastership.store(deny, Ordering::Release);
    }

    /// Writes applied across all signals.
    pub fn write_count(&self) -> u64 {
        self.signals.lock().iter().map(|s| s.writes).sum()
    }

    /// Mastership scopes granted so far.
    pub fn mastership_grants(&self) -> u64 {
        self.grants.load(Ordering::Relaxed)
    }

    pub fn mastership_held(&self) -> bool {
        self.master_held.load(Ordering::Acquire)
    }

    pub fn disconnect_count(&self) -> u64 {
        self.disconnects.load(Ordering::Relaxed)
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    fn ensure_connected(&self) -> Result<(), LinkError> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(LinkError::Disconnected)
        }
    }

    fn apply(&self, handle: &SignalHandle, value: f64) -> Result<(), LinkError> {
        self.ensure_connected()?;
        if self.rejected.read().contains(handle.name()) {
            return Err(LinkError::SignalRejected {
                name: handle.name().to_string(),
                reason: "simulated write fault".to_string(),
            });
        }
        if handle.kind() == SignalKind::Digital && value != 0.0 && value != 1.0 {
            return Err(LinkError::SignalRejected {
                name: handle.name().to_string(),
                reason: format!("digital signal cannot take {value}"),
            });
        }

        let mut signals = self.signals.lock();
        let signal = signals
            .get_mut(handle.index())
            .filter(|s| s.name == handle.name())
            .ok_or_else(|| LinkError::Communication(format!("stale handle '{}'", handle.name())))?;
        signal.value = value;
        signal.writes += 1;
        Ok(())
    }
}

/// Held mastership. Dropping it frees the controller for the next request.
struct SimulatedMastership<'a> {
    target: &'a SimulatedTarget,
}

impl SignalWriter for SimulatedMastership<'_> {
    fn write_signal(&mut self, handle: &SignalHandle, value: f64) -> Result<(), LinkError> {
        self.target.apply(handle, value)
    }
}

impl Drop for SimulatedMastership<'_> {
    fn drop(&mut self) {
        self.target.master_held.store(false, Ordering::Release);
    }
}

impl TargetSystem for SimulatedTarget {
    fn name(&self) -> &str {
        &self.name
    }

    fn get_signal(&self, name: &str) -> Result<Option<SignalHandle>, LinkError> {
        self.ensure_connected()?;
        let Some(&idx) = self.index.get(name) else {
            return Ok(None);
        };
        let kind = self.signals.lock()[idx].kind;
        Ok(Some(SignalHandle::new(name, kind, idx)))
    }

    fn read_signal_value(&self, handle: &SignalHandle) -> Result<f64, LinkError> {
        self.ensure_connected()?;
        self.signals
            .lock()
            .get(handle.index())
            .map(|s| s.value)
            .ok_or_else(|| LinkError::Communication(format!("stale handle '{}'", handle.name())))
    }

    fn request_mastership(&self) -> Result<MastershipScope<'_>, LinkError> {
        self.ensure_connected()?;
        if self.deny_mastership.load(Ordering::Acquire) {
            return Err(LinkError::MastershipDenied("held by another client".to_string()));
        }
        if self
            .master_held
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(LinkError::MastershipDenied("already held".to_string()));
        }
        self.grants.fetch_add(1, Ordering::Relaxed);
        Ok(Box::new(SimulatedMastership { target: self }))
    }

    fn disconnect(&self) -> Result<(), ConnectionError> {
        self.disconnects.fetch_add(1, Ordering::Relaxed);
        if !self.connected.swap(false, Ordering::AcqRel) {
            return Err(ConnectionError::ReleaseFailed {
                system: self.name.clone(),
                reason: "already released".to_string(),
            });
        }
        debug!("{} logged off", self.name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use caty_common::config::{BridgeConfig, SignalSeed};
    use caty_common::mapping::MappingTable;

    fn controller() -> SimulatedTarget {
        SimulatedTarget::new("ctrl")
            .with_signal("DO_Start", SignalKind::Digital, 0.0)
            .with_signal("GO_Mode", SignalKind::Group, 3.0)
    }

    #[test]
    fn resolves_signals_by_name() {
        let target = controller();
        let handle = target.get_signal("GO_Mode").unwrap().expect("exists");
        assert_eq!(handle.kind(), SignalKind::Group);
        assert_eq!(target.read_signal_value(&handle).unwrap(), 3.0);
        assert!(target.get_signal("GO_Ghost").unwrap().is_none());
    }

    #[test]
    fn mastership_is_exclusive_and_released_on_drop() {
        let target = controller();
        let handle = target.get_signal("DO_Start").unwrap().unwrap();
        {
            let mut scope = target.request_mastership().unwrap();
            assert!(target.mastership_held());
            assert!(matches!(
                target.request_mastership(),
                Err(LinkError::MastershipDenied(_))
            ));
            scope.write_signal(&handle, 1.0).unwrap();
        }
        assert!(!target.mastership_held());
        assert_eq!(target.signal("DO_Start").unwrap().value, 1.0);
        assert_eq!(target.write_count(), 1);
        assert_eq!(target.mastership_grants(), 1);
    }

    #[test]
    fn scope_released_after_failed_write() {
        let target = controller();
        target.fail_writes_to("GO_Mode");
        let handle = target.get_signal("GO_Mode").unwrap().unwrap();
        {
            let mut scope = target.request_mastership().unwrap();
            assert!(matches!(
                scope.write_signal(&handle, 5.0),
                Err(LinkError::SignalRejected { .. })
            ));
        }
        assert!(!target.mastership_held());
        assert_eq!(target.signal("GO_Mode").unwrap().value, 3.0);
    }

    #[test]
    fn digital_signal_rejects_levels() {
        let target = controller();
        let handle = target.get_signal("DO_Start").unwrap().unwrap();
        let mut scope = target.request_mastership().unwrap();
        assert!(scope.write_signal(&handle, 0.5).is_err());
    }

    #[test]
    fn denied_mastership() {
        let target = controller();
        target.deny_mastership(true);
        assert!(matches!(
            target.request_mastership(),
            Err(LinkError::MastershipDenied(msg)) if msg.contains("another client")
        ));
    }

    #[test]
    fn seeds_from_mapping_and_config() {
        let table = MappingTable::parse_str("r# MAIN.b: DO_1[1]\nw# MAIN.f: AI_1[32]\n");
        let config = BridgeConfig::default();
        let target = SimulatedTarget::from_context(&ConnectContext {
            config: &config,
            table: &table,
        });
        assert_eq!(target.signal("DO_1").unwrap().kind, SignalKind::Digital);
        assert_eq!(target.signal("AI_1").unwrap().kind, SignalKind::Analog);

        let mut config = BridgeConfig::default();
        config.simulation.signals.push(SignalSeed {
            name: "GI_Count".to_string(),
            kind: SignalKind::Group,
            value: 7.0,
        });
        let target = SimulatedTarget::from_context(&ConnectContext {
            config: &config,
            table: &table,
        });
        assert_eq!(target.signal_count(), 1);
        assert_eq!(target.signal("GI_Count").unwrap().value, 7.0);
    }

    #[test]
    fn disconnect_counts_and_refuses() {
        let target = controller();
        target.disconnect().unwrap();
        assert!(matches!(target.get_signal("DO_Start"), Err(LinkError::Disconnected)));
        assert_eq!(target.disconnect_count(), 1);
        assert!(matches!(
            target.disconnect(),
            Err(ConnectionError::ReleaseFailed { system, .. }) if system == "ctrl"
        ));
    }
}
