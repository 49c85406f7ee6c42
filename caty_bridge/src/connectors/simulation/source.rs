//! Simulated PLC symbol table.

use caty_common::codec::PlcValue;
use caty_common::link::{ConnectContext, ConnectionError, LinkError, SourceSystem};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::debug;

/// In-memory PLC symbol table.
///
/// Symbols keep whatever value was last written. Writes to a symbol marked
/// with [`fail_writes_to`](Self::fail_writes_to) are rejected.
pub struct SimulatedSource {
    name: String,
    symbols: RwLock<HashMap<String, PlcValue>>,
    rejected: RwLock<HashSet<String>>,
    connected: AtomicBool,
    reads: AtomicU64,
    writes: AtomicU64,
    disconnects: AtomicU64,
}

impl SimulatedSource {
    /// Empty symbol table.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            symbols: RwLock::new(HashMap::new()),
            rejected: RwLock::new(HashSet::new()),
            connected: AtomicBool::new(true),
            reads: AtomicU64::new(0),
            writes: AtomicU64::new(0),
            disconnects: AtomicU64::new(0),
        }
    }

    /// Builder form of [`set_value`](Self::set_value).
    pub fn with_symbol(self, path: impl Into<String>, value: PlcValue) -> Self {
        self.symbols.write().insert(path.into(), value);
        self
    }

    /// Seed from `[simulation] symbols`, or from the mapping table when the
    /// section is empty (`BOOL FALSE` for width 1, `LREAL 0` otherwise).
    pub fn from_context(ctx: &ConnectContext<'_>) -> Self {
        let bridge = &ctx.config.bridge;
        let source = Self::new(format!("simulated PLC {}:{}", bridge.net_id, bridge.port));

        {
            let mut symbols = source.symbols.write();
            if ctx.config.simulation.is_empty() {
                for directive in ctx.table {
                    let initial = if directive.width.is_bool() {
                        PlcValue::Bool(false)
                    } else {
                        PlcValue::Real(0.0)
                    };
                    symbols.entry(directive.source_path.clone()).or_insert(initial);
                }
            } else {
                for seed in &ctx.config.simulation.symbols {
                    symbols.insert(seed.path.clone(), seed.value.clone().into());
                }
            }
        }
        source
    }

    /// Overwrite or create a symbol.
    pub fn set_value(&self, path: impl Into<String>, value: PlcValue) {
        self.symbols.write().insert(path.into(), value);
    }

    /// Current value of a symbol.
    pub fn value(&self, path: &str) -> Option<PlcValue> {
        self.symbols.read().get(path).cloned()
    }

    pub fn symbol_count(&self) -> usize {
        self.symbols.read().len()
    }

    /// Reject every future write to `path`.
    pub fn fail_writes_to(&self, path: impl Into<String>) {
        self.rejected.write().insert(path.into());
    }

    pub fn read_count(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    /// Successful writes.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
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
}

impl SourceSystem for SimulatedSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn read_value(&self, path: &str) -> Result<Option<PlcValue>, LinkError> {
        self.ensure_connected()?;
        self.reads.fetch_add(1, Ordering::Relaxed);
        Ok(self.value(path))
    }

    fn write_value(&self, path: &str, value: &PlcValue) -> Result<(), LinkError> {
        self.ensure_connected()?;
        if self.rejected.read().contains(path) {
            return Err(LinkError::WriteRejected {
                path: path.to_string(),
                reason: "simulated write fault".to_string(),
            });
        }

        let mut symbols = self.symbols.write();
        let slot = symbols
            .get_mut(path)
            .ok_or_else(|| LinkError::UnknownSymbol(path.to_string()))?;
        *slot = value.clone();
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn disconnect(&self) -> Result<(), ConnectionError> {
        self.disconnects.fetch_add(1, Ordering::Relaxed);
        if !self.connected.swap(false, Ordering::AcqRel) {
            return Err(ConnectionError::ReleaseFailed {
                system: self.name.clone(),
                reason: "already released".to_string(),
            });
        }
        debug!("{} disconnected", self.name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use caty_common::codec::Width;
    use caty_common::config::{BridgeConfig, SeedValue, SymbolSeed};
    use caty_common::mapping::MappingTable;

    #[test]
    fn read_and_write_symbols() {
        let source = SimulatedSource::new("plc").with_symbol("MAIN.nCount", PlcValue::Word(3));
        assert_eq!(source.read_value("MAIN.nCount").unwrap(), Some(PlcValue::Word(3)));
        assert_eq!(source.read_value("MAIN.missing").unwrap(), None);

        source.write_value("MAIN.nCount", &PlcValue::Word(9)).unwrap();
        assert_eq!(source.value("MAIN.nCount"), Some(PlcValue::Word(9)));
        assert_eq!(source.write_count(), 1);
        assert_eq!(source.read_count(), 2);
    }

    #[test]
    fn write_to_unknown_symbol_fails() {
        let source = SimulatedSource::new("plc");
        assert_eq!(
            source.write_value("MAIN.ghost", &PlcValue::Bool(true)),
            Err(LinkError::UnknownSymbol("MAIN.ghost".to_string()))
        );
    }

    #[test]
    fn injected_write_fault() {
        let source = SimulatedSource::new("plc").with_symbol("MAIN.b", PlcValue::Bool(false));
        source.fail_writes_to("MAIN.b");
        assert!(matches!(
            source.write_value("MAIN.b", &PlcValue::Bool(true)),
            Err(LinkError::WriteRejected { .. })
        ));
        assert_eq!(source.value("MAIN.b"), Some(PlcValue::Bool(false)));
    }

    #[test]
    fn disconnected_source_refuses_calls() {
        let source = SimulatedSource::new("plc");
        source.disconnect().unwrap();
        assert!(!source.is_connected());
        assert_eq!(source.read_value("MAIN.b"), Err(LinkError::Disconnected));
        assert_eq!(source.disconnect_count(), 1);

        let err = source.disconnect().unwrap_err();
        assert!(matches!(err, ConnectionError::ReleaseFailed { .. }));
        assert_eq!(source.disconnect_count(), 2);
    }

    #[test]
    fn seeds_from_mapping_when_section_empty() {
        let config = BridgeConfig::default();
        let table = MappingTable::parse_str(
            "r# MAIN.bTrig: DI_Start[1]\nw# MAIN.fSpeed: AO_Speed[64]\nr# MAIN.bTrig: DI_Other[1]\n",
        );
        let source = SimulatedSource::from_context(&ConnectContext {
            config: &config,
            table: &table,
        });
        assert_eq!(source.symbol_count(), 2);
        assert_eq!(source.value("MAIN.bTrig"), Some(PlcValue::Bool(false)));
        assert_eq!(source.value("MAIN.fSpeed"), Some(PlcValue::Real(0.0)));
        assert_eq!(table.directives()[1].width, Width::Real(64));
    }

    #[test]
    fn seeds_from_config_section() {
        let mut config = BridgeConfig::default();
        config.simulation.symbols.push(SymbolSeed {
            path: "MAIN.nMode".to_string(),
            value: SeedValue::Int(4),
        });
        let table = MappingTable::parse_str("r# MAIN.bTrig: DI_Start[1]");
        let source = SimulatedSource::from_context(&ConnectContext {
            config: &config,
            table: &table,
        });
        assert_eq!(source.value("MAIN.nMode"), Some(PlcValue::Int(4)));
        assert_eq!(source.value("MAIN.bTrig"), None);
        assert!(source.name().contains("851"));
    }
}
