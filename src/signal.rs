// src/signal.rs - Named I/O lines shared between a node and its hardware glue
use crate::{
    error::{Result, SireneError},
    value::Value,
};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::trace;

/// Thread-safe signal bus holding a node's named I/O lines.
///
/// The hardware glue (pin drivers, a simulator, a test) and the node share
/// one bus: the node writes the light and claxon lines, the glue writes the
/// silence button line and reads the outputs back.
///
/// # Examples
///
/// ```rust
/// use sirene::{SignalBus, Value};
///
/// let bus = SignalBus::new();
/// bus.set("alarm.light", Value::Bool(true))?;
/// assert!(bus.get_bool("alarm.light")?);
/// # Ok::<(), sirene::SireneError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct SignalBus {
    signals: Arc<DashMap<String, Value>>,
}

impl SignalBus {
    /// Create a new signal bus
    pub fn new() -> Self {
        Self {
            signals: Arc::new(DashMap::new()),
        }
    }

    /// Set a signal value
    pub fn set(&self, name: impl AsRef<str>, value: Value) -> Result<()> {
        let name = name.as_ref();
        trace!("Setting signal {} = {:?}", name, value);
        self.signals.insert(name.to_string(), value);
        Ok(())
    }

    /// Get a signal value, `None` if the signal doesn't exist
    pub fn get(&self, name: impl AsRef<str>) -> Option<Value> {
        self.signals
            .get(name.as_ref())
            .map(|entry| entry.value().clone())
    }

    /// Get a boolean signal value
    pub fn get_bool(&self, name: &str) -> Result<bool> {
        match self.get(name) {
            Some(v) => v.as_bool().ok_or(SireneError::TypeMismatch {
                expected: "bool",
                actual: v.type_name(),
            }),
            None => Err(SireneError::SignalNotFound(name.to_string())),
        }
    }

    /// Get a float signal value
    pub fn get_float(&self, name: &str) -> Result<f64> {
        match self.get(name) {
            Some(v) => v.as_float().ok_or(SireneError::TypeMismatch {
                expected: "float",
                actual: v.type_name(),
            }),
            None => Err(SireneError::SignalNotFound(name.to_string())),
        }
    }

    /// Check whether a signal exists
    pub fn exists(&self, name: &str) -> bool {
        self.signals.contains_key(name)
    }
}
