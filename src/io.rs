// src/io.rs - Digital output and input capabilities
use crate::{error::Result, signal::SignalBus, value::Value};
use tracing::warn;

#[cfg(test)]
use mockall::automock;

/// On/off actuation line (light, claxon).
#[cfg_attr(test, automock)]
pub trait DigitalOutput: Send {
    /// Drive the line
    fn set(&mut self, on: bool) -> Result<()>;

    /// Last commanded level
    fn is_on(&self) -> bool;
}

/// On/off input line (silence button).
pub trait DigitalInput: Send {
    fn read(&mut self) -> Result<bool>;
}

impl<T: DigitalInput + ?Sized> DigitalInput for Box<T> {
    fn read(&mut self) -> Result<bool> {
        (**self).read()
    }
}

/// Output line backed by a named signal on a [`SignalBus`].
///
/// Writes only when the level changes, mirroring a pin driver that reads the
/// pin before writing it.
#[derive(Debug, Clone)]
pub struct SignalOutput {
    bus: SignalBus,
    signal: String,
    level: bool,
}

impl SignalOutput {
    /// Create the line and drive it low
    pub fn new(bus: SignalBus, signal: impl Into<String>) -> Result<Self> {
        let signal = signal.into();
        bus.set(&signal, Value::Bool(false))?;
        Ok(Self {
            bus,
            signal,
            level: false,
        })
    }

    pub fn signal(&self) -> &str {
        &self.signal
    }
}

impl DigitalOutput for SignalOutput {
    fn set(&mut self, on: bool) -> Result<()> {
        if self.level != on {
            self.bus.set(&self.signal, Value::Bool(on))?;
            self.level = on;
        }
        Ok(())
    }

    fn is_on(&self) -> bool {
        self.level
    }
}

/// Input line backed by a named signal on a [`SignalBus`].
///
/// A missing signal reads as released.
#[derive(Debug, Clone)]
pub struct SignalInput {
    bus: SignalBus,
    signal: String,
}

impl SignalInput {
    pub fn new(bus: SignalBus, signal: impl Into<String>) -> Self {
        Self {
            bus,
            signal: signal.into(),
        }
    }
}

impl DigitalInput for SignalInput {
    fn read(&mut self) -> Result<bool> {
        if !self.bus.exists(&self.signal) {
            return Ok(false);
        }
        self.bus.get_bool(&self.signal)
    }
}

/// Rising edge detector over a [`DigitalInput`].
pub struct EdgeDetector<I> {
    input: I,
    last: bool,
}

impl<I: DigitalInput> EdgeDetector<I> {
    pub fn new(input: I) -> Self {
        Self { input, last: false }
    }

    /// True exactly once per press. Read errors count as "not pressed".
    pub fn rising_edge(&mut self) -> bool {
        let level = match self.input.read() {
            Ok(level) => level,
            Err(e) => {
                warn!("Input read failed: {}", e);
                false
            }
        };
        let edge = level && !self.last;
        self.last = level;
        edge
    }
}

/// The two actuation lines owned by the siren node.
pub struct AlarmOutputs {
    /// Steady visual indicator, on for the whole Active duration
    pub light: Box<dyn DigitalOutput>,
    /// Audible indicator, driven only through the beep pattern generator
    pub claxon: Box<dyn DigitalOutput>,
}

impl AlarmOutputs {
    pub fn new(light: Box<dyn DigitalOutput>, claxon: Box<dyn DigitalOutput>) -> Self {
        Self { light, claxon }
    }

    /// Signal-bus backed light and claxon lines
    pub fn on_bus(bus: &SignalBus, light_signal: &str, claxon_signal: &str) -> Result<Self> {
        Ok(Self::new(
            Box::new(SignalOutput::new(bus.clone(), light_signal)?),
            Box::new(SignalOutput::new(bus.clone(), claxon_signal)?),
        ))
    }
}
