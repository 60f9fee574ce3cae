// src/node.rs - Siren and sensor nodes
//
// A node owns its components and exposes them to the runtime as message
// handlers plus a periodic tick. Inbound messages are applied between ticks,
// never during one.

use crate::{
    arbiter::{ArbitrationEngine, EscalationPhase},
    cause::{AlarmCause, AlarmCauseSet},
    clock::{elapsed_rebased, Clock, Timestamp},
    config::{Config, SensorConfig, SimulatedConfig, SirenConfig},
    error::{Result, SireneError},
    guard::EchoGuard,
    io::{AlarmOutputs, DigitalInput, EdgeDetector, SignalInput},
    protocol::{
        decode_set, ping_topic, pong_topic, value_topic, AlarmSetMessage, AlarmStatus, Inbound,
        Outbound, SensorReading, TOPIC_ALARM_SET, TOPIC_ALARM_STATUS,
    },
    signal::SignalBus,
};
use chrono::{DateTime, Timelike, Utc};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A participant on the alarm bus.
pub trait Node: Send {
    /// Topic prefix of the node, also used in log output
    fn name(&self) -> &str;

    /// Topics the transport must subscribe to
    fn subscriptions(&self) -> Vec<String>;

    /// Messages to publish right after (re)connecting
    fn on_connect(&mut self) -> Result<Vec<Outbound>>;

    /// Apply one inbound message. An error leaves the node state untouched.
    fn handle(&mut self, message: &Inbound) -> Result<Vec<Outbound>>;

    /// Advance the node by one control-loop tick
    fn tick(&mut self) -> Result<Vec<Outbound>>;
}

fn pong(prefix: &str, message: &Inbound) -> Vec<Outbound> {
    debug!("Answering ping on {}", message.topic);
    vec![Outbound::new(
        pong_topic(prefix),
        String::from_utf8_lossy(&message.payload),
    )]
}

// ============================================================================
// SIREN NODE
// ============================================================================

/// Aggregates the causes reported by every sensor into the physical alarm.
pub struct SirenNode {
    name: String,
    causes: AlarmCauseSet,
    engine: ArbitrationEngine,
    outputs: AlarmOutputs,
    button: EdgeDetector<Box<dyn DigitalInput>>,
    clock: Arc<dyn Clock>,
    status_interval_ms: u64,
    last_status: Option<Timestamp>,
    phase: EscalationPhase,
}

impl SirenNode {
    pub fn new(
        name: impl Into<String>,
        settings: &SirenConfig,
        outputs: AlarmOutputs,
        button: Box<dyn DigitalInput>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            name: name.into(),
            causes: AlarmCauseSet::new(),
            engine: ArbitrationEngine::new(settings.escalation, settings.patterns, settings.timings),
            outputs,
            button: EdgeDetector::new(button),
            clock,
            status_interval_ms: settings.status_interval_ms,
            last_status: None,
            phase: EscalationPhase::Idle,
        }
    }

    /// Siren whose light, claxon and button are signals on `bus`
    pub fn on_bus(
        name: impl Into<String>,
        settings: &SirenConfig,
        bus: &SignalBus,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let outputs = AlarmOutputs::on_bus(bus, &settings.light_signal, &settings.claxon_signal)?;
        let button = Box::new(SignalInput::new(bus.clone(), settings.button_signal.clone()));
        Ok(Self::new(name, settings, outputs, button, clock))
    }

    pub fn causes(&self) -> &AlarmCauseSet {
        &self.causes
    }

    pub fn engine(&self) -> &ArbitrationEngine {
        &self.engine
    }

    pub fn outputs(&self) -> &AlarmOutputs {
        &self.outputs
    }

    /// Escalation phase of the last tick
    pub fn phase(&self) -> EscalationPhase {
        self.phase
    }

    /// Current combined state as an `alarm/status` message
    pub fn status(&self) -> AlarmStatus {
        AlarmStatus::from_causes(&self.causes)
    }

    /// Human silence: drop every cause and announce the cleared state.
    pub fn silence(&mut self, now: Timestamp) -> Result<Vec<Outbound>> {
        if self.causes.is_empty() {
            debug!("Silence requested with no active alarm");
        } else {
            info!("Alarm {} silenced by operator", self.causes);
        }
        let changed = !self.causes.is_empty();
        self.causes.clear();
        self.engine
            .on_causes_changed(now, &self.causes, changed, &mut self.outputs)?;
        Ok(vec![self.publish_status(now)?])
    }

    fn handle_set(&mut self, payload: &[u8]) -> Result<Vec<Outbound>> {
        let message = decode_set(payload)?;
        let now = self.clock.now_ms();
        if message.is_empty() {
            debug!("Status requested");
        } else {
            let next = message.apply_to(&self.causes);
            let changed = next != self.causes;
            self.causes.update(next.iter());
            debug!("Alarm causes now {} (changed: {})", self.causes, changed);
            self.engine
                .on_causes_changed(now, &self.causes, changed, &mut self.outputs)?;
        }
        Ok(vec![self.publish_status(now)?])
    }

    fn publish_status(&mut self, now: Timestamp) -> Result<Outbound> {
        self.last_status = Some(now);
        self.status().to_outbound()
    }

    fn status_due(&mut self, now: Timestamp) -> bool {
        if self.status_interval_ms == 0 {
            return false;
        }
        match self.last_status.as_mut() {
            Some(last) => elapsed_rebased(now, last) >= self.status_interval_ms,
            None => true,
        }
    }
}

impl Node for SirenNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn subscriptions(&self) -> Vec<String> {
        vec![TOPIC_ALARM_SET.to_string(), ping_topic(&self.name)]
    }

    fn on_connect(&mut self) -> Result<Vec<Outbound>> {
        let now = self.clock.now_ms();
        Ok(vec![self.publish_status(now)?])
    }

    fn handle(&mut self, message: &Inbound) -> Result<Vec<Outbound>> {
        if message.topic == TOPIC_ALARM_SET {
            self.handle_set(&message.payload)
        } else if message.topic == ping_topic(&self.name) {
            Ok(pong(&self.name, message))
        } else {
            debug!("Ignoring message on {}", message.topic);
            Ok(Vec::new())
        }
    }

    fn tick(&mut self) -> Result<Vec<Outbound>> {
        let now = self.clock.now_ms();
        let mut outbound = Vec::new();

        if self.button.rising_edge() {
            outbound.extend(self.silence(now)?);
        }

        let phase = self.engine.tick(now, &self.causes, &mut self.outputs)?;
        if phase != self.phase {
            debug!("Escalation phase {:?} -> {:?}", self.phase, phase);
            self.phase = phase;
        }

        if self.status_due(now) {
            outbound.push(self.publish_status(now)?);
        }
        Ok(outbound)
    }
}

// ============================================================================
// SENSOR NODE
// ============================================================================

/// Source of raw sensor readings.
pub trait Sensor: Send {
    fn read(&mut self) -> Result<f64>;
}

/// Random-walk sensor for running nodes without hardware.
#[derive(Debug)]
pub struct SimulatedSensor {
    value: f64,
    step: f64,
    min: f64,
    max: f64,
    rng: StdRng,
}

impl SimulatedSensor {
    pub fn new(settings: &SimulatedConfig) -> Result<Self> {
        Self::with_rng(settings, StdRng::from_entropy())
    }

    /// Deterministic walk for replay
    pub fn seeded(settings: &SimulatedConfig, seed: u64) -> Result<Self> {
        Self::with_rng(settings, StdRng::seed_from_u64(seed))
    }

    fn with_rng(settings: &SimulatedConfig, rng: StdRng) -> Result<Self> {
        settings.check_bounds()?;
        Ok(Self {
            value: settings.initial.clamp(settings.min, settings.max),
            step: settings.step.abs(),
            min: settings.min,
            max: settings.max,
            rng,
        })
    }
}

impl Sensor for SimulatedSensor {
    fn read(&mut self) -> Result<f64> {
        if self.step > 0.0 {
            let delta = self.rng.gen_range(-self.step..=self.step);
            self.value = (self.value + delta).clamp(self.min, self.max);
        }
        Ok(self.value)
    }
}

/// Sensor reading a float line on a [`SignalBus`], written by hardware glue.
#[derive(Debug, Clone)]
pub struct SignalSensor {
    bus: SignalBus,
    signal: String,
}

impl SignalSensor {
    pub fn new(bus: SignalBus, signal: impl Into<String>) -> Self {
        Self {
            bus,
            signal: signal.into(),
        }
    }
}

impl Sensor for SignalSensor {
    fn read(&mut self) -> Result<f64> {
        self.bus
            .get_float(&self.signal)
            .map_err(|e| SireneError::Sensor(format!("{}: {}", self.signal, e)))
    }
}

/// How a reading is compared against the threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TripRule {
    /// Breach when `value < threshold`
    Below,
    /// Breach when `value <= threshold`
    AtOrBelow,
}

impl TripRule {
    pub fn breached(self, value: f64, threshold: f64) -> bool {
        match self {
            TripRule::Below => value < threshold,
            TripRule::AtOrBelow => value <= threshold,
        }
    }
}

/// UTC hours in which a breach may raise the alarm, `[start_hour, end_hour)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatingHours {
    pub start_hour: u32,
    pub end_hour: u32,
}

impl OperatingHours {
    pub fn new(start_hour: u32, end_hour: u32) -> Self {
        Self { start_hour, end_hour }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        let hour = at.hour();
        hour >= self.start_hour && hour < self.end_hour
    }
}

/// Samples one sensor and asserts its cause on the shared alarm.
pub struct SensorNode {
    name: String,
    guard: EchoGuard,
    sensor: Box<dyn Sensor>,
    threshold: f64,
    trip: TripRule,
    hours: Option<OperatingHours>,
    clock: Arc<dyn Clock>,
    last_value: Option<f64>,
}

impl SensorNode {
    pub fn new(
        name: impl Into<String>,
        cause: AlarmCause,
        settings: &SensorConfig,
        sensor: Box<dyn Sensor>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            name: name.into(),
            guard: EchoGuard::new(cause, settings.activation_retry_ms),
            sensor,
            threshold: settings.threshold_for(cause),
            trip: settings.trip_for(cause),
            hours: settings.hours_for(cause),
            clock,
            last_value: None,
        }
    }

    pub fn guard(&self) -> &EchoGuard {
        &self.guard
    }

    pub fn last_value(&self) -> Option<f64> {
        self.last_value
    }

    /// Whether `value`, read at `at`, should raise this node's alarm.
    pub fn evaluate(&self, value: f64, at: DateTime<Utc>) -> bool {
        let in_hours = self.hours.map_or(true, |hours| hours.contains(at));
        in_hours && self.trip.breached(value, self.threshold)
    }

    fn sample(&mut self, now: Timestamp, at: DateTime<Utc>) -> Result<Vec<Outbound>> {
        let value = self.sensor.read()?;
        self.last_value = Some(value);

        let reading = serde_json::to_string(&SensorReading { sensor_value: value })?;
        let mut outbound = vec![Outbound::new(value_topic(&self.name), reading)];

        let assertion = if self.evaluate(value, at) {
            self.guard.activate(now)
        } else {
            self.guard.deactivate()
        };
        if let Some(message) = assertion {
            info!(
                "{} reading {} -> {} {}",
                self.name,
                value,
                self.guard.cause(),
                if message.get(self.guard.cause()) == Some(true) { "on" } else { "off" }
            );
            outbound.push(message.to_outbound()?);
        }
        Ok(outbound)
    }

    /// One sampling cycle at an explicit wall-clock time
    pub fn tick_at(&mut self, at: DateTime<Utc>) -> Result<Vec<Outbound>> {
        let now = self.clock.now_ms();
        self.sample(now, at)
    }
}

impl Node for SensorNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn subscriptions(&self) -> Vec<String> {
        vec![TOPIC_ALARM_STATUS.to_string(), ping_topic(&self.name)]
    }

    fn on_connect(&mut self) -> Result<Vec<Outbound>> {
        Ok(vec![AlarmSetMessage::new().to_outbound()?])
    }

    fn handle(&mut self, message: &Inbound) -> Result<Vec<Outbound>> {
        if message.topic == TOPIC_ALARM_STATUS {
            self.guard.handle_status(&message.payload)?;
            debug!("{} echo state {:?}", self.name, self.guard.state());
            Ok(Vec::new())
        } else if message.topic == ping_topic(&self.name) {
            Ok(pong(&self.name, message))
        } else {
            debug!("Ignoring message on {}", message.topic);
            Ok(Vec::new())
        }
    }

    fn tick(&mut self) -> Result<Vec<Outbound>> {
        self.tick_at(Utc::now())
    }
}

/// Build the node described by `config`.
///
/// Sensor nodes read `sensor.signal` on `bus` when configured and a
/// [`SimulatedSensor`] otherwise; the siren drives signals on `bus`.
pub fn build_node(config: &Config, bus: &SignalBus, clock: Arc<dyn Clock>) -> Result<Box<dyn Node>> {
    let name = config.node.name();
    match config.node.role.cause() {
        None => Ok(Box::new(SirenNode::on_bus(name, &config.siren, bus, clock)?)),
        Some(cause) => {
            let settings = config.sensor.as_ref().ok_or_else(|| {
                SireneError::Config(format!("role {:?} needs a sensor section", config.node.role))
            })?;
            let sensor: Box<dyn Sensor> = match &settings.signal {
                Some(signal) => Box::new(SignalSensor::new(bus.clone(), signal.clone())),
                None => {
                    if settings.simulated.step == 0.0 {
                        warn!("Simulated sensor step is 0, readings will be constant");
                    }
                    Box::new(SimulatedSensor::new(&settings.simulated)?)
                }
            };
            Ok(Box::new(SensorNode::new(name, cause, settings, sensor, clock)))
        }
    }
}
