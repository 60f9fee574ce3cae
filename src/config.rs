// src/config.rs - Node configuration loaded from YAML

use crate::{
    arbiter::EscalationPolicy,
    cause::{AlarmCause, BeepCounts},
    error::{Result, SireneError},
    node::{OperatingHours, TripRule},
    pattern::PatternTimings,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

// ============================================================================
// MAIN CONFIGURATION
// ============================================================================

/// Main SIRENE configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Which node this process runs
    pub node: NodeConfig,

    /// Control-loop period in milliseconds
    #[serde(default = "default_scan_time")]
    pub scan_time_ms: u64,

    /// Broker connection
    pub mqtt: MqttConfig,

    /// Siren settings, ignored by sensor nodes
    #[serde(default)]
    pub siren: SirenConfig,

    /// Sensor settings, required by sensor nodes
    #[serde(default)]
    pub sensor: Option<SensorConfig>,
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.scan_time_ms == 0 {
            return Err(SireneError::Config("scan_time_ms must be greater than 0".into()));
        }
        if self.mqtt.client_id.trim().is_empty() {
            return Err(SireneError::Config("mqtt.client_id must not be empty".into()));
        }
        if self.mqtt.qos > 2 {
            return Err(SireneError::Config(format!("mqtt.qos {} is not 0, 1 or 2", self.mqtt.qos)));
        }

        let patterns = &self.siren.patterns;
        if [patterns.test, patterns.airflow, patterns.air_pressure, patterns.multiple].contains(&0) {
            return Err(SireneError::Config("beep counts must be at least 1".into()));
        }
        if patterns.multiple <= patterns.max_single() {
            return Err(SireneError::Config(format!(
                "multiple-causes pattern ({} beeps) must be longer than every single-cause pattern ({})",
                patterns.multiple,
                patterns.max_single()
            )));
        }
        let escalation = &self.siren.escalation;
        if escalation.repeat_count == 0 {
            return Err(SireneError::Config("escalation.repeat_count must be at least 1".into()));
        }
        if escalation.immediate_window_ms >= escalation.repeat_after_ms {
            return Err(SireneError::Config(format!(
                "escalation.immediate_window_ms ({}) must be shorter than repeat_after_ms ({})",
                escalation.immediate_window_ms, escalation.repeat_after_ms
            )));
        }

        if self.node.role.cause().is_some() {
            let sensor = self.sensor.as_ref().ok_or_else(|| {
                SireneError::Config(format!("role {} requires a sensor section", self.node.role))
            })?;
            if let Some(hours) = sensor.operating_hours {
                if hours.start_hour > 24 || hours.end_hour > 24 || hours.start_hour >= hours.end_hour {
                    return Err(SireneError::Config(format!(
                        "operating hours {}..{} are not a valid range within 0..=24",
                        hours.start_hour, hours.end_hour
                    )));
                }
            }
            sensor.simulated.check_bounds()?;
        }
        Ok(())
    }
}

// ============================================================================
// NODE IDENTITY
// ============================================================================

/// Role a process plays on the alarm bus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeRole {
    Siren,
    Airflow,
    AirPressure,
}

impl NodeRole {
    /// Cause asserted by a sensor role, `None` for the siren
    pub fn cause(self) -> Option<AlarmCause> {
        match self {
            NodeRole::Siren => None,
            NodeRole::Airflow => Some(AlarmCause::Airflow),
            NodeRole::AirPressure => Some(AlarmCause::AirPressure),
        }
    }

    /// Topic prefix used when no name is configured
    pub fn default_name(self) -> &'static str {
        match self {
            NodeRole::Siren => "alarm",
            NodeRole::Airflow => "airflow",
            NodeRole::AirPressure => "airPressure",
        }
    }
}

impl std::fmt::Display for NodeRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeRole::Siren => write!(f, "siren"),
            NodeRole::Airflow => write!(f, "airflow"),
            NodeRole::AirPressure => write!(f, "air_pressure"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    pub role: NodeRole,

    /// Topic prefix for ping/pong and telemetry
    #[serde(default)]
    pub name: Option<String>,
}

impl NodeConfig {
    pub fn name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| self.role.default_name().to_string())
    }
}

// ============================================================================
// MQTT CONFIGURATION
// ============================================================================

/// MQTT broker connection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MqttConfig {
    #[serde(default = "default_mqtt_host")]
    pub broker_host: String,

    #[serde(default = "default_mqtt_port")]
    pub broker_port: u16,

    pub client_id: String,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    /// Keep alive in seconds
    #[serde(default = "default_mqtt_keepalive")]
    pub keep_alive_secs: u64,

    /// QoS level for subscriptions and publishes (0, 1 or 2)
    #[serde(default = "default_mqtt_qos")]
    pub qos: u8,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            broker_host: default_mqtt_host(),
            broker_port: default_mqtt_port(),
            client_id: "sirene".to_string(),
            username: None,
            password: None,
            keep_alive_secs: default_mqtt_keepalive(),
            qos: default_mqtt_qos(),
        }
    }
}

// ============================================================================
// SIREN CONFIGURATION
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SirenConfig {
    #[serde(default)]
    pub timings: PatternTimings,

    /// Beeps per pattern
    #[serde(default)]
    pub patterns: BeepCounts,

    #[serde(default)]
    pub escalation: EscalationPolicy,

    /// Periodic `alarm/status` republish, 0 disables
    #[serde(default = "default_status_interval")]
    pub status_interval_ms: u64,

    #[serde(default = "default_light_signal")]
    pub light_signal: String,

    #[serde(default = "default_claxon_signal")]
    pub claxon_signal: String,

    #[serde(default = "default_button_signal")]
    pub button_signal: String,
}

impl Default for SirenConfig {
    fn default() -> Self {
        Self {
            timings: PatternTimings::default(),
            patterns: BeepCounts::default(),
            escalation: EscalationPolicy::default(),
            status_interval_ms: default_status_interval(),
            light_signal: default_light_signal(),
            claxon_signal: default_claxon_signal(),
            button_signal: default_button_signal(),
        }
    }
}

// ============================================================================
// SENSOR CONFIGURATION
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorConfig {
    /// Trip threshold in raw sensor units; defaults per cause
    #[serde(default)]
    pub threshold: Option<f64>,

    #[serde(default)]
    pub trip: Option<TripRule>,

    /// UTC hours in which the alarm may be raised; defaults per cause
    #[serde(default)]
    pub operating_hours: Option<OperatingHours>,

    /// Minimum time before an unconfirmed activation is published again
    #[serde(default = "default_activation_retry")]
    pub activation_retry_ms: u64,

    /// Float signal carrying raw readings; a simulated sensor is used when unset
    #[serde(default)]
    pub signal: Option<String>,

    #[serde(default)]
    pub simulated: SimulatedConfig,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            threshold: None,
            trip: None,
            operating_hours: None,
            activation_retry_ms: default_activation_retry(),
            signal: None,
            simulated: SimulatedConfig::default(),
        }
    }
}

impl SensorConfig {
    pub fn threshold_for(&self, cause: AlarmCause) -> f64 {
        self.threshold.unwrap_or(match cause {
            AlarmCause::Airflow => 300.0,
            AlarmCause::AirPressure => 2.0,
            AlarmCause::Test => 0.0,
        })
    }

    pub fn trip_for(&self, cause: AlarmCause) -> TripRule {
        self.trip.unwrap_or(match cause {
            AlarmCause::Airflow => TripRule::AtOrBelow,
            _ => TripRule::Below,
        })
    }

    /// Airflow only alarms while the extraction system runs (07:00-17:00 UTC)
    pub fn hours_for(&self, cause: AlarmCause) -> Option<OperatingHours> {
        match (self.operating_hours, cause) {
            (Some(hours), _) => Some(hours),
            (None, AlarmCause::Airflow) => Some(OperatingHours::new(7, 17)),
            (None, _) => None,
        }
    }
}

/// Random-walk parameters for the simulated sensor
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimulatedConfig {
    #[serde(default = "default_sim_initial")]
    pub initial: f64,

    /// Largest change between two readings
    #[serde(default = "default_sim_step")]
    pub step: f64,

    #[serde(default)]
    pub min: f64,

    #[serde(default = "default_sim_max")]
    pub max: f64,
}

impl SimulatedConfig {
    /// Reject bounds the random walk cannot stay within.
    pub fn check_bounds(&self) -> Result<()> {
        let ordered = !self.min.is_nan() && !self.max.is_nan() && self.min <= self.max;
        if !ordered || !self.initial.is_finite() || !self.step.is_finite() {
            return Err(SireneError::Config(format!(
                "sensor.simulated range {}..{} (initial {}, step {}) is not usable",
                self.min, self.max, self.initial, self.step
            )));
        }
        Ok(())
    }
}

impl Default for SimulatedConfig {
    fn default() -> Self {
        Self {
            initial: default_sim_initial(),
            step: default_sim_step(),
            min: 0.0,
            max: default_sim_max(),
        }
    }
}

// ============================================================================
// DEFAULT VALUE FUNCTIONS
// ============================================================================

fn default_scan_time() -> u64 { 50 }
fn default_mqtt_host() -> String { "localhost".to_string() }
fn default_mqtt_port() -> u16 { 1883 }
fn default_mqtt_keepalive() -> u64 { 60 }
fn default_mqtt_qos() -> u8 { 1 }
fn default_status_interval() -> u64 { 60_000 }
fn default_light_signal() -> String { "alarm.light".to_string() }
fn default_claxon_signal() -> String { "alarm.claxon".to_string() }
fn default_button_signal() -> String { "alarm.button".to_string() }
fn default_activation_retry() -> u64 { 30_000 }
fn default_sim_initial() -> f64 { 512.0 }
fn default_sim_step() -> f64 { 40.0 }
fn default_sim_max() -> f64 { 1023.0 }
