// src/protocol.rs - Topics and JSON payloads of the shared alarm bus
//
// alarm/set     sensor -> siren   {"airflowAlarmOn": true}
// alarm/status  siren  -> all     {"alarmOn": .., "airflowAlarmOn": .., "airPressureAlarmOn": .., "testAlarmOn": ..}
// <node>/value  sensor -> any     {"sensorValue": 12.5}
// <node>/ping   any    -> node    (opaque), answered on <node>/pong

use crate::{
    cause::{AlarmCause, AlarmCauseSet},
    error::{Result, SireneError},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Inbound assertions from sensor nodes
pub const TOPIC_ALARM_SET: &str = "alarm/set";

/// Combined alarm state published by the siren node
pub const TOPIC_ALARM_STATUS: &str = "alarm/status";

/// Liveness request topic for a node prefix
pub fn ping_topic(prefix: &str) -> String {
    format!("{}/ping", prefix)
}

/// Liveness answer topic for a node prefix
pub fn pong_topic(prefix: &str) -> String {
    format!("{}/pong", prefix)
}

/// Telemetry topic for a node prefix
pub fn value_topic(prefix: &str) -> String {
    format!("{}/value", prefix)
}

/// Message received from the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inbound {
    pub topic: String,
    pub payload: Vec<u8>,
}

impl Inbound {
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

/// Message a node wants published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outbound {
    pub topic: String,
    pub payload: String,
}

impl Outbound {
    pub fn new(topic: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

/// Combined alarm state, payload of `alarm/status`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlarmStatus {
    pub alarm_on: bool,
    pub airflow_alarm_on: bool,
    pub air_pressure_alarm_on: bool,
    pub test_alarm_on: bool,
}

impl AlarmStatus {
    pub fn from_causes(causes: &AlarmCauseSet) -> Self {
        Self {
            alarm_on: !causes.is_empty(),
            airflow_alarm_on: causes.contains(AlarmCause::Airflow),
            air_pressure_alarm_on: causes.contains(AlarmCause::AirPressure),
            test_alarm_on: causes.contains(AlarmCause::Test),
        }
    }

    /// Flag reported for one cause
    pub fn cause(&self, cause: AlarmCause) -> bool {
        match cause {
            AlarmCause::Test => self.test_alarm_on,
            AlarmCause::Airflow => self.airflow_alarm_on,
            AlarmCause::AirPressure => self.air_pressure_alarm_on,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_outbound(&self) -> Result<Outbound> {
        Ok(Outbound::new(TOPIC_ALARM_STATUS, self.to_json()?))
    }
}

/// Per-cause assertions carried by an `alarm/set` message.
///
/// Keys present in the message are authoritative; absent keys leave the
/// cause's membership unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlarmSetMessage {
    assertions: BTreeMap<AlarmCause, bool>,
}

impl AlarmSetMessage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Message asserting (`on = true`) or de-asserting a single cause
    pub fn single(cause: AlarmCause, on: bool) -> Self {
        Self::new().with(cause, on)
    }

    pub fn with(mut self, cause: AlarmCause, on: bool) -> Self {
        self.assertions.insert(cause, on);
        self
    }

    pub fn get(&self, cause: AlarmCause) -> Option<bool> {
        self.assertions.get(&cause).copied()
    }

    /// Empty messages are status requests
    pub fn is_empty(&self) -> bool {
        self.assertions.is_empty()
    }

    /// Cause set after applying this message to `current`
    pub fn apply_to(&self, current: &AlarmCauseSet) -> AlarmCauseSet {
        AlarmCause::ALL
            .into_iter()
            .filter(|cause| self.get(*cause).unwrap_or_else(|| current.contains(*cause)))
            .collect()
    }

    pub fn to_json(&self) -> Result<String> {
        let map: serde_json::Map<String, serde_json::Value> = self
            .assertions
            .iter()
            .map(|(cause, on)| (cause.key().to_string(), serde_json::Value::Bool(*on)))
            .collect();
        Ok(serde_json::to_string(&map)?)
    }

    pub fn to_outbound(&self) -> Result<Outbound> {
        Ok(Outbound::new(TOPIC_ALARM_SET, self.to_json()?))
    }
}

/// Sensor telemetry, payload of `<node>/value`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorReading {
    pub sensor_value: f64,
}

fn parse_object(payload: &[u8]) -> Result<serde_json::Map<String, serde_json::Value>> {
    match serde_json::from_slice::<serde_json::Value>(payload)? {
        serde_json::Value::Object(map) => Ok(map),
        other => Err(SireneError::Codec(format!("expected a JSON object, got {}", other))),
    }
}

/// Decode an `alarm/set` payload.
///
/// An empty payload is a status request and decodes to an empty message.
/// Unknown keys and non-boolean values are skipped; the remaining keys are
/// still applied.
pub fn decode_set(payload: &[u8]) -> Result<AlarmSetMessage> {
    if payload.iter().all(u8::is_ascii_whitespace) {
        return Ok(AlarmSetMessage::new());
    }
    let mut message = AlarmSetMessage::new();
    for (key, value) in parse_object(payload)? {
        match (AlarmCause::from_key(&key), value.as_bool()) {
            (Some(cause), Some(on)) => {
                message.assertions.insert(cause, on);
            }
            (Some(_), None) => warn!("Ignoring non-boolean value {} for '{}'", value, key),
            (None, _) => debug!("Ignoring unknown alarm key '{}'", key),
        }
    }
    Ok(message)
}

/// Decode a complete `alarm/status` payload.
pub fn decode_status(payload: &[u8]) -> Result<AlarmStatus> {
    Ok(serde_json::from_slice(payload)?)
}

/// Read one cause's flag from an `alarm/status` payload.
///
/// Only the cause's own key has to be present and boolean.
pub fn decode_status_flag(payload: &[u8], cause: AlarmCause) -> Result<bool> {
    let map = parse_object(payload)?;
    match map.get(cause.key()) {
        Some(serde_json::Value::Bool(on)) => Ok(*on),
        Some(other) => Err(SireneError::Codec(format!(
            "'{}' is not a boolean: {}",
            cause.key(),
            other
        ))),
        None => Err(SireneError::Codec(format!("missing key '{}'", cause.key()))),
    }
}
