// src/cause.rs - Alarm causes, the siren's cause set and pattern selection
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// One of the enumerated reasons the shared alarm may be active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlarmCause {
    /// Manual test alarm
    Test,
    /// Airflow dropped below its threshold
    Airflow,
    /// Air pressure dropped below its threshold
    AirPressure,
}

impl AlarmCause {
    /// Every cause, in a fixed order
    pub const ALL: [AlarmCause; 3] = [AlarmCause::Test, AlarmCause::Airflow, AlarmCause::AirPressure];

    /// Key used for this cause in `alarm/set` and `alarm/status` payloads
    pub fn key(self) -> &'static str {
        match self {
            AlarmCause::Test => "testAlarmOn",
            AlarmCause::Airflow => "airflowAlarmOn",
            AlarmCause::AirPressure => "airPressureAlarmOn",
        }
    }

    /// Inverse of [`key`](Self::key); unknown keys yield `None`
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|cause| cause.key() == key)
    }
}

impl fmt::Display for AlarmCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AlarmCause::Test => "test",
            AlarmCause::Airflow => "airflow",
            AlarmCause::AirPressure => "air pressure",
        };
        f.write_str(name)
    }
}

/// Causes currently asserted on the siren node.
///
/// An empty set means the alarm is off.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlarmCauseSet {
    causes: BTreeSet<AlarmCause>,
}

impl AlarmCauseSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole set (not a diff). Returns whether the new set is
    /// non-empty.
    pub fn update(&mut self, causes: impl IntoIterator<Item = AlarmCause>) -> bool {
        self.causes = causes.into_iter().collect();
        !self.causes.is_empty()
    }

    /// Remove every cause
    pub fn clear(&mut self) {
        self.causes.clear();
    }

    pub fn contains(&self, cause: AlarmCause) -> bool {
        self.causes.contains(&cause)
    }

    pub fn len(&self) -> usize {
        self.causes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.causes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = AlarmCause> + '_ {
        self.causes.iter().copied()
    }
}

impl FromIterator<AlarmCause> for AlarmCauseSet {
    fn from_iter<T: IntoIterator<Item = AlarmCause>>(iter: T) -> Self {
        Self {
            causes: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for AlarmCauseSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.causes.is_empty() {
            return f.write_str("{}");
        }
        let names: Vec<String> = self.causes.iter().map(|c| c.to_string()).collect();
        write!(f, "{{{}}}", names.join(", "))
    }
}

/// Audible pattern chosen from the active cause set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BeepPattern {
    /// Exactly one cause is active
    Single(AlarmCause),
    /// Two or more causes are active
    MultipleCauses,
}

impl BeepPattern {
    /// Pattern for a cause set, `None` when the set is empty.
    ///
    /// Depends only on cardinality and membership.
    pub fn select(causes: &AlarmCauseSet) -> Option<Self> {
        let mut iter = causes.iter();
        match (iter.next(), iter.next()) {
            (None, _) => None,
            (Some(cause), None) => Some(BeepPattern::Single(cause)),
            (Some(_), Some(_)) => Some(BeepPattern::MultipleCauses),
        }
    }
}

/// Number of claxon pulses per pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeepCounts {
    #[serde(default = "default_test_beeps")]
    pub test: u32,
    #[serde(default = "default_airflow_beeps")]
    pub airflow: u32,
    #[serde(default = "default_air_pressure_beeps")]
    pub air_pressure: u32,
    #[serde(default = "default_multiple_beeps")]
    pub multiple: u32,
}

fn default_test_beeps() -> u32 { 1 }
fn default_airflow_beeps() -> u32 { 2 }
fn default_air_pressure_beeps() -> u32 { 3 }
fn default_multiple_beeps() -> u32 { 5 }

impl Default for BeepCounts {
    fn default() -> Self {
        Self {
            test: default_test_beeps(),
            airflow: default_airflow_beeps(),
            air_pressure: default_air_pressure_beeps(),
            multiple: default_multiple_beeps(),
        }
    }
}

impl BeepCounts {
    /// Pulse count for a pattern
    pub fn beeps(&self, pattern: BeepPattern) -> u32 {
        match pattern {
            BeepPattern::Single(AlarmCause::Test) => self.test,
            BeepPattern::Single(AlarmCause::Airflow) => self.airflow,
            BeepPattern::Single(AlarmCause::AirPressure) => self.air_pressure,
            BeepPattern::MultipleCauses => self.multiple,
        }
    }

    /// Largest single-cause pulse count
    pub fn max_single(&self) -> u32 {
        self.test.max(self.airflow).max(self.air_pressure)
    }
}
