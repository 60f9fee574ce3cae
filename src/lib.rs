//! SIRENE - Shared alarm for cooperating sensor and siren nodes
//!
//! Sensor nodes (airflow, air pressure) each decide whether their own reading
//! breaches a threshold and assert their cause on `alarm/set`. The siren node
//! combines every asserted cause into one physical alarm, a steady light plus
//! a claxon beep pattern that tells causes apart by ear, and republishes the
//! combined state on `alarm/status` so sensor nodes never re-announce what
//! they already caused.
//!
//! # Examples
//!
//! ```rust
//! use sirene::{AlarmCause, AlarmCauseSet, BeepPattern};
//!
//! let causes: AlarmCauseSet = [AlarmCause::Airflow, AlarmCause::AirPressure]
//!     .into_iter()
//!     .collect();
//! assert_eq!(BeepPattern::select(&causes), Some(BeepPattern::MultipleCauses));
//! ```

// ============================================================================
// CORE MODULES
// ============================================================================

/// Error type shared by every module
pub mod error;

/// Values carried on the signal bus
pub mod value;

/// Named I/O lines shared between the node and its hardware adapters
pub mod signal;

/// Injectable millisecond clock
pub mod clock;

/// Digital input and output capabilities
pub mod io;

// ============================================================================
// ALARM LOGIC
// ============================================================================

/// Alarm causes, cause sets and pattern selection
pub mod cause;

/// Claxon beep pattern generator
pub mod pattern;

/// Arbitration of the cause set into light and claxon activity
pub mod arbiter;

/// Echo suppression for sensor nodes
pub mod guard;

// ============================================================================
// NODES AND TRANSPORT
// ============================================================================

/// Bus topics and JSON payloads
pub mod protocol;

/// Siren and sensor nodes
pub mod node;

/// YAML configuration
pub mod config;

/// Control loop
pub mod runtime;

#[cfg(feature = "mqtt")]
/// MQTT transport
pub mod mqtt;

// ============================================================================
// PUBLIC API RE-EXPORTS
// ============================================================================

pub use arbiter::{ArbitrationEngine, EscalationPhase, EscalationPolicy, EscalationState};
pub use cause::{AlarmCause, AlarmCauseSet, BeepCounts, BeepPattern};
pub use clock::{Clock, ManualClock, MonotonicClock, Timestamp};
pub use config::{Config, NodeRole};
pub use error::{Result, SireneError};
pub use guard::{EchoGuard, EchoGuardState};
pub use io::{AlarmOutputs, DigitalInput, DigitalOutput, SignalInput, SignalOutput};
pub use node::{build_node, Node, Sensor, SensorNode, SignalSensor, SimulatedSensor, SirenNode};
pub use pattern::{BeepPatternGenerator, PatternProgress, PatternState, PatternTimings, Phase};
pub use protocol::{AlarmSetMessage, AlarmStatus, Inbound, Outbound};
pub use runtime::{Publisher, Runtime, RuntimeStats, TransportEvent};
pub use signal::SignalBus;
pub use value::Value;

#[cfg(feature = "mqtt")]
pub use mqtt::MqttTransport;

// ============================================================================
// VERSION INFORMATION
// ============================================================================

/// SIRENE version string
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build information
pub mod build_info {
    /// Git commit hash (if available)
    pub const GIT_HASH: Option<&str> = option_env!("SIRENE_GIT_HASH");

    /// Build timestamp
    pub const BUILD_TIMESTAMP: &str = env!("SIRENE_BUILD_TIMESTAMP");

    /// Rust version used for compilation
    pub const RUSTC_VERSION: &str = env!("SIRENE_RUST_VERSION");

    /// Target triple
    pub const TARGET: &str = env!("SIRENE_TARGET");

    /// Build profile (debug/release)
    pub const PROFILE: &str = env!("SIRENE_PROFILE");
}

// ============================================================================
// INITIALIZATION
// ============================================================================

/// Install the tracing subscriber.
///
/// `RUST_LOG` wins when set; otherwise logs at `sirene=info`. Calling it
/// twice is harmless.
pub fn init() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("sirene=info"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .try_init();
}

/// One-line description of the running build
pub fn build_summary() -> String {
    format!(
        "sirene {} ({}, {} {}, built {})",
        VERSION,
        build_info::GIT_HASH.unwrap_or("unknown revision"),
        build_info::TARGET,
        build_info::PROFILE,
        build_info::BUILD_TIMESTAMP
    )
}
