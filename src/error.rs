use thiserror::Error;

/// Application level error type used throughout the crate.
///
/// None of these are fatal to a running node: the control loop logs them,
/// counts them and keeps ticking.
#[derive(Error, Debug)]
pub enum SireneError {
    /// I/O related failure
    #[error("Io error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or inconsistent configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Error while parsing YAML configuration files
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Payload is not valid JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Payload is valid JSON but not the shape a topic expects
    #[error("Malformed payload: {0}")]
    Codec(String),

    /// Requested signal was not found in the bus
    #[error("Signal not found: {0}")]
    SignalNotFound(String),

    /// Returned value type does not match the expected type
    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        expected: &'static str,
        actual: &'static str,
    },

    /// Message bus failure (publish queue full, client gone)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Sensor acquisition failure
    #[error("Sensor error: {0}")]
    Sensor(String),
}

/// Convenient alias over [`Result`] using [`SireneError`]
pub type Result<T> = std::result::Result<T, SireneError>;
