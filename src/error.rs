//! Error handling for the pcmon telemetry streamer.
//!
//! Two families live here. [`SensorError`] covers everything that can go
//! wrong while reading a single metric source; those errors are always
//! recovered inside the tick. [`MonitorError`] covers the transport and
//! configuration failures that are allowed to end the loop.

/// A specialized `Result` type for pcmon operations.
pub type Result<T> = std::result::Result<T, MonitorError>;

/// Errors that terminate the streaming loop or prevent it from starting.
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serial port open or write failed
    #[error("Transport error: {0}")]
    Transport(String),

    /// A sample could not be serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl MonitorError {
    /// Create a new transport error
    pub fn transport_error(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create a new configuration error
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

/// Failure of a single metric source. Never escapes a tick.
#[derive(Debug, thiserror::Error)]
pub enum SensorError {
    /// Source is absent, denied, or timed out
    #[error("source unavailable: {0}")]
    Unavailable(String),

    /// Source answered with a payload we could not interpret
    #[error("malformed sensor payload: {0}")]
    Parse(String),

    /// HTTP request to a sensor service failed
    #[error("sensor request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Accelerator management API could not be brought up
    #[error("accelerator initialization failed: {0}")]
    Initialization(String),
}

impl SensorError {
    /// Create a new unavailable-source error
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    /// Create a new parse error
    pub fn parse_error(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    /// Create a new initialization error
    pub fn initialization_error(msg: impl Into<String>) -> Self {
        Self::Initialization(msg.into())
    }
}
