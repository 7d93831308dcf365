//! Serial link and sampling configuration.

use crate::error::{MonitorError, Result};
use crate::metrics::temperature::{DEFAULT_SENSOR_TIMEOUT_MS, DEFAULT_SENSOR_URL};
use crate::metrics::Scaling;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Serial device the display is usually attached to.
#[cfg(windows)]
pub const DEFAULT_SERIAL_PORT: &str = "COM7";
#[cfg(not(windows))]
pub const DEFAULT_SERIAL_PORT: &str = "/dev/ttyUSB0";

/// Configuration for the telemetry link. Fixed for the life of the process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkConfig {
    /// Serial port identifier (e.g. "COM7", "/dev/ttyACM0")
    pub port: String,
    /// Serial baud rate
    pub baud: u32,
    /// Time between samples in milliseconds
    pub interval_ms: u64,
    /// Serial write timeout in milliseconds
    pub write_timeout_ms: u64,
    /// URL of the hardware monitor's JSON sensor tree
    pub sensor_url: String,
    /// Timeout for the sensor service request in milliseconds
    pub sensor_timeout_ms: u64,
    /// Throughput-to-percent scaling
    pub scaling: Scaling,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_SERIAL_PORT.to_string(),
            baud: crate::DEFAULT_BAUD_RATE,
            interval_ms: crate::DEFAULT_INTERVAL_MS,
            write_timeout_ms: 1000,
            sensor_url: DEFAULT_SENSOR_URL.to_string(),
            sensor_timeout_ms: DEFAULT_SENSOR_TIMEOUT_MS,
            scaling: Scaling::default(),
        }
    }
}

impl LinkConfig {
    /// Create a new link configuration for a port and baud rate.
    pub fn new(port: impl Into<String>, baud: u32) -> Self {
        Self {
            port: port.into(),
            baud,
            ..Default::default()
        }
    }

    /// Set the serial port.
    pub fn with_port(mut self, port: impl Into<String>) -> Self {
        self.port = port.into();
        self
    }

    /// Set the baud rate.
    pub fn with_baud(mut self, baud: u32) -> Self {
        self.baud = baud;
        self
    }

    /// Set the sampling interval.
    pub fn with_interval_ms(mut self, interval_ms: u64) -> Self {
        self.interval_ms = interval_ms;
        self
    }

    /// Set the sensor service URL.
    pub fn with_sensor_url(mut self, url: impl Into<String>) -> Self {
        self.sensor_url = url.into();
        self
    }

    /// Set the sensor service timeout.
    pub fn with_sensor_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.sensor_timeout_ms = timeout_ms;
        self
    }

    /// Set the throughput scaling.
    pub fn with_scaling(mut self, scaling: Scaling) -> Self {
        self.scaling = scaling;
        self
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn sensor_timeout(&self) -> Duration {
        Duration::from_millis(self.sensor_timeout_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    /// Reject values the loop cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.port.trim().is_empty() {
            return Err(MonitorError::config_error("serial port must not be empty"));
        }
        if self.baud == 0 {
            return Err(MonitorError::config_error("baud rate must be positive"));
        }
        if self.interval_ms == 0 {
            return Err(MonitorError::config_error("interval must be positive"));
        }

        let scaling = &self.scaling;
        for (name, value) in [
            ("net-up scale", scaling.net_up_kbps_per_percent),
            ("net-down scale", scaling.net_down_kbps_per_percent),
            ("disk scale", scaling.disk_percent_per_mbps),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(MonitorError::config_error(format!(
                    "{} must be a positive number, got {}",
                    name, value
                )));
            }
        }

        Ok(())
    }
}
