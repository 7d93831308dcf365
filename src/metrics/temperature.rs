//! CPU temperature sensing with an ordered fallback over sources.
//!
//! CPU temperature is the least portable metric we report: it may come from
//! a hardware-monitor web service, from the platform's thermal zones, or not
//! at all. Each source is a [`TemperatureSource`] returning a `Result`; the
//! [`TemperatureProbe`] walks them in priority order and takes the first
//! value that comes back. Every failure just moves on to the next source.

use crate::error::SensorError;
use crate::metrics::data::TemperatureReading;
use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, warn};

/// Default location of the hardware monitor's JSON sensor tree.
pub const DEFAULT_SENSOR_URL: &str = "http://localhost:8085/data.json";

/// Default timeout for the sensor service request.
pub const DEFAULT_SENSOR_TIMEOUT_MS: u64 = 100;

/// A single way of obtaining the CPU temperature.
#[async_trait]
pub trait TemperatureSource: Send + Sync {
    /// Identifier reported as the reading's provenance.
    fn name(&self) -> &'static str;

    /// Read the temperature in degrees Celsius.
    async fn read_celsius(&self) -> Result<f64, SensorError>;
}

/// Tries each source in order and reports the first success.
pub struct TemperatureProbe {
    sources: Vec<Box<dyn TemperatureSource>>,
}

impl TemperatureProbe {
    pub fn new(sources: Vec<Box<dyn TemperatureSource>>) -> Self {
        Self { sources }
    }

    /// The standard chain: sensor web service first, then the platform
    /// thermal zone.
    pub fn with_default_sources(sensor_url: &str, sensor_timeout: Duration) -> Self {
        let mut sources: Vec<Box<dyn TemperatureSource>> = Vec::with_capacity(2);

        match RemoteSensorSource::new(sensor_url, sensor_timeout) {
            Ok(remote) => sources.push(Box::new(remote)),
            Err(err) => warn!("Sensor service source disabled: {}", err),
        }
        sources.push(Box::new(ThermalZoneSource::new()));

        Self::new(sources)
    }

    /// Names of the configured sources in priority order.
    pub fn source_names(&self) -> Vec<&'static str> {
        self.sources.iter().map(|source| source.name()).collect()
    }

    /// Run the chain once. Never fails; exhausting every source yields an
    /// unavailable reading.
    pub async fn probe(&self) -> TemperatureReading {
        for source in &self.sources {
            match source.read_celsius().await {
                Ok(celsius) if celsius.is_finite() => {
                    return TemperatureReading::from_source(source.name(), celsius.trunc() as i32);
                }
                Ok(celsius) => {
                    debug!(source = source.name(), "Discarding non-finite reading {}", celsius);
                }
                Err(err) => {
                    debug!(source = source.name(), error = %err, "Temperature source failed");
                }
            }
        }

        TemperatureReading::unavailable()
    }
}

/// Node of the hardware monitor's sensor tree.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SensorNode {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub children: Vec<SensorNode>,
}

impl SensorNode {
    fn is_cpu_temperature(&self) -> bool {
        self.text
            .as_deref()
            .is_some_and(|text| text.contains("Temperature") && text.contains("CPU"))
    }
}

/// First CPU temperature node in pre-order (a node before its children,
/// children before later siblings).
pub fn find_cpu_temperature(nodes: &[SensorNode]) -> Option<&SensorNode> {
    nodes.iter().find_map(|node| {
        if node.is_cpu_temperature() {
            Some(node)
        } else {
            find_cpu_temperature(&node.children)
        }
    })
}

/// Parse a sensor value such as `"45,3 °C"` into degrees.
///
/// The unit suffix is dropped and a comma decimal separator is accepted.
pub fn parse_sensor_value(raw: &str) -> Result<f64, SensorError> {
    let numeric: String = raw
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit() || matches!(c, '-' | '+' | '.' | ','))
        .collect();

    numeric
        .replace(',', ".")
        .parse::<f64>()
        .map_err(|_| SensorError::parse_error(format!("not a temperature: {:?}", raw)))
}

/// Reads the CPU temperature from a local Open/Libre Hardware Monitor web
/// server.
pub struct RemoteSensorSource {
    client: reqwest::Client,
    url: String,
}

impl RemoteSensorSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, SensorError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .no_proxy()
            .build()?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl TemperatureSource for RemoteSensorSource {
    fn name(&self) -> &'static str {
        "sensor-service"
    }

    async fn read_celsius(&self) -> Result<f64, SensorError> {
        let body = self
            .client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let root: SensorNode =
            serde_json::from_str(&body).map_err(|e| SensorError::parse_error(e.to_string()))?;

        let node = find_cpu_temperature(&root.children)
            .ok_or_else(|| SensorError::unavailable("no CPU temperature node in sensor tree"))?;

        // Only the first match is considered; a bad value there ends the search.
        let value = node
            .children
            .first()
            .and_then(|child| child.value.as_deref())
            .ok_or_else(|| SensorError::parse_error("CPU temperature node has no value"))?;

        parse_sensor_value(value)
    }
}

/// A raw thermal-zone reading in the unit the platform reports it in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawThermal {
    /// Tenths of a kelvin (ACPI via WMI)
    DeciKelvin(i64),
    /// Thousandths of a degree Celsius (Linux sysfs)
    MilliCelsius(i64),
}

impl RawThermal {
    pub fn to_celsius(self) -> f64 {
        match self {
            RawThermal::DeciKelvin(raw) => raw as f64 / 10.0 - 273.15,
            RawThermal::MilliCelsius(raw) => raw as f64 / 1000.0,
        }
    }
}

/// Reads the first available platform thermal zone.
///
/// On Windows this is ACPI through WMI and needs an elevated process; on
/// Linux it is `/sys/class/thermal`.
pub struct ThermalZoneSource {
    #[cfg_attr(not(target_os = "linux"), allow(dead_code))]
    sysfs_root: PathBuf,
}

impl ThermalZoneSource {
    pub fn new() -> Self {
        Self::with_sysfs_root("/sys/class/thermal")
    }

    /// Use a different directory in place of `/sys/class/thermal`.
    pub fn with_sysfs_root(root: impl Into<PathBuf>) -> Self {
        Self {
            sysfs_root: root.into(),
        }
    }

    #[cfg(target_os = "linux")]
    fn read_first_zone(&self) -> Result<RawThermal, SensorError> {
        let entries = std::fs::read_dir(&self.sysfs_root)
            .map_err(|e| SensorError::unavailable(format!("{}: {}", self.sysfs_root.display(), e)))?;

        let mut zones: Vec<(u32, PathBuf)> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let name = entry.file_name();
                let index = name.to_str()?.strip_prefix("thermal_zone")?.parse().ok()?;
                Some((index, entry.path().join("temp")))
            })
            .collect();
        zones.sort_by_key(|(index, _)| *index);

        zones
            .iter()
            .find_map(|(_, path)| std::fs::read_to_string(path).ok()?.trim().parse().ok())
            .map(RawThermal::MilliCelsius)
            .ok_or_else(|| SensorError::unavailable("no readable thermal zone"))
    }

    #[cfg(windows)]
    fn read_first_zone(&self) -> Result<RawThermal, SensorError> {
        use wmi::{COMLibrary, WMIConnection};

        #[derive(Deserialize)]
        #[serde(rename = "MSAcpi_ThermalZoneTemperature")]
        #[serde(rename_all = "PascalCase")]
        struct ThermalZone {
            current_temperature: u32,
        }

        let com = COMLibrary::new().map_err(|e| SensorError::unavailable(e.to_string()))?;
        let connection = WMIConnection::with_namespace_path("root\\WMI", com)
            .map_err(|e| SensorError::unavailable(e.to_string()))?;
        let zones: Vec<ThermalZone> = connection
            .query()
            .map_err(|e| SensorError::unavailable(e.to_string()))?;

        zones
            .first()
            .map(|zone| RawThermal::DeciKelvin(i64::from(zone.current_temperature)))
            .ok_or_else(|| SensorError::unavailable("no thermal zones reported"))
    }

    #[cfg(not(any(target_os = "linux", windows)))]
    fn read_first_zone(&self) -> Result<RawThermal, SensorError> {
        Err(SensorError::unavailable(
            "thermal zones not supported on this platform",
        ))
    }
}

impl Default for ThermalZoneSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TemperatureSource for ThermalZoneSource {
    fn name(&self) -> &'static str {
        "thermal-zone"
    }

    async fn read_celsius(&self) -> Result<f64, SensorError> {
        self.read_first_zone().map(RawThermal::to_celsius)
    }
}
