//! Data structures for telemetry samples.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The record streamed to the display once per tick.
///
/// Field order and the short wire names are what the display firmware
/// expects; every field is always present.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    /// CPU utilization percentage (0 to 100)
    pub cpu: u8,
    /// CPU temperature in Celsius, 0 when no source answered
    #[serde(rename = "cput")]
    pub cpu_temp_c: i32,
    /// Memory utilization percentage (0 to 100)
    pub mem: u8,
    /// GPU utilization percentage (0 to 100)
    #[serde(rename = "gpu")]
    pub gpu_util: u8,
    /// GPU temperature in Celsius
    #[serde(rename = "gput")]
    pub gpu_temp_c: i32,
    /// GPU memory utilization percentage (0 to 100)
    #[serde(rename = "gpum")]
    pub gpu_mem_percent: u8,
    /// Upload activity on the display's scale (0 to 100)
    #[serde(rename = "netu")]
    pub net_up_percent: u8,
    /// Download activity on the display's scale (0 to 100)
    #[serde(rename = "netd")]
    pub net_down_percent: u8,
    /// Disk activity on the display's scale (0 to 100)
    #[serde(rename = "disk")]
    pub disk_percent: u8,
}

/// Cumulative host counters, monotonically non-decreasing in the normal case.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterSnapshot {
    pub bytes_received: u64,
    pub bytes_sent: u64,
    /// Read bytes plus written bytes across all disks
    pub disk_bytes_total: u64,
}

/// Per-interval throughput derived from two [`CounterSnapshot`]s.
///
/// Signed: a counter that went backwards shows up as a negative delta.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CounterDeltas {
    pub net_up_kbps: f64,
    pub net_down_kbps: f64,
    pub disk_mbps: f64,
}

/// Which temperature source produced a reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    Source(&'static str),
    Unavailable,
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provenance::Source(name) => f.write_str(name),
            Provenance::Unavailable => f.write_str("unavailable"),
        }
    }
}

/// Result of one pass through the temperature fallback chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TemperatureReading {
    pub celsius: Option<i32>,
    pub provenance: Provenance,
}

impl TemperatureReading {
    pub fn from_source(name: &'static str, celsius: i32) -> Self {
        Self {
            celsius: Some(celsius),
            provenance: Provenance::Source(name),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            celsius: None,
            provenance: Provenance::Unavailable,
        }
    }

    /// Temperature for the fixed-shape wire record; 0 when unavailable.
    pub fn celsius_or_default(&self) -> i32 {
        self.celsius.unwrap_or(0)
    }

    pub fn is_available(&self) -> bool {
        self.celsius.is_some()
    }
}

/// Instantaneous utilization figures for one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UtilizationSnapshot {
    pub cpu_percent: i32,
    pub mem_percent: i32,
    pub gpu_percent: i32,
    pub gpu_mem_percent: i32,
    pub gpu_temp_c: i32,
}

/// GPU figures read from the accelerator in one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GpuReading {
    pub utilization_percent: u32,
    pub temperature_c: u32,
    pub memory_used_bytes: u64,
    pub memory_total_bytes: u64,
}

impl GpuReading {
    /// Memory usage as a truncated percentage; 0 when the total is unknown.
    pub fn memory_percent(&self) -> i32 {
        if self.memory_total_bytes == 0 {
            return 0;
        }
        (self.memory_used_bytes as f64 / self.memory_total_bytes as f64 * 100.0) as i32
    }
}
