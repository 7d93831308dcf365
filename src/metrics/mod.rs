//! Telemetry acquisition and normalization.
//!
//! This module reads host counters, CPU temperature and CPU/memory/GPU
//! utilization, and turns them into the fixed-shape [`Sample`] streamed to
//! the display once per tick.

pub mod builder;
pub mod counters;
pub mod data;
pub mod fake;
pub mod host;
pub mod temperature;
pub mod utilization;

// Re-export commonly used items
pub use builder::{SampleBuilder, Scaling};
pub use counters::CounterTracker;
pub use data::{CounterSnapshot, Sample, TemperatureReading, UtilizationSnapshot};
pub use host::{HostSource, SysinfoHost};
pub use temperature::{TemperatureProbe, TemperatureSource};
pub use utilization::{GpuCapability, UtilizationCollector};
