//! # pcmon - Host Telemetry for Serial Displays
//!
//! Polls host telemetry (CPU and GPU utilization and temperature, memory,
//! network and disk throughput) at a fixed cadence and streams each sample
//! as one line of JSON over a serial link to a small display.
//!
//! ## Features
//!
//! - **Graceful degradation**: a missing sensor zeroes its field, never the tick
//! - **CPU temperature fallback**: hardware-monitor web service, then platform thermal zones
//! - **GPU telemetry**: NVML, decided once at startup (feature-gated)
//! - **Display-friendly scales**: throughput normalized to 0-100
//! - **Library + Binary**: Use as a crate or standalone application
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pcmon::{link, GpuCapability, LinkConfig, SampleBuilder, SysinfoHost, TemperatureProbe,
//!     UtilizationCollector};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = LinkConfig::default();
//!     let builder = SampleBuilder::new(
//!         SysinfoHost::new(),
//!         TemperatureProbe::with_default_sources(&config.sensor_url, config.sensor_timeout()),
//!         UtilizationCollector::new(GpuCapability::detect()),
//!         config.scaling,
//!     );
//!
//!     let mut emitter = link::open_serial(&config)?;
//!     let samples = builder.into_stream(config.interval());
//!     link::run(samples, &mut emitter, link::shutdown_signal()?).await?;
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod link;
pub mod metrics;

// Re-export public API
pub use error::{MonitorError, Result, SensorError};
pub use link::{Emitter, LineEmitter, LinkConfig};
pub use metrics::{
    builder::{SampleBuilder, Scaling},
    counters::CounterTracker,
    data::{CounterSnapshot, Sample, TemperatureReading, UtilizationSnapshot},
    host::{HostSource, SysinfoHost},
    temperature::{TemperatureProbe, TemperatureSource},
    utilization::{GpuCapability, UtilizationCollector},
};

/// The default sampling interval in milliseconds
pub const DEFAULT_INTERVAL_MS: u64 = 1000;

/// The default serial baud rate
pub const DEFAULT_BAUD_RATE: u32 = 115_200;
