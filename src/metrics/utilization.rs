//! CPU, memory and GPU utilization.

use crate::error::SensorError;
use crate::metrics::data::{GpuReading, UtilizationSnapshot};
use crate::metrics::host::HostSource;
use tracing::{debug, info, warn};

/// Index of the GPU we report on.
pub const GPU_DEVICE_INDEX: u32 = 0;

/// Per-tick access to an initialized accelerator.
pub trait Accelerator: Send + Sync {
    /// Human-readable device name.
    fn device_name(&self) -> &str;

    /// Read utilization, temperature and memory for this tick.
    fn read(&self) -> Result<GpuReading, SensorError>;
}

/// Whether GPU telemetry is available for this process.
///
/// Decided once at startup and never revisited: a failed initialization
/// keeps GPU fields at zero for the rest of the run.
pub enum GpuCapability {
    Available(Box<dyn Accelerator>),
    Unavailable,
}

impl GpuCapability {
    /// Run `init` once and record the outcome.
    pub fn initialize<F>(init: F) -> Self
    where
        F: FnOnce() -> Result<Box<dyn Accelerator>, SensorError>,
    {
        match init() {
            Ok(accelerator) => {
                info!("GPU telemetry enabled for {}", accelerator.device_name());
                GpuCapability::Available(accelerator)
            }
            Err(err) => {
                warn!("GPU telemetry disabled: {}", err);
                GpuCapability::Unavailable
            }
        }
    }

    /// Bring up the platform accelerator API for [`GPU_DEVICE_INDEX`].
    pub fn detect() -> Self {
        #[cfg(feature = "nvml")]
        let init = || {
            nvml::NvmlAccelerator::init(GPU_DEVICE_INDEX)
                .map(|accelerator| Box::new(accelerator) as Box<dyn Accelerator>)
        };

        #[cfg(not(feature = "nvml"))]
        let init = || Err(SensorError::initialization_error("built without the nvml feature"));

        Self::initialize(init)
    }

    pub fn is_available(&self) -> bool {
        matches!(self, GpuCapability::Available(_))
    }

    pub fn device_name(&self) -> Option<&str> {
        match self {
            GpuCapability::Available(accelerator) => Some(accelerator.device_name()),
            GpuCapability::Unavailable => None,
        }
    }

    /// Read this tick's figures. A failed read only affects this tick.
    pub fn read(&self) -> Option<GpuReading> {
        match self {
            GpuCapability::Available(accelerator) => match accelerator.read() {
                Ok(reading) => Some(reading),
                Err(err) => {
                    debug!(error = %err, "GPU read failed");
                    None
                }
            },
            GpuCapability::Unavailable => None,
        }
    }
}

/// Reads instantaneous utilization from the host and the GPU.
pub struct UtilizationCollector {
    gpu: GpuCapability,
}

impl UtilizationCollector {
    pub fn new(gpu: GpuCapability) -> Self {
        Self { gpu }
    }

    pub fn gpu(&self) -> &GpuCapability {
        &self.gpu
    }

    /// Read one snapshot. Values are truncated; GPU fields stay 0 when the
    /// GPU is unavailable or its read fails.
    pub fn read(&self, host: &impl HostSource) -> UtilizationSnapshot {
        let mut snapshot = UtilizationSnapshot {
            cpu_percent: host.cpu_percent() as i32,
            mem_percent: host.memory_percent() as i32,
            ..Default::default()
        };

        if let Some(gpu) = self.gpu.read() {
            snapshot.gpu_percent = i32::try_from(gpu.utilization_percent).unwrap_or(i32::MAX);
            snapshot.gpu_temp_c = i32::try_from(gpu.temperature_c).unwrap_or(i32::MAX);
            snapshot.gpu_mem_percent = gpu.memory_percent();
        }

        snapshot
    }
}

#[cfg(feature = "nvml")]
mod nvml {
    use super::Accelerator;
    use crate::error::SensorError;
    use crate::metrics::data::GpuReading;
    use nvml_wrapper::enum_wrappers::device::TemperatureSensor;
    use nvml_wrapper::Nvml;

    /// NVIDIA GPU through NVML. Dropping it shuts NVML down.
    pub struct NvmlAccelerator {
        nvml: Nvml,
        index: u32,
        device_name: String,
    }

    impl NvmlAccelerator {
        pub fn init(index: u32) -> Result<Self, SensorError> {
            let nvml = Nvml::init().map_err(|e| SensorError::initialization_error(e.to_string()))?;

            let device_name = {
                let device = nvml
                    .device_by_index(index)
                    .map_err(|e| SensorError::initialization_error(e.to_string()))?;
                device.name().unwrap_or_else(|_| format!("GPU {}", index))
            };

            Ok(Self {
                nvml,
                index,
                device_name,
            })
        }
    }

    impl Accelerator for NvmlAccelerator {
        fn device_name(&self) -> &str {
            &self.device_name
        }

        fn read(&self) -> Result<GpuReading, SensorError> {
            let unavailable = |e: nvml_wrapper::error::NvmlError| SensorError::unavailable(e.to_string());

            let device = self.nvml.device_by_index(self.index).map_err(unavailable)?;
            let utilization = device.utilization_rates().map_err(unavailable)?;
            let temperature = device.temperature(TemperatureSensor::Gpu).map_err(unavailable)?;
            let memory = device.memory_info().map_err(unavailable)?;

            Ok(GpuReading {
                utilization_percent: utilization.gpu,
                temperature_c: temperature,
                memory_used_bytes: memory.used,
                memory_total_bytes: memory.total,
            })
        }
    }

    impl Drop for NvmlAccelerator {
        fn drop(&mut self) {
            tracing::debug!("Releasing NVML session for {}", self.device_name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::fake::{FakeHost, ScriptedAccelerator};

    fn reading(util: u32, temp: u32, used: u64, total: u64) -> GpuReading {
        GpuReading {
            utilization_percent: util,
            temperature_c: temp,
            memory_used_bytes: used,
            memory_total_bytes: total,
        }
    }

    #[test]
    fn test_host_percentages_are_truncated() {
        let host = FakeHost::new(37.9, 64.99);
        let collector = UtilizationCollector::new(GpuCapability::Unavailable);

        let snapshot = collector.read(&host);
        assert_eq!(snapshot.cpu_percent, 37);
        assert_eq!(snapshot.mem_percent, 64);
        assert_eq!(snapshot.gpu_percent, 0);
    }

    #[test]
    fn test_gpu_fields_when_available() {
        let accelerator = ScriptedAccelerator::always(reading(55, 67, 3 * 1024, 8 * 1024));
        let collector = UtilizationCollector::new(GpuCapability::Available(Box::new(accelerator)));

        let snapshot = collector.read(&FakeHost::new(10.0, 20.0));
        assert_eq!(snapshot.gpu_percent, 55);
        assert_eq!(snapshot.gpu_temp_c, 67);
        assert_eq!(snapshot.gpu_mem_percent, 37);
    }

    #[test]
    fn test_failed_initialization_is_permanent() {
        let gpu = GpuCapability::initialize(|| Err(SensorError::initialization_error("no driver")));
        assert!(!gpu.is_available());
        assert!(gpu.device_name().is_none());

        let collector = UtilizationCollector::new(gpu);
        let host = FakeHost::new(50.0, 50.0);
        for _ in 0..5 {
            let snapshot = collector.read(&host);
            assert_eq!(
                (snapshot.gpu_percent, snapshot.gpu_temp_c, snapshot.gpu_mem_percent),
                (0, 0, 0)
            );
        }
    }

    #[test]
    fn test_failed_read_only_zeroes_that_tick() {
        let accelerator = ScriptedAccelerator::new(vec![
            Err(SensorError::unavailable("busy")),
            Ok(reading(90, 80, 1, 2)),
        ]);
        let gpu = GpuCapability::initialize(|| Ok(Box::new(accelerator)));
        assert!(gpu.is_available());

        let collector = UtilizationCollector::new(gpu);
        let host = FakeHost::new(0.0, 0.0);

        assert_eq!(collector.read(&host).gpu_percent, 0);
        let recovered = collector.read(&host);
        assert_eq!(recovered.gpu_percent, 90);
        assert_eq!(recovered.gpu_temp_c, 80);
        assert_eq!(recovered.gpu_mem_percent, 50);
    }
}
