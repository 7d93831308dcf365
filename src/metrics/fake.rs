//! Scriptable stand-ins for the host and the accelerator, used by tests and
//! benchmarks to drive the pipeline without touching real hardware.

use crate::error::SensorError;
use crate::metrics::data::{CounterSnapshot, GpuReading};
use crate::metrics::host::HostSource;
use crate::metrics::utilization::Accelerator;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Host with fixed percentages and a queue of counter snapshots.
///
/// Each `refresh` advances to the next queued snapshot; once the queue is
/// drained the last snapshot keeps being reported.
#[derive(Debug, Default)]
pub struct FakeHost {
    cpu_percent: f32,
    memory_percent: f32,
    current: CounterSnapshot,
    pending: VecDeque<CounterSnapshot>,
}

impl FakeHost {
    pub fn new(cpu_percent: f32, memory_percent: f32) -> Self {
        Self {
            cpu_percent,
            memory_percent,
            ..Default::default()
        }
    }

    /// Counters reported before the first refresh.
    pub fn with_initial(mut self, initial: CounterSnapshot) -> Self {
        self.current = initial;
        self
    }

    /// Queue snapshots for subsequent refreshes.
    pub fn with_script(mut self, script: impl IntoIterator<Item = CounterSnapshot>) -> Self {
        self.pending.extend(script);
        self
    }
}

impl HostSource for FakeHost {
    fn refresh(&mut self) {
        if let Some(next) = self.pending.pop_front() {
            self.current = next;
        }
    }

    fn cpu_percent(&self) -> f32 {
        self.cpu_percent
    }

    fn memory_percent(&self) -> f32 {
        self.memory_percent
    }

    fn counters(&self) -> CounterSnapshot {
        self.current
    }
}

/// Accelerator that replays scripted results, then repeats its fallback.
pub struct ScriptedAccelerator {
    script: Mutex<VecDeque<Result<GpuReading, SensorError>>>,
    fallback: GpuReading,
}

impl ScriptedAccelerator {
    pub fn new(script: Vec<Result<GpuReading, SensorError>>) -> Self {
        let fallback = script
            .iter()
            .rev()
            .find_map(|entry| entry.as_ref().ok().copied())
            .unwrap_or_default();

        Self {
            script: Mutex::new(script.into()),
            fallback,
        }
    }

    /// Accelerator that returns the same reading on every tick.
    pub fn always(reading: GpuReading) -> Self {
        Self::new(vec![Ok(reading)])
    }
}

impl Accelerator for ScriptedAccelerator {
    fn device_name(&self) -> &str {
        "scripted-gpu"
    }

    fn read(&self) -> Result<GpuReading, SensorError> {
        let mut script = match self.script.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        script.pop_front().unwrap_or(Ok(self.fallback))
    }
}
