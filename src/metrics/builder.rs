//! Assembles one [`Sample`] per tick from the counter tracker, the
//! temperature probe and the utilization collector.

use crate::metrics::counters::CounterTracker;
use crate::metrics::data::{CounterDeltas, Sample, TemperatureReading, UtilizationSnapshot};
use crate::metrics::host::HostSource;
use crate::metrics::temperature::TemperatureProbe;
use crate::metrics::utilization::UtilizationCollector;
use futures_util::stream::{self, BoxStream};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::{self, Instant, MissedTickBehavior};

/// Throughput that maps to one percent of the display's activity bars.
///
/// These are rough "typical busy" figures rather than a calibration, so
/// they are exposed for tuning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Scaling {
    /// Upload KB per interval that counts as one percent
    pub net_up_kbps_per_percent: f64,
    /// Download KB per interval that counts as one percent
    pub net_down_kbps_per_percent: f64,
    /// Percent per MB of disk traffic per interval
    pub disk_percent_per_mbps: f64,
}

impl Default for Scaling {
    fn default() -> Self {
        Self {
            net_up_kbps_per_percent: 5.0,
            net_down_kbps_per_percent: 10.0,
            disk_percent_per_mbps: 2.0,
        }
    }
}

/// Truncate toward zero and clamp into [0, 100]. Non-finite input is 0.
pub fn clamp_percent(value: f64) -> u8 {
    if !value.is_finite() {
        return 0;
    }
    value.trunc().clamp(0.0, 100.0) as u8
}

fn clamp_whole_percent(value: i32) -> u8 {
    value.clamp(0, 100) as u8
}

/// Map raw per-tick figures onto the display's fixed-shape record.
pub fn normalize(
    deltas: CounterDeltas,
    temperature: TemperatureReading,
    utilization: UtilizationSnapshot,
    scaling: &Scaling,
) -> Sample {
    Sample {
        cpu: clamp_whole_percent(utilization.cpu_percent),
        cpu_temp_c: temperature.celsius_or_default(),
        mem: clamp_whole_percent(utilization.mem_percent),
        gpu_util: clamp_whole_percent(utilization.gpu_percent),
        gpu_temp_c: utilization.gpu_temp_c,
        gpu_mem_percent: clamp_whole_percent(utilization.gpu_mem_percent),
        net_up_percent: clamp_percent(deltas.net_up_kbps / scaling.net_up_kbps_per_percent),
        net_down_percent: clamp_percent(deltas.net_down_kbps / scaling.net_down_kbps_per_percent),
        disk_percent: clamp_percent(deltas.disk_mbps * scaling.disk_percent_per_mbps),
    }
}

/// Owns every per-process piece of sampling state and produces samples.
pub struct SampleBuilder<H> {
    host: H,
    tracker: CounterTracker,
    probe: TemperatureProbe,
    utilization: UtilizationCollector,
    scaling: Scaling,
}

impl<H: HostSource> SampleBuilder<H> {
    /// Seed the counter tracker from the host's current counters.
    pub fn new(
        host: H,
        probe: TemperatureProbe,
        utilization: UtilizationCollector,
        scaling: Scaling,
    ) -> Self {
        let tracker = CounterTracker::new(host.counters());

        Self {
            host,
            tracker,
            probe,
            utilization,
            scaling,
        }
    }

    pub fn probe(&self) -> &TemperatureProbe {
        &self.probe
    }

    pub fn utilization(&self) -> &UtilizationCollector {
        &self.utilization
    }

    pub fn scaling(&self) -> &Scaling {
        &self.scaling
    }

    /// Take one sample. Sensor failures degrade individual fields to 0;
    /// this never fails.
    pub async fn build(&mut self) -> Sample {
        self.host.refresh();
        let deltas = self.tracker.compute_deltas(self.host.counters());
        let temperature = self.probe.probe().await;
        let utilization = self.utilization.read(&self.host);

        normalize(deltas, temperature, utilization, &self.scaling)
    }
}

impl<H: HostSource + Send + 'static> SampleBuilder<H> {
    /// Turn the builder into an endless stream yielding one sample per
    /// interval. The first sample arrives after one full interval.
    ///
    /// The builder (and with it the accelerator session) is dropped when the
    /// stream is.
    pub fn into_stream(self, interval: Duration) -> BoxStream<'static, Sample> {
        let mut ticker = time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let stream = stream::unfold((self, ticker), |(mut builder, mut ticker)| async move {
            ticker.tick().await;
            let sample = builder.build().await;
            Some((sample, (builder, ticker)))
        });

        Box::pin(stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::data::CounterSnapshot;
    use crate::metrics::fake::FakeHost;
    use crate::metrics::utilization::GpuCapability;
    use futures_util::StreamExt;

    fn snapshot(recv: u64, sent: u64, disk: u64) -> CounterSnapshot {
        CounterSnapshot {
            bytes_received: recv,
            bytes_sent: sent,
            disk_bytes_total: disk,
        }
    }

    fn builder(host: FakeHost) -> SampleBuilder<FakeHost> {
        SampleBuilder::new(
            host,
            TemperatureProbe::new(Vec::new()),
            UtilizationCollector::new(GpuCapability::Unavailable),
            Scaling::default(),
        )
    }

    #[test]
    fn test_clamp_percent() {
        assert_eq!(clamp_percent(-3.5), 0);
        assert_eq!(clamp_percent(0.99), 0);
        assert_eq!(clamp_percent(42.7), 42);
        assert_eq!(clamp_percent(1e12), 100);
        assert_eq!(clamp_percent(f64::NAN), 0);
        assert_eq!(clamp_percent(f64::INFINITY), 0);
    }

    #[test]
    fn test_normalize_scales_throughput() {
        let deltas = CounterDeltas {
            net_up_kbps: 250.0,
            net_down_kbps: 250.0,
            disk_mbps: 12.5,
        };
        let sample = normalize(
            deltas,
            TemperatureReading::from_source("test", 105),
            UtilizationSnapshot {
                cpu_percent: 140,
                mem_percent: -1,
                gpu_percent: 30,
                gpu_mem_percent: 20,
                gpu_temp_c: 110,
            },
            &Scaling::default(),
        );

        assert_eq!(sample.net_up_percent, 50);
        assert_eq!(sample.net_down_percent, 25);
        assert_eq!(sample.disk_percent, 25);
        assert_eq!(sample.cpu, 100);
        assert_eq!(sample.mem, 0);
        // Temperatures are not clamped.
        assert_eq!(sample.cpu_temp_c, 105);
        assert_eq!(sample.gpu_temp_c, 110);
    }

    #[test]
    fn test_percent_fields_bounded_for_extreme_deltas() {
        let extremes = [f64::MIN, -1e9, -1.0, 0.0, 0.5, 1e3, 1e9, f64::MAX, f64::NAN];
        for &value in &extremes {
            let deltas = CounterDeltas {
                net_up_kbps: value,
                net_down_kbps: -value,
                disk_mbps: value,
            };
            let utilization = UtilizationSnapshot {
                cpu_percent: value as i32,
                mem_percent: -(value as i32).saturating_abs(),
                gpu_percent: i32::MAX,
                gpu_mem_percent: i32::MIN,
                gpu_temp_c: 0,
            };
            let sample = normalize(
                deltas,
                TemperatureReading::unavailable(),
                utilization,
                &Scaling::default(),
            );

            for field in [
                sample.cpu,
                sample.mem,
                sample.gpu_util,
                sample.gpu_mem_percent,
                sample.net_up_percent,
                sample.net_down_percent,
                sample.disk_percent,
            ] {
                assert!(field <= 100, "{} escaped the range for input {}", field, value);
            }
        }
    }

    #[tokio::test]
    async fn test_end_to_end_counter_scenario() {
        let host = FakeHost::new(12.0, 48.0)
            .with_initial(snapshot(1000, 500, 2000))
            .with_script([snapshot(6120, 1524, 2_097_152 + 2000)]);
        let mut builder = builder(host);

        let sample = builder.build().await;
        assert_eq!(sample.net_down_percent, 0);
        assert_eq!(sample.net_up_percent, 0);
        assert_eq!(sample.disk_percent, 4);
        assert_eq!(sample.cpu, 12);
        assert_eq!(sample.mem, 48);
        assert_eq!(sample.cpu_temp_c, 0);
        assert_eq!(
            (sample.gpu_util, sample.gpu_temp_c, sample.gpu_mem_percent),
            (0, 0, 0)
        );
    }

    #[tokio::test]
    async fn test_counter_reset_reads_as_idle() {
        let host = FakeHost::new(0.0, 0.0)
            .with_initial(snapshot(u64::MAX / 2, u64::MAX / 2, u64::MAX / 2))
            .with_script([snapshot(0, 0, 0), snapshot(10_240, 5_120, 1 << 20)]);
        let mut builder = builder(host);

        let after_reset = builder.build().await;
        assert_eq!(
            (after_reset.net_up_percent, after_reset.net_down_percent, after_reset.disk_percent),
            (0, 0, 0)
        );

        let next = builder.build().await;
        assert_eq!(next.net_down_percent, 1);
        assert_eq!(next.net_up_percent, 1);
        assert_eq!(next.disk_percent, 2);
    }

    #[tokio::test]
    async fn test_custom_scaling_is_applied() {
        let host = FakeHost::new(0.0, 0.0).with_script([snapshot(100 * 1024, 100 * 1024, 0)]);
        let scaling = Scaling {
            net_up_kbps_per_percent: 1.0,
            net_down_kbps_per_percent: 2.0,
            disk_percent_per_mbps: 2.0,
        };
        let mut builder = SampleBuilder::new(
            host,
            TemperatureProbe::new(Vec::new()),
            UtilizationCollector::new(GpuCapability::Unavailable),
            scaling,
        );

        let sample = builder.build().await;
        assert_eq!(sample.net_up_percent, 100);
        assert_eq!(sample.net_down_percent, 50);
    }

    #[tokio::test]
    async fn test_stream_yields_one_sample_per_tick() {
        let host = FakeHost::new(5.0, 6.0);
        let stream = builder(host).into_stream(Duration::from_millis(10));

        let samples: Vec<Sample> = stream.take(3).collect().await;
        assert_eq!(samples.len(), 3);
        assert!(samples.iter().all(|sample| sample.cpu == 5 && sample.mem == 6));
    }
}
