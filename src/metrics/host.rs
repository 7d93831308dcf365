//! Host counters and utilization via sysinfo and direct /proc access.

use crate::metrics::data::CounterSnapshot;
use sysinfo::{Networks, System};

/// Size of a sector as reported by /proc/diskstats, independent of the device.
const DISKSTATS_SECTOR_BYTES: u64 = 512;

/// Source of the host-level figures a tick needs.
///
/// `refresh` is called once at the start of every tick; the getters then
/// report from that refresh.
pub trait HostSource {
    /// Pull fresh figures from the OS.
    fn refresh(&mut self);

    /// Overall CPU utilization since the previous refresh.
    fn cpu_percent(&self) -> f32;

    /// Memory utilization.
    fn memory_percent(&self) -> f32;

    /// Cumulative network and disk byte counters.
    fn counters(&self) -> CounterSnapshot;
}

/// [`HostSource`] backed by sysinfo, with disk counters from /proc/diskstats
/// on Linux.
pub struct SysinfoHost {
    system: System,
    networks: Networks,
}

impl SysinfoHost {
    /// Create a host source and take the baseline refresh that CPU usage
    /// needs to be meaningful on the first tick.
    ///
    /// Counters read right after construction are the seed for the first
    /// delta, so they must already cover everything `refresh` will load.
    pub fn new() -> Self {
        let mut system = System::new();
        #[cfg(target_os = "linux")]
        {
            system.refresh_cpu_usage();
            system.refresh_memory();
        }
        #[cfg(not(target_os = "linux"))]
        system.refresh_all();
        let networks = Networks::new_with_refreshed_list();

        Self { system, networks }
    }

    #[cfg(target_os = "linux")]
    fn disk_bytes_total(&self) -> u64 {
        std::fs::read_to_string("/proc/diskstats")
            .map(|stats| parse_diskstats(&stats, is_whole_disk))
            .unwrap_or(0)
    }

    /// Without a system-wide counter, approximate with the I/O of live
    /// processes. Exiting processes make this go backwards now and then.
    #[cfg(not(target_os = "linux"))]
    fn disk_bytes_total(&self) -> u64 {
        self.system
            .processes()
            .values()
            .map(|process| {
                let usage = process.disk_usage();
                usage.total_read_bytes + usage.total_written_bytes
            })
            .sum()
    }
}

impl Default for SysinfoHost {
    fn default() -> Self {
        Self::new()
    }
}

impl HostSource for SysinfoHost {
    fn refresh(&mut self) {
        #[cfg(target_os = "linux")]
        {
            self.system.refresh_cpu_usage();
            self.system.refresh_memory();
        }
        #[cfg(not(target_os = "linux"))]
        self.system.refresh_all();

        self.networks.refresh();
    }

    fn cpu_percent(&self) -> f32 {
        let cpus = self.system.cpus();
        if cpus.is_empty() {
            return 0.0;
        }
        cpus.iter().map(|cpu| cpu.cpu_usage()).sum::<f32>() / cpus.len() as f32
    }

    fn memory_percent(&self) -> f32 {
        let total = self.system.total_memory();
        if total == 0 {
            return 0.0;
        }
        (self.system.used_memory() as f32 / total as f32) * 100.0
    }

    fn counters(&self) -> CounterSnapshot {
        let (bytes_received, bytes_sent) = self
            .networks
            .iter()
            .fold((0u64, 0u64), |(rx, tx), (_, data)| {
                (
                    rx.saturating_add(data.total_received()),
                    tx.saturating_add(data.total_transmitted()),
                )
            });

        CounterSnapshot {
            bytes_received,
            bytes_sent,
            disk_bytes_total: self.disk_bytes_total(),
        }
    }
}

/// Sum read and written bytes over the devices accepted by `include`.
///
/// Partitions are filtered out by the caller's predicate so their traffic is
/// not counted twice.
pub fn parse_diskstats(stats: &str, include: impl Fn(&str) -> bool) -> u64 {
    stats
        .lines()
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 10 || !include(fields[2]) {
                return None;
            }
            let sectors_read = fields[5].parse::<u64>().ok()?;
            let sectors_written = fields[9].parse::<u64>().ok()?;
            Some((sectors_read + sectors_written) * DISKSTATS_SECTOR_BYTES)
        })
        .sum()
}

#[cfg(target_os = "linux")]
fn is_whole_disk(name: &str) -> bool {
    if name.starts_with("loop") || name.starts_with("ram") || name.starts_with("zram") {
        return false;
    }
    std::path::Path::new("/sys/block").join(name).exists()
}
