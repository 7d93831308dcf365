//! Rate computation from cumulative host counters.

use crate::metrics::data::{CounterDeltas, CounterSnapshot};

const BYTES_PER_KB: f64 = 1024.0;
const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Remembers the previous counter snapshot and turns each new one into
/// per-interval deltas.
///
/// Not meant to be shared between concurrent ticks: the previous snapshot is
/// read and replaced in one `&mut self` call.
#[derive(Debug, Clone)]
pub struct CounterTracker {
    previous: CounterSnapshot,
}

impl CounterTracker {
    /// Start tracking from the first snapshot taken at startup.
    pub fn new(initial: CounterSnapshot) -> Self {
        Self { previous: initial }
    }

    /// The snapshot the next call will difference against.
    pub fn previous(&self) -> CounterSnapshot {
        self.previous
    }

    /// Difference `current` against the stored snapshot, then store `current`.
    ///
    /// A counter that went backwards (reset or wraparound at the source)
    /// produces a negative delta; normalization clamps it away.
    pub fn compute_deltas(&mut self, current: CounterSnapshot) -> CounterDeltas {
        let previous = std::mem::replace(&mut self.previous, current);

        CounterDeltas {
            net_up_kbps: signed_delta(previous.bytes_sent, current.bytes_sent) / BYTES_PER_KB,
            net_down_kbps: signed_delta(previous.bytes_received, current.bytes_received)
                / BYTES_PER_KB,
            disk_mbps: signed_delta(previous.disk_bytes_total, current.disk_bytes_total)
                / BYTES_PER_MB,
        }
    }
}

fn signed_delta(previous: u64, current: u64) -> f64 {
    (i128::from(current) - i128::from(previous)) as f64
}
