//! Simulation run metrics
//!
//! Tracks prints offered, applied and dropped, finalized candles, traded
//! volume, per-apply latency histograms and throughput.

use footprint_engine::ApplyOutcome;
use serde::{Deserialize, Serialize};

/// Latency histogram bucket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatencyBucket {
    pub label: String,
    pub lower_ns: u64,
    pub upper_ns: u64,
    pub count: u64,
}

/// Aggregated metrics for one or more simulated keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimMetrics {
    pub ticks_offered: u64,
    pub ticks_applied: u64,
    pub ticks_dropped_out_of_order: u64,
    pub ticks_rejected: u64,
    pub candles_finalized: u64,
    pub session_resets: u64,
    /// Quantity that reached a candle
    pub total_volume: u64,
    pub latency_buckets: Vec<LatencyBucket>,
    pub elapsed_ns: u64,
}

impl SimMetrics {
    /// Create empty metrics with default latency buckets.
    pub fn new() -> Self {
        Self {
            ticks_offered: 0,
            ticks_applied: 0,
            ticks_dropped_out_of_order: 0,
            ticks_rejected: 0,
            candles_finalized: 0,
            session_resets: 0,
            total_volume: 0,
            latency_buckets: default_buckets(),
            elapsed_ns: 0,
        }
    }

    /// Record what the engine did with one print of `quantity`.
    pub fn record_outcome(&mut self, outcome: &ApplyOutcome, quantity: u64) {
        self.ticks_offered += 1;
        match outcome {
            ApplyOutcome::Applied(applied) => {
                self.ticks_applied += 1;
                self.total_volume += quantity;
                if applied.finalized.is_some() {
                    self.candles_finalized += 1;
                }
                if applied.session_reset {
                    self.session_resets += 1;
                }
            }
            ApplyOutcome::DroppedOutOfOrder { .. } => {
                self.ticks_dropped_out_of_order += 1;
            }
        }
    }

    /// Record a print the engine refused as malformed.
    pub fn record_rejected(&mut self) {
        self.ticks_offered += 1;
        self.ticks_rejected += 1;
    }

    /// Record latency in nanoseconds.
    pub fn record_latency(&mut self, latency_ns: u64) {
        for bucket in &mut self.latency_buckets {
            if latency_ns >= bucket.lower_ns && latency_ns < bucket.upper_ns {
                bucket.count += 1;
                return;
            }
        }
        // Overflow bucket (last)
        if let Some(last) = self.latency_buckets.last_mut() {
            last.count += 1;
        }
    }

    /// Set elapsed time.
    pub fn set_elapsed(&mut self, ns: u64) {
        self.elapsed_ns = ns;
    }

    /// Throughput: applied ticks per second.
    pub fn ticks_per_second(&self) -> f64 {
        if self.elapsed_ns == 0 {
            return 0.0;
        }
        self.ticks_applied as f64 / (self.elapsed_ns as f64 / 1_000_000_000.0)
    }

    /// Fold another run's counters into this one. Elapsed time takes the
    /// longer of the two since keys run side by side.
    pub fn merge(&mut self, other: &SimMetrics) {
        self.ticks_offered += other.ticks_offered;
        self.ticks_applied += other.ticks_applied;
        self.ticks_dropped_out_of_order += other.ticks_dropped_out_of_order;
        self.ticks_rejected += other.ticks_rejected;
        self.candles_finalized += other.candles_finalized;
        self.session_resets += other.session_resets;
        self.total_volume += other.total_volume;
        for (mine, theirs) in self.latency_buckets.iter_mut().zip(&other.latency_buckets) {
            mine.count += theirs.count;
        }
        self.elapsed_ns = self.elapsed_ns.max(other.elapsed_ns);
    }

    /// Build a summary string.
    pub fn summary(&self) -> String {
        format!(
            "Ticks: {} | Applied: {} | Late: {} | Rejected: {} | Finalized: {} | Volume: {} | Throughput: {:.0} ticks/s",
            self.ticks_offered,
            self.ticks_applied,
            self.ticks_dropped_out_of_order,
            self.ticks_rejected,
            self.candles_finalized,
            self.total_volume,
            self.ticks_per_second(),
        )
    }
}

impl Default for SimMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Default latency histogram buckets.
fn default_buckets() -> Vec<LatencyBucket> {
    vec![
        LatencyBucket { label: "<1μs".into(), lower_ns: 0, upper_ns: 1_000, count: 0 },
        LatencyBucket { label: "1-10μs".into(), lower_ns: 1_000, upper_ns: 10_000, count: 0 },
        LatencyBucket { label: "10-100μs".into(), lower_ns: 10_000, upper_ns: 100_000, count: 0 },
        LatencyBucket { label: "100μs-1ms".into(), lower_ns: 100_000, upper_ns: 1_000_000, count: 0 },
        LatencyBucket { label: ">1ms".into(), lower_ns: 1_000_000, upper_ns: u64::MAX, count: 0 },
    ]
}
