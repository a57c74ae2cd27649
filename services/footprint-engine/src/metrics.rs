//! Engine metrics
//!
//! Lock-free counters for Prometheus-style scraping, plus a bounded window
//! of apply latencies for percentile reporting.

use std::collections::BTreeMap;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

/// Counters shared by the engine and the ingestion boundary.
pub struct EngineMetrics {
    // Ticks
    pub ticks_applied: AtomicU64,
    pub ticks_dropped_out_of_order: AtomicU64,
    pub ticks_dropped_malformed: AtomicU64,
    pub ticks_dropped_duplicate: AtomicU64,
    pub seed_echoes_suppressed: AtomicU64,
    pub apply_latency_ns: Mutex<LatencyTracker>,

    // Candles
    pub candles_finalized: AtomicU64,
    pub session_resets: AtomicU64,
    pub reconciliations: AtomicU64,

    // Lifecycle
    pub seeds_applied: AtomicU64,
    pub seeds_skipped: AtomicU64,
    pub clears: AtomicU64,
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self {
            ticks_applied: AtomicU64::new(0),
            ticks_dropped_out_of_order: AtomicU64::new(0),
            ticks_dropped_malformed: AtomicU64::new(0),
            ticks_dropped_duplicate: AtomicU64::new(0),
            seed_echoes_suppressed: AtomicU64::new(0),
            apply_latency_ns: Mutex::new(LatencyTracker::new(1000)),
            candles_finalized: AtomicU64::new(0),
            session_resets: AtomicU64::new(0),
            reconciliations: AtomicU64::new(0),
            seeds_applied: AtomicU64::new(0),
            seeds_skipped: AtomicU64::new(0),
            clears: AtomicU64::new(0),
        }
    }

    /// Record an applied tick and how long it took.
    pub fn record_applied(&self, latency_ns: u64) {
        self.ticks_applied.fetch_add(1, Ordering::Relaxed);
        self.apply_latency_ns.lock().record(latency_ns);
    }

    pub fn record_out_of_order(&self) {
        self.ticks_dropped_out_of_order.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_malformed(&self) {
        self.ticks_dropped_malformed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_duplicate(&self) {
        self.ticks_dropped_duplicate.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_seed_echo(&self) {
        self.seed_echoes_suppressed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_finalized(&self) {
        self.candles_finalized.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_session_reset(&self) {
        self.session_resets.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reconciliation(&self) {
        self.reconciliations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_seed(&self, applied: bool) {
        if applied {
            self.seeds_applied.fetch_add(1, Ordering::Relaxed);
        } else {
            self.seeds_skipped.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_clear(&self) {
        self.clears.fetch_add(1, Ordering::Relaxed);
    }

    /// p99 apply latency over the recent window.
    pub fn apply_latency_p99(&self) -> Option<u64> {
        self.apply_latency_ns.lock().percentile(99)
    }

    /// Export metrics as a BTreeMap for Prometheus-style exposition.
    pub fn export(&self) -> BTreeMap<String, u64> {
        let counters = [
            ("ticks_applied", &self.ticks_applied),
            ("ticks_dropped_out_of_order", &self.ticks_dropped_out_of_order),
            ("ticks_dropped_malformed", &self.ticks_dropped_malformed),
            ("ticks_dropped_duplicate", &self.ticks_dropped_duplicate),
            ("seed_echoes_suppressed", &self.seed_echoes_suppressed),
            ("candles_finalized", &self.candles_finalized),
            ("session_resets", &self.session_resets),
            ("reconciliations", &self.reconciliations),
            ("seeds_applied", &self.seeds_applied),
            ("seeds_skipped", &self.seeds_skipped),
            ("clears", &self.clears),
        ];
        counters
            .iter()
            .map(|(name, counter)| (name.to_string(), counter.load(Ordering::Relaxed)))
            .collect()
    }
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Bounded window of latency samples.
pub struct LatencyTracker {
    samples: VecDeque<u64>,
    max_samples: usize,
}

impl LatencyTracker {
    pub fn new(max_samples: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(max_samples),
            max_samples,
        }
    }

    pub fn record(&mut self, value: u64) {
        if self.samples.len() >= self.max_samples {
            self.samples.pop_front();
        }
        self.samples.push_back(value);
    }

    /// Percentile (0-100) by nearest rank.
    pub fn percentile(&self, p: usize) -> Option<u64> {
        if self.samples.is_empty() {
            return None;
        }
        let mut sorted: Vec<u64> = self.samples.iter().copied().collect();
        sorted.sort_unstable();
        let idx = (p.min(100) * (sorted.len() - 1)) / 100;
        sorted.get(idx).copied()
    }

    pub fn count(&self) -> usize {
        self.samples.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_recording() {
        let metrics = EngineMetrics::new();
        metrics.record_applied(500);
        metrics.record_applied(700);
        metrics.record_out_of_order();
        metrics.record_seed(true);
        metrics.record_seed(false);

        let exported = metrics.export();
        assert_eq!(exported["ticks_applied"], 2);
        assert_eq!(exported["ticks_dropped_out_of_order"], 1);
        assert_eq!(exported["seeds_applied"], 1);
        assert_eq!(exported["seeds_skipped"], 1);
        assert_eq!(exported["clears"], 0);
        assert_eq!(exported.len(), 11);
    }

    #[test]
    fn test_latency_percentile() {
        let mut tracker = LatencyTracker::new(100);
        for i in 1..=100 {
            tracker.record(i);
        }
        let p50 = tracker.percentile(50).unwrap();
        assert!((49..=51).contains(&p50));
        assert_eq!(tracker.percentile(100), Some(100));
    }

    #[test]
    fn test_latency_window_eviction() {
        let mut tracker = LatencyTracker::new(3);
        for v in [10, 20, 30, 40] {
            tracker.record(v);
        }
        assert_eq!(tracker.count(), 3);
        assert_eq!(tracker.percentile(0), Some(20));
    }

    #[test]
    fn test_empty_latency() {
        assert_eq!(EngineMetrics::new().apply_latency_p99(), None);
    }
}
