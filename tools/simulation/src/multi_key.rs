//! Multi-key simulation
//!
//! Drives one shared `FootprintEngine` from one thread per key. Keys are
//! independent, so per-key results must match a single-threaded run of
//! the same seeded stream.

use std::thread;
use std::time::Instant;

use footprint_engine::{CandlePublisher, FootprintEngine, NullPublisher};
use tracing::{debug, info};
use types::bucket::FootprintKey;
use types::candle::FootprintCandle;

use crate::generator::{GeneratorConfig, TickGenerator};
use crate::metrics::SimMetrics;

/// Outcome of one key's run.
#[derive(Debug, Clone)]
pub struct KeyRun {
    pub key: FootprintKey,
    pub metrics: SimMetrics,
    pub final_candle: Option<FootprintCandle>,
    /// Session volume the generator produced
    pub generated_volume: u64,
}

/// A multi-key simulation runner over a shared engine.
pub struct MultiKeySim<P: CandlePublisher = NullPublisher> {
    pub engine: FootprintEngine<P>,
    pub keys: Vec<FootprintKey>,
    pub generator: GeneratorConfig,
}

impl<P: CandlePublisher> MultiKeySim<P> {
    pub fn new(engine: FootprintEngine<P>, keys: Vec<FootprintKey>, generator: GeneratorConfig) -> Self {
        Self { engine, keys, generator }
    }

    /// Number of keys.
    pub fn key_count(&self) -> usize {
        self.keys.len()
    }

    /// Run `ticks_per_key` prints on every key concurrently. Key `i` uses
    /// seed `seed + i`, so runs are reproducible.
    pub fn run(&self, ticks_per_key: usize, start_timestamp: i64, seed: u64) -> Vec<KeyRun> {
        info!(keys = self.keys.len(), ticks_per_key, "Starting multi-key simulation");
        thread::scope(|scope| {
            let handles: Vec<_> = self
                .keys
                .iter()
                .enumerate()
                .map(|(i, key)| {
                    scope.spawn(move || self.run_key(key, ticks_per_key, start_timestamp, seed + i as u64))
                })
                .collect();
            handles
                .into_iter()
                .filter_map(|handle| handle.join().ok())
                .collect()
        })
    }

    /// Run one key on the calling thread.
    pub fn run_key(&self, key: &FootprintKey, ticks: usize, start_timestamp: i64, seed: u64) -> KeyRun {
        let mut generator = TickGenerator::new(key.symbol.clone(), start_timestamp, self.generator.clone(), seed);
        let mut metrics = SimMetrics::new();
        let started = Instant::now();

        for _ in 0..ticks {
            let tick = generator.next_tick();
            let applied_at = Instant::now();
            match self.engine.apply(key, &tick) {
                Ok(outcome) => metrics.record_outcome(&outcome, tick.quantity),
                Err(_) => metrics.record_rejected(),
            }
            metrics.record_latency(applied_at.elapsed().as_nanos().min(u128::from(u64::MAX)) as u64);
        }

        metrics.set_elapsed(started.elapsed().as_nanos().min(u128::from(u64::MAX)) as u64);
        debug!(key = %key, summary = %metrics.summary(), "Key run finished");
        KeyRun {
            key: key.clone(),
            final_candle: self.engine.snapshot(key),
            generated_volume: generator.cumulative_volume(),
            metrics,
        }
    }

    /// Combine per-key metrics.
    pub fn aggregate_metrics(runs: &[KeyRun]) -> SimMetrics {
        let mut combined = SimMetrics::new();
        for run in runs {
            combined.merge(&run.metrics);
        }
        combined
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use footprint_engine::EngineConfig;
    use rust_decimal::Decimal;
    use types::bucket::BucketConfig;
    use types::ids::Symbol;
    use types::timeframe::Timeframe;

    const OPEN: i64 = 1705290300;

    fn key(symbol: &str) -> FootprintKey {
        FootprintKey::new(
            Symbol::new(symbol),
            Timeframe::M5,
            BucketConfig::new(Decimal::new(5, 2), 20).unwrap(),
        )
    }

    fn sim(symbols: &[&str]) -> MultiKeySim {
        MultiKeySim::new(
            FootprintEngine::new(EngineConfig::default()).unwrap(),
            symbols.iter().map(|s| key(s)).collect(),
            GeneratorConfig::default(),
        )
    }

    #[test]
    fn test_keys_run_independently() {
        let sim = sim(&["NSE:SBIN-EQ", "NSE:INFY-EQ"]);
        let runs = sim.run(300, OPEN, 11);
        assert_eq!(runs.len(), 2);
        for run in &runs {
            let candle = run.final_candle.as_ref().unwrap();
            // in-order stream within one session: every print lands
            assert_eq!(run.metrics.ticks_applied, 300);
            assert_eq!(candle.cumulative_volume, run.generated_volume);
            assert!(candle.is_valid());
        }
        assert_eq!(sim.engine.len(), 2);
    }

    #[test]
    fn test_threaded_matches_sequential() {
        let threaded = sim(&["NSE:SBIN-EQ"]).run(400, OPEN, 5);
        let single = sim(&["NSE:SBIN-EQ"]);
        let sequential = single.run_key(&key("NSE:SBIN-EQ"), 400, OPEN, 5);
        assert_eq!(threaded[0].final_candle, sequential.final_candle);
    }

    #[test]
    fn test_aggregate_metrics() {
        let sim = sim(&["NSE:SBIN-EQ", "NSE:INFY-EQ", "NSE:TCS-EQ"]);
        let runs = sim.run(100, OPEN, 1);
        let total = MultiKeySim::<NullPublisher>::aggregate_metrics(&runs);
        assert_eq!(total.ticks_offered, 300);
        assert_eq!(total.ticks_applied, 300);
        assert_eq!(sim.key_count(), 3);
    }
}
