//! Seeded tick generator
//!
//! Produces a reproducible stream of trade prints for one symbol: a price
//! random walk on the tick grid, a quote that the print either lifts or
//! hits, resting book totals and a running session volume. The same seed
//! always yields the same ticks.

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use types::ids::Symbol;
use types::tick::Tick;

/// Shape of the generated flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    pub start_price: Decimal,
    pub tick_size: Decimal,
    /// Largest single move of the walk, in ticks
    pub max_step_ticks: i64,
    /// Quoted spread, in ticks
    pub spread_ticks: i64,
    pub min_quantity: u64,
    pub max_quantity: u64,
    /// Largest gap between consecutive prints (seconds)
    pub max_gap_secs: i64,
    /// Probability that a print carries no quote
    pub missing_quote_ratio: f64,
    /// Probability that a print is stamped behind the stream
    pub late_ratio: f64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            start_price: Decimal::new(19_550_00, 2),
            tick_size: Decimal::new(5, 2),
            max_step_ticks: 4,
            spread_ticks: 1,
            min_quantity: 1,
            max_quantity: 200,
            max_gap_secs: 2,
            missing_quote_ratio: 0.1,
            late_ratio: 0.0,
        }
    }
}

/// Deterministic tick source for one symbol.
pub struct TickGenerator {
    pub symbol: Symbol,
    pub config: GeneratorConfig,
    pub generated: usize,
    price: Decimal,
    timestamp: i64,
    cumulative_volume: u64,
    rng: ChaCha8Rng,
}

impl TickGenerator {
    /// Start a stream at `start_timestamp` with a deterministic seed.
    pub fn new(symbol: Symbol, start_timestamp: i64, config: GeneratorConfig, seed: u64) -> Self {
        let price = config.start_price;
        Self {
            symbol,
            config,
            generated: 0,
            price,
            timestamp: start_timestamp,
            cumulative_volume: 0,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Timestamp of the newest in-order print.
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn cumulative_volume(&self) -> u64 {
        self.cumulative_volume
    }

    /// Generate the next print.
    pub fn next_tick(&mut self) -> Tick {
        let tick_size = self.config.tick_size;
        let max_step = self.config.max_step_ticks.max(0);
        let step = self.rng.gen_range(-max_step..=max_step);
        let moved = self.price + tick_size * Decimal::from(step);
        // walk never leaves the positive grid
        self.price = moved.max(tick_size);

        let min_qty = self.config.min_quantity.max(1);
        let quantity = self.rng.gen_range(min_qty..=self.config.max_quantity.max(min_qty));
        self.cumulative_volume += quantity;

        let late = self.rng.gen_bool(self.config.late_ratio.clamp(0.0, 1.0));
        let timestamp = if late {
            self.timestamp - self.rng.gen_range(1..=5)
        } else {
            self.timestamp += self.rng.gen_range(0..=self.config.max_gap_secs.max(0));
            self.timestamp
        };

        let mut tick = Tick::new(self.symbol.clone(), self.price, timestamp, quantity)
            .with_cumulative_volume(self.cumulative_volume)
            .with_book(self.rng.gen_range(1_000..=50_000), self.rng.gen_range(1_000..=50_000));

        if !self.rng.gen_bool(self.config.missing_quote_ratio.clamp(0.0, 1.0)) {
            let spread = tick_size * Decimal::from(self.config.spread_ticks.max(1));
            tick = if self.rng.gen_bool(0.5) {
                // buyer lifts the offer
                let bid = (self.price - spread).max(tick_size);
                tick.with_quote(bid, self.price)
            } else {
                tick.with_quote(self.price, self.price + spread)
            };
        }

        self.generated += 1;
        tick
    }

    /// Generate `count` prints.
    pub fn take(&mut self, count: usize) -> Vec<Tick> {
        (0..count).map(|_| self.next_tick()).collect()
    }
}
