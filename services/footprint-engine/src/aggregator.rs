//! Candle aggregation
//!
//! One `AggregatorState` exists per `FootprintKey`. It moves from empty to
//! an open candle on the first tick, and on every interval rollover emits
//! the closed candle as finalized before opening the next one.
//!
//! Per-level rows are the source of truth for volume. The scalar totals on
//! the open candle are a cached projection; after every mutation they are
//! compared with the row sums and re-derived from them on disagreement.

use std::collections::HashMap;

use rust_decimal::Decimal;
use tracing::{debug, info, warn};
use types::bucket::FootprintKey;
use types::candle::{CandleStatus, CandleUpdate, FootprintCandle, PriceLevelRow};
use types::errors::{ConfigError, TickError};
use types::numeric::round_price;
use types::tick::Tick;

use crate::bucketer::PriceBucketer;
use crate::classifier::{classify, Classification, MarketContext};
use crate::session::SessionCalendar;

/// Accumulated aggressor volume at one price level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LevelVolume {
    pub buy: u64,
    pub sell: u64,
}

impl LevelVolume {
    pub fn total(&self) -> u64 {
        self.buy + self.sell
    }
}

/// The candle currently accumulating for a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenCandle {
    pub interval_start: i64,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: u64,
    pub buy_volume: u64,
    pub sell_volume: u64,
    pub rows: HashMap<Decimal, LevelVolume>,
}

impl OpenCandle {
    fn new(interval_start: i64, price: Decimal) -> Self {
        Self {
            interval_start,
            open: price,
            high: price,
            low: price,
            close: price,
            volume: 0,
            buy_volume: 0,
            sell_volume: 0,
            rows: HashMap::new(),
        }
    }

    fn add(&mut self, price: Decimal, level: Decimal, classification: &Classification) {
        self.high = self.high.max(price);
        self.low = self.low.min(price);
        self.close = price;

        self.buy_volume += classification.buy_volume;
        self.sell_volume += classification.sell_volume;
        self.volume += classification.total();

        let row = self.rows.entry(level).or_default();
        row.buy += classification.buy_volume;
        row.sell += classification.sell_volume;
    }

    /// (buy, sell) summed over all rows.
    pub fn row_totals(&self) -> (u64, u64) {
        self.rows
            .values()
            .fold((0, 0), |(buy, sell), row| (buy + row.buy, sell + row.sell))
    }

    /// Read-only snapshot with rows sorted descending by price.
    pub fn to_candle(&self, cumulative_delta: i64, cumulative_volume: u64) -> FootprintCandle {
        let mut rows: Vec<PriceLevelRow> = self
            .rows
            .iter()
            .map(|(price, level)| PriceLevelRow::new(round_price(*price), level.buy, level.sell))
            .collect();
        rows.sort_by(|a, b| b.price_level.cmp(&a.price_level));

        FootprintCandle {
            interval_start: self.interval_start,
            open: round_price(self.open),
            high: round_price(self.high),
            low: round_price(self.low),
            close: round_price(self.close),
            volume: self.volume,
            buy_volume: self.buy_volume,
            sell_volume: self.sell_volume,
            delta: self.buy_volume as i64 - self.sell_volume as i64,
            cumulative_delta,
            cumulative_volume,
            rows,
        }
    }
}

/// A tick that changed the candle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedTick {
    /// Open-candle snapshot after the tick
    pub update: CandleUpdate,
    /// The previous candle, when this tick rolled the interval over
    pub finalized: Option<CandleUpdate>,
    pub classification: Classification,
    pub session_reset: bool,
    /// Scalar totals had drifted from the row sums and were re-derived
    pub reconciled: bool,
}

/// Result of offering a tick to an aggregator. Neither variant is an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied(Box<AppliedTick>),
    /// Older than the last processed tick (beyond tolerance) or than the open bin.
    DroppedOutOfOrder { timestamp: i64, last_processed: i64 },
}

impl ApplyOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, ApplyOutcome::Applied(_))
    }
}

/// Live aggregation state for one key.
#[derive(Debug, Clone)]
pub struct AggregatorState {
    pub(crate) key: FootprintKey,
    pub(crate) bucketer: PriceBucketer,
    pub(crate) candle: Option<OpenCandle>,
    pub(crate) last_processed_timestamp: Option<i64>,
    /// Open instant of the session the cumulative counters belong to
    pub(crate) session_anchor: Option<i64>,
    pub(crate) cumulative_delta: i64,
    pub(crate) cumulative_volume: u64,
    pub(crate) previous: MarketContext,
    /// Set when the state has been cleared out of the registry
    pub(crate) retired: bool,
}

impl AggregatorState {
    /// Empty state. Fails when the key's bucket configuration is invalid.
    pub fn new(key: FootprintKey) -> Result<Self, ConfigError> {
        let bucketer = PriceBucketer::new(key.bucket.clone())?;
        Ok(Self {
            key,
            bucketer,
            candle: None,
            last_processed_timestamp: None,
            session_anchor: None,
            cumulative_delta: 0,
            cumulative_volume: 0,
            previous: MarketContext::default(),
            retired: false,
        })
    }

    pub fn key(&self) -> &FootprintKey {
        &self.key
    }

    pub fn bucketer(&self) -> &PriceBucketer {
        &self.bucketer
    }

    pub fn is_empty(&self) -> bool {
        self.candle.is_none()
    }

    pub fn last_processed_timestamp(&self) -> Option<i64> {
        self.last_processed_timestamp
    }

    pub fn cumulative_delta(&self) -> i64 {
        self.cumulative_delta
    }

    pub fn cumulative_volume(&self) -> u64 {
        self.cumulative_volume
    }

    /// Snapshot of the open candle, if any.
    pub fn snapshot(&self) -> Option<FootprintCandle> {
        self.candle
            .as_ref()
            .map(|c| c.to_candle(self.cumulative_delta, self.cumulative_volume))
    }

    /// Apply one validated tick. A price that cannot be bucketed is an error
    /// and leaves the state untouched.
    pub fn apply(
        &mut self,
        tick: &Tick,
        calendar: &SessionCalendar,
        tolerance_secs: i64,
    ) -> Result<ApplyOutcome, TickError> {
        if let Some(last) = self.last_processed_timestamp {
            if tick.timestamp.saturating_add(tolerance_secs) < last {
                return Ok(self.drop_out_of_order(tick, last));
            }
        }

        let timeframe = self.key.timeframe;
        let bin = calendar.bin_start(tick.timestamp, timeframe);
        if let Some(candle) = &self.candle {
            if bin < candle.interval_start {
                let last = self.last_processed_timestamp.unwrap_or(candle.interval_start);
                return Ok(self.drop_out_of_order(tick, last));
            }
        }

        let level = self.bucketer.bucket(tick.price)?;
        let classification = classify(tick, &self.previous);
        let mut finalized = None;
        let mut session_reset = false;

        let rollover = self.candle.as_ref().map_or(true, |c| c.interval_start != bin);
        if rollover {
            finalized = self.candle.take().map(|closed| {
                debug!(
                    key = %self.key,
                    interval_start = closed.interval_start,
                    volume = closed.volume,
                    "Candle finalized"
                );
                CandleUpdate {
                    key: self.key.clone(),
                    status: CandleStatus::Finalized,
                    candle: closed.to_candle(self.cumulative_delta, self.cumulative_volume),
                }
            });

            let session = calendar.session_open(tick.timestamp);
            if self.session_anchor != Some(session) {
                if self.session_anchor.is_some() {
                    session_reset = true;
                    info!(
                        key = %self.key,
                        session_open = session,
                        carried_delta = self.cumulative_delta,
                        carried_volume = self.cumulative_volume,
                        "Session boundary, resetting cumulative counters"
                    );
                }
                self.cumulative_delta = 0;
                self.cumulative_volume = 0;
                self.session_anchor = Some(session);
            }
        }

        self.candle
            .get_or_insert_with(|| OpenCandle::new(bin, tick.price))
            .add(tick.price, level, &classification);
        self.cumulative_delta += classification.delta();
        self.cumulative_volume += classification.total();

        let reconciled = self.reconcile();

        self.last_processed_timestamp = Some(
            self.last_processed_timestamp
                .map_or(tick.timestamp, |last| last.max(tick.timestamp)),
        );
        self.previous = self.previous.advance(tick);

        debug!(
            key = %self.key,
            price = %tick.price,
            quantity = tick.quantity,
            rule = ?classification.rule,
            "Tick applied"
        );

        let candle = self
            .candle
            .get_or_insert_with(|| OpenCandle::new(bin, tick.price))
            .to_candle(self.cumulative_delta, self.cumulative_volume);
        Ok(ApplyOutcome::Applied(Box::new(AppliedTick {
            update: CandleUpdate {
                key: self.key.clone(),
                status: CandleStatus::Open,
                candle,
            },
            finalized,
            classification,
            session_reset,
            reconciled,
        })))
    }

    /// Re-derive scalar totals from the rows when they disagree. Cumulative
    /// counters absorb the same correction. Returns true when a fix was needed.
    pub(crate) fn reconcile(&mut self) -> bool {
        let Some(candle) = self.candle.as_mut() else {
            return false;
        };
        let (row_buy, row_sell) = candle.row_totals();
        let row_volume = row_buy + row_sell;
        if row_volume == candle.volume && row_buy == candle.buy_volume && row_sell == candle.sell_volume {
            return false;
        }

        warn!(
            key = %self.key,
            interval_start = candle.interval_start,
            cached_volume = candle.volume,
            row_volume,
            "Reconciliation mismatch, re-deriving totals from rows"
        );

        let old_delta = candle.buy_volume as i64 - candle.sell_volume as i64;
        let new_delta = row_buy as i64 - row_sell as i64;
        let volume_diff = row_volume as i64 - candle.volume as i64;

        candle.buy_volume = row_buy;
        candle.sell_volume = row_sell;
        candle.volume = row_volume;

        self.cumulative_delta += new_delta - old_delta;
        self.cumulative_volume = self.cumulative_volume.saturating_add_signed(volume_diff);
        true
    }

    fn drop_out_of_order(&self, tick: &Tick, last_processed: i64) -> ApplyOutcome {
        warn!(
            key = %self.key,
            timestamp = tick.timestamp,
            last_processed,
            "Out-of-order tick dropped"
        );
        ApplyOutcome::DroppedOutOfOrder {
            timestamp: tick.timestamp,
            last_processed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use proptest::prelude::*;
    use types::bucket::BucketConfig;
    use types::ids::Symbol;
    use types::timeframe::Timeframe;

    const OPEN: i64 = 1705290300;

    fn d(s: &str) -> Decimal {
        Decimal::from_str_exact(s).unwrap()
    }

    fn key(timeframe: Timeframe) -> FootprintKey {
        FootprintKey::new(
            Symbol::new("NSE:NIFTY24JANFUT"),
            timeframe,
            BucketConfig::new(d("0.05"), 100).unwrap(),
        )
    }

    fn calendar() -> SessionCalendar {
        SessionCalendar::new(&SessionConfig::default()).unwrap()
    }

    fn tick(price: &str, ts: i64, quantity: u64) -> Tick {
        Tick::new(Symbol::new("NSE:NIFTY24JANFUT"), d(price), ts, quantity)
    }

    fn applied(outcome: ApplyOutcome) -> AppliedTick {
        match outcome {
            ApplyOutcome::Applied(a) => *a,
            other => panic!("expected applied, got {:?}", other),
        }
    }

    #[test]
    fn test_first_tick_opens_candle() {
        let mut state = AggregatorState::new(key(Timeframe::M5)).unwrap();
        assert!(state.is_empty());

        let a = applied(state.apply(&tick("19552.30", OPEN + 10, 50), &calendar(), 0).unwrap());
        assert!(a.finalized.is_none());
        assert!(!a.session_reset);
        assert_eq!(a.update.status, CandleStatus::Open);
        assert_eq!(a.update.candle.interval_start, OPEN);
        assert_eq!(a.update.candle.open, d("19552.30"));
        assert_eq!(a.update.candle.volume, 50);
        assert_eq!(a.update.candle.rows[0].price_level, d("19550.00"));
        assert!(a.update.candle.is_valid());
    }

    #[test]
    fn test_rollover_emits_finalized() {
        let cal = calendar();
        let mut state = AggregatorState::new(key(Timeframe::M5)).unwrap();
        state.apply(&tick("100", OPEN + 10, 10), &cal, 0).unwrap();
        state.apply(&tick("101", OPEN + 20, 5), &cal, 0).unwrap();

        let a = applied(state.apply(&tick("102", OPEN + 300, 7), &cal, 0).unwrap());
        let finalized = a.finalized.unwrap();
        assert_eq!(finalized.status, CandleStatus::Finalized);
        assert_eq!(finalized.candle.interval_start, OPEN);
        assert_eq!(finalized.candle.volume, 15);
        assert_eq!(finalized.candle.close, d("101.00"));

        assert_eq!(a.update.candle.interval_start, OPEN + 300);
        assert_eq!(a.update.candle.open, d("102.00"));
        assert_eq!(a.update.candle.volume, 7);
        // cumulative carries across rollover inside a session
        assert_eq!(a.update.candle.cumulative_volume, 22);
    }

    #[test]
    fn test_out_of_order_dropped_without_mutation() {
        let cal = calendar();
        let mut state = AggregatorState::new(key(Timeframe::M1)).unwrap();
        state.apply(&tick("100", OPEN + 30, 10), &cal, 0).unwrap();
        let before = state.snapshot();

        let outcome = state.apply(&tick("90", OPEN + 29, 10), &cal, 0).unwrap();
        assert_eq!(
            outcome,
            ApplyOutcome::DroppedOutOfOrder {
                timestamp: OPEN + 29,
                last_processed: OPEN + 30
            }
        );
        assert_eq!(state.snapshot(), before);
    }

    #[test]
    fn test_equal_timestamp_accepted() {
        let cal = calendar();
        let mut state = AggregatorState::new(key(Timeframe::M1)).unwrap();
        state.apply(&tick("100", OPEN + 30, 10), &cal, 0).unwrap();
        assert!(state.apply(&tick("100", OPEN + 30, 10), &cal, 0).unwrap().is_applied());
    }

    #[test]
    fn test_tolerance_admits_late_tick_in_open_bin() {
        let cal = calendar();
        let mut state = AggregatorState::new(key(Timeframe::M1)).unwrap();
        state.apply(&tick("100", OPEN + 30, 10), &cal, 0).unwrap();
        assert!(state.apply(&tick("100", OPEN + 28, 1), &cal, 2).unwrap().is_applied());
        assert_eq!(state.last_processed_timestamp(), Some(OPEN + 30));
    }

    #[test]
    fn test_tolerance_never_reopens_closed_bin() {
        let cal = calendar();
        let mut state = AggregatorState::new(key(Timeframe::M1)).unwrap();
        state.apply(&tick("100", OPEN + 60, 10), &cal, 0).unwrap();
        let outcome = state.apply(&tick("100", OPEN + 59, 1), &cal, 5).unwrap();
        assert!(matches!(outcome, ApplyOutcome::DroppedOutOfOrder { .. }));
    }

    #[test]
    fn test_unbounded_tolerance_saturates() {
        let cal = calendar();
        let mut state = AggregatorState::new(key(Timeframe::M1)).unwrap();
        state.apply(&tick("100", OPEN + 30, 10), &cal, i64::MAX).unwrap();
        assert!(state.apply(&tick("100", OPEN + 31, 1), &cal, i64::MAX).unwrap().is_applied());
        assert_eq!(state.last_processed_timestamp(), Some(OPEN + 31));
    }

    #[test]
    fn test_unbucketable_price_rejected_before_rollover() {
        let cal = calendar();
        let tiny = FootprintKey::new(
            Symbol::new("NSE:NIFTY24JANFUT"),
            Timeframe::M5,
            BucketConfig::new(Decimal::new(1, 28), 1).unwrap(),
        );
        let mut state = AggregatorState::new(tiny).unwrap();
        state.apply(&tick("0.0001", OPEN + 10, 10), &cal, 0).unwrap();
        let before = state.snapshot();

        // next bin, price too large for the width
        let err = state.apply(&tick("19552", OPEN + 300, 5), &cal, 0).unwrap_err();
        assert!(matches!(err, TickError::PriceOutOfRange { .. }));
        assert_eq!(state.snapshot(), before);
        assert_eq!(state.last_processed_timestamp(), Some(OPEN + 10));
        assert_eq!(state.cumulative_volume(), 10);
    }

    #[test]
    fn test_session_reset() {
        let cal = calendar();
        let mut state = AggregatorState::new(key(Timeframe::M15)).unwrap();
        // 2024-01-14 15:29:59 IST
        state.apply(&tick("100", 1705226399, 40), &cal, 0).unwrap();
        assert_eq!(state.cumulative_volume(), 40);

        let a = applied(state.apply(&tick("100", OPEN, 3), &cal, 0).unwrap());
        assert!(a.session_reset);
        assert_eq!(a.finalized.unwrap().candle.cumulative_volume, 40);
        assert_eq!(a.update.candle.cumulative_volume, 3);
        // unchanged price: 2 buy, 1 sell
        assert_eq!(a.update.candle.cumulative_delta, 1);
    }

    #[test]
    fn test_reconcile_rederives_from_rows() {
        let cal = calendar();
        let mut state = AggregatorState::new(key(Timeframe::M5)).unwrap();
        state.apply(&tick("100", OPEN, 10), &cal, 0).unwrap();

        // corrupt the cached projection
        if let Some(candle) = state.candle.as_mut() {
            candle.volume += 3;
            candle.buy_volume += 3;
        }
        state.cumulative_volume += 3;
        state.cumulative_delta += 3;

        assert!(state.reconcile());
        let snap = state.snapshot().unwrap();
        assert!(snap.is_valid());
        assert_eq!(snap.volume, 10);
        assert_eq!(state.cumulative_volume(), 10);
        assert_eq!(state.cumulative_delta(), 0);
        assert!(!state.reconcile());
    }

    #[test]
    fn test_invalid_bucket_config_fails() {
        let bad = FootprintKey::new(
            Symbol::new("X"),
            Timeframe::M1,
            BucketConfig {
                tick_size: d("0.05"),
                multiplier: 0,
            },
        );
        assert_eq!(
            AggregatorState::new(bad).unwrap_err(),
            ConfigError::InvalidMultiplier(0)
        );
    }

    #[test]
    fn test_rows_sorted_descending() {
        let cal = calendar();
        let mut state = AggregatorState::new(key(Timeframe::D1)).unwrap();
        for (i, price) in ["100", "120", "110", "95"].iter().enumerate() {
            state.apply(&tick(price, OPEN + i as i64, 1), &cal, 0).unwrap();
        }
        let levels: Vec<Decimal> = state.snapshot().unwrap().rows.iter().map(|r| r.price_level).collect();
        assert_eq!(levels, vec![d("120.00"), d("110.00"), d("100.00"), d("95.00")]);
    }

    proptest! {
        #[test]
        fn prop_rows_always_match_totals(
            steps in prop::collection::vec((9_900i64..10_100, 0i64..120, 1u64..1_000), 1..200)
        ) {
            let cal = calendar();
            let mut state = AggregatorState::new(key(Timeframe::M1)).unwrap();
            let mut ts = OPEN;
            for (cents, gap, qty) in steps {
                ts += gap;
                let t = Tick::new(Symbol::new("NSE:NIFTY24JANFUT"), Decimal::new(cents, 2), ts, qty);
                if let ApplyOutcome::Applied(a) = state.apply(&t, &cal, 0).unwrap() {
                    prop_assert!(!a.reconciled);
                    prop_assert!(a.update.candle.is_valid());
                    if let Some(f) = a.finalized {
                        prop_assert!(f.candle.is_valid());
                    }
                }
            }
        }
    }
}
