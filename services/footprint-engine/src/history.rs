//! Historical resampling
//!
//! Turns lower-resolution OHLCV bars into footprint candles, typically to
//! produce the last known candle for seeding. Bars are binned with the same
//! session-anchored alignment as live ticks. When a bar carries no aggressor
//! split, its whole volume is attributed by candle direction, falling back
//! to the move from the previous bar's close.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use types::candle::FootprintCandle;
use types::timeframe::Timeframe;

use crate::aggregator::OpenCandle;
use crate::bucketer::PriceBucketer;
use crate::seeder::proportional_split;
use crate::session::SessionCalendar;

/// One historical OHLCV bar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoricalBar {
    /// Bar start (Unix seconds)
    pub timestamp: i64,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: u64,
    #[serde(default)]
    pub buy_volume: Option<u64>,
    #[serde(default)]
    pub sell_volume: Option<u64>,
}

impl HistoricalBar {
    pub fn new(timestamp: i64, open: Decimal, high: Decimal, low: Decimal, close: Decimal, volume: u64) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
            buy_volume: None,
            sell_volume: None,
        }
    }

    pub fn with_split(mut self, buy_volume: u64, sell_volume: u64) -> Self {
        self.buy_volume = Some(buy_volume);
        self.sell_volume = Some(sell_volume);
        self
    }
}

/// Bars above this volume are skipped so candle deltas stay representable.
const BAR_VOLUME_LIMIT: u64 = i64::MAX as u64;

/// (buy, sell) for one bar, always summing to its volume.
fn split_bar(bar: &HistoricalBar, previous_close: Option<Decimal>) -> (u64, u64) {
    if let (Some(buy), Some(sell)) = (bar.buy_volume, bar.sell_volume) {
        if buy.checked_add(sell) == Some(bar.volume) {
            return (buy, sell);
        }
        if buy > 0 || sell > 0 {
            return proportional_split(bar.volume, buy, sell);
        }
    }

    let volume = bar.volume;
    let reference = if bar.close != bar.open {
        Some(bar.open)
    } else {
        previous_close
    };
    match reference {
        Some(r) if bar.close > r => (volume, 0),
        Some(r) if bar.close < r => (0, volume),
        _ => {
            let sell = volume / 2;
            (volume - sell, sell)
        }
    }
}

/// Resample `bars` into footprint candles for `timeframe`, oldest first.
/// Cumulative delta and volume accumulate per session and reset at each
/// session boundary.
pub fn resample(
    bars: &[HistoricalBar],
    timeframe: Timeframe,
    bucketer: &PriceBucketer,
    calendar: &SessionCalendar,
) -> Vec<FootprintCandle> {
    let mut ordered: Vec<&HistoricalBar> = bars
        .iter()
        .filter(|bar| {
            let sane = bar.timestamp > 0
                && bar.open > Decimal::ZERO
                && bar.close > Decimal::ZERO
                && bar.volume <= BAR_VOLUME_LIMIT;
            if !sane {
                warn!(timestamp = bar.timestamp, "Skipping malformed historical bar");
            }
            sane
        })
        .collect();
    ordered.sort_by_key(|bar| bar.timestamp);

    let mut candles: Vec<FootprintCandle> = Vec::new();
    let mut current: Option<OpenCandle> = None;
    let mut previous_close: Option<Decimal> = None;
    let mut session: Option<i64> = None;
    let mut cumulative_delta: i64 = 0;
    let mut cumulative_volume: u64 = 0;

    for bar in ordered {
        let level = match bucketer.bucket(bar.close) {
            Ok(level) => level,
            Err(err) => {
                warn!(timestamp = bar.timestamp, error = %err, "Skipping historical bar");
                continue;
            }
        };
        let bin = calendar.bin_start(bar.timestamp, timeframe);
        if current.as_ref().map_or(true, |c| c.interval_start != bin) {
            if let Some(done) = current.take() {
                candles.push(close_candle(&done, &mut cumulative_delta, &mut cumulative_volume));
            }
            let bar_session = calendar.session_open(bar.timestamp);
            if session != Some(bar_session) {
                cumulative_delta = 0;
                cumulative_volume = 0;
                session = Some(bar_session);
            }
            current = Some(OpenCandle {
                interval_start: bin,
                open: bar.open,
                high: bar.high.max(bar.open).max(bar.close),
                low: bar.low.min(bar.open).min(bar.close),
                close: bar.close,
                volume: 0,
                buy_volume: 0,
                sell_volume: 0,
                rows: HashMap::new(),
            });
        }

        let (buy, sell) = split_bar(bar, previous_close);
        if let Some(candle) = current.as_mut() {
            candle.high = candle.high.max(bar.high).max(bar.close);
            candle.low = candle.low.min(bar.low).min(bar.close);
            candle.close = bar.close;
            candle.buy_volume = candle.buy_volume.saturating_add(buy);
            candle.sell_volume = candle.sell_volume.saturating_add(sell);
            candle.volume = candle.volume.saturating_add(bar.volume);
            if bar.volume > 0 {
                let row = candle.rows.entry(level).or_default();
                row.buy = row.buy.saturating_add(buy);
                row.sell = row.sell.saturating_add(sell);
            }
        }
        previous_close = Some(bar.close);
    }

    if let Some(done) = current.take() {
        candles.push(close_candle(&done, &mut cumulative_delta, &mut cumulative_volume));
    }

    debug!(bars = bars.len(), candles = candles.len(), timeframe = %timeframe, "Historical bars resampled");
    candles
}

fn close_candle(candle: &OpenCandle, cumulative_delta: &mut i64, cumulative_volume: &mut u64) -> FootprintCandle {
    let buy = i64::try_from(candle.buy_volume).unwrap_or(i64::MAX);
    let sell = i64::try_from(candle.sell_volume).unwrap_or(i64::MAX);
    *cumulative_delta = cumulative_delta.saturating_add(buy - sell);
    *cumulative_volume = cumulative_volume.saturating_add(candle.volume);
    candle.to_candle(*cumulative_delta, *cumulative_volume)
}
