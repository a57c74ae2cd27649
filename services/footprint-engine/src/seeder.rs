//! Historical seeding
//!
//! Builds a fresh `AggregatorState` from the last known candle of a key so
//! live aggregation continues the open candle and the session's cumulative
//! counters instead of restarting from zero. The registry only seeds keys
//! with no state; a seed never overwrites live state.
//!
//! Callers must finish seeding a key before delivering its live ticks.
//! Ticks that arrive first should be buffered by the caller. The engine
//! still works when seeding is skipped, but cumulative continuity is lost.

use std::collections::HashMap;

use rust_decimal::Decimal;
use tracing::{info, warn};
use types::bucket::FootprintKey;
use types::candle::FootprintCandle;
use types::errors::{EngineError, TickError};

use crate::aggregator::{AggregatorState, LevelVolume, OpenCandle};
use crate::classifier::MarketContext;
use crate::session::SessionCalendar;

/// Largest volume a seed may carry; keeps every signed delta representable.
const SEED_VOLUME_LIMIT: u64 = i64::MAX as u64;

/// What seeding did to a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedOutcome {
    Seeded {
        /// Seed was from the current session, so its cumulative counters were kept
        cumulative_carried: bool,
        /// Seed totals and rows disagreed and were repaired
        reconciled: bool,
    },
    /// The key already had state; nothing changed
    AlreadyActive,
}

/// Build a state primed with `seed` as its open candle. `now` decides
/// whether the seed's cumulative counters belong to the current session.
pub fn seeded_state(
    key: FootprintKey,
    seed: &FootprintCandle,
    calendar: &SessionCalendar,
    now: i64,
) -> Result<(AggregatorState, SeedOutcome), EngineError> {
    let mut state = AggregatorState::new(key)?;

    if seed.close <= Decimal::ZERO || seed.open <= Decimal::ZERO {
        return Err(TickError::NonPositivePrice(seed.close.min(seed.open).to_string()).into());
    }
    if seed.interval_start <= 0 {
        return Err(TickError::InvalidTimestamp(seed.interval_start.to_string()).into());
    }
    check_volumes(seed)?;

    let interval_start = calendar.bin_start(seed.interval_start, state.key.timeframe);
    let mut candle = OpenCandle {
        interval_start,
        open: seed.open,
        high: seed.high.max(seed.open).max(seed.close),
        low: seed.low.min(seed.open).min(seed.close),
        close: seed.close,
        volume: seed.volume,
        buy_volume: 0,
        sell_volume: 0,
        rows: HashMap::new(),
    };
    if candle.high != seed.high || candle.low != seed.low {
        warn!(key = %state.key, "Seed candle OHLC out of order, widened high/low");
    }

    for row in &seed.rows {
        let level = state.bucketer.bucket(row.price_level)?;
        let entry = candle.rows.entry(level).or_default();
        entry.buy += row.buy_volume;
        entry.sell += row.sell_volume;
    }

    let (buy, sell) = split_to_volume(seed);
    let reconciled = fill_rows(&mut candle, buy, sell, state.bucketer.bucket(seed.close)?);
    let (row_buy, row_sell) = candle.row_totals();
    candle.buy_volume = row_buy;
    candle.sell_volume = row_sell;
    candle.volume = row_buy + row_sell;
    let reconciled = reconciled || candle.volume != seed.volume || row_buy != seed.buy_volume;

    let seed_session = calendar.session_open(interval_start);
    let now_session = calendar.session_open(now);
    let cumulative_carried = seed_session == now_session;
    if cumulative_carried {
        let delta = row_buy as i64 - row_sell as i64;
        state.cumulative_delta = delta
            .checked_sub(seed.delta)
            .and_then(|adjustment| seed.cumulative_delta.checked_add(adjustment))
            .ok_or(TickError::VolumeOverflow("seed cumulative delta"))?;
        state.cumulative_volume = seed
            .cumulative_volume
            .saturating_add_signed(candle.volume as i64 - seed.volume as i64);
    }

    state.session_anchor = Some(now_session);
    state.last_processed_timestamp = Some(interval_start);
    state.previous = MarketContext {
        last_price: Some(seed.close),
        bid: None,
        ask: None,
    };
    state.candle = Some(candle);

    info!(
        key = %state.key,
        interval_start,
        cumulative_carried,
        cumulative_volume = state.cumulative_volume,
        reconciled,
        "Aggregator seeded from historical candle"
    );

    Ok((
        state,
        SeedOutcome::Seeded {
            cumulative_carried,
            reconciled,
        },
    ))
}

/// Reject seeds whose volumes cannot be summed. Row totals plus the scalar
/// volume must stay within `SEED_VOLUME_LIMIT`, which bounds every repaired
/// level and total.
fn check_volumes(seed: &FootprintCandle) -> Result<(), TickError> {
    let rows = seed
        .rows
        .iter()
        .try_fold(0u64, |acc, row| acc.checked_add(row.buy_volume)?.checked_add(row.sell_volume))
        .ok_or(TickError::VolumeOverflow("seed rows"))?;
    let within = |total: Option<u64>| total.map_or(false, |total| total <= SEED_VOLUME_LIMIT);
    if !within(rows.checked_add(seed.volume)) {
        return Err(TickError::VolumeOverflow("seed volume"));
    }
    if !within(seed.buy_volume.checked_add(seed.sell_volume)) {
        return Err(TickError::VolumeOverflow("seed buy/sell split"));
    }
    if seed.cumulative_volume > SEED_VOLUME_LIMIT {
        return Err(TickError::VolumeOverflow("seed cumulative volume"));
    }
    Ok(())
}

/// Buy/sell totals that sum to the seed's volume.
fn split_to_volume(seed: &FootprintCandle) -> (u64, u64) {
    let (buy, sell, volume) = (seed.buy_volume, seed.sell_volume, seed.volume);
    let assigned = buy + sell;
    if assigned == volume {
        return (buy, sell);
    }
    if assigned > volume {
        return proportional_split(volume, buy, sell);
    }

    let missing = volume - assigned;
    if assigned == 0 {
        if seed.close > seed.open {
            (missing, 0)
        } else if seed.close < seed.open {
            (0, missing)
        } else {
            let sell_share = missing / 2;
            (missing - sell_share, sell_share)
        }
    } else {
        let (add_buy, add_sell) = proportional_split(missing, buy, sell);
        (buy + add_buy, sell + add_sell)
    }
}

/// Split `total` between two weights with largest-remainder rounding.
/// Ties go to buy.
pub(crate) fn proportional_split(total: u64, buy_weight: u64, sell_weight: u64) -> (u64, u64) {
    let weight = u128::from(buy_weight) + u128::from(sell_weight);
    if weight == 0 {
        let sell = total / 2;
        return (total - sell, sell);
    }
    let scaled_buy = u128::from(total) * u128::from(buy_weight);
    let scaled_sell = u128::from(total) * u128::from(sell_weight);
    let mut buy = (scaled_buy / weight) as u64;
    let mut sell = (scaled_sell / weight) as u64;
    if buy + sell < total {
        if scaled_buy % weight >= scaled_sell % weight {
            buy += 1;
        } else {
            sell += 1;
        }
    }
    (buy, sell)
}

/// Top up rows that fall short of the candle totals. The shortfall goes to
/// the busiest level, or to the close's level when there are no rows.
/// Rows above the totals are left alone and win.
fn fill_rows(candle: &mut OpenCandle, target_buy: u64, target_sell: u64, close_level: Decimal) -> bool {
    let (row_buy, row_sell) = candle.row_totals();
    let missing_buy = target_buy.saturating_sub(row_buy);
    let missing_sell = target_sell.saturating_sub(row_sell);
    if missing_buy == 0 && missing_sell == 0 {
        return false;
    }

    let level = candle
        .rows
        .iter()
        .max_by(|(pa, a), (pb, b)| a.total().cmp(&b.total()).then(pb.cmp(pa)))
        .map(|(price, _)| *price)
        .unwrap_or(close_level);
    let row = candle.rows.entry(level).or_insert_with(LevelVolume::default);
    row.buy += missing_buy;
    row.sell += missing_sell;
    true
}
