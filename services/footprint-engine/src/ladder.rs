//! Dense footprint ladder
//!
//! Expands a candle's sparse rows into every level between the bucketed
//! low and high, zero-filling untraded levels. Ladders wider than the
//! configured limit are windowed around the point of control.

use std::collections::HashMap;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::warn;
use types::candle::{FootprintCandle, PriceLevelRow};
use types::numeric::round_price;

use crate::bucketer::PriceBucketer;

/// Level with the greatest buy + sell volume. Ties go to the higher price.
pub fn point_of_control(candle: &FootprintCandle) -> Option<Decimal> {
    candle
        .rows
        .iter()
        .max_by(|a, b| a.total().cmp(&b.total()).then(a.price_level.cmp(&b.price_level)))
        .map(|row| row.price_level)
}

/// Contiguous ladder, sorted descending by price. Falls back to the sparse
/// rows when the range cannot be walked in `Decimal`.
pub fn build_ladder(candle: &FootprintCandle, bucketer: &PriceBucketer, max_levels: usize) -> Vec<PriceLevelRow> {
    match dense_ladder(candle, bucketer, max_levels) {
        Some(ladder) => ladder,
        None => {
            warn!(low = %candle.low, high = %candle.high, "Ladder range not representable, returning sparse rows");
            candle.rows.clone()
        }
    }
}

fn dense_ladder(candle: &FootprintCandle, bucketer: &PriceBucketer, max_levels: usize) -> Option<Vec<PriceLevelRow>> {
    let step = bucketer.step();
    let low = bucketer.bucket(candle.low).ok()?;
    let high = bucketer.bucket(candle.high).ok()?;
    let traded: HashMap<Decimal, &PriceLevelRow> = candle
        .rows
        .iter()
        .map(|row| (round_price(row.price_level), row))
        .collect();

    let span = high
        .checked_sub(low)?
        .checked_div(step)?
        .floor()
        .to_usize()?
        .checked_add(1)?;

    let (top, levels) = if span > max_levels && max_levels > 0 {
        let poc = match point_of_control(candle) {
            Some(poc) => poc,
            None => bucketer.bucket(candle.close).ok()?,
        };
        let half = Decimal::from(max_levels / 2).checked_mul(step)?;
        let mut top = poc.checked_add(half)?.min(high);
        let window = Decimal::from(max_levels - 1).checked_mul(step)?;
        if top.checked_sub(window)? < low {
            top = low.checked_add(window)?;
        }
        warn!(
            span,
            max_levels,
            poc = %poc,
            "Ladder exceeds level limit, windowing around point of control"
        );
        (top, max_levels)
    } else {
        (high, span)
    };

    let mut ladder: Vec<PriceLevelRow> = Vec::with_capacity(levels);
    for i in 0..levels {
        let offset = Decimal::from(i).checked_mul(step)?;
        let level = round_price(top.checked_sub(offset)?);
        if ladder.last().map(|row| row.price_level) == Some(level) {
            continue;
        }
        let row = traded
            .get(&level)
            .map(|row| PriceLevelRow::new(level, row.buy_volume, row.sell_volume))
            .unwrap_or_else(|| PriceLevelRow::new(level, 0, 0));
        ladder.push(row);
    }
    Some(ladder)
}
