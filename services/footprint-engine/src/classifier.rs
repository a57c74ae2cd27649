//! Aggressor classification
//!
//! Rules are tried in a fixed priority order and the first that applies
//! wins:
//!
//! 1. Spread: price at/above the ask is a buy, at/below the bid is a sell.
//! 2. Book pressure: strictly inside the spread, the heavier resting side wins.
//!    Equal pressure falls through.
//! 3. Price direction against the previous print for the same key. An
//!    unchanged price splits 50/50 with the odd unit going to buy.
//!
//! The spread and book tests only run against a sane quote (`0 < bid <= ask`).
//! Every rule returns a split whose sides sum to the tick quantity.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use types::tick::Tick;

/// Which rule produced a classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClassificationRule {
    AtOrAboveAsk,
    AtOrBelowBid,
    BookPressureBuy,
    BookPressureSell,
    PriceUp,
    PriceDown,
    Unchanged,
}

/// Buy/sell partition of one tick's quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub rule: ClassificationRule,
    pub buy_volume: u64,
    pub sell_volume: u64,
}

impl Classification {
    fn buy(rule: ClassificationRule, quantity: u64) -> Self {
        Self {
            rule,
            buy_volume: quantity,
            sell_volume: 0,
        }
    }

    fn sell(rule: ClassificationRule, quantity: u64) -> Self {
        Self {
            rule,
            buy_volume: 0,
            sell_volume: quantity,
        }
    }

    fn split(quantity: u64) -> Self {
        let sell_volume = quantity / 2;
        Self {
            rule: ClassificationRule::Unchanged,
            buy_volume: quantity - sell_volume,
            sell_volume,
        }
    }

    pub fn total(&self) -> u64 {
        self.buy_volume + self.sell_volume
    }

    /// buy - sell
    pub fn delta(&self) -> i64 {
        self.buy_volume as i64 - self.sell_volume as i64
    }
}

/// Market state remembered from the previous accepted tick of a key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarketContext {
    pub last_price: Option<Decimal>,
    pub bid: Option<Decimal>,
    pub ask: Option<Decimal>,
}

impl MarketContext {
    /// Context after `tick`: its price, and its quote if it carried one.
    pub fn advance(&self, tick: &Tick) -> Self {
        Self {
            last_price: Some(tick.price),
            bid: tick.bid.or(self.bid),
            ask: tick.ask.or(self.ask),
        }
    }
}

/// Classify `tick` given the previous context for its key.
pub fn classify(tick: &Tick, previous: &MarketContext) -> Classification {
    let quantity = tick.quantity;
    let quote = match (tick.bid.or(previous.bid), tick.ask.or(previous.ask)) {
        (Some(bid), Some(ask)) if bid > Decimal::ZERO && bid <= ask => Some((bid, ask)),
        _ => None,
    };

    quote
        .and_then(|(bid, ask)| spread_rule(tick, bid, ask))
        .or_else(|| quote.and_then(|(bid, ask)| book_pressure_rule(tick, bid, ask)))
        .unwrap_or_else(|| direction_rule(tick.price, previous.last_price, quantity))
}

fn spread_rule(tick: &Tick, bid: Decimal, ask: Decimal) -> Option<Classification> {
    if tick.price >= ask {
        Some(Classification::buy(ClassificationRule::AtOrAboveAsk, tick.quantity))
    } else if tick.price <= bid {
        Some(Classification::sell(ClassificationRule::AtOrBelowBid, tick.quantity))
    } else {
        None
    }
}

fn book_pressure_rule(tick: &Tick, bid: Decimal, ask: Decimal) -> Option<Classification> {
    if !(bid < tick.price && tick.price < ask) {
        return None;
    }
    match tick.total_buy_qty.cmp(&tick.total_sell_qty) {
        std::cmp::Ordering::Greater => {
            Some(Classification::buy(ClassificationRule::BookPressureBuy, tick.quantity))
        }
        std::cmp::Ordering::Less => {
            Some(Classification::sell(ClassificationRule::BookPressureSell, tick.quantity))
        }
        std::cmp::Ordering::Equal => None,
    }
}

fn direction_rule(price: Decimal, last_price: Option<Decimal>, quantity: u64) -> Classification {
    match last_price {
        Some(last) if price > last => Classification::buy(ClassificationRule::PriceUp, quantity),
        Some(last) if price < last => Classification::sell(ClassificationRule::PriceDown, quantity),
        _ => Classification::split(quantity),
    }
}
