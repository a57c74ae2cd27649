//! Trade tick delivered by the market data feed
//!
//! A `Tick` is constructed at the ingestion boundary, classified and
//! aggregated synchronously, then discarded.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::TickError;
use crate::ids::{Symbol, TradeId};

/// A single trade print together with the quote and book state at print time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tick {
    pub symbol: Symbol,
    /// Last traded price
    pub price: Decimal,
    /// Exchange timestamp (Unix seconds)
    pub timestamp: i64,
    /// Quantity traded in this print
    pub quantity: u64,
    /// Cumulative session volume as reported by the feed
    pub cumulative_volume: Option<u64>,
    /// Best bid at print time
    pub bid: Option<Decimal>,
    /// Best ask at print time
    pub ask: Option<Decimal>,
    /// Total resting buy quantity in the book
    pub total_buy_qty: u64,
    /// Total resting sell quantity in the book
    pub total_sell_qty: u64,
    pub trade_id: Option<TradeId>,
}

impl Tick {
    /// Create a tick with no quote or book information.
    pub fn new(symbol: Symbol, price: Decimal, timestamp: i64, quantity: u64) -> Self {
        Self {
            symbol,
            price,
            timestamp,
            quantity,
            cumulative_volume: None,
            bid: None,
            ask: None,
            total_buy_qty: 0,
            total_sell_qty: 0,
            trade_id: None,
        }
    }

    /// Attach the best bid/ask.
    pub fn with_quote(mut self, bid: Decimal, ask: Decimal) -> Self {
        self.bid = Some(bid);
        self.ask = Some(ask);
        self
    }

    /// Attach total resting buy/sell quantities.
    pub fn with_book(mut self, total_buy_qty: u64, total_sell_qty: u64) -> Self {
        self.total_buy_qty = total_buy_qty;
        self.total_sell_qty = total_sell_qty;
        self
    }

    pub fn with_cumulative_volume(mut self, volume: u64) -> Self {
        self.cumulative_volume = Some(volume);
        self
    }

    pub fn with_trade_id(mut self, trade_id: TradeId) -> Self {
        self.trade_id = Some(trade_id);
        self
    }

    /// Check the tick invariants: price > 0, quantity > 0, timestamp > 0.
    pub fn validate(&self) -> Result<(), TickError> {
        if self.price <= Decimal::ZERO {
            return Err(TickError::NonPositivePrice(self.price.to_string()));
        }
        if self.quantity == 0 {
            return Err(TickError::NonPositiveQuantity);
        }
        if self.timestamp <= 0 {
            return Err(TickError::InvalidTimestamp(self.timestamp.to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tick(price: &str, quantity: u64) -> Tick {
        Tick::new(
            Symbol::new("NSE:NIFTY24JANFUT"),
            Decimal::from_str_exact(price).unwrap(),
            1705290300,
            quantity,
        )
    }

    #[test]
    fn test_valid_tick() {
        assert!(tick("19552.30", 50).validate().is_ok());
    }

    #[test]
    fn test_zero_quantity_rejected() {
        assert_eq!(tick("19552.30", 0).validate(), Err(TickError::NonPositiveQuantity));
    }

    #[test]
    fn test_non_positive_price_rejected() {
        assert!(matches!(
            tick("0", 10).validate(),
            Err(TickError::NonPositivePrice(_))
        ));
        assert!(tick("-5.00", 10).validate().is_err());
    }

    #[test]
    fn test_builder() {
        let t = tick("100.00", 5)
            .with_quote(Decimal::from(99), Decimal::from(101))
            .with_book(10, 20)
            .with_cumulative_volume(1_000)
            .with_trade_id(TradeId::new("T1"));
        assert_eq!(t.bid, Some(Decimal::from(99)));
        assert_eq!(t.ask, Some(Decimal::from(101)));
        assert_eq!(t.total_buy_qty, 10);
        assert_eq!(t.total_sell_qty, 20);
        assert_eq!(t.cumulative_volume, Some(1_000));
        assert_eq!(t.trade_id.as_ref().map(|id| id.as_str()), Some("T1"));
    }
}
