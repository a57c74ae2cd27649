//! Footprint candle snapshots
//!
//! The shape published to subscribers and accepted back as a seed. Field
//! names on the wire follow the legacy chart protocol (`time`, `buy_vol`,
//! `cum_delta`, `footprint[].priceLevel`, ...).

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::bucket::FootprintKey;

/// Buy/sell volume traded inside one price level of a candle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceLevelRow {
    #[serde(rename = "priceLevel", alias = "price")]
    pub price_level: Decimal,
    #[serde(rename = "buyVolume", alias = "buy")]
    pub buy_volume: u64,
    #[serde(rename = "sellVolume", alias = "sell")]
    pub sell_volume: u64,
}

impl PriceLevelRow {
    pub fn new(price_level: Decimal, buy_volume: u64, sell_volume: u64) -> Self {
        Self {
            price_level,
            buy_volume,
            sell_volume,
        }
    }

    /// buy + sell at this level.
    pub fn total(&self) -> u64 {
        self.buy_volume + self.sell_volume
    }
}

/// A footprint candle: OHLCV plus per-level aggressor volume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FootprintCandle {
    /// Aligned interval start (Unix seconds)
    #[serde(rename = "time", alias = "timestamp")]
    pub interval_start: i64,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: u64,
    #[serde(rename = "buy_vol")]
    pub buy_volume: u64,
    #[serde(rename = "sell_vol")]
    pub sell_volume: u64,
    pub delta: i64,
    #[serde(rename = "cum_delta", default)]
    pub cumulative_delta: i64,
    #[serde(rename = "cum_volume", default)]
    pub cumulative_volume: u64,
    /// Price level rows, sorted descending by price
    #[serde(rename = "footprint", default)]
    pub rows: Vec<PriceLevelRow>,
}

impl FootprintCandle {
    /// Sum of buy + sell across all rows.
    pub fn row_volume(&self) -> u64 {
        self.rows.iter().map(PriceLevelRow::total).sum()
    }

    /// Validate candle integrity (OHLC ordering, delta, row conservation).
    pub fn is_valid(&self) -> bool {
        self.high >= self.open
            && self.high >= self.close
            && self.high >= self.low
            && self.low <= self.open
            && self.low <= self.close
            && self.delta == self.buy_volume as i64 - self.sell_volume as i64
            && self.volume == self.buy_volume + self.sell_volume
            && self.volume == self.row_volume()
    }
}

/// Lifecycle of an emitted snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CandleStatus {
    /// Still accumulating within its interval
    Open,
    /// Interval rolled over; no further updates
    Finalized,
}

/// A read-only candle snapshot handed to the publisher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandleUpdate {
    pub key: FootprintKey,
    pub status: CandleStatus,
    pub candle: FootprintCandle,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        Decimal::from_str_exact(s).unwrap()
    }

    fn sample() -> FootprintCandle {
        FootprintCandle {
            interval_start: 1705290300,
            open: d("19552.30"),
            high: d("19552.30"),
            low: d("19548.00"),
            close: d("19548.00"),
            volume: 125,
            buy_volume: 50,
            sell_volume: 75,
            delta: -25,
            cumulative_delta: -25,
            cumulative_volume: 125,
            rows: vec![
                PriceLevelRow::new(d("19550.00"), 50, 0),
                PriceLevelRow::new(d("19545.00"), 0, 75),
            ],
        }
    }

    #[test]
    fn test_valid_candle() {
        assert!(sample().is_valid());
        assert_eq!(sample().row_volume(), 125);
    }

    #[test]
    fn test_invalid_when_rows_disagree() {
        let mut candle = sample();
        candle.rows[0].buy_volume = 49;
        assert!(!candle.is_valid());
    }

    #[test]
    fn test_invalid_high_below_open() {
        let mut candle = sample();
        candle.high = d("19500.00");
        assert!(!candle.is_valid());
    }

    #[test]
    fn test_wire_field_names() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["time"], 1705290300);
        assert_eq!(json["buy_vol"], 50);
        assert_eq!(json["cum_delta"], -25);
        assert_eq!(json["footprint"][0]["priceLevel"], "19550.00");
        assert_eq!(json["footprint"][1]["sellVolume"], 75);
    }

    #[test]
    fn test_legacy_seed_shape_deserializes() {
        let json = r#"{
            "time": 1705290300, "open": 100.5, "high": 101, "low": 100, "close": 100.5,
            "volume": 10, "buy_vol": 6, "sell_vol": 4, "delta": 2,
            "footprint": [{"price": 100.0, "buy": 6, "sell": 4}]
        }"#;
        let candle: FootprintCandle = serde_json::from_str(json).unwrap();
        assert_eq!(candle.cumulative_volume, 0);
        assert_eq!(candle.rows[0].price_level, Decimal::from(100));
        assert!(candle.is_valid());
    }
}
