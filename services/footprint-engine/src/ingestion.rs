//! Feed normalisation
//!
//! Converts loosely typed feed messages into validated `Tick`s:
//! - timestamps in s/ms/us/ns (by magnitude) or ISO-8601 become Unix seconds
//! - the traded quantity is derived from the day's cumulative volume when present
//! - repeated trades inside a bounded per-symbol window are dropped
//! - the first live message echoing a seed's cumulative volume is suppressed
//!
//! Malformed messages are rejected with `TickError` and never reach an
//! aggregator.

use std::collections::{HashMap, VecDeque};
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};
use types::errors::{ConfigError, TickError};
use types::ids::{Symbol, TradeId};
use types::tick::Tick;

use crate::config::EngineConfig;
use crate::metrics::EngineMetrics;

const NS_THRESHOLD: i128 = 1_000_000_000_000_000_000;
const US_THRESHOLD: i128 = 1_000_000_000_000_000;
const MS_THRESHOLD: i128 = 1_000_000_000_000;

/// A feed message as received. Every field is optional and numeric fields
/// may arrive as JSON numbers or numeric strings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawTick {
    #[serde(default)]
    pub symbol: Option<Value>,
    #[serde(default)]
    pub ltp: Option<Value>,
    #[serde(default)]
    pub exch_feed_time: Option<Value>,
    #[serde(default)]
    pub last_traded_time: Option<Value>,
    #[serde(default)]
    pub last_traded_qty: Option<Value>,
    #[serde(default)]
    pub vol_traded_today: Option<Value>,
    #[serde(default)]
    pub bid_price: Option<Value>,
    #[serde(default)]
    pub ask_price: Option<Value>,
    #[serde(default)]
    pub tot_buy_qty: Option<Value>,
    #[serde(default)]
    pub tot_sell_qty: Option<Value>,
    #[serde(default)]
    pub trade_id: Option<Value>,
}

/// Outcome of normalising one well-formed message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestionResult {
    /// Ready to apply
    Accepted(Tick),
    /// Same trade seen within the dedup window
    Duplicate,
    /// Message carried no tradeable volume (quote-only update)
    NoTradedVolume,
    /// Cumulative volume equal to the seed's; already counted
    SeedEcho,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Fingerprint {
    timestamp: i64,
    price: Decimal,
    quantity: u64,
    trade_id: Option<String>,
}

#[derive(Debug, Default)]
struct FeedState {
    last_cumulative: Option<u64>,
    seeded_cumulative: Option<u64>,
    recent: VecDeque<Fingerprint>,
}

/// Per-symbol feed normaliser.
pub struct TickNormalizer {
    offset: FixedOffset,
    dedup_window: usize,
    max_trade_quantity: u64,
    max_cumulative_jump: u64,
    feeds: HashMap<Symbol, FeedState>,
    metrics: Arc<EngineMetrics>,
}

impl TickNormalizer {
    pub fn new(config: &EngineConfig, metrics: Arc<EngineMetrics>) -> Result<Self, ConfigError> {
        config.validate()?;
        info!(
            dedup_window = config.dedup_window,
            max_trade_quantity = config.max_trade_quantity,
            "TickNormalizer initialized"
        );
        Ok(Self {
            offset: config.session.offset()?,
            dedup_window: config.dedup_window,
            max_trade_quantity: config.max_trade_quantity,
            max_cumulative_jump: config.max_cumulative_jump,
            feeds: HashMap::new(),
            metrics,
        })
    }

    /// Anchor `symbol`'s cumulative tracker to a seed's cumulative volume.
    /// The next message repeating that value is treated as an echo.
    pub fn anchor_cumulative(&mut self, symbol: &Symbol, cumulative_volume: u64) {
        let feed = self.feeds.entry(symbol.clone()).or_default();
        feed.last_cumulative = Some(cumulative_volume);
        feed.seeded_cumulative = Some(cumulative_volume);
        debug!(symbol = %symbol, cumulative_volume, "Cumulative volume anchored to seed");
    }

    /// Forget everything tracked for `symbol`.
    pub fn reset(&mut self, symbol: &Symbol) {
        self.feeds.remove(symbol);
    }

    /// Normalise one message. Errors mean the message was malformed.
    pub fn normalize(&mut self, raw: &RawTick) -> Result<IngestionResult, TickError> {
        let result = self.normalize_inner(raw);
        match &result {
            Err(err) => {
                self.metrics.record_malformed();
                warn!(error = %err, "Malformed feed message dropped");
            }
            Ok(IngestionResult::Duplicate) => self.metrics.record_duplicate(),
            Ok(IngestionResult::SeedEcho) => self.metrics.record_seed_echo(),
            Ok(_) => {}
        }
        result
    }

    fn normalize_inner(&mut self, raw: &RawTick) -> Result<IngestionResult, TickError> {
        let symbol = raw
            .symbol
            .as_ref()
            .and_then(Value::as_str)
            .and_then(|s| Symbol::try_new(s.trim()))
            .ok_or(TickError::MissingSymbol)?;

        let price = match raw.ltp.as_ref().filter(|v| !v.is_null()) {
            Some(value) => parse_decimal("ltp", value)?,
            None => return Err(TickError::MissingField("ltp")),
        };
        if price <= Decimal::ZERO {
            return Err(TickError::NonPositivePrice(price.to_string()));
        }

        let raw_time = present(&raw.exch_feed_time)
            .or_else(|| present(&raw.last_traded_time))
            .ok_or(TickError::MissingField("exch_feed_time"))?;
        let timestamp = normalize_timestamp(raw_time, self.offset)?;

        let print_qty = parse_quantity("last_traded_qty", raw.last_traded_qty.as_ref())?;
        let cumulative = parse_quantity("vol_traded_today", raw.vol_traded_today.as_ref())?;

        let max_jump = self.max_cumulative_jump;
        let feed = self.feeds.entry(symbol.clone()).or_default();

        if let (Some(seeded), Some(cum)) = (feed.seeded_cumulative, cumulative) {
            if seeded == cum {
                debug!(symbol = %symbol, cumulative_volume = cum, "Seed echo suppressed");
                return Ok(IngestionResult::SeedEcho);
            }
            feed.seeded_cumulative = None;
        }

        let quantity = resolve_quantity(feed, print_qty, cumulative, max_jump);
        if quantity == 0 {
            return Ok(IngestionResult::NoTradedVolume);
        }
        if quantity > self.max_trade_quantity {
            return Err(TickError::QuantityOutOfRange {
                quantity,
                limit: self.max_trade_quantity,
            });
        }

        let trade_id = raw.trade_id.as_ref().and_then(|v| match v {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        });

        let fingerprint = Fingerprint {
            timestamp,
            price,
            quantity,
            trade_id: trade_id.clone(),
        };
        if feed.recent.contains(&fingerprint) {
            debug!(symbol = %symbol, timestamp, quantity, "Dropping duplicate trade");
            return Ok(IngestionResult::Duplicate);
        }
        if feed.recent.len() >= self.dedup_window {
            feed.recent.pop_front();
        }
        feed.recent.push_back(fingerprint);

        let mut tick = Tick::new(symbol, price, timestamp, quantity).with_book(
            parse_quantity("tot_buy_qty", raw.tot_buy_qty.as_ref())?.unwrap_or(0),
            parse_quantity("tot_sell_qty", raw.tot_sell_qty.as_ref())?.unwrap_or(0),
        );
        if let Some(cum) = cumulative {
            tick = tick.with_cumulative_volume(cum);
        }
        tick.bid = quote_price(raw.bid_price.as_ref());
        tick.ask = quote_price(raw.ask_price.as_ref());
        if let Some(id) = trade_id {
            tick = tick.with_trade_id(TradeId::new(id));
        }
        Ok(IngestionResult::Accepted(tick))
    }
}

/// Traded quantity for this message. Prefers the jump in cumulative day
/// volume; falls back to the raw print on first sight, feed resets and
/// implausible jumps. Zero means nothing traded.
fn resolve_quantity(feed: &mut FeedState, print_qty: Option<u64>, cumulative: Option<u64>, max_jump: u64) -> u64 {
    let print = print_qty.unwrap_or(0);
    let Some(current) = cumulative else {
        return print;
    };

    let Some(last) = feed.last_cumulative else {
        feed.last_cumulative = Some(current);
        return print;
    };

    if current < last {
        warn!(last_cumulative = last, current_cumulative = current, "Cumulative volume reset");
        feed.last_cumulative = Some(current);
        return print;
    }

    let jump = current - last;
    if jump == 0 || jump > max_jump {
        if print > 0 {
            feed.last_cumulative = Some(current);
        }
        return print;
    }

    feed.last_cumulative = Some(current);
    jump
}

fn present(value: &Option<Value>) -> Option<&Value> {
    value.as_ref().filter(|v| match v {
        Value::Null => false,
        Value::Number(n) => n.as_f64().map_or(true, |f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        _ => true,
    })
}

/// Parse a JSON number or numeric string as a `Decimal`.
pub fn parse_decimal(field: &'static str, value: &Value) -> Result<Decimal, TickError> {
    let text = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        other => {
            return Err(TickError::NonNumeric {
                field,
                value: other.to_string(),
            })
        }
    };
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .map_err(|_| TickError::NonNumeric { field, value: text })
}

/// Non-negative integer quantity. Absent, null and non-positive values are `None`.
fn parse_quantity(field: &'static str, value: Option<&Value>) -> Result<Option<u64>, TickError> {
    let Some(value) = value.filter(|v| !v.is_null()) else {
        return Ok(None);
    };
    let amount = parse_decimal(field, value)?.trunc();
    if amount <= Decimal::ZERO {
        return Ok(None);
    }
    u64::try_from(amount).map(Some).map_err(|_| TickError::NonNumeric {
        field,
        value: amount.to_string(),
    })
}

/// Best bid/ask. Junk or non-positive quotes count as no quote.
fn quote_price(value: Option<&Value>) -> Option<Decimal> {
    value
        .filter(|v| !v.is_null())
        .and_then(|v| parse_decimal("quote", v).ok())
        .filter(|p| *p > Decimal::ZERO)
}

/// Interpret an epoch value by magnitude: >= 1e18 ns, >= 1e15 us,
/// >= 1e12 ms, otherwise seconds.
pub fn normalize_epoch(raw: i128) -> Option<i64> {
    if raw <= 0 {
        return None;
    }
    let secs = if raw >= NS_THRESHOLD {
        raw / 1_000_000_000
    } else if raw >= US_THRESHOLD {
        raw / 1_000_000
    } else if raw >= MS_THRESHOLD {
        raw / 1_000
    } else {
        raw
    };
    i64::try_from(secs).ok()
}

/// Feed timestamp to Unix seconds. Offset-less ISO strings are read in the
/// market timezone.
pub fn normalize_timestamp(value: &Value, market: FixedOffset) -> Result<i64, TickError> {
    let invalid = || TickError::InvalidTimestamp(value.to_string());

    if let Value::String(s) = value {
        let s = s.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Ok(dt.timestamp());
        }
        for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
            if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
                return market
                    .from_local_datetime(&naive)
                    .single()
                    .map(|dt| dt.timestamp())
                    .ok_or_else(invalid);
            }
        }
    }

    let epoch = parse_decimal("timestamp", value).map_err(|_| invalid())?.trunc();
    let raw = i128::try_from(epoch).map_err(|_| invalid())?;
    normalize_epoch(raw).ok_or_else(invalid)
}
