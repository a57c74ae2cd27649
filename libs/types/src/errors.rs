//! Error types for the footprint engine
//!
//! Comprehensive error taxonomy using thiserror

use thiserror::Error;

/// Top-level engine error
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Tick error: {0}")]
    Tick(#[from] TickError),
}

/// Configuration errors, surfaced at seed / first apply and at load time
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Invalid tick size: {0} (must be > 0)")]
    InvalidTickSize(String),

    #[error("Invalid multiplier: {0} (must be > 0)")]
    InvalidMultiplier(i64),

    #[error("Invalid timeframe: {0}")]
    InvalidTimeframe(String),

    #[error("Invalid session open time: {0}")]
    InvalidSessionOpen(String),

    #[error("Invalid UTC offset: {minutes} minutes")]
    InvalidUtcOffset { minutes: i32 },

    #[error("Invalid setting {name}: {reason}")]
    InvalidSetting { name: String, reason: String },

    #[error("IO error: {0}")]
    Io(String),

    #[error("JSON parse error: {0}")]
    Json(String),
}

/// Malformed tick errors. The tick is dropped and never mutates state.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TickError {
    #[error("Missing symbol")]
    MissingSymbol,

    #[error("Missing field: {0}")]
    MissingField(&'static str),

    #[error("Non-numeric value for {field}: {value}")]
    NonNumeric { field: &'static str, value: String },

    #[error("Non-positive price: {0}")]
    NonPositivePrice(String),

    #[error("Non-positive quantity")]
    NonPositiveQuantity,

    #[error("Quantity {quantity} exceeds limit {limit}")]
    QuantityOutOfRange { quantity: u64, limit: u64 },

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("Symbol mismatch: key {key}, tick {tick}")]
    SymbolMismatch { key: String, tick: String },

    #[error("Price {price} cannot be bucketed with width {width}")]
    PriceOutOfRange { price: String, width: String },

    #[error("Volume overflow in {0}")]
    VolumeOverflow(&'static str),
}
