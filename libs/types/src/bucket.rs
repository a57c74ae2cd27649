//! Bucket configuration and aggregator keys
//!
//! A price bucket is always described by the `(tick_size, multiplier)` pair.
//! The effective bucket width is derived on demand and never stored or
//! compared on its own, so two configurations are equal only when both knobs
//! are equal.

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;
use crate::ids::Symbol;
use crate::timeframe::Timeframe;

/// Price bucketing knobs for a footprint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BucketConfig {
    /// Instrument tick size (e.g. 0.05)
    pub tick_size: Decimal,
    /// Number of ticks per footprint level (e.g. 100)
    pub multiplier: i64,
}

impl BucketConfig {
    /// Create a validated bucket configuration.
    pub fn new(tick_size: Decimal, multiplier: i64) -> Result<Self, ConfigError> {
        let config = Self {
            tick_size,
            multiplier,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject non-positive tick sizes and multipliers.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_size <= Decimal::ZERO {
            return Err(ConfigError::InvalidTickSize(self.tick_size.to_string()));
        }
        if self.multiplier <= 0 {
            return Err(ConfigError::InvalidMultiplier(self.multiplier));
        }
        Ok(())
    }

    /// `tick_size * multiplier`, validated. Fails when the product is not
    /// representable.
    pub fn effective_size(&self) -> Result<Decimal, ConfigError> {
        self.validate()?;
        self.tick_size
            .checked_mul(Decimal::from(self.multiplier))
            .ok_or_else(|| ConfigError::InvalidSetting {
                name: "bucket".to_string(),
                reason: format!("{} x {} overflows", self.tick_size, self.multiplier),
            })
    }
}

impl fmt::Display for BucketConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.tick_size, self.multiplier)
    }
}

/// Identity of one aggregator record: (symbol, timeframe, bucket configuration).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FootprintKey {
    pub symbol: Symbol,
    pub timeframe: Timeframe,
    pub bucket: BucketConfig,
}

impl FootprintKey {
    pub fn new(symbol: Symbol, timeframe: Timeframe, bucket: BucketConfig) -> Self {
        Self {
            symbol,
            timeframe,
            bucket,
        }
    }
}

impl fmt::Display for FootprintKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}_{}_{}_{}",
            self.symbol, self.timeframe, self.bucket.tick_size, self.bucket.multiplier
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        Decimal::from_str_exact(s).unwrap()
    }

    #[test]
    fn test_effective_size() {
        let config = BucketConfig::new(d("0.05"), 100).unwrap();
        assert_eq!(config.effective_size().unwrap(), d("5.00"));
    }

    #[test]
    fn test_rejects_non_positive_tick_size() {
        assert_eq!(
            BucketConfig::new(Decimal::ZERO, 100),
            Err(ConfigError::InvalidTickSize("0".to_string()))
        );
        assert!(BucketConfig::new(d("-0.05"), 100).is_err());
    }

    #[test]
    fn test_rejects_non_positive_multiplier() {
        assert_eq!(
            BucketConfig::new(d("0.05"), 0),
            Err(ConfigError::InvalidMultiplier(0))
        );
        assert!(BucketConfig::new(d("0.05"), -3).is_err());
    }

    #[test]
    fn test_unrepresentable_effective_size_is_config_error() {
        let config = BucketConfig::new(Decimal::MAX, 2).unwrap();
        assert!(matches!(
            config.effective_size(),
            Err(ConfigError::InvalidSetting { .. })
        ));
    }

    #[test]
    fn test_unvalidated_config_fails_on_use() {
        let config = BucketConfig {
            tick_size: d("0.05"),
            multiplier: 0,
        };
        assert!(config.effective_size().is_err());
    }

    #[test]
    fn test_same_effective_size_different_knobs_are_distinct_keys() {
        let a = BucketConfig::new(d("0.05"), 100).unwrap();
        let b = BucketConfig::new(d("0.10"), 50).unwrap();
        assert_eq!(a.effective_size().unwrap(), b.effective_size().unwrap());
        assert_ne!(a, b);
    }

    #[test]
    fn test_key_display() {
        let key = FootprintKey::new(
            Symbol::new("NSE:NIFTY24JANFUT"),
            Timeframe::M5,
            BucketConfig::new(d("0.05"), 100).unwrap(),
        );
        assert_eq!(key.to_string(), "NSE:NIFTY24JANFUT_5m_0.05_100");
    }
}
