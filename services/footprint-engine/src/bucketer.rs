//! Price bucketing
//!
//! Maps a trade price to its footprint level:
//! `floor(price / (tick_size * multiplier)) * (tick_size * multiplier)`,
//! rounded half away from zero to 2 decimal places. All arithmetic is
//! `Decimal`, so repeated bucketing never accumulates float error.

use rust_decimal::Decimal;
use types::bucket::BucketConfig;
use types::errors::{ConfigError, EngineError, TickError};
use types::numeric::round_price;

/// A validated bucketer for one `(tick_size, multiplier)` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceBucketer {
    config: BucketConfig,
    effective: Decimal,
}

impl PriceBucketer {
    /// Fails with `ConfigError` when tick size or multiplier is non-positive,
    /// or when their product is not representable.
    pub fn new(config: BucketConfig) -> Result<Self, ConfigError> {
        let effective = config.effective_size()?;
        Ok(Self { config, effective })
    }

    pub fn config(&self) -> &BucketConfig {
        &self.config
    }

    /// Price level for `price`. Fails when the quotient or the level leaves
    /// the `Decimal` range for this width.
    pub fn bucket(&self, price: Decimal) -> Result<Decimal, TickError> {
        price
            .checked_div(self.effective)
            .and_then(|units| units.floor().checked_mul(self.effective))
            .map(round_price)
            .ok_or_else(|| TickError::PriceOutOfRange {
                price: price.to_string(),
                width: self.effective.to_string(),
            })
    }

    /// One bucket width, used to walk a contiguous ladder.
    pub fn step(&self) -> Decimal {
        self.effective
    }
}

/// One-shot bucketing for callers that do not hold a `PriceBucketer`.
pub fn bucket_price(price: Decimal, tick_size: Decimal, multiplier: i64) -> Result<Decimal, EngineError> {
    let bucketer = PriceBucketer::new(BucketConfig::new(tick_size, multiplier)?)?;
    Ok(bucketer.bucket(price)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn d(s: &str) -> Decimal {
        Decimal::from_str_exact(s).unwrap()
    }

    #[test]
    fn test_nifty_bucket() {
        assert_eq!(bucket_price(d("19552.30"), d("0.05"), 100).unwrap(), d("19550.00"));
        assert_eq!(bucket_price(d("19548.00"), d("0.05"), 100).unwrap(), d("19545.00"));
    }

    #[test]
    fn test_exact_boundary_stays() {
        assert_eq!(bucket_price(d("19550.00"), d("0.05"), 100).unwrap(), d("19550.00"));
    }

    #[test]
    fn test_two_decimal_output() {
        let level = bucket_price(d("101.37"), d("0.05"), 1).unwrap();
        assert_eq!(level, d("101.35"));
        assert_eq!(level.to_string(), "101.35");

        let level = bucket_price(d("250"), d("0.05"), 100).unwrap();
        assert_eq!(level.to_string(), "250.00");
    }

    #[test]
    fn test_sub_cent_tick_rounds_half_away() {
        // 0.005 buckets land on half-cents and are rounded at emission
        assert_eq!(bucket_price(d("10.007"), d("0.005"), 1).unwrap(), d("10.01"));
    }

    #[test]
    fn test_invalid_configuration() {
        assert_eq!(
            bucket_price(d("100"), Decimal::ZERO, 10),
            Err(EngineError::Config(ConfigError::InvalidTickSize("0".to_string())))
        );
        assert_eq!(
            bucket_price(d("100"), d("0.05"), 0),
            Err(EngineError::Config(ConfigError::InvalidMultiplier(0)))
        );
    }

    #[test]
    fn test_unrepresentable_width_rejected_at_construction() {
        let config = BucketConfig::new(Decimal::MAX, 2).unwrap();
        assert!(PriceBucketer::new(config).is_err());
    }

    #[test]
    fn test_out_of_range_price_is_error_not_panic() {
        // 19552 / 1e-28 does not fit in 96 bits
        let bucketer = PriceBucketer::new(BucketConfig::new(Decimal::new(1, 28), 1).unwrap()).unwrap();
        assert!(matches!(
            bucketer.bucket(d("19552")),
            Err(TickError::PriceOutOfRange { .. })
        ));
        assert!(matches!(
            bucket_price(d("19552"), Decimal::new(1, 28), 1),
            Err(EngineError::Tick(TickError::PriceOutOfRange { .. }))
        ));
    }

    #[test]
    fn test_step() {
        let bucketer = PriceBucketer::new(BucketConfig::new(d("0.05"), 100).unwrap()).unwrap();
        assert_eq!(bucketer.step(), d("5.00"));
    }

    proptest! {
        #[test]
        fn prop_bucket_is_idempotent(
            cents in 1i64..10_000_000,
            tick_cents in prop::sample::select(vec![1i64, 5, 10, 25, 50, 100]),
            multiplier in 1i64..500,
        ) {
            let price = Decimal::new(cents, 2);
            let tick = Decimal::new(tick_cents, 2);
            let bucketer = PriceBucketer::new(BucketConfig::new(tick, multiplier).unwrap()).unwrap();
            let once = bucketer.bucket(price).unwrap();
            prop_assert_eq!(bucketer.bucket(once).unwrap(), once);
        }

        #[test]
        fn prop_bucket_never_exceeds_price(
            cents in 1i64..10_000_000,
            multiplier in 1i64..500,
        ) {
            let price = Decimal::new(cents, 2);
            let bucketer = PriceBucketer::new(BucketConfig::new(d("0.05"), multiplier).unwrap()).unwrap();
            let level = bucketer.bucket(price).unwrap();
            prop_assert!(level <= price);
            prop_assert!(price - level < bucketer.step());
        }
    }
}
