//! Fixed-point helpers for prices
//!
//! Uses rust_decimal for deterministic arithmetic (no floating-point errors).
//! Emitted prices carry exactly two decimal places, rounded half away from zero.

use rust_decimal::{Decimal, RoundingStrategy};

/// Decimal places carried by every emitted price and price level.
pub const PRICE_DP: u32 = 2;

/// Round a price to `PRICE_DP` places (half away from zero) and fix its scale,
/// so `19550` is carried and serialized as `19550.00`.
pub fn round_price(value: Decimal) -> Decimal {
    let mut rounded = value.round_dp_with_strategy(PRICE_DP, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(PRICE_DP);
    rounded
}
