//! Fixed-point money helpers
//!
//! All amounts are `rust_decimal::Decimal` values carried with two fractional
//! digits. Rounding is always midpoint-to-even.

use rust_decimal::{Decimal, RoundingStrategy};

/// Number of fractional digits kept on every monetary value
pub const MONEY_SCALE: u32 = 2;

/// Round a value to two places using banker's rounding
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointNearestEven)
}

/// Whether an amount is usable for a money movement
pub fn is_positive_amount(value: Decimal) -> bool {
    value > Decimal::ZERO
}
