//! Monetary rounding.
//!
//! All amounts are `f64` carried at cent precision once they leave the
//! schedule generator. Rounding is half away from zero, which is
//! half-up for every non-negative amount the engine handles.

/// Decimal places for every reported and stored amount.
pub const MONEY_DP: i32 = 2;

/// Two amounts closer than this are the same amount.
pub const MONEY_EPSILON: f64 = 0.005;

/// Round to `dp` decimal places, half away from zero.
pub fn round_to(x: f64, dp: i32) -> f64 {
    let pow = 10f64.powi(dp);
    (x * pow).round() / pow
}

/// Round to cents.
pub fn round_money(x: f64) -> f64 {
    round_to(x, MONEY_DP)
}

/// Whole cents, for exact comparisons.
pub fn to_cents(x: f64) -> i64 {
    (x * 100.0).round() as i64
}

pub fn from_cents(cents: i64) -> f64 {
    cents as f64 / 100.0
}

pub fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() < MONEY_EPSILON
}
