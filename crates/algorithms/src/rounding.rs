//! Decimal rounding matching NumPy's `around` (round half to even)

/// Round `value` to `decimals` decimal places, ties to even.
///
/// `round_half_even(0.25, 1) == 0.2`, `round_half_even(0.35, 1) == 0.4`
/// (up to the binary representation of the scaled value).
pub fn round_half_even(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round_ties_even() / scale
}
