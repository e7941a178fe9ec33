//! Centralized decimal rounding for output boundaries
//!
//! Every decimal that leaves the engine passes through `round3`. Keeping a
//! single routine guarantees byte-identical output for identical inputs.

/// Round half to even at integer precision.
fn half_even(scaled: f64) -> f64 {
    let floor = scaled.floor();
    let diff = scaled - floor;
    if diff > 0.5 {
        floor + 1.0
    } else if diff < 0.5 {
        floor
    } else if (floor as i64) % 2 == 0 {
        floor
    } else {
        floor + 1.0
    }
}

/// Round a value to exactly 3 fractional digits using banker's rounding.
///
/// Non-finite inputs collapse to 0.0 so they can never reach a response body.
pub fn round3(value: f64) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    half_even(value * 1000.0) / 1000.0
}

/// Round an optional value, preserving `None`.
pub fn round3_opt(value: Option<f64>) -> Option<f64> {
    value.map(round3)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_half_even_ties() {
        assert_eq!(half_even(1.5), 2.0);
        assert_eq!(half_even(2.5), 2.0);
        assert_eq!(half_even(3.5), 4.0);
        assert_eq!(half_even(-1.5), -2.0);
        assert_eq!(half_even(-2.5), -2.0);
    }

    #[test]
    fn test_round3_plain() {
        assert_eq!(round3(1.23456), 1.235);
        assert_eq!(round3(1.23449), 1.234);
        assert_eq!(round3(0.0), 0.0);
        assert_eq!(round3(100.0), 100.0);
    }

    #[test]
    fn test_round3_non_finite() {
        assert_eq!(round3(f64::NAN), 0.0);
        assert_eq!(round3(f64::INFINITY), 0.0);
        assert_eq!(round3(f64::NEG_INFINITY), 0.0);
    }

    #[test]
    fn test_round3_opt() {
        assert_eq!(round3_opt(None), None);
        assert_eq!(round3_opt(Some(1.23456)), Some(1.235));
    }
}
