//! Narrowing helpers for values that end up in 32-bit columns and wire
//! fields. Both functions are pure; only `to_int32` and
//! `checked_round_to_int32` can fail.

use thiserror::Error;

const ROUNDING_THRESHOLD: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum RangeError {
    #[error("value is out of range for int32: {0}")]
    Integer(i64),
    #[error("value is out of range for int32: {0}")]
    Float(f64),
}

/// Narrows `value` to `i32`, rejecting anything outside
/// `i32::MIN..=i32::MAX`.
pub fn to_int32(value: i64) -> Result<i32, RangeError> {
    i32::try_from(value).map_err(|_| RangeError::Integer(value))
}

fn round_half_away_from_zero(value: f64) -> f64 {
    if value >= 0.0 {
        (value + ROUNDING_THRESHOLD).trunc()
    } else {
        (value - ROUNDING_THRESHOLD).trunc()
    }
}

/// Rounds to the nearest `i32`, with midpoints going away from zero
/// (`0.5 -> 1`, `-0.5 -> -1`).
///
/// No range check: magnitudes beyond `i32` saturate and NaN becomes 0, as
/// with any `as` cast. Use [`checked_round_to_int32`] to reject those.
pub fn round_to_int32(value: f64) -> i32 {
    round_half_away_from_zero(value) as i32
}

/// Same rounding as [`round_to_int32`] but fails instead of saturating.
pub fn checked_round_to_int32(value: f64) -> Result<i32, RangeError> {
    let rounded = round_half_away_from_zero(value);
    if rounded.is_nan() || rounded < f64::from(i32::MIN) || rounded > f64::from(i32::MAX) {
        return Err(RangeError::Float(value));
    }
    Ok(rounded as i32)
}

#[cfg(test)]
mod tests {
    use super::{checked_round_to_int32, round_to_int32, to_int32, RangeError};

    #[test]
    fn narrows_values_at_the_bounds() {
        assert_eq!(to_int32(2_147_483_647), Ok(i32::MAX));
        assert_eq!(to_int32(-2_147_483_648), Ok(i32::MIN));
        assert_eq!(to_int32(0), Ok(0));
        assert_eq!(to_int32(-42), Ok(-42));
    }

    #[test]
    fn rejects_values_past_the_bounds() {
        assert_eq!(to_int32(2_147_483_648), Err(RangeError::Integer(2_147_483_648)));
        assert_eq!(to_int32(-2_147_483_649), Err(RangeError::Integer(-2_147_483_649)));
        assert_eq!(to_int32(i64::MAX), Err(RangeError::Integer(i64::MAX)));

        let err = to_int32(2_147_483_648).unwrap_err();
        assert_eq!(err.to_string(), "value is out of range for int32: 2147483648");
    }

    #[test]
    fn rounds_half_away_from_zero() {
        assert_eq!(round_to_int32(0.5), 1);
        assert_eq!(round_to_int32(0.25), 0);
        assert_eq!(round_to_int32(-0.25), 0);
        assert_eq!(round_to_int32(-0.5), -1);
        assert_eq!(round_to_int32(99.999_99), 100);
        assert_eq!(round_to_int32(-1.234_567_89), -1);
    }

    #[test]
    fn midpoints_ignore_parity() {
        assert_eq!(round_to_int32(1.5), 2);
        assert_eq!(round_to_int32(2.5), 3);
        assert_eq!(round_to_int32(-1.5), -2);
        assert_eq!(round_to_int32(-2.5), -3);
        assert_eq!(round_to_int32(-0.0), 0);
    }

    #[test]
    fn unchecked_rounding_saturates() {
        assert_eq!(round_to_int32(1e12), i32::MAX);
        assert_eq!(round_to_int32(-1e12), i32::MIN);
        assert_eq!(round_to_int32(f64::NAN), 0);
    }

    #[test]
    fn checked_rounding_rejects_unrepresentable_values() {
        assert_eq!(checked_round_to_int32(2.5), Ok(3));
        assert_eq!(checked_round_to_int32(2_147_483_647.4), Ok(i32::MAX));
        assert_eq!(checked_round_to_int32(-2_147_483_648.4), Ok(i32::MIN));
        assert!(matches!(
            checked_round_to_int32(2_147_483_647.5),
            Err(RangeError::Float(_))
        ));
        assert!(matches!(checked_round_to_int32(f64::NAN), Err(RangeError::Float(_))));
        assert!(matches!(
            checked_round_to_int32(f64::NEG_INFINITY),
            Err(RangeError::Float(_))
        ));
    }
}
