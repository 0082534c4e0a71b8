//! Numeric conversion helpers centralizing safe numeric casts.

use num_traits::cast::cast;

/// Floor a f64 and clamp it to the u64 range, returning 0 for non-finite or negative values.
#[must_use]
pub fn floor_f64_to_u64(value: f64) -> u64 {
    if !value.is_finite() || value <= 0.0 {
        return 0;
    }
    let max = cast::<u64, f64>(u64::MAX).unwrap_or(f64::MAX);
    let clamped = value.min(max).floor();
    cast::<f64, u64>(clamped).unwrap_or(u64::MAX)
}

/// Floor a f64 and clamp it to the u32 range, returning 0 for non-finite or negative values.
#[must_use]
pub fn floor_f64_to_u32(value: f64) -> u32 {
    u32::try_from(floor_f64_to_u64(value)).unwrap_or(u32::MAX)
}

/// Convert u64 to f64 while allowing precision loss in a single location.
#[must_use]
pub fn u64_to_f64(value: u64) -> f64 {
    cast::<u64, f64>(value).unwrap_or(f64::MAX)
}

/// Convert a level count into an `i32` exponent for `powi`, saturating at `i32::MAX`.
#[must_use]
pub fn exponent_from_u32(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

/// Replace NaN, infinite and negative deltas with zero.
#[must_use]
pub fn sanitize_delta(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn floor_handles_non_finite_and_negative() {
        assert_eq!(floor_f64_to_u64(f64::NAN), 0);
        assert_eq!(floor_f64_to_u64(f64::INFINITY), 0);
        assert_eq!(floor_f64_to_u64(-3.5), 0);
        assert_eq!(floor_f64_to_u64(17.62), 17);
        assert_eq!(floor_f64_to_u64(1e30), u64::MAX);
    }

    #[test]
    fn u32_floor_saturates() {
        assert_eq!(floor_f64_to_u32(9.99), 9);
        assert_eq!(floor_f64_to_u32(1e12), u32::MAX);
    }

    #[test]
    fn exponent_saturates() {
        assert_eq!(exponent_from_u32(5), 5);
        assert_eq!(exponent_from_u32(u32::MAX), i32::MAX);
    }

    #[test]
    fn deltas_are_sanitized() {
        assert!((sanitize_delta(0.25) - 0.25).abs() < f64::EPSILON);
        assert!(sanitize_delta(-1.0).abs() < f64::EPSILON);
        assert!(sanitize_delta(f64::NAN).abs() < f64::EPSILON);
    }
}
