//! Frame delay normalization (spec §3, §8 property 1).
//!
//! Mirrors the legacy-browser rule for under-specified GIF/WebP frame
//! delays: anything below `MIN_DELAY` (minus a float-epsilon tolerance, to
//! absorb rounding from the upstream decoder) is treated as unintentional
//! and replaced by `DEFAULT_DELAY`.

/// Minimum delay, in seconds, below which a raw delay is considered
/// unintentional.
pub const MIN_DELAY: f64 = 0.02;

/// Delay substituted for any raw delay under `MIN_DELAY`.
pub const DEFAULT_DELAY: f64 = 0.10;

/// Normalize a single raw per-frame delay, in seconds.
///
/// # Example
/// ```
/// use flcore::delay::normalize_delay;
/// assert_eq!(normalize_delay(0.0), 0.10);
/// assert_eq!(normalize_delay(0.019), 0.10);
/// assert_eq!(normalize_delay(0.021), 0.021);
/// ```
#[must_use]
pub fn normalize_delay(raw: f64) -> f64 {
    if raw < MIN_DELAY - f64::from(f32::EPSILON) {
        DEFAULT_DELAY
    } else {
        raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundary_values() {
        let cases = [
            (0.0, DEFAULT_DELAY),
            (0.019, DEFAULT_DELAY),
            (0.02, 0.02),
            (0.021, 0.021),
            (0.099, 0.099),
            (0.1, 0.1),
        ];
        for (raw, expected) in cases {
            assert!(
                (normalize_delay(raw) - expected).abs() < 1e-9,
                "normalize_delay({raw}) should be {expected}"
            );
        }
    }
}
