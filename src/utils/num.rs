//! Integer conversions for the counters and durations that end up in explain output,
//! bench lines and run reports.

use std::time::Instant;

/// Milliseconds since `start`, clamped to `u64`.
#[must_use]
pub fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// A document count in the width the server reports counts with.
#[inline]
#[must_use]
pub fn count_u64(n: usize) -> u64 {
    u64::try_from(n).unwrap_or(u64::MAX)
}

/// A stage operand written as a double (`{"$limit": 2.0}`). Only non-negative whole
/// numbers are counts.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
pub fn whole_count(v: f64) -> Option<usize> {
    if !v.is_finite() || v < 0.0 || v.fract() != 0.0 || v >= u64::MAX as f64 {
        return None;
    }
    usize::try_from(v as u64).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whole_count_rejects_fractions_and_negatives() {
        assert_eq!(whole_count(3.0), Some(3));
        assert_eq!(whole_count(0.0), Some(0));
        assert_eq!(whole_count(2.5), None);
        assert_eq!(whole_count(-1.0), None);
        assert_eq!(whole_count(f64::NAN), None);
        assert_eq!(whole_count(f64::INFINITY), None);
    }

    #[test]
    fn counts_widen() {
        assert_eq!(count_u64(12), 12);
        assert!(elapsed_ms(Instant::now()) < 60_000);
    }
}
