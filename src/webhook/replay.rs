//! Replay window for signed deliveries.

/// Default tolerance between the signature timestamp and the local clock.
pub const DEFAULT_TOLERANCE_SECS: u64 = 30;

const MILLIS_PER_SECOND: i128 = 1_000;

/// Returns true if `signature_ts_ms` lies within `tolerance_secs` of `now_ms`,
/// in either direction. A tolerance of zero disables the check.
///
/// The comparison is inclusive: a timestamp exactly `tolerance_secs` away is
/// accepted.
pub fn is_within_window(signature_ts_ms: i64, now_ms: i64, tolerance_secs: u64) -> bool {
    if tolerance_secs == 0 {
        return true;
    }
    // i128 so that neither the difference nor the scaled tolerance can overflow.
    let skew = (i128::from(now_ms) - i128::from(signature_ts_ms)).abs();
    skew <= i128::from(tolerance_secs) * MILLIS_PER_SECOND
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000_000;

    #[test]
    fn test_exact_boundary_accepted() {
        assert!(is_within_window(NOW - 30_000, NOW, 30));
        assert!(is_within_window(NOW + 30_000, NOW, 30));
    }

    #[test]
    fn test_just_outside_rejected() {
        assert!(!is_within_window(NOW - 30_001, NOW, 30));
        assert!(!is_within_window(NOW + 30_001, NOW, 30));
    }

    #[test]
    fn test_zero_tolerance_disables_check() {
        assert!(is_within_window(0, NOW, 0));
        assert!(is_within_window(i64::MAX, i64::MIN, 0));
    }

    #[test]
    fn test_extremes_do_not_overflow() {
        assert!(!is_within_window(i64::MIN, i64::MAX, 30));
        assert!(is_within_window(i64::MIN, i64::MAX, u64::MAX));
    }
}
