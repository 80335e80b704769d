use std::time::Duration;

use crate::jitter::JitterSource;

/// Retry cap and base from spec.md §4.C / §6.
pub const RETRY_CAP_SECS: i64 = 30;
pub const RETRY_BASE_SECS: i64 = 5;

/// Exponential backoff with full jitter.
///
/// `window = min(base * 2^(attempts-1), cap)`, attempts clamped to >= 1
/// before computing. The delay is sampled uniformly from `[0, window]` -
/// the *full* window, not a narrow band, so synchronized retry storms
/// actually break up.
pub fn retry_delay(attempts: u32, jitter: &dyn JitterSource) -> Duration {
    retry_delay_with(attempts, RETRY_BASE_SECS, RETRY_CAP_SECS, jitter)
}

pub fn retry_delay_with(
    attempts: u32,
    base_secs: i64,
    cap_secs: i64,
    jitter: &dyn JitterSource,
) -> Duration {
    let attempts = attempts.max(1);
    let window = base_secs
        .saturating_mul(1_i64 << (attempts - 1).min(62))
        .min(cap_secs);
    let sampled = jitter.sample_inclusive(window);
    Duration::from_secs(sampled.max(0) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jitter::SeededJitter;

    #[test]
    fn window_is_clamped_to_cap() {
        let jitter = SeededJitter::new(1);
        for attempts in 1..20 {
            let d = retry_delay(attempts, &jitter);
            assert!(d.as_secs() <= RETRY_CAP_SECS as u64);
        }
    }

    #[test]
    fn attempts_below_one_are_clamped() {
        let jitter = SeededJitter::new(7);
        // attempts = 0 must behave like attempts = 1 (window = base).
        let d = retry_delay(0, &jitter);
        assert!(d.as_secs() <= RETRY_BASE_SECS as u64);
    }

    #[test]
    fn first_attempt_window_is_base() {
        let jitter = SeededJitter::new(42);
        let d = retry_delay(1, &jitter);
        assert!(d.as_secs() <= RETRY_BASE_SECS as u64);
    }
}
