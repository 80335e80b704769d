use dispatchd::SeededJitter;
use proptest::prelude::*;

/// Property 7 (spec §8): `retry_delay(attempts)` always lies in
/// `[0, min(5 * 2^(attempts-1), 30)]`, for any seed and any attempts count.
proptest! {
    #[test]
    fn retry_delay_stays_within_window(attempts in 1u32..20, seed in any::<u64>()) {
        let jitter = SeededJitter::new(seed);
        let delay = dispatchd::retry::retry_delay(attempts, &jitter);

        let expected_window = (5_i64.saturating_mul(1_i64 << (attempts - 1).min(62))).min(30);

        prop_assert!(delay.as_secs() as i64 >= 0);
        prop_assert!(delay.as_secs() as i64 <= expected_window);
    }

    #[test]
    fn retry_delay_clamps_attempts_below_one(seed in any::<u64>()) {
        let jitter = SeededJitter::new(seed);
        let zero = dispatchd::retry::retry_delay(0, &jitter);
        assert!(zero.as_secs() <= 5);
    }
}
