//! Reconnect backoff schedule.
//!
//! Pure computation, kept separate from the session task so the schedule
//! can be tested exactly. Uses saturating arithmetic throughout; the delay
//! is capped by the configured ceiling, never jittered (the schedule is
//! part of the client's contract).

use std::time::Duration;

/// Delay before reconnect attempt `attempt` (0-based).
///
/// Doubles the base delay per attempt: `min(base * 2^attempt, max)`.
pub fn delay_for_attempt(base: Duration, max: Duration, attempt: u32) -> Duration {
    let base_ms = duration_to_ms(base);
    let max_ms = duration_to_ms(max);
    // 2^attempt saturates well past any sane ceiling; shifting by more
    // than 63 would be UB, so clamp the exponent first.
    let factor = 1u64.checked_shl(attempt.min(63)).unwrap_or(u64::MAX);
    let delay_ms = base_ms.saturating_mul(factor).min(max_ms);
    Duration::from_millis(delay_ms)
}

fn duration_to_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schedule_matches_min_of_power_and_cap() {
        let base = Duration::from_secs(1);
        let max = Duration::from_secs(30);
        for attempt in 0..=10u32 {
            let expected_secs = (1u64 << attempt).min(30);
            assert_eq!(
                delay_for_attempt(base, max, attempt),
                Duration::from_secs(expected_secs),
                "attempt {attempt}"
            );
        }
    }

    #[test]
    fn huge_attempt_counts_saturate_at_the_cap() {
        let base = Duration::from_secs(1);
        let max = Duration::from_secs(30);
        assert_eq!(delay_for_attempt(base, max, 63), max);
        assert_eq!(delay_for_attempt(base, max, u32::MAX), max);
    }

    #[test]
    fn sub_second_base_delays_double_exactly() {
        let base = Duration::from_millis(250);
        let max = Duration::from_secs(10);
        assert_eq!(delay_for_attempt(base, max, 0), Duration::from_millis(250));
        assert_eq!(delay_for_attempt(base, max, 1), Duration::from_millis(500));
        assert_eq!(delay_for_attempt(base, max, 2), Duration::from_secs(1));
    }

    #[test]
    fn zero_base_stays_zero() {
        let base = Duration::ZERO;
        let max = Duration::from_secs(30);
        assert_eq!(delay_for_attempt(base, max, 5), Duration::ZERO);
    }
}
