//! Reconnect backoff policy. The baseline behavior is a fixed 5 second
//! delay; exponential backoff with jitter is offered as the "principled"
//! enhancement the design notes call for, capped so a flapping connection
//! never waits arbitrarily long between attempts.

use std::time::Duration;

use rand::Rng;

#[derive(Debug, Clone, Copy)]
pub enum ReconnectPolicy {
    /// Always wait the same duration between attempts.
    Fixed(Duration),
    /// Backoff doubles per attempt starting at `base`, capped at `max`, with
    /// up to `jitter` of additional random delay to avoid thundering herds.
    ExponentialBackoff { base: Duration, max: Duration, jitter: Duration },
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::Fixed(Duration::from_secs(5))
    }
}

impl ReconnectPolicy {
    pub fn exponential_default() -> Self {
        Self::ExponentialBackoff {
            base: Duration::from_millis(500),
            max: Duration::from_secs(30),
            jitter: Duration::from_millis(250),
        }
    }

    /// Delay to wait before reconnect attempt number `attempt` (0-indexed).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match self {
            ReconnectPolicy::Fixed(delay) => *delay,
            ReconnectPolicy::ExponentialBackoff { base, max, jitter } => {
                let scaled = base.saturating_mul(1u32.checked_shl(attempt).unwrap_or(u32::MAX));
                let capped = scaled.min(*max);
                let jitter_ms = if jitter.is_zero() { 0 } else { rand::thread_rng().gen_range(0..=jitter.as_millis() as u64) };
                capped + Duration::from_millis(jitter_ms)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_policy_never_changes() {
        let policy = ReconnectPolicy::Fixed(Duration::from_secs(5));
        assert_eq!(policy.delay_for(0), Duration::from_secs(5));
        assert_eq!(policy.delay_for(10), Duration::from_secs(5));
    }

    #[test]
    fn exponential_policy_grows_then_caps() {
        let policy = ReconnectPolicy::ExponentialBackoff {
            base: Duration::from_millis(100),
            max: Duration::from_secs(1),
            jitter: Duration::ZERO,
        };
        assert_eq!(policy.delay_for(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for(2), Duration::from_millis(400));
        assert_eq!(policy.delay_for(10), Duration::from_secs(1), "must cap at `max`");
    }
}
