use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;

/// Process-wide suspension of every bucket after the server reported a
/// global limit breach.
///
/// The deadline is stored as microseconds since a fixed origin and only ever
/// raised with `fetch_max`, so racing writers converge on the latest
/// deadline. A reader that sees a stale value waits for an earlier deadline
/// than the latest one and finds the cooldown still active on its next
/// check; it can never skip a deadline that was already visible.
#[derive(Debug)]
pub struct GlobalCooldown {
    origin: Instant,
    until_micros: AtomicU64,
}

impl GlobalCooldown {
    /// A cooldown that is not active
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            until_micros: AtomicU64::new(0),
        }
    }

    /// Suspend all buckets for at least `delay` from now.
    /// A deadline earlier than the current one has no effect; a delay too
    /// large to represent keeps the cooldown active indefinitely.
    pub fn raise(&self, delay: Duration) {
        let until = Instant::now()
            .saturating_duration_since(self.origin)
            .saturating_add(delay);
        let micros = u64::try_from(until.as_micros()).unwrap_or(u64::MAX);
        let previous = self.until_micros.fetch_max(micros, Ordering::AcqRel);
        if micros > previous {
            log::debug!(
                "Global rate limit hit, suspending all buckets for {}ms",
                delay.as_millis()
            );
        }
    }

    /// Time left until the cooldown expires, or [`Duration::ZERO`] if it is
    /// not active. The cooldown expires on its own; nothing clears it.
    #[must_use]
    pub fn remaining(&self) -> Duration {
        let until = Duration::from_micros(self.until_micros.load(Ordering::Acquire));
        let elapsed = Instant::now().saturating_duration_since(self.origin);
        until.saturating_sub(elapsed)
    }

    /// Whether requests are currently suspended
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.remaining().is_zero()
    }
}

impl Default for GlobalCooldown {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_inactive_by_default() {
        let cooldown = GlobalCooldown::new();
        assert!(!cooldown.is_active());
        assert_eq!(cooldown.remaining(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expires_naturally() {
        let cooldown = GlobalCooldown::new();
        cooldown.raise(Duration::from_millis(1500));
        assert_eq!(cooldown.remaining(), Duration::from_millis(1500));

        tokio::time::advance(Duration::from_millis(1000)).await;
        assert_eq!(cooldown.remaining(), Duration::from_millis(500));

        tokio::time::advance(Duration::from_millis(600)).await;
        assert!(!cooldown.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_only_raises() {
        let cooldown = GlobalCooldown::new();
        cooldown.raise(Duration::from_secs(3));
        cooldown.raise(Duration::from_secs(1));
        assert_eq!(cooldown.remaining(), Duration::from_secs(3));

        tokio::time::advance(Duration::from_secs(1)).await;
        cooldown.raise(Duration::from_secs(1));
        assert_eq!(cooldown.remaining(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_out_of_range_delay_saturates() {
        let cooldown = GlobalCooldown::new();
        cooldown.raise(Duration::MAX);
        assert!(cooldown.is_active());
        assert!(cooldown.remaining() > Duration::from_secs(86400 * 365));

        tokio::time::advance(Duration::from_secs(3600)).await;
        assert!(cooldown.is_active());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_raises_converge_to_maximum() {
        let cooldown = Arc::new(GlobalCooldown::new());

        let handles: Vec<_> = (0..16u64)
            .map(|i| {
                let cooldown = cooldown.clone();
                tokio::spawn(async move { cooldown.raise(Duration::from_secs(60 + i)) })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        let remaining = cooldown.remaining();
        assert!(remaining > Duration::from_secs(70));
        assert!(remaining <= Duration::from_secs(75));
    }
}
