use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::Semaphore;
use tokio::time::Instant;

use crate::Transport;
use crate::ratelimit::{Bucket, BucketRegistry, GlobalCooldown, RateLimitConfig, worker};
use crate::types::Request;

/// Decides when a bucket may drain next and runs its drain on the shared
/// runtime.
///
/// The dispatcher owns the shared state every drain needs: the registry,
/// the global cooldown and the transport. Drains themselves are the
/// stateless functions in [`worker`]. At most `max_concurrent_drains`
/// buckets drain at the same time; the rest wait for a permit.
#[derive(Debug)]
pub(crate) struct Dispatcher {
    pub(crate) config: RateLimitConfig,
    pub(crate) registry: BucketRegistry,
    pub(crate) cooldown: GlobalCooldown,
    pub(crate) transport: Arc<dyn Transport>,
    permits: Semaphore,
    runtime: Handle,
    stopped: AtomicBool,
}

impl Dispatcher {
    pub(crate) fn new(
        config: RateLimitConfig,
        transport: Arc<dyn Transport>,
        runtime: Handle,
    ) -> Self {
        Self {
            registry: BucketRegistry::new(config.strategy),
            cooldown: GlobalCooldown::new(),
            transport,
            permits: Semaphore::new(config.max_concurrent_drains.max(1)),
            runtime,
            stopped: AtomicBool::new(false),
            config,
        }
    }

    /// Time until `bucket` may send its next request: the longer of its own
    /// reset delay and the global cooldown
    pub(crate) fn delay_for(&self, bucket: &Bucket) -> Duration {
        bucket
            .local_delay(Instant::now())
            .max(self.cooldown.remaining())
    }

    /// Queue `request` in `bucket` and make sure a drain is on its way
    pub(crate) fn enqueue(self: &Arc<Self>, bucket: &Arc<Bucket>, request: Request) {
        bucket.push(request);
        self.schedule(bucket);
    }

    /// Schedule a drain for `bucket` unless one is already pending or running
    pub(crate) fn schedule(self: &Arc<Self>, bucket: &Arc<Bucket>) {
        if bucket.try_claim() {
            let delay = self.delay_for(bucket);
            self.spawn(bucket.clone(), delay);
        }
    }

    /// Run a drain for `bucket` after `delay`.
    /// The caller must hold the bucket's claim; the drain takes it over.
    pub(crate) fn spawn(self: &Arc<Self>, bucket: Arc<Bucket>, delay: Duration) {
        if !delay.is_zero() {
            log::debug!(
                "Bucket {} is rate limited, next drain in {}ms",
                bucket.key(),
                delay.as_millis()
            );
            bucket.record(|stats| stats.record_delay(delay));
        }

        let dispatcher = self.clone();
        self.runtime.spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            // Closed only on shutdown
            let Ok(_permit) = dispatcher.permits.acquire().await else {
                worker::abandon(&dispatcher, &bucket);
                return;
            };
            worker::drain(&dispatcher, &bucket).await;
        });
    }

    pub(crate) fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// Stop admitting and draining requests.
    /// Returns `false` if the dispatcher was already stopped.
    pub(crate) fn stop(&self) -> bool {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.permits.close();
        true
    }

    /// Number of drains that could start right now
    pub(crate) fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratelimit::BucketKey;
    use crate::ratelimit::headers::Quota;
    use crate::{ErrorKind, Payload, Response, Result, Route};
    use async_trait::async_trait;

    #[derive(Debug)]
    struct Unreachable;

    #[async_trait]
    impl Transport for Unreachable {
        async fn execute(&self, _route: &Route, _payload: &Payload) -> Result<Response> {
            Err(ErrorKind::transport("unreachable"))
        }
    }

    fn dispatcher(max_concurrent_drains: usize) -> Dispatcher {
        let config = RateLimitConfig {
            max_concurrent_drains,
            ..RateLimitConfig::default()
        };
        Dispatcher::new(config, Arc::new(Unreachable), Handle::current())
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_is_longest_of_bucket_and_cooldown() {
        let dispatcher = dispatcher(4);
        let bucket = Bucket::new(BucketKey::Unclassified);
        let now = Instant::now();
        assert_eq!(dispatcher.delay_for(&bucket), Duration::ZERO);

        bucket.apply_quota(
            Quota {
                limit: 5,
                remaining: 0,
                reset_after: Duration::from_secs(2),
            },
            now,
        );
        assert_eq!(dispatcher.delay_for(&bucket), Duration::from_secs(2));

        dispatcher.cooldown.raise(Duration::from_secs(3));
        assert_eq!(dispatcher.delay_for(&bucket), Duration::from_secs(3));

        tokio::time::advance(Duration::from_secs(3)).await;
        assert_eq!(dispatcher.delay_for(&bucket), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cooldown_delays_fresh_bucket() {
        let dispatcher = dispatcher(4);
        let bucket = Bucket::new(BucketKey::Unclassified);
        dispatcher.cooldown.raise(Duration::from_millis(1500));
        assert_eq!(dispatcher.delay_for(&bucket), Duration::from_millis(1500));
    }

    #[tokio::test]
    async fn test_stop_closes_permits() {
        let dispatcher = dispatcher(0);
        // At least one drain must always be able to run
        assert_eq!(dispatcher.available_permits(), 1);
        assert!(!dispatcher.is_stopped());

        assert!(dispatcher.stop());
        assert!(!dispatcher.stop());
        assert!(dispatcher.is_stopped());
        assert!(dispatcher.permits.acquire().await.is_err());
    }

    #[tokio::test]
    async fn test_schedule_on_empty_bucket_releases_claim() {
        let dispatcher = Arc::new(dispatcher(1));
        let bucket = Arc::new(Bucket::new(BucketKey::Unclassified));
        dispatcher.schedule(&bucket);
        assert!(bucket.is_scheduled());

        // A second schedule while the drain is pending is a no-op
        dispatcher.schedule(&bucket);

        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert!(!bucket.is_scheduled());
        assert_eq!(dispatcher.available_permits(), 1);
    }
}
