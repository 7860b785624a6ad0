use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;

use crate::ratelimit::{
    BucketKey, BucketRegistry, BucketStatsMap, Dispatcher, RateLimitConfig, worker,
};
use crate::types::Request;
use crate::{ErrorKind, Payload, RequestHandle, Result, Route, Transport};

/// Admits outbound API requests and releases them to the transport at the
/// pace the server allows.
///
/// # Architecture
///
/// - Each submitted [`Route`] is resolved to a bucket by the
///   [`BucketRegistry`]
/// - Requests wait in their bucket's FIFO queue until the bucket and the
///   global cooldown allow them to be sent
/// - One drain at a time per bucket sends queued requests and learns the
///   bucket quotas from the responses
/// - Different buckets drain in parallel, up to
///   [`RateLimitConfig::max_concurrent_drains`]
///
/// Cloning is cheap; all clones share the same buckets.
///
/// # Examples
///
/// ```no_run
/// use http::Method;
/// use parley_lib::{Payload, RateLimiter, ReqwestTransport, RouteTemplate};
/// use parley_lib::ratelimit::RateLimitConfig;
///
/// const CREATE_MESSAGE: RouteTemplate =
///     RouteTemplate::new(Method::POST, "channels/{channel_id}/messages");
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let transport = ReqwestTransport::new("https://discord.com/api/v10")?;
/// let limiter = RateLimiter::new(RateLimitConfig::default(), transport);
///
/// let route = CREATE_MESSAGE.compile(&["1234"])?;
/// let payload = Payload::json(&serde_json::json!({ "content": "hello" }))?;
/// let response = limiter.submit(route, payload)?.await?;
/// println!("{response}");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct RateLimiter {
    dispatcher: Arc<Dispatcher>,
}

impl RateLimiter {
    /// Create a rate limiter sending requests through `transport`
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime. Drains run on the
    /// runtime that was current when the limiter was created.
    #[must_use]
    pub fn new(config: RateLimitConfig, transport: impl Transport + 'static) -> Self {
        Self::with_shared_transport(config, Arc::new(transport))
    }

    /// Create a rate limiter from a transport that is shared with other code
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime.
    #[must_use]
    pub fn with_shared_transport(config: RateLimitConfig, transport: Arc<dyn Transport>) -> Self {
        Self::with_runtime(config, transport, Handle::current())
    }

    /// Create a rate limiter whose drains run on the given runtime
    #[must_use]
    pub fn with_runtime(
        config: RateLimitConfig,
        transport: Arc<dyn Transport>,
        runtime: Handle,
    ) -> Self {
        Self {
            dispatcher: Arc::new(Dispatcher::new(config, transport, runtime)),
        }
    }

    /// Queue a request and return a handle that resolves once it has been
    /// sent.
    ///
    /// Never blocks: the request is sent later by the drain of its bucket.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::Shutdown`] if [`RateLimiter::shutdown`] was called.
    pub fn submit(&self, route: Route, payload: Payload) -> Result<RequestHandle> {
        if self.dispatcher.is_stopped() {
            return Err(ErrorKind::Shutdown);
        }

        let bucket = self.dispatcher.registry.resolve(&route);
        let (request, handle) = Request::new(route, payload);
        self.dispatcher.enqueue(&bucket, request);
        Ok(handle)
    }

    /// Cancel a request if it has not been sent yet
    pub fn cancel(&self, handle: &RequestHandle) {
        handle.cancel();
    }

    /// Stop the rate limiter.
    ///
    /// Queued requests resolve to [`ErrorKind::Shutdown`] and later
    /// submissions are rejected. Requests already handed to the transport
    /// complete normally.
    pub fn shutdown(&self) {
        if !self.dispatcher.stop() {
            return;
        }
        log::debug!("Shutting down rate limiter");
        // Pending drains find their queue empty or fail to get a permit
        for bucket in self.dispatcher.registry.buckets() {
            worker::reject_queued(&bucket);
            let stats = bucket.stats();
            if !stats.is_idle() {
                log::debug!("Bucket {}: {stats}", bucket.key());
            }
        }
    }

    /// Whether [`RateLimiter::shutdown`] has been called
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.dispatcher.is_stopped()
    }

    /// The registry mapping routes to buckets
    #[must_use]
    pub fn registry(&self) -> &BucketRegistry {
        &self.dispatcher.registry
    }

    /// The bucket `route` would be queued in right now
    #[must_use]
    pub fn bucket_key(&self, route: &Route) -> BucketKey {
        self.dispatcher.registry.resolve(route).key().clone()
    }

    /// The quota-group hash learned for a route template, if any
    #[must_use]
    pub fn known_hash(&self, template_id: &str) -> Option<String> {
        self.dispatcher.registry.known_hash(template_id)
    }

    /// Number of buckets created so far
    #[must_use]
    pub fn bucket_count(&self) -> usize {
        self.dispatcher.registry.len()
    }

    /// Number of requests waiting in all buckets
    #[must_use]
    pub fn queued_requests(&self) -> usize {
        self.dispatcher
            .registry
            .buckets()
            .iter()
            .map(|bucket| bucket.len())
            .sum()
    }

    /// Time left until the global cooldown expires
    #[must_use]
    pub fn global_cooldown_remaining(&self) -> Duration {
        self.dispatcher.cooldown.remaining()
    }

    /// Number of additional buckets that could start draining right now
    #[must_use]
    pub fn available_drain_permits(&self) -> usize {
        self.dispatcher.available_permits()
    }

    /// Statistics of every bucket that has been used
    #[must_use]
    pub fn bucket_stats(&self) -> BucketStatsMap {
        self.dispatcher
            .registry
            .buckets()
            .iter()
            .map(|bucket| (bucket.key().to_string(), bucket.stats()))
            .collect::<HashMap<_, _>>()
            .into()
    }
}
