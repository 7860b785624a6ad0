//! Drains a single bucket.
//!
//! A drain runs only while it holds the bucket's claim, so requests of one
//! bucket are sent one after another in queue order. Every path out of
//! [`drain`] either empties the queue, hands the claim to a new drain (after
//! a delay, or after a batch so that other buckets get a permit), or
//! releases the claim and re-checks for requests that arrived meanwhile.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::ratelimit::headers::{BreachBody, Quota, RateLimitHeaders};
use crate::ratelimit::{Bucket, BucketStats, Dispatcher};
use crate::types::Request;
use crate::{ErrorKind, Response, Route};

/// Send the queued requests of `bucket` until it is empty or rate limited
pub(crate) async fn drain(dispatcher: &Arc<Dispatcher>, bucket: &Arc<Bucket>) {
    let mut sent = 0;
    loop {
        if dispatcher.is_stopped() {
            reject_queued(bucket);
        }

        if bucket.key().is_unclassified() && migrate_head(dispatcher, bucket) {
            continue;
        }

        match bucket.peek(Request::is_cancelled) {
            None => {
                finish(dispatcher, bucket);
                return;
            }
            Some(true) => {
                if let Some(request) = bucket.pop() {
                    discard(bucket, request);
                }
                continue;
            }
            Some(false) => {}
        }

        let delay = dispatcher.delay_for(bucket);
        if !delay.is_zero() {
            // The claim moves to the delayed drain
            dispatcher.spawn(bucket.clone(), delay);
            return;
        }

        let Some(request) = bucket.pop() else {
            continue;
        };
        if request.is_cancelled() {
            discard(bucket, request);
            continue;
        }
        execute(dispatcher, bucket, request).await;

        sent += 1;
        if sent >= dispatcher.config.max_drain_batch && !bucket.is_empty() {
            // Queue for a permit again behind buckets that are waiting for one
            log::debug!(
                "Bucket {} sent {sent} requests in a row, yielding its drain permit",
                bucket.key()
            );
            dispatcher.spawn(bucket.clone(), Duration::ZERO);
            return;
        }
    }
}

/// Complete everything still queued in a bucket whose drain can no longer
/// run, and give up its claim
pub(crate) fn abandon(dispatcher: &Arc<Dispatcher>, bucket: &Arc<Bucket>) {
    reject_queued(bucket);
    finish(dispatcher, bucket);
}

/// Resolve every queued request of `bucket` with [`ErrorKind::Shutdown`]
pub(crate) fn reject_queued(bucket: &Bucket) {
    for request in bucket.take_all() {
        request.complete(Err(ErrorKind::Shutdown));
    }
}

fn discard(bucket: &Bucket, request: Request) {
    log::debug!("Skipping cancelled request {}", request.route);
    bucket.record(BucketStats::record_cancelled);
    request.complete(Err(ErrorKind::Cancelled));
}

fn finish(dispatcher: &Arc<Dispatcher>, bucket: &Arc<Bucket>) {
    bucket.release();
    // A producer may have pushed after the queue looked empty but before the
    // claim was released; its own schedule attempt saw the claim still held.
    if !bucket.is_empty() {
        dispatcher.schedule(bucket);
    }
}

/// Move the head of the unclassified bucket to its real bucket once the
/// route's quota group is known. Returns `true` if a request was moved.
fn migrate_head(dispatcher: &Arc<Dispatcher>, bucket: &Bucket) -> bool {
    let Some(route) = bucket.peek(|request| request.route.clone()) else {
        return false;
    };
    let target = dispatcher.registry.resolve(&route);
    if target.key().is_unclassified() {
        return false;
    }
    let Some(request) = bucket.pop() else {
        return false;
    };

    log::debug!("Moving {route} from unclassified bucket to {}", target.key());
    bucket.record(BucketStats::record_migrated);
    dispatcher.enqueue(&target, request);
    true
}

async fn execute(dispatcher: &Arc<Dispatcher>, bucket: &Bucket, request: Request) {
    let queue_time = request.submitted_at.elapsed();
    let result = dispatcher
        .transport
        .execute(&request.route, &request.payload)
        .await;

    match result {
        Ok(response) => {
            bucket.record(|stats| stats.record_response(response.status.as_u16(), queue_time));
            observe(dispatcher, &request.route, &response);
            request.complete(Ok(response));
        }
        Err(error) => {
            log::debug!("Request {} failed: {error}", request.route);
            bucket.record(|stats| stats.record_transport_failure(queue_time));
            request.complete(Err(error));
        }
    }
}

/// Update bucket and global state from a response.
///
/// The quota in the headers belongs to the bucket the route resolves to
/// after the reported hash has been learned, which for a route sent from
/// the unclassified bucket is its newly discovered bucket.
fn observe(dispatcher: &Dispatcher, route: &Route, response: &Response) {
    let now = Instant::now();
    let headers = RateLimitHeaders::parse(&response.headers);

    if let Some(hash) = &headers.bucket {
        dispatcher.registry.learn(route.template_id(), hash);
    }
    let target = dispatcher.registry.resolve(route);

    if headers.malformed {
        log::warn!(
            "Ignoring malformed rate limit headers from {route}, keeping last known state of bucket {}",
            target.key()
        );
    }
    // The shared unclassified bucket never adopts one route's quota
    let max_delay = dispatcher.config.max_retry_after;
    let quota_applied = match headers.quota {
        Some(quota) if !target.key().is_unclassified() => {
            let reset_after = cap_delay(quota.reset_after, max_delay);
            target.apply_quota(
                Quota {
                    reset_after,
                    ..quota
                },
                now,
            );
            true
        }
        _ => false,
    };

    if !response.is_rate_limited() {
        return;
    }

    let body = match BreachBody::parse(&response.body) {
        Ok(body) => Some(body),
        Err(e) => {
            log::warn!("Unable to read rate limit body from {route}: {e}");
            None
        }
    };
    let global = headers.global || body.is_some_and(|body| body.global);
    let retry_after = body
        .and_then(|body| body.retry_after())
        .or(headers.retry_after)
        .map(|delay| cap_delay(delay, max_delay));

    match (global, retry_after) {
        (true, Some(delay)) => dispatcher.cooldown.raise(delay),
        (false, Some(delay)) if !quota_applied => target.apply_breach(delay, now),
        (false, _) => log::debug!("Bucket {} hit its rate limit on {route}", target.key()),
        (true, None) => log::warn!("Global rate limit reported by {route} without a retry delay"),
    }
}

/// Clamp a server supplied delay to the configured maximum
fn cap_delay(delay: Duration, max: Duration) -> Duration {
    if delay > max {
        log::warn!(
            "Capping server delay of {}s to {}s",
            delay.as_secs(),
            max.as_secs()
        );
        max
    } else {
        delay
    }
}
