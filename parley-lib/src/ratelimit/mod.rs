//! Per-bucket rate limiting and pacing of outbound API requests.
//!
//! The server groups routes into buckets that share one quota and reports
//! the state of that quota on every response. This module queues requests
//! per bucket and releases them no faster than the reported quotas and the
//! global cooldown allow.
//!
//! # Architecture
//!
//! - [`BucketKey`]: Identifies a bucket, either by the quota-group hash the
//!   server reported plus the route's major parameters, or by route template
//! - [`Bucket`]: FIFO queue and last known quota of a single bucket
//! - [`BucketRegistry`]: Maps routes to buckets and remembers learned hashes
//! - [`GlobalCooldown`]: Process-wide barrier raised by global rate limits
//! - [`RateLimiter`]: Admits requests and drives the drains of all buckets
//! - [`RateLimitConfig`]: Configuration for the rate limiter
//! - [`BucketStats`]: Statistics tracking for each bucket

mod bucket;
mod config;
mod cooldown;
mod dispatcher;
mod headers;
mod limiter;
mod registry;
mod worker;

pub use bucket::{Bucket, BucketKey, BucketState, BucketStats, BucketStatsMap};
pub use config::{BucketStrategy, RateLimitConfig};
pub use cooldown::GlobalCooldown;
pub(crate) use dispatcher::Dispatcher;
pub use limiter::RateLimiter;
pub use registry::BucketRegistry;
