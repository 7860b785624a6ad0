use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

/// Number of queue times kept per bucket
const MAX_QUEUE_TIMES: usize = 256;

/// A [`HashMap`] mapping bucket identifiers to their [`BucketStats`]
#[derive(Debug, Default)]
pub struct BucketStatsMap(HashMap<String, BucketStats>);

impl BucketStatsMap {
    /// Sort bucket statistics by request count (descending order)
    #[must_use]
    pub fn sorted(&self) -> Vec<(String, BucketStats)> {
        let mut sorted: Vec<_> = self.0.clone().into_iter().collect();
        sorted.sort_by_key(|(_, stats)| std::cmp::Reverse(stats.total_requests));
        sorted
    }

    /// Statistics of a single bucket
    #[must_use]
    pub fn get(&self, bucket: &str) -> Option<&BucketStats> {
        self.0.get(bucket)
    }

    /// Number of buckets with statistics
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no bucket has been used yet
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<HashMap<String, BucketStats>> for BucketStatsMap {
    fn from(value: HashMap<String, BucketStats>) -> Self {
        Self(value)
    }
}

/// How a [`crate::ratelimit::Bucket`] paced its traffic: what happened to
/// its requests and how long they waited in the queue before being sent
#[derive(Debug, Clone, Default)]
pub struct BucketStats {
    /// Total number of requests that reached the transport
    pub total_requests: u64,
    /// Number of successful requests (2xx status)
    pub successful_requests: u64,
    /// Number of requests that received rate limit responses (429)
    pub rate_limited: u64,
    /// Number of server error responses (5xx)
    pub server_errors: u64,
    /// Number of client error responses (4xx, excluding 429)
    pub client_errors: u64,
    /// Number of requests that failed without a response
    pub transport_failures: u64,
    /// Number of requests dropped because they were cancelled
    pub cancelled: u64,
    /// Number of requests handed over to a newly discovered bucket
    pub migrated: u64,
    /// Number of times draining had to wait for the bucket's reset or the
    /// global cooldown
    pub delayed_drains: u64,
    /// Sum of all those waits
    pub total_delay: Duration,
    /// Time from submission to transport call of the most recent requests
    pub queue_times: Vec<Duration>,
    /// Status code counts
    pub status_codes: HashMap<u16, u64>,
}

impl BucketStats {
    /// Record a response with its status code and how long the request
    /// was queued
    pub fn record_response(&mut self, status_code: u16, queue_time: Duration) {
        self.total_requests += 1;
        *self.status_codes.entry(status_code).or_insert(0) += 1;

        match status_code {
            200..=299 => self.successful_requests += 1,
            429 => self.rate_limited += 1,
            400..=499 => self.client_errors += 1,
            500..=599 => self.server_errors += 1,
            _ => {}
        }

        self.record_queue_time(queue_time);
    }

    /// Record a request that failed in the transport
    pub fn record_transport_failure(&mut self, queue_time: Duration) {
        self.total_requests += 1;
        self.transport_failures += 1;
        self.record_queue_time(queue_time);
    }

    /// Record a request that was cancelled before it was sent
    pub const fn record_cancelled(&mut self) {
        self.cancelled += 1;
    }

    /// Record a request that moved to another bucket
    pub const fn record_migrated(&mut self) {
        self.migrated += 1;
    }

    /// Record a drain that was postponed by `delay`
    pub fn record_delay(&mut self, delay: Duration) {
        self.delayed_drains += 1;
        self.total_delay = self.total_delay.saturating_add(delay);
    }

    fn record_queue_time(&mut self, queue_time: Duration) {
        if self.queue_times.len() >= MAX_QUEUE_TIMES {
            self.queue_times.remove(0);
        }
        self.queue_times.push(queue_time);
    }

    /// Median time the recent requests spent queued
    #[must_use]
    pub fn median_queue_time(&self) -> Option<Duration> {
        if self.queue_times.is_empty() {
            return None;
        }

        let mut times = self.queue_times.clone();
        times.sort();
        let mid = times.len() / 2;

        if times.len().is_multiple_of(2) {
            Some((times[mid - 1] + times[mid]) / 2)
        } else {
            Some(times[mid])
        }
    }

    /// Longest time one of the recent requests spent queued
    #[must_use]
    pub fn max_queue_time(&self) -> Option<Duration> {
        self.queue_times.iter().max().copied()
    }

    /// Share of sent requests answered with 429, in percent
    #[must_use]
    pub fn rate_limited_ratio(&self) -> f64 {
        if self.total_requests == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let ratio = self.rate_limited as f64 / self.total_requests as f64;
        ratio * 100.0
    }

    /// Whether the bucket has seen traffic of any kind
    #[must_use]
    pub const fn is_idle(&self) -> bool {
        self.total_requests == 0 && self.cancelled == 0 && self.migrated == 0
    }

    /// One-line summary of the stats
    #[must_use]
    pub fn summary(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for BucketStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} sent ({} rate limited, {} failed), {} cancelled, {} migrated",
            self.total_requests,
            self.rate_limited,
            self.transport_failures,
            self.cancelled,
            self.migrated
        )?;
        if self.delayed_drains > 0 {
            write!(
                f,
                ", waited {}ms over {} delay(s)",
                self.total_delay.as_millis(),
                self.delayed_drains
            )?;
        }
        if let Some(median) = self.median_queue_time() {
            write!(f, ", median queue time {}ms", median.as_millis())?;
        }
        Ok(())
    }
}
