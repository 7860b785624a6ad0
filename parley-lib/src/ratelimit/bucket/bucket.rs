use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

use super::key::BucketKey;
use super::stats::BucketStats;
use crate::ratelimit::headers::Quota;
use crate::types::Request;

/// The quota a bucket last learned from the server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketState {
    /// Requests allowed per window
    pub limit: u32,
    /// Requests left in the current window
    pub remaining: u32,
    /// When the current window ends
    pub reset_at: Instant,
}

impl BucketState {
    /// A fresh bucket allows exactly one request before the server has to
    /// tell us more
    fn fresh(now: Instant) -> Self {
        Self {
            limit: 1,
            remaining: 1,
            reset_at: now,
        }
    }
}

/// Per-scope rate limiting state: a FIFO queue of pending requests and the
/// quota last reported by the server.
///
/// A bucket holds no execution logic. The dispatcher drains it, and the
/// `scheduled` flag guarantees that at most one drain is pending or running
/// for a bucket at any time. Producers only ever push to the back of the
/// queue; only the drain holding the flag pops from the front.
#[derive(Debug)]
pub struct Bucket {
    key: BucketKey,
    queue: Mutex<VecDeque<Request>>,
    state: Mutex<BucketState>,
    scheduled: AtomicBool,
    stats: Mutex<BucketStats>,
}

/// Latest a bucket can be told to wait, the same horizon tokio uses for
/// timers that never fire
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

fn deadline(now: Instant, after: Duration) -> Instant {
    now.checked_add(after.min(FAR_FUTURE)).unwrap_or(now)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // None of the guarded sections can leave the data half-updated
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Bucket {
    /// Create an idle bucket with an empty queue
    #[must_use]
    pub fn new(key: BucketKey) -> Self {
        Self {
            key,
            queue: Mutex::new(VecDeque::new()),
            state: Mutex::new(BucketState::fresh(Instant::now())),
            scheduled: AtomicBool::new(false),
            stats: Mutex::new(BucketStats::default()),
        }
    }

    /// The identifier of this bucket
    #[must_use]
    pub const fn key(&self) -> &BucketKey {
        &self.key
    }

    /// Number of requests waiting in this bucket
    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.queue).len()
    }

    /// Whether no request is waiting in this bucket
    #[must_use]
    pub fn is_empty(&self) -> bool {
        lock(&self.queue).is_empty()
    }

    /// Whether a drain is currently pending or running
    #[must_use]
    pub fn is_scheduled(&self) -> bool {
        self.scheduled.load(Ordering::Acquire)
    }

    /// Snapshot of the last known quota
    #[must_use]
    pub fn state(&self) -> BucketState {
        *lock(&self.state)
    }

    /// Snapshot of the bucket statistics
    #[must_use]
    pub fn stats(&self) -> BucketStats {
        lock(&self.stats).clone()
    }

    pub(crate) fn push(&self, request: Request) {
        lock(&self.queue).push_back(request);
    }

    pub(crate) fn pop(&self) -> Option<Request> {
        lock(&self.queue).pop_front()
    }

    /// Inspect the request at the head of the queue
    pub(crate) fn peek<R>(&self, f: impl FnOnce(&Request) -> R) -> Option<R> {
        lock(&self.queue).front().map(f)
    }

    /// Take every queued request out of the bucket
    pub(crate) fn take_all(&self) -> Vec<Request> {
        lock(&self.queue).drain(..).collect()
    }

    /// Claim the right to drain this bucket.
    /// Returns `false` if another drain already holds it.
    pub(crate) fn try_claim(&self) -> bool {
        self.scheduled
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Give up the claim taken by [`Bucket::try_claim`]
    pub(crate) fn release(&self) {
        self.scheduled.store(false, Ordering::Release);
    }

    /// How long this bucket itself must wait before sending again.
    ///
    /// Once the reset time has passed, `remaining` is restored to `limit`
    /// so that stale headers never delay a request.
    pub(crate) fn local_delay(&self, now: Instant) -> Duration {
        let mut state = lock(&self.state);
        if now >= state.reset_at {
            state.remaining = state.limit;
            return Duration::ZERO;
        }
        if state.remaining >= 1 {
            Duration::ZERO
        } else {
            state.reset_at - now
        }
    }

    /// Replace the quota with what the server reported
    pub(crate) fn apply_quota(&self, quota: Quota, now: Instant) {
        let mut state = lock(&self.state);
        state.limit = quota.limit;
        state.remaining = quota.remaining;
        state.reset_at = deadline(now, quota.reset_after);
    }

    /// Block this bucket until `now + retry_after` after a breach that came
    /// without a usable quota
    pub(crate) fn apply_breach(&self, retry_after: Duration, now: Instant) {
        let mut state = lock(&self.state);
        state.remaining = 0;
        state.reset_at = state.reset_at.max(deadline(now, retry_after));
    }

    pub(crate) fn record(&self, f: impl FnOnce(&mut BucketStats)) {
        f(&mut lock(&self.stats));
    }
}
