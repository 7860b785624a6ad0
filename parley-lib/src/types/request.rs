use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll};
use tokio::sync::oneshot;
use tokio::time::Instant;

use crate::{ErrorKind, Payload, Response, Result, Route};

/// Shared flag used to cancel a request before it reaches the transport.
///
/// Cancellation is best effort: once the transport call has started, the
/// request runs to completion.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Mark the request as cancelled
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Whether [`CancelToken::cancel`] has been called
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// A request waiting in a bucket queue.
///
/// It is owned by exactly one queue at a time and is consumed by
/// [`Request::complete`], so it can never be answered twice.
#[derive(Debug)]
pub(crate) struct Request {
    pub(crate) route: Route,
    pub(crate) payload: Payload,
    pub(crate) submitted_at: Instant,
    cancel: CancelToken,
    completion: oneshot::Sender<Result<Response>>,
}

impl Request {
    /// Create a queued request together with the handle given to the caller
    pub(crate) fn new(route: Route, payload: Payload) -> (Self, RequestHandle) {
        let (completion, receiver) = oneshot::channel();
        let cancel = CancelToken::default();
        let request = Self {
            route,
            payload,
            submitted_at: Instant::now(),
            cancel: cancel.clone(),
            completion,
        };
        (request, RequestHandle { receiver, cancel })
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Hand the outcome to the caller. A caller that dropped its handle is
    /// not an error.
    pub(crate) fn complete(self, result: Result<Response>) {
        if self.completion.send(result).is_err() {
            log::debug!("Caller stopped waiting for {}", self.route);
        }
    }
}

/// Handle returned by [`crate::RateLimiter::submit`].
///
/// Awaiting it yields the response once the request has been executed, or
/// the error that prevented execution.
#[derive(Debug)]
pub struct RequestHandle {
    receiver: oneshot::Receiver<Result<Response>>,
    cancel: CancelToken,
}

impl RequestHandle {
    /// Cancel the request if it has not been sent yet
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// A token that can cancel this request while the handle is awaited
    #[must_use]
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }
}

impl Future for RequestHandle {
    type Output = Result<Response>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver)
            .poll(cx)
            .map(|result| result.unwrap_or(Err(ErrorKind::RequestDropped)))
    }
}
