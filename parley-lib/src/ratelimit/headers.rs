//! Handle rate limiting headers.
//!
//! The server reports the quota of the bucket a request was counted against
//! on every response. Anything missing or unparsable is reported as absent
//! so that callers keep their last known state.

use http::{HeaderMap, HeaderValue};
use serde::Deserialize;
use std::time::{Duration, SystemTime};
use thiserror::Error;

pub(crate) const BUCKET: &str = "x-ratelimit-bucket";
pub(crate) const LIMIT: &str = "x-ratelimit-limit";
pub(crate) const REMAINING: &str = "x-ratelimit-remaining";
pub(crate) const RESET_AFTER: &str = "x-ratelimit-reset-after";
pub(crate) const GLOBAL: &str = "x-ratelimit-global";
pub(crate) const SCOPE: &str = "x-ratelimit-scope";
pub(crate) const RETRY_AFTER: &str = "retry-after";

#[derive(Debug, Error, PartialEq, Eq)]
pub(crate) enum HeaderParseError {
    #[error("Unable to parse value '{0}'")]
    ValueError(String),

    #[error("Header value contains invalid chars")]
    HeaderValueError,
}

/// The quota triple reported for one bucket
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Quota {
    pub(crate) limit: u32,
    pub(crate) remaining: u32,
    pub(crate) reset_after: Duration,
}

/// Everything the limiter consumes from a response's headers
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct RateLimitHeaders {
    /// Quota-group hash of the bucket the request was counted against
    pub(crate) bucket: Option<String>,
    /// Present only if limit, remaining and reset-after all parsed
    pub(crate) quota: Option<Quota>,
    /// Set if the triple was partially present or malformed
    pub(crate) malformed: bool,
    /// The response reports a process-wide limit
    pub(crate) global: bool,
    /// Fallback delay from the standard `Retry-After` header
    pub(crate) retry_after: Option<Duration>,
}

impl RateLimitHeaders {
    pub(crate) fn parse(headers: &HeaderMap) -> Self {
        let bucket = headers
            .get(BUCKET)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(ToString::to_string);

        let limit = parse_header(headers, LIMIT, |v| v.parse::<u32>().ok());
        let remaining = parse_header(headers, REMAINING, |v| v.parse::<u32>().ok());
        let reset_after = parse_header(headers, RESET_AFTER, parse_seconds);

        let (quota, malformed) = match (limit, remaining, reset_after) {
            (Some(Some(limit)), Some(Some(remaining)), Some(Some(reset_after))) => (
                Some(Quota {
                    limit,
                    remaining,
                    reset_after,
                }),
                false,
            ),
            (None, None, None) => (None, false),
            _ => (None, true),
        };

        let global = headers.contains_key(GLOBAL)
            || headers
                .get(SCOPE)
                .and_then(|v| v.to_str().ok())
                .is_some_and(|scope| scope.eq_ignore_ascii_case("global"));

        let retry_after = headers
            .get(RETRY_AFTER)
            .and_then(|value| parse_retry_after(value).ok());

        Self {
            bucket,
            quota,
            malformed,
            global,
            retry_after,
        }
    }
}

/// `Some(None)` means the header was present but could not be parsed
fn parse_header<T>(
    headers: &HeaderMap,
    name: &str,
    parse: impl Fn(&str) -> Option<T>,
) -> Option<Option<T>> {
    headers
        .get(name)
        .map(|value| value.to_str().ok().and_then(|v| parse(v.trim())))
}

/// Parse a non-negative, finite number of (fractional) seconds
pub(crate) fn parse_seconds(value: &str) -> Option<Duration> {
    value
        .parse::<f64>()
        .ok()
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
}

/// Body of a `429 Too Many Requests` response
#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
pub(crate) struct BreachBody {
    #[serde(default)]
    retry_after: f64,
    #[serde(default)]
    pub(crate) global: bool,
}

impl BreachBody {
    pub(crate) fn parse(body: &[u8]) -> Result<Self, HeaderParseError> {
        serde_json::from_slice(body)
            .map_err(|_| HeaderParseError::ValueError(String::from_utf8_lossy(body).into_owned()))
    }

    /// The requested delay, or `None` if it is negative or not a number
    pub(crate) fn retry_after(&self) -> Option<Duration> {
        Duration::try_from_secs_f64(self.retry_after).ok()
    }
}

/// Parse the "Retry-After" header as specified per
/// [RFC 7231 section 7.1.3](https://www.rfc-editor.org/rfc/rfc7231#section-7.1.3)
pub(crate) fn parse_retry_after(value: &HeaderValue) -> Result<Duration, HeaderParseError> {
    let value = value
        .to_str()
        .map_err(|_| HeaderParseError::HeaderValueError)?;

    // RFC 7231: Retry-After = HTTP-date / delay-seconds
    value.parse::<u64>().map(Duration::from_secs).or_else(|_| {
        httpdate::parse_http_date(value)
            .map(|s| {
                s.duration_since(SystemTime::now())
                    // if date is in the past, we can use ZERO
                    .unwrap_or(Duration::ZERO)
            })
            .map_err(|_| HeaderParseError::ValueError(value.into()))
    })
}
