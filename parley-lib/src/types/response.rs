use http::{HeaderMap, HeaderValue, StatusCode, header};
use serde::{Serialize, de::DeserializeOwned};
use std::fmt::Display;

use crate::Result;

/// Headers and body handed to the transport together with a [`crate::Route`].
/// The limiter never looks inside.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Payload {
    /// Extra request headers (content type, audit log reason, ...)
    pub headers: HeaderMap,
    /// Raw request body
    pub body: Option<Vec<u8>>,
}

impl Payload {
    /// A payload without headers or body
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Serialize `value` as a JSON body
    ///
    /// # Errors
    ///
    /// Returns [`crate::ErrorKind::Json`] if `value` cannot be serialized.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        Ok(Self {
            headers,
            body: Some(serde_json::to_vec(value)?),
        })
    }
}

/// A fully read HTTP response as returned by a [`crate::Transport`].
///
/// Every status, including `429 Too Many Requests`, is a response rather than
/// an error; the caller decides what a status means for them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Status code of the response
    pub status: StatusCode,
    /// All response headers
    pub headers: HeaderMap,
    /// The complete response body
    pub body: Vec<u8>,
}

impl Response {
    /// Create a new response
    #[inline]
    #[must_use]
    pub const fn new(status: StatusCode, headers: HeaderMap, body: Vec<u8>) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// Returns `true` if the server rejected the request because a quota was
    /// exhausted
    #[inline]
    #[must_use]
    pub fn is_rate_limited(&self) -> bool {
        self.status == StatusCode::TOO_MANY_REQUESTS
    }

    /// Decode the body as JSON
    ///
    /// # Errors
    ///
    /// Returns [`crate::ErrorKind::Json`] if the body is not valid JSON for `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

impl Display for Response {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}] {} ({} bytes)",
            self.status.as_u16(),
            self.status.canonical_reason().unwrap_or("Unknown status code"),
            self.body.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Message {
        content: String,
    }

    #[test]
    fn test_json_payload() {
        let payload = Payload::json(&Message {
            content: "hello".into(),
        })
        .unwrap();
        assert_eq!(
            payload.headers.get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
        assert_eq!(payload.body.as_deref(), Some(&b"{\"content\":\"hello\"}"[..]));
    }

    #[test]
    fn test_response_helpers() {
        let response = Response::new(
            StatusCode::OK,
            HeaderMap::new(),
            b"{\"content\":\"hi\"}".to_vec(),
        );
        assert!(!response.is_rate_limited());
        assert_eq!(
            response.json::<Message>().unwrap(),
            Message {
                content: "hi".into()
            }
        );
        assert_eq!(response.to_string(), "[200] OK (16 bytes)");

        let limited = Response::new(StatusCode::TOO_MANY_REQUESTS, HeaderMap::new(), vec![]);
        assert!(limited.is_rate_limited());
        assert!(limited.json::<Message>().is_err());
    }
}
