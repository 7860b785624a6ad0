use std::hash::Hash;
use thiserror::Error;

/// Possible errors when submitting requests through `parley_lib`
///
/// Only two classes of failure ever reach a caller: mistakes made while
/// building a request ([`ErrorKind::RouteArity`]) and failures of the
/// transport underneath the limiter. Rate limit breaches are flow control
/// and are never reported through this type.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ErrorKind {
    /// A route template was compiled with the wrong number of parameters
    #[error(
        "Error compiling route `{template}`: expected {expected} parameter(s), provided {provided}"
    )]
    RouteArity {
        /// The template path that was being compiled
        template: String,
        /// Number of placeholders in the template
        expected: usize,
        /// Number of values supplied by the caller
        provided: usize,
    },

    /// Network error while executing a request via reqwest
    #[error("Network error while executing request: {0}")]
    NetworkRequest(#[source] reqwest::Error),

    /// Any other failure reported by a custom transport
    #[error("Transport failure: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The base URL of the HTTP transport is not usable
    #[error("Invalid base URL: {0}")]
    InvalidBaseUrl(#[from] url::ParseError),

    /// The request was cancelled before it reached the transport
    #[error("Request was cancelled before it was sent")]
    Cancelled,

    /// The rate limiter was shut down before the request was sent
    #[error("Rate limiter has been shut down")]
    Shutdown,

    /// The request was dropped without being completed
    #[error("Request was dropped before completion")]
    RequestDropped,

    /// The rate limit configuration could not be parsed
    #[error("Invalid rate limit configuration: {0}")]
    InvalidConfig(#[from] toml::de::Error),

    /// A payload or response body could not be (de)serialized
    #[error("JSON (de)serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

impl ErrorKind {
    /// Wrap an arbitrary error raised by a custom transport
    pub fn transport<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::Transport(error.into())
    }

    /// Returns `true` if the error happened while talking to the network,
    /// as opposed to being raised by the limiter itself
    #[must_use]
    pub const fn is_transport_failure(&self) -> bool {
        matches!(self, Self::NetworkRequest(_) | Self::Transport(_))
    }

    /// Return the underlying source of the given [`ErrorKind`]
    /// if it is a `reqwest::Error`.
    #[must_use]
    pub const fn reqwest_error(&self) -> Option<&reqwest::Error> {
        match self {
            Self::NetworkRequest(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ErrorKind {
    fn from(e: reqwest::Error) -> Self {
        Self::NetworkRequest(e)
    }
}

impl PartialEq for ErrorKind {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (
                Self::RouteArity {
                    template: t1,
                    expected: e1,
                    provided: p1,
                },
                Self::RouteArity {
                    template: t2,
                    expected: e2,
                    provided: p2,
                },
            ) => t1 == t2 && e1 == e2 && p1 == p2,
            (Self::NetworkRequest(e1), Self::NetworkRequest(e2)) => {
                e1.to_string() == e2.to_string()
            }
            (Self::Transport(e1), Self::Transport(e2)) => e1.to_string() == e2.to_string(),
            (Self::InvalidBaseUrl(e1), Self::InvalidBaseUrl(e2)) => e1 == e2,
            (Self::InvalidConfig(e1), Self::InvalidConfig(e2)) => e1.to_string() == e2.to_string(),
            (Self::Json(e1), Self::Json(e2)) => e1.to_string() == e2.to_string(),
            (Self::Cancelled, Self::Cancelled)
            | (Self::Shutdown, Self::Shutdown)
            | (Self::RequestDropped, Self::RequestDropped) => true,
            _ => false,
        }
    }
}

impl Eq for ErrorKind {}

impl Hash for ErrorKind {
    fn hash<H>(&self, state: &mut H)
    where
        H: std::hash::Hasher,
    {
        match self {
            Self::RouteArity {
                template,
                expected,
                provided,
            } => (template, expected, provided).hash(state),
            Self::NetworkRequest(e) => e.to_string().hash(state),
            Self::Transport(e) => e.to_string().hash(state),
            Self::InvalidBaseUrl(e) => e.to_string().hash(state),
            Self::InvalidConfig(e) => e.to_string().hash(state),
            Self::Json(e) => e.to_string().hash(state),
            Self::Cancelled | Self::Shutdown | Self::RequestDropped => {
                std::mem::discriminant(self).hash(state);
            }
        }
    }
}
