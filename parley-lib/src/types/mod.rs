#![allow(unreachable_pub)]

mod error;
mod request;
mod response;
mod route;

pub use error::ErrorKind;
pub(crate) use request::Request;
pub use request::{CancelToken, RequestHandle};
pub use response::{Payload, Response};
pub use route::{MAJOR_PARAMETERS, Route, RouteTemplate};

/// The parley `Result` type
pub type Result<T> = std::result::Result<T, crate::ErrorKind>;
