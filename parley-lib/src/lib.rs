//! `parley` paces requests to a chat platform's HTTP API so that they stay
//! within the rate limits the server reports.
//!
//! Requests are submitted without blocking and grouped into buckets that
//! share one quota. Each bucket sends its requests in submission order, one
//! at a time, waiting whenever its quota is used up or the server asked all
//! clients to back off.
//!
//! ```no_run
//! use http::Method;
//! use parley_lib::ratelimit::RateLimitConfig;
//! use parley_lib::{Payload, RateLimiter, ReqwestTransport, Result, RouteTemplate};
//!
//! const GET_CHANNEL: RouteTemplate = RouteTemplate::new(Method::GET, "channels/{channel_id}");
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!   let transport = ReqwestTransport::new("https://discord.com/api/v10")?;
//!   let limiter = RateLimiter::new(RateLimitConfig::default(), transport);
//!
//!   let route = GET_CHANNEL.compile(&["41771983423143937"])?;
//!   let response = limiter.submit(route, Payload::empty())?.await?;
//!   assert!(response.status.is_success());
//!   Ok(())
//! }
//! ```
//!
//! Any HTTP client can be plugged in by implementing [`Transport`].
// #![deny(missing_docs)]

mod transport;
mod types;

pub mod ratelimit;

pub use ratelimit::RateLimiter;
pub use transport::{ReqwestTransport, Transport};
pub use types::*;
