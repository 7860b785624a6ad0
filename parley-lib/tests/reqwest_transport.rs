use std::time::{Duration, Instant};

use http::{Method, StatusCode};
use parley_lib::ratelimit::RateLimitConfig;
use parley_lib::{Payload, RateLimiter, ReqwestTransport, RouteTemplate};
use pretty_assertions::assert_eq;
use test_utils::{mock_server, rate_limited_response, route};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const GET_CHANNEL: RouteTemplate = RouteTemplate::new(Method::GET, "channels/{channel_id}");

#[tokio::test]
async fn test_learns_bucket_from_live_headers() {
    let mock_server = mock_server!(
        StatusCode::OK,
        insert_header("x-ratelimit-bucket", "41f9cd5d28af77da04563bcb1d67fdfd"),
        insert_header("x-ratelimit-limit", "5"),
        insert_header("x-ratelimit-remaining", "4"),
        insert_header("x-ratelimit-reset-after", "1.000")
    );
    let transport = ReqwestTransport::new(&mock_server.uri()).unwrap();
    let limiter = RateLimiter::new(RateLimitConfig::default(), transport);
    let route = route!(GET_CHANNEL, "1");

    let response = limiter
        .submit(route.clone(), Payload::empty())
        .unwrap()
        .await
        .unwrap();

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(
        limiter.bucket_key(&route).to_string(),
        "41f9cd5d28af77da04563bcb1d67fdfd:channel_id=1"
    );
    let state = limiter.registry().resolve(&route).state();
    assert_eq!((state.limit, state.remaining), (5, 4));
}

#[tokio::test]
async fn test_global_rate_limit_from_server() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/channels/1"))
        .respond_with(rate_limited_response!(0.5, true))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;

    let transport = ReqwestTransport::new(&mock_server.uri()).unwrap();
    let limiter = RateLimiter::new(RateLimitConfig::default(), transport);

    let start = Instant::now();
    let breached = limiter
        .submit(route!(GET_CHANNEL, "1"), Payload::empty())
        .unwrap()
        .await
        .unwrap();
    assert!(breached.is_rate_limited());
    assert!(limiter.global_cooldown_remaining() > Duration::ZERO);

    let response = limiter
        .submit(route!(GET_CHANNEL, "2"), Payload::empty())
        .unwrap()
        .await
        .unwrap();
    assert_eq!(response.status, StatusCode::OK);
    assert!(start.elapsed() >= Duration::from_millis(500));
}

#[tokio::test]
async fn test_rate_limited_bucket_from_server() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(rate_limited_response!(0.3, false))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;

    let transport = ReqwestTransport::new(&mock_server.uri()).unwrap();
    let limiter = RateLimiter::new(RateLimitConfig::default(), transport);

    let start = Instant::now();
    let first = limiter
        .submit(route!(GET_CHANNEL, "1"), Payload::empty())
        .unwrap();
    let second = limiter
        .submit(route!(GET_CHANNEL, "1"), Payload::empty())
        .unwrap();

    assert!(first.await.unwrap().is_rate_limited());
    assert_eq!(second.await.unwrap().status, StatusCode::OK);
    assert!(start.elapsed() >= Duration::from_millis(300));
    assert_eq!(limiter.global_cooldown_remaining(), Duration::ZERO);
}
