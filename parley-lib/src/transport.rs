use async_trait::async_trait;
use reqwest::Client;
use url::Url;

use crate::{ErrorKind, Payload, Response, Result, Route};

/// Performs the actual network call for a request.
///
/// The rate limiter awaits each call before it sends the next request of the
/// same bucket. Every HTTP status must be returned as a [`Response`];
/// `Err` is reserved for requests that produced no response at all, and is
/// passed to the caller unchanged without any retry.
#[async_trait]
pub trait Transport: Send + Sync + std::fmt::Debug {
    /// Send `payload` to `route` and return the complete response
    async fn execute(&self, route: &Route, payload: &Payload) -> Result<Response>;
}

/// [`Transport`] backed by a `reqwest` client.
///
/// Route paths are resolved relative to the base URL, so
/// `https://discord.com/api/v10/` and `channels/1/messages` become
/// `https://discord.com/api/v10/channels/1/messages`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
    base_url: Url,
}

impl ReqwestTransport {
    /// Create a transport with a default client
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::InvalidBaseUrl`] if `base_url` cannot be parsed.
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_client(Client::new(), base_url)
    }

    /// Create a transport that sends requests through `client`
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::InvalidBaseUrl`] if `base_url` cannot be parsed.
    pub fn with_client(client: Client, base_url: &str) -> Result<Self> {
        let mut base_url = Url::parse(base_url)?;
        // Without a trailing slash `join` would replace the last segment
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self { client, base_url })
    }

    /// The URL all route paths are resolved against
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The absolute URL for `route`
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::InvalidBaseUrl`] if the route path cannot be
    /// joined onto the base URL.
    pub fn url(&self, route: &Route) -> Result<Url> {
        Ok(self.base_url.join(route.path())?)
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(&self, route: &Route, payload: &Payload) -> Result<Response> {
        let mut request = self
            .client
            .request(route.method().clone(), self.url(route)?)
            .headers(payload.headers.clone());
        if let Some(body) = &payload.body {
            request = request.body(body.clone());
        }

        let response = request.send().await.map_err(ErrorKind::NetworkRequest)?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(ErrorKind::NetworkRequest)?
            .to_vec();

        Ok(Response::new(status, headers, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RouteTemplate;
    use http::{Method, StatusCode};
    use wiremock::matchers::{body_string, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const CREATE_MESSAGE: RouteTemplate =
        RouteTemplate::new(Method::POST, "channels/{channel_id}/messages");

    #[test]
    fn test_base_url_gets_trailing_slash() {
        let transport = ReqwestTransport::new("https://discord.com/api/v10").unwrap();
        let route = CREATE_MESSAGE.compile(&["1"]).unwrap();
        assert_eq!(
            transport.url(&route).unwrap().as_str(),
            "https://discord.com/api/v10/channels/1/messages"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(matches!(
            ReqwestTransport::new("not a url"),
            Err(ErrorKind::InvalidBaseUrl(_))
        ));
    }

    #[tokio::test]
    async fn test_execute_sends_payload() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/channels/7/messages"))
            .and(header("content-type", "application/json"))
            .and(body_string(r#"{"content":"hi"}"#))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("X-RateLimit-Bucket", "abc")
                    .set_body_string(r#"{"id":"1"}"#),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let transport = ReqwestTransport::new(&format!("{}/api", mock_server.uri())).unwrap();
        let route = CREATE_MESSAGE.compile(&["7"]).unwrap();
        let payload = Payload::json(&serde_json::json!({"content": "hi"})).unwrap();

        let response = transport.execute(&route, &payload).await.unwrap();
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.headers.get("x-ratelimit-bucket").unwrap(), "abc");
        assert_eq!(response.body, br#"{"id":"1"}"#);
    }

    #[tokio::test]
    async fn test_rate_limit_status_is_a_response() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(429).set_body_string(r#"{"retry_after":1.0,"global":false}"#),
            )
            .mount(&mock_server)
            .await;

        let transport = ReqwestTransport::new(&mock_server.uri()).unwrap();
        let route = CREATE_MESSAGE.compile(&["7"]).unwrap();
        let response = transport.execute(&route, &Payload::empty()).await.unwrap();
        assert!(response.is_rate_limited());
    }

    #[tokio::test]
    async fn test_connection_failure_is_an_error() {
        let transport = ReqwestTransport::new("http://127.0.0.1:9").unwrap();
        let route = CREATE_MESSAGE.compile(&["7"]).unwrap();
        let error = transport
            .execute(&route, &Payload::empty())
            .await
            .unwrap_err();
        assert!(error.is_transport_failure());
        assert!(error.reqwest_error().is_some());
    }
}
