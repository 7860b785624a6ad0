//! `test-utils` is used for testing in `parley-lib`.
//! This crate does not depend on `parley-lib`, else we would get dependency cycles.
//! Macros are used instead, so that the importer is responsible for providing the dependencies.

/// Create a mock web server, which responds with a predefined status when
/// handling any request
#[macro_export]
macro_rules! mock_server {
    ($status:expr $(, $func:tt ($($arg:expr),*))*) => {{
        let mock_server = wiremock::MockServer::start().await;
        let response_template = wiremock::ResponseTemplate::new(http::StatusCode::from($status));
        let template = response_template$(.$func($($arg),*))*;
        wiremock::Mock::given(wiremock::matchers::any()).respond_with(template).mount(&mock_server).await;
        mock_server
    }};
}

/// Compile a route template with the given parameters
///
/// # Panic
///
/// This panics if the number of parameters does not match the template, so
/// it should only be used for testing
#[macro_export]
macro_rules! route {
    ($template:expr $(, $param:expr)* $(,)?) => {
        $template
            .compile(&[$($param),*])
            .expect("Expected parameters to match the route template")
    };
}

/// Build the headers the server attaches to report a bucket's quota:
/// quota-group hash, limit, remaining requests and seconds until reset
#[macro_export]
macro_rules! quota_headers {
    ($bucket:expr, $limit:expr, $remaining:expr, $reset_after:expr $(,)?) => {{
        let mut headers = http::HeaderMap::new();
        for (name, value) in [
            ("x-ratelimit-bucket", $bucket.to_string()),
            ("x-ratelimit-limit", $limit.to_string()),
            ("x-ratelimit-remaining", $remaining.to_string()),
            ("x-ratelimit-reset-after", $reset_after.to_string()),
        ] {
            headers.insert(name, http::HeaderValue::from_str(&value).unwrap());
        }
        headers
    }};
}

/// JSON body of a `429 Too Many Requests` response
#[macro_export]
macro_rules! breach_body {
    ($retry_after:expr, $global:expr $(,)?) => {
        format!(
            r#"{{"message":"You are being rate limited.","retry_after":{},"global":{}}}"#,
            $retry_after, $global
        )
    };
}

/// A `429 Too Many Requests` response template as sent by the server,
/// with `Retry-After` header, global flag and JSON body
#[macro_export]
macro_rules! rate_limited_response {
    ($retry_after:expr, $global:expr $(,)?) => {{
        let template = wiremock::ResponseTemplate::new(429)
            .insert_header("retry-after", format!("{}", ($retry_after as f64).ceil()).as_str())
            .set_body_raw(
                $crate::breach_body!($retry_after, $global),
                "application/json",
            );
        if $global {
            template.insert_header("x-ratelimit-global", "true")
        } else {
            template.insert_header("x-ratelimit-scope", "user")
        }
    }};
}
