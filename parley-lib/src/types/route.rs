use http::Method;
use std::fmt;

use crate::{ErrorKind, Result};

/// Path parameters the server uses to split one endpoint into independent
/// quota scopes. Every other placeholder is substituted into the path but
/// shares the quota of its major parameters.
pub const MAJOR_PARAMETERS: &[&str] = &["channel_id", "guild_id", "webhook_id", "interaction_token"];

/// An endpoint template such as `GET channels/{channel_id}/messages`.
///
/// Templates are meant to be declared as constants and compiled into a
/// [`Route`] for every request.
///
/// # Examples
///
/// ```
/// use http::Method;
/// use parley_lib::RouteTemplate;
///
/// const CREATE_MESSAGE: RouteTemplate =
///     RouteTemplate::new(Method::POST, "channels/{channel_id}/messages");
///
/// let route = CREATE_MESSAGE.compile(&["1234"]).unwrap();
/// assert_eq!(route.path(), "channels/1234/messages");
/// assert_eq!(route.template_id(), "POST channels/{channel_id}/messages");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RouteTemplate {
    method: Method,
    path: &'static str,
}

impl RouteTemplate {
    /// Declare a new route template
    #[must_use]
    pub const fn new(method: Method, path: &'static str) -> Self {
        Self { method, path }
    }

    /// The HTTP method of this endpoint
    #[must_use]
    pub const fn method(&self) -> &Method {
        &self.method
    }

    /// The unsubstituted path, including `{name}` placeholders
    #[must_use]
    pub const fn path(&self) -> &'static str {
        self.path
    }

    /// Names of the placeholders in this template, in path order
    pub fn parameters(&self) -> impl Iterator<Item = &'static str> {
        self.path.split('/').filter_map(|segment| {
            segment
                .strip_prefix('{')
                .and_then(|rest| rest.strip_suffix('}'))
        })
    }

    /// Substitute `values` into the placeholders of this template.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::RouteArity`] if the number of values differs
    /// from the number of placeholders.
    pub fn compile(&self, values: &[&str]) -> Result<Route> {
        let expected = self.parameters().count();
        if expected != values.len() {
            return Err(ErrorKind::RouteArity {
                template: self.path.to_string(),
                expected,
                provided: values.len(),
            });
        }

        let mut values = values.iter();
        let mut major = Vec::new();
        let segments: Vec<String> = self
            .path
            .split('/')
            .map(|segment| {
                let Some(name) = segment
                    .strip_prefix('{')
                    .and_then(|rest| rest.strip_suffix('}'))
                else {
                    return segment.to_string();
                };
                // Arity was checked above
                let value = values.next().copied().unwrap_or_default();
                if MAJOR_PARAMETERS.contains(&name) {
                    major.push((name.to_string(), value.to_string()));
                }
                value.to_string()
            })
            .collect();

        Ok(Route {
            template_id: format!("{} {}", self.method, self.path),
            method: self.method.clone(),
            path: segments.join("/"),
            major,
        })
    }
}

/// A compiled route: one concrete endpoint plus the major parameters that
/// select its quota scope. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Route {
    template_id: String,
    method: Method,
    path: String,
    major: Vec<(String, String)>,
}

impl Route {
    /// Identifier of the template this route was compiled from,
    /// e.g. `GET channels/{channel_id}/messages`
    #[must_use]
    pub fn template_id(&self) -> &str {
        &self.template_id
    }

    /// HTTP method of the request
    #[must_use]
    pub const fn method(&self) -> &Method {
        &self.method
    }

    /// Fully substituted request path, relative to the API base URL
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The major parameters as ordered `(key, value)` pairs
    #[must_use]
    pub fn major_parameters(&self) -> &[(String, String)] {
        &self.major
    }

    /// Render the major parameters as `key=value` pairs joined by `&`,
    /// or `n/a` when the route has none
    #[must_use]
    pub fn major_parameters_string(&self) -> String {
        if self.major.is_empty() {
            return "n/a".to_string();
        }
        self.major
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect::<Vec<_>>()
            .join("&")
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path)
    }
}
