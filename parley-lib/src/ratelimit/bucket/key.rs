use serde::Serialize;
use std::fmt;

use crate::Route;

/// Identifies one bucket, i.e. one independent quota scope.
///
/// # Examples
///
/// ```
/// use http::Method;
/// use parley_lib::RouteTemplate;
/// use parley_lib::ratelimit::BucketKey;
///
/// let route = RouteTemplate::new(Method::GET, "channels/{channel_id}/pins")
///     .compile(&["42"])
///     .unwrap();
/// let key = BucketKey::hashed("abcd", &route);
/// assert_eq!(key.to_string(), "abcd:channel_id=42");
/// assert_eq!(BucketKey::Unclassified.to_string(), "unclassified");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "String")]
pub enum BucketKey {
    /// The shared bucket for routes whose quota group is not known yet
    Unclassified,
    /// A quota group reported by the server, scoped by major parameters
    Hashed {
        /// The quota-group hash
        hash: String,
        /// The rendered major parameters of the route
        major: String,
    },
    /// A route template scoped by major parameters
    BaseRoute {
        /// The route template identifier
        template: String,
        /// The rendered major parameters of the route
        major: String,
    },
}

impl BucketKey {
    /// The bucket for `route` within the quota group `hash`
    #[must_use]
    pub fn hashed(hash: &str, route: &Route) -> Self {
        Self::Hashed {
            hash: hash.to_string(),
            major: route.major_parameters_string(),
        }
    }

    /// The bucket for `route` keyed by its own template
    #[must_use]
    pub fn base_route(route: &Route) -> Self {
        Self::BaseRoute {
            template: route.template_id().to_string(),
            major: route.major_parameters_string(),
        }
    }

    /// Whether this is the shared unclassified bucket
    #[must_use]
    pub const fn is_unclassified(&self) -> bool {
        matches!(self, Self::Unclassified)
    }
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unclassified => write!(f, "unclassified"),
            Self::Hashed { hash, major } => write!(f, "{hash}:{major}"),
            Self::BaseRoute { template, major } => write!(f, "{template}:{major}"),
        }
    }
}

impl From<BucketKey> for String {
    fn from(key: BucketKey) -> Self {
        key.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RouteTemplate;
    use http::Method;
    use std::collections::HashMap;

    const PINS: RouteTemplate = RouteTemplate::new(Method::GET, "channels/{channel_id}/pins");
    const MEMBER: RouteTemplate =
        RouteTemplate::new(Method::GET, "guilds/{guild_id}/members/{user_id}");

    #[test]
    fn test_same_scope_same_key() {
        let a = MEMBER.compile(&["1", "100"]).unwrap();
        let b = MEMBER.compile(&["1", "200"]).unwrap();
        assert_eq!(BucketKey::hashed("h", &a), BucketKey::hashed("h", &b));
        assert_eq!(BucketKey::base_route(&a), BucketKey::base_route(&b));
    }

    #[test]
    fn test_major_parameters_separate_keys() {
        let a = PINS.compile(&["1"]).unwrap();
        let b = PINS.compile(&["2"]).unwrap();
        assert_ne!(BucketKey::hashed("h", &a), BucketKey::hashed("h", &b));

        let mut map = HashMap::new();
        map.insert(BucketKey::hashed("h", &a), "first");
        assert_eq!(map.get(&BucketKey::hashed("h", &a)), Some(&"first"));
        assert_eq!(map.get(&BucketKey::hashed("h", &b)), None);
    }

    #[test]
    fn test_display() {
        let route = MEMBER.compile(&["1", "100"]).unwrap();
        assert_eq!(BucketKey::hashed("abc", &route).to_string(), "abc:guild_id=1");
        assert_eq!(
            BucketKey::base_route(&route).to_string(),
            "GET guilds/{guild_id}/members/{user_id}:guild_id=1"
        );
        assert!(BucketKey::Unclassified.is_unclassified());
    }
}
