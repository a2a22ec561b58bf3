//! Request abstraction and cache-key derivation for memoized calls.

use axum::http::{Method, Request};
use regex::Regex;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::Result;

/// Authenticated user id placed in request extensions by the auth layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser(pub String);

// == Request Info ==
/// The parts of a request that feed default key derivation.
///
/// Bodies are never inspected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestInfo {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub user_id: Option<String>,
}

impl RequestInfo {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: None,
            user_id: None,
        }
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Extracts method, path, query and the [`AuthenticatedUser`] extension.
    pub fn from_request<B>(request: &Request<B>) -> Self {
        Self {
            method: request.method().clone(),
            path: request.uri().path().to_string(),
            query: request.uri().query().map(str::to_string),
            user_id: request
                .extensions()
                .get::<AuthenticatedUser>()
                .map(|user| user.0.clone()),
        }
    }
}

// == Key Derivation ==
/// Default key for a handler call: `name:METHOD:path?query:user=id`.
///
/// Query parameters are sorted so equivalent URLs share an entry; anonymous
/// callers are keyed as `user=anonymous`.
pub fn default_request_key(name: &str, request: &RequestInfo) -> String {
    let query = request
        .query
        .as_deref()
        .filter(|q| !q.is_empty())
        .map(|q| {
            let mut pairs: Vec<&str> = q.split('&').filter(|p| !p.is_empty()).collect();
            pairs.sort_unstable();
            format!("?{}", pairs.join("&"))
        })
        .unwrap_or_default();

    format!(
        "{}:{}:{}{}:user={}",
        name,
        request.method,
        request.path,
        query,
        request.user_id.as_deref().unwrap_or("anonymous")
    )
}

/// Default key for a function call: `name:` followed by the arguments as
/// canonical JSON (object keys sorted).
pub fn stable_args_key<A: Serialize + ?Sized>(name: &str, args: &A) -> Result<String> {
    let canonical = serde_json::to_value(args)?;
    Ok(format!("{}:{}", name, serde_json::to_string(&canonical)?))
}

/// Suffix encoding tags into a key, e.g. `#tag:users#tag:admin`.
pub fn tag_suffix(tags: &[String]) -> String {
    tags.iter().map(|tag| format!("#tag:{}", tag)).collect()
}

/// Short SHA-256 fingerprint identifying a key.
pub fn fingerprint(key: &str) -> String {
    hex::encode(&Sha256::digest(key.as_bytes())[..8])
}

/// Matches keys produced for `user_id` by [`default_request_key`].
pub fn user_pattern(user_id: &str) -> Result<Regex> {
    pattern_for(":user=", user_id)
}

/// Matches keys carrying `tag`.
pub fn tag_pattern(tag: &str) -> Result<Regex> {
    pattern_for("#tag:", tag)
}

fn pattern_for(marker: &str, value: &str) -> Result<Regex> {
    let source = format!("{}{}(#|$)", regex::escape(marker), regex::escape(value));
    Regex::new(&source).map_err(|e| crate::error::CacheError::InvalidRequest(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_request_key_shape() {
        let request = RequestInfo::new(Method::GET, "/users/1")
            .with_query("b=2&a=1")
            .with_user("u1");

        assert_eq!(
            default_request_key("users", &request),
            "users:GET:/users/1?a=1&b=2:user=u1"
        );
    }

    #[test]
    fn test_default_request_key_anonymous_no_query() {
        let request = RequestInfo::new(Method::POST, "/items");
        assert_eq!(
            default_request_key("h", &request),
            "h:POST:/items:user=anonymous"
        );
    }

    #[test]
    fn test_every_input_changes_key() {
        let base = RequestInfo::new(Method::GET, "/a").with_user("u1");
        let variants = [
            RequestInfo::new(Method::POST, "/a").with_user("u1"),
            RequestInfo::new(Method::GET, "/b").with_user("u1"),
            base.clone().with_query("x=1"),
            RequestInfo::new(Method::GET, "/a").with_user("u2"),
        ];

        let base_key = default_request_key("h", &base);
        for variant in &variants {
            assert_ne!(default_request_key("h", variant), base_key);
        }
        assert_ne!(default_request_key("other", &base), base_key);
    }

    #[test]
    fn test_from_request_reads_user_extension() {
        let mut request = Request::builder()
            .method(Method::GET)
            .uri("/users/7?full=1")
            .body(())
            .unwrap();
        request
            .extensions_mut()
            .insert(AuthenticatedUser("u7".into()));

        let info = RequestInfo::from_request(&request);
        assert_eq!(info.path, "/users/7");
        assert_eq!(info.query.as_deref(), Some("full=1"));
        assert_eq!(info.user_id.as_deref(), Some("u7"));
    }

    #[test]
    fn test_stable_args_key_sorts_object_keys() {
        let mut first = HashMap::new();
        first.insert("zeta", 1);
        first.insert("alpha", 2);
        let mut second = HashMap::new();
        second.insert("alpha", 2);
        second.insert("zeta", 1);

        let a = stable_args_key("sum", &first).unwrap();
        let b = stable_args_key("sum", &second).unwrap();
        assert_eq!(a, b);
        assert_eq!(a, r#"sum:{"alpha":2,"zeta":1}"#);
    }

    #[test]
    fn test_user_pattern_is_exact() {
        let pattern = user_pattern("1").unwrap();
        assert!(pattern.is_match("h:GET:/a:user=1"));
        assert!(pattern.is_match("h:GET:/a:user=1#tag:x"));
        assert!(!pattern.is_match("h:GET:/a:user=12"));
    }

    #[test]
    fn test_tag_pattern_and_suffix() {
        let key = format!("k{}", tag_suffix(&["users".into(), "admin".into()]));
        assert_eq!(key, "k#tag:users#tag:admin");
        assert!(tag_pattern("users").unwrap().is_match(&key));
        assert!(tag_pattern("admin").unwrap().is_match(&key));
        assert!(!tag_pattern("user").unwrap().is_match(&key));
    }

    #[test]
    fn test_fingerprint_is_deterministic() {
        assert_eq!(fingerprint("abc"), fingerprint("abc"));
        assert_ne!(fingerprint("abc"), fingerprint("abd"));
        assert_eq!(fingerprint("abc").len(), 16);
    }
}
