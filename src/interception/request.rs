// src/interception/request.rs
//! Intercepted request snapshot
//!
//! An `InterceptedRequest` captures an outgoing call at the moment it is
//! intercepted. The body is buffered once into `Bytes`; forwarding it to a
//! client and replaying it on passthrough share the same buffer.

use bytes::Bytes;
use hyper::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT};
use hyper::{Method, Uri};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use ulid::Ulid;

use crate::utils::errors::{EngineError, Result};

/// Identifier of a page session
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(String);

impl ClientId {
    /// Generate a fresh, unique client id
    pub fn generate() -> Self {
        Self(Ulid::new().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ClientId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Correlation token tying an intercepted request to its reply
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(String);

impl CorrelationId {
    pub fn generate() -> Self {
        Self(Ulid::new().to_string().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequestMode {
    Navigate,
    SameOrigin,
    NoCors,
    #[default]
    Cors,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequestCache {
    #[default]
    Default,
    NoStore,
    Reload,
    NoCache,
    ForceCache,
    OnlyIfCached,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequestCredentials {
    Omit,
    #[default]
    SameOrigin,
    Include,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequestRedirect {
    #[default]
    Follow,
    Error,
    Manual,
}

/// Immutable snapshot of an outgoing network call
#[derive(Debug, Clone)]
pub struct InterceptedRequest {
    pub url: String,
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub cache: RequestCache,
    pub mode: RequestMode,
    pub credentials: RequestCredentials,
    pub destination: String,
    pub integrity: String,
    pub redirect: RequestRedirect,
    pub referrer: String,
    pub referrer_policy: String,
    pub keepalive: bool,

    /// Session owning the browsing context that issued the call
    pub client_id: Option<ClientId>,
}

impl InterceptedRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            cache: RequestCache::default(),
            mode: RequestMode::default(),
            credentials: RequestCredentials::default(),
            destination: String::new(),
            integrity: String::new(),
            redirect: RequestRedirect::default(),
            referrer: "about:client".to_string(),
            referrer_policy: String::new(),
            keepalive: false,
            client_id: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    pub fn from_client(mut self, client_id: ClientId) -> Self {
        self.client_id = Some(client_id);
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Result<Self> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| EngineError::InvalidRequest(format!("Invalid header name: {}", e)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| EngineError::InvalidRequest(format!("Invalid header value: {}", e)))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Serialize `value` as the JSON body and set the content type
    pub fn with_json<T: Serialize>(self, value: &T) -> Result<Self> {
        let body = serde_json::to_vec(value)?;
        Ok(self
            .with_header("content-type", "application/json")?
            .with_body(body))
    }

    pub fn with_mode(mut self, mode: RequestMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_cache(mut self, cache: RequestCache) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_destination(mut self, destination: impl Into<String>) -> Self {
        self.destination = destination.into();
        self
    }

    /// Parsed request URL
    pub fn uri(&self) -> Result<Uri> {
        self.url
            .parse()
            .map_err(|e| EngineError::InvalidRequest(format!("Invalid URL '{}': {}", self.url, e)))
    }

    /// `scheme://authority` of the request URL, if it is absolute
    pub fn origin(&self) -> Option<String> {
        let uri = self.uri().ok()?;
        origin_of(&uri)
    }

    /// Path component without the query string
    pub fn path(&self) -> String {
        self.uri()
            .map(|uri| uri.path().to_string())
            .unwrap_or_else(|_| "/".to_string())
    }

    /// Header value as a string, if present and valid UTF-8
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    /// Whether the caller expects a server-sent event stream
    pub fn accepts_event_stream(&self) -> bool {
        self.headers
            .get(ACCEPT)
            .and_then(|value| value.to_str().ok())
            .map(|value| value == "text/event-stream")
            .unwrap_or(false)
    }

    /// Headers as a plain string map, as forwarded to clients
    pub fn header_map(&self) -> BTreeMap<String, String> {
        header_map_to_strings(&self.headers)
    }
}

/// `scheme://authority` of an absolute URI
pub fn origin_of(uri: &Uri) -> Option<String> {
    let scheme = uri.scheme_str()?;
    let authority = uri.authority()?;
    Some(format!("{}://{}", scheme, authority.as_str().to_ascii_lowercase()))
}

/// Canonical form of an absolute URL for equality checks: scheme and host
/// lowercased, default ports dropped, an empty path written as `/`. Path and
/// query are kept as given. `None` for relative or unparseable URLs.
pub fn normalize_url(url: &str) -> Option<String> {
    let uri: Uri = url.parse().ok()?;
    let scheme = uri.scheme_str()?.to_ascii_lowercase();
    let host = uri.host()?.to_ascii_lowercase();

    let default_port = match scheme.as_str() {
        "http" => Some(80),
        "https" => Some(443),
        _ => None,
    };
    let port = uri
        .port_u16()
        .filter(|port| Some(*port) != default_port)
        .map(|port| format!(":{}", port))
        .unwrap_or_default();

    let path = match uri.path() {
        "" => "/",
        path => path,
    };
    let query = uri.query().map(|query| format!("?{}", query)).unwrap_or_default();

    Some(format!("{}://{}{}{}{}", scheme, host, port, path, query))
}

/// Flatten a `HeaderMap` into a string map; non-UTF-8 values are skipped and
/// repeated headers are joined with ", "
pub fn header_map_to_strings(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut map: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers {
        let Ok(value) = value.to_str() else {
            continue;
        };
        map.entry(name.as_str().to_string())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(value);
            })
            .or_insert_with(|| value.to_string());
    }
    map
}

/// Build a `HeaderMap` from a string map
pub fn strings_to_header_map(headers: &BTreeMap<String, String>) -> Result<HeaderMap> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| EngineError::InvalidRequest(format!("Invalid header name '{}': {}", name, e)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| EngineError::InvalidRequest(format!("Invalid header value: {}", e)))?;
        map.append(name, value);
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_url() {
        assert_eq!(
            normalize_url("http://localhost:5173").as_deref(),
            Some("http://localhost:5173/")
        );
        assert_eq!(
            normalize_url("http://LOCALHOST:5173/Ideas?q=A").as_deref(),
            Some("http://localhost:5173/Ideas?q=A")
        );
        assert_eq!(normalize_url("http://hub.local:80/").as_deref(), Some("http://hub.local/"));
        assert_eq!(normalize_url("https://hub.local:443").as_deref(), Some("https://hub.local/"));
        assert_eq!(normalize_url("https://hub.local:8443").as_deref(), Some("https://hub.local:8443/"));
        assert_eq!(normalize_url("/ideas"), None);
    }

    #[test]
    fn test_origin_extraction() {
        let req = InterceptedRequest::get("http://LocalHost:5173/ideas?page=2");
        assert_eq!(req.origin().as_deref(), Some("http://localhost:5173"));
        assert_eq!(req.path(), "/ideas");
    }

    #[test]
    fn test_relative_url_has_no_origin() {
        let req = InterceptedRequest::get("/ideas");
        assert!(req.origin().is_none());
        assert_eq!(req.path(), "/ideas");
    }

    #[test]
    fn test_event_stream_detection() {
        let req = InterceptedRequest::get("http://localhost/events")
            .with_header("accept", "text/event-stream")
            .unwrap();
        assert!(req.accepts_event_stream());

        let req = InterceptedRequest::get("http://localhost/events")
            .with_header("accept", "application/json")
            .unwrap();
        assert!(!req.accepts_event_stream());
    }

    #[test]
    fn test_with_json_sets_body_and_content_type() {
        let req = InterceptedRequest::post("http://localhost/ideas")
            .with_json(&serde_json::json!({ "title": "X" }))
            .unwrap();
        assert_eq!(req.header("content-type"), Some("application/json"));
        assert_eq!(&req.body[..], br#"{"title":"X"}"#);
    }

    #[test]
    fn test_header_roundtrip_joins_repeated_values() {
        let mut headers = HeaderMap::new();
        headers.append("x-tag", HeaderValue::from_static("a"));
        headers.append("x-tag", HeaderValue::from_static("b"));
        let map = header_map_to_strings(&headers);
        assert_eq!(map.get("x-tag").map(String::as_str), Some("a, b"));
    }

    #[test]
    fn test_directive_serialization() {
        assert_eq!(
            serde_json::to_value(RequestCache::OnlyIfCached).unwrap(),
            serde_json::json!("only-if-cached")
        );
        assert_eq!(
            serde_json::to_value(RequestMode::SameOrigin).unwrap(),
            serde_json::json!("same-origin")
        );
    }

    #[test]
    fn test_generated_ids_are_unique() {
        assert_ne!(ClientId::generate(), ClientId::generate());
        assert_ne!(CorrelationId::generate(), CorrelationId::generate());
    }
}
