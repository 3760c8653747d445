// src/interception/response.rs
//! Mock response descriptors and materialized responses

use bytes::Bytes;
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Full};
use hyper::header::{HeaderMap, CONTENT_TYPE};
use hyper::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::interception::request::{header_map_to_strings, strings_to_header_map};
use crate::utils::errors::{EngineError, Result};

/// Synthetic reply produced by a route handler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MockResponse {
    pub status: u16,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_text: Option<String>,

    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    #[serde(default)]
    pub body: Option<String>,
}

impl MockResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            status_text: None,
            headers: BTreeMap::new(),
            body: None,
        }
    }

    /// JSON body with the given status
    pub fn json<T: Serialize>(status: u16, value: &T) -> Result<Self> {
        let body = serde_json::to_string(value)?;
        Ok(Self::new(status)
            .with_header("content-type", "application/json")
            .with_body(body))
    }

    /// `200 OK` with a JSON body
    pub fn ok_json<T: Serialize>(value: &T) -> Result<Self> {
        Self::json(200, value)
    }

    /// `{"error": message}` with the given status
    pub fn error(status: u16, message: &str) -> Result<Self> {
        Self::json(status, &serde_json::json!({ "error": message }))
    }

    pub fn text(status: u16, body: impl Into<String>) -> Self {
        Self::new(status)
            .with_header("content-type", "text/plain;charset=UTF-8")
            .with_body(body)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_status_text(mut self, text: impl Into<String>) -> Self {
        self.status_text = Some(text.into());
        self
    }
}

/// A response as observed by the caller of an intercepted request
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: StatusCode,
    pub status_text: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl FetchResponse {
    pub fn new(status: StatusCode, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            status,
            headers,
            body,
        }
    }

    /// Materialize a mock descriptor into a real response.
    ///
    /// Statuses outside 200..=599 cannot be expressed as a response and are
    /// coerced to `200 OK`.
    pub fn from_mock(mock: MockResponse) -> Result<Self> {
        let headers = strings_to_header_map(&mock.headers)?;
        let body = mock.body.map(Bytes::from).unwrap_or_default();

        if !(200..=599).contains(&mock.status) {
            return Ok(Self {
                status: StatusCode::OK,
                status_text: "OK".to_string(),
                headers,
                body,
            });
        }

        let status = StatusCode::from_u16(mock.status).map_err(|e| {
            EngineError::InvalidRequest(format!("Invalid status {}: {}", mock.status, e))
        })?;
        let status_text = mock
            .status_text
            .unwrap_or_else(|| status.canonical_reason().unwrap_or_default().to_string());

        Ok(Self {
            status,
            status_text,
            headers,
            body,
        })
    }

    /// `502 Bad Gateway` carrying a plain-text diagnostic
    pub fn bad_gateway(message: &str) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            hyper::header::HeaderValue::from_static("text/plain;charset=UTF-8"),
        );
        Self::new(
            StatusCode::BAD_GATEWAY,
            headers,
            Bytes::from(message.to_string()),
        )
    }

    pub fn ok(&self) -> bool {
        self.status.is_success()
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    pub fn header_map(&self) -> BTreeMap<String, String> {
        header_map_to_strings(&self.headers)
    }

    /// Whether the status forbids a body (`101`, `204`, `205`, `304`)
    pub fn has_null_body_status(&self) -> bool {
        matches!(self.status.as_u16(), 101 | 204 | 205 | 304)
    }
}

/// Response body forwarded frame by frame
pub type StreamBody = UnsyncBoxBody<Bytes, hyper::Error>;

/// A response whose body may still be arriving from the network
pub struct StreamedResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: StreamBody,
}

impl StreamedResponse {
    pub fn new(status: StatusCode, headers: HeaderMap, body: StreamBody) -> Self {
        Self { status, headers, body }
    }

    /// Drain the body into a buffered response
    pub async fn collect(self) -> Result<FetchResponse> {
        let body = self
            .body
            .collect()
            .await
            .map_err(|e| EngineError::passthrough_failed(format!("Response body error: {}", e)))?
            .to_bytes();
        Ok(FetchResponse::new(self.status, self.headers, body))
    }
}

impl From<FetchResponse> for StreamedResponse {
    fn from(response: FetchResponse) -> Self {
        let body = Full::new(response.body)
            .map_err(|never| match never {})
            .boxed_unsync();
        Self::new(response.status, response.headers, body)
    }
}

impl std::fmt::Debug for StreamedResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamedResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_zero_status_coerced_to_ok() {
        let response = FetchResponse::from_mock(MockResponse::new(0).with_body("x")).unwrap();
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.status_text, "OK");
        assert_eq!(response.text(), "x");
    }

    #[test]
    fn test_unusual_valid_status_kept() {
        let response = FetchResponse::from_mock(MockResponse::new(250)).unwrap();
        assert_eq!(response.status.as_u16(), 250);
        assert!(response.body.is_empty());
    }

    #[test]
    fn test_status_text_override() {
        let response =
            FetchResponse::from_mock(MockResponse::new(201).with_status_text("Made")).unwrap();
        assert_eq!(response.status_text, "Made");
    }

    #[test]
    fn test_json_helpers() {
        let mock = MockResponse::error(404, "Idea not found").unwrap();
        assert_eq!(mock.headers.get("content-type").unwrap(), "application/json");

        let response = FetchResponse::from_mock(mock).unwrap();
        let value: serde_json::Value = response.json().unwrap();
        assert_eq!(value["error"], "Idea not found");
        assert!(!response.ok());
    }

    #[test]
    fn test_mock_response_wire_shape() {
        let mock = MockResponse::new(200).with_status_text("OK").with_body("hi");
        let value = serde_json::to_value(&mock).unwrap();
        assert_eq!(value["statusText"], "OK");
        assert_eq!(value["body"], "hi");
    }

    #[test]
    fn test_null_body_statuses() {
        for status in [204u16, 205, 304] {
            let response = FetchResponse::from_mock(MockResponse::new(status)).unwrap();
            assert!(response.has_null_body_status());
        }
        assert!(!FetchResponse::from_mock(MockResponse::new(200)).unwrap().has_null_body_status());
    }

    #[tokio::test]
    async fn test_buffered_response_streams_back_unchanged() {
        let response = FetchResponse::from_mock(MockResponse::text(201, "made")).unwrap();
        let streamed = StreamedResponse::from(response);
        assert_eq!(streamed.status, StatusCode::CREATED);

        let collected = streamed.collect().await.unwrap();
        assert_eq!(collected.text(), "made");
        assert_eq!(
            collected.headers.get(CONTENT_TYPE).unwrap(),
            "text/plain;charset=UTF-8"
        );
    }

    proptest! {
        #[test]
        fn prop_materialized_status_is_always_valid(status in 0u16..1000) {
            let response = FetchResponse::from_mock(MockResponse::new(status)).unwrap();
            let observed = response.status.as_u16();
            prop_assert!((200..=599).contains(&observed));
            if (200..=599).contains(&status) {
                prop_assert_eq!(observed, status);
            } else {
                prop_assert_eq!(observed, 200);
            }
        }
    }
}
