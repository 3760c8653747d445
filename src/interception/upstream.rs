// src/interception/upstream.rs
//! Real-network access for bypassed and passthrough requests

use bytes::Bytes;
use futures::future::BoxFuture;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::header::HOST;
use hyper::{Request, Response, Uri};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use tracing::debug;

use crate::interception::request::InterceptedRequest;
use crate::interception::response::{FetchResponse, StreamedResponse};
use crate::utils::errors::{EngineError, Result};

/// The real network, as seen by the interceptor
pub trait Upstream: Send + Sync {
    /// Perform `request` against the real network. Failures to reach it are
    /// reported as `NetworkError`-named errors.
    fn fetch(&self, request: InterceptedRequest) -> BoxFuture<'_, Result<FetchResponse>>;

    /// Like `fetch`, but hand the response back as soon as its head arrives
    /// so long-lived bodies (event streams) reach the caller frame by frame.
    /// Buffers through `fetch` unless overridden.
    fn stream(&self, request: InterceptedRequest) -> BoxFuture<'_, Result<StreamedResponse>> {
        let response = self.fetch(request);
        Box::pin(async move { response.await.map(StreamedResponse::from) })
    }
}

/// Hyper client forwarding to a fixed base URL
pub struct HyperUpstream {
    base: Option<Uri>,
    client: Client<HttpConnector, Full<Bytes>>,
}

impl HyperUpstream {
    /// Create an upstream targeting `base_url`; `None` makes every fetch fail
    pub fn new(base_url: Option<&str>) -> Result<Self> {
        let base = base_url
            .map(|url| {
                url.parse::<Uri>()
                    .map_err(|e| EngineError::ConfigError(format!("Invalid upstream URL: {}", e)))
            })
            .transpose()?;

        let client = Client::builder(TokioExecutor::new()).build_http();
        Ok(Self { base, client })
    }

    /// Send `request` upstream and return once the response head arrives
    async fn open(&self, request: InterceptedRequest) -> Result<Response<Incoming>> {
        let Some(base) = &self.base else {
            return Err(EngineError::passthrough_failed(format!(
                "No upstream configured for {}",
                request.url
            )));
        };

        let target = rewrite_uri(base, &request.url)?;
        debug!("Forwarding {} {} to {}", request.method, request.url, target);

        let mut builder = Request::builder().method(request.method.clone()).uri(target);
        for (name, value) in request.headers.iter() {
            if name != HOST {
                builder = builder.header(name, value);
            }
        }
        let outgoing = builder
            .body(Full::new(request.body.clone()))
            .map_err(|e| EngineError::InterceptionFailed(format!("Request build error: {}", e)))?;

        self.client
            .request(outgoing)
            .await
            .map_err(|e| EngineError::passthrough_failed(format!("{}: {}", request.url, e)))
    }

    async fn send_streaming(&self, request: InterceptedRequest) -> Result<StreamedResponse> {
        let (parts, body) = self.open(request).await?.into_parts();
        Ok(StreamedResponse::new(parts.status, parts.headers, body.boxed_unsync()))
    }

    async fn send(&self, request: InterceptedRequest) -> Result<FetchResponse> {
        self.send_streaming(request).await?.collect().await
    }
}

impl Upstream for HyperUpstream {
    fn fetch(&self, request: InterceptedRequest) -> BoxFuture<'_, Result<FetchResponse>> {
        Box::pin(self.send(request))
    }

    fn stream(&self, request: InterceptedRequest) -> BoxFuture<'_, Result<StreamedResponse>> {
        Box::pin(self.send_streaming(request))
    }
}

/// Keep the path and query of `url`, replace scheme and authority with `base`
pub fn rewrite_uri(base: &Uri, url: &str) -> Result<Uri> {
    let original: Uri = url
        .parse()
        .map_err(|e| EngineError::InvalidRequest(format!("Invalid URL '{}': {}", url, e)))?;
    let path_and_query = original
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");

    let scheme = base.scheme_str().unwrap_or("http");
    let authority = base
        .authority()
        .ok_or_else(|| EngineError::ConfigError(format!("Upstream URL has no host: {}", base)))?;

    format!("{}://{}{}", scheme, authority, path_and_query)
        .parse()
        .map_err(|e| EngineError::InvalidRequest(format!("Invalid target URL: {}", e)))
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_rewrite_keeps_path_and_query() {
        let base: Uri = "http://localhost:3000".parse().unwrap();
        let target = rewrite_uri(&base, "http://127.0.0.1:8787/assets/app.js?v=3").unwrap();
        assert_eq!(target.to_string(), "http://localhost:3000/assets/app.js?v=3");
    }

    #[test]
    fn test_rewrite_rejects_base_without_host() {
        let base: Uri = "/relative".parse().unwrap();
        assert!(rewrite_uri(&base, "http://x/y").is_err());
    }

    #[tokio::test]
    async fn test_event_stream_is_forwarded_before_it_ends() {
        let addr = test_support::spawn_event_stream_server().await;
        let upstream = HyperUpstream::new(Some(&format!("http://{}", addr))).unwrap();
        let request = InterceptedRequest::get("http://127.0.0.1:8787/events")
            .with_header("accept", "text/event-stream")
            .unwrap();

        let mut response = tokio::time::timeout(Duration::from_secs(2), upstream.stream(request))
            .await
            .expect("response head should arrive while the stream is open")
            .unwrap();
        assert_eq!(response.status, hyper::StatusCode::OK);
        assert_eq!(response.headers.get("content-type").unwrap(), "text/event-stream");

        let frame = tokio::time::timeout(Duration::from_secs(2), response.body.frame())
            .await
            .expect("first event should arrive while the stream is open")
            .unwrap()
            .unwrap();
        let data = frame.into_data().unwrap();
        assert_eq!(&data[..], test_support::FIRST_EVENT.as_bytes());
    }

    #[tokio::test]
    async fn test_default_stream_wraps_buffered_fetch() {
        let upstream = test_support::RecordingUpstream::default();
        let response = upstream
            .stream(InterceptedRequest::get("http://127.0.0.1:8787/"))
            .await
            .unwrap();
        assert_eq!(response.collect().await.unwrap().text(), "from network");
        assert_eq!(upstream.count(), 1);
    }

    #[tokio::test]
    async fn test_missing_base_is_bypass_failure() {
        let upstream = HyperUpstream::new(None).unwrap();
        let err = upstream
            .fetch(InterceptedRequest::get("http://127.0.0.1:8787/"))
            .await
            .unwrap_err();
        assert!(err.is_bypass_failure());
    }

    #[tokio::test]
    async fn test_unreachable_upstream_is_bypass_failure() {
        // Port 9 (discard) is not expected to be listening locally
        let upstream = HyperUpstream::new(Some("http://127.0.0.1:9")).unwrap();
        let err = upstream
            .fetch(InterceptedRequest::get("http://127.0.0.1:8787/"))
            .await
            .unwrap_err();
        assert!(err.is_bypass_failure());
    }
}
