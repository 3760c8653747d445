// src/interception/http_interceptor.rs
//! HTTP front end for the mock layer
//!
//! Accepts real HTTP calls, replays each one through the `Interceptor` on
//! behalf of a built-in page session and writes the response back. Bypassed
//! calls are streamed through as the network delivers them, so event streams
//! reach the caller without waiting for the upstream to close. Fetch directives are recovered from `sec-fetch-*` and
//! `cache-control` request headers.

use crate::client::session::MockSession;
use crate::interception::request::{InterceptedRequest, RequestCache, RequestMode};
use crate::interception::response::{StreamBody, StreamedResponse};
use crate::utils::errors::{EngineError, Result};
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::header::{HeaderValue, CACHE_CONTROL, CONNECTION, CONTENT_TYPE, TRANSFER_ENCODING};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{HeaderMap, Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde::de::DeserializeOwned;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Configuration for the HTTP front end
#[derive(Debug, Clone)]
pub struct HttpInterceptorConfig {
    /// Listen address
    pub listen_addr: SocketAddr,

    /// Origin prefixed to incoming paths to rebuild absolute request URLs
    pub public_origin: String,

    /// Enable request logging
    pub log_requests: bool,

    /// Enable response logging
    pub log_responses: bool,
}

impl HttpInterceptorConfig {
    pub fn new(listen_addr: SocketAddr) -> Self {
        Self {
            listen_addr,
            public_origin: format!("http://{}", listen_addr),
            log_requests: true,
            log_responses: true,
        }
    }
}

/// HTTP server driving a page session
pub struct HttpInterceptor {
    config: HttpInterceptorConfig,
    session: Arc<MockSession>,
}

impl HttpInterceptor {
    pub fn new(config: HttpInterceptorConfig, session: Arc<MockSession>) -> Self {
        Self { config, session }
    }

    /// Bind the configured address and serve until `shutdown` fires
    pub async fn start(self: Arc<Self>, shutdown: CancellationToken) -> Result<()> {
        let listener = TcpListener::bind(self.config.listen_addr)
            .await
            .map_err(|e| EngineError::InterceptionFailed(format!("Failed to bind front end: {}", e)))?;
        self.serve(listener, shutdown).await
    }

    /// Serve connections from `listener` until `shutdown` fires
    pub async fn serve(self: Arc<Self>, listener: TcpListener, shutdown: CancellationToken) -> Result<()> {
        info!(
            "HTTP front end listening on {} as {}",
            listener.local_addr()?,
            self.config.public_origin
        );

        loop {
            let accepted = tokio::select! {
                _ = shutdown.cancelled() => break,
                accepted = listener.accept() => accepted,
            };

            match accepted {
                Ok((stream, addr)) => {
                    let interceptor = Arc::clone(&self);
                    let shutdown = shutdown.clone();

                    tokio::spawn(async move {
                        debug!("Accepted connection from {}", addr);

                        let io = TokioIo::new(stream);
                        let service = service_fn(move |req| {
                            let interceptor = Arc::clone(&interceptor);
                            async move { interceptor.handle_request(req).await }
                        });

                        let conn = http1::Builder::new().serve_connection(io, service);
                        tokio::pin!(conn);

                        let outcome = tokio::select! {
                            outcome = conn.as_mut() => outcome,
                            _ = shutdown.cancelled() => {
                                conn.as_mut().graceful_shutdown();
                                conn.await
                            }
                        };
                        if let Err(e) = outcome {
                            error!("Connection error: {}", e);
                        }
                    });
                }
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                }
            }
        }

        info!("HTTP front end stopped");
        Ok(())
    }

    /// Handle incoming HTTP request
    async fn handle_request(&self, req: Request<Incoming>) -> Result<Response<StreamBody>> {
        if self.config.log_requests {
            self.log_request(req.method(), req.uri(), req.headers());
        }

        let request = match self.to_intercepted(req).await {
            Ok(request) => request,
            Err(e) => {
                warn!("Rejecting unreadable request: {}", e);
                return Ok(error_response(StatusCode::BAD_REQUEST, &e.to_string()));
            }
        };

        let response = match self.session.stream(request).await {
            Ok(response) => into_hyper(response),
            Err(e @ EngineError::BridgeTimeout { .. }) => {
                error!("{}", e);
                error_response(StatusCode::GATEWAY_TIMEOUT, &e.to_string())
            }
            Err(e) => {
                error!("Failed to resolve request: {}", e);
                error_response(StatusCode::BAD_GATEWAY, &e.to_string())
            }
        };

        if self.config.log_responses {
            self.log_response(&response);
        }
        Ok(response)
    }

    /// Rebuild the caller's request as the page would have issued it
    async fn to_intercepted(&self, req: Request<Incoming>) -> Result<InterceptedRequest> {
        let (parts, body) = req.into_parts();
        let body = body
            .collect()
            .await
            .map_err(|e| EngineError::InterceptionFailed(format!("Body read error: {}", e)))?
            .to_bytes();

        let path_and_query = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        let url = format!("{}{}", self.config.public_origin, path_and_query);

        let mut request = InterceptedRequest::new(parts.method, url).with_body(body);
        request.mode = directive(&parts.headers, "sec-fetch-mode").unwrap_or_default();
        request.destination = header_str(&parts.headers, "sec-fetch-dest")
            .unwrap_or_default()
            .to_string();
        if header_str(&parts.headers, CACHE_CONTROL.as_str())
            .is_some_and(|value| value.contains("only-if-cached"))
        {
            request.cache = RequestCache::OnlyIfCached;
        }
        if request.mode == RequestMode::Navigate {
            request.destination = "document".to_string();
        }
        request.headers = parts.headers;

        Ok(request)
    }

    /// Log HTTP request
    fn log_request(&self, method: &Method, uri: &hyper::Uri, headers: &HeaderMap) {
        debug!("Request: {} {}", method, uri);
        for (name, value) in headers {
            if let Ok(val_str) = value.to_str() {
                debug!("  {}: {}", name, val_str);
            }
        }
    }

    /// Log HTTP response
    fn log_response(&self, response: &Response<StreamBody>) {
        debug!("Response: {}", response.status());
        for (name, value) in response.headers() {
            if let Ok(val_str) = value.to_str() {
                debug!("  {}: {}", name, val_str);
            }
        }
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

/// Parse a kebab-case fetch directive header
fn directive<T: DeserializeOwned>(headers: &HeaderMap, name: &str) -> Option<T> {
    let value = header_str(headers, name)?;
    serde_json::from_value(serde_json::Value::String(value.to_ascii_lowercase())).ok()
}

fn into_hyper(response: StreamedResponse) -> Response<StreamBody> {
    let mut headers = response.headers;
    // The body is re-framed by hyper
    headers.remove(TRANSFER_ENCODING);
    headers.remove(CONNECTION);

    let mut out = Response::new(response.body);
    *out.status_mut() = response.status;
    *out.headers_mut() = headers;
    out
}

/// Create error response
fn error_response(status: StatusCode, message: &str) -> Response<StreamBody> {
    let body = Full::new(Bytes::from(message.to_string()))
        .map_err(|never| match never {})
        .boxed_unsync();
    let mut response = Response::new(body);
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain;charset=UTF-8"));
    response
}
