// src/interception/routing_table.rs
//! Routing table mapping method + path patterns to mock handlers
//!
//! Routes are checked in registration order and the first structural match
//! wins. Patterns may contain named parameters (`/ideas/:id/like`).
//! Handlers are synchronous: a handler runs to completion before any other
//! request can observe the state it mutates.

use hyper::Method;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::fmt;
use std::fmt::Write as _;
use tracing::{debug, info};

use crate::bridge::messages::RequestPayload;
use crate::interception::response::MockResponse;
use crate::utils::errors::{EngineError, Result};

/// Parameters extracted from a matched path
pub type PathParams = BTreeMap<String, String>;

/// What a handler wants done with the request
#[derive(Debug, Clone, PartialEq)]
pub enum RouteReply {
    /// Answer with a synthetic response
    Respond(MockResponse),

    /// Fail the original call with a network-class error
    NetworkError { name: String, message: String },

    /// Let the request through to the real network
    Passthrough,
}

impl From<MockResponse> for RouteReply {
    fn from(response: MockResponse) -> Self {
        Self::Respond(response)
    }
}

/// Schema check run on a decoded JSON body before the handler sees it
pub trait Validate {
    fn validate(&self) -> std::result::Result<(), String> {
        Ok(())
    }
}

impl Validate for serde_json::Value {}

/// Request view handed to handlers
#[derive(Debug)]
pub struct RouteRequest<'a> {
    payload: &'a RequestPayload,
    params: PathParams,
}

impl<'a> RouteRequest<'a> {
    pub fn payload(&self) -> &RequestPayload {
        self.payload
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    pub fn params(&self) -> &PathParams {
        &self.params
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.payload.headers.get(name).map(String::as_str)
    }

    /// Decode the body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.payload.body)?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Static(String),
    Param(String),
}

/// Parsed path pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    raw: String,
    segments: Vec<Segment>,
}

impl PathPattern {
    pub fn parse(pattern: &str) -> Result<Self> {
        if !pattern.starts_with('/') {
            return Err(EngineError::ConfigError(format!(
                "Route pattern must start with '/': {}",
                pattern
            )));
        }

        let mut segments = Vec::new();
        for segment in split_path(pattern) {
            if let Some(name) = segment.strip_prefix(':') {
                if name.is_empty() {
                    return Err(EngineError::ConfigError(format!(
                        "Unnamed parameter in route pattern: {}",
                        pattern
                    )));
                }
                segments.push(Segment::Param(name.to_string()));
            } else {
                segments.push(Segment::Static(segment.to_string()));
            }
        }

        Ok(Self {
            raw: pattern.to_string(),
            segments,
        })
    }

    /// Match a request path, returning extracted parameters
    pub fn matches(&self, path: &str) -> Option<PathParams> {
        let parts: Vec<&str> = split_path(path).collect();
        if parts.len() != self.segments.len() {
            return None;
        }

        let mut params = PathParams::new();
        for (segment, part) in self.segments.iter().zip(parts) {
            match segment {
                Segment::Static(expected) if expected == part => {}
                Segment::Static(_) => return None,
                Segment::Param(name) => {
                    params.insert(name.clone(), part.to_string());
                }
            }
        }
        Some(params)
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

fn split_path(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|segment| !segment.is_empty())
}

type Handler = Box<dyn Fn(&RouteRequest<'_>) -> Result<RouteReply> + Send + Sync>;

/// Route definition
pub struct Route {
    pub method: Method,
    pub pattern: PathPattern,
    handler: Handler,
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("pattern", &self.pattern.raw)
            .finish()
    }
}

/// Ordered route registry
#[derive(Debug, Default)]
pub struct RoutingTable {
    routes: Vec<Route>,
}

impl RoutingTable {
    /// Create an empty routing table
    pub fn new() -> Self {
        Self { routes: Vec::new() }
    }

    /// Register a handler for `method` + `pattern`
    pub fn add_route<F>(&mut self, method: Method, pattern: &str, handler: F) -> Result<&mut Self>
    where
        F: Fn(&RouteRequest<'_>) -> Result<RouteReply> + Send + Sync + 'static,
    {
        let pattern = PathPattern::parse(pattern)?;
        debug!("Adding route: {} {}", method, pattern.raw);
        self.routes.push(Route {
            method,
            pattern,
            handler: Box::new(handler),
        });
        Ok(self)
    }

    pub fn get<F>(&mut self, pattern: &str, handler: F) -> Result<&mut Self>
    where
        F: Fn(&RouteRequest<'_>) -> Result<RouteReply> + Send + Sync + 'static,
    {
        self.add_route(Method::GET, pattern, handler)
    }

    pub fn post<F>(&mut self, pattern: &str, handler: F) -> Result<&mut Self>
    where
        F: Fn(&RouteRequest<'_>) -> Result<RouteReply> + Send + Sync + 'static,
    {
        self.add_route(Method::POST, pattern, handler)
    }

    /// Register a POST handler whose body is decoded and validated as `B`.
    /// Bodies that fail either step are answered with `400`.
    pub fn post_json<B, F>(&mut self, pattern: &str, handler: F) -> Result<&mut Self>
    where
        B: DeserializeOwned + Validate + 'static,
        F: Fn(&RouteRequest<'_>, B) -> Result<RouteReply> + Send + Sync + 'static,
    {
        self.post(pattern, move |req| {
            let body: B = match req.json() {
                Ok(body) => body,
                Err(e) => {
                    debug!("Rejecting malformed body for {}: {}", req.payload().url, e);
                    return Ok(MockResponse::error(400, &format!("Invalid request body: {}", e))?.into());
                }
            };
            if let Err(reason) = body.validate() {
                return Ok(MockResponse::error(400, &reason)?.into());
            }
            handler(req, body)
        })
    }

    /// Resolve a forwarded request. `None` means no route matched.
    pub fn resolve(&self, payload: &RequestPayload) -> Result<Option<RouteReply>> {
        let path = payload.path();

        for route in &self.routes {
            if route.method.as_str() != payload.method {
                continue;
            }
            if let Some(params) = route.pattern.matches(&path) {
                debug!("Matched {} {} via {}", payload.method, path, route.pattern.raw);
                let request = RouteRequest { payload, params };
                return (route.handler)(&request).map(Some);
            }
        }

        debug!("No route found for {} {}", payload.method, path);
        Ok(None)
    }

    /// Registered routes in matching order
    pub fn routes(&self) -> impl Iterator<Item = (&Method, &str)> {
        self.routes.iter().map(|route| (&route.method, route.pattern.as_str()))
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Human-readable route listing
    pub fn describe(&self) -> String {
        let mut output = String::from("# Mock Routes\n\n");
        for (method, pattern) in self.routes() {
            let _ = writeln!(output, "{} {}", method, pattern);
        }
        info!("Routing table has {} routes", self.routes.len());
        output
    }
}
