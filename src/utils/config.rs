// src/utils/config.rs
//! Engine configuration
//!
//! Configuration is layered with the `config` crate:
//!
//! 1. Built-in defaults (`EngineConfig::default()`)
//! 2. Optional file `config/hub-mock.{toml,yaml,json}`
//! 3. Environment overrides, e.g. `HUB_MOCK__SERVER__PORT=9000`

use crate::utils::errors::{EngineError, Result};
use config::{Config, Environment, File};
use hyper::Uri;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

/// Default checksum identifying the interceptor build
pub const DEFAULT_INTEGRITY_CHECKSUM: &str = "07a89c4a3a307473bc67eca21bd970e5";

/// Default request header used by handlers to escape to the real network
pub const DEFAULT_BYPASS_HEADER: &str = "x-msw-bypass";

const DEFAULT_CONFIG_FILE: &str = "config/hub-mock";
const ENV_PREFIX: &str = "HUB_MOCK";

/// Top-level engine configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineConfig {
    pub server: ServerConfig,
    pub interceptor: InterceptorSettings,
    pub upstream: UpstreamConfig,
    pub logging: LoggingConfig,
    pub metrics: MetricsConfig,
}

/// Dev server listener
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Interceptor behavior
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InterceptorSettings {
    /// Origin the interceptor is registered for (scheme://host[:port])
    pub origin: String,

    /// URL of the built-in page session the dev server mocks on behalf of
    pub session_url: String,

    /// Reply timeout for control messages (milliseconds)
    pub control_timeout_ms: u64,

    /// Reply timeout for forwarded requests (milliseconds)
    pub request_timeout_ms: u64,

    /// Header that forces a passthrough; stripped before the real call
    pub bypass_header: String,

    /// Checksum reported to integrity checks
    pub integrity_checksum: String,
}

/// Real network target for passthrough requests
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UpstreamConfig {
    /// Base URL passthrough requests are rewritten to. When unset,
    /// passthrough requests fail with a network error.
    pub base_url: Option<String>,
}

/// Log output
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is not set
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

/// Prometheus exporter
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub listen_addr: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8787,
            },
            interceptor: InterceptorSettings::default(),
            upstream: UpstreamConfig::default(),
            logging: LoggingConfig {
                level: "info".to_string(),
                json: false,
            },
            metrics: MetricsConfig {
                enabled: false,
                listen_addr: "127.0.0.1:9464".to_string(),
            },
        }
    }
}

impl Default for InterceptorSettings {
    fn default() -> Self {
        Self {
            origin: "http://localhost:5173".to_string(),
            session_url: "http://localhost:5173/".to_string(),
            control_timeout_ms: 1000,
            request_timeout_ms: 5000,
            bypass_header: DEFAULT_BYPASS_HEADER.to_string(),
            integrity_checksum: DEFAULT_INTEGRITY_CHECKSUM.to_string(),
        }
    }
}

impl InterceptorSettings {
    pub fn control_timeout(&self) -> Duration {
        Duration::from_millis(self.control_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl EngineConfig {
    /// Load configuration from defaults, the default config file and the
    /// environment
    pub fn load() -> Result<Self> {
        Self::build(File::with_name(DEFAULT_CONFIG_FILE).required(false))
    }

    /// Load configuration from an explicit file (format inferred from the
    /// extension), still applying environment overrides
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(EngineError::ConfigError(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        Self::build(File::from(path))
    }

    fn build<S>(file: S) -> Result<Self>
    where
        S: config::Source + Send + Sync + 'static,
    {
        let defaults = Config::try_from(&EngineConfig::default())?;

        let config: EngineConfig = Config::builder()
            .add_source(defaults)
            .add_source(file)
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<()> {
        if self.interceptor.control_timeout_ms == 0 || self.interceptor.request_timeout_ms == 0 {
            return Err(EngineError::ConfigError(
                "Interceptor timeouts must be greater than zero".into(),
            ));
        }

        if self.interceptor.bypass_header.trim().is_empty() {
            return Err(EngineError::ConfigError("Bypass header must not be empty".into()));
        }

        parse_origin(&self.interceptor.origin)?;
        self.interceptor
            .session_url
            .parse::<Uri>()
            .map_err(|e| EngineError::ConfigError(format!("Invalid session URL: {}", e)))?;

        if let Some(base) = &self.upstream.base_url {
            parse_origin(base)?;
        }

        self.listen_addr()?;
        if self.metrics.enabled {
            self.metrics_addr()?;
        }

        Ok(())
    }

    /// Dev server listen address
    pub fn listen_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| EngineError::ConfigError(format!("Invalid server address: {}", e)))
    }

    /// Prometheus exporter address
    pub fn metrics_addr(&self) -> Result<SocketAddr> {
        self.metrics
            .listen_addr
            .parse()
            .map_err(|e| EngineError::ConfigError(format!("Invalid metrics address: {}", e)))
    }

    /// Public origin of the dev server
    pub fn server_origin(&self) -> String {
        format!("http://{}:{}", self.server.host, self.server.port)
    }
}

fn parse_origin(value: &str) -> Result<Uri> {
    let uri: Uri = value
        .parse()
        .map_err(|e| EngineError::ConfigError(format!("Invalid origin '{}': {}", value, e)))?;

    if uri.scheme().is_none() || uri.authority().is_none() {
        return Err(EngineError::ConfigError(format!(
            "Origin '{}' must include scheme and host",
            value
        )));
    }

    Ok(uri)
}
