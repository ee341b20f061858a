use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

use crate::error::{HttpServerError, Result};

/// Registry capacity used when no configuration overrides it.
pub const DEFAULT_MAX_RESOURCES: usize = 10;
/// Largest frame read from the transport in one go.
pub const DEFAULT_MTU_SIZE: usize = 1460;
/// Cap on the bytes buffered while waiting for a complete request header.
pub const DEFAULT_MAX_CACHED_REQUEST: usize = 8192;
pub const DEFAULT_EVENT_QUEUE_DEPTH: usize = 20;
pub const DEFAULT_CONNECT_QUEUE_DEPTH: usize = 10;

/// TLS identity material. Only meaningful with a transport that supports TLS.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct SecurityCredentials {
    pub certificate_path: PathBuf,
    pub private_key_path: PathBuf,
    #[serde(default)]
    pub root_ca_path: Option<PathBuf>,
}

/// Server configuration.
///
/// Every field has a default, so a YAML file only needs to list what it
/// changes:
///
/// ```yaml
/// port: 9000
/// max_connections: 8
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface address the transport binds to.
    pub interface: String,
    pub port: u16,
    /// Maximum simultaneously active connections (stream pool size).
    pub max_connections: usize,
    /// Maximum number of registered resources.
    pub max_resources: usize,
    pub mtu_size: usize,
    pub max_cached_request: usize,
    pub event_queue_depth: usize,
    pub connect_queue_depth: usize,
    pub security: Option<SecurityCredentials>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            interface: "127.0.0.1".to_string(),
            port: 8080,
            max_connections: 4,
            max_resources: DEFAULT_MAX_RESOURCES,
            mtu_size: DEFAULT_MTU_SIZE,
            max_cached_request: DEFAULT_MAX_CACHED_REQUEST,
            event_queue_depth: DEFAULT_EVENT_QUEUE_DEPTH,
            connect_queue_depth: DEFAULT_CONNECT_QUEUE_DEPTH,
            security: None,
        }
    }
}

impl ServerConfig {
    /// Loads configuration from the YAML file named by `KILN_CONFIG`, or the
    /// defaults when it is unset, then applies the `KILN_PORT` override.
    pub fn load() -> anyhow::Result<Self> {
        let mut cfg = match std::env::var("KILN_CONFIG") {
            Ok(path) => Self::from_file(path)?,
            Err(_) => Self::default(),
        };

        if let Ok(port) = std::env::var("KILN_PORT") {
            cfg.port = port
                .parse()
                .with_context(|| format!("invalid KILN_PORT value {:?}", port))?;
        }

        Ok(cfg)
    }

    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_yaml(&text)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }

    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(text)
    }

    /// Address string handed to the TCP transport.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.interface, self.port)
    }

    pub fn is_secure(&self) -> bool {
        self.security.is_some()
    }

    /// Rejects capacities the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.max_connections == 0 {
            return Err(HttpServerError::BadArgument("max_connections must be non-zero"));
        }
        if self.max_resources == 0 {
            return Err(HttpServerError::BadArgument("max_resources must be non-zero"));
        }
        if self.mtu_size == 0 {
            return Err(HttpServerError::BadArgument("mtu_size must be non-zero"));
        }
        if self.max_cached_request == 0 {
            return Err(HttpServerError::BadArgument("max_cached_request must be non-zero"));
        }
        if self.event_queue_depth == 0 || self.connect_queue_depth == 0 {
            return Err(HttpServerError::QueueInit("queue depth must be non-zero"));
        }
        Ok(())
    }
}
