//! Configuration module
//!
//! YAML configuration for the `lazyresolv serve` and `query` commands:
//! logging, the resolver and the listeners to start.
//!
//! ```yaml
//! log:
//!   level: info
//!   format: text
//! resolver:
//!   name_servers: ["1.1.1.1", "8.8.8.8"]
//!   protocol: udp
//!   timeout_ms: 2000
//!   retries: 2
//! servers:
//!   - protocol: udp
//!     addr: "127.0.0.1:5353"
//!   - protocol: doh
//!     addr: "127.0.0.1:8053"
//!     path: /dns-query
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use lazyresolv::config::Config;
//!
//! # fn example() -> lazyresolv::Result<()> {
//! let config = Config::from_file("config.yaml")?;
//! println!("Configured listeners: {}", config.servers.len());
//! # Ok(())
//! # }
//! ```

pub mod loader;
pub mod validation;

use crate::client::DohMethod;
use crate::resolver::config::{DEFAULT_NAME_SERVERS, DEFAULT_RETRIES, DEFAULT_TIMEOUT};
use crate::resolver::ResolverConfig;
use crate::server::ServerConfig;
use crate::transport::{Protocol, DEFAULT_DOH_PATH};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogConfig {
    /// Log level: trace|debug|info|warn|error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log output format: text|json
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Write logs to this file instead of stdout
    #[serde(default)]
    pub file: Option<String>,

    /// File rotation: never|daily|hourly
    #[serde(default = "default_rotate")]
    pub rotate: String,

    /// Directory for rotated files; the log file's directory by default
    #[serde(default)]
    pub rotate_dir: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_rotate() -> String {
    "never".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            file: None,
            rotate: default_rotate(),
            rotate_dir: None,
        }
    }
}

/// The `resolver` section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ResolverSection {
    /// Name servers to race
    pub name_servers: Vec<String>,
    /// Port for servers given without one
    pub port: Option<u16>,
    /// Transport: udp|tcp|doh
    pub protocol: Protocol,
    /// Per-attempt deadline in milliseconds
    pub timeout_ms: u64,
    /// Retries per server
    pub retries: u32,
    /// Set RD on outgoing queries
    pub recursive: bool,
    /// DoH request method: get|post
    pub doh_method: DohMethod,
    /// Advertise EDNS(0) with this payload size
    pub edns_udp_size: Option<u16>,
    /// Accept self-signed DoH certificates
    pub accept_invalid_certs: bool,
}

impl Default for ResolverSection {
    fn default() -> Self {
        Self {
            name_servers: DEFAULT_NAME_SERVERS.iter().map(|s| s.to_string()).collect(),
            port: None,
            protocol: Protocol::Udp,
            timeout_ms: DEFAULT_TIMEOUT.as_millis() as u64,
            retries: DEFAULT_RETRIES,
            recursive: true,
            doh_method: DohMethod::default(),
            edns_udp_size: None,
            accept_invalid_certs: false,
        }
    }
}

impl ResolverSection {
    /// Turn the section into a [`ResolverConfig`]
    pub fn to_resolver_config(&self) -> ResolverConfig {
        ResolverConfig {
            name_servers: self.name_servers.clone(),
            port: self.port,
            protocol: self.protocol,
            timeout: Duration::from_millis(self.timeout_ms),
            retries: self.retries,
            recursive: self.recursive,
            doh_method: self.doh_method,
            edns_udp_size: self.edns_udp_size,
            accept_invalid_certs: self.accept_invalid_certs,
        }
    }
}

/// One entry of the `servers` list
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ListenerConfig {
    /// Transport: udp|tcp|doh
    pub protocol: Protocol,

    /// Listen address
    pub addr: SocketAddr,

    /// HTTP path for DoH
    #[serde(default = "default_doh_path")]
    pub path: String,

    /// Idle timeout for TCP connections in milliseconds
    #[serde(default = "default_idle_timeout_ms")]
    pub idle_timeout_ms: u64,

    /// Maximum concurrent TCP connections
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,

    /// Largest UDP reply
    #[serde(default = "default_max_udp_size")]
    pub max_udp_size: usize,

    /// PEM certificate chain for DoH over TLS
    #[serde(default)]
    pub tls_cert: Option<PathBuf>,

    /// PEM private key for DoH over TLS
    #[serde(default)]
    pub tls_key: Option<PathBuf>,
}

fn default_doh_path() -> String {
    DEFAULT_DOH_PATH.to_string()
}

fn default_idle_timeout_ms() -> u64 {
    ServerConfig::default().timeout.as_millis() as u64
}

fn default_max_connections() -> usize {
    ServerConfig::default().max_connections
}

fn default_max_udp_size() -> usize {
    ServerConfig::default().max_udp_size
}

impl ListenerConfig {
    /// Listener with defaults for everything but protocol and address
    pub fn new(protocol: Protocol, addr: SocketAddr) -> Self {
        Self {
            protocol,
            addr,
            path: default_doh_path(),
            idle_timeout_ms: default_idle_timeout_ms(),
            max_connections: default_max_connections(),
            max_udp_size: default_max_udp_size(),
            tls_cert: None,
            tls_key: None,
        }
    }

    /// Server configuration for this listener
    ///
    /// Only the address for this listener's protocol is set.
    pub fn to_server_config(&self) -> ServerConfig {
        let mut config = ServerConfig {
            udp_addr: None,
            tcp_addr: None,
            doh_addr: None,
            doh_path: self.path.clone(),
            timeout: Duration::from_millis(self.idle_timeout_ms),
            max_connections: self.max_connections,
            max_udp_size: self.max_udp_size,
            tls_cert: self.tls_cert.clone(),
            tls_key: self.tls_key.clone(),
            ..ServerConfig::default()
        };
        match self.protocol {
            Protocol::Udp => config.udp_addr = Some(self.addr),
            Protocol::Tcp => config.tcp_addr = Some(self.addr),
            Protocol::DoH => config.doh_addr = Some(self.addr),
        }
        config
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Logging configuration
    #[serde(default)]
    pub log: LogConfig,

    /// Resolver used by `query` and as the forwarding handler of `serve`
    #[serde(default)]
    pub resolver: ResolverSection,

    /// Listeners started by `serve`
    #[serde(default)]
    pub servers: Vec<ListenerConfig>,
}

impl Config {
    /// Create a configuration with defaults and no listeners
    pub fn new() -> Self {
        Self::default()
    }

    /// Load, substitute environment variables and validate a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        loader::load_from_file(path)
    }

    /// Parse and validate a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        loader::load_from_yaml(yaml)
    }

    /// Render the configuration as YAML
    pub fn to_yaml(&self) -> Result<String> {
        loader::to_yaml(self)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        validation::validate_config(self)
    }
}
