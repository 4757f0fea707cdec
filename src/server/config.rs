//! Server configuration
//!
//! Listen addresses, limits and timeouts shared by the UDP, TCP and DoH
//! servers.

use crate::transport::{DEFAULT_DOH_PATH, MAX_UDP_PAYLOAD};
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

/// DNS server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// UDP listen address
    pub udp_addr: Option<SocketAddr>,

    /// TCP listen address
    pub tcp_addr: Option<SocketAddr>,

    /// DoH listen address
    pub doh_addr: Option<SocketAddr>,

    /// HTTP path DoH queries are served on
    pub doh_path: String,

    /// Maximum number of concurrent TCP connections
    pub max_connections: usize,

    /// Idle timeout for TCP connections
    pub timeout: Duration,

    /// Largest UDP response, whatever the client's EDNS size
    pub max_udp_size: usize,

    /// Largest TCP query accepted
    pub max_tcp_size: usize,

    /// PEM certificate chain for DoH over TLS
    pub tls_cert: Option<PathBuf>,

    /// PEM private key for DoH over TLS
    pub tls_key: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let localhost = |port| SocketAddr::from((Ipv4Addr::LOCALHOST, port));
        Self {
            udp_addr: Some(localhost(5353)),
            tcp_addr: Some(localhost(5353)),
            doh_addr: Some(localhost(8053)),
            doh_path: DEFAULT_DOH_PATH.to_string(),
            max_connections: 1000,
            timeout: Duration::from_secs(5),
            max_udp_size: 4096,
            max_tcp_size: 65535,
            tls_cert: None,
            tls_key: None,
        }
    }
}

impl ServerConfig {
    /// Create a configuration with the given UDP and TCP addresses
    pub fn new(udp_addr: Option<SocketAddr>, tcp_addr: Option<SocketAddr>) -> Self {
        Self {
            udp_addr,
            tcp_addr,
            ..Default::default()
        }
    }

    /// Set the UDP listen address
    pub fn with_udp_addr(mut self, addr: SocketAddr) -> Self {
        self.udp_addr = Some(addr);
        self
    }

    /// Set the TCP listen address
    pub fn with_tcp_addr(mut self, addr: SocketAddr) -> Self {
        self.tcp_addr = Some(addr);
        self
    }

    /// Set the DoH listen address
    pub fn with_doh_addr(mut self, addr: SocketAddr) -> Self {
        self.doh_addr = Some(addr);
        self
    }

    /// Set the DoH path
    pub fn with_doh_path(mut self, path: impl Into<String>) -> Self {
        self.doh_path = path.into();
        self
    }

    /// Set the maximum number of concurrent TCP connections
    pub fn with_max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Set the TCP idle timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the maximum UDP response size
    pub fn with_max_udp_size(mut self, size: usize) -> Self {
        self.max_udp_size = size;
        self
    }

    /// Set the maximum TCP query size
    pub fn with_max_tcp_size(mut self, size: usize) -> Self {
        self.max_tcp_size = size;
        self
    }

    /// Serve DoH over TLS with the given PEM files
    pub fn with_tls(mut self, cert: impl Into<PathBuf>, key: impl Into<PathBuf>) -> Self {
        self.tls_cert = Some(cert.into());
        self.tls_key = Some(key.into());
        self
    }

    /// Size limit for a UDP response to `edns_size`
    ///
    /// `max(512, edns_size)` capped by `max_udp_size`; 512 when the query
    /// carried no OPT record.
    pub fn udp_response_limit(&self, edns_size: Option<u16>) -> usize {
        match edns_size {
            Some(size) => usize::from(size)
                .max(MAX_UDP_PAYLOAD)
                .min(self.max_udp_size.max(MAX_UDP_PAYLOAD)),
            None => MAX_UDP_PAYLOAD,
        }
    }
}
