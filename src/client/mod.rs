//! DNS transport clients
//!
//! Each client performs one request/response exchange per call against a
//! target bound at construction:
//!
//! - **UDP**: one datagram out, one datagram back
//! - **TCP**: 2-byte length-prefixed messages over a fresh connection
//! - **DoH** (feature = "doh"): RFC 8484 GET or POST over HTTP(S)
//!
//! Every client rejects a reply whose transaction ID differs from the
//! request's with [`Error::IdMismatch`].
//!
//! # Example
//!
//! ```rust,no_run
//! use lazyresolv::client::{new_query, ClientConfig, DnsClient};
//! use lazyresolv::dns::{RecordClass, RecordType};
//! use lazyresolv::Protocol;
//! use std::time::Duration;
//!
//! # async fn example() -> lazyresolv::Result<()> {
//! let client = ClientConfig::new("8.8.8.8").build(Protocol::Udp).await?;
//! let query = new_query("example.com", RecordType::A, RecordClass::IN, true);
//! let response = client.send(&query, Duration::from_secs(3)).await?;
//! println!("{}", response);
//! # Ok(())
//! # }
//! ```

use crate::dns::{Message, Question, RecordClass, RecordType};
use crate::transport::{Protocol, DEFAULT_DOH_PATH};
use crate::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

#[cfg(feature = "doh")]
pub mod doh;
pub mod tcp;
pub mod udp;

#[cfg(feature = "doh")]
pub use doh::DohClient;
pub use tcp::TcpClient;
pub use udp::UdpClient;

/// A single-exchange DNS client
#[async_trait]
pub trait DnsClient: Send + Sync {
    /// Send `request` and wait at most `timeout` for the reply
    async fn send(&self, request: &Message, timeout: Duration) -> Result<Message>;

    /// Transport this client speaks
    fn protocol(&self) -> Protocol;

    /// Human-readable target (socket address or URL)
    fn target(&self) -> String;
}

/// HTTP method used for DNS over HTTPS requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DohMethod {
    /// `GET ?dns=<base64url>`
    Get,
    /// `POST` with an `application/dns-message` body
    #[default]
    Post,
}

/// Client construction settings
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server: `ip`, `ip:port`, `host`, `host:port` or a DoH URL
    pub target: String,
    /// Port used when `target` carries none; the protocol default otherwise
    pub port: Option<u16>,
    /// HTTP method for DoH
    pub doh_method: DohMethod,
    /// Accept self-signed certificates from DoH servers
    pub accept_invalid_certs: bool,
}

impl ClientConfig {
    /// Settings for `target` with protocol defaults
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            port: None,
            doh_method: DohMethod::default(),
            accept_invalid_certs: false,
        }
    }

    /// Set the port used when the target has none
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Set the DoH request method
    pub fn with_doh_method(mut self, method: DohMethod) -> Self {
        self.doh_method = method;
        self
    }

    /// Accept invalid TLS certificates (test servers only)
    pub fn with_accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }

    /// Build a client for `protocol`
    ///
    /// Host names in the target are looked up here, so this is async.
    pub async fn build(&self, protocol: Protocol) -> Result<Box<dyn DnsClient>> {
        match protocol {
            Protocol::Udp => {
                let addr = resolve_socket_addr(&self.target, self.port_for(protocol)).await?;
                Ok(Box::new(UdpClient::new(addr)))
            }
            Protocol::Tcp => {
                let addr = resolve_socket_addr(&self.target, self.port_for(protocol)).await?;
                Ok(Box::new(TcpClient::new(addr)))
            }
            #[cfg(feature = "doh")]
            Protocol::DoH => {
                let url = doh_url(&self.target, self.port_for(protocol));
                Ok(Box::new(DohClient::with_options(
                    url,
                    self.doh_method,
                    self.accept_invalid_certs,
                )?))
            }
            #[cfg(not(feature = "doh"))]
            Protocol::DoH => Err(Error::Config(
                "DNS over HTTPS support is not compiled in (enable the `doh` feature)".to_string(),
            )),
        }
    }

    fn port_for(&self, protocol: Protocol) -> u16 {
        self.port.unwrap_or_else(|| protocol.default_port())
    }
}

/// Build a query for one question with a fresh random transaction ID
pub fn new_query(
    name: impl AsRef<str>,
    rtype: RecordType,
    rclass: RecordClass,
    recursion_desired: bool,
) -> Message {
    Message::query(
        rand::random::<u16>(),
        Question::new(name, rtype, rclass),
        recursion_desired,
    )
}

/// Reject a reply whose ID differs from the request's
pub(crate) fn check_reply_id(request: &Message, response: &Message, upstream: &str) -> Result<()> {
    if response.id() != request.id() {
        return Err(Error::id_mismatch(upstream, request.id(), response.id()));
    }
    Ok(())
}

/// Turn a server entry into a socket address
///
/// Accepts `ip:port`, `[v6]:port`, a bare IP, `host` or `host:port`.
/// `default_port` applies when the entry has no port of its own.
pub async fn resolve_socket_addr(target: &str, default_port: u16) -> Result<SocketAddr> {
    if let Ok(addr) = target.parse::<SocketAddr>() {
        return Ok(addr);
    }
    if let Ok(ip) = target.parse::<IpAddr>() {
        return Ok(SocketAddr::new(ip, default_port));
    }

    let (host, port) = match target.rsplit_once(':') {
        Some((host, port)) if !host.contains(':') => {
            let port = port
                .parse::<u16>()
                .map_err(|_| Error::invalid_address(target))?;
            (host, port)
        }
        _ => (target, default_port),
    };
    if host.is_empty() {
        return Err(Error::invalid_address(target));
    }

    let mut addrs = tokio::net::lookup_host((host, port))
        .await
        .map_err(|e| Error::connection(target, format!("host lookup failed: {}", e)))?;
    addrs
        .next()
        .ok_or_else(|| Error::connection(target, "host lookup returned no addresses"))
}

/// Turn a server entry into a DoH URL
///
/// Full `http(s)://` URLs are kept as given; anything else becomes
/// `https://<target>[:port]/dns-query`.
pub fn doh_url(target: &str, port: u16) -> String {
    if target.starts_with("https://") || target.starts_with("http://") {
        return target.to_string();
    }
    let host = match target.parse::<std::net::Ipv6Addr>() {
        Ok(_) => format!("[{}]", target),
        Err(_) => target.to_string(),
    };
    if port == crate::transport::DEFAULT_DOH_PORT {
        format!("https://{}{}", host, DEFAULT_DOH_PATH)
    } else {
        format!("https://{}:{}{}", host, port, DEFAULT_DOH_PATH)
    }
}
