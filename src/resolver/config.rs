//! Resolver configuration

use crate::client::DohMethod;
use crate::transport::Protocol;
use crate::{Error, Result};
use std::time::Duration;

/// Name servers queried when none are configured
pub const DEFAULT_NAME_SERVERS: [&str; 2] = ["8.8.8.8", "114.114.114.114"];

/// Retries per name server after the first attempt
pub const DEFAULT_RETRIES: u32 = 3;

/// Deadline of a single attempt
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);

/// Resolver settings
///
/// # Example
///
/// ```rust
/// use lazyresolv::resolver::ResolverConfig;
/// use lazyresolv::Protocol;
/// use std::time::Duration;
///
/// let config = ResolverConfig::new(["1.1.1.1", "9.9.9.9"])
///     .with_protocol(Protocol::Tcp)
///     .with_timeout(Duration::from_secs(2))
///     .with_retries(1);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ResolverConfig {
    /// Servers raced for every query: `ip`, `ip:port`, `host[:port]` or a
    /// DoH URL
    pub name_servers: Vec<String>,

    /// Port for servers given without one; the protocol default otherwise
    pub port: Option<u16>,

    /// Transport for the first attempt to each server
    pub protocol: Protocol,

    /// Deadline of each attempt
    pub timeout: Duration,

    /// Attempts per server after the first
    pub retries: u32,

    /// Set RD on outgoing queries
    pub recursive: bool,

    /// HTTP method for DoH
    pub doh_method: DohMethod,

    /// Advertise EDNS(0) with this payload size
    pub edns_udp_size: Option<u16>,

    /// Accept self-signed certificates from DoH servers
    pub accept_invalid_certs: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            name_servers: DEFAULT_NAME_SERVERS.iter().map(|s| s.to_string()).collect(),
            port: None,
            protocol: Protocol::Udp,
            timeout: DEFAULT_TIMEOUT,
            retries: DEFAULT_RETRIES,
            recursive: true,
            doh_method: DohMethod::default(),
            edns_udp_size: None,
            accept_invalid_certs: false,
        }
    }
}

impl ResolverConfig {
    /// Defaults with the given name servers
    pub fn new<I, S>(name_servers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name_servers: name_servers.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// Set the port for servers given without one
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Set the transport
    pub fn with_protocol(mut self, protocol: Protocol) -> Self {
        self.protocol = protocol;
        self
    }

    /// Set the per-attempt deadline
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the number of retries per server
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Set or clear RD on outgoing queries
    pub fn with_recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// Set the DoH request method
    pub fn with_doh_method(mut self, method: DohMethod) -> Self {
        self.doh_method = method;
        self
    }

    /// Advertise EDNS(0) with `size`
    pub fn with_edns_udp_size(mut self, size: u16) -> Self {
        self.edns_udp_size = Some(size);
        self
    }

    /// Accept invalid TLS certificates (test servers only)
    pub fn with_accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }

    /// Attempts made against each server before it counts as failed
    pub fn attempts_per_server(&self) -> u32 {
        self.retries.saturating_add(1)
    }

    /// Check the configuration
    pub fn validate(&self) -> Result<()> {
        if self.name_servers.is_empty() {
            return Err(Error::invalid_config_value(
                "name_servers",
                "[]",
                "at least one name server is required",
            ));
        }
        if let Some(blank) = self.name_servers.iter().find(|s| s.trim().is_empty()) {
            return Err(Error::invalid_config_value(
                "name_servers",
                blank,
                "name server entries must not be empty",
            ));
        }
        if self.timeout.is_zero() {
            return Err(Error::invalid_config_value(
                "timeout",
                "0",
                "timeout must be greater than zero",
            ));
        }
        if self.port == Some(0) {
            return Err(Error::invalid_config_value("port", "0", "port must be non-zero"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ResolverConfig::default();
        assert_eq!(config.name_servers, vec!["8.8.8.8", "114.114.114.114"]);
        assert_eq!(config.port, None);
        assert_eq!(config.protocol, Protocol::Udp);
        assert_eq!(config.timeout, Duration::from_secs(3));
        assert_eq!(config.retries, 3);
        assert_eq!(config.attempts_per_server(), 4);
        assert!(config.recursive);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_failures() {
        assert!(ResolverConfig::new(Vec::<String>::new()).validate().is_err());
        assert!(ResolverConfig::new([" "]).validate().is_err());
        assert!(ResolverConfig::default()
            .with_timeout(Duration::ZERO)
            .validate()
            .is_err());
        assert!(ResolverConfig::default().with_port(0).validate().is_err());
    }
}
