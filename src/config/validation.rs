//! Configuration validation
//!
//! Validates configuration values for correctness and consistency.

use crate::config::{Config, ListenerConfig};
use crate::transport::Protocol;
use crate::{Error, Result};
use std::collections::HashSet;

/// Validate a configuration
///
/// Checks that all configuration values are valid and consistent.
///
/// # Errors
///
/// Returns an error naming the first invalid value.
pub fn validate_config(config: &Config) -> Result<()> {
    validate_log_level(&config.log.level)?;
    validate_log_format(&config.log.format)?;
    validate_log_rotation(&config.log.rotate)?;

    if config.resolver.timeout_ms == 0 {
        return Err(Error::invalid_config_value(
            "resolver.timeout_ms",
            "0",
            "timeout must be greater than zero",
        ));
    }
    config.resolver.to_resolver_config().validate()?;

    validate_listeners(&config.servers)?;

    Ok(())
}

/// Validate log level
fn validate_log_level(level: &str) -> Result<()> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];

    if !valid_levels.contains(&level) {
        return Err(Error::Config(format!(
            "Invalid log level '{}'. Must be one of: {}",
            level,
            valid_levels.join(", ")
        )));
    }

    Ok(())
}

fn validate_log_format(format: &str) -> Result<()> {
    let valid = ["text", "json"];
    if !valid.contains(&format) {
        return Err(Error::Config(format!(
            "Invalid log format '{}'. Must be one of: {}",
            format,
            valid.join(", ")
        )));
    }
    Ok(())
}

fn validate_log_rotation(rot: &str) -> Result<()> {
    let valid = ["never", "daily", "hourly"];
    if !valid.contains(&rot) {
        return Err(Error::Config(format!(
            "Invalid rotate '{}'. Must be one of: {}",
            rot,
            valid.join(", ")
        )));
    }
    Ok(())
}

/// Validate listeners
fn validate_listeners(listeners: &[ListenerConfig]) -> Result<()> {
    // UDP and TCP may share a port; the same transport may not
    let mut seen = HashSet::new();

    for listener in listeners {
        if !seen.insert((listener.protocol, listener.addr)) {
            return Err(Error::Config(format!(
                "Duplicate {} listener on {}",
                listener.protocol, listener.addr
            )));
        }

        if listener.max_connections == 0 {
            return Err(Error::invalid_config_value(
                "servers.max_connections",
                "0",
                "at least one connection must be allowed",
            ));
        }

        if listener.protocol == Protocol::DoH {
            if !listener.path.starts_with('/') {
                return Err(Error::invalid_config_value(
                    "servers.path",
                    &listener.path,
                    "DoH path must start with '/'",
                ));
            }
            if listener.tls_cert.is_some() != listener.tls_key.is_some() {
                return Err(Error::Config(format!(
                    "DoH listener on {} needs both tls_cert and tls_key",
                    listener.addr
                )));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use std::path::PathBuf;

    fn addr(s: &str) -> SocketAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_validate_valid_config() {
        let config = Config::new();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_log_level_valid() {
        assert!(validate_log_level("info").is_ok());
        assert!(validate_log_level("debug").is_ok());
        assert!(validate_log_level("trace").is_ok());
        assert!(validate_log_level("warn").is_ok());
        assert!(validate_log_level("error").is_ok());
    }

    #[test]
    fn test_validate_log_level_invalid() {
        let result = validate_log_level("invalid");
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_log_format() {
        assert!(validate_log_format("json").is_ok());
        assert!(validate_log_format("xml").is_err());
    }

    #[test]
    fn test_validate_log_rotation() {
        assert!(validate_log_rotation("never").is_ok());
        assert!(validate_log_rotation("daily").is_ok());
        assert!(validate_log_rotation("hourly").is_ok());

        let result = validate_log_rotation("weekly");
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_resolver_section() {
        let mut config = Config::new();
        config.resolver.timeout_ms = 0;
        assert!(validate_config(&config).is_err());

        let mut config = Config::new();
        config.resolver.name_servers.clear();
        let err = validate_config(&config).unwrap_err();
        assert!(err.is_config_error());
    }

    #[test]
    fn test_udp_and_tcp_may_share_address() {
        let listeners = vec![
            ListenerConfig::new(Protocol::Udp, addr("127.0.0.1:5353")),
            ListenerConfig::new(Protocol::Tcp, addr("127.0.0.1:5353")),
        ];
        assert!(validate_listeners(&listeners).is_ok());
    }

    #[test]
    fn test_duplicate_listener_rejected() {
        let listeners = vec![
            ListenerConfig::new(Protocol::Udp, addr("127.0.0.1:5353")),
            ListenerConfig::new(Protocol::Udp, addr("127.0.0.1:5353")),
        ];
        let err = validate_listeners(&listeners).unwrap_err();
        assert!(err.to_string().contains("Duplicate"));
    }

    #[test]
    fn test_doh_listener_checks() {
        let mut listener = ListenerConfig::new(Protocol::DoH, addr("127.0.0.1:8053"));
        listener.path = "dns-query".to_string();
        assert!(validate_listeners(&[listener.clone()]).is_err());

        listener.path = "/dns-query".to_string();
        listener.tls_cert = Some(PathBuf::from("cert.pem"));
        assert!(validate_listeners(&[listener.clone()]).is_err());

        listener.tls_key = Some(PathBuf::from("key.pem"));
        assert!(validate_listeners(&[listener]).is_ok());
    }

    #[test]
    fn test_zero_connections_rejected() {
        let mut listener = ListenerConfig::new(Protocol::Tcp, addr("127.0.0.1:5353"));
        listener.max_connections = 0;
        assert!(validate_listeners(&[listener]).is_err());
    }
}
