//! lazyresolv - DNS message codec, transports and a racing resolver
//!
//! This crate encodes and decodes DNS wire-format messages (RFC 1034/1035),
//! carries them over UDP, TCP and DNS over HTTPS, and resolves names by
//! querying several name servers at once.
//!
//! # Architecture
//!
//! - `dns`: message model and the wire codec (compression, EDNS0, truncation)
//! - `client`: one-shot transport clients (UDP, TCP, DoH)
//! - `server`: listeners that decode queries, call a handler and reply
//! - `resolver`: races a query across name servers with per-server retries
//! - `config`: YAML configuration loading and validation
//! - `error`: error types and handling
//!
//! # Example
//!
//! ```rust,no_run
//! use lazyresolv::dns::{RecordClass, RecordType};
//! use lazyresolv::resolver::{ResolveOptions, Resolver, ResolverConfig};
//!
//! # async fn example() -> lazyresolv::Result<()> {
//! let resolver = Resolver::new(ResolverConfig::default())?;
//! let response = resolver
//!     .resolve("example.com", RecordType::A, RecordClass::IN, ResolveOptions::default())
//!     .await?;
//! for answer in response.answers() {
//!     println!("{}", answer);
//! }
//! # Ok(())
//! # }
//! ```

/// DNS protocol implementation
///
/// Message model, record data and the RFC 1035 wire codec.
pub mod dns;

/// Transport kinds shared by clients, servers and the resolver
pub mod transport;

/// DNS transport clients
///
/// Single request/response exchanges over UDP, TCP and DoH.
pub mod client;

/// DNS server implementations
///
/// UDP, TCP and DoH listeners driven by a request handler.
pub mod server;

/// Resolution engine
///
/// Races a query across the configured name servers.
pub mod resolver;

/// Configuration loading and validation
///
/// Supports YAML configuration files with validation.
pub mod config;

/// Logging initialisation
pub mod logging;

pub use transport::Protocol;

/// Error types and handling
///
/// Provides unified error types for the entire crate.
pub mod error {

    use crate::dns::Message;
    use crate::resolver::ResolutionError;
    use std::fmt;
    use thiserror::Error;

    /// What went wrong while decoding wire bytes
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum DecodeErrorKind {
        /// A fixed-size field runs past the end of the buffer
        UnexpectedEnd {
            /// Bytes the field needs
            needed: usize,
            /// Bytes left in scope
            available: usize,
        },
        /// A label length points past the end of the buffer
        LabelOverflow(usize),
        /// A name is longer than 255 bytes on the wire
        NameTooLong,
        /// A compression pointer does not point strictly backwards
        PointerLoop {
            /// Offset the pointer refers to
            target: usize,
        },
        /// Label type bits `01` or `10` (reserved / extended labels)
        InvalidLabelType(u8),
        /// The record data did not consume exactly RDLENGTH bytes
        RdataLength {
            /// Declared RDLENGTH
            declared: usize,
            /// Bytes the typed decoder consumed
            consumed: usize,
        },
        /// A character-string length exceeds the record data
        CharacterString,
    }

    impl fmt::Display for DecodeErrorKind {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                DecodeErrorKind::UnexpectedEnd { needed, available } => write!(
                    f,
                    "unexpected end of data: needed {} bytes, {} available",
                    needed, available
                ),
                DecodeErrorKind::LabelOverflow(len) => {
                    write!(f, "label of {} bytes exceeds remaining buffer", len)
                }
                DecodeErrorKind::NameTooLong => write!(f, "name exceeds 255 bytes"),
                DecodeErrorKind::PointerLoop { target } => {
                    write!(f, "compression pointer to {} does not point backwards", target)
                }
                DecodeErrorKind::InvalidLabelType(bits) => {
                    write!(f, "unsupported label type {:#04x}", bits)
                }
                DecodeErrorKind::RdataLength { declared, consumed } => write!(
                    f,
                    "RDLENGTH {} does not match decoded length {}",
                    declared, consumed
                ),
                DecodeErrorKind::CharacterString => {
                    write!(f, "character-string exceeds record data")
                }
            }
        }
    }

    /// Malformed wire bytes, with the offset at which the problem was found
    #[derive(Debug, Clone, PartialEq, Eq, Error)]
    #[error("{kind} at offset {offset}")]
    pub struct DecodeError {
        /// Byte offset into the message buffer
        pub offset: usize,
        /// Kind of failure
        pub kind: DecodeErrorKind,
    }

    impl DecodeError {
        /// Create a decode error at `offset`
        pub fn new(offset: usize, kind: DecodeErrorKind) -> Self {
            Self { offset, kind }
        }
    }

    /// Main error type for lazyresolv
    #[derive(Error, Debug)]
    pub enum Error {
        // ============ Codec Errors ============
        /// Malformed wire data
        #[error("DNS decode error: {0}")]
        Decode(#[from] DecodeError),

        /// Message value that cannot be encoded
        #[error("DNS encode error: {0}")]
        Encode(String),

        // ============ Transport Errors ============
        /// Attempt deadline exceeded
        #[error("Upstream timeout: {upstream} ({timeout_ms}ms)")]
        Timeout {
            /// The upstream server address
            upstream: String,
            /// Timeout duration in milliseconds
            timeout_ms: u64,
        },

        /// Network connection error
        #[error("Connection error to {address}: {reason}")]
        Connection {
            /// Target address
            address: String,
            /// Failure reason
            reason: String,
        },

        /// Reply transaction ID differs from the request
        #[error("Transaction ID mismatch from {upstream}: expected {expected}, got {actual}")]
        IdMismatch {
            /// The upstream server address
            upstream: String,
            /// ID of the request
            expected: u16,
            /// ID carried by the reply
            actual: u16,
        },

        /// Non-2xx HTTP status from a DoH upstream
        #[error("DoH upstream {upstream} returned HTTP {status}")]
        HttpStatus {
            /// The upstream URL
            upstream: String,
            /// HTTP status code
            status: u16,
        },

        /// Reply that does not answer the query
        #[error("Unexpected response from {upstream}: {reason}")]
        UnexpectedResponse {
            /// The upstream server address
            upstream: String,
            /// What was wrong with it
            reason: String,
        },

        /// UDP reply with the TC flag set
        #[error("Truncated response from {upstream}")]
        Truncated {
            /// The upstream server address
            upstream: String,
            /// The truncated reply as received
            response: Box<Message>,
        },

        // ============ Resolution Errors ============
        /// Every configured name server failed
        #[error(transparent)]
        Resolution(#[from] ResolutionError),

        // ============ Configuration Errors ============
        /// Configuration error
        #[error("Configuration error: {0}")]
        Config(String),

        /// Invalid configuration value
        #[error("Invalid config value for {field}: {value} - {reason}")]
        InvalidConfigValue {
            /// The field name
            field: String,
            /// The invalid value
            value: String,
            /// Reason why it's invalid
            reason: String,
        },

        /// Address parsing error
        #[error("Invalid address: {input}")]
        InvalidAddress {
            /// The invalid address input
            input: String,
        },

        // ============ IO Errors ============
        /// IO error
        #[error("IO error: {0}")]
        Io(#[from] std::io::Error),

        /// Other error
        #[error("Error: {0}")]
        Other(String),
    }

    impl Error {
        /// Create a Timeout error
        pub fn timeout(upstream: impl Into<String>, timeout_ms: u64) -> Self {
            Self::Timeout {
                upstream: upstream.into(),
                timeout_ms,
            }
        }

        /// Create a Connection error
        pub fn connection(address: impl Into<String>, reason: impl Into<String>) -> Self {
            Self::Connection {
                address: address.into(),
                reason: reason.into(),
            }
        }

        /// Create an IdMismatch error
        pub fn id_mismatch(upstream: impl Into<String>, expected: u16, actual: u16) -> Self {
            Self::IdMismatch {
                upstream: upstream.into(),
                expected,
                actual,
            }
        }

        /// Create an UnexpectedResponse error
        pub fn unexpected_response(upstream: impl Into<String>, reason: impl Into<String>) -> Self {
            Self::UnexpectedResponse {
                upstream: upstream.into(),
                reason: reason.into(),
            }
        }

        /// Create an InvalidAddress error
        pub fn invalid_address(input: impl Into<String>) -> Self {
            Self::InvalidAddress {
                input: input.into(),
            }
        }

        /// Create an InvalidConfigValue error
        pub fn invalid_config_value(
            field: impl Into<String>,
            value: impl Into<String>,
            reason: impl Into<String>,
        ) -> Self {
            Self::InvalidConfigValue {
                field: field.into(),
                value: value.into(),
                reason: reason.into(),
            }
        }

        /// Check if this error is a transport failure
        pub fn is_transport(&self) -> bool {
            matches!(
                self,
                Error::Connection { .. }
                    | Error::IdMismatch { .. }
                    | Error::HttpStatus { .. }
                    | Error::UnexpectedResponse { .. }
                    | Error::Io(_)
            )
        }

        /// Check if this error is an attempt timeout
        pub fn is_timeout(&self) -> bool {
            matches!(self, Error::Timeout { .. })
        }

        /// Check if this error is recoverable (can be retried)
        pub fn is_recoverable(&self) -> bool {
            self.is_transport() || self.is_timeout()
        }

        /// Check if this error is a configuration error
        pub fn is_config_error(&self) -> bool {
            matches!(
                self,
                Error::Config(_) | Error::InvalidConfigValue { .. } | Error::InvalidAddress { .. }
            )
        }
    }

    /// Result type for lazyresolv operations
    pub type Result<T> = std::result::Result<T, Error>;
}

// Re-export commonly used types
pub use error::{DecodeError, DecodeErrorKind, Error, Result};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structured_error_types() {
        let err = Error::timeout("8.8.8.8:53", 3000);
        assert!(matches!(err, Error::Timeout { .. }));
        assert!(err.to_string().contains("8.8.8.8:53"));
        assert!(err.to_string().contains("3000ms"));

        let err = Error::connection("1.1.1.1:53", "connection refused");
        assert!(err.to_string().contains("connection refused"));

        let err = Error::id_mismatch("1.1.1.1:53", 1, 2);
        assert!(err.to_string().contains("expected 1, got 2"));

        let err = Error::invalid_address("not-an-ip");
        assert!(err.to_string().contains("not-an-ip"));
    }

    #[test]
    fn test_decode_error_carries_offset() {
        let err = DecodeError::new(
            17,
            DecodeErrorKind::PointerLoop { target: 17 },
        );
        assert_eq!(err.offset, 17);
        assert!(err.to_string().contains("offset 17"));

        let wrapped: Error = err.into();
        assert!(matches!(wrapped, Error::Decode(_)));
        assert!(!wrapped.is_recoverable());
    }

    #[test]
    fn test_error_helper_methods() {
        assert!(Error::timeout("x", 1).is_recoverable());
        assert!(Error::timeout("x", 1).is_timeout());
        assert!(Error::connection("x", "reset").is_transport());
        assert!(Error::id_mismatch("x", 1, 2).is_recoverable());
        assert!(!Error::Config("bad".to_string()).is_recoverable());
        assert!(Error::invalid_config_value("port", "abc", "not a number").is_config_error());

        let io: Error = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset").into();
        assert!(io.is_transport());
    }
}
