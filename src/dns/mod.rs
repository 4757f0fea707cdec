//! DNS protocol implementation module
//!
//! This module provides:
//! - DNS message model (header, question, resource records)
//! - Wire format parsing and serialization (RFC 1035), with optional
//!   name compression and size-limited truncation
//! - EDNS(0) OPT records and the client subnet option (RFC 6891, RFC 7871)
//!
//! # Example
//!
//! ```rust
//! use lazyresolv::dns::{parse_message, serialize_message, Message, Question, RecordClass, RecordType};
//!
//! let query = Message::query(
//!     0x2a2a,
//!     Question::new("example.com", RecordType::A, RecordClass::IN),
//!     true,
//! );
//! let bytes = serialize_message(&query)?;
//! assert_eq!(parse_message(&bytes)?, query);
//! # Ok::<(), lazyresolv::Error>(())
//! ```

pub mod edns;
pub mod message;
pub mod question;
pub mod rdata;
pub mod record;
pub mod types;
pub mod wire;

// Re-export commonly used types
pub use message::{Header, Message};
pub use question::{names_equal, normalize_name, Question};
pub use rdata::RData;
pub use record::ResourceRecord;
pub use types::{OpCode, RecordClass, RecordType, ResponseCode};
pub use wire::{
    parse_message, serialize_message, serialize_message_compressed, serialize_message_truncated,
};
