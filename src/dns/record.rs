//! DNS resource records
//!
//! Records appear in the answer, authority and additional sections. The
//! RDATA length is not stored: it is derived when encoding and checked
//! when decoding.

use super::question::normalize_name;
use super::rdata::RData;
use super::types::{RecordClass, RecordType};
use std::fmt;
use std::sync::Arc;

/// DNS resource record
///
/// # Example
///
/// ```
/// use lazyresolv::dns::{RData, RecordClass, RecordType, ResourceRecord};
/// use std::net::Ipv4Addr;
///
/// let record = ResourceRecord::new(
///     "example.com",
///     RecordType::A,
///     RecordClass::IN,
///     300,
///     RData::A(Ipv4Addr::new(93, 184, 216, 34)),
/// );
/// assert_eq!(record.ttl(), 300);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRecord {
    name: Arc<str>,
    rtype: RecordType,
    rclass: RecordClass,
    ttl: u32,
    rdata: RData,
}

impl ResourceRecord {
    /// Create a new resource record
    pub fn new(
        name: impl AsRef<str>,
        rtype: RecordType,
        rclass: RecordClass,
        ttl: u32,
        rdata: RData,
    ) -> Self {
        Self::with_arc(
            Arc::from(normalize_name(name.as_ref())),
            rtype,
            rclass,
            ttl,
            rdata,
        )
    }

    /// Create a record from an already normalised shared name
    pub fn with_arc(
        name: Arc<str>,
        rtype: RecordType,
        rclass: RecordClass,
        ttl: u32,
        rdata: RData,
    ) -> Self {
        Self {
            name,
            rtype,
            rclass,
            ttl,
            rdata,
        }
    }

    /// Build an EDNS(0) OPT pseudo-record
    ///
    /// The owner is the root name, CLASS carries the payload size and TTL
    /// packs extended RCODE, version and flags, all taken from `rdata`.
    /// Any other payload is stored as given under the root name.
    pub fn opt(rdata: RData) -> Self {
        let (rclass, ttl) = match &rdata {
            RData::OPT {
                udp_payload_size,
                extended_rcode,
                version,
                flags,
                ..
            } => (
                RecordClass::from_u16(*udp_payload_size),
                pack_opt_ttl(*extended_rcode, *version, *flags),
            ),
            _ => (RecordClass::from_u16(512), 0),
        };
        Self::with_arc(Arc::from("."), RecordType::OPT, rclass, ttl, rdata)
    }

    /// Get the owner name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get a shared handle to the owner name
    pub fn name_arc(&self) -> Arc<str> {
        Arc::clone(&self.name)
    }

    /// Get the record type
    pub fn rtype(&self) -> RecordType {
        self.rtype
    }

    /// Get the record class
    pub fn rclass(&self) -> RecordClass {
        self.rclass
    }

    /// Get the TTL in seconds
    pub fn ttl(&self) -> u32 {
        self.ttl
    }

    /// Get the resource data
    pub fn rdata(&self) -> &RData {
        &self.rdata
    }

    /// Set the owner name
    pub fn set_name(&mut self, name: impl AsRef<str>) {
        self.name = Arc::from(normalize_name(name.as_ref()));
    }

    /// Set the TTL
    pub fn set_ttl(&mut self, ttl: u32) {
        self.ttl = ttl;
    }

    /// Set the resource data
    pub fn set_rdata(&mut self, rdata: RData) {
        self.rdata = rdata;
    }
}

/// Pack extended RCODE, version and flags into an OPT record's TTL field
pub(crate) fn pack_opt_ttl(extended_rcode: u8, version: u8, flags: u16) -> u32 {
    (u32::from(extended_rcode) << 24) | (u32::from(version) << 16) | u32::from(flags)
}

/// Split an OPT record's TTL field into extended RCODE, version and flags
pub(crate) fn unpack_opt_ttl(ttl: u32) -> (u8, u8, u16) {
    ((ttl >> 24) as u8, (ttl >> 16) as u8, ttl as u16)
}

impl fmt::Display for ResourceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.rtype == RecordType::OPT {
            return write!(f, "; OPT PSEUDOSECTION: {}", self.rdata);
        }
        let dot = if self.name.as_ref() == "." { "" } else { "." };
        write!(
            f,
            "{}{}\t{}\t{}\t{}\t{}",
            self.name, dot, self.ttl, self.rclass, self.rtype, self.rdata
        )
    }
}
