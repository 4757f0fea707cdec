//! Resource record data (RDATA)
//!
//! One variant per supported record type. Types without a dedicated
//! variant keep their raw bytes in [`RData::Unknown`].

use super::types::RecordType;
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

/// DNS resource record data
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RData {
    /// IPv4 address (A record)
    A(Ipv4Addr),

    /// IPv6 address (AAAA record)
    AAAA(Ipv6Addr),

    /// Canonical name (CNAME record)
    CNAME(String),

    /// Mail exchange (MX record)
    MX {
        /// Preference value, lower is preferred
        preference: u16,
        /// Mail exchange hostname
        exchange: String,
    },

    /// Name server (NS record)
    NS(String),

    /// Pointer (PTR record)
    PTR(String),

    /// Text (TXT record), one entry per character-string
    ///
    /// Character-strings are arbitrary octets and are kept as received.
    TXT(Vec<Vec<u8>>),

    /// Start of authority (SOA record)
    SOA {
        /// Primary name server
        mname: String,
        /// Responsible person's mailbox
        rname: String,
        /// Serial number
        serial: u32,
        /// Refresh interval
        refresh: u32,
        /// Retry interval
        retry: u32,
        /// Expiration time
        expire: u32,
        /// Minimum TTL
        minimum: u32,
    },

    /// Service record (SRV record)
    SRV {
        /// Priority of this target
        priority: u16,
        /// Weight for records with same priority
        weight: u16,
        /// Port number of the service
        port: u16,
        /// Target hostname
        target: String,
    },

    /// Certificate authority authorization (CAA record)
    CAA {
        /// Flags byte
        flags: u8,
        /// Property tag
        tag: String,
        /// Property value, raw octets
        value: Vec<u8>,
    },

    /// Service binding (SVCB record) - RFC 9460
    SVCB {
        /// Priority (0 for alias mode)
        priority: u16,
        /// Target domain name
        target: String,
        /// Service parameters, kept as wire bytes
        params: Vec<u8>,
    },

    /// HTTPS service binding (HTTPS record) - RFC 9460
    HTTPS {
        /// Priority (0 for alias mode)
        priority: u16,
        /// Target domain name
        target: String,
        /// Service parameters, kept as wire bytes
        params: Vec<u8>,
    },

    /// Delegation signer (DS record) - RFC 4034
    DS {
        /// Key tag
        key_tag: u16,
        /// Algorithm
        algorithm: u8,
        /// Digest type
        digest_type: u8,
        /// Digest
        digest: Vec<u8>,
    },

    /// Signature (RRSIG record) - RFC 4034
    RRSIG {
        /// Type covered
        type_covered: u16,
        /// Algorithm
        algorithm: u8,
        /// Labels
        labels: u8,
        /// Original TTL
        original_ttl: u32,
        /// Signature expiration
        expiration: u32,
        /// Signature inception
        inception: u32,
        /// Key tag
        key_tag: u16,
        /// Signer's name
        signer_name: String,
        /// Signature
        signature: Vec<u8>,
    },

    /// Next secure record (NSEC) - RFC 4034
    NSEC {
        /// Next domain name
        next_domain: String,
        /// Type bit maps
        type_bitmaps: Vec<u8>,
    },

    /// Public key (DNSKEY record) - RFC 4034
    DNSKEY {
        /// Flags
        flags: u16,
        /// Protocol (always 3)
        protocol: u8,
        /// Algorithm
        algorithm: u8,
        /// Public key
        public_key: Vec<u8>,
    },

    /// Next secure record v3 (NSEC3) - RFC 5155
    NSEC3 {
        /// Hash algorithm
        hash_algorithm: u8,
        /// Flags
        flags: u8,
        /// Iterations
        iterations: u16,
        /// Salt
        salt: Vec<u8>,
        /// Next hashed owner name
        next_hashed: Vec<u8>,
        /// Type bit maps
        type_bitmaps: Vec<u8>,
    },

    /// NSEC3 parameters (NSEC3PARAM) - RFC 5155
    NSEC3PARAM {
        /// Hash algorithm
        hash_algorithm: u8,
        /// Flags
        flags: u8,
        /// Iterations
        iterations: u16,
        /// Salt
        salt: Vec<u8>,
    },

    /// OPT pseudo-record for EDNS(0) - RFC 6891
    ///
    /// On the wire the payload size travels in the CLASS field and the
    /// extended RCODE, version and flags in the TTL field; they are held
    /// here so a record can be built from its data alone.
    OPT {
        /// Requestor's UDP payload size
        udp_payload_size: u16,
        /// Upper 8 bits of the extended RCODE
        extended_rcode: u8,
        /// EDNS version
        version: u8,
        /// EDNS flags (DO bit in the top bit)
        flags: u16,
        /// Options as (code, data) pairs in wire order
        options: Vec<(u16, Vec<u8>)>,
    },

    /// Unknown or raw record data
    Unknown(Vec<u8>),
}

impl RData {
    /// Create an A record with an IPv4 address
    pub fn a(addr: Ipv4Addr) -> Self {
        RData::A(addr)
    }

    /// Create an AAAA record with an IPv6 address
    pub fn aaaa(addr: Ipv6Addr) -> Self {
        RData::AAAA(addr)
    }

    /// Create a CNAME record
    pub fn cname(name: impl Into<String>) -> Self {
        RData::CNAME(name.into())
    }

    /// Create an MX record
    pub fn mx(preference: u16, exchange: impl Into<String>) -> Self {
        RData::MX {
            preference,
            exchange: exchange.into(),
        }
    }

    /// Create an NS record
    pub fn ns(name: impl Into<String>) -> Self {
        RData::NS(name.into())
    }

    /// Create a PTR record
    pub fn ptr(name: impl Into<String>) -> Self {
        RData::PTR(name.into())
    }

    /// Create a TXT record from text or byte strings
    pub fn txt<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<[u8]>,
    {
        RData::TXT(texts.into_iter().map(|t| t.as_ref().to_vec()).collect())
    }

    /// Create a CAA record
    pub fn caa(flags: u8, tag: impl Into<String>, value: impl AsRef<[u8]>) -> Self {
        RData::CAA {
            flags,
            tag: tag.into(),
            value: value.as_ref().to_vec(),
        }
    }

    /// Create an SOA record
    pub fn soa(
        mname: impl Into<String>,
        rname: impl Into<String>,
        serial: u32,
        refresh: u32,
        retry: u32,
        expire: u32,
        minimum: u32,
    ) -> Self {
        RData::SOA {
            mname: mname.into(),
            rname: rname.into(),
            serial,
            refresh,
            retry,
            expire,
            minimum,
        }
    }

    /// Create an SRV record
    pub fn srv(priority: u16, weight: u16, port: u16, target: impl Into<String>) -> Self {
        RData::SRV {
            priority,
            weight,
            port,
            target: target.into(),
        }
    }

    /// Create an EDNS(0) OPT payload with no options
    pub fn opt(udp_payload_size: u16) -> Self {
        RData::OPT {
            udp_payload_size,
            extended_rcode: 0,
            version: 0,
            flags: 0,
            options: Vec::new(),
        }
    }

    /// The record type this data belongs to
    ///
    /// `None` for [`RData::Unknown`], whose type lives only on the record.
    pub fn record_type(&self) -> Option<RecordType> {
        let rtype = match self {
            RData::A(_) => RecordType::A,
            RData::AAAA(_) => RecordType::AAAA,
            RData::CNAME(_) => RecordType::CNAME,
            RData::MX { .. } => RecordType::MX,
            RData::NS(_) => RecordType::NS,
            RData::PTR(_) => RecordType::PTR,
            RData::TXT(_) => RecordType::TXT,
            RData::SOA { .. } => RecordType::SOA,
            RData::SRV { .. } => RecordType::SRV,
            RData::CAA { .. } => RecordType::CAA,
            RData::SVCB { .. } => RecordType::SVCB,
            RData::HTTPS { .. } => RecordType::HTTPS,
            RData::DS { .. } => RecordType::DS,
            RData::RRSIG { .. } => RecordType::RRSIG,
            RData::NSEC { .. } => RecordType::NSEC,
            RData::DNSKEY { .. } => RecordType::DNSKEY,
            RData::NSEC3 { .. } => RecordType::NSEC3,
            RData::NSEC3PARAM { .. } => RecordType::NSEC3PARAM,
            RData::OPT { .. } => RecordType::OPT,
            RData::Unknown(_) => return None,
        };
        Some(rtype)
    }
}

/// Quote a character-string; quote and backslash are escaped, bytes outside
/// printable ASCII become `\DDD`
fn quoted(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() + 2);
    out.push('"');
    for &b in bytes {
        match b {
            b'"' | b'\\' => {
                out.push('\\');
                out.push(b as char);
            }
            0x20..=0x7E => out.push(b as char),
            _ => out.push_str(&format!("\\{:03}", b)),
        }
    }
    out.push('"');
    out
}

fn hex(bytes: &[u8]) -> String {
    if bytes.is_empty() {
        return "-".to_string();
    }
    bytes.iter().map(|b| format!("{:02X}", b)).collect()
}

impl fmt::Display for RData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RData::A(addr) => write!(f, "{}", addr),
            RData::AAAA(addr) => write!(f, "{}", addr),
            RData::CNAME(name) | RData::NS(name) | RData::PTR(name) => write!(f, "{}.", name),
            RData::MX {
                preference,
                exchange,
            } => write!(f, "{} {}.", preference, exchange),
            RData::TXT(texts) => {
                let joined = texts
                    .iter()
                    .map(|t| quoted(t))
                    .collect::<Vec<_>>()
                    .join(" ");
                write!(f, "{}", joined)
            }
            RData::SOA {
                mname,
                rname,
                serial,
                refresh,
                retry,
                expire,
                minimum,
            } => write!(
                f,
                "{}. {}. {} {} {} {} {}",
                mname, rname, serial, refresh, retry, expire, minimum
            ),
            RData::SRV {
                priority,
                weight,
                port,
                target,
            } => write!(f, "{} {} {} {}.", priority, weight, port, target),
            RData::CAA { flags, tag, value } => write!(f, "{} {} {}", flags, tag, quoted(value)),
            RData::SVCB {
                priority,
                target,
                params,
            }
            | RData::HTTPS {
                priority,
                target,
                params,
            } => write!(f, "{} {}. <params: {} bytes>", priority, target, params.len()),
            RData::DS {
                key_tag,
                algorithm,
                digest_type,
                digest,
            } => write!(
                f,
                "{} {} {} {}",
                key_tag,
                algorithm,
                digest_type,
                hex(digest)
            ),
            RData::RRSIG {
                type_covered,
                algorithm,
                labels,
                original_ttl,
                expiration,
                inception,
                key_tag,
                signer_name,
                signature,
            } => write!(
                f,
                "{} {} {} {} {} {} {} {}. {}",
                RecordType::from_u16(*type_covered),
                algorithm,
                labels,
                original_ttl,
                expiration,
                inception,
                key_tag,
                signer_name,
                hex(signature)
            ),
            RData::NSEC {
                next_domain,
                type_bitmaps,
            } => write!(f, "{}. <{} bitmap bytes>", next_domain, type_bitmaps.len()),
            RData::DNSKEY {
                flags,
                protocol,
                algorithm,
                public_key,
            } => write!(f, "{} {} {} {}", flags, protocol, algorithm, hex(public_key)),
            RData::NSEC3 {
                hash_algorithm,
                flags,
                iterations,
                salt,
                next_hashed,
                ..
            } => write!(
                f,
                "{} {} {} {} {}",
                hash_algorithm,
                flags,
                iterations,
                hex(salt),
                hex(next_hashed)
            ),
            RData::NSEC3PARAM {
                hash_algorithm,
                flags,
                iterations,
                salt,
            } => write!(f, "{} {} {} {}", hash_algorithm, flags, iterations, hex(salt)),
            RData::OPT {
                udp_payload_size,
                version,
                flags,
                options,
                ..
            } => write!(
                f,
                "EDNS v{} udp:{} flags:{:#06x} options:{}",
                version,
                udp_payload_size,
                flags,
                options.len()
            ),
            RData::Unknown(data) => write!(f, "\\# {} {}", data.len(), hex(data)),
        }
    }
}
