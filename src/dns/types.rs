//! Numeric DNS code points and their mnemonics
//!
//! Record types, classes, opcodes and response codes all share one shape:
//! a closed set of named values plus an `Unknown` catch-all, so every value
//! read off the wire converts back to the same number. Mnemonics print in
//! upper case; unassigned values print in the RFC 3597 generic form
//! (`TYPE65280`, `CLASS4096`).

use crate::{Error, Result};
use std::fmt;
use std::str::FromStr;

/// Declare a code point enum from a single table of `Variant = value => "MNEMONIC"`
macro_rules! code_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident: $repr:ty {
            from = $from:ident, to = $to:ident, generic = $generic:literal, what = $what:literal;
            $( $(#[$vmeta:meta])* $variant:ident = $value:literal => $mnemonic:literal, )+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $( $(#[$vmeta])* $variant, )+
            /// Value without a mnemonic
            Unknown($repr),
        }

        impl $name {
            /// Map a wire value, keeping unassigned ones as `Unknown`
            pub fn $from(value: $repr) -> Self {
                match value {
                    $( $value => $name::$variant, )+
                    _ => $name::Unknown(value),
                }
            }

            /// The wire value
            pub fn $to(self) -> $repr {
                match self {
                    $( $name::$variant => $value, )+
                    $name::Unknown(value) => value,
                }
            }

            fn mnemonic(self) -> Option<&'static str> {
                match self {
                    $( $name::$variant => Some($mnemonic), )+
                    $name::Unknown(_) => None,
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match self.mnemonic() {
                    Some(text) => f.write_str(text),
                    None => write!(f, "{}{}", $generic, self.$to()),
                }
            }
        }

        impl FromStr for $name {
            type Err = Error;

            /// Parse a mnemonic in any case, or the generic numeric form
            fn from_str(s: &str) -> Result<Self> {
                let upper = s.to_ascii_uppercase();
                $(
                    if upper == $mnemonic {
                        return Ok($name::$variant);
                    }
                )+
                upper
                    .strip_prefix($generic)
                    .and_then(|digits| digits.parse::<$repr>().ok())
                    .map($name::$from)
                    .ok_or_else(|| Error::invalid_config_value($what, s, "unknown mnemonic"))
            }
        }
    };
}

code_enum! {
    /// Resource record type (RFC 1035 §3.2.2 and later registrations)
    pub enum RecordType: u16 {
        from = from_u16, to = to_u16, generic = "TYPE", what = "record type";
        /// IPv4 address
        A = 1 => "A",
        /// Authoritative name server
        NS = 2 => "NS",
        /// Alias
        CNAME = 5 => "CNAME",
        /// Start of a zone of authority
        SOA = 6 => "SOA",
        /// Domain name pointer
        PTR = 12 => "PTR",
        /// Mail exchange
        MX = 15 => "MX",
        /// Text strings
        TXT = 16 => "TXT",
        /// IPv6 address
        AAAA = 28 => "AAAA",
        /// Service location
        SRV = 33 => "SRV",
        /// EDNS(0) pseudo-record (RFC 6891)
        OPT = 41 => "OPT",
        /// Delegation signer (RFC 4034)
        DS = 43 => "DS",
        /// RRset signature (RFC 4034)
        RRSIG = 46 => "RRSIG",
        /// Next secure (RFC 4034)
        NSEC = 47 => "NSEC",
        /// Zone key (RFC 4034)
        DNSKEY = 48 => "DNSKEY",
        /// Hashed next secure (RFC 5155)
        NSEC3 = 50 => "NSEC3",
        /// NSEC3 parameters (RFC 5155)
        NSEC3PARAM = 51 => "NSEC3PARAM",
        /// Service binding (RFC 9460)
        SVCB = 64 => "SVCB",
        /// HTTPS service binding (RFC 9460)
        HTTPS = 65 => "HTTPS",
        /// Every type; only meaningful as a QTYPE
        ANY = 255 => "ANY",
        /// Certification authority authorization (RFC 8659)
        CAA = 257 => "CAA",
    }
}

code_enum! {
    /// Resource record class
    pub enum RecordClass: u16 {
        from = from_u16, to = to_u16, generic = "CLASS", what = "record class";
        IN = 1 => "IN",
        CH = 3 => "CH",
        HS = 4 => "HS",
        /// RFC 2136 prerequisite class
        NONE = 254 => "NONE",
        /// Every class; only meaningful as a QCLASS
        ANY = 255 => "ANY",
    }
}

impl Default for RecordClass {
    fn default() -> Self {
        RecordClass::IN
    }
}

code_enum! {
    /// Header opcode
    pub enum OpCode: u8 {
        from = from_u8, to = to_u8, generic = "OPCODE", what = "opcode";
        Query = 0 => "QUERY",
        IQuery = 1 => "IQUERY",
        Status = 2 => "STATUS",
        Notify = 4 => "NOTIFY",
        Update = 5 => "UPDATE",
    }
}

code_enum! {
    /// Header response code (the low four bits; extended codes live in OPT)
    pub enum ResponseCode: u8 {
        from = from_u8, to = to_u8, generic = "RCODE", what = "response code";
        NoError = 0 => "NOERROR",
        FormErr = 1 => "FORMERR",
        ServFail = 2 => "SERVFAIL",
        NXDomain = 3 => "NXDOMAIN",
        NotImp = 4 => "NOTIMP",
        Refused = 5 => "REFUSED",
        YXDomain = 6 => "YXDOMAIN",
        YXRRSet = 7 => "YXRRSET",
        NXRRSet = 8 => "NXRRSET",
        NotAuth = 9 => "NOTAUTH",
        NotZone = 10 => "NOTZONE",
    }
}
