//! DNS question section
//!
//! A question names the domain being queried together with the query
//! type and class.

use super::types::{RecordClass, RecordType};
use std::fmt;
use std::sync::Arc;

/// DNS question
///
/// # Example
///
/// ```
/// use lazyresolv::dns::{Question, RecordClass, RecordType};
///
/// let question = Question::new("www.example.com.", RecordType::A, RecordClass::IN);
/// assert_eq!(question.qname(), "www.example.com");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    qname: Arc<str>,
    qtype: RecordType,
    qclass: RecordClass,
}

impl Question {
    /// Create a new question, normalising the name to presentation form
    /// without the trailing dot
    pub fn new(qname: impl AsRef<str>, qtype: RecordType, qclass: RecordClass) -> Self {
        Self {
            qname: Arc::from(normalize_name(qname.as_ref())),
            qtype,
            qclass,
        }
    }

    /// Create a question from an already normalised shared name
    pub fn with_arc(qname: Arc<str>, qtype: RecordType, qclass: RecordClass) -> Self {
        Self {
            qname,
            qtype,
            qclass,
        }
    }

    /// Get the domain name being queried
    pub fn qname(&self) -> &str {
        &self.qname
    }

    /// Get a shared handle to the domain name
    pub fn qname_arc(&self) -> Arc<str> {
        Arc::clone(&self.qname)
    }

    /// Get the query type
    pub fn qtype(&self) -> RecordType {
        self.qtype
    }

    /// Get the query class
    pub fn qclass(&self) -> RecordClass {
        self.qclass
    }

    /// Set the domain name
    pub fn set_qname(&mut self, qname: impl AsRef<str>) {
        self.qname = Arc::from(normalize_name(qname.as_ref()));
    }

    /// Set the query type
    pub fn set_qtype(&mut self, qtype: RecordType) {
        self.qtype = qtype;
    }

    /// Set the query class
    pub fn set_qclass(&mut self, qclass: RecordClass) {
        self.qclass = qclass;
    }

    /// Whether `other` asks the same thing
    ///
    /// Names compare ASCII case-insensitively (RFC 4343), type and class
    /// must be equal.
    pub fn matches(&self, other: &Question) -> bool {
        self.qtype == other.qtype
            && self.qclass == other.qclass
            && names_equal(&self.qname, &other.qname)
    }
}

impl fmt::Display for Question {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\t{}\t{}", self.qname, self.qclass, self.qtype)
    }
}

/// Normalise a domain name to presentation form without the trailing dot
///
/// The root name (empty or `"."`) becomes `"."`. Labels may carry
/// `\.`, `\\` and `\DDD` escapes; an escaped final dot is part of the
/// last label and is kept.
pub fn normalize_name(name: &str) -> String {
    let trimmed = name.trim();
    if trimmed.is_empty() || trimmed == "." {
        return ".".to_string();
    }
    without_root_dot(trimmed).to_string()
}

/// Compare two domain names ASCII case-insensitively, ignoring a trailing dot
pub fn names_equal(a: &str, b: &str) -> bool {
    let a = Some(without_root_dot(a)).filter(|s| !s.is_empty()).unwrap_or(a);
    let b = Some(without_root_dot(b)).filter(|s| !s.is_empty()).unwrap_or(b);
    a.eq_ignore_ascii_case(b)
}

fn without_root_dot(name: &str) -> &str {
    match name.strip_suffix('.') {
        // An odd run of backslashes escapes the dot
        Some(rest) if rest.bytes().rev().take_while(|&b| b == b'\\').count() % 2 == 0 => rest,
        _ => name,
    }
}
