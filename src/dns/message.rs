//! DNS message implementation
//!
//! A DNS message is a header plus four ordered sections: question,
//! answer, authority and additional (RFC 1035 §4.1). Section counts are
//! never stored; they are always the lengths of the sections.

use super::question::Question;
use super::rdata::RData;
use super::record::ResourceRecord;
use super::types::{OpCode, RecordType, ResponseCode};
use std::fmt;

/// Snapshot of a message header
///
/// Produced by [`Message::header`]; the counts mirror the section lengths
/// of the message it was taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Transaction ID
    pub id: u16,
    /// Query (false) or response (true)
    pub qr: bool,
    /// Operation code
    pub opcode: OpCode,
    /// Authoritative answer
    pub aa: bool,
    /// Truncated
    pub tc: bool,
    /// Recursion desired
    pub rd: bool,
    /// Recursion available
    pub ra: bool,
    /// Authentic data (RFC 4035)
    pub ad: bool,
    /// Checking disabled (RFC 4035)
    pub cd: bool,
    /// Response code
    pub rcode: ResponseCode,
    /// Number of questions
    pub qdcount: u16,
    /// Number of answer records
    pub ancount: u16,
    /// Number of authority records
    pub nscount: u16,
    /// Number of additional records
    pub arcount: u16,
}

impl Header {
    /// The 16-bit flags word as it appears on the wire
    pub fn flags(&self) -> u16 {
        let mut flags = 0u16;
        if self.qr {
            flags |= 0x8000;
        }
        flags |= u16::from(self.opcode.to_u8() & 0x0F) << 11;
        if self.aa {
            flags |= 0x0400;
        }
        if self.tc {
            flags |= 0x0200;
        }
        if self.rd {
            flags |= 0x0100;
        }
        if self.ra {
            flags |= 0x0080;
        }
        if self.ad {
            flags |= 0x0020;
        }
        if self.cd {
            flags |= 0x0010;
        }
        flags | u16::from(self.rcode.to_u8() & 0x0F)
    }
}

/// DNS message
///
/// # Example
///
/// ```
/// use lazyresolv::dns::{Message, Question, RecordClass, RecordType};
///
/// let mut message = Message::new();
/// message.set_id(1234);
/// message.add_question(Question::new("example.com", RecordType::A, RecordClass::IN));
/// assert_eq!(message.header().qdcount, 1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    id: u16,
    qr: bool,
    opcode: OpCode,
    aa: bool,
    tc: bool,
    rd: bool,
    ra: bool,
    ad: bool,
    cd: bool,
    rcode: ResponseCode,

    questions: Vec<Question>,
    answers: Vec<ResourceRecord>,
    authority: Vec<ResourceRecord>,
    additional: Vec<ResourceRecord>,
}

impl Message {
    /// Create an empty query with RD set, QUERY opcode and NOERROR
    pub fn new() -> Self {
        Self {
            id: 0,
            qr: false,
            opcode: OpCode::Query,
            aa: false,
            tc: false,
            rd: true,
            ra: false,
            ad: false,
            cd: false,
            rcode: ResponseCode::NoError,
            questions: Vec::new(),
            answers: Vec::new(),
            authority: Vec::new(),
            additional: Vec::new(),
        }
    }

    /// Create a query for a single question
    pub fn query(id: u16, question: Question, recursion_desired: bool) -> Self {
        let mut message = Self::new();
        message.id = id;
        message.rd = recursion_desired;
        message.questions.push(question);
        message
    }

    /// Turn a query into an empty response for it
    ///
    /// Keeps the ID, opcode, RD and CD flags and the question section; sets QR and
    /// drops every record section.
    pub fn into_response(self) -> Self {
        Self {
            id: self.id,
            qr: true,
            opcode: self.opcode,
            aa: false,
            tc: false,
            rd: self.rd,
            ra: false,
            ad: false,
            cd: self.cd,
            rcode: ResponseCode::NoError,
            questions: self.questions,
            answers: Vec::new(),
            authority: Vec::new(),
            additional: Vec::new(),
        }
    }

    /// Append an answer record, builder style
    pub fn with_answer(mut self, answer: ResourceRecord) -> Self {
        self.answers.push(answer);
        self
    }

    /// Header snapshot with counts derived from the sections
    pub fn header(&self) -> Header {
        Header {
            id: self.id,
            qr: self.qr,
            opcode: self.opcode,
            aa: self.aa,
            tc: self.tc,
            rd: self.rd,
            ra: self.ra,
            ad: self.ad,
            cd: self.cd,
            rcode: self.rcode,
            qdcount: count(self.questions.len()),
            ancount: count(self.answers.len()),
            nscount: count(self.authority.len()),
            arcount: count(self.additional.len()),
        }
    }

    /// Apply the flag fields of a header (counts are ignored)
    pub fn set_header(&mut self, header: &Header) {
        self.id = header.id;
        self.qr = header.qr;
        self.opcode = header.opcode;
        self.aa = header.aa;
        self.tc = header.tc;
        self.rd = header.rd;
        self.ra = header.ra;
        self.ad = header.ad;
        self.cd = header.cd;
        self.rcode = header.rcode;
    }

    /// Get the message ID
    pub fn id(&self) -> u16 {
        self.id
    }

    /// Set the message ID
    pub fn set_id(&mut self, id: u16) {
        self.id = id;
    }

    /// Check if this is a response (QR set)
    pub fn is_response(&self) -> bool {
        self.qr
    }

    /// Set whether this is a response
    pub fn set_response(&mut self, is_response: bool) {
        self.qr = is_response;
    }

    /// Get the operation code
    pub fn opcode(&self) -> OpCode {
        self.opcode
    }

    /// Set the operation code
    pub fn set_opcode(&mut self, opcode: OpCode) {
        self.opcode = opcode;
    }

    /// Check if authoritative answer flag is set
    pub fn is_authoritative(&self) -> bool {
        self.aa
    }

    /// Set the authoritative answer flag
    pub fn set_authoritative(&mut self, aa: bool) {
        self.aa = aa;
    }

    /// Check if truncation flag is set
    pub fn is_truncated(&self) -> bool {
        self.tc
    }

    /// Set the truncation flag
    pub fn set_truncated(&mut self, tc: bool) {
        self.tc = tc;
    }

    /// Check if recursion desired flag is set
    pub fn recursion_desired(&self) -> bool {
        self.rd
    }

    /// Set the recursion desired flag
    pub fn set_recursion_desired(&mut self, rd: bool) {
        self.rd = rd;
    }

    /// Check if recursion available flag is set
    pub fn recursion_available(&self) -> bool {
        self.ra
    }

    /// Set the recursion available flag
    pub fn set_recursion_available(&mut self, ra: bool) {
        self.ra = ra;
    }

    /// Check if the authentic data flag is set
    pub fn authentic_data(&self) -> bool {
        self.ad
    }

    /// Set the authentic data flag
    pub fn set_authentic_data(&mut self, ad: bool) {
        self.ad = ad;
    }

    /// Check if the checking disabled flag is set
    pub fn checking_disabled(&self) -> bool {
        self.cd
    }

    /// Set the checking disabled flag
    pub fn set_checking_disabled(&mut self, cd: bool) {
        self.cd = cd;
    }

    /// Get the response code
    pub fn response_code(&self) -> ResponseCode {
        self.rcode
    }

    /// Set the response code
    pub fn set_response_code(&mut self, rcode: ResponseCode) {
        self.rcode = rcode;
    }

    /// Get the questions
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    /// First question, if any
    pub fn question(&self) -> Option<&Question> {
        self.questions.first()
    }

    /// Add a question to the message
    pub fn add_question(&mut self, question: Question) {
        self.questions.push(question);
    }

    /// Get the answers
    pub fn answers(&self) -> &[ResourceRecord] {
        &self.answers
    }

    /// Get mutable answers
    pub fn answers_mut(&mut self) -> &mut Vec<ResourceRecord> {
        &mut self.answers
    }

    /// Add an answer to the message
    pub fn add_answer(&mut self, answer: ResourceRecord) {
        self.answers.push(answer);
    }

    /// Get the authority records
    pub fn authority(&self) -> &[ResourceRecord] {
        &self.authority
    }

    /// Get mutable authority records
    pub fn authority_mut(&mut self) -> &mut Vec<ResourceRecord> {
        &mut self.authority
    }

    /// Add an authority record to the message
    pub fn add_authority(&mut self, authority: ResourceRecord) {
        self.authority.push(authority);
    }

    /// Get the additional records
    pub fn additional(&self) -> &[ResourceRecord] {
        &self.additional
    }

    /// Get mutable additional records
    pub fn additional_mut(&mut self) -> &mut Vec<ResourceRecord> {
        &mut self.additional
    }

    /// Add an additional record to the message
    pub fn add_additional(&mut self, additional: ResourceRecord) {
        self.additional.push(additional);
    }

    /// The EDNS(0) OPT record, if the additional section carries one
    pub fn edns(&self) -> Option<&ResourceRecord> {
        self.additional
            .iter()
            .find(|rr| rr.rtype() == RecordType::OPT)
    }

    /// UDP payload size advertised by the OPT record
    pub fn edns_udp_size(&self) -> Option<u16> {
        self.edns().map(|rr| match rr.rdata() {
            RData::OPT {
                udp_payload_size, ..
            } => *udp_payload_size,
            _ => rr.rclass().to_u16(),
        })
    }

    /// Add an OPT record advertising `udp_payload_size`, replacing any
    /// existing one
    pub fn set_edns(&mut self, udp_payload_size: u16) {
        self.set_edns_record(ResourceRecord::opt(RData::opt(udp_payload_size)));
    }

    /// Install `opt` as the message's only OPT record
    pub fn set_edns_record(&mut self, opt: ResourceRecord) {
        self.additional.retain(|rr| rr.rtype() != RecordType::OPT);
        self.additional.push(opt);
    }

    /// Remove the OPT record
    pub fn clear_edns(&mut self) {
        self.additional.retain(|rr| rr.rtype() != RecordType::OPT);
    }
}

// Sections are bounded by the 65535-byte message size, so a record count
// never exceeds u16 for any message that can be put on the wire.
fn count(len: usize) -> u16 {
    u16::try_from(len).unwrap_or(u16::MAX)
}

impl Default for Message {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let header = self.header();
        writeln!(
            f,
            ";; ->>HEADER<<- opcode: {}, status: {}, id: {}",
            self.opcode, self.rcode, self.id
        )?;

        let mut flags = Vec::new();
        for (set, name) in [
            (self.qr, "qr"),
            (self.aa, "aa"),
            (self.tc, "tc"),
            (self.rd, "rd"),
            (self.ra, "ra"),
            (self.ad, "ad"),
            (self.cd, "cd"),
        ] {
            if set {
                flags.push(name);
            }
        }
        writeln!(
            f,
            ";; flags: {}; QUERY: {}, ANSWER: {}, AUTHORITY: {}, ADDITIONAL: {}",
            flags.join(" "),
            header.qdcount,
            header.ancount,
            header.nscount,
            header.arcount
        )?;

        if let Some(opt) = self.edns() {
            writeln!(f, "\n{}", opt)?;
        }

        if !self.questions.is_empty() {
            writeln!(f, "\n;; QUESTION SECTION:")?;
            for question in &self.questions {
                writeln!(f, ";{}", question)?;
            }
        }

        if !self.answers.is_empty() {
            writeln!(f, "\n;; ANSWER SECTION:")?;
            for answer in &self.answers {
                writeln!(f, "{}", answer)?;
            }
        }

        if !self.authority.is_empty() {
            writeln!(f, "\n;; AUTHORITY SECTION:")?;
            for auth in &self.authority {
                writeln!(f, "{}", auth)?;
            }
        }

        let additional: Vec<_> = self
            .additional
            .iter()
            .filter(|rr| rr.rtype() != RecordType::OPT)
            .collect();
        if !additional.is_empty() {
            writeln!(f, "\n;; ADDITIONAL SECTION:")?;
            for add in additional {
                writeln!(f, "{}", add)?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::RecordClass;
    use std::net::Ipv4Addr;

    fn a_record() -> ResourceRecord {
        ResourceRecord::new(
            "example.com",
            RecordType::A,
            RecordClass::IN,
            300,
            RData::A(Ipv4Addr::new(93, 184, 216, 34)),
        )
    }

    #[test]
    fn test_message_creation() {
        let message = Message::new();

        assert_eq!(message.id(), 0);
        assert!(!message.is_response());
        assert_eq!(message.opcode(), OpCode::Query);
        assert_eq!(message.response_code(), ResponseCode::NoError);
        assert!(message.recursion_desired());
        assert!(!message.recursion_available());
    }

    #[test]
    fn test_header_counts_follow_sections() {
        let mut message = Message::query(
            7,
            Question::new("example.com", RecordType::A, RecordClass::IN),
            true,
        );
        message.add_answer(a_record());
        message.add_answer(a_record());
        message.set_edns(1232);

        let header = message.header();
        assert_eq!(header.id, 7);
        assert_eq!(header.qdcount, 1);
        assert_eq!(header.ancount, 2);
        assert_eq!(header.nscount, 0);
        assert_eq!(header.arcount, 1);
    }

    #[test]
    fn test_header_flags_word() {
        let mut message = Message::new();
        message.set_response(true);
        message.set_recursion_available(true);
        message.set_response_code(ResponseCode::NXDomain);
        assert_eq!(message.header().flags(), 0x8183);

        message.set_truncated(true);
        message.set_opcode(OpCode::Status);
        assert_eq!(message.header().flags(), 0x9383);

        message.set_authentic_data(true);
        message.set_checking_disabled(true);
        assert_eq!(message.header().flags(), 0x93B3);
        assert!(message.to_string().contains("flags: qr tc rd ra ad cd;"));
    }

    #[test]
    fn test_response_keeps_checking_disabled() {
        let mut query = Message::new();
        query.set_checking_disabled(true);
        query.set_authentic_data(true);
        let response = query.into_response();
        assert!(response.checking_disabled());
        assert!(!response.authentic_data());
    }

    #[test]
    fn test_set_header_roundtrip() {
        let mut source = Message::new();
        source.set_id(99);
        source.set_response(true);
        source.set_authoritative(true);

        let mut target = Message::new();
        target.set_header(&source.header());
        assert_eq!(target.id(), 99);
        assert!(target.is_response());
        assert!(target.is_authoritative());
    }

    #[test]
    fn test_into_response_keeps_question() {
        let mut query = Message::query(
            4242,
            Question::new("example.com", RecordType::A, RecordClass::IN),
            false,
        );
        query.set_edns(4096);

        let response = query.into_response().with_answer(a_record());
        assert!(response.is_response());
        assert_eq!(response.id(), 4242);
        assert!(!response.recursion_desired());
        assert_eq!(response.questions().len(), 1);
        assert_eq!(response.answers().len(), 1);
        assert!(response.additional().is_empty());
    }

    #[test]
    fn test_set_edns_replaces_existing() {
        let mut message = Message::new();
        assert_eq!(message.edns_udp_size(), None);

        message.set_edns(1232);
        message.set_edns(4096);
        assert_eq!(message.additional().len(), 1);
        assert_eq!(message.edns_udp_size(), Some(4096));

        message.clear_edns();
        assert!(message.edns().is_none());
    }

    #[test]
    fn test_display_is_dig_like() {
        let mut message = Message::query(
            1,
            Question::new("example.com", RecordType::A, RecordClass::IN),
            true,
        );
        message.set_response(true);
        message.add_answer(a_record());

        let text = message.to_string();
        assert!(text.contains("opcode: QUERY, status: NOERROR, id: 1"));
        assert!(text.contains("flags: qr rd;"));
        assert!(text.contains(";; ANSWER SECTION:"));
        assert!(text.contains("93.184.216.34"));
    }
}
