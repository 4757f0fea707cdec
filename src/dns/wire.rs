//! DNS wire format parsing and serialization
//!
//! RFC 1035 message layout: a 12-byte header, then the question, answer,
//! authority and additional sections. Names are label-length encoded and
//! may use compression pointers.
//!
//! Decoding reads through a bounded cursor. Every fixed-size read is
//! checked against the bytes left in scope, and record data is decoded
//! inside its declared RDLENGTH. Compression pointers must point strictly
//! backwards, each one below the previous target, so a chain ends after
//! at most one step per byte of message.
//!
//! Encoding writes names uncompressed unless a compression table is
//! requested with [`serialize_message_compressed`].

use super::message::{Header, Message};
use super::question::Question;
use super::rdata::RData;
use super::record::{pack_opt_ttl, unpack_opt_ttl, ResourceRecord};
use super::types::{OpCode, RecordClass, RecordType, ResponseCode};
use crate::{DecodeError, DecodeErrorKind, Error, Result};
use std::collections::HashMap;
use std::sync::Arc;

/// Size of the fixed message header
pub const HEADER_LEN: usize = 12;

/// Largest message that fits a TCP length prefix
pub const MAX_MESSAGE_LEN: usize = 65535;

const MAX_LABEL_LEN: usize = 63;
const MAX_NAME_LEN: usize = 255;
const MAX_POINTER_OFFSET: usize = 0x3FFF;

/// Parse a DNS message from wire format bytes
///
/// # Example
///
/// ```
/// use lazyresolv::dns::wire::parse_message;
/// use lazyresolv::dns::RecordType;
///
/// let wire = [
///     0x12, 0x34, 0x01, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
///     7, b'e', b'x', b'a', b'm', b'p', b'l', b'e', 3, b'c', b'o', b'm', 0,
///     0x00, 0x01, 0x00, 0x01,
/// ];
/// let message = parse_message(&wire)?;
/// assert_eq!(message.id(), 0x1234);
/// assert_eq!(message.questions()[0].qname(), "example.com");
/// assert_eq!(message.questions()[0].qtype(), RecordType::A);
/// # Ok::<(), lazyresolv::Error>(())
/// ```
pub fn parse_message(data: &[u8]) -> Result<Message> {
    Decoder::new(data).read_message()
}

/// Serialize a DNS message without name compression
///
/// Encoding the same message twice gives identical bytes.
pub fn serialize_message(message: &Message) -> Result<Vec<u8>> {
    Encoder::new(false).write_message(message)
}

/// Serialize a DNS message with name compression
///
/// Owner names, question names and the names embedded in CNAME, NS, PTR,
/// MX and SOA data are compressed against names written earlier in the
/// message. The offset table is filled in write order, so the output is
/// deterministic.
pub fn serialize_message_compressed(message: &Message) -> Result<Vec<u8>> {
    Encoder::new(true).write_message(message)
}

/// Serialize a message so that it fits in `limit` bytes
///
/// A message that already fits is returned as its compressed encoding.
/// Otherwise the TC flag is set, the authority and additional sections are
/// dropped (an OPT record is kept) and answers are removed from the end
/// until the encoding fits. Fails when even the header and question
/// section do not fit.
pub fn serialize_message_truncated(message: &Message, limit: usize) -> Result<Vec<u8>> {
    let full = serialize_message_compressed(message)?;
    if full.len() <= limit {
        return Ok(full);
    }

    let mut truncated = message.clone();
    truncated.set_truncated(true);
    truncated.authority_mut().clear();
    truncated
        .additional_mut()
        .retain(|rr| rr.rtype() == RecordType::OPT);

    loop {
        let bytes = serialize_message_compressed(&truncated)?;
        if bytes.len() <= limit {
            return Ok(bytes);
        }
        if truncated.answers_mut().pop().is_none() {
            return Err(Error::Encode(format!(
                "message does not fit in {} bytes even without records ({} bytes)",
                limit,
                bytes.len()
            )));
        }
    }
}

fn fail(offset: usize, kind: DecodeErrorKind) -> Error {
    DecodeError::new(offset, kind).into()
}

/// Bounded cursor over a message buffer
///
/// `end` is the scope of the current read: the whole buffer, or the
/// record data of the record being decoded.
struct Decoder<'a> {
    buf: &'a [u8],
    pos: usize,
    end: usize,
}

impl<'a> Decoder<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self {
            buf,
            pos: 0,
            end: buf.len(),
        }
    }

    fn remaining(&self) -> usize {
        self.end.saturating_sub(self.pos)
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let available = self.remaining();
        if available < n {
            return Err(fail(
                self.pos,
                DecodeErrorKind::UnexpectedEnd {
                    needed: n,
                    available,
                },
            ));
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn read_u16(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn read_u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn read_rest(&mut self) -> Vec<u8> {
        let rest = self.buf[self.pos..self.end].to_vec();
        self.pos = self.end;
        rest
    }

    /// Bytes prefixed by a one-byte length (salt, hash)
    fn read_short_bytes(&mut self) -> Result<Vec<u8>> {
        let len = self.read_u8()? as usize;
        Ok(self.take(len)?.to_vec())
    }

    fn read_character_string(&mut self) -> Result<&'a [u8]> {
        let at = self.pos;
        let len = self.read_u8()? as usize;
        if len > self.remaining() {
            return Err(fail(at, DecodeErrorKind::CharacterString));
        }
        self.take(len)
    }

    fn read_name(&mut self) -> Result<String> {
        let mut name = String::new();
        let mut wire_len = 1usize;
        let mut cursor = self.pos;
        // Bytes read in place stay inside the current scope; bytes reached
        // through a pointer may be anywhere before it.
        let mut bound = self.end;
        let mut resume: Option<usize> = None;
        let mut ceiling = usize::MAX;

        loop {
            if cursor >= bound {
                return Err(fail(
                    cursor,
                    DecodeErrorKind::UnexpectedEnd {
                        needed: 1,
                        available: 0,
                    },
                ));
            }
            let len = self.buf[cursor];
            match len & 0xC0 {
                0x00 => {
                    let len = len as usize;
                    if len == 0 {
                        cursor += 1;
                        break;
                    }
                    let start = cursor + 1;
                    if start + len > bound {
                        return Err(fail(cursor, DecodeErrorKind::LabelOverflow(len)));
                    }
                    wire_len += len + 1;
                    if wire_len > MAX_NAME_LEN {
                        return Err(fail(cursor, DecodeErrorKind::NameTooLong));
                    }
                    if !name.is_empty() {
                        name.push('.');
                    }
                    escape_label(&self.buf[start..start + len], &mut name);
                    cursor = start + len;
                }
                0xC0 => {
                    if cursor + 1 >= bound {
                        return Err(fail(
                            cursor,
                            DecodeErrorKind::UnexpectedEnd {
                                needed: 2,
                                available: bound - cursor,
                            },
                        ));
                    }
                    let target = (usize::from(len & 0x3F) << 8) | usize::from(self.buf[cursor + 1]);
                    if target >= cursor || target >= ceiling {
                        return Err(fail(cursor, DecodeErrorKind::PointerLoop { target }));
                    }
                    if resume.is_none() {
                        resume = Some(cursor + 2);
                    }
                    ceiling = target;
                    cursor = target;
                    bound = self.buf.len();
                }
                bits => return Err(fail(cursor, DecodeErrorKind::InvalidLabelType(bits))),
            }
        }

        self.pos = resume.unwrap_or(cursor);
        if name.is_empty() {
            name.push('.');
        }
        Ok(name)
    }

    fn read_header(&mut self) -> Result<Header> {
        let id = self.read_u16()?;
        let flags = self.read_u16()?;
        Ok(Header {
            id,
            qr: flags & 0x8000 != 0,
            opcode: OpCode::from_u8(((flags >> 11) & 0x0F) as u8),
            aa: flags & 0x0400 != 0,
            tc: flags & 0x0200 != 0,
            rd: flags & 0x0100 != 0,
            ra: flags & 0x0080 != 0,
            ad: flags & 0x0020 != 0,
            cd: flags & 0x0010 != 0,
            rcode: ResponseCode::from_u8((flags & 0x000F) as u8),
            qdcount: self.read_u16()?,
            ancount: self.read_u16()?,
            nscount: self.read_u16()?,
            arcount: self.read_u16()?,
        })
    }

    fn read_message(&mut self) -> Result<Message> {
        let header = self.read_header()?;
        let mut message = Message::new();
        message.set_header(&header);

        for _ in 0..header.qdcount {
            let qname = self.read_name()?;
            let qtype = RecordType::from_u16(self.read_u16()?);
            let qclass = RecordClass::from_u16(self.read_u16()?);
            message.add_question(Question::with_arc(Arc::from(qname), qtype, qclass));
        }
        for _ in 0..header.ancount {
            let record = self.read_record()?;
            message.add_answer(record);
        }
        for _ in 0..header.nscount {
            let record = self.read_record()?;
            message.add_authority(record);
        }
        for _ in 0..header.arcount {
            let record = self.read_record()?;
            message.add_additional(record);
        }
        Ok(message)
    }

    fn read_record(&mut self) -> Result<ResourceRecord> {
        let name = self.read_name()?;
        let rtype = RecordType::from_u16(self.read_u16()?);
        let class = self.read_u16()?;
        let ttl = self.read_u32()?;
        let rdlength = self.read_u16()? as usize;

        let start = self.pos;
        let available = self.remaining();
        if available < rdlength {
            return Err(fail(
                start,
                DecodeErrorKind::UnexpectedEnd {
                    needed: rdlength,
                    available,
                },
            ));
        }

        let outer = self.end;
        self.end = start + rdlength;
        let rdata = self.read_rdata(rtype, class, ttl, rdlength)?;
        let consumed = self.pos - start;
        if consumed != rdlength {
            return Err(fail(
                start,
                DecodeErrorKind::RdataLength {
                    declared: rdlength,
                    consumed,
                },
            ));
        }
        self.end = outer;

        Ok(ResourceRecord::with_arc(
            Arc::from(name),
            rtype,
            RecordClass::from_u16(class),
            ttl,
            rdata,
        ))
    }

    fn read_rdata(&mut self, rtype: RecordType, class: u16, ttl: u32, rdlength: usize) -> Result<RData> {
        // Empty data appears in dynamic update prerequisites
        if rdlength == 0 && !matches!(rtype, RecordType::OPT | RecordType::TXT) {
            return Ok(RData::Unknown(Vec::new()));
        }

        let rdata = match rtype {
            RecordType::A => {
                let b = self.take(4)?;
                RData::A([b[0], b[1], b[2], b[3]].into())
            }
            RecordType::AAAA => {
                let mut octets = [0u8; 16];
                octets.copy_from_slice(self.take(16)?);
                RData::AAAA(octets.into())
            }
            RecordType::CNAME => RData::CNAME(self.read_name()?),
            RecordType::NS => RData::NS(self.read_name()?),
            RecordType::PTR => RData::PTR(self.read_name()?),
            RecordType::MX => RData::MX {
                preference: self.read_u16()?,
                exchange: self.read_name()?,
            },
            RecordType::TXT => {
                let mut texts = Vec::new();
                while self.remaining() > 0 {
                    texts.push(self.read_character_string()?.to_vec());
                }
                RData::TXT(texts)
            }
            RecordType::SOA => RData::SOA {
                mname: self.read_name()?,
                rname: self.read_name()?,
                serial: self.read_u32()?,
                refresh: self.read_u32()?,
                retry: self.read_u32()?,
                expire: self.read_u32()?,
                minimum: self.read_u32()?,
            },
            RecordType::SRV => RData::SRV {
                priority: self.read_u16()?,
                weight: self.read_u16()?,
                port: self.read_u16()?,
                target: self.read_name()?,
            },
            RecordType::CAA => {
                let start = self.pos;
                let flags = self.read_u8()?;
                match std::str::from_utf8(self.read_character_string()?) {
                    Ok(tag) => RData::CAA {
                        flags,
                        tag: tag.to_string(),
                        value: self.read_rest(),
                    },
                    // Tags are ASCII; anything else is kept verbatim
                    Err(_) => {
                        self.pos = start;
                        RData::Unknown(self.read_rest())
                    }
                }
            }
            RecordType::SVCB => RData::SVCB {
                priority: self.read_u16()?,
                target: self.read_name()?,
                params: self.read_rest(),
            },
            RecordType::HTTPS => RData::HTTPS {
                priority: self.read_u16()?,
                target: self.read_name()?,
                params: self.read_rest(),
            },
            RecordType::DS => RData::DS {
                key_tag: self.read_u16()?,
                algorithm: self.read_u8()?,
                digest_type: self.read_u8()?,
                digest: self.read_rest(),
            },
            RecordType::RRSIG => RData::RRSIG {
                type_covered: self.read_u16()?,
                algorithm: self.read_u8()?,
                labels: self.read_u8()?,
                original_ttl: self.read_u32()?,
                expiration: self.read_u32()?,
                inception: self.read_u32()?,
                key_tag: self.read_u16()?,
                signer_name: self.read_name()?,
                signature: self.read_rest(),
            },
            RecordType::NSEC => RData::NSEC {
                next_domain: self.read_name()?,
                type_bitmaps: self.read_rest(),
            },
            RecordType::DNSKEY => RData::DNSKEY {
                flags: self.read_u16()?,
                protocol: self.read_u8()?,
                algorithm: self.read_u8()?,
                public_key: self.read_rest(),
            },
            RecordType::NSEC3 => RData::NSEC3 {
                hash_algorithm: self.read_u8()?,
                flags: self.read_u8()?,
                iterations: self.read_u16()?,
                salt: self.read_short_bytes()?,
                next_hashed: self.read_short_bytes()?,
                type_bitmaps: self.read_rest(),
            },
            RecordType::NSEC3PARAM => RData::NSEC3PARAM {
                hash_algorithm: self.read_u8()?,
                flags: self.read_u8()?,
                iterations: self.read_u16()?,
                salt: self.read_short_bytes()?,
            },
            RecordType::OPT => {
                let (extended_rcode, version, flags) = unpack_opt_ttl(ttl);
                let mut options = Vec::new();
                while self.remaining() > 0 {
                    let code = self.read_u16()?;
                    let len = self.read_u16()? as usize;
                    options.push((code, self.take(len)?.to_vec()));
                }
                RData::OPT {
                    udp_payload_size: class,
                    extended_rcode,
                    version,
                    flags,
                    options,
                }
            }
            RecordType::ANY | RecordType::Unknown(_) => RData::Unknown(self.read_rest()),
        };
        Ok(rdata)
    }
}

/// Append a label in presentation form
///
/// `.` and `\\` are backslash-escaped and bytes outside printable ASCII
/// become `\DDD`, so any label read off the wire encodes back unchanged.
fn escape_label(label: &[u8], out: &mut String) {
    for &byte in label {
        match byte {
            b'.' | b'\\' => {
                out.push('\\');
                out.push(byte as char);
            }
            0x21..=0x7E => out.push(byte as char),
            _ => out.push_str(&format!("\\{:03}", byte)),
        }
    }
}

/// Split a presentation-form name into raw labels, resolving escapes
///
/// The root (`""` or `"."`) has no labels. An unescaped trailing dot is
/// dropped; any other empty label is an error.
fn unescape_name(name: &str) -> Result<Vec<Vec<u8>>> {
    if name.is_empty() || name == "." {
        return Ok(Vec::new());
    }
    let bad = |why: &str| Error::Encode(format!("{} in name '{}'", why, name));

    let mut labels = Vec::new();
    let mut label = Vec::new();
    let mut bytes = name.bytes();
    while let Some(byte) = bytes.next() {
        match byte {
            b'.' => {
                if label.is_empty() {
                    return Err(bad("empty label"));
                }
                labels.push(std::mem::take(&mut label));
            }
            b'\\' => match bytes.next() {
                Some(d) if d.is_ascii_digit() => {
                    let mut value = u32::from(d - b'0');
                    for _ in 0..2 {
                        match bytes.next() {
                            Some(d) if d.is_ascii_digit() => value = value * 10 + u32::from(d - b'0'),
                            _ => return Err(bad("short \\DDD escape")),
                        }
                    }
                    let value = u8::try_from(value).map_err(|_| bad("\\DDD escape above 255"))?;
                    label.push(value);
                }
                Some(other) => label.push(other),
                None => return Err(bad("dangling backslash")),
            },
            _ => label.push(byte),
        }
    }
    if !label.is_empty() {
        labels.push(label);
    }
    Ok(labels)
}

/// Compression table key for a run of labels: wire form, lowercased
fn suffix_key(labels: &[Vec<u8>]) -> Vec<u8> {
    let mut key = Vec::new();
    for label in labels {
        key.push(label.len() as u8);
        key.extend(label.iter().map(u8::to_ascii_lowercase));
    }
    key
}

/// Message writer with an optional compression table
struct Encoder {
    buf: Vec<u8>,
    /// Lowercased wire-form name suffix -> offset of its first occurrence
    names: Option<HashMap<Vec<u8>, u16>>,
}

impl Encoder {
    fn new(compress: bool) -> Self {
        Self {
            buf: Vec::with_capacity(512),
            names: compress.then(HashMap::new),
        }
    }

    fn put_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    fn put_u16(&mut self, value: u16) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    fn put_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    fn put_character_string(&mut self, text: &[u8]) -> Result<()> {
        let len = u8::try_from(text.len()).map_err(|_| {
            Error::Encode(format!("character-string of {} bytes exceeds 255", text.len()))
        })?;
        self.put_u8(len);
        self.buf.extend_from_slice(text);
        Ok(())
    }

    fn put_short_bytes(&mut self, bytes: &[u8], what: &str) -> Result<()> {
        let len = u8::try_from(bytes.len())
            .map_err(|_| Error::Encode(format!("{} of {} bytes exceeds 255", what, bytes.len())))?;
        self.put_u8(len);
        self.buf.extend_from_slice(bytes);
        Ok(())
    }

    /// Write a name; `compressible` names may use and feed the offset table
    fn put_name(&mut self, name: &str, compressible: bool) -> Result<()> {
        let labels = unescape_name(name)?;
        let mut wire_len = 1usize;
        for label in &labels {
            if label.len() > MAX_LABEL_LEN {
                return Err(Error::Encode(format!(
                    "label in '{}' is {} bytes, limit is {}",
                    name,
                    label.len(),
                    MAX_LABEL_LEN
                )));
            }
            wire_len += label.len() + 1;
        }
        if wire_len > MAX_NAME_LEN {
            return Err(Error::Encode(format!(
                "name '{}' is {} bytes on the wire, limit is {}",
                name, wire_len, MAX_NAME_LEN
            )));
        }

        for (i, label) in labels.iter().enumerate() {
            if compressible {
                let here = self.buf.len();
                if let Some(table) = self.names.as_mut() {
                    let suffix = suffix_key(&labels[i..]);
                    if let Some(&offset) = table.get(&suffix) {
                        self.buf.extend_from_slice(&(0xC000 | offset).to_be_bytes());
                        return Ok(());
                    }
                    if here <= MAX_POINTER_OFFSET {
                        table.insert(suffix, here as u16);
                    }
                }
            }
            self.put_u8(label.len() as u8);
            self.buf.extend_from_slice(label);
        }
        self.put_u8(0);
        Ok(())
    }

    fn write_message(mut self, message: &Message) -> Result<Vec<u8>> {
        let header = message.header();
        let sections = [
            ("question", message.questions().len()),
            ("answer", message.answers().len()),
            ("authority", message.authority().len()),
            ("additional", message.additional().len()),
        ];
        for (section, len) in sections {
            if len > usize::from(u16::MAX) {
                return Err(Error::Encode(format!(
                    "{} section has {} entries, limit is 65535",
                    section, len
                )));
            }
        }

        self.put_u16(header.id);
        self.put_u16(header.flags());
        self.put_u16(header.qdcount);
        self.put_u16(header.ancount);
        self.put_u16(header.nscount);
        self.put_u16(header.arcount);

        for question in message.questions() {
            self.put_name(question.qname(), true)?;
            self.put_u16(question.qtype().to_u16());
            self.put_u16(question.qclass().to_u16());
        }
        for record in message
            .answers()
            .iter()
            .chain(message.authority())
            .chain(message.additional())
        {
            self.put_record(record)?;
        }

        if self.buf.len() > MAX_MESSAGE_LEN {
            return Err(Error::Encode(format!(
                "message is {} bytes, limit is {}",
                self.buf.len(),
                MAX_MESSAGE_LEN
            )));
        }
        Ok(self.buf)
    }

    fn put_record(&mut self, record: &ResourceRecord) -> Result<()> {
        self.put_name(record.name(), true)?;
        self.put_u16(record.rtype().to_u16());

        let (class, ttl) = match record.rdata() {
            RData::OPT {
                udp_payload_size,
                extended_rcode,
                version,
                flags,
                ..
            } => (
                *udp_payload_size,
                pack_opt_ttl(*extended_rcode, *version, *flags),
            ),
            _ => (record.rclass().to_u16(), record.ttl()),
        };
        self.put_u16(class);
        self.put_u32(ttl);

        let len_at = self.buf.len();
        self.put_u16(0);
        self.put_rdata(record.rdata())?;
        let rdlength = u16::try_from(self.buf.len() - len_at - 2).map_err(|_| {
            Error::Encode(format!("record data of {} exceeds 65535 bytes", record.name()))
        })?;
        self.buf[len_at..len_at + 2].copy_from_slice(&rdlength.to_be_bytes());
        Ok(())
    }

    fn put_rdata(&mut self, rdata: &RData) -> Result<()> {
        match rdata {
            RData::A(addr) => self.buf.extend_from_slice(&addr.octets()),
            RData::AAAA(addr) => self.buf.extend_from_slice(&addr.octets()),
            RData::CNAME(name) | RData::NS(name) | RData::PTR(name) => {
                self.put_name(name, true)?
            }
            RData::MX {
                preference,
                exchange,
            } => {
                self.put_u16(*preference);
                self.put_name(exchange, true)?;
            }
            RData::TXT(texts) => {
                for text in texts {
                    self.put_character_string(text)?;
                }
            }
            RData::SOA {
                mname,
                rname,
                serial,
                refresh,
                retry,
                expire,
                minimum,
            } => {
                self.put_name(mname, true)?;
                self.put_name(rname, true)?;
                for value in [serial, refresh, retry, expire, minimum] {
                    self.put_u32(*value);
                }
            }
            RData::SRV {
                priority,
                weight,
                port,
                target,
            } => {
                self.put_u16(*priority);
                self.put_u16(*weight);
                self.put_u16(*port);
                self.put_name(target, false)?;
            }
            RData::CAA { flags, tag, value } => {
                self.put_u8(*flags);
                self.put_character_string(tag.as_bytes())?;
                self.buf.extend_from_slice(value);
            }
            RData::SVCB {
                priority,
                target,
                params,
            }
            | RData::HTTPS {
                priority,
                target,
                params,
            } => {
                self.put_u16(*priority);
                self.put_name(target, false)?;
                self.buf.extend_from_slice(params);
            }
            RData::DS {
                key_tag,
                algorithm,
                digest_type,
                digest,
            } => {
                self.put_u16(*key_tag);
                self.put_u8(*algorithm);
                self.put_u8(*digest_type);
                self.buf.extend_from_slice(digest);
            }
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
            } => {
                self.put_u16(*type_covered);
                self.put_u8(*algorithm);
                self.put_u8(*labels);
                self.put_u32(*original_ttl);
                self.put_u32(*expiration);
                self.put_u32(*inception);
                self.put_u16(*key_tag);
                self.put_name(signer_name, false)?;
                self.buf.extend_from_slice(signature);
            }
            RData::NSEC {
                next_domain,
                type_bitmaps,
            } => {
                self.put_name(next_domain, false)?;
                self.buf.extend_from_slice(type_bitmaps);
            }
            RData::DNSKEY {
                flags,
                protocol,
                algorithm,
                public_key,
            } => {
                self.put_u16(*flags);
                self.put_u8(*protocol);
                self.put_u8(*algorithm);
                self.buf.extend_from_slice(public_key);
            }
            RData::NSEC3 {
                hash_algorithm,
                flags,
                iterations,
                salt,
                next_hashed,
                type_bitmaps,
            } => {
                self.put_u8(*hash_algorithm);
                self.put_u8(*flags);
                self.put_u16(*iterations);
                self.put_short_bytes(salt, "NSEC3 salt")?;
                self.put_short_bytes(next_hashed, "NSEC3 hash")?;
                self.buf.extend_from_slice(type_bitmaps);
            }
            RData::NSEC3PARAM {
                hash_algorithm,
                flags,
                iterations,
                salt,
            } => {
                self.put_u8(*hash_algorithm);
                self.put_u8(*flags);
                self.put_u16(*iterations);
                self.put_short_bytes(salt, "NSEC3PARAM salt")?;
            }
            RData::OPT { options, .. } => {
                for (code, value) in options {
                    let len = u16::try_from(value.len()).map_err(|_| {
                        Error::Encode(format!("EDNS option {} exceeds 65535 bytes", code))
                    })?;
                    self.put_u16(*code);
                    self.put_u16(len);
                    self.buf.extend_from_slice(value);
                }
            }
            RData::Unknown(data) => self.buf.extend_from_slice(data),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, Ipv6Addr};

    const EXAMPLE_QUERY: [u8; 29] = [
        0x12, 0x34, 0x01, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 7, b'e', b'x',
        b'a', b'm', b'p', b'l', b'e', 3, b'c', b'o', b'm', 0, 0x00, 0x01, 0x00, 0x01,
    ];

    fn header(qd: u16, an: u16) -> Vec<u8> {
        let mut buf = vec![0xAB, 0xCD, 0x81, 0x80];
        buf.extend_from_slice(&qd.to_be_bytes());
        buf.extend_from_slice(&an.to_be_bytes());
        buf.extend_from_slice(&[0, 0, 0, 0]);
        buf
    }

    fn decode_kind(bytes: &[u8]) -> (usize, DecodeErrorKind) {
        match parse_message(bytes) {
            Err(Error::Decode(err)) => (err.offset, err.kind),
            other => panic!("expected decode error, got {:?}", other),
        }
    }

    fn a_response() -> Message {
        let mut message = Message::query(
            0xBEEF,
            Question::new("example.com", RecordType::A, RecordClass::IN),
            true,
        );
        message.set_response(true);
        message.set_recursion_available(true);
        message.add_answer(ResourceRecord::new(
            "example.com",
            RecordType::A,
            RecordClass::IN,
            300,
            RData::A(Ipv4Addr::new(93, 184, 216, 34)),
        ));
        message
    }

    #[test]
    fn test_encode_query_matches_rfc_layout() {
        let message = Message::query(
            0x1234,
            Question::new("example.com", RecordType::A, RecordClass::IN),
            true,
        );
        assert_eq!(serialize_message(&message).unwrap(), EXAMPLE_QUERY.to_vec());
        assert_eq!(parse_message(&EXAMPLE_QUERY).unwrap(), message);
    }

    #[test]
    fn test_header_flags_decode() {
        let mut bytes = header(0, 0);
        bytes[2] = 0x85;
        bytes[3] = 0x83;
        let message = parse_message(&bytes).unwrap();
        assert_eq!(message.id(), 0xABCD);
        assert!(message.is_response());
        assert!(message.is_authoritative());
        assert!(message.recursion_desired());
        assert!(message.recursion_available());
        assert_eq!(message.response_code(), ResponseCode::NXDomain);
        assert!(!message.authentic_data());
        assert!(!message.checking_disabled());
    }

    #[test]
    fn test_dnssec_flags_survive_decode_and_encode() {
        let mut bytes = header(0, 0);
        bytes[3] = 0xB0;
        let message = parse_message(&bytes).unwrap();
        assert!(message.authentic_data());
        assert!(message.checking_disabled());
        assert_eq!(serialize_message(&message).unwrap(), bytes);
    }

    #[test]
    fn test_short_header_is_unexpected_end() {
        let (offset, kind) = decode_kind(&[0x12, 0x34, 0x01]);
        assert_eq!(offset, 2);
        assert!(matches!(kind, DecodeErrorKind::UnexpectedEnd { needed: 2, available: 1 }));
    }

    #[test]
    fn test_pointer_to_itself_is_loop() {
        let mut bytes = header(1, 0);
        bytes.extend_from_slice(&[0xC0, 12, 0, 1, 0, 1]);
        let (offset, kind) = decode_kind(&bytes);
        assert_eq!(offset, 12);
        assert_eq!(kind, DecodeErrorKind::PointerLoop { target: 12 });
    }

    #[test]
    fn test_forward_pointer_is_loop() {
        let mut bytes = header(1, 0);
        bytes.extend_from_slice(&[0xC0, 20, 0, 1, 0, 1, 0, 0, 0]);
        let (_, kind) = decode_kind(&bytes);
        assert_eq!(kind, DecodeErrorKind::PointerLoop { target: 20 });
    }

    #[test]
    fn test_backward_pointer_cycle_is_rejected() {
        // 12: "a" then pointer to 12, which is behind the pointer but not
        // below the start of the run it sits in
        let mut bytes = header(1, 0);
        bytes.extend_from_slice(&[1, b'a', 0xC0, 12, 0, 1, 0, 1]);
        let (offset, kind) = decode_kind(&bytes);
        assert_eq!(offset, 14);
        assert!(matches!(
            kind,
            DecodeErrorKind::PointerLoop { .. } | DecodeErrorKind::NameTooLong
        ));
    }

    #[test]
    fn test_reserved_label_type_rejected() {
        let mut bytes = header(1, 0);
        bytes.extend_from_slice(&[0x41, b'a', 0, 0, 1, 0, 1]);
        let (offset, kind) = decode_kind(&bytes);
        assert_eq!(offset, 12);
        assert_eq!(kind, DecodeErrorKind::InvalidLabelType(0x40));
    }

    #[test]
    fn test_label_past_end_is_overflow() {
        let mut bytes = header(1, 0);
        bytes.extend_from_slice(&[10, b'a', b'b']);
        let (offset, kind) = decode_kind(&bytes);
        assert_eq!(offset, 12);
        assert_eq!(kind, DecodeErrorKind::LabelOverflow(10));
    }

    #[test]
    fn test_rdlength_mismatch() {
        let mut bytes = header(0, 1);
        // root owner, A IN, ttl 60, rdlength 5 with 5 bytes present
        bytes.extend_from_slice(&[0, 0, 1, 0, 1, 0, 0, 0, 60, 0, 5, 1, 2, 3, 4, 5]);
        let (offset, kind) = decode_kind(&bytes);
        assert_eq!(offset, 23);
        assert_eq!(
            kind,
            DecodeErrorKind::RdataLength {
                declared: 5,
                consumed: 4
            }
        );
    }

    #[test]
    fn test_rdlength_past_end() {
        let mut bytes = header(0, 1);
        bytes.extend_from_slice(&[0, 0, 1, 0, 1, 0, 0, 0, 60, 0, 4, 1, 2]);
        let (_, kind) = decode_kind(&bytes);
        assert!(matches!(kind, DecodeErrorKind::UnexpectedEnd { needed: 4, available: 2 }));
    }

    #[test]
    fn test_name_inside_rdata_cannot_escape_scope() {
        let mut bytes = header(0, 1);
        // CNAME whose rdata claims 2 bytes but its label runs further
        bytes.extend_from_slice(&[0, 0, 5, 0, 1, 0, 0, 0, 60, 0, 2, 3, b'a', b'b', b'c', 0]);
        let (_, kind) = decode_kind(&bytes);
        assert_eq!(kind, DecodeErrorKind::LabelOverflow(3));
    }

    #[test]
    fn test_txt_string_past_rdata() {
        let mut bytes = header(0, 1);
        bytes.extend_from_slice(&[0, 0, 16, 0, 1, 0, 0, 0, 60, 0, 3, 5, b'h', b'i']);
        let (_, kind) = decode_kind(&bytes);
        assert_eq!(kind, DecodeErrorKind::CharacterString);
    }

    #[test]
    fn test_compressed_names_decode() {
        let mut bytes = header(1, 1);
        bytes.extend_from_slice(&EXAMPLE_QUERY[12..]);
        // answer owner = pointer to the question name at 12
        bytes.extend_from_slice(&[0xC0, 12, 0, 5, 0, 1, 0, 0, 0x0E, 0x10, 0, 6]);
        // CNAME "www" + pointer to 12
        bytes.extend_from_slice(&[3, b'w', b'w', b'w', 0xC0, 12]);

        let message = parse_message(&bytes).unwrap();
        let answer = &message.answers()[0];
        assert_eq!(answer.name(), "example.com");
        assert_eq!(answer.ttl(), 3600);
        assert_eq!(answer.rdata(), &RData::CNAME("www.example.com".to_string()));
    }

    #[test]
    fn test_compression_shrinks_and_round_trips() {
        let mut message = a_response();
        message.add_answer(ResourceRecord::new(
            "example.com",
            RecordType::MX,
            RecordClass::IN,
            300,
            RData::mx(10, "mail.example.com"),
        ));

        let plain = serialize_message(&message).unwrap();
        let compressed = serialize_message_compressed(&message).unwrap();
        assert!(compressed.len() < plain.len());
        assert_eq!(parse_message(&compressed).unwrap(), message);
        assert_eq!(parse_message(&plain).unwrap(), message);
        assert_eq!(serialize_message_compressed(&message).unwrap(), compressed);
    }

    #[test]
    fn test_srv_target_is_never_compressed() {
        let mut message = Message::new();
        message.add_question(Question::new("example.com", RecordType::SRV, RecordClass::IN));
        message.add_answer(ResourceRecord::new(
            "example.com",
            RecordType::SRV,
            RecordClass::IN,
            60,
            RData::srv(1, 2, 5060, "example.com"),
        ));
        let bytes = serialize_message_compressed(&message).unwrap();
        // The SRV target is written in full at the end of the message
        assert_eq!(&bytes[bytes.len() - 13..], &EXAMPLE_QUERY[12..25]);
    }

    #[test]
    fn test_all_record_types_round_trip() {
        let records = vec![
            RData::AAAA(Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 1)),
            RData::ns("ns1.example.com"),
            RData::ptr("host.example.com"),
            RData::txt(vec!["v=spf1 -all".to_string(), String::new()]),
            RData::soa("ns1.example.com", "admin.example.com", 1, 2, 3, 4, 5),
            RData::srv(10, 20, 443, "svc.example.com"),
            RData::caa(0, "issue", "letsencrypt.org"),
            RData::HTTPS {
                priority: 1,
                target: ".".to_string(),
                params: vec![0, 1, 0, 3, 2, b'h', b'2'],
            },
            RData::DS {
                key_tag: 2371,
                algorithm: 13,
                digest_type: 2,
                digest: vec![0xAA; 32],
            },
            RData::RRSIG {
                type_covered: 1,
                algorithm: 13,
                labels: 2,
                original_ttl: 300,
                expiration: 1_700_000_000,
                inception: 1_690_000_000,
                key_tag: 2371,
                signer_name: "example.com".to_string(),
                signature: vec![1, 2, 3, 4],
            },
            RData::NSEC {
                next_domain: "a.example.com".to_string(),
                type_bitmaps: vec![0, 6, 0x40, 0, 0, 0, 0, 3],
            },
            RData::DNSKEY {
                flags: 257,
                protocol: 3,
                algorithm: 13,
                public_key: vec![9; 64],
            },
            RData::NSEC3 {
                hash_algorithm: 1,
                flags: 0,
                iterations: 0,
                salt: vec![],
                next_hashed: vec![7; 20],
                type_bitmaps: vec![0, 1, 0x40],
            },
            RData::NSEC3PARAM {
                hash_algorithm: 1,
                flags: 0,
                iterations: 5,
                salt: vec![0xAB, 0xCD],
            },
        ];

        let mut message = Message::new();
        message.set_response(true);
        for rdata in records {
            let rtype = rdata.record_type().unwrap();
            message.add_answer(ResourceRecord::new("example.com", rtype, RecordClass::IN, 60, rdata));
        }
        message.add_authority(ResourceRecord::new(
            "example.com",
            RecordType::Unknown(65280),
            RecordClass::IN,
            60,
            RData::Unknown(vec![0xDE, 0xAD]),
        ));

        let bytes = serialize_message(&message).unwrap();
        assert_eq!(parse_message(&bytes).unwrap(), message);
    }

    #[test]
    fn test_opt_record_round_trip() {
        let mut message = a_response();
        message.set_edns_record(ResourceRecord::opt(RData::OPT {
            udp_payload_size: 1232,
            extended_rcode: 0,
            version: 0,
            flags: 0x8000,
            options: vec![(8, vec![0, 1, 24, 0, 192, 0, 2])],
        }));

        let bytes = serialize_message(&message).unwrap();
        // OPT owner is root, CLASS carries the payload size
        let opt_at = bytes.len() - (11 + 4 + 7);
        assert_eq!(&bytes[opt_at..opt_at + 5], &[0, 0, 41, 0x04, 0xD0]);

        let decoded = parse_message(&bytes).unwrap();
        assert_eq!(decoded.edns_udp_size(), Some(1232));
        assert_eq!(decoded, message);
    }

    #[test]
    fn test_encode_rejects_bad_names() {
        let long_label = "a".repeat(64);
        let message = Message::query(
            1,
            Question::new(format!("{}.com", long_label), RecordType::A, RecordClass::IN),
            true,
        );
        assert!(matches!(serialize_message(&message), Err(Error::Encode(_))));

        let message = Message::query(
            1,
            Question::new("a..com", RecordType::A, RecordClass::IN),
            true,
        );
        assert!(matches!(serialize_message(&message), Err(Error::Encode(_))));

        let long_name = vec!["abcdefghij"; 25].join(".");
        let message = Message::query(
            1,
            Question::new(long_name, RecordType::A, RecordClass::IN),
            true,
        );
        assert!(matches!(serialize_message(&message), Err(Error::Encode(_))));
    }

    #[test]
    fn test_label_bytes_survive_decode_and_encode() {
        // One label "a.b", then a label holding a space and a non-UTF-8 byte
        let mut bytes = header(1, 0);
        bytes.extend_from_slice(&[3, b'a', b'.', b'b', 3, b' ', 0xff, b'\\', 0, 0, 1, 0, 1]);

        let message = parse_message(&bytes).unwrap();
        let qname = message.questions()[0].qname();
        assert_eq!(qname, "a\\.b.\\032\\255\\\\");
        assert_eq!(serialize_message(&message).unwrap(), bytes);
        assert_eq!(serialize_message_compressed(&message).unwrap(), bytes);

        // Two names differing only in where the dot sits stay distinct
        let record = |name: &str| {
            ResourceRecord::new(name, RecordType::A, RecordClass::IN, 60, RData::A(Ipv4Addr::LOCALHOST))
        };
        let escaped = record("a\\.b");
        let plain = record("a.b");
        let mut response = Message::new();
        response.add_answer(escaped.clone());
        response.add_answer(plain.clone());
        let decoded = parse_message(&serialize_message_compressed(&response).unwrap()).unwrap();
        assert_eq!(decoded.answers()[0].name(), escaped.name());
        assert_eq!(decoded.answers()[1].name(), plain.name());
    }

    #[test]
    fn test_bad_escapes_are_encode_errors() {
        for name in ["a\\", "a\\25", "a\\256.com"] {
            let message = Message::query(1, Question::new(name, RecordType::A, RecordClass::IN), true);
            assert!(matches!(serialize_message(&message), Err(Error::Encode(_))), "{name}");
        }
    }

    #[test]
    fn test_binary_txt_survives_decode_and_encode() {
        let mut bytes = header(0, 1);
        bytes.extend_from_slice(&[0, 0, 16, 0, 1, 0, 0, 0, 60, 0, 3, 2, 0xff, 0x00]);

        let message = parse_message(&bytes).unwrap();
        assert_eq!(message.answers()[0].rdata(), &RData::TXT(vec![vec![0xff, 0x00]]));
        assert_eq!(serialize_message(&message).unwrap(), bytes);
    }

    #[test]
    fn test_root_name_round_trip() {
        let message = Message::query(
            9,
            Question::new(".", RecordType::NS, RecordClass::IN),
            true,
        );
        let bytes = serialize_message(&message).unwrap();
        assert_eq!(bytes.len(), HEADER_LEN + 5);
        assert_eq!(parse_message(&bytes).unwrap().questions()[0].qname(), ".");
    }

    #[test]
    fn test_truncation_fits_limit() {
        let mut message = a_response();
        for i in 0..60u8 {
            message.add_answer(ResourceRecord::new(
                format!("host{}.example.com", i),
                RecordType::A,
                RecordClass::IN,
                300,
                RData::A(Ipv4Addr::new(10, 0, 0, i)),
            ));
        }
        message.add_authority(ResourceRecord::new(
            "example.com",
            RecordType::NS,
            RecordClass::IN,
            300,
            RData::ns("ns1.example.com"),
        ));
        message.set_edns(1232);

        let bytes = serialize_message_truncated(&message, 512).unwrap();
        assert!(bytes.len() <= 512);

        let decoded = parse_message(&bytes).unwrap();
        assert!(decoded.is_truncated());
        assert!(decoded.authority().is_empty());
        assert_eq!(decoded.edns_udp_size(), Some(1232));
        assert!(decoded.answers().len() < message.answers().len());
        assert_eq!(decoded.answers()[0], message.answers()[0]);
    }

    #[test]
    fn test_truncation_leaves_small_messages_alone() {
        let message = a_response();
        let bytes = serialize_message_truncated(&message, 512).unwrap();
        assert_eq!(bytes, serialize_message_compressed(&message).unwrap());
        assert!(!parse_message(&bytes).unwrap().is_truncated());
    }

    #[test]
    fn test_truncation_errors_when_question_does_not_fit() {
        let message = a_response();
        assert!(matches!(
            serialize_message_truncated(&message, HEADER_LEN),
            Err(Error::Encode(_))
        ));
    }
}
