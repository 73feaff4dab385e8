//! DNS message types and their wire format.
//!
//! This module implements the subset of RFC 1035 message handling an
//! iterative resolver needs: the fixed 12-byte header, question entries,
//! resource records and whole messages. Domain names are handled by
//! [`crate::name`].
//!
//! All multi-byte integers are in network byte order (big-endian). Parsing
//! goes through a [`Cursor`] over the complete message so that compression
//! pointers, which are offsets from the start of the message, can be
//! followed; the cursor's position is the single piece of parse state.
//!
//! # Core Types
//!
//! - [`RecordType`] - Numeric record type codes with mnemonic names
//! - [`DnsHeader`] - The 12-byte message header
//! - [`DnsQuestion`] - One entry of the question section
//! - [`ResourceRecord`] and [`RData`] - Answer, authority and additional entries
//! - [`DnsMessage`] - A header plus its four sections
//!
//! # Examples
//!
//! ```rust
//! use iterative_dns::dns::DnsHeader;
//!
//! let mut header = DnsHeader::new();
//! header.id = 12345;
//! header.question_count = 1;
//!
//! let mut buffer = Vec::new();
//! header.pack(&mut buffer);
//! assert_eq!(buffer.len(), 12);
//! ```

use core::fmt;
use std::{
    io::{Cursor, Read},
    net::Ipv4Addr,
    str::FromStr,
};

use thiserror::Error;

use crate::name::{DomainName, unpack_domain_name};

/// The Internet class, the only class this crate queries.
pub const CLASS_IN: u16 = 1;

/// Size of the fixed message header.
pub const HEADER_LEN: usize = 12;

/// QR: set on responses.
pub const FLAG_RESPONSE: u16 = 0x8000;
/// TC: the response did not fit and was truncated.
pub const FLAG_TRUNCATED: u16 = 0x0200;
/// RD: ask the server to resolve recursively on our behalf.
pub const FLAG_RECURSION_DESIRED: u16 = 0x0100;

const RCODE_MASK: u16 = 0x000F;

/// Errors raised while encoding or decoding wire data.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WireError {
    /// The buffer ended before a declared field was complete.
    #[error("message truncated: needed {needed} byte(s) at offset {offset}")]
    ShortBuffer { offset: usize, needed: usize },

    /// A name on the wire could not be decoded.
    #[error("malformed name at offset {offset}: {reason}")]
    MalformedName { offset: usize, reason: &'static str },

    /// Record data does not match what its type requires.
    #[error("malformed {rtype} record data at offset {offset}: {reason}")]
    BadRdata {
        offset: usize,
        rtype: RecordType,
        reason: &'static str,
    },

    /// A name given for encoding cannot be represented on the wire.
    #[error("invalid domain name: {0}")]
    InvalidName(String),
}

pub(crate) fn read_array<const N: usize>(cursor: &mut Cursor<&[u8]>) -> Result<[u8; N], WireError> {
    let offset = cursor.position() as usize;
    let mut buf = [0u8; N];
    cursor
        .read_exact(&mut buf)
        .map_err(|_| WireError::ShortBuffer { offset, needed: N })?;
    Ok(buf)
}

pub(crate) fn read_vec(cursor: &mut Cursor<&[u8]>, len: usize) -> Result<Vec<u8>, WireError> {
    let offset = cursor.position() as usize;
    let mut buf = vec![0u8; len];
    cursor
        .read_exact(&mut buf)
        .map_err(|_| WireError::ShortBuffer { offset, needed: len })?;
    Ok(buf)
}

fn read_u16(cursor: &mut Cursor<&[u8]>) -> Result<u16, WireError> {
    read_array::<2>(cursor).map(u16::from_be_bytes)
}

fn read_u32(cursor: &mut Cursor<&[u8]>) -> Result<u32, WireError> {
    read_array::<4>(cursor).map(u32::from_be_bytes)
}

/// The type of a resource record or question.
///
/// Only [`RecordType::A`] and [`RecordType::NS`] change how record data is
/// decoded; the other named types exist so they can be requested and printed
/// by name. Any code without a name is kept as [`RecordType::Unknown`].
///
/// ```rust
/// use iterative_dns::dns::RecordType;
///
/// assert_eq!(u16::from(RecordType::NS), 2);
/// assert_eq!(RecordType::from(28), RecordType::AAAA);
/// assert_eq!(RecordType::from(999), RecordType::Unknown(999));
/// assert_eq!("mx".parse::<RecordType>().unwrap(), RecordType::MX);
/// assert_eq!(RecordType::Unknown(999).to_string(), "TYPE999");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordType {
    /// IPv4 host address (RFC 1035).
    A,
    /// Authoritative name server (RFC 1035).
    NS,
    /// Canonical name for an alias (RFC 1035).
    CNAME,
    /// Start of a zone of authority (RFC 1035).
    SOA,
    /// Mail exchange (RFC 1035).
    MX,
    /// Text strings (RFC 1035).
    TXT,
    /// IPv6 host address (RFC 3596).
    AAAA,
    /// Any other type code, carried through untouched.
    Unknown(u16),
}

impl From<u16> for RecordType {
    fn from(value: u16) -> Self {
        match value {
            1 => RecordType::A,
            2 => RecordType::NS,
            5 => RecordType::CNAME,
            6 => RecordType::SOA,
            15 => RecordType::MX,
            16 => RecordType::TXT,
            28 => RecordType::AAAA,
            other => RecordType::Unknown(other),
        }
    }
}

impl From<RecordType> for u16 {
    fn from(value: RecordType) -> Self {
        match value {
            RecordType::A => 1,
            RecordType::NS => 2,
            RecordType::CNAME => 5,
            RecordType::SOA => 6,
            RecordType::MX => 15,
            RecordType::TXT => 16,
            RecordType::AAAA => 28,
            RecordType::Unknown(code) => code,
        }
    }
}

impl FromStr for RecordType {
    type Err = String;

    /// Parses a mnemonic such as `A` or `aaaa`, or the generic `TYPE<n>` form
    /// of RFC 3597.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.to_ascii_uppercase();
        match upper.as_str() {
            "A" => Ok(RecordType::A),
            "NS" => Ok(RecordType::NS),
            "CNAME" => Ok(RecordType::CNAME),
            "SOA" => Ok(RecordType::SOA),
            "MX" => Ok(RecordType::MX),
            "TXT" => Ok(RecordType::TXT),
            "AAAA" => Ok(RecordType::AAAA),
            _ => upper
                .strip_prefix("TYPE")
                .and_then(|code| code.parse::<u16>().ok())
                .map(RecordType::from)
                .ok_or_else(|| format!("Unknown record type: {}", s)),
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordType::A => write!(f, "A"),
            RecordType::NS => write!(f, "NS"),
            RecordType::CNAME => write!(f, "CNAME"),
            RecordType::SOA => write!(f, "SOA"),
            RecordType::MX => write!(f, "MX"),
            RecordType::TXT => write!(f, "TXT"),
            RecordType::AAAA => write!(f, "AAAA"),
            RecordType::Unknown(code) => write!(f, "TYPE{}", code),
        }
    }
}

/// The 4-bit response code (RCODE) carried in the low bits of the flags.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ResponseCode {
    /// No error condition.
    NoError,
    /// The server could not interpret the query.
    FormatError,
    /// The server failed internally.
    ServerFailure,
    /// The queried name does not exist (NXDOMAIN).
    NameError,
    /// The server does not support this kind of query.
    NotImplemented,
    /// The server refuses to answer for policy reasons.
    Refused,
    /// Any RCODE above 5.
    Other(u8),
}

impl From<u8> for ResponseCode {
    fn from(value: u8) -> Self {
        match value {
            0 => ResponseCode::NoError,
            1 => ResponseCode::FormatError,
            2 => ResponseCode::ServerFailure,
            3 => ResponseCode::NameError,
            4 => ResponseCode::NotImplemented,
            5 => ResponseCode::Refused,
            other => ResponseCode::Other(other),
        }
    }
}

impl fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseCode::NoError => write!(f, "NOERROR"),
            ResponseCode::FormatError => write!(f, "FORMERR"),
            ResponseCode::ServerFailure => write!(f, "SERVFAIL"),
            ResponseCode::NameError => write!(f, "NXDOMAIN"),
            ResponseCode::NotImplemented => write!(f, "NOTIMP"),
            ResponseCode::Refused => write!(f, "REFUSED"),
            ResponseCode::Other(code) => write!(f, "RCODE{}", code),
        }
    }
}

/// The fixed 12-byte header at the start of every DNS message.
///
/// ```text
///                                 1  1  1  1  1  1
///   0  1  2  3  4  5  6  7  8  9  0  1  2  3  4  5
/// +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
/// |                      ID                       |
/// +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
/// |QR|   Opcode  |AA|TC|RD|RA|   Z    |   RCODE   |
/// +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
/// |                    QDCOUNT                    |
/// |                    ANCOUNT                    |
/// |                    NSCOUNT                    |
/// |                    ARCOUNT                    |
/// +--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+--+
/// ```
///
/// The section counts are trusted as-is when a message is parsed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DnsHeader {
    /// Transaction id, echoed by the server in its response.
    pub id: u16,
    /// Raw flags word; see the `FLAG_*` constants.
    pub flags: u16,
    pub question_count: u16,
    pub answer_count: u16,
    pub authority_count: u16,
    pub additional_count: u16,
}

impl DnsHeader {
    /// Creates a header with every field zeroed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends the 12 header bytes to `buffer`.
    ///
    /// ```rust
    /// use iterative_dns::dns::DnsHeader;
    ///
    /// let mut header = DnsHeader::new();
    /// header.id = 0x1234;
    /// header.question_count = 1;
    ///
    /// let mut buffer = Vec::new();
    /// header.pack(&mut buffer);
    /// assert_eq!(&buffer[0..2], &[0x12, 0x34]);
    /// assert_eq!(&buffer[4..6], &[0x00, 0x01]);
    /// ```
    pub fn pack(&self, buffer: &mut Vec<u8>) {
        buffer.extend_from_slice(&self.id.to_be_bytes());
        buffer.extend_from_slice(&self.flags.to_be_bytes());
        buffer.extend_from_slice(&self.question_count.to_be_bytes());
        buffer.extend_from_slice(&self.answer_count.to_be_bytes());
        buffer.extend_from_slice(&self.authority_count.to_be_bytes());
        buffer.extend_from_slice(&self.additional_count.to_be_bytes());
    }

    /// Reads a header, advancing the cursor by 12 bytes.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::ShortBuffer`] if fewer than 12 bytes remain.
    pub fn from_bytes(cursor: &mut Cursor<&[u8]>) -> Result<Self, WireError> {
        Ok(DnsHeader {
            id: read_u16(cursor)?,
            flags: read_u16(cursor)?,
            question_count: read_u16(cursor)?,
            answer_count: read_u16(cursor)?,
            authority_count: read_u16(cursor)?,
            additional_count: read_u16(cursor)?,
        })
    }

    pub fn recursion_desired(&self) -> bool {
        self.flags & FLAG_RECURSION_DESIRED != 0
    }

    pub fn set_recursion_desired(&mut self, value: bool) {
        if value {
            self.flags |= FLAG_RECURSION_DESIRED;
        } else {
            self.flags &= !FLAG_RECURSION_DESIRED;
        }
    }

    pub fn is_response(&self) -> bool {
        self.flags & FLAG_RESPONSE != 0
    }

    pub fn is_truncated(&self) -> bool {
        self.flags & FLAG_TRUNCATED != 0
    }

    pub fn response_code(&self) -> ResponseCode {
        ResponseCode::from((self.flags & RCODE_MASK) as u8)
    }
}

/// One entry of the question section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsQuestion {
    pub name: DomainName,
    pub qtype: RecordType,
    /// Query class; always [`CLASS_IN`] for questions this crate builds.
    pub qclass: u16,
}

impl DnsQuestion {
    /// Appends the uncompressed name followed by type and class.
    ///
    /// # Errors
    ///
    /// Fails only if the name itself is not encodable.
    pub fn pack(&self, buffer: &mut Vec<u8>) -> Result<(), WireError> {
        self.name.pack(buffer)?;
        buffer.extend_from_slice(&u16::from(self.qtype).to_be_bytes());
        buffer.extend_from_slice(&self.qclass.to_be_bytes());
        Ok(())
    }

    pub fn from_bytes(cursor: &mut Cursor<&[u8]>) -> Result<Self, WireError> {
        let name = unpack_domain_name(cursor)?;
        let qtype = RecordType::from(read_u16(cursor)?);
        let qclass = read_u16(cursor)?;

        Ok(DnsQuestion {
            name,
            qtype,
            qclass,
        })
    }
}

/// Decoded record data, selected by the record's type.
///
/// ```rust
/// use iterative_dns::dns::RData;
/// use std::net::Ipv4Addr;
///
/// let data = RData::A(Ipv4Addr::new(93, 184, 216, 34));
/// assert_eq!(data.to_string(), "93.184.216.34");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RData {
    /// Address of an A record.
    A(Ipv4Addr),
    /// Target name of an NS record.
    NS(DomainName),
    /// Record data of any other type, exactly as received.
    Raw(Vec<u8>),
}

impl RData {
    pub fn as_ipv4(&self) -> Option<Ipv4Addr> {
        match self {
            RData::A(addr) => Some(*addr),
            _ => None,
        }
    }

    pub fn as_name(&self) -> Option<&DomainName> {
        match self {
            RData::NS(name) => Some(name),
            _ => None,
        }
    }
}

impl fmt::Display for RData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RData::A(addr) => write!(f, "{}", addr),
            RData::NS(name) => write!(f, "{}", name),
            // Generic RFC 3597 presentation.
            RData::Raw(data) => {
                write!(f, "\\# {}", data.len())?;
                if !data.is_empty() {
                    write!(f, " ")?;
                    for byte in data {
                        write!(f, "{:02x}", byte)?;
                    }
                }
                Ok(())
            }
        }
    }
}

/// One entry of the answer, authority or additional section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRecord {
    /// The name this record belongs to.
    pub name: DomainName,
    pub rtype: RecordType,
    pub rclass: u16,
    /// Time-to-live in seconds.
    pub ttl: u32,
    pub data: RData,
}

impl fmt::Display for ResourceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let class = if self.rclass == CLASS_IN {
            "IN".to_string()
        } else {
            format!("CLASS{}", self.rclass)
        };
        write!(
            f,
            "{:<30} {:<8} {:<4} {:<6} {}",
            self.name.to_string(),
            self.ttl,
            class,
            self.rtype.to_string(),
            self.data
        )
    }
}

impl ResourceRecord {
    /// Reads a resource record starting at the cursor's position.
    ///
    /// After the owner name, the fixed 10-byte block of type, class, TTL and
    /// RDLENGTH is read, then RDLENGTH bytes of data are interpreted by type:
    ///
    /// - **A**: exactly four bytes, decoded into [`RData::A`].
    /// - **NS**: a possibly compressed name, decoded into [`RData::NS`].
    /// - **anything else**: the raw bytes, kept in [`RData::Raw`].
    ///
    /// Whatever the type, the cursor is left right after the declared data.
    ///
    /// # Errors
    ///
    /// - [`WireError::ShortBuffer`] if the record or its declared data runs
    ///   past the end of the message.
    /// - [`WireError::BadRdata`] if an A record's data is not four bytes, or
    ///   an NS name does not fit inside the declared data.
    /// - [`WireError::MalformedName`] for undecodable owner or NS names.
    pub fn from_bytes(cursor: &mut Cursor<&[u8]>) -> Result<Self, WireError> {
        let name = unpack_domain_name(cursor)?;

        let rtype = RecordType::from(read_u16(cursor)?);
        let rclass = read_u16(cursor)?;
        let ttl = read_u32(cursor)?;
        let data_len = read_u16(cursor)? as usize;

        let data_start = cursor.position() as usize;
        let data_end = data_start + data_len;
        if data_end > cursor.get_ref().len() {
            return Err(WireError::ShortBuffer {
                offset: data_start,
                needed: data_len,
            });
        }

        let data = match rtype {
            RecordType::A => {
                if data_len != 4 {
                    return Err(WireError::BadRdata {
                        offset: data_start,
                        rtype,
                        reason: "address must be 4 bytes",
                    });
                }
                RData::A(Ipv4Addr::from(read_array::<4>(cursor)?))
            }
            RecordType::NS => {
                let target = unpack_domain_name(cursor)?;
                if cursor.position() as usize > data_end {
                    return Err(WireError::BadRdata {
                        offset: data_start,
                        rtype,
                        reason: "name overruns record data",
                    });
                }
                RData::NS(target)
            }
            _ => RData::Raw(read_vec(cursor, data_len)?),
        };

        cursor.set_position(data_end as u64);

        Ok(ResourceRecord {
            name,
            rtype,
            rclass,
            ttl,
            data,
        })
    }
}

/// A complete DNS message.
///
/// Messages are built once, either by [`DnsMessage::from_bytes`] or by a
/// query builder, and are not modified afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DnsMessage {
    pub header: DnsHeader,
    pub questions: Vec<DnsQuestion>,
    pub answers: Vec<ResourceRecord>,
    pub authorities: Vec<ResourceRecord>,
    pub additionals: Vec<ResourceRecord>,
}

impl DnsMessage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serializes the header and question section.
    ///
    /// Only queries are ever sent, so records are not written; the caller is
    /// responsible for header counts that match.
    pub fn pack(&self, buffer: &mut Vec<u8>) -> Result<(), WireError> {
        self.header.pack(buffer);
        for question in &self.questions {
            question.pack(buffer)?;
        }
        Ok(())
    }

    /// Parses a complete message.
    ///
    /// Exactly as many entries are read for each section as the header
    /// declares, in order: questions, answers, authorities, additionals.
    /// Bytes left over after the last declared record are ignored.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, WireError> {
        let mut cursor = Cursor::new(bytes);
        let header = DnsHeader::from_bytes(&mut cursor)?;

        let mut questions = Vec::with_capacity(header.question_count as usize);
        for _ in 0..header.question_count {
            questions.push(DnsQuestion::from_bytes(&mut cursor)?);
        }

        let answers = read_records(&mut cursor, header.answer_count)?;
        let authorities = read_records(&mut cursor, header.authority_count)?;
        let additionals = read_records(&mut cursor, header.additional_count)?;

        Ok(DnsMessage {
            header,
            questions,
            answers,
            authorities,
            additionals,
        })
    }

    /// Data of the first answer record of type `rtype`.
    pub fn answer_of_type(&self, rtype: RecordType) -> Option<&RData> {
        self.answers
            .iter()
            .find(|record| record.rtype == rtype)
            .map(|record| &record.data)
    }

    /// Address of the first A record in the additional section.
    pub fn glue_address(&self) -> Option<Ipv4Addr> {
        self.additionals
            .iter()
            .find_map(|record| record.data.as_ipv4())
    }

    /// Target of the first NS record in the authority section.
    pub fn referral_name(&self) -> Option<&DomainName> {
        self.authorities
            .iter()
            .find_map(|record| record.data.as_name())
    }
}

fn read_records(cursor: &mut Cursor<&[u8]>, count: u16) -> Result<Vec<ResourceRecord>, WireError> {
    // Capacity is not taken from the untrusted count.
    let mut records = Vec::new();
    for _ in 0..count {
        records.push(ResourceRecord::from_bytes(cursor)?);
    }
    Ok(records)
}
