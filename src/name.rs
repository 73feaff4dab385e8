//! Domain name encoding and decoding.
//!
//! Names travel on the wire as a run of length-prefixed labels closed by a
//! zero-length label (RFC 1035, section 3.1). A name may also end in a
//! two-byte compression pointer (RFC 1035, section 4.1.4) whose low 14 bits
//! are an offset from the start of the message where the rest of the name
//! continues.
//!
//! # Examples
//!
//! ```rust
//! use iterative_dns::name::{pack_domain_name, unpack_domain_name};
//! use std::io::Cursor;
//!
//! let mut buffer = Vec::new();
//! pack_domain_name(&mut buffer, "www.example.com").unwrap();
//! assert_eq!(buffer[0], 3);
//!
//! let mut cursor = Cursor::new(&buffer[..]);
//! let name = unpack_domain_name(&mut cursor).unwrap();
//! assert_eq!(name.to_string(), "www.example.com");
//! ```

use std::fmt;
use std::io::Cursor;
use std::str::FromStr;

use crate::dns::{WireError, read_array, read_vec};

/// Longest label permitted on the wire.
pub const MAX_LABEL_LEN: usize = 63;

/// Longest encoded name, counting every length octet and the root label.
pub const MAX_NAME_LEN: usize = 255;

/// Number of compression pointers a single name may follow before it is
/// rejected as a loop.
pub const MAX_POINTER_DEPTH: usize = 16;

const POINTER_MASK: u8 = 0b1100_0000;

/// A domain name as an ordered sequence of raw labels.
///
/// Labels are kept as bytes exactly as they appeared on the wire; no case
/// folding or character interpretation takes place. The root name has no
/// labels.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DomainName {
    labels: Vec<Vec<u8>>,
}

impl DomainName {
    /// The root name (`.`).
    pub fn root() -> Self {
        DomainName { labels: Vec::new() }
    }

    pub fn labels(&self) -> &[Vec<u8>] {
        &self.labels
    }

    pub fn is_root(&self) -> bool {
        self.labels.is_empty()
    }

    /// Length of the uncompressed wire form, including the root label.
    pub fn wire_len(&self) -> usize {
        self.labels.iter().map(|label| label.len() + 1).sum::<usize>() + 1
    }

    /// Appends the uncompressed wire form of the name to `buffer`.
    ///
    /// # Errors
    ///
    /// Returns [`WireError::InvalidName`] if a label is empty or longer than
    /// [`MAX_LABEL_LEN`], or if the whole name exceeds [`MAX_NAME_LEN`].
    pub fn pack(&self, buffer: &mut Vec<u8>) -> Result<(), WireError> {
        self.validate()?;
        for label in &self.labels {
            buffer.push(label.len() as u8);
            buffer.extend_from_slice(label);
        }
        buffer.push(0);
        Ok(())
    }

    fn validate(&self) -> Result<(), WireError> {
        for label in &self.labels {
            if label.is_empty() {
                return Err(WireError::InvalidName(format!(
                    "empty label in '{}'",
                    self
                )));
            }
            if label.len() > MAX_LABEL_LEN {
                return Err(WireError::InvalidName(format!(
                    "label '{}' exceeds maximum length of {} characters",
                    String::from_utf8_lossy(label),
                    MAX_LABEL_LEN
                )));
            }
        }
        if self.wire_len() > MAX_NAME_LEN {
            return Err(WireError::InvalidName(format!(
                "name '{}' exceeds maximum length of {} octets",
                self, MAX_NAME_LEN
            )));
        }
        Ok(())
    }
}

impl FromStr for DomainName {
    type Err = WireError;

    /// Splits a dotted ASCII name into labels.
    ///
    /// A single trailing dot is accepted and ignored, and both `""` and `"."`
    /// denote the root.
    ///
    /// ```rust
    /// use iterative_dns::name::DomainName;
    ///
    /// let name: DomainName = "example.com.".parse().unwrap();
    /// assert_eq!(name.labels().len(), 2);
    /// assert!("".parse::<DomainName>().unwrap().is_root());
    /// assert!("exa mple..com".parse::<DomainName>().is_err());
    /// ```
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if !s.is_ascii() {
            return Err(WireError::InvalidName(format!("'{}' is not ASCII", s)));
        }

        let trimmed = s.strip_suffix('.').unwrap_or(s);
        if trimmed.is_empty() {
            return Ok(DomainName::root());
        }

        let name = DomainName {
            labels: trimmed
                .split('.')
                .map(|label| label.as_bytes().to_vec())
                .collect(),
        };
        name.validate()?;
        Ok(name)
    }
}

impl fmt::Display for DomainName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            return write!(f, ".");
        }
        for (i, label) in self.labels.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            write!(f, "{}", String::from_utf8_lossy(label))?;
        }
        Ok(())
    }
}

/// Encodes a dotted ASCII domain name into `buffer` in uncompressed form.
///
/// `"google.com"` becomes `6 google 3 com 0`.
///
/// # Errors
///
/// Fails if the name is not ASCII, contains an empty label, has a label longer
/// than 63 bytes, or is longer than 255 bytes once encoded.
pub fn pack_domain_name(buffer: &mut Vec<u8>, domain: &str) -> Result<(), WireError> {
    domain.parse::<DomainName>()?.pack(buffer)
}

/// Decodes a possibly compressed name starting at the cursor's position.
///
/// On return the cursor sits immediately after the name as it appears at the
/// starting position: after its zero terminator, or after the two bytes of
/// the compression pointer that ended it. Data reached through a pointer is
/// never counted as consumed.
///
/// # Errors
///
/// - [`WireError::ShortBuffer`] if the buffer ends inside the name.
/// - [`WireError::MalformedName`] if a label uses one of the reserved
///   `01`/`10` length prefixes, if more than [`MAX_POINTER_DEPTH`] pointers
///   are chained, or if the decoded name grows past [`MAX_NAME_LEN`]. Pointer
///   loops are caught by the last two checks.
pub fn unpack_domain_name(cursor: &mut Cursor<&[u8]>) -> Result<DomainName, WireError> {
    let mut labels = Vec::new();
    let mut wire_len = 1;
    unpack_labels(cursor, &mut labels, &mut wire_len, 0)?;
    Ok(DomainName { labels })
}

/// `wire_len` tracks the uncompressed length decoded so far, root label
/// included.
fn unpack_labels(
    cursor: &mut Cursor<&[u8]>,
    labels: &mut Vec<Vec<u8>>,
    wire_len: &mut usize,
    depth: usize,
) -> Result<(), WireError> {
    loop {
        let offset = cursor.position() as usize;
        let [len] = read_array::<1>(cursor)?;

        match len & POINTER_MASK {
            0 if len == 0 => return Ok(()),
            0 => {
                *wire_len += len as usize + 1;
                if *wire_len > MAX_NAME_LEN {
                    return Err(WireError::MalformedName {
                        offset,
                        reason: "name exceeds 255 octets",
                    });
                }
                labels.push(read_vec(cursor, len as usize)?);
            }
            POINTER_MASK => {
                let [low] = read_array::<1>(cursor)?;
                if depth >= MAX_POINTER_DEPTH {
                    return Err(WireError::MalformedName {
                        offset,
                        reason: "too many compression pointers",
                    });
                }
                let target = u16::from_be_bytes([len & !POINTER_MASK, low]);

                // A pointer always ends the name; resume just past it.
                let resume = cursor.position();
                cursor.set_position(u64::from(target));
                let result = unpack_labels(cursor, labels, wire_len, depth + 1);
                cursor.set_position(resume);
                return result;
            }
            _ => {
                return Err(WireError::MalformedName {
                    offset,
                    reason: "reserved label type",
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(name: &str) -> Vec<u8> {
        let mut buffer = Vec::new();
        pack_domain_name(&mut buffer, name).unwrap();
        buffer
    }

    #[test]
    fn test_pack_domain_name() {
        assert_eq!(
            encode("www.google.com"),
            vec![
                3, b'w', b'w', b'w', 6, b'g', b'o', b'o', b'g', b'l', b'e', 3, b'c', b'o', b'm', 0
            ]
        );
    }

    #[test]
    fn test_pack_root_and_trailing_dot() {
        assert_eq!(encode("."), vec![0]);
        assert_eq!(encode(""), vec![0]);
        assert_eq!(encode("com."), encode("com"));
    }

    #[test]
    fn test_pack_rejects_invalid_names() {
        let mut buffer = Vec::new();
        let long_label = "a".repeat(64);
        assert!(matches!(
            pack_domain_name(&mut buffer, &long_label),
            Err(WireError::InvalidName(_))
        ));
        assert!(pack_domain_name(&mut buffer, &"a".repeat(63)).is_ok());
        assert!(pack_domain_name(&mut buffer, "bücher.de").is_err());
        assert!(pack_domain_name(&mut buffer, "a..b").is_err());

        let too_long = vec!["abcdefghi"; 26].join(".");
        assert!(pack_domain_name(&mut buffer, &too_long).is_err());
    }

    #[test]
    fn test_round_trip_without_compression() {
        let long = "x".repeat(63);
        for name in ["a", "example.com", "www.example.com", long.as_str()] {
            let data = encode(name);
            let mut cursor = Cursor::new(&data[..]);
            let decoded = unpack_domain_name(&mut cursor).unwrap();
            assert_eq!(decoded, name.parse::<DomainName>().unwrap());
            assert_eq!(decoded.to_string(), name);
            assert_eq!(cursor.position() as usize, data.len());
        }
    }

    #[test]
    fn test_unpack_root_name() {
        let data = [0u8, 0xff];
        let mut cursor = Cursor::new(&data[..]);
        let name = unpack_domain_name(&mut cursor).unwrap();
        assert!(name.is_root());
        assert_eq!(name.to_string(), ".");
        assert_eq!(cursor.position(), 1);
    }

    #[test]
    fn test_unpack_compressed_domain_name() {
        let mut data = vec![0u8; 12];
        // "www.google.com" at offset 12.
        data.extend_from_slice(&encode("www.google.com"));
        data.extend_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);
        let pointer_at = data.len();
        data.extend_from_slice(&[0xc0, 0x0c]);
        data.push(0x99);

        let mut cursor = Cursor::new(&data[..]);
        cursor.set_position(pointer_at as u64);

        let name = unpack_domain_name(&mut cursor).unwrap();
        assert_eq!(pointer_at, 32);
        assert_eq!(name.to_string(), "www.google.com");
        assert_eq!(cursor.position() as usize, pointer_at + 2);
    }

    #[test]
    fn test_unpack_labels_followed_by_pointer() {
        // f.example.com at offset 0, then "mail" + pointer to "example.com".
        let mut data = encode("f.example.com");
        data.extend_from_slice(&[4, b'm', b'a', b'i', b'l', 0xc0, 0x02, 0x99]);

        let mut cursor = Cursor::new(&data[..]);
        cursor.set_position(15);

        let name = unpack_domain_name(&mut cursor).unwrap();
        assert_eq!(name.to_string(), "mail.example.com");
        assert_eq!(name.labels().len(), 3);
        assert_eq!(cursor.position(), 22);
    }

    #[test]
    fn test_unpack_nested_pointers() {
        // "com" at 0, "example" + ptr(0) at 5, "www" + ptr(5) at 15.
        let mut data = encode("com");
        data.extend_from_slice(&[7, b'e', b'x', b'a', b'm', b'p', b'l', b'e', 0xc0, 0x00]);
        data.extend_from_slice(&[3, b'w', b'w', b'w', 0xc0, 0x05]);

        let mut cursor = Cursor::new(&data[..]);
        cursor.set_position(15);
        let name = unpack_domain_name(&mut cursor).unwrap();
        assert_eq!(name.to_string(), "www.example.com");
        assert_eq!(cursor.position(), 21);
    }

    #[test]
    fn test_unpack_rejects_self_pointer() {
        let data = [0xc0, 0x00];
        let mut cursor = Cursor::new(&data[..]);
        assert!(matches!(
            unpack_domain_name(&mut cursor),
            Err(WireError::MalformedName { .. })
        ));
    }

    #[test]
    fn test_unpack_rejects_pointer_cycle_through_labels() {
        // 1 'a' followed by a pointer back to offset 0: an endless "a.a.a...".
        let data = [1, b'a', 0xc0, 0x00];
        let mut cursor = Cursor::new(&data[..]);
        assert!(matches!(
            unpack_domain_name(&mut cursor),
            Err(WireError::MalformedName { .. })
        ));
    }

    /// A chain of `pointers` compression pointers, each pointing at the one
    /// before it, ending in the name "end". Returns the data and the offset
    /// of the last pointer.
    fn pointer_chain(pointers: usize) -> (Vec<u8>, usize) {
        let mut data = encode("end");
        let mut target = 0usize;
        for _ in 0..pointers {
            let at = data.len();
            data.extend_from_slice(&[0xc0 | (target >> 8) as u8, target as u8]);
            target = at;
        }
        (data, target)
    }

    #[test]
    fn test_unpack_pointer_depth_limit() {
        let (data, start) = pointer_chain(MAX_POINTER_DEPTH);
        let mut cursor = Cursor::new(&data[..]);
        cursor.set_position(start as u64);
        let name = unpack_domain_name(&mut cursor).unwrap();
        assert_eq!(name.to_string(), "end");
        assert_eq!(cursor.position() as usize, start + 2);

        let (data, start) = pointer_chain(MAX_POINTER_DEPTH + 1);
        let mut cursor = Cursor::new(&data[..]);
        cursor.set_position(start as u64);
        assert!(matches!(
            unpack_domain_name(&mut cursor),
            Err(WireError::MalformedName {
                reason: "too many compression pointers",
                ..
            })
        ));
    }

    #[test]
    fn test_unpack_rejects_name_over_255_octets() {
        // Four 63-byte labels fill 256 octets with the root label.
        let mut data = Vec::new();
        for _ in 0..4 {
            data.push(63);
            data.extend_from_slice(&[b'x'; 63]);
        }
        data.push(0);

        let mut cursor = Cursor::new(&data[..]);
        assert!(matches!(
            unpack_domain_name(&mut cursor),
            Err(WireError::MalformedName {
                offset: 192,
                reason: "name exceeds 255 octets",
            })
        ));

        // Three such labels plus a 61-byte one is exactly 255.
        let mut data = Vec::new();
        for len in [63u8, 63, 63, 61] {
            data.push(len);
            data.extend(std::iter::repeat_n(b'x', len as usize));
        }
        data.push(0);
        let mut cursor = Cursor::new(&data[..]);
        let name = unpack_domain_name(&mut cursor).unwrap();
        assert_eq!(name.wire_len(), MAX_NAME_LEN);
    }

    #[test]
    fn test_unpack_rejects_reserved_label_type() {
        let data = [0x40, b'a', 0];
        let mut cursor = Cursor::new(&data[..]);
        assert!(matches!(
            unpack_domain_name(&mut cursor),
            Err(WireError::MalformedName { offset: 0, .. })
        ));
    }

    #[test]
    fn test_unpack_truncated_name() {
        let data = [5, b'a', b'b'];
        let mut cursor = Cursor::new(&data[..]);
        assert!(matches!(
            unpack_domain_name(&mut cursor),
            Err(WireError::ShortBuffer { offset: 1, needed: 5 })
        ));

        let data = [3, b'c', b'o', b'm'];
        let mut cursor = Cursor::new(&data[..]);
        assert!(matches!(
            unpack_domain_name(&mut cursor),
            Err(WireError::ShortBuffer { offset: 4, .. })
        ));
    }
}
