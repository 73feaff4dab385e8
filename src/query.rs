//! Construction of outgoing queries.
//!
//! The transaction id is drawn from a caller-supplied random number
//! generator. Real lookups should pass a cryptographically secure source such
//! as [`rand::rngs::OsRng`], since a guessable id makes response spoofing
//! easy; tests can pass a deterministic generator instead.

use rand::RngCore;
use tracing::trace;

use crate::dns::{CLASS_IN, DnsHeader, DnsMessage, DnsQuestion, RecordType, WireError};

/// Builds a single-question query for `domain` and serializes it.
///
/// The message carries one question of class IN and no records. The
/// Recursion Desired flag is set only when `recursion_desired` is true;
/// iterative resolution leaves it clear.
///
/// # Errors
///
/// Returns [`WireError::InvalidName`] if `domain` cannot be encoded.
///
/// # Examples
///
/// ```rust
/// use iterative_dns::dns::RecordType;
/// use iterative_dns::query::build_query;
/// use rand::rngs::OsRng;
///
/// let query = build_query("www.example.com", RecordType::A, true, &mut OsRng).unwrap();
/// assert_eq!(&query[2..4], &[0x01, 0x00]);
/// ```
pub fn build_query<R: RngCore + ?Sized>(
    domain: &str,
    record_type: RecordType,
    recursion_desired: bool,
    rng: &mut R,
) -> Result<Vec<u8>, WireError> {
    let mut message = DnsMessage::new();
    message.header = DnsHeader {
        id: rng.next_u32() as u16,
        question_count: 1,
        ..DnsHeader::new()
    };
    message.header.set_recursion_desired(recursion_desired);
    message.questions.push(DnsQuestion {
        name: domain.parse()?,
        qtype: record_type,
        qclass: CLASS_IN,
    });

    let mut buffer = Vec::with_capacity(512);
    message.pack(&mut buffer)?;
    trace!(id = message.header.id, %domain, %record_type, "built query");
    Ok(buffer)
}

/// Reads back the transaction id of a serialized message.
pub(crate) fn message_id(message: &[u8]) -> Option<u16> {
    match message {
        [high, low, ..] => Some(u16::from_be_bytes([*high, *low])),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use rand::rngs::mock::StepRng;

    fn hex(bytes: &[u8]) -> String {
        bytes.iter().map(|b| format!("{:02x}", b)).collect()
    }

    #[test]
    fn test_build_query_exact_bytes() {
        let mut rng = StdRng::seed_from_u64(2023);
        let query = build_query("www.example.com", RecordType::A, true, &mut rng).unwrap();
        assert_eq!(
            hex(&query[2..]),
            "0100000100000000000003777777076578616d706c6503636f6d0000010001"
        );
    }

    #[test]
    fn test_build_query_uses_injected_id() {
        let mut rng = StepRng::new(0xBEEF, 1);
        let first = build_query("example.com", RecordType::NS, false, &mut rng).unwrap();
        let second = build_query("example.com", RecordType::NS, false, &mut rng).unwrap();
        assert_eq!(message_id(&first), Some(0xBEEF));
        assert_eq!(message_id(&second), Some(0xBEF0));
    }

    #[test]
    fn test_build_query_without_recursion() {
        let mut rng = StepRng::new(0, 0);
        let query = build_query("example.com", RecordType::NS, false, &mut rng).unwrap();

        let message = DnsMessage::from_bytes(&query).unwrap();
        assert!(!message.header.recursion_desired());
        assert_eq!(message.header.flags, 0);
        assert_eq!(message.header.question_count, 1);
        assert_eq!(message.header.answer_count, 0);
        assert_eq!(message.questions[0].qtype, RecordType::NS);
        assert_eq!(message.questions[0].qclass, CLASS_IN);
        assert_eq!(message.questions[0].name.to_string(), "example.com");
    }

    #[test]
    fn test_build_query_rejects_bad_name() {
        let mut rng = StepRng::new(0, 0);
        let long_label = "a".repeat(64);
        assert!(matches!(
            build_query(&long_label, RecordType::A, false, &mut rng),
            Err(WireError::InvalidName(_))
        ));
    }

    #[test]
    fn test_message_id() {
        assert_eq!(message_id(&[0x12, 0x34, 0x01]), Some(0x1234));
        assert_eq!(message_id(&[0x12]), None);
    }
}
