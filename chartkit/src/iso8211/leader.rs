//! The fixed 24-byte record leader.

use crate::error::DecodeError;

use super::LEADER_LEN;

/// Whether a record is the data descriptive record or a data record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    /// Leader identifier `L`: directory/definition record (DDR).
    Definition,
    /// Leader identifier `D`: data record.
    Data,
}

impl RecordKind {
    /// Parse the leader identifier byte.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            b'L' => Some(RecordKind::Definition),
            b'D' => Some(RecordKind::Data),
            _ => None,
        }
    }

    /// The leader identifier byte for this kind.
    pub fn as_byte(self) -> u8 {
        match self {
            RecordKind::Definition => b'L',
            RecordKind::Data => b'D',
        }
    }
}

/// Parsed record leader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Leader {
    /// Total record length in bytes, terminator included.
    pub record_length: usize,
    /// Interchange level byte, kept raw.
    pub interchange_level: u8,
    /// Definition or data record.
    pub kind: RecordKind,
    /// Field control length byte, kept raw.
    pub field_control_length: u8,
    /// Offset of the field area from the start of the record.
    pub base_address: usize,
    /// Width of the length subfield of each directory entry.
    pub length_size: usize,
    /// Width of the position subfield of each directory entry.
    pub position_size: usize,
    /// Width of the tag subfield of each directory entry.
    pub tag_size: usize,
}

impl Leader {
    /// Parse the leader of the record starting at `offset`.
    ///
    /// `bytes` is the whole record; its length has already been validated
    /// against the declared record length.
    pub fn parse(offset: usize, bytes: &[u8]) -> Result<Self, DecodeError> {
        debug_assert!(bytes.len() >= LEADER_LEN);

        let record_length =
            parse_decimal(&bytes[0..5]).ok_or_else(|| DecodeError::InvalidLength {
                offset,
                raw: String::from_utf8_lossy(&bytes[0..5]).into_owned(),
            })?;

        let kind = RecordKind::from_byte(bytes[6]).ok_or_else(|| DecodeError::InvalidLeader {
            offset,
            reason: format!("unknown leader identifier {:?}", bytes[6] as char),
        })?;

        let raw_base = &bytes[8..13];
        let base_address = parse_decimal(raw_base)
            .filter(|&base| base >= LEADER_LEN && base < record_length)
            .ok_or_else(|| DecodeError::InvalidBaseAddress {
                offset,
                base_address: String::from_utf8_lossy(raw_base).into_owned(),
            })?;

        let size = |index: usize, name: &str| -> Result<usize, DecodeError> {
            match bytes[index] {
                b @ b'1'..=b'9' => Ok((b - b'0') as usize),
                b => Err(DecodeError::InvalidLeader {
                    offset,
                    reason: format!("{} size {:?} is not a digit 1-9", name, b as char),
                }),
            }
        };

        Ok(Self {
            record_length,
            interchange_level: bytes[5],
            kind,
            field_control_length: bytes[7],
            base_address,
            length_size: size(16, "field length")?,
            position_size: size(17, "field position")?,
            tag_size: size(19, "field tag")?,
        })
    }

    /// Serialize the leader into its 24-byte form.
    pub fn to_bytes(&self) -> [u8; LEADER_LEN] {
        let mut out = [b' '; LEADER_LEN];
        out[0..5].copy_from_slice(format!("{:05}", self.record_length).as_bytes());
        out[5] = self.interchange_level;
        out[6] = self.kind.as_byte();
        out[7] = self.field_control_length;
        out[8..13].copy_from_slice(format!("{:05}", self.base_address).as_bytes());
        out[13..16].copy_from_slice(b" ! ");
        out[16] = b'0' + self.length_size as u8;
        out[17] = b'0' + self.position_size as u8;
        out[18] = b'0';
        out[19] = b'0' + self.tag_size as u8;
        out
    }
}

/// Parse an all-digit ASCII slice as an unsigned decimal number.
pub(crate) fn parse_decimal(bytes: &[u8]) -> Option<usize> {
    if bytes.is_empty() || !bytes.iter().all(u8::is_ascii_digit) {
        return None;
    }
    bytes
        .iter()
        .try_fold(0usize, |acc, &b| acc.checked_mul(10)?.checked_add((b - b'0') as usize))
}

/// Cheap structural test used when rescanning for the next record after an
/// unusable length. Checks only leader bytes, never the directory.
pub(crate) fn is_plausible_leader(bytes: &[u8], available: usize) -> bool {
    if bytes.len() < LEADER_LEN {
        return false;
    }
    let Some(length) = parse_decimal(&bytes[0..5]) else {
        return false;
    };
    length >= super::MIN_RECORD_LEN
        && length <= available
        && RecordKind::from_byte(bytes[6]).is_some()
        && parse_decimal(&bytes[8..13]).is_some_and(|base| base >= LEADER_LEN && base < length)
        && [bytes[16], bytes[17], bytes[19]]
            .iter()
            .all(|b| (b'1'..=b'9').contains(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_leader() -> Leader {
        Leader {
            record_length: 120,
            interchange_level: b' ',
            kind: RecordKind::Data,
            field_control_length: b' ',
            base_address: 43,
            length_size: 2,
            position_size: 2,
            tag_size: 4,
        }
    }

    #[test]
    fn test_leader_layout() {
        let bytes = sample_leader().to_bytes();
        assert_eq!(&bytes[0..5], b"00120");
        assert_eq!(bytes[6], b'D');
        assert_eq!(&bytes[8..13], b"00043");
        assert_eq!(bytes[16], b'2');
        assert_eq!(bytes[17], b'2');
        assert_eq!(bytes[19], b'4');
    }

    #[test]
    fn test_leader_parse_roundtrip() {
        let leader = sample_leader();
        let mut record = leader.to_bytes().to_vec();
        record.resize(120, 0);
        assert_eq!(Leader::parse(0, &record).unwrap(), leader);
    }

    #[test]
    fn test_base_address_below_leader_is_rejected() {
        let mut leader = sample_leader();
        leader.base_address = 12;
        let mut record = leader.to_bytes().to_vec();
        record.resize(120, 0);
        let err = Leader::parse(7, &record).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidBaseAddress { offset: 7, .. }));
    }

    #[test]
    fn test_unknown_leader_identifier() {
        let mut record = sample_leader().to_bytes().to_vec();
        record[6] = b'X';
        record.resize(120, 0);
        assert!(matches!(
            Leader::parse(0, &record),
            Err(DecodeError::InvalidLeader { .. })
        ));
    }

    #[test]
    fn test_parse_decimal() {
        assert_eq!(parse_decimal(b"00042"), Some(42));
        assert_eq!(parse_decimal(b"0004a"), None);
        assert_eq!(parse_decimal(b" 0042"), None);
        assert_eq!(parse_decimal(b""), None);
    }

    #[test]
    fn test_plausible_leader() {
        let bytes = sample_leader().to_bytes();
        assert!(is_plausible_leader(&bytes, 120));
        // Declared length larger than what is left in the buffer.
        assert!(!is_plausible_leader(&bytes, 119));
        assert!(!is_plausible_leader(&bytes[1..], 120));
    }
}
