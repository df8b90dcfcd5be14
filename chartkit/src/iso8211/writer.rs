//! Record encoding.

use crate::error::EncodeError;

use super::leader::{Leader, RecordKind};
use super::{FIELD_TERMINATOR, LEADER_LEN, RECORD_TERMINATOR, TAG_SIZE};

/// Largest value a five-digit leader number can hold.
const MAX_LEADER_NUMBER: usize = 99_999;

/// Builds a single ISO 8211 record.
///
/// Field payloads are given without terminators; the builder appends them,
/// sizes the directory subfields to the largest length and position, and
/// writes the leader.
///
/// # Example
///
/// ```ignore
/// use chartkit::iso8211::RecordBuilder;
///
/// let bytes = RecordBuilder::data()
///     .field(b"0001", "42")
///     .field(b"FRID", "BCNCAR")
///     .build()?;
/// ```
#[derive(Debug, Clone)]
pub struct RecordBuilder {
    kind: RecordKind,
    interchange_level: u8,
    field_control_length: u8,
    fields: Vec<([u8; TAG_SIZE], Vec<u8>)>,
}

impl RecordBuilder {
    /// Start a data descriptive record (`L`).
    pub fn definition() -> Self {
        Self {
            kind: RecordKind::Definition,
            interchange_level: b'3',
            field_control_length: b'6',
            fields: Vec::new(),
        }
    }

    /// Start a data record (`D`).
    pub fn data() -> Self {
        Self {
            kind: RecordKind::Data,
            interchange_level: b' ',
            field_control_length: b' ',
            fields: Vec::new(),
        }
    }

    /// Append a field.
    pub fn field(mut self, tag: &[u8; TAG_SIZE], payload: impl AsRef<[u8]>) -> Self {
        self.push_field(tag, payload);
        self
    }

    /// Append a field in place.
    pub fn push_field(&mut self, tag: &[u8; TAG_SIZE], payload: impl AsRef<[u8]>) {
        let mut data = payload.as_ref().to_vec();
        data.push(FIELD_TERMINATOR);
        self.fields.push((*tag, data));
    }

    /// Encode the record.
    pub fn build(&self) -> Result<Vec<u8>, EncodeError> {
        if let Some((tag, _)) = self
            .fields
            .iter()
            .find(|(tag, _)| !tag.iter().all(u8::is_ascii_graphic))
        {
            return Err(EncodeError::InvalidTag {
                tag: String::from_utf8_lossy(tag).into_owned(),
            });
        }

        let mut positions = Vec::with_capacity(self.fields.len());
        let mut field_total = 0usize;
        for (_, data) in &self.fields {
            positions.push(field_total);
            field_total += data.len();
        }

        let max_length = self.fields.iter().map(|(_, d)| d.len()).max().unwrap_or(0);
        let max_position = positions.last().copied().unwrap_or(0);
        let length_size = digits(max_length);
        let position_size = digits(max_position);

        let entry_size = TAG_SIZE + length_size + position_size;
        let base_address = LEADER_LEN + self.fields.len() * entry_size + 1;
        let record_length = base_address + field_total + 1;
        if record_length > MAX_LEADER_NUMBER || length_size > 9 || position_size > 9 {
            return Err(EncodeError::RecordTooLarge { len: record_length });
        }

        let leader = Leader {
            record_length,
            interchange_level: self.interchange_level,
            kind: self.kind,
            field_control_length: self.field_control_length,
            base_address,
            length_size,
            position_size,
            tag_size: TAG_SIZE,
        };

        let mut out = Vec::with_capacity(record_length);
        out.extend_from_slice(&leader.to_bytes());
        for ((tag, data), position) in self.fields.iter().zip(&positions) {
            out.extend_from_slice(tag);
            out.extend_from_slice(format!("{:0w$}", data.len(), w = length_size).as_bytes());
            out.extend_from_slice(format!("{:0w$}", position, w = position_size).as_bytes());
        }
        out.push(FIELD_TERMINATOR);
        for (_, data) in &self.fields {
            out.extend_from_slice(data);
        }
        out.push(RECORD_TERMINATOR);

        debug_assert_eq!(out.len(), record_length);
        Ok(out)
    }
}

/// Number of decimal digits needed to write `n` (at least one).
fn digits(n: usize) -> usize {
    n.checked_ilog10().map_or(1, |d| d as usize + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iso8211::RecordReader;

    #[test]
    fn test_digits() {
        assert_eq!(digits(0), 1);
        assert_eq!(digits(9), 1);
        assert_eq!(digits(10), 2);
        assert_eq!(digits(12345), 5);
    }

    #[test]
    fn test_built_record_decodes() {
        let bytes = RecordBuilder::definition()
            .field(b"0000", "0100;&")
            .field(b"FRID", "1600;&FEATURE RECORD IDENTIFIER")
            .build()
            .unwrap();

        let record = RecordReader::new(&bytes).next().unwrap().unwrap();
        assert!(record.is_definition());
        assert_eq!(record.field("0000"), Some(&b"0100;&"[..]));
        assert_eq!(bytes.last(), Some(&RECORD_TERMINATOR));
    }

    #[test]
    fn test_binary_payload_survives() {
        let payload: Vec<u8> = (0u8..=255).collect();
        let bytes = RecordBuilder::data()
            .field(b"SG2D", &payload)
            .build()
            .unwrap();
        let record = RecordReader::new(&bytes).next().unwrap().unwrap();
        assert_eq!(record.field("SG2D"), Some(payload.as_slice()));
    }

    #[test]
    fn test_empty_record() {
        let bytes = RecordBuilder::data().build().unwrap();
        let record = RecordReader::new(&bytes).next().unwrap().unwrap();
        assert!(record.directory.is_empty());
        assert_eq!(record.length(), LEADER_LEN + 2);
    }

    #[test]
    fn test_oversized_record_is_rejected() {
        let bytes = RecordBuilder::data()
            .field(b"SG2D", vec![0u8; 100_000])
            .build();
        assert!(matches!(bytes, Err(EncodeError::RecordTooLarge { .. })));
    }

    #[test]
    fn test_invalid_tag_is_rejected() {
        let bytes = RecordBuilder::data().field(b"FR D", "x").build();
        assert!(matches!(bytes, Err(EncodeError::InvalidTag { .. })));
    }
}
