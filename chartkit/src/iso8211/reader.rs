//! Record decoding with corruption recovery.

use crate::error::DecodeError;

use super::leader::{is_plausible_leader, parse_decimal, Leader, RecordKind};
use super::{FIELD_TERMINATOR, LEADER_LEN, MIN_RECORD_LEN, RECORD_TERMINATOR};

/// One entry of a record directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    /// Field tag, e.g. `FRID`.
    pub tag: String,
    /// Field length in bytes, field terminator included.
    pub length: usize,
    /// Field offset from the start of the field area.
    pub position: usize,
}

/// A field of a decoded record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field<'a> {
    /// Field tag.
    pub tag: &'a str,
    /// Field payload without its terminator.
    pub data: &'a [u8],
}

/// A decoded ISO 8211 logical record borrowing from the input buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record<'a> {
    /// Byte offset of the record in the input buffer.
    pub offset: usize,
    /// Parsed leader.
    pub leader: Leader,
    /// Directory entries in field order.
    pub directory: Vec<DirectoryEntry>,
    /// Field area, from the base address up to (not including) the record terminator.
    pub field_area: &'a [u8],
}

impl<'a> Record<'a> {
    /// Total record length, terminator included.
    pub fn length(&self) -> usize {
        self.leader.record_length
    }

    /// Definition or data record.
    pub fn kind(&self) -> RecordKind {
        self.leader.kind
    }

    /// Offset of the field area relative to the record start.
    pub fn base_address(&self) -> usize {
        self.leader.base_address
    }

    /// Whether this is the data descriptive record.
    pub fn is_definition(&self) -> bool {
        self.leader.kind == RecordKind::Definition
    }

    /// Iterate over the fields in directory order.
    pub fn fields(&self) -> impl Iterator<Item = Field<'_>> {
        let area = self.field_area;
        self.directory.iter().map(move |entry| Field {
            tag: entry.tag.as_str(),
            data: &area[entry.position..entry.position + entry.length - 1],
        })
    }

    /// Payload of the first field with the given tag.
    pub fn field(&self, tag: &str) -> Option<&'a [u8]> {
        self.directory
            .iter()
            .find(|entry| entry.tag == tag)
            .map(|entry| &self.field_area[entry.position..entry.position + entry.length - 1])
    }
}

/// Lazy, restartable decoder over a byte buffer.
///
/// Yields one item per record. Malformed records come out as
/// [`DecodeError`]s and decoding carries on after them: at the declared
/// record end when the length is usable, otherwise at the next byte that
/// looks like a leader.
///
/// # Example
///
/// ```ignore
/// use chartkit::iso8211::RecordReader;
///
/// let data = std::fs::read("US5MA10M.000")?;
/// for item in RecordReader::new(&data) {
///     match item {
///         Ok(record) => println!("{} fields", record.directory.len()),
///         Err(e) => eprintln!("skipped: {e}"),
///     }
/// }
/// ```
#[derive(Debug, Clone)]
pub struct RecordReader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> RecordReader<'a> {
    /// Create a reader positioned at the start of `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    /// Restart decoding from the beginning of the buffer.
    pub fn rewind(&mut self) {
        self.offset = 0;
    }

    /// Current byte offset of the reader.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Find the first plausible leader at or after `from`.
    fn resync(&self, from: usize) -> usize {
        let end = self.data.len();
        (from..end.saturating_sub(LEADER_LEN - 1))
            .find(|&pos| is_plausible_leader(&self.data[pos..], end - pos))
            .unwrap_or(end)
    }

    fn fail(&mut self, error: DecodeError, next: usize) -> Option<Result<Record<'a>, DecodeError>> {
        tracing::warn!(
            offset = error.offset(),
            resume_at = next,
            error = %error,
            "Skipping malformed ISO 8211 record"
        );
        self.offset = next;
        Some(Err(error))
    }
}

impl<'a> Iterator for RecordReader<'a> {
    type Item = Result<Record<'a>, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        let data = self.data;
        let offset = self.offset;
        let remaining = data.get(offset..).filter(|r| !r.is_empty())?;

        if remaining.len() < LEADER_LEN {
            let len = remaining.len();
            return self.fail(DecodeError::TrailingBytes { offset, len }, data.len());
        }

        // A length that cannot be trusted gives no record end to skip to.
        let length = match parse_decimal(&remaining[0..5]) {
            Some(length) if length >= MIN_RECORD_LEN => length,
            _ => {
                let raw = String::from_utf8_lossy(&remaining[0..5]).into_owned();
                let next = self.resync(offset + 1);
                return self.fail(DecodeError::InvalidLength { offset, raw }, next);
            }
        };

        if length > remaining.len() {
            let error = DecodeError::Truncated {
                offset,
                declared: length,
                available: remaining.len(),
            };
            let next = self.resync(offset + 1);
            return self.fail(error, next);
        }

        let next = offset + length;
        match decode_record(offset, &remaining[..length]) {
            Ok(record) => {
                self.offset = next;
                Some(Ok(record))
            }
            Err(error) => self.fail(error, next),
        }
    }
}

/// Decode one record whose bytes (exactly `length` of them) are known.
fn decode_record(offset: usize, bytes: &[u8]) -> Result<Record<'_>, DecodeError> {
    let leader = Leader::parse(offset, bytes)?;
    let base = leader.base_address;

    if bytes[bytes.len() - 1] != RECORD_TERMINATOR {
        return Err(DecodeError::MissingTerminator { offset });
    }

    let directory = parse_directory(offset, &leader, &bytes[LEADER_LEN..base])?;
    let field_area = &bytes[base..bytes.len() - 1];

    let expected: usize = directory.iter().map(|entry| entry.length).sum();
    if expected != field_area.len() {
        return Err(DecodeError::FieldAreaMismatch {
            offset,
            expected,
            actual: field_area.len(),
        });
    }

    for entry in &directory {
        let end = entry.position + entry.length;
        if entry.length == 0 || end > field_area.len() {
            return Err(DecodeError::InvalidDirectory {
                offset,
                reason: format!("field {} lies outside the field area", entry.tag),
            });
        }
        if field_area[end - 1] != FIELD_TERMINATOR {
            return Err(DecodeError::InvalidDirectory {
                offset,
                reason: format!("field {} is not terminated", entry.tag),
            });
        }
    }

    Ok(Record {
        offset,
        leader,
        directory,
        field_area,
    })
}

fn parse_directory(
    offset: usize,
    leader: &Leader,
    bytes: &[u8],
) -> Result<Vec<DirectoryEntry>, DecodeError> {
    let invalid = |reason: String| DecodeError::InvalidDirectory { offset, reason };

    let Some((&FIELD_TERMINATOR, entries)) = bytes.split_last() else {
        return Err(invalid("directory is not terminated".to_string()));
    };

    let entry_size = leader.tag_size + leader.length_size + leader.position_size;
    if entries.len() % entry_size != 0 {
        return Err(invalid(format!(
            "{} directory bytes is not a multiple of entry size {}",
            entries.len(),
            entry_size
        )));
    }

    entries
        .chunks_exact(entry_size)
        .map(|chunk| {
            let (tag, rest) = chunk.split_at(leader.tag_size);
            let (length, position) = rest.split_at(leader.length_size);
            if !tag.iter().all(u8::is_ascii_graphic) {
                return Err(invalid(format!("non-ASCII tag {:?}", tag)));
            }
            let tag = String::from_utf8_lossy(tag).into_owned();
            let length = parse_decimal(length)
                .ok_or_else(|| invalid(format!("field {} has a non-numeric length", tag)))?;
            let position = parse_decimal(position)
                .ok_or_else(|| invalid(format!("field {} has a non-numeric position", tag)))?;
            Ok(DirectoryEntry {
                tag,
                length,
                position,
            })
        })
        .collect()
}

/// Records and errors from decoding a whole buffer.
#[derive(Debug, Default)]
pub struct DecodedRecords<'a> {
    /// Well-formed records in stream order.
    pub records: Vec<Record<'a>>,
    /// One error per malformed record or unreadable region.
    pub errors: Vec<DecodeError>,
}

/// Decode every record in `data`, collecting errors instead of stopping.
pub fn decode_all(data: &[u8]) -> DecodedRecords<'_> {
    let mut decoded = DecodedRecords::default();
    for item in RecordReader::new(data) {
        match item {
            Ok(record) => decoded.records.push(record),
            Err(error) => decoded.errors.push(error),
        }
    }
    decoded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iso8211::RecordBuilder;

    fn data_record(id: u32) -> Vec<u8> {
        RecordBuilder::data()
            .field(b"0001", id.to_string())
            .field(b"FRID", "SOUNDG")
            .build()
            .unwrap()
    }

    fn chart(records: &[Vec<u8>]) -> Vec<u8> {
        records.concat()
    }

    #[test]
    fn test_decode_single_record() {
        let bytes = data_record(7);
        let decoded = decode_all(&bytes);
        assert!(decoded.errors.is_empty());
        assert_eq!(decoded.records.len(), 1);

        let record = &decoded.records[0];
        assert_eq!(record.length(), bytes.len());
        assert_eq!(record.kind(), RecordKind::Data);
        assert!(record.base_address() >= LEADER_LEN);
        assert_eq!(record.field("0001"), Some(&b"7"[..]));
        assert_eq!(record.field("FRID"), Some(&b"SOUNDG"[..]));
        assert_eq!(record.field("SG2D"), None);

        let tags: Vec<_> = record.fields().map(|f| f.tag).collect();
        assert_eq!(tags, vec!["0001", "FRID"]);
    }

    #[test]
    fn test_length_invariant() {
        let bytes = data_record(1);
        let record = RecordReader::new(&bytes).next().unwrap().unwrap();
        let fields: usize = record.directory.iter().map(|e| e.length).sum();
        assert_eq!(record.base_address() + fields + 1, record.length());
    }

    #[test]
    fn test_bad_base_address_is_isolated() {
        let mut corrupt = data_record(2);
        corrupt[8..13].copy_from_slice(b"00010");

        let bytes = chart(&[data_record(1), corrupt, data_record(3), data_record(4)]);
        let decoded = decode_all(&bytes);

        assert_eq!(decoded.records.len(), 3);
        assert_eq!(decoded.errors.len(), 1);
        assert!(matches!(
            decoded.errors[0],
            DecodeError::InvalidBaseAddress { .. }
        ));
        let ids: Vec<_> = decoded
            .records
            .iter()
            .map(|r| r.field("0001").unwrap())
            .collect();
        assert_eq!(ids, vec![&b"1"[..], b"3", b"4"]);
    }

    #[test]
    fn test_non_numeric_length_rescans() {
        let mut corrupt = data_record(2);
        corrupt[0..5].copy_from_slice(b"0x0!2");

        let bytes = chart(&[data_record(1), corrupt, data_record(3)]);
        let decoded = decode_all(&bytes);

        assert_eq!(decoded.records.len(), 2);
        assert_eq!(decoded.errors.len(), 1);
        assert!(matches!(decoded.errors[0], DecodeError::InvalidLength { .. }));
        assert_eq!(decoded.records[1].field("0001"), Some(&b"3"[..]));
    }

    #[test]
    fn test_zero_length_rescans() {
        let mut corrupt = data_record(2);
        corrupt[0..5].copy_from_slice(b"00000");

        let bytes = chart(&[corrupt, data_record(3)]);
        let decoded = decode_all(&bytes);
        assert_eq!(decoded.records.len(), 1);
        assert_eq!(decoded.errors.len(), 1);
    }

    #[test]
    fn test_truncated_tail() {
        let full = chart(&[data_record(1), data_record(2)]);
        let cut = &full[..full.len() - 5];
        let decoded = decode_all(cut);
        assert_eq!(decoded.records.len(), 1);
        assert_eq!(decoded.errors.len(), 1);
        assert!(matches!(decoded.errors[0], DecodeError::Truncated { .. }));
    }

    #[test]
    fn test_trailing_garbage() {
        let mut bytes = data_record(1);
        bytes.extend_from_slice(b"\n\n");
        let decoded = decode_all(&bytes);
        assert_eq!(decoded.records.len(), 1);
        assert!(matches!(
            decoded.errors.as_slice(),
            [DecodeError::TrailingBytes { len: 2, .. }]
        ));
    }

    #[test]
    fn test_missing_terminator() {
        let mut corrupt = data_record(1);
        let last = corrupt.len() - 1;
        corrupt[last] = b'X';
        let bytes = chart(&[corrupt, data_record(2)]);
        let decoded = decode_all(&bytes);
        assert_eq!(decoded.records.len(), 1);
        assert!(matches!(
            decoded.errors[0],
            DecodeError::MissingTerminator { offset: 0 }
        ));
    }

    #[test]
    fn test_reader_is_restartable() {
        let bytes = chart(&[data_record(1), data_record(2)]);
        let mut reader = RecordReader::new(&bytes);
        assert_eq!(reader.by_ref().count(), 2);
        assert!(reader.next().is_none());
        reader.rewind();
        assert_eq!(reader.offset(), 0);
        assert_eq!(reader.count(), 2);
    }

    #[test]
    fn test_empty_input() {
        let decoded = decode_all(&[]);
        assert!(decoded.records.is_empty());
        assert!(decoded.errors.is_empty());
    }
}
