//! ISO 8211 record decoding and encoding.
//!
//! ENC cells (`.000` files) are a sequence of ISO 8211 logical records. Each
//! record has three parts:
//!
//! ```text
//! +-----------------+----------------------------+------------------------+
//! | leader (24 B)   | directory                  | field area             |
//! |                 | tag|len|pos ... 0x1E       | field 0x1E ... 0x1D    |
//! +-----------------+----------------------------+------------------------+
//! ^ record start    ^ 24                         ^ base address
//! ```
//!
//! - The leader holds the record length (bytes 0-4), the leader identifier
//!   (byte 6, `L` for the definition record, `D` for data records), the base
//!   address of the field area (bytes 8-12) and the widths of the directory
//!   subfields (bytes 16, 17, 19).
//! - Every directory entry names a field by tag, with its length and its
//!   position relative to the base address.
//! - Every field ends with 0x1E; the record ends with 0x1D.
//!
//! [`RecordReader`] never gives up on a stream: a corrupt record is reported
//! as a [`DecodeError`](crate::error::DecodeError) and decoding resumes after
//! it.

mod leader;
mod reader;
mod writer;

pub use leader::{Leader, RecordKind};
pub use reader::{decode_all, DecodedRecords, DirectoryEntry, Field, Record, RecordReader};
pub use writer::RecordBuilder;

/// Size of the fixed record leader.
pub const LEADER_LEN: usize = 24;

/// Smallest possible record: a leader, an empty directory and the record terminator.
pub const MIN_RECORD_LEN: usize = LEADER_LEN + 2;

/// Width of the tag subfield written by [`RecordBuilder`].
pub const TAG_SIZE: usize = 4;

/// Terminates the directory and every field.
pub const FIELD_TERMINATOR: u8 = 0x1E;

/// Terminates a record.
pub const RECORD_TERMINATOR: u8 = 0x1D;

/// Separates subfields inside a field.
pub const UNIT_SEPARATOR: u8 = 0x1F;
