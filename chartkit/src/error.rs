//! Error types for the chartkit library.
//!
//! Errors are layered the same way the data flows: [`DecodeError`] for a
//! single corrupt ISO 8211 record, [`FeatureError`] for a record that cannot
//! become a feature, [`ParseError`] for a failed parse step, and
//! [`ChartLoadError`] for the terminal outcome of a chart load.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by library I/O and configuration.
#[derive(Error, Debug)]
pub enum ChartError {
    /// IO error when reading files.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The chart id contains characters that cannot name a cell file.
    #[error("Invalid chart id: {chart_id:?}")]
    InvalidChartId { chart_id: String },

    /// The cell file was not found.
    #[error("ENC cell file not found: {path}")]
    FileNotFound { path: PathBuf },

    /// A zip archive could not be read.
    #[error("Archive error in {path}: {reason}")]
    Archive { path: PathBuf, reason: String },

    /// A required configuration value is missing or unusable.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias using [`ChartError`].
pub type Result<T> = std::result::Result<T, ChartError>;

/// A single malformed or truncated ISO 8211 record.
///
/// The decoder reports these and keeps going; they never abort a stream.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The 5-byte record length is not a decimal number, or is too small.
    #[error("record at offset {offset}: unusable record length {raw:?}")]
    InvalidLength { offset: usize, raw: String },

    /// The declared length runs past the end of the buffer.
    #[error("record at offset {offset}: declared length {declared} exceeds remaining {available} bytes")]
    Truncated {
        offset: usize,
        declared: usize,
        available: usize,
    },

    /// The base address is non-numeric, below the leader size, or past the record end.
    #[error("record at offset {offset}: invalid base address {base_address:?}")]
    InvalidBaseAddress { offset: usize, base_address: String },

    /// A leader byte that must hold a known value does not.
    #[error("record at offset {offset}: invalid leader ({reason})")]
    InvalidLeader { offset: usize, reason: String },

    /// The directory could not be parsed.
    #[error("record at offset {offset}: invalid directory ({reason})")]
    InvalidDirectory { offset: usize, reason: String },

    /// Field lengths and base address do not add up to the record length.
    #[error("record at offset {offset}: field area of {actual} bytes does not match directory total {expected}")]
    FieldAreaMismatch {
        offset: usize,
        expected: usize,
        actual: usize,
    },

    /// The record does not end with the record terminator.
    #[error("record at offset {offset}: missing record terminator")]
    MissingTerminator { offset: usize },

    /// Trailing bytes too short to hold a leader.
    #[error("trailing {len} bytes at offset {offset} are too short for a record leader")]
    TrailingBytes { offset: usize, len: usize },
}

impl DecodeError {
    /// Byte offset of the record (or region) the error refers to.
    pub fn offset(&self) -> usize {
        match self {
            DecodeError::InvalidLength { offset, .. }
            | DecodeError::Truncated { offset, .. }
            | DecodeError::InvalidBaseAddress { offset, .. }
            | DecodeError::InvalidLeader { offset, .. }
            | DecodeError::InvalidDirectory { offset, .. }
            | DecodeError::FieldAreaMismatch { offset, .. }
            | DecodeError::MissingTerminator { offset }
            | DecodeError::TrailingBytes { offset, .. } => *offset,
        }
    }
}

/// A record that cannot be written in ISO 8211 form.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    /// The record or its base address does not fit in five decimal digits.
    #[error("record of {len} bytes exceeds the 99999-byte ISO 8211 limit")]
    RecordTooLarge { len: usize },

    /// A tag is not printable ASCII.
    #[error("invalid field tag {tag:?}")]
    InvalidTag { tag: String },

    /// An attribute key or value contains a separator of the attribute field.
    #[error("attribute {key:?} cannot be written as KEY=VALUE")]
    InvalidAttribute { key: String },
}

/// A data record that cannot be turned into a feature.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FeatureError {
    /// The `0001` field is missing or not a decimal number.
    #[error("record has no usable record id")]
    MissingRecordId,

    /// A coordinate field has a length that is not a whole number of tuples.
    #[error("record {record_id}: {tag} field of {len} bytes is not a whole number of coordinates")]
    CoordinateField {
        record_id: u64,
        tag: String,
        len: usize,
    },

    /// A coordinate lies outside the valid latitude/longitude range.
    #[error("record {record_id}: coordinate ({latitude}, {longitude}) out of range")]
    CoordinateOutOfRange {
        record_id: u64,
        latitude: f64,
        longitude: f64,
    },

    /// The coordinates cannot form the geometry the feature type requires.
    #[error("record {record_id}: {reason}")]
    InvalidGeometry { record_id: u64, reason: String },

    /// Another feature in the same chart already uses this record id.
    #[error("duplicate record id {record_id}")]
    DuplicateRecordId { record_id: u64 },
}

/// Failure of the decode + extract + index step of a chart load.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// No well-formed record could be decoded.
    #[error("no well-formed records in {len} bytes ({errors} decode errors)")]
    NoRecords { len: usize, errors: usize },

    /// The first well-formed record is not a definition (`L`) record.
    #[error("chart does not start with a data descriptive record")]
    MissingDescriptor,

    /// Any other parser failure.
    #[error("{0}")]
    Other(String),
}

/// Terminal outcome of a failed chart load.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChartLoadError {
    /// The archive has no data for the chart.
    #[error("no data found for chart {chart_id}")]
    DataNotFound { chart_id: String },

    /// The archive failed while reading the chart.
    #[error("extraction failed for chart {chart_id}: {reason}")]
    Extraction { chart_id: String, reason: String },

    /// The content hash differs from the one pinned on first load.
    #[error("integrity check failed for chart {chart_id}: expected {expected}, got {actual}")]
    Integrity {
        chart_id: String,
        expected: String,
        actual: String,
    },

    /// Parsing kept failing after every retry.
    #[error("parsing chart {chart_id} failed after {retries} retries: {reason}")]
    Parsing {
        chart_id: String,
        retries: u32,
        reason: String,
    },

    /// The load was cancelled.
    #[error("load of chart {chart_id} was cancelled")]
    Cancelled { chart_id: String },

    /// The run this request was coalesced onto went away without a result.
    #[error("load of chart {chart_id} was abandoned before completing")]
    Abandoned { chart_id: String },
}

impl ChartLoadError {
    /// Whether the failure is a cooperative cancellation rather than a fault.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ChartLoadError::Cancelled { .. })
    }
}

/// Contract violations on the load queue.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    /// The queue was disposed and accepts no more work.
    #[error("chart load queue has been disposed")]
    Disposed,
}
