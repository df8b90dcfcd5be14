//! Memory-mapped ENC cell files.

use std::fs::File;
use std::path::{Path, PathBuf};

use memmap2::Mmap;

use crate::error::{ChartError, Result};
use crate::feature::{decode_chart, DecodedChart};
use crate::filename::filename_to_chart_id;
use crate::iso8211::RecordReader;

/// A memory-mapped base cell (`.000`).
///
/// # Example
///
/// ```ignore
/// use chartkit::EncFile;
///
/// let cell = EncFile::open("US5MA10M.000")?;
/// let chart = cell.decode();
/// println!("{} features, {} corrupt records", chart.features.len(), chart.decode_errors.len());
/// ```
pub struct EncFile {
    data: Mmap,
    path: PathBuf,
}

impl EncFile {
    /// Map a cell file.
    ///
    /// # Errors
    ///
    /// Returns [`ChartError::FileNotFound`] if the file does not exist, or an
    /// I/O error if it cannot be opened or mapped.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ChartError::FileNotFound {
                path: path.to_path_buf(),
            },
            _ => ChartError::Io(e),
        })?;

        // SAFETY: the mapping is read-only and never outlives this struct;
        // cells are not expected to change while mapped.
        let data = unsafe { Mmap::map(&file)? };

        Ok(Self {
            data,
            path: path.to_path_buf(),
        })
    }

    /// Raw cell bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// File size in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the file is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Path the file was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Chart id derived from the filename, if it is a cell name.
    pub fn chart_id(&self) -> Option<String> {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(filename_to_chart_id)
    }

    /// Lazy record iterator over the mapped bytes.
    pub fn records(&self) -> RecordReader<'_> {
        RecordReader::new(&self.data)
    }

    /// Decode every record and extract features.
    pub fn decode(&self) -> DecodedChart {
        decode_chart(&self.data)
    }
}

impl std::fmt::Debug for EncFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncFile")
            .field("path", &self.path)
            .field("len", &self.data.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::{encode_chart, Attributes, Feature, FeatureType};
    use crate::geo::Coordinate;
    use tempfile::TempDir;

    #[test]
    fn test_open_and_decode() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("US5MA10M.000");
        let feature = Feature::new(
            1,
            FeatureType::Wreck,
            vec![Coordinate::new(42.35, -70.9)],
            Attributes::new(),
        )
        .unwrap();
        std::fs::write(&path, encode_chart([&feature]).unwrap()).unwrap();

        let cell = EncFile::open(&path).unwrap();
        assert_eq!(cell.chart_id().as_deref(), Some("US5MA10M"));
        assert_eq!(cell.records().count(), 2);

        let chart = cell.decode();
        assert!(chart.has_descriptor);
        assert_eq!(chart.features, vec![feature]);
    }

    #[test]
    fn test_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let err = EncFile::open(temp_dir.path().join("NOPE.000")).unwrap_err();
        assert!(matches!(err, ChartError::FileNotFound { .. }));
    }
}
