use std::collections::BTreeSet;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;

use crate::enc_file::EncFile;
use crate::error::{ChartError, Result};
use crate::filename::{chart_id_to_filename, filename_to_chart_id, is_valid_chart_id};

use super::{BoxFuture, ChartSource};

/// Cells stored in a data directory.
///
/// For chart id `ID`, tries in order:
///
/// 1. `ID.000`, memory-mapped
/// 2. `ID.zip`, reading the `ID.000` entry (or the only `.000` entry)
/// 3. `ID.000.gz`, gunzipped
///
/// # Example
///
/// ```ignore
/// use chartkit::source::{ChartSource, DirectorySource};
///
/// let source = DirectorySource::new("/data/enc");
/// let bytes = source.extract("US5MA10M").await?;
/// ```
#[derive(Debug, Clone)]
pub struct DirectorySource {
    data_dir: PathBuf,
}

impl DirectorySource {
    /// Create a source over `data_dir`.
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
        }
    }

    /// The data directory.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Read a cell synchronously.
    pub fn read_cell(&self, chart_id: &str) -> Result<Option<Vec<u8>>> {
        if !is_valid_chart_id(chart_id) {
            return Err(ChartError::InvalidChartId {
                chart_id: chart_id.to_string(),
            });
        }

        let base = self.data_dir.join(chart_id_to_filename(chart_id));
        if base.is_file() {
            tracing::debug!(chart_id, path = %base.display(), "Reading base cell");
            return Ok(Some(EncFile::open(&base)?.as_bytes().to_vec()));
        }

        let zip_path = self.data_dir.join(format!("{}.zip", chart_id));
        if zip_path.is_file() {
            tracing::debug!(chart_id, path = %zip_path.display(), "Extracting cell from zip");
            return extract_from_zip(&zip_path, chart_id).map(Some);
        }

        let gz_path = self
            .data_dir
            .join(format!("{}.gz", chart_id_to_filename(chart_id)));
        if gz_path.is_file() {
            tracing::debug!(chart_id, path = %gz_path.display(), "Decompressing gzip cell");
            let mut data = Vec::new();
            GzDecoder::new(File::open(&gz_path)?).read_to_end(&mut data)?;
            return Ok(Some(data));
        }

        Ok(None)
    }
}

impl ChartSource for DirectorySource {
    fn extract<'a>(&'a self, chart_id: &'a str) -> BoxFuture<'a, Result<Option<Vec<u8>>>> {
        Box::pin(async move {
            let source = self.clone();
            let chart_id = chart_id.to_string();
            tokio::task::spawn_blocking(move || source.read_cell(&chart_id))
                .await
                .map_err(|e| ChartError::Io(std::io::Error::other(e)))?
        })
    }

    /// Chart ids with a `.000`, `.000.gz` or `.zip` file in the data directory.
    ///
    /// A missing directory yields an empty list.
    fn available(&self) -> Result<Vec<String>> {
        let entries = match std::fs::read_dir(&self.data_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let ids: BTreeSet<String> = entries
            .flatten()
            .filter(|entry| entry.path().is_file())
            .filter_map(|entry| filename_to_chart_id(&entry.file_name().to_string_lossy()))
            .collect();
        Ok(ids.into_iter().collect())
    }
}

/// Read the base cell of `chart_id` out of a zip archive.
fn extract_from_zip(zip_path: &Path, chart_id: &str) -> Result<Vec<u8>> {
    let archive_error = |reason: String| ChartError::Archive {
        path: zip_path.to_path_buf(),
        reason,
    };

    let file = File::open(zip_path)?;
    let mut archive = zip::ZipArchive::new(file).map_err(|e| archive_error(e.to_string()))?;

    let wanted = chart_id_to_filename(chart_id).to_ascii_lowercase();
    let mut exact = None;
    let mut cells = Vec::new();
    for i in 0..archive.len() {
        let entry = archive.by_index(i).map_err(|e| archive_error(e.to_string()))?;
        if entry.is_dir() {
            continue;
        }
        // Entries are often nested, e.g. ENC_ROOT/US5MA10M/US5MA10M.000
        let name = entry
            .name()
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();
        if name == wanted {
            exact = Some(i);
            break;
        }
        if name.ends_with(".000") {
            cells.push(i);
        }
    }

    let index = match (exact, cells.as_slice()) {
        (Some(i), _) => i,
        (None, [only]) => *only,
        (None, []) => return Err(archive_error("no .000 cell in archive".to_string())),
        (None, _) => {
            return Err(archive_error(format!(
                "{} cells in archive and none named {}",
                cells.len(),
                chart_id_to_filename(chart_id)
            )))
        }
    };

    let mut entry = archive
        .by_index(index)
        .map_err(|e| archive_error(e.to_string()))?;
    let mut data = Vec::with_capacity(entry.size() as usize);
    entry.read_to_end(&mut data)?;
    Ok(data)
}
