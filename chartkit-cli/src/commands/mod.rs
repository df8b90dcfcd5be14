use anyhow::{bail, Context, Result};
use chartkit::filename::filename_to_chart_id;
use chartkit::{DirectorySource, EncFile};
use std::path::{Path, PathBuf};

pub mod inspect;
pub mod list;
pub mod load;
pub mod query;

/// Resolve the data directory from `--data-dir` or `CHARTKIT_DATA_DIR`.
pub fn data_dir(data_dir: Option<PathBuf>) -> Result<PathBuf> {
    let dir = match data_dir {
        Some(dir) => dir,
        None => {
            let dir = std::env::var("CHARTKIT_DATA_DIR").context(
                "CHARTKIT_DATA_DIR environment variable not set. Use --data-dir or set CHARTKIT_DATA_DIR",
            )?;
            PathBuf::from(dir)
        }
    };

    if !dir.is_dir() {
        bail!("Data directory does not exist: {}", dir.display());
    }
    Ok(dir)
}

/// Read the bytes of the cell at `path`.
///
/// Plain `.000` files are memory-mapped; `.000.gz` and `.zip` cells are
/// unpacked the same way the data directory source does it.
pub fn read_cell(path: &Path) -> Result<(String, Vec<u8>)> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("Not a file path: {}", path.display()))?;
    let chart_id = filename_to_chart_id(name)
        .with_context(|| format!("Not an ENC cell (.000, .000.gz or .zip): {}", name))?;

    if name.to_ascii_lowercase().ends_with(".000") {
        let file = EncFile::open(path).context("Failed to open cell")?;
        return Ok((chart_id, file.as_bytes().to_vec()));
    }

    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let data = DirectorySource::new(parent)
        .read_cell(&chart_id)
        .context("Failed to read cell")?
        .with_context(|| format!("No cell data in {}", path.display()))?;
    Ok((chart_id, data))
}

pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}
