use anyhow::{Context, Result};
use chartkit::filename::{filename_to_chart_id, CellName};
use std::fs;
use std::path::PathBuf;

use super::format_size;

pub fn run(data_dir: Option<PathBuf>) -> Result<()> {
    let dir = super::data_dir(data_dir)?;

    // Collect cell files (.000, .000.gz, .zip)
    let mut cells: Vec<_> = fs::read_dir(&dir)
        .context("Failed to read data directory")?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().into_owned();
            filename_to_chart_id(&name).map(|chart_id| (name, chart_id, entry.path()))
        })
        .collect();

    if cells.is_empty() {
        println!("No ENC cells found in: {}", dir.display());
        return Ok(());
    }

    // Sort by filename
    cells.sort_by(|a, b| a.0.cmp(&b.0));

    let mut total_size: u64 = 0;
    let mut by_band = [0usize; 6];

    println!("{:<20} {:<10} {:<12} {:>12}", "FILE", "CHART", "BAND", "SIZE");
    println!("{}", "-".repeat(57));

    for (name, chart_id, path) in &cells {
        let size = fs::metadata(path).map(|m| m.len()).unwrap_or(0);
        total_size += size;

        let band = match CellName::parse(chart_id) {
            Some(cell) => {
                by_band[cell.usage_band.digit() as usize - 1] += 1;
                format!("{} {}", cell.usage_band.digit(), cell.usage_band)
            }
            None => "?".to_string(),
        };

        println!(
            "{:<20} {:<10} {:<12} {:>12}",
            name,
            chart_id,
            band,
            format_size(size)
        );
    }

    // Summary
    println!();
    println!("Summary:");
    println!("  Total cells: {}", cells.len());
    for (i, count) in by_band.iter().enumerate().filter(|(_, c)| **c > 0) {
        println!("  Band {}: {}", i + 1, count);
    }
    println!("  Total size: {}", format_size(total_size));
    println!("  Data directory: {}", dir.display());

    Ok(())
}
