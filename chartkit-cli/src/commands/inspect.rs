use anyhow::Result;
use chartkit::filename::CellName;
use chartkit::feature::decode_chart;
use chartkit::{Bounds, ContentHash, GeometryKind};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

use super::{format_size, read_cell};

#[derive(Serialize)]
struct InspectReport {
    chart_id: String,
    path: String,
    size_bytes: usize,
    sha256: String,
    record_count: usize,
    has_descriptor: bool,
    feature_count: usize,
    features_by_type: BTreeMap<String, usize>,
    points: usize,
    lines: usize,
    areas: usize,
    decode_errors: Vec<String>,
    skipped_features: Vec<String>,
    bounds: Option<[f64; 4]>,
}

pub fn run(file: PathBuf, verbose: bool, json: bool) -> Result<()> {
    let (chart_id, data) = read_cell(&file)?;
    let decoded = decode_chart(&data);

    let mut features_by_type = BTreeMap::new();
    let (mut points, mut lines, mut areas) = (0, 0, 0);
    for feature in &decoded.features {
        *features_by_type
            .entry(feature.feature_type().acronym().to_string())
            .or_insert(0) += 1;
        match feature.geometry_kind() {
            GeometryKind::Point => points += 1,
            GeometryKind::Line => lines += 1,
            GeometryKind::Area => areas += 1,
        }
    }
    let bounds = decoded
        .features
        .iter()
        .map(|f| f.bounds())
        .reduce(|acc, b| acc.union(&b));

    let report = InspectReport {
        chart_id,
        path: file.display().to_string(),
        size_bytes: data.len(),
        sha256: ContentHash::of(&data).to_hex(),
        record_count: decoded.record_count,
        has_descriptor: decoded.has_descriptor,
        feature_count: decoded.features.len(),
        features_by_type,
        points,
        lines,
        areas,
        decode_errors: decoded.decode_errors.iter().map(ToString::to_string).collect(),
        skipped_features: decoded.skipped.iter().map(ToString::to_string).collect(),
        bounds: bounds.map(|b: Bounds| [b.north, b.south, b.east, b.west]),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Chart: {}", report.chart_id);
    if let Some(cell) = CellName::parse(&report.chart_id) {
        println!(
            "Cell: producer {}, band {} ({}), code {}",
            cell.producer,
            cell.usage_band.digit(),
            cell.usage_band,
            cell.cell_code
        );
    }
    println!("Path: {}", report.path);
    println!("File size: {}", format_size(report.size_bytes as u64));
    println!("SHA-256: {}", report.sha256);
    println!();
    println!(
        "Records: {} ({})",
        report.record_count,
        if report.has_descriptor {
            "with data descriptive record"
        } else {
            "no data descriptive record"
        }
    );
    println!(
        "Features: {} ({} points, {} lines, {} areas)",
        report.feature_count, report.points, report.lines, report.areas
    );
    for (acronym, count) in &report.features_by_type {
        println!("  {:<8} {:>6}", acronym, count);
    }

    if let Some([north, south, east, west]) = report.bounds {
        println!(
            "Bounds: N {:.6}, S {:.6}, E {:.6}, W {:.6}",
            north, south, east, west
        );
    }

    println!();
    println!("Decode errors: {}", report.decode_errors.len());
    if verbose {
        for error in &report.decode_errors {
            println!("  {}", error);
        }
    }
    println!("Skipped features: {}", report.skipped_features.len());
    if verbose {
        for skipped in &report.skipped_features {
            println!("  {}", skipped);
        }
    }

    Ok(())
}
