use anyhow::{bail, Context, Result};
use chartkit::feature::decode_chart;
use chartkit::geojson::features_to_collection;
use chartkit::{AttributeValue, Bounds, Feature, IndexKind};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use super::read_cell;
use crate::OutputFormat;

pub fn run(
    file: PathBuf,
    index_kind: IndexKind,
    [north, south, east, west]: [f64; 4],
    format: OutputFormat,
    output: Option<PathBuf>,
) -> Result<()> {
    let Some(bounds) = Bounds::checked(north, south, east, west) else {
        bail!("Invalid bounds: north must be >= south and east must be >= west");
    };

    let (chart_id, data) = read_cell(&file)?;
    let decoded = decode_chart(&data);
    if decoded.record_count == 0 {
        bail!("No readable ISO 8211 records in {}", file.display());
    }
    if !decoded.decode_errors.is_empty() {
        eprintln!(
            "warning: {} corrupt records skipped in {}",
            decoded.decode_errors.len(),
            chart_id
        );
    }

    let index = index_kind.build(decoded.features);
    let hits = index.query_bounds(&bounds);

    let mut writer: Box<dyn Write> = match &output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).context("Failed to create output file")?,
        )),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };

    match format {
        OutputFormat::Table => write_table(&mut writer, &hits)?,
        OutputFormat::Csv => write_csv(&mut writer, &hits)?,
        OutputFormat::Geojson => {
            let collection = features_to_collection(hits.iter().copied());
            writeln!(writer, "{}", serde_json::to_string(&collection)?)?;
        }
    }
    writer.flush()?;

    if let Some(path) = output {
        println!("{} features written to: {}", hits.len(), path.display());
    }
    Ok(())
}

fn write_table(writer: &mut dyn Write, hits: &[&Feature]) -> Result<()> {
    writeln!(
        writer,
        "{:>8} {:<8} {:<6} {:>12} {:>13} {:>6}  ATTRIBUTES",
        "RECORD", "TYPE", "GEOM", "LAT", "LON", "POINTS"
    )?;
    writeln!(writer, "{}", "-".repeat(72))?;

    for feature in hits {
        let first = feature.coordinates()[0];
        writeln!(
            writer,
            "{:>8} {:<8} {:<6} {:>12.7} {:>13.7} {:>6}  {}",
            feature.record_id(),
            feature.feature_type().acronym(),
            feature.geometry_kind(),
            first.latitude,
            first.longitude,
            feature.coordinates().len(),
            format_attributes(feature)
        )?;
    }

    writeln!(writer)?;
    writeln!(writer, "{} features", hits.len())?;
    Ok(())
}

fn write_csv(writer: &mut dyn Write, hits: &[&Feature]) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record([
        "record_id",
        "feature_type",
        "geometry",
        "latitude",
        "longitude",
        "points",
        "attributes",
    ])?;

    for feature in hits {
        let first = feature.coordinates()[0];
        csv.write_record([
            feature.record_id().to_string(),
            feature.feature_type().acronym().to_string(),
            feature.geometry_kind().to_string(),
            first.latitude.to_string(),
            first.longitude.to_string(),
            feature.coordinates().len().to_string(),
            format_attributes(feature),
        ])?;
    }

    csv.flush()?;
    Ok(())
}

/// `KEY=value` pairs separated by `;`. Byte attributes show their length.
fn format_attributes(feature: &Feature) -> String {
    feature
        .attributes()
        .iter()
        .map(|(key, value)| match value {
            AttributeValue::Bytes(bytes) => format!("{}=<{} bytes>", key, bytes.len()),
            other => format!("{}={}", key, other),
        })
        .collect::<Vec<_>>()
        .join(";")
}
