use anyhow::{Context, Result};
use chartkit::{Bounds, ChartLoadResult, ChartServiceBuilder, IndexKind};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Serialize)]
struct LoadReport {
    chart_id: String,
    success: bool,
    feature_count: Option<usize>,
    decode_errors: Option<usize>,
    retry_count: u32,
    duration_ms: u64,
    error: Option<String>,
    #[serde(skip)]
    bounds: Option<Bounds>,
}

impl From<&ChartLoadResult> for LoadReport {
    fn from(result: &ChartLoadResult) -> Self {
        Self {
            chart_id: result.chart_id.clone(),
            success: result.is_success(),
            feature_count: result.chart().map(|c| c.feature_count()),
            decode_errors: result.chart().map(|c| c.decode_errors.len()),
            retry_count: result.retry_count,
            duration_ms: result.duration_ms,
            error: result.error().map(ToString::to_string),
            bounds: result.chart().and_then(|c| c.index.calculate_bounds()),
        }
    }
}

pub fn run(
    data_dir: Option<PathBuf>,
    cache_size: u64,
    index_kind: IndexKind,
    chart_ids: Vec<String>,
    json: bool,
) -> Result<()> {
    let dir = super::data_dir(data_dir)?;
    let service = ChartServiceBuilder::new(&dir)
        .cache_size(cache_size)
        .index_kind(index_kind)
        .build();

    let chart_ids = if chart_ids.is_empty() {
        service.scan_chart_files()
    } else {
        chart_ids
    };
    if chart_ids.is_empty() {
        println!("No ENC cells found in: {}", dir.display());
        return Ok(());
    }

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    let reports = runtime.block_on(async {
        // Queue everything up front; the queue loads one chart at a time
        let entries = chart_ids
            .iter()
            .map(|id| service.enqueue(id))
            .collect::<Result<Vec<_>, _>>()?;

        let pb = ProgressBar::new(entries.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
                )?
                .progress_chars("#>-"),
        );
        if json {
            pb.set_draw_target(indicatif::ProgressDrawTarget::hidden());
        }

        let mut reports = Vec::with_capacity(entries.len());
        for entry in entries {
            pb.set_message(entry.chart_id().to_string());
            let result = entry.wait().await;
            if !json {
                pb.println(describe(&result));
            }
            reports.push(LoadReport::from(&result));
            pb.inc(1);
        }
        pb.finish_with_message("done");

        service.shutdown();
        anyhow::Ok(reports)
    })?;

    if json {
        for report in &reports {
            println!("{}", serde_json::to_string(report)?);
        }
        return Ok(());
    }

    let loaded = reports.iter().filter(|r| r.success).count();
    let features: usize = reports.iter().filter_map(|r| r.feature_count).sum();
    println!();
    println!("Summary:");
    println!("  Charts loaded: {}/{}", loaded, reports.len());
    println!("  Features: {}", features);
    let coverage = reports
        .iter()
        .filter_map(|r| r.bounds)
        .reduce(|acc, b| acc.union(&b));
    if let Some(bounds) = coverage {
        println!(
            "  Coverage: N {:.4}, S {:.4}, E {:.4}, W {:.4}",
            bounds.north, bounds.south, bounds.east, bounds.west
        );
    }
    Ok(())
}

fn describe(result: &ChartLoadResult) -> String {
    match (&result.result, result.retry_count) {
        (Ok(chart), 0) => format!(
            "{}: {} features ({} ms)",
            result.chart_id,
            chart.feature_count(),
            result.duration_ms
        ),
        (Ok(chart), retries) => format!(
            "{}: {} features ({} ms, {} retries)",
            result.chart_id,
            chart.feature_count(),
            result.duration_ms,
            retries
        ),
        (Err(e), _) => format!("{}: {}", result.chart_id, e),
    }
}
