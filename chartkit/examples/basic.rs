//! Basic example demonstrating chartkit library usage.
//!
//! Run with: cargo run --example basic -- /path/to/enc/cells

use chartkit::{ChartLoadError, ChartService};
use std::env;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Get data directory from command line
    let data_dir = env::args().nth(1).unwrap_or_else(|| {
        eprintln!("Usage: cargo run --example basic -- /path/to/enc/cells");
        std::process::exit(1);
    });

    // Create service with up to 10 cached charts
    let service = ChartService::new(&data_dir, 10);

    let chart_ids = service.scan_chart_files();
    println!("Found {} charts in {}", chart_ids.len(), data_dir);
    println!("{:-<50}", "");

    for chart_id in &chart_ids {
        let result = service.load_chart(chart_id).await?;
        match &result.result {
            Ok(chart) => {
                println!(
                    "{}: {} features, {} records skipped ({} ms, {} retries)",
                    chart_id,
                    chart.feature_count(),
                    chart.decode_errors.len() + chart.skipped.len(),
                    result.duration_ms,
                    result.retry_count
                );
            }
            Err(ChartLoadError::Integrity { .. }) => {
                println!("{}: content changed since first load", chart_id);
            }
            Err(e) => {
                println!("{}: error - {}", chart_id, e);
            }
        }
    }

    if let Some(bounds) = service.loaded_bounds() {
        let center = bounds.center();
        let hits = service.query_point(center.latitude, center.longitude, 0.05);
        println!("\n{} features within 0.05 degrees of {}, {}", hits.len(), center.latitude, center.longitude);
    }

    // Show cache statistics
    let stats = service.cache_stats();
    println!("\nCache statistics:");
    println!("  Cached charts: {}", stats.entry_count);
    println!("  Hits: {}", stats.hit_count);
    println!("  Misses: {}", stats.miss_count);
    println!("  Hit rate: {:.1}%", stats.hit_rate() * 100.0);

    Ok(())
}
