//! Chart service with queued loading and LRU caching.
//!
//! [`ChartService`] ties the pieces together: a [`ChartSource`] (by default
//! a [`DirectorySource`] over the data directory), the load pipeline behind a
//! serialized queue, and a `moka` cache of loaded charts that viewport
//! queries run against.
//!
//! ```ignore
//! use chartkit::{Bounds, ChartServiceBuilder};
//!
//! let service = ChartServiceBuilder::new("/data/enc")
//!     .cache_size(16)
//!     .build();
//!
//! let result = service.load_chart("US5MA10M").await?;
//! let hits = service.query_bounds(&Bounds::new(42.40, 42.30, -70.95, -71.10));
//! ```

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use moka::sync::Cache;

use crate::error::{ChartError, QueueError, Result};
use crate::feature::Feature;
use crate::geo::Bounds;
use crate::index::IndexKind;
use crate::integrity::IntegrityRegistry;
use crate::pipeline::{ChartLoadPipeline, ChartLoadResult, EncParser, LoadedChart, RetryPolicy};
use crate::queue::{ChartLoadQueue, QueueEntry, QueueStatus};
use crate::source::{ChartSource, DirectorySource};

/// Default number of loaded charts kept in memory.
pub const DEFAULT_CACHE_SIZE: u64 = 32;

/// Statistics about cache usage.
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    /// Number of charts currently in the cache.
    pub entry_count: u64,
    /// Number of loads served from the cache.
    pub hit_count: u64,
    /// Number of loads that went through the pipeline.
    pub miss_count: u64,
}

impl CacheStats {
    /// Calculate the cache hit rate (0.0 to 1.0).
    ///
    /// Returns 0.0 if no loads have been requested.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hit_count + self.miss_count;
        if total == 0 {
            0.0
        } else {
            self.hit_count as f64 / total as f64
        }
    }
}

/// Statistics from a preload operation.
#[derive(Debug, Clone, Default)]
pub struct PreloadStats {
    /// Number of charts the source offered.
    pub charts_found: u64,
    /// Number of charts loaded into the cache.
    pub charts_loaded: u64,
    /// Number of charts that were already cached.
    pub charts_already_cached: u64,
    /// Number of charts that failed to load.
    pub charts_failed: u64,
    /// Total elapsed time in milliseconds.
    pub elapsed_ms: u64,
}

/// A feature found by a query, with the chart it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureHit {
    /// Chart id.
    pub chart_id: String,
    /// The feature.
    pub feature: Feature,
}

/// Summary of a loaded chart.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartSummary {
    /// Chart id.
    pub chart_id: String,
    /// Union of the chart's feature bounds.
    pub bounds: Option<Bounds>,
    /// Number of features.
    pub feature_count: usize,
    /// Well-formed records.
    pub record_count: usize,
    /// Records the decoder skipped.
    pub decode_errors: usize,
    /// Records that could not become features.
    pub skipped_features: usize,
    /// Hex SHA-256 of the chart bytes.
    pub content_hash: String,
    /// Size of the chart bytes.
    pub size_bytes: usize,
}

impl From<&LoadedChart> for ChartSummary {
    fn from(chart: &LoadedChart) -> Self {
        Self {
            chart_id: chart.chart_id.clone(),
            bounds: chart.index.calculate_bounds(),
            feature_count: chart.index.len(),
            record_count: chart.record_count,
            decode_errors: chart.decode_errors.len(),
            skipped_features: chart.skipped.len(),
            content_hash: chart.content_hash.to_hex(),
            size_bytes: chart.size_bytes,
        }
    }
}

/// High-level chart service with queued loading and caching.
///
/// Loads are serialized through a [`ChartLoadQueue`]; successfully loaded
/// charts are kept in an LRU cache and answer viewport queries.
///
/// Methods that enqueue loads must run inside a Tokio runtime.
pub struct ChartService {
    data_dir: PathBuf,
    index_kind: IndexKind,
    pipeline: Arc<ChartLoadPipeline>,
    queue: ChartLoadQueue,
    chart_cache: Cache<String, Arc<LoadedChart>>,
    hit_count: AtomicU64,
    miss_count: AtomicU64,
}

impl ChartService {
    /// Create a service over `data_dir`.
    ///
    /// # Arguments
    ///
    /// * `data_dir` - Directory containing `.000`, `.000.gz` or `.zip` cells
    /// * `cache_size` - Maximum number of loaded charts to keep in memory
    pub fn new<P: AsRef<Path>>(data_dir: P, cache_size: u64) -> Self {
        ChartServiceBuilder::new(data_dir)
            .cache_size(cache_size)
            .build()
    }

    /// Create a builder.
    pub fn builder<P: AsRef<Path>>(data_dir: P) -> ChartServiceBuilder {
        ChartServiceBuilder::new(data_dir)
    }

    /// Load a chart, from the cache if present, otherwise through the queue.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Disposed`] after [`shutdown`](Self::shutdown).
    /// Load failures are reported in the returned [`ChartLoadResult`].
    pub async fn load_chart(&self, chart_id: &str) -> std::result::Result<ChartLoadResult, QueueError> {
        if let Some(chart) = self.chart_cache.get(chart_id) {
            self.hit_count.fetch_add(1, Ordering::Relaxed);
            return Ok(ChartLoadResult {
                chart_id: chart_id.to_string(),
                result: Ok(chart),
                retry_count: 0,
                duration_ms: 0,
            });
        }

        self.miss_count.fetch_add(1, Ordering::Relaxed);
        let result = self.enqueue(chart_id)?.wait().await;
        if let Some(chart) = result.chart() {
            self.chart_cache.insert(chart_id.to_string(), chart.clone());
        }
        Ok(result)
    }

    /// Queue a load without waiting for it.
    ///
    /// Joins the existing entry when `chart_id` is already queued or
    /// loading. The chart is cached when the load succeeds.
    pub fn enqueue(&self, chart_id: &str) -> std::result::Result<QueueEntry, QueueError> {
        let entry = self.queue.enqueue(chart_id)?;

        let cache = self.chart_cache.clone();
        let watched = entry.clone();
        tokio::spawn(async move {
            let result = watched.wait().await;
            if let Some(chart) = result.chart() {
                cache.insert(result.chart_id.clone(), chart.clone());
            }
        });

        Ok(entry)
    }

    /// Cancel a load.
    ///
    /// A pending entry is removed and resolved as cancelled. A load already
    /// running stops at its next cancellation check. Returns whether there
    /// was anything to cancel.
    pub fn cancel(&self, chart_id: &str) -> bool {
        self.queue.interrupt(chart_id) || self.queue.cancel(chart_id)
    }

    /// Cancel every pending load. Returns how many were cancelled.
    pub fn clear_queue(&self) -> usize {
        self.queue.clear()
    }

    /// Snapshot of the load queue.
    pub fn queue_status(&self) -> QueueStatus {
        self.queue.status()
    }

    /// Stop the queue. Pending and running loads resolve as cancelled and
    /// further loads are refused.
    pub fn shutdown(&self) {
        self.queue.dispose();
    }

    /// Features of every loaded chart intersecting `bounds`.
    pub fn query_bounds(&self, bounds: &Bounds) -> Vec<FeatureHit> {
        let mut hits = Vec::new();
        for chart in self.loaded() {
            hits.extend(chart.index.query_bounds(bounds).into_iter().map(|f| FeatureHit {
                chart_id: chart.chart_id.clone(),
                feature: f.clone(),
            }));
        }
        hits
    }

    /// Features of every loaded chart within `radius` degrees of a point.
    ///
    /// # Arguments
    ///
    /// * `latitude` - Latitude in decimal degrees
    /// * `longitude` - Longitude in decimal degrees
    /// * `radius` - Half-width of the search square in degrees
    pub fn query_point(&self, latitude: f64, longitude: f64, radius: f64) -> Vec<FeatureHit> {
        self.query_bounds(&Bounds::around(latitude, longitude, radius))
    }

    /// Union of the bounds of every loaded chart.
    pub fn loaded_bounds(&self) -> Option<Bounds> {
        self.loaded()
            .iter()
            .filter_map(|chart| chart.index.calculate_bounds())
            .reduce(|acc, b| acc.union(&b))
    }

    /// Summaries of the loaded charts, sorted by chart id.
    pub fn loaded_charts(&self) -> Vec<ChartSummary> {
        self.loaded()
            .iter()
            .map(|chart| ChartSummary::from(chart.as_ref()))
            .collect()
    }

    /// A loaded chart, if cached.
    pub fn get_chart(&self, chart_id: &str) -> Option<Arc<LoadedChart>> {
        self.chart_cache.get(chart_id)
    }

    fn loaded(&self) -> Vec<Arc<LoadedChart>> {
        let mut charts: Vec<Arc<LoadedChart>> =
            self.chart_cache.iter().map(|(_, chart)| chart).collect();
        charts.sort_by(|a, b| a.chart_id.cmp(&b.chart_id));
        charts
    }

    /// Get cache statistics.
    ///
    /// Returns information about cache usage including hit rate.
    pub fn cache_stats(&self) -> CacheStats {
        self.chart_cache.run_pending_tasks();
        CacheStats {
            entry_count: self.chart_cache.entry_count(),
            hit_count: self.hit_count.load(Ordering::Relaxed),
            miss_count: self.miss_count.load(Ordering::Relaxed),
        }
    }

    /// Remove a chart from the cache. Its pinned content hash is kept.
    pub fn invalidate_chart(&self, chart_id: &str) {
        self.chart_cache.invalidate(chart_id);
    }

    /// Clear all charts from the cache.
    pub fn clear_cache(&self) {
        self.chart_cache.invalidate_all();
    }

    /// Chart ids the source can provide, sorted.
    ///
    /// An unreadable data directory yields an empty list.
    pub fn scan_chart_files(&self) -> Vec<String> {
        self.pipeline.source().available().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Failed to scan for chart files");
            Vec::new()
        })
    }

    /// Load every chart the source offers into the cache.
    ///
    /// This is useful for warming the cache at startup.
    pub async fn preload(&self) -> PreloadStats {
        let start = Instant::now();
        let mut stats = PreloadStats::default();

        let mut entries = Vec::new();
        for chart_id in self.scan_chart_files() {
            stats.charts_found += 1;
            if self.chart_cache.contains_key(&chart_id) {
                stats.charts_already_cached += 1;
                continue;
            }
            match self.enqueue(&chart_id) {
                Ok(entry) => entries.push(entry),
                Err(_) => stats.charts_failed += 1,
            }
        }

        for entry in entries {
            let result = entry.wait().await;
            match result.chart() {
                Some(chart) => {
                    self.chart_cache.insert(result.chart_id.clone(), chart.clone());
                    stats.charts_loaded += 1;
                }
                None => stats.charts_failed += 1,
            }
        }

        stats.elapsed_ms = start.elapsed().as_millis() as u64;
        tracing::info!(
            found = stats.charts_found,
            loaded = stats.charts_loaded,
            cached = stats.charts_already_cached,
            failed = stats.charts_failed,
            elapsed_ms = stats.elapsed_ms,
            "Preload complete"
        );
        stats
    }

    /// Get the data directory path.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Get the maximum cache size.
    pub fn cache_capacity(&self) -> u64 {
        self.chart_cache.policy().max_capacity().unwrap_or(0)
    }

    /// Index kind built for loaded charts.
    pub fn index_kind(&self) -> IndexKind {
        self.index_kind
    }

    /// The trust-on-first-use hash registry.
    pub fn integrity(&self) -> &Arc<IntegrityRegistry> {
        self.pipeline.integrity()
    }

    /// The load pipeline.
    pub fn pipeline(&self) -> &Arc<ChartLoadPipeline> {
        &self.pipeline
    }
}

impl std::fmt::Debug for ChartService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChartService")
            .field("data_dir", &self.data_dir)
            .field("index_kind", &self.index_kind)
            .field("cache", &self.cache_stats())
            .field("queue", &self.queue.status())
            .finish()
    }
}

/// Builder for creating [`ChartService`] with custom configuration.
///
/// # Example
///
/// ```ignore
/// use chartkit::{ChartServiceBuilder, IndexKind};
///
/// let service = ChartServiceBuilder::new("/data/enc")
///     .cache_size(16)
///     .index_kind(IndexKind::Linear)
///     .build();
/// ```
pub struct ChartServiceBuilder {
    data_dir: PathBuf,
    cache_size: u64,
    index_kind: IndexKind,
    retry_policy: RetryPolicy,
    source: Option<Arc<dyn ChartSource>>,
}

impl ChartServiceBuilder {
    /// Create a new builder with the specified data directory.
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            cache_size: DEFAULT_CACHE_SIZE,
            index_kind: IndexKind::default(),
            retry_policy: RetryPolicy::default(),
            source: None,
        }
    }

    /// Create a builder configured from environment variables.
    ///
    /// # Environment Variables
    ///
    /// | Variable | Description | Default |
    /// |----------|-------------|---------|
    /// | `CHARTKIT_DATA_DIR` | Directory containing ENC cells | Required |
    /// | `CHARTKIT_CACHE_SIZE` | Maximum loaded charts in memory | 32 |
    /// | `CHARTKIT_INDEX` | `tree` or `linear` | `tree` |
    ///
    /// # Example
    ///
    /// ```bash
    /// export CHARTKIT_DATA_DIR=/data/enc
    /// export CHARTKIT_CACHE_SIZE=8
    /// export CHARTKIT_INDEX=linear
    /// ```
    ///
    /// ```ignore
    /// use chartkit::ChartServiceBuilder;
    ///
    /// let service = ChartServiceBuilder::from_env()?.build();
    /// ```
    ///
    /// # Errors
    ///
    /// Returns an error if `CHARTKIT_DATA_DIR` is not set or `CHARTKIT_INDEX`
    /// names an unknown index.
    pub fn from_env() -> Result<Self> {
        let data_dir = std::env::var("CHARTKIT_DATA_DIR").map_err(|_| {
            ChartError::Config("CHARTKIT_DATA_DIR environment variable not set".to_string())
        })?;

        let cache_size: u64 = std::env::var("CHARTKIT_CACHE_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_CACHE_SIZE);

        let index_kind = match std::env::var("CHARTKIT_INDEX") {
            Ok(value) => value
                .parse()
                .map_err(|e: String| ChartError::Config(format!("CHARTKIT_INDEX: {}", e)))?,
            Err(_) => IndexKind::default(),
        };

        Ok(Self::new(data_dir).cache_size(cache_size).index_kind(index_kind))
    }

    /// Set the data directory.
    ///
    /// Overrides the directory set in the constructor or from environment.
    pub fn data_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.data_dir = path.as_ref().to_path_buf();
        self
    }

    /// Set the maximum number of loaded charts to keep in cache.
    ///
    /// Default is 32 charts.
    pub fn cache_size(mut self, size: u64) -> Self {
        self.cache_size = size;
        self
    }

    /// Set the spatial index built for each chart.
    pub fn index_kind(mut self, kind: IndexKind) -> Self {
        self.index_kind = kind;
        self
    }

    /// Set the parse retry schedule.
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Read charts from `source` instead of the data directory.
    pub fn source(mut self, source: Arc<dyn ChartSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Build the [`ChartService`].
    pub fn build(self) -> ChartService {
        let source = self
            .source
            .unwrap_or_else(|| Arc::new(DirectorySource::new(&self.data_dir)));
        let pipeline = Arc::new(
            ChartLoadPipeline::new(source, Arc::new(EncParser::new(self.index_kind)))
                .with_retry_policy(self.retry_policy),
        );

        tracing::debug!(
            data_dir = %self.data_dir.display(),
            cache_size = self.cache_size,
            index = %self.index_kind,
            "Chart service configured"
        );

        ChartService {
            data_dir: self.data_dir,
            index_kind: self.index_kind,
            queue: ChartLoadQueue::new(pipeline.clone()),
            pipeline,
            chart_cache: Cache::builder().max_capacity(self.cache_size).build(),
            hit_count: AtomicU64::new(0),
            miss_count: AtomicU64::new(0),
        }
    }
}
