//! Chart load pipeline.
//!
//! Every load attempt runs these steps in order; any of them can end the
//! load early:
//!
//! 1. **Cancellation check**: a cancelled chart id fails immediately.
//! 2. **Extraction**: bytes from the [`ChartSource`]. No data is terminal.
//! 3. **Hash**: SHA-256 of the bytes.
//! 4. **Integrity check**: the hash must match the one pinned on the first
//!    successful load of the chart id, if there is one.
//! 5. **Parse with retry**: decode, extract features, build the index. A
//!    failed parse is retried after each delay of the [`RetryPolicy`], with
//!    cancellation rechecked before every retry.
//!
//! Concurrent loads of the same chart id share one run and its result.

mod cancel;
mod coalesce;
mod retry;

use std::fmt;
use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio::time::Instant;

use crate::error::{ChartLoadError, DecodeError, FeatureError, ParseError};
use crate::feature::decode_chart;
use crate::index::{IndexKind, SpatialIndex};
use crate::integrity::{ContentHash, IntegrityRegistry};
use crate::source::ChartSource;

use coalesce::{LoadCoalescer, Registration};

pub use cancel::CancellationRegistry;
pub use retry::RetryPolicy;

/// Output of a successful parse.
#[derive(Debug)]
pub struct ParsedChart {
    /// Spatial index over the extracted features.
    pub index: Box<dyn SpatialIndex>,
    /// Well-formed records, definition record included.
    pub record_count: usize,
    /// Records the decoder skipped.
    pub decode_errors: Vec<DecodeError>,
    /// Records that decoded but could not become features.
    pub skipped: Vec<FeatureError>,
}

/// Decode + extract + index step of the pipeline.
pub trait ChartParser: Send + Sync {
    /// Parse the raw bytes of `chart_id`.
    fn parse(&self, chart_id: &str, data: &[u8]) -> Result<ParsedChart, ParseError>;
}

/// Parser for ISO 8211 ENC cells.
///
/// Fails when no record decodes at all or when the first record is not the
/// data descriptive record. Individual corrupt records and unusable features
/// are skipped and reported in the [`ParsedChart`].
#[derive(Debug, Clone, Copy, Default)]
pub struct EncParser {
    index_kind: IndexKind,
}

impl EncParser {
    /// Parser building indexes of `index_kind`.
    pub fn new(index_kind: IndexKind) -> Self {
        Self { index_kind }
    }

    /// Index kind this parser builds.
    pub fn index_kind(&self) -> IndexKind {
        self.index_kind
    }
}

impl ChartParser for EncParser {
    fn parse(&self, chart_id: &str, data: &[u8]) -> Result<ParsedChart, ParseError> {
        let chart = decode_chart(data);
        if chart.record_count == 0 {
            return Err(ParseError::NoRecords {
                len: data.len(),
                errors: chart.decode_errors.len(),
            });
        }
        if !chart.has_descriptor {
            return Err(ParseError::MissingDescriptor);
        }

        tracing::debug!(
            chart_id,
            records = chart.record_count,
            features = chart.features.len(),
            decode_errors = chart.decode_errors.len(),
            skipped = chart.skipped.len(),
            index = %self.index_kind,
            "Parsed chart"
        );

        Ok(ParsedChart {
            index: self.index_kind.build(chart.features),
            record_count: chart.record_count,
            decode_errors: chart.decode_errors,
            skipped: chart.skipped,
        })
    }
}

/// A chart that went through the whole pipeline.
pub struct LoadedChart {
    /// Chart id.
    pub chart_id: String,
    /// SHA-256 of the bytes the chart was parsed from.
    pub content_hash: ContentHash,
    /// Size of those bytes.
    pub size_bytes: usize,
    /// Spatial index over the chart's features.
    pub index: Box<dyn SpatialIndex>,
    /// Well-formed records, definition record included.
    pub record_count: usize,
    /// Records the decoder skipped.
    pub decode_errors: Vec<DecodeError>,
    /// Records that decoded but could not become features.
    pub skipped: Vec<FeatureError>,
}

impl LoadedChart {
    /// Number of features.
    pub fn feature_count(&self) -> usize {
        self.index.len()
    }
}

impl fmt::Debug for LoadedChart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedChart")
            .field("chart_id", &self.chart_id)
            .field("content_hash", &self.content_hash)
            .field("size_bytes", &self.size_bytes)
            .field("features", &self.index.len())
            .field("record_count", &self.record_count)
            .field("decode_errors", &self.decode_errors.len())
            .field("skipped", &self.skipped.len())
            .finish()
    }
}

/// Outcome of one chart load. Every load produces exactly one.
#[derive(Debug, Clone)]
pub struct ChartLoadResult {
    /// Chart id.
    pub chart_id: String,
    /// The loaded chart, or why loading failed.
    pub result: Result<Arc<LoadedChart>, ChartLoadError>,
    /// Parse retries performed.
    pub retry_count: u32,
    /// Wall time of the run in milliseconds.
    pub duration_ms: u64,
}

impl ChartLoadResult {
    /// Whether the load succeeded.
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    /// The loaded chart, if any.
    pub fn chart(&self) -> Option<&Arc<LoadedChart>> {
        self.result.as_ref().ok()
    }

    /// The failure, if any.
    pub fn error(&self) -> Option<&ChartLoadError> {
        self.result.as_ref().err()
    }

    /// A failed result that never reached the pipeline.
    pub fn failed(chart_id: &str, error: ChartLoadError) -> Self {
        Self {
            chart_id: chart_id.to_string(),
            result: Err(error),
            retry_count: 0,
            duration_ms: 0,
        }
    }
}

/// Pipeline run counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    /// Runs started.
    pub runs: u64,
    /// Loads that joined an in-flight run.
    pub coalesced: u64,
}

/// Runs chart loads: extract, hash, verify, parse with retry.
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use chartkit::pipeline::{ChartLoadPipeline, EncParser};
/// use chartkit::source::DirectorySource;
///
/// let pipeline = ChartLoadPipeline::new(
///     Arc::new(DirectorySource::new("/data/enc")),
///     Arc::new(EncParser::default()),
/// );
/// let result = pipeline.load("US5MA10M").await;
/// if let Some(chart) = result.chart() {
///     println!("{} features", chart.feature_count());
/// }
/// ```
pub struct ChartLoadPipeline {
    source: Arc<dyn ChartSource>,
    parser: Arc<dyn ChartParser>,
    integrity: Arc<IntegrityRegistry>,
    cancellation: Arc<CancellationRegistry>,
    retry: RetryPolicy,
    coalescer: LoadCoalescer,
}

impl ChartLoadPipeline {
    /// Create a pipeline with fresh registries and the default retry policy.
    pub fn new(source: Arc<dyn ChartSource>, parser: Arc<dyn ChartParser>) -> Self {
        Self {
            source,
            parser,
            integrity: Arc::new(IntegrityRegistry::new()),
            cancellation: Arc::new(CancellationRegistry::new()),
            retry: RetryPolicy::default(),
            coalescer: LoadCoalescer::default(),
        }
    }

    /// Share an integrity registry.
    pub fn with_integrity(mut self, integrity: Arc<IntegrityRegistry>) -> Self {
        self.integrity = integrity;
        self
    }

    /// Share a cancellation registry.
    pub fn with_cancellation(mut self, cancellation: Arc<CancellationRegistry>) -> Self {
        self.cancellation = cancellation;
        self
    }

    /// Replace the retry policy.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// The integrity registry.
    pub fn integrity(&self) -> &Arc<IntegrityRegistry> {
        &self.integrity
    }

    /// The cancellation registry.
    pub fn cancellation(&self) -> &Arc<CancellationRegistry> {
        &self.cancellation
    }

    /// The chart source.
    pub fn source(&self) -> &Arc<dyn ChartSource> {
        &self.source
    }

    /// Whether a run for `chart_id` is in flight.
    pub fn is_loading(&self, chart_id: &str) -> bool {
        self.coalescer.is_in_flight(chart_id)
    }

    /// Run counters.
    pub fn stats(&self) -> PipelineStats {
        PipelineStats {
            runs: self.coalescer.runs(),
            coalesced: self.coalescer.coalesced(),
        }
    }

    /// Load a chart.
    ///
    /// If a load of `chart_id` is already running, waits for it and returns
    /// its result instead of starting another.
    pub async fn load(&self, chart_id: &str) -> ChartLoadResult {
        match self.coalescer.register(chart_id) {
            Registration::Follower(mut rx) => match rx.recv().await {
                Ok(result) => result,
                Err(RecvError::Closed) | Err(RecvError::Lagged(_)) => ChartLoadResult::failed(
                    chart_id,
                    ChartLoadError::Abandoned {
                        chart_id: chart_id.to_string(),
                    },
                ),
            },
            Registration::Leader(in_flight) => {
                let result = self.run(chart_id).await;
                in_flight.complete(&result);
                result
            }
        }
    }

    async fn run(&self, chart_id: &str) -> ChartLoadResult {
        let start = Instant::now();
        let mut retry_count = 0;
        let result = self.attempt(chart_id, &mut retry_count).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match &result {
            Ok(chart) => tracing::info!(
                chart_id,
                features = chart.feature_count(),
                retries = retry_count,
                duration_ms,
                "Chart loaded"
            ),
            Err(e) if e.is_cancelled() => {
                tracing::info!(chart_id, duration_ms, "Chart load cancelled")
            }
            Err(e) => tracing::warn!(
                chart_id,
                retries = retry_count,
                duration_ms,
                error = %e,
                "Chart load failed"
            ),
        }

        ChartLoadResult {
            chart_id: chart_id.to_string(),
            result: result.map(Arc::new),
            retry_count,
            duration_ms,
        }
    }

    async fn attempt(
        &self,
        chart_id: &str,
        retry_count: &mut u32,
    ) -> Result<LoadedChart, ChartLoadError> {
        let cancelled = || ChartLoadError::Cancelled {
            chart_id: chart_id.to_string(),
        };

        if self.cancellation.is_cancelled(chart_id) {
            return Err(cancelled());
        }

        let data = match self.source.extract(chart_id).await {
            Ok(Some(data)) => data,
            Ok(None) => {
                return Err(ChartLoadError::DataNotFound {
                    chart_id: chart_id.to_string(),
                })
            }
            Err(e) => {
                return Err(ChartLoadError::Extraction {
                    chart_id: chart_id.to_string(),
                    reason: e.to_string(),
                })
            }
        };
        tracing::debug!(chart_id, bytes = data.len(), "Extracted chart data");

        let content_hash = ContentHash::of(&data);
        self.integrity.check(chart_id, &content_hash)?;

        let parsed = loop {
            match self.parser.parse(chart_id, &data) {
                Ok(parsed) => break parsed,
                Err(e) => {
                    let Some(delay) = self.retry.delay(*retry_count) else {
                        return Err(ChartLoadError::Parsing {
                            chart_id: chart_id.to_string(),
                            retries: *retry_count,
                            reason: e.to_string(),
                        });
                    };
                    tracing::warn!(
                        chart_id,
                        retry = *retry_count + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Chart parse failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    if self.cancellation.is_cancelled(chart_id) {
                        return Err(cancelled());
                    }
                    *retry_count += 1;
                }
            }
        };

        self.integrity.pin(chart_id, content_hash)?;

        Ok(LoadedChart {
            chart_id: chart_id.to_string(),
            content_hash,
            size_bytes: data.len(),
            index: parsed.index,
            record_count: parsed.record_count,
            decode_errors: parsed.decode_errors,
            skipped: parsed.skipped,
        })
    }
}

impl fmt::Debug for ChartLoadPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChartLoadPipeline")
            .field("retry", &self.retry)
            .field("pinned", &self.integrity.len())
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::feature::{encode_chart, Attributes, Feature, FeatureType};
    use crate::geo::Coordinate;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// A small valid cell whose single wreck sits at (`lat`, `lon`).
    pub fn cell_at(lat: f64, lon: f64) -> Vec<u8> {
        let wreck = Feature::new(
            1,
            FeatureType::Wreck,
            vec![Coordinate::new(lat, lon)],
            Attributes::new(),
        )
        .unwrap();
        encode_chart([&wreck]).unwrap()
    }

    /// Fails the first `failures` parses, then delegates to [`EncParser`].
    #[derive(Default)]
    pub struct FlakyParser {
        pub failures: u32,
        pub calls: AtomicU32,
    }

    impl FlakyParser {
        pub fn new(failures: u32) -> Self {
            Self {
                failures,
                calls: AtomicU32::new(0),
            }
        }

        pub fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl ChartParser for FlakyParser {
        fn parse(&self, chart_id: &str, data: &[u8]) -> Result<ParsedChart, ParseError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                return Err(ParseError::Other(format!("transient failure {}", call + 1)));
            }
            EncParser::default().parse(chart_id, data)
        }
    }
}
