//! # chartkit - ENC Chart Library
//!
//! Decoding, indexing and loading of electronic navigational charts stored
//! as ISO 8211 files (S-57 `.000` base cells).
//!
//! ## Features
//!
//! - **Tolerant decoding**: Corrupt records are reported and skipped, the rest
//!   of the chart still loads
//! - **Spatial queries**: Features are indexed in a bulk-loaded tree (or a
//!   linear list) and queried by viewport or point
//! - **Integrity**: Every chart is hashed and pinned on first load; changed
//!   bytes are refused afterwards
//! - **Queued loading**: One chart loads at a time, with parse retries and
//!   cooperative cancellation
//!
//! ## Quick Start
//!
//! ```ignore
//! use chartkit::{Bounds, ChartServiceBuilder};
//!
//! let service = ChartServiceBuilder::new("/data/enc").build();
//!
//! let result = service.load_chart("US5MA10M").await?;
//! println!("{} features", result.chart().map_or(0, |c| c.feature_count()));
//!
//! for hit in service.query_point(42.35, -70.95, 0.01) {
//!     println!("{} {}", hit.chart_id, hit.feature.feature_type());
//! }
//! ```
//!
//! ## ISO 8211 Records
//!
//! Each record is a 24-byte leader, a directory of `(tag, length, position)`
//! entries and a field area:
//!
//! - **Leader**: record length (bytes 0..5), leader id `L` or `D` (byte 6),
//!   base address of the field area (bytes 8..13) and entry map (bytes 16..20)
//! - **Directory**: fixed-width entries terminated by `0x1E`
//! - **Fields**: each terminated by `0x1E`; the record ends with `0x1D`
//!
//! The first record of a chart is the data descriptive record; every other
//! record carrying an `FRID` field becomes a [`Feature`].

pub mod enc_file;
pub mod error;
pub mod feature;
pub mod filename;
pub mod geo;
pub mod index;
pub mod integrity;
pub mod iso8211;
pub mod pipeline;
pub mod queue;
pub mod service;
pub mod source;

#[cfg(feature = "geojson")]
pub mod geojson;

// Re-export main types at crate root for convenience
pub use enc_file::EncFile;
pub use error::{
    ChartError, ChartLoadError, DecodeError, EncodeError, FeatureError, ParseError, QueueError,
    Result,
};
pub use feature::{
    AttributeValue, Attributes, Feature, FeatureType, Geometry, GeometryKind,
};
pub use geo::{Bounds, Coordinate};
pub use index::{IndexKind, LinearIndex, SpatialIndex, TreeIndex};
pub use integrity::{ContentHash, IntegrityRegistry};
pub use pipeline::{
    CancellationRegistry, ChartLoadPipeline, ChartLoadResult, ChartParser, EncParser, LoadedChart,
    RetryPolicy,
};
pub use queue::{ChartLoadQueue, QueueEntry, QueueStatus};
pub use service::{
    CacheStats, ChartService, ChartServiceBuilder, ChartSummary, FeatureHit, PreloadStats,
};
pub use source::{ChartSource, DirectorySource, MemorySource};
