//! Spatial indexes over chart features.
//!
//! Two implementations share the [`SpatialIndex`] contract and return the
//! same sets for the same queries:
//!
//! - [`LinearIndex`]: scans every feature. The baseline.
//! - [`TreeIndex`]: a bulk-loaded bounding-box tree that prunes disjoint
//!   subtrees.
//!
//! Indexes are built once and read-only afterwards, so they can be shared
//! across threads behind an `Arc`.

mod linear;
mod tree;

use std::fmt;
use std::str::FromStr;

use crate::feature::Feature;
use crate::geo::Bounds;

pub use linear::LinearIndex;
pub use tree::{TreeIndex, DEFAULT_FANOUT, MAX_FANOUT, MIN_FANOUT};

/// Read-only spatial lookup over a set of features.
pub trait SpatialIndex: Send + Sync + fmt::Debug {
    /// Build an index owning `features`.
    fn build(features: Vec<Feature>) -> Self
    where
        Self: Sized;

    /// Features whose bounds intersect `bounds` (edges included).
    fn query_bounds(&self, bounds: &Bounds) -> Vec<&Feature>;

    /// Features intersecting the square of half-width `radius` degrees
    /// centred on (`latitude`, `longitude`).
    fn query_point(&self, latitude: f64, longitude: f64, radius: f64) -> Vec<&Feature> {
        self.query_bounds(&Bounds::around(latitude, longitude, radius))
    }

    /// Union of every indexed feature's bounds, or `None` when empty.
    fn calculate_bounds(&self) -> Option<Bounds>;

    /// Every indexed feature, in build order.
    fn features(&self) -> &[Feature];

    /// Number of indexed features.
    fn len(&self) -> usize {
        self.features().len()
    }

    /// Whether the index holds no features.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Which index implementation to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum IndexKind {
    /// [`LinearIndex`].
    Linear,
    /// [`TreeIndex`].
    #[default]
    Tree,
}

impl IndexKind {
    /// Build an index of this kind.
    pub fn build(self, features: Vec<Feature>) -> Box<dyn SpatialIndex> {
        match self {
            IndexKind::Linear => Box::new(LinearIndex::build(features)),
            IndexKind::Tree => Box::new(TreeIndex::build(features)),
        }
    }

    /// Lowercase name, as accepted by [`FromStr`].
    pub fn as_str(self) -> &'static str {
        match self {
            IndexKind::Linear => "linear",
            IndexKind::Tree => "tree",
        }
    }
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IndexKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "linear" => Ok(IndexKind::Linear),
            "tree" | "rtree" => Ok(IndexKind::Tree),
            other => Err(format!("unknown index kind {:?} (expected linear or tree)", other)),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::scattered_features;
    use super::*;
    use std::collections::BTreeSet;

    fn ids(features: Vec<&Feature>) -> BTreeSet<u64> {
        features.into_iter().map(Feature::record_id).collect()
    }

    #[test]
    fn test_index_kind_parse() {
        assert_eq!("tree".parse::<IndexKind>(), Ok(IndexKind::Tree));
        assert_eq!("Linear".parse::<IndexKind>(), Ok(IndexKind::Linear));
        assert!("quad".parse::<IndexKind>().is_err());
        assert_eq!(IndexKind::default(), IndexKind::Tree);
    }

    #[test]
    fn test_linear_and_tree_agree() {
        let features = scattered_features(2_000);
        let linear = IndexKind::Linear.build(features.clone());
        let tree = IndexKind::Tree.build(features);

        let queries = [
            Bounds::new(42.0, 41.0, -72.0, -73.0),
            Bounds::new(50.0, 40.0, -65.0, -75.0),
            Bounds::new(45.01, 44.99, -70.0, -70.02),
            Bounds::new(10.0, 0.0, 10.0, 0.0),
            Bounds::new(47.3, 43.1, -66.6, -71.9),
        ];
        for q in &queries {
            assert_eq!(ids(linear.query_bounds(q)), ids(tree.query_bounds(q)), "query {}", q);
        }

        for (lat, lon, r) in [(45.0, -70.0, 0.5), (41.2, -74.1, 0.05), (0.0, 0.0, 1.0)] {
            assert_eq!(
                ids(linear.query_point(lat, lon, r)),
                ids(tree.query_point(lat, lon, r))
            );
        }

        assert_eq!(linear.calculate_bounds(), tree.calculate_bounds());
        assert_eq!(linear.len(), tree.len());
    }

    #[test]
    fn test_empty_indexes() {
        for kind in [IndexKind::Linear, IndexKind::Tree] {
            let index = kind.build(Vec::new());
            assert!(index.is_empty());
            assert!(index.calculate_bounds().is_none());
            assert!(index
                .query_bounds(&Bounds::new(90.0, -90.0, 180.0, -180.0))
                .is_empty());
        }
    }
}
