use crate::feature::Feature;
use crate::geo::Bounds;

use super::SpatialIndex;

/// Baseline index: every query scans every feature.
#[derive(Debug, Clone, Default)]
pub struct LinearIndex {
    features: Vec<Feature>,
    bounds: Option<Bounds>,
}

impl SpatialIndex for LinearIndex {
    fn build(features: Vec<Feature>) -> Self {
        let bounds = features
            .iter()
            .map(Feature::bounds)
            .reduce(|acc, b| acc.union(&b));
        Self { features, bounds }
    }

    fn query_bounds(&self, bounds: &Bounds) -> Vec<&Feature> {
        self.features
            .iter()
            .filter(|f| f.bounds().intersects(bounds))
            .collect()
    }

    fn calculate_bounds(&self) -> Option<Bounds> {
        self.bounds
    }

    fn features(&self) -> &[Feature] {
        &self.features
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::{Attributes, FeatureType};
    use crate::geo::Coordinate;

    #[test]
    fn test_scan() {
        let features = vec![
            Feature::new(1, FeatureType::Light, vec![Coordinate::new(1.0, 1.0)], Attributes::new())
                .unwrap(),
            Feature::new(2, FeatureType::Light, vec![Coordinate::new(5.0, 5.0)], Attributes::new())
                .unwrap(),
        ];
        let index = LinearIndex::build(features);

        let hits = index.query_bounds(&Bounds::new(2.0, 0.0, 2.0, 0.0));
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].record_id(), 1);

        assert_eq!(index.query_point(5.0, 5.0, 0.0).len(), 1);
        assert_eq!(
            index.calculate_bounds(),
            Some(Bounds::new(5.0, 1.0, 5.0, 1.0))
        );
    }
}
