//! GeoJSON export of features.
//!
//! This module converts [`Feature`]s to RFC 7946 GeoJSON. Enable the
//! `geojson` feature to use this module.
//!
//! # Example
//!
//! ```ignore
//! use chartkit::geojson::features_to_collection;
//!
//! let chart = service.get_chart("US5MA10M").unwrap();
//! let collection = features_to_collection(chart.index.features());
//! println!("{}", collection);
//! ```

use geojson::{Feature as GeoJsonFeature, FeatureCollection, Geometry, JsonObject, JsonValue, Value};

use crate::feature::{AttributeValue, Feature, Geometry as FeatureGeometry};
use crate::geo::{Bounds, Coordinate};

/// Convert one feature to a GeoJSON feature.
///
/// Coordinates are written in GeoJSON order `[longitude, latitude]`; areas
/// become a polygon with a single exterior ring.
///
/// Properties:
/// - `feature_type`: the six-letter acronym
/// - `record_id`: the record id
/// - every text and number attribute under its own key
///
/// Byte attributes have no JSON form and are left out.
pub fn feature_to_geojson(feature: &Feature) -> GeoJsonFeature {
    let mut properties = JsonObject::new();
    properties.insert(
        "feature_type".to_string(),
        JsonValue::from(feature.feature_type().acronym()),
    );
    properties.insert("record_id".to_string(), JsonValue::from(feature.record_id()));

    for (key, value) in feature.attributes() {
        let json = match value {
            AttributeValue::Text(text) => JsonValue::from(text.as_str()),
            AttributeValue::Number(n) => JsonValue::from(*n),
            AttributeValue::Bytes(_) => continue,
        };
        properties.insert(key.clone(), json);
    }

    GeoJsonFeature {
        bbox: Some(bbox(&feature.bounds())),
        geometry: Some(Geometry::new(geometry_value(feature.geometry()))),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}

/// Convert features to a GeoJSON feature collection.
///
/// The collection's bounding box covers every feature; an empty input gives
/// an empty collection without one.
pub fn features_to_collection<'a>(
    features: impl IntoIterator<Item = &'a Feature>,
) -> FeatureCollection {
    let mut bounds: Option<Bounds> = None;
    let features: Vec<GeoJsonFeature> = features
        .into_iter()
        .map(|feature| {
            let b = feature.bounds();
            bounds = Some(bounds.map_or(b, |acc| acc.union(&b)));
            feature_to_geojson(feature)
        })
        .collect();

    FeatureCollection {
        bbox: bounds.as_ref().map(bbox),
        features,
        foreign_members: None,
    }
}

fn geometry_value(geometry: &FeatureGeometry) -> Value {
    match geometry {
        FeatureGeometry::Point(c) => Value::Point(position(c)),
        FeatureGeometry::Line(coords) => Value::LineString(coords.iter().map(position).collect()),
        FeatureGeometry::Area(ring) => Value::Polygon(vec![ring.iter().map(position).collect()]),
    }
}

fn position(c: &Coordinate) -> Vec<f64> {
    vec![c.longitude, c.latitude]
}

/// `[west, south, east, north]`
fn bbox(b: &Bounds) -> Vec<f64> {
    vec![b.west, b.south, b.east, b.north]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::{Attributes, FeatureType};

    fn light() -> Feature {
        let mut attributes = Attributes::new();
        attributes.insert("OBJNAM".to_string(), AttributeValue::Text("Boston Light".to_string()));
        attributes.insert("HEIGHT".to_string(), AttributeValue::Number(31.0));
        attributes.insert("XTRA".to_string(), AttributeValue::Bytes(vec![1, 2, 3]));
        Feature::new(
            7,
            FeatureType::Light,
            vec![Coordinate::new(42.328, -70.89)],
            attributes,
        )
        .unwrap()
    }

    #[test]
    fn test_point_feature() {
        let geo = feature_to_geojson(&light());

        match geo.geometry.unwrap().value {
            Value::Point(p) => assert_eq!(p, vec![-70.89, 42.328]),
            other => panic!("Expected Point geometry, got {:?}", other),
        }

        let props = geo.properties.unwrap();
        assert_eq!(props["feature_type"], JsonValue::from("LIGHTS"));
        assert_eq!(props["record_id"], JsonValue::from(7u64));
        assert_eq!(props["OBJNAM"], JsonValue::from("Boston Light"));
        assert_eq!(props["HEIGHT"], JsonValue::from(31.0));
        assert!(!props.contains_key("XTRA"));
    }

    #[test]
    fn test_area_is_single_ring_polygon() {
        let area = Feature::new(
            1,
            FeatureType::DepthArea,
            vec![
                Coordinate::new(0.0, 0.0),
                Coordinate::new(0.0, 1.0),
                Coordinate::new(1.0, 1.0),
            ],
            Attributes::new(),
        )
        .unwrap();

        match feature_to_geojson(&area).geometry.unwrap().value {
            Value::Polygon(rings) => {
                assert_eq!(rings.len(), 1);
                assert_eq!(rings[0].len(), 4);
                assert_eq!(rings[0][0], rings[0][3]);
                assert_eq!(rings[0][1], vec![1.0, 0.0]);
            }
            other => panic!("Expected Polygon geometry, got {:?}", other),
        }
    }

    #[test]
    fn test_collection_bbox() {
        let contour = Feature::new(
            2,
            FeatureType::DepthContour,
            vec![Coordinate::new(42.0, -71.0), Coordinate::new(42.5, -70.5)],
            Attributes::new(),
        )
        .unwrap();
        let features = vec![light(), contour];

        let collection = features_to_collection(&features);
        assert_eq!(collection.features.len(), 2);
        assert_eq!(collection.bbox, Some(vec![-71.0, 42.0, -70.5, 42.5]));

        let empty = features_to_collection(&Vec::<Feature>::new());
        assert!(empty.features.is_empty());
        assert_eq!(empty.bbox, None);
    }
}
