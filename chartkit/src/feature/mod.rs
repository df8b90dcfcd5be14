//! Typed maritime features.
//!
//! A [`Feature`] is built once from a decoded data record and never changes
//! afterwards. Its geometry is a closed variant ([`Geometry`]) whose shape is
//! decided by the [`FeatureType`]: areas are closed rings, contours and
//! coastlines are open lines, aids to navigation and soundings are points.

mod codec;

use std::collections::BTreeMap;
use std::fmt;

use crate::error::FeatureError;
use crate::geo::{Bounds, Coordinate};

pub use codec::{decode_chart, encode_chart, encode_feature, extract_feature, tags, DecodedChart};

/// Geometry shape of a feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeometryKind {
    /// A single position.
    Point,
    /// An open polyline of two or more positions.
    Line,
    /// A closed ring of four or more positions (first equals last).
    Area,
}

impl fmt::Display for GeometryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            GeometryKind::Point => "point",
            GeometryKind::Line => "line",
            GeometryKind::Area => "area",
        })
    }
}

/// Feature geometry.
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    /// A single position.
    Point(Coordinate),
    /// An open polyline.
    Line(Vec<Coordinate>),
    /// A closed ring.
    Area(Vec<Coordinate>),
}

impl Geometry {
    /// Shape of this geometry.
    pub fn kind(&self) -> GeometryKind {
        match self {
            Geometry::Point(_) => GeometryKind::Point,
            Geometry::Line(_) => GeometryKind::Line,
            Geometry::Area(_) => GeometryKind::Area,
        }
    }

    /// Coordinates in order. A point yields one.
    pub fn coordinates(&self) -> &[Coordinate] {
        match self {
            Geometry::Point(c) => std::slice::from_ref(c),
            Geometry::Line(cs) | Geometry::Area(cs) => cs,
        }
    }

    /// Bounding rectangle of all coordinates.
    pub fn bounds(&self) -> Bounds {
        match self {
            Geometry::Point(c) => Bounds::from_point(*c),
            // Constructors guarantee at least two coordinates.
            Geometry::Line(cs) | Geometry::Area(cs) => Bounds::from_coordinates(cs)
                .unwrap_or_else(|| Bounds::new(0.0, 0.0, 0.0, 0.0)),
        }
    }
}

/// Object classes understood by the extractor.
///
/// Acronyms follow the S-57 object catalogue. Anything else is kept as
/// [`FeatureType::Other`] with its acronym.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FeatureType {
    /// `SOUNDG`
    Sounding,
    /// `BOYLAT`
    LateralBuoy,
    /// `BOYCAR`
    CardinalBuoy,
    /// `BCNCAR`
    CardinalBeacon,
    /// `BCNLAT`
    LateralBeacon,
    /// `LIGHTS`
    Light,
    /// `LNDMRK`
    Landmark,
    /// `WRECKS`
    Wreck,
    /// `OBSTRN`
    Obstruction,
    /// `UWTROC`
    UnderwaterRock,
    /// `DEPCNT`
    DepthContour,
    /// `COALNE`
    Coastline,
    /// `NAVLNE`
    NavigationLine,
    /// `DEPARE`
    DepthArea,
    /// `LNDARE`
    LandArea,
    /// `RESARE`
    RestrictedArea,
    /// `ACHARE`
    AnchorageArea,
    /// `DRGARE`
    DredgedArea,
    /// Any other object class, by acronym.
    Other(String),
}

impl FeatureType {
    /// Every known (non-`Other`) feature type.
    pub const KNOWN: [FeatureType; 18] = [
        FeatureType::Sounding,
        FeatureType::LateralBuoy,
        FeatureType::CardinalBuoy,
        FeatureType::CardinalBeacon,
        FeatureType::LateralBeacon,
        FeatureType::Light,
        FeatureType::Landmark,
        FeatureType::Wreck,
        FeatureType::Obstruction,
        FeatureType::UnderwaterRock,
        FeatureType::DepthContour,
        FeatureType::Coastline,
        FeatureType::NavigationLine,
        FeatureType::DepthArea,
        FeatureType::LandArea,
        FeatureType::RestrictedArea,
        FeatureType::AnchorageArea,
        FeatureType::DredgedArea,
    ];

    /// Look up a feature type by its object acronym (case-insensitive).
    pub fn from_acronym(acronym: &str) -> Self {
        let acronym = acronym.trim().to_ascii_uppercase();
        Self::KNOWN
            .iter()
            .find(|t| t.acronym() == acronym)
            .cloned()
            .unwrap_or(FeatureType::Other(acronym))
    }

    /// The object acronym.
    pub fn acronym(&self) -> &str {
        match self {
            FeatureType::Sounding => "SOUNDG",
            FeatureType::LateralBuoy => "BOYLAT",
            FeatureType::CardinalBuoy => "BOYCAR",
            FeatureType::CardinalBeacon => "BCNCAR",
            FeatureType::LateralBeacon => "BCNLAT",
            FeatureType::Light => "LIGHTS",
            FeatureType::Landmark => "LNDMRK",
            FeatureType::Wreck => "WRECKS",
            FeatureType::Obstruction => "OBSTRN",
            FeatureType::UnderwaterRock => "UWTROC",
            FeatureType::DepthContour => "DEPCNT",
            FeatureType::Coastline => "COALNE",
            FeatureType::NavigationLine => "NAVLNE",
            FeatureType::DepthArea => "DEPARE",
            FeatureType::LandArea => "LNDARE",
            FeatureType::RestrictedArea => "RESARE",
            FeatureType::AnchorageArea => "ACHARE",
            FeatureType::DredgedArea => "DRGARE",
            FeatureType::Other(acronym) => acronym,
        }
    }

    /// Geometry this type always has, or `None` for [`FeatureType::Other`].
    pub fn geometry_kind(&self) -> Option<GeometryKind> {
        use FeatureType::*;
        match self {
            Sounding | LateralBuoy | CardinalBuoy | CardinalBeacon | LateralBeacon | Light
            | Landmark | Wreck | Obstruction | UnderwaterRock => Some(GeometryKind::Point),
            DepthContour | Coastline | NavigationLine => Some(GeometryKind::Line),
            DepthArea | LandArea | RestrictedArea | AnchorageArea | DredgedArea => {
                Some(GeometryKind::Area)
            }
            Other(_) => None,
        }
    }
}

impl fmt::Display for FeatureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.acronym())
    }
}

/// A captured attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    /// Free text.
    Text(String),
    /// A value that parsed as a number.
    Number(f64),
    /// An unrecognized field, kept verbatim.
    Bytes(Vec<u8>),
}

impl AttributeValue {
    /// Parse a textual attribute value, preferring a number when it parses.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().parse::<f64>() {
            Ok(n) if n.is_finite() && !raw.trim().is_empty() => AttributeValue::Number(n),
            _ => AttributeValue::Text(raw.to_string()),
        }
    }

    /// The text, if this is a text value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttributeValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// The number, if this is a numeric value.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            AttributeValue::Number(n) => Some(*n),
            _ => None,
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Text(s) => f.write_str(s),
            AttributeValue::Number(n) => write!(f, "{}", n),
            AttributeValue::Bytes(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

/// Attribute registry, ordered by key.
pub type Attributes = BTreeMap<String, AttributeValue>;

/// An immutable maritime feature.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    record_id: u64,
    feature_type: FeatureType,
    geometry: Geometry,
    attributes: Attributes,
    bounds: Bounds,
}

impl Feature {
    /// Build a feature, shaping `coordinates` into the geometry its type needs.
    ///
    /// Area rings that are not closed get their first coordinate repeated at
    /// the end. For [`FeatureType::Other`] the shape follows the coordinates:
    /// one is a point, a closed ring of four or more is an area, anything
    /// else with two or more is a line.
    ///
    /// # Errors
    ///
    /// Returns an error if a coordinate is out of range or there are too few
    /// coordinates for the geometry.
    pub fn new(
        record_id: u64,
        feature_type: FeatureType,
        coordinates: Vec<Coordinate>,
        attributes: Attributes,
    ) -> Result<Self, FeatureError> {
        if let Some(bad) = coordinates.iter().find(|c| !c.is_valid()) {
            return Err(FeatureError::CoordinateOutOfRange {
                record_id,
                latitude: bad.latitude,
                longitude: bad.longitude,
            });
        }

        let invalid = |reason: String| FeatureError::InvalidGeometry { record_id, reason };
        let geometry = match feature_type.geometry_kind() {
            Some(GeometryKind::Point) => match coordinates.as_slice() {
                [single] => Geometry::Point(*single),
                other => {
                    return Err(invalid(format!(
                        "{} needs exactly one coordinate, got {}",
                        feature_type,
                        other.len()
                    )))
                }
            },
            Some(GeometryKind::Line) => {
                if coordinates.len() < 2 {
                    return Err(invalid(format!(
                        "{} needs at least two coordinates, got {}",
                        feature_type,
                        coordinates.len()
                    )));
                }
                Geometry::Line(coordinates)
            }
            Some(GeometryKind::Area) => Geometry::Area(close_ring(record_id, coordinates)?),
            None => match coordinates.len() {
                0 => return Err(invalid(format!("{} has no coordinates", feature_type))),
                1 => Geometry::Point(coordinates[0]),
                n if n >= 4 && is_closed(&coordinates) => Geometry::Area(coordinates),
                _ => Geometry::Line(coordinates),
            },
        };

        let bounds = geometry.bounds();
        Ok(Self {
            record_id,
            feature_type,
            geometry,
            attributes,
            bounds,
        })
    }

    /// Record id, unique within a chart.
    pub fn record_id(&self) -> u64 {
        self.record_id
    }

    /// Object class.
    pub fn feature_type(&self) -> &FeatureType {
        &self.feature_type
    }

    /// Geometry.
    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// Shape of the geometry.
    pub fn geometry_kind(&self) -> GeometryKind {
        self.geometry.kind()
    }

    /// Coordinates in order.
    pub fn coordinates(&self) -> &[Coordinate] {
        self.geometry.coordinates()
    }

    /// Attribute registry.
    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// Attribute by key.
    pub fn attribute(&self, key: &str) -> Option<&AttributeValue> {
        self.attributes.get(key)
    }

    /// Bounding rectangle of the geometry.
    pub fn bounds(&self) -> Bounds {
        self.bounds
    }
}

fn is_closed(coords: &[Coordinate]) -> bool {
    matches!((coords.first(), coords.last()), (Some(a), Some(b)) if a == b)
}

fn close_ring(record_id: u64, mut coords: Vec<Coordinate>) -> Result<Vec<Coordinate>, FeatureError> {
    if coords.len() >= 3 && !is_closed(&coords) {
        coords.push(coords[0]);
    }
    if coords.len() < 4 || !is_closed(&coords) {
        return Err(FeatureError::InvalidGeometry {
            record_id,
            reason: format!("area ring needs at least four coordinates, got {}", coords.len()),
        });
    }
    Ok(coords)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(lat: f64, lon: f64) -> Coordinate {
        Coordinate::new(lat, lon)
    }

    #[test]
    fn test_acronym_lookup() {
        assert_eq!(FeatureType::from_acronym("BCNCAR"), FeatureType::CardinalBeacon);
        assert_eq!(FeatureType::from_acronym("soundg"), FeatureType::Sounding);
        assert_eq!(
            FeatureType::from_acronym("PILPNT"),
            FeatureType::Other("PILPNT".to_string())
        );
        for t in FeatureType::KNOWN.iter() {
            assert_eq!(&FeatureType::from_acronym(t.acronym()), t);
        }
    }

    #[test]
    fn test_point_feature() {
        let f = Feature::new(1, FeatureType::Wreck, vec![c(42.0, -70.0)], Attributes::new())
            .unwrap();
        assert_eq!(f.geometry_kind(), GeometryKind::Point);
        assert_eq!(f.bounds(), Bounds::new(42.0, 42.0, -70.0, -70.0));

        let err = Feature::new(
            1,
            FeatureType::Wreck,
            vec![c(42.0, -70.0), c(42.1, -70.1)],
            Attributes::new(),
        );
        assert!(matches!(err, Err(FeatureError::InvalidGeometry { .. })));
    }

    #[test]
    fn test_line_feature() {
        let f = Feature::new(
            2,
            FeatureType::DepthContour,
            vec![c(0.0, 0.0), c(1.0, 1.0)],
            Attributes::new(),
        )
        .unwrap();
        assert_eq!(f.geometry_kind(), GeometryKind::Line);

        let err = Feature::new(2, FeatureType::Coastline, vec![c(0.0, 0.0)], Attributes::new());
        assert!(err.is_err());
    }

    #[test]
    fn test_area_ring_is_closed() {
        let f = Feature::new(
            3,
            FeatureType::DepthArea,
            vec![c(0.0, 0.0), c(0.0, 1.0), c(1.0, 1.0)],
            Attributes::new(),
        )
        .unwrap();
        assert_eq!(f.geometry_kind(), GeometryKind::Area);
        assert_eq!(f.coordinates().len(), 4);
        assert_eq!(f.coordinates().first(), f.coordinates().last());

        let err = Feature::new(
            3,
            FeatureType::LandArea,
            vec![c(0.0, 0.0), c(0.0, 1.0)],
            Attributes::new(),
        );
        assert!(err.is_err());
    }

    #[test]
    fn test_other_type_infers_shape() {
        let other = || FeatureType::Other("PILPNT".to_string());
        let p = Feature::new(4, other(), vec![c(1.0, 1.0)], Attributes::new()).unwrap();
        assert_eq!(p.geometry_kind(), GeometryKind::Point);

        let ring = vec![c(0.0, 0.0), c(0.0, 1.0), c(1.0, 1.0), c(0.0, 0.0)];
        let a = Feature::new(5, other(), ring, Attributes::new()).unwrap();
        assert_eq!(a.geometry_kind(), GeometryKind::Area);

        let l = Feature::new(6, other(), vec![c(0.0, 0.0), c(0.0, 1.0), c(1.0, 1.0)], Attributes::new())
            .unwrap();
        assert_eq!(l.geometry_kind(), GeometryKind::Line);

        assert!(Feature::new(7, other(), vec![], Attributes::new()).is_err());
    }

    #[test]
    fn test_out_of_range_coordinate() {
        let err = Feature::new(8, FeatureType::Light, vec![c(95.0, 0.0)], Attributes::new());
        assert!(matches!(err, Err(FeatureError::CoordinateOutOfRange { record_id: 8, .. })));
    }

    #[test]
    fn test_attribute_value_parse() {
        assert_eq!(AttributeValue::parse("12.5"), AttributeValue::Number(12.5));
        assert_eq!(
            AttributeValue::parse("Boston Light"),
            AttributeValue::Text("Boston Light".to_string())
        );
        assert_eq!(AttributeValue::parse(""), AttributeValue::Text(String::new()));
        assert_eq!(AttributeValue::parse("inf"), AttributeValue::Text("inf".to_string()));
    }
}
