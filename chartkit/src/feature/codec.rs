//! Mapping between ISO 8211 data records and [`Feature`]s.

use std::collections::HashSet;

use crate::error::{DecodeError, EncodeError, FeatureError};
use crate::geo::Coordinate;
use crate::iso8211::{Record, RecordBuilder, RecordReader, UNIT_SEPARATOR};

use super::{AttributeValue, Attributes, Feature, GeometryKind};

/// Field tags understood by the extractor.
pub mod tags {
    /// ASCII decimal record id.
    pub const RECORD_ID: &str = "0001";
    /// ASCII object acronym.
    pub const FEATURE_ID: &str = "FRID";
    /// 2-D coordinates: little-endian `i32` latitude, longitude, scaled by 1e7.
    pub const COORDINATES_2D: &str = "SG2D";
    /// 3-D coordinates: as [`COORDINATES_2D`] plus an `i32` depth scaled by 10.
    pub const COORDINATES_3D: &str = "SG3D";
    /// `KEY=VALUE` attribute pairs separated by the unit separator.
    pub const ATTRIBUTES: &str = "ATTF";
    /// As [`ATTRIBUTES`], but every value is text.
    pub const TEXT_ATTRIBUTES: &str = "ATXT";
    /// Field control tag of the definition record.
    pub const FIELD_CONTROL: &str = "0000";

    /// Attribute key that receives the depth of a single 3-D coordinate.
    pub const DEPTH_ATTRIBUTE: &str = "DEPTH";

    /// Tags with a fixed meaning; never stored as raw attributes.
    pub const RESERVED: [&str; 7] = [
        FIELD_CONTROL,
        RECORD_ID,
        FEATURE_ID,
        COORDINATES_2D,
        COORDINATES_3D,
        ATTRIBUTES,
        TEXT_ATTRIBUTES,
    ];
}

const COORD_SCALE: f64 = 1e7;
const DEPTH_SCALE: f64 = 10.0;

/// Result of decoding a whole chart.
#[derive(Debug, Default)]
pub struct DecodedChart {
    /// Features in record order.
    pub features: Vec<Feature>,
    /// Well-formed records, definition record included.
    pub record_count: usize,
    /// Whether the first well-formed record was the data descriptive record.
    pub has_descriptor: bool,
    /// Records the decoder had to skip.
    pub decode_errors: Vec<DecodeError>,
    /// Data records that decoded but could not become features.
    pub skipped: Vec<FeatureError>,
}

/// Decode every record in `data` and extract its features.
///
/// Neither corrupt records nor unusable features stop decoding; both are
/// collected in the result.
pub fn decode_chart(data: &[u8]) -> DecodedChart {
    let mut chart = DecodedChart::default();
    let mut seen_ids = HashSet::new();

    for item in RecordReader::new(data) {
        let record = match item {
            Ok(record) => record,
            Err(e) => {
                chart.decode_errors.push(e);
                continue;
            }
        };
        if chart.record_count == 0 {
            chart.has_descriptor = record.is_definition();
        }
        chart.record_count += 1;

        match extract_feature(&record) {
            Ok(Some(feature)) => {
                if seen_ids.insert(feature.record_id()) {
                    chart.features.push(feature);
                } else {
                    skip(&mut chart, FeatureError::DuplicateRecordId {
                        record_id: feature.record_id(),
                    });
                }
            }
            Ok(None) => {}
            Err(e) => skip(&mut chart, e),
        }
    }

    chart
}

fn skip(chart: &mut DecodedChart, error: FeatureError) {
    tracing::warn!(error = %error, "Skipping feature record");
    chart.skipped.push(error);
}

/// Turn a data record into a feature.
///
/// Returns `Ok(None)` for the definition record and for data records without
/// a `FRID` field.
pub fn extract_feature(record: &Record<'_>) -> Result<Option<Feature>, FeatureError> {
    if record.is_definition() {
        return Ok(None);
    }
    let Some(acronym) = record.field(tags::FEATURE_ID) else {
        return Ok(None);
    };
    let record_id = record
        .field(tags::RECORD_ID)
        .and_then(|raw| std::str::from_utf8(raw).ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .ok_or(FeatureError::MissingRecordId)?;
    let feature_type = super::FeatureType::from_acronym(&String::from_utf8_lossy(acronym));

    let mut coordinates = Vec::new();
    let mut depths = Vec::new();
    let mut attributes = Attributes::new();

    for field in record.fields() {
        match field.tag {
            tags::RECORD_ID | tags::FEATURE_ID => {}
            tags::COORDINATES_2D => {
                let tuples = tuples::<2>(record_id, field.tag, field.data)?;
                coordinates.extend(tuples.iter().map(|[lat, lon]| scaled(*lat, *lon)));
            }
            tags::COORDINATES_3D => {
                let tuples = tuples::<3>(record_id, field.tag, field.data)?;
                for [lat, lon, depth] in tuples {
                    coordinates.push(scaled(lat, lon));
                    depths.push(f64::from(depth) / DEPTH_SCALE);
                }
            }
            tags::ATTRIBUTES => {
                for (key, value) in attribute_pairs(field.data) {
                    attributes.insert(key, AttributeValue::parse(&value));
                }
            }
            tags::TEXT_ATTRIBUTES => {
                for (key, value) in attribute_pairs(field.data) {
                    attributes.insert(key, AttributeValue::Text(value));
                }
            }
            tag => {
                attributes
                    .entry(tag.to_string())
                    .or_insert_with(|| AttributeValue::Bytes(field.data.to_vec()));
            }
        }
    }

    if let ([_], [depth]) = (coordinates.as_slice(), depths.as_slice()) {
        attributes.insert(
            tags::DEPTH_ATTRIBUTE.to_string(),
            AttributeValue::Number(*depth),
        );
    }

    Feature::new(record_id, feature_type, coordinates, attributes).map(Some)
}

fn attribute_pairs(data: &[u8]) -> impl Iterator<Item = (String, String)> + '_ {
    data.split(|b| *b == UNIT_SEPARATOR)
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let pair = String::from_utf8_lossy(pair);
            let (key, value) = pair.split_once('=').unwrap_or((pair.as_ref(), ""));
            (key.trim().to_string(), value.to_string())
        })
}

fn tuples<const N: usize>(record_id: u64, tag: &str, data: &[u8]) -> Result<Vec<[i32; N]>, FeatureError> {
    let width = N * 4;
    if data.len() % width != 0 {
        return Err(FeatureError::CoordinateField {
            record_id,
            tag: tag.to_string(),
            len: data.len(),
        });
    }
    Ok(data
        .chunks_exact(width)
        .map(|chunk| {
            let mut tuple = [0i32; N];
            for (value, bytes) in tuple.iter_mut().zip(chunk.chunks_exact(4)) {
                *value = i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
            }
            tuple
        })
        .collect())
}

fn scaled(lat: i32, lon: i32) -> Coordinate {
    Coordinate::new(f64::from(lat) / COORD_SCALE, f64::from(lon) / COORD_SCALE)
}

fn unscaled(value: f64, scale: f64) -> [u8; 4] {
    ((value * scale).round() as i32).to_le_bytes()
}

/// Encode a feature as a data record.
///
/// Numbers go to `ATTF` and text to `ATXT`, so text that looks numeric
/// stays text. A point whose numeric `DEPTH` survives the x10 scaling is
/// written as `SG3D` and the depth is not repeated in `ATTF`. Byte
/// attributes are written as fields named by their key, which must be a
/// four-character tag.
pub fn encode_feature(feature: &Feature) -> Result<Vec<u8>, EncodeError> {
    let mut builder = RecordBuilder::data()
        .field(b"0001", feature.record_id().to_string())
        .field(b"FRID", feature.feature_type().acronym());

    let depth = match feature.geometry_kind() {
        GeometryKind::Point => feature
            .attribute(tags::DEPTH_ATTRIBUTE)
            .and_then(AttributeValue::as_number)
            .filter(|depth| exact_depth(*depth)),
        _ => None,
    };

    let mut coords = Vec::with_capacity(feature.coordinates().len() * 12);
    for c in feature.coordinates() {
        coords.extend_from_slice(&unscaled(c.latitude, COORD_SCALE));
        coords.extend_from_slice(&unscaled(c.longitude, COORD_SCALE));
        if let Some(depth) = depth {
            coords.extend_from_slice(&unscaled(depth, DEPTH_SCALE));
        }
    }
    let coord_tag = if depth.is_some() { b"SG3D" } else { b"SG2D" };
    builder.push_field(coord_tag, coords);

    let mut numbers: Vec<u8> = Vec::new();
    let mut texts: Vec<u8> = Vec::new();
    let mut raw_fields = Vec::new();
    for (key, value) in feature.attributes() {
        if depth.is_some() && key == tags::DEPTH_ATTRIBUTE {
            continue;
        }
        match value {
            AttributeValue::Bytes(bytes) => raw_fields.push((raw_tag(key)?, bytes)),
            AttributeValue::Number(n) => push_pair(&mut numbers, key, &n.to_string())?,
            AttributeValue::Text(text) => push_pair(&mut texts, key, text)?,
        }
    }
    if !numbers.is_empty() {
        builder.push_field(b"ATTF", numbers);
    }
    if !texts.is_empty() {
        builder.push_field(b"ATXT", texts);
    }
    for (tag, bytes) in raw_fields {
        builder.push_field(&tag, bytes);
    }

    builder.build()
}

/// Whether `depth` decodes back to itself after the x10 scaling.
fn exact_depth(depth: f64) -> bool {
    let scaled = i32::from_le_bytes(unscaled(depth, DEPTH_SCALE));
    f64::from(scaled) / DEPTH_SCALE == depth
}

fn push_pair(out: &mut Vec<u8>, key: &str, value: &str) -> Result<(), EncodeError> {
    let separator = char::from(UNIT_SEPARATOR);
    if key.is_empty() || key.trim() != key || key.contains(['=', separator]) || value.contains(separator) {
        return Err(EncodeError::InvalidAttribute {
            key: key.to_string(),
        });
    }
    if !out.is_empty() {
        out.push(UNIT_SEPARATOR);
    }
    out.extend_from_slice(key.as_bytes());
    out.push(b'=');
    out.extend_from_slice(value.as_bytes());
    Ok(())
}

fn raw_tag(key: &str) -> Result<[u8; 4], EncodeError> {
    let invalid = || EncodeError::InvalidTag {
        tag: key.to_string(),
    };
    if tags::RESERVED.contains(&key) {
        return Err(invalid());
    }
    key.as_bytes().try_into().map_err(|_| invalid())
}

/// Encode a chart: a data descriptive record followed by one data record
/// per feature.
pub fn encode_chart<'a>(features: impl IntoIterator<Item = &'a Feature>) -> Result<Vec<u8>, EncodeError> {
    let mut out = RecordBuilder::definition()
        .field(b"0000", "0000;&")
        .field(b"0001", "0100;&RECORD IDENTIFIER")
        .field(b"FRID", "1600;&FEATURE RECORD IDENTIFIER FIELD")
        .field(b"SG2D", "2600;&2-D COORDINATE FIELD")
        .field(b"SG3D", "2600;&3-D COORDINATE (SOUNDING ARRAY) FIELD")
        .field(b"ATTF", "1600;&FEATURE RECORD ATTRIBUTE FIELD")
        .field(b"ATXT", "1600;&FEATURE RECORD TEXT ATTRIBUTE FIELD")
        .build()?;
    for feature in features {
        out.extend(encode_feature(feature)?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::FeatureType;

    fn coord_bytes(points: &[(i32, i32)]) -> Vec<u8> {
        points
            .iter()
            .flat_map(|(lat, lon)| lat.to_le_bytes().into_iter().chain(lon.to_le_bytes()))
            .collect()
    }

    fn record(bytes: &[u8]) -> Record<'_> {
        RecordReader::new(bytes).next().unwrap().unwrap()
    }

    #[test]
    fn test_extract_point_with_attributes() {
        let attf = b"OBJNAM=Boston Light\x1fHEIGHT=31.4".to_vec();
        let bytes = RecordBuilder::data()
            .field(b"0001", "17")
            .field(b"FRID", "LIGHTS")
            .field(b"SG2D", coord_bytes(&[(423_277_000, -708_901_000)]))
            .field(b"ATTF", attf)
            .field(b"NATF", [0xC3, 0xA9])
            .build()
            .unwrap();

        let feature = extract_feature(&record(&bytes)).unwrap().unwrap();
        assert_eq!(feature.record_id(), 17);
        assert_eq!(feature.feature_type(), &FeatureType::Light);
        assert_eq!(feature.coordinates(), &[Coordinate::new(42.3277, -70.8901)]);
        assert_eq!(
            feature.attribute("OBJNAM"),
            Some(&AttributeValue::Text("Boston Light".to_string()))
        );
        assert_eq!(feature.attribute("HEIGHT"), Some(&AttributeValue::Number(31.4)));
        assert_eq!(
            feature.attribute("NATF"),
            Some(&AttributeValue::Bytes(vec![0xC3, 0xA9]))
        );
    }

    #[test]
    fn test_sounding_depth() {
        let mut sg3d = coord_bytes(&[(420_000_000, -700_000_000)]);
        sg3d.extend_from_slice(&125i32.to_le_bytes());
        let bytes = RecordBuilder::data()
            .field(b"0001", "3")
            .field(b"FRID", "SOUNDG")
            .field(b"SG3D", sg3d)
            .build()
            .unwrap();

        let feature = extract_feature(&record(&bytes)).unwrap().unwrap();
        assert_eq!(feature.feature_type(), &FeatureType::Sounding);
        assert_eq!(feature.attribute("DEPTH"), Some(&AttributeValue::Number(12.5)));
    }

    #[test]
    fn test_records_without_frid_are_not_features() {
        let ddr = RecordBuilder::definition()
            .field(b"0000", "0000;&")
            .build()
            .unwrap();
        assert!(extract_feature(&record(&ddr)).unwrap().is_none());

        let bytes = RecordBuilder::data().field(b"0001", "1").build().unwrap();
        assert!(extract_feature(&record(&bytes)).unwrap().is_none());
    }

    #[test]
    fn test_bad_coordinate_field() {
        let bytes = RecordBuilder::data()
            .field(b"0001", "9")
            .field(b"FRID", "WRECKS")
            .field(b"SG2D", [0u8; 7])
            .build()
            .unwrap();
        let err = extract_feature(&record(&bytes)).unwrap_err();
        assert!(matches!(err, FeatureError::CoordinateField { record_id: 9, len: 7, .. }));
    }

    #[test]
    fn test_missing_record_id() {
        let bytes = RecordBuilder::data()
            .field(b"FRID", "WRECKS")
            .field(b"SG2D", coord_bytes(&[(0, 0)]))
            .build()
            .unwrap();
        assert_eq!(
            extract_feature(&record(&bytes)).unwrap_err(),
            FeatureError::MissingRecordId
        );
    }

    fn sample_features() -> Vec<Feature> {
        let mut light = Attributes::new();
        light.insert("OBJNAM".into(), AttributeValue::Text("Graves Light".into()));
        light.insert("VALNMR".into(), AttributeValue::Number(24.0));

        let mut sounding = Attributes::new();
        sounding.insert("DEPTH".into(), AttributeValue::Number(7.3));

        let mut area = Attributes::new();
        area.insert("DRVAL1".into(), AttributeValue::Number(5.0));
        area.insert("NATF".into(), AttributeValue::Bytes(vec![1, 2, 3]));

        vec![
            Feature::new(1, FeatureType::Light, vec![Coordinate::new(42.3650, -70.8694)], light)
                .unwrap(),
            Feature::new(
                2,
                FeatureType::Sounding,
                vec![Coordinate::new(42.3401, -70.9512)],
                sounding,
            )
            .unwrap(),
            Feature::new(
                3,
                FeatureType::DepthContour,
                vec![Coordinate::new(42.30, -71.00), Coordinate::new(42.31, -70.99)],
                Attributes::new(),
            )
            .unwrap(),
            Feature::new(
                4,
                FeatureType::DepthArea,
                vec![
                    Coordinate::new(42.30, -71.00),
                    Coordinate::new(42.30, -70.90),
                    Coordinate::new(42.40, -70.90),
                ],
                area,
            )
            .unwrap(),
            Feature::new(
                5,
                FeatureType::Other("PILPNT".into()),
                vec![Coordinate::new(42.3550, -71.0490)],
                Attributes::new(),
            )
            .unwrap(),
        ]
    }

    #[test]
    fn test_chart_round_trip() {
        let features = sample_features();
        let bytes = encode_chart(&features).unwrap();

        let chart = decode_chart(&bytes);
        assert!(chart.has_descriptor);
        assert_eq!(chart.record_count, features.len() + 1);
        assert!(chart.decode_errors.is_empty());
        assert!(chart.skipped.is_empty());
        assert_eq!(chart.features, features);
    }

    #[test]
    fn test_numeric_looking_text_stays_text() {
        let mut attrs = Attributes::new();
        attrs.insert("OBJNAM".into(), AttributeValue::Text("42".into()));
        attrs.insert("INFORM".into(), AttributeValue::Text(" 1.5e3 ".into()));
        attrs.insert("VALNMR".into(), AttributeValue::Number(42.0));
        let light =
            Feature::new(1, FeatureType::Light, vec![Coordinate::new(42.0, -70.0)], attrs).unwrap();

        let chart = decode_chart(&encode_chart([&light]).unwrap());
        assert_eq!(chart.features, vec![light]);
    }

    #[test]
    fn test_inexact_depth_falls_back_to_attributes() {
        let sounding = |depth: f64| {
            let mut attrs = Attributes::new();
            attrs.insert("DEPTH".into(), AttributeValue::Number(depth));
            Feature::new(1, FeatureType::Sounding, vec![Coordinate::new(42.0, -70.0)], attrs)
                .unwrap()
        };

        let fine = sounding(7.35);
        let bytes = encode_feature(&fine).unwrap();
        let rec = record(&bytes);
        assert!(rec.field("SG3D").is_none());
        assert!(rec.field("SG2D").is_some());
        assert_eq!(extract_feature(&rec).unwrap().unwrap(), fine);

        let coarse = sounding(7.4);
        let bytes = encode_feature(&coarse).unwrap();
        assert!(record(&bytes).field("SG3D").is_some());
        assert_eq!(extract_feature(&record(&bytes)).unwrap().unwrap(), coarse);
    }

    #[test]
    fn test_attribute_separator_is_rejected() {
        let mut attrs = Attributes::new();
        attrs.insert("OBJNAM".into(), AttributeValue::Text("a\u{1f}b".into()));
        let f = Feature::new(9, FeatureType::Wreck, vec![Coordinate::new(0.0, 0.0)], attrs).unwrap();
        assert_eq!(
            encode_feature(&f),
            Err(EncodeError::InvalidAttribute {
                key: "OBJNAM".to_string()
            })
        );
    }

    #[test]
    fn test_corrupt_record_skips_only_that_feature() {
        let features = sample_features();
        let ddr_len = encode_chart(std::iter::empty()).unwrap().len();
        let mut bytes = encode_chart(&features).unwrap();

        // Corrupt the base address of the second data record.
        let second = ddr_len + encode_feature(&features[0]).unwrap().len();
        bytes[second + 12] = b'X';

        let chart = decode_chart(&bytes);
        assert_eq!(chart.decode_errors.len(), 1);
        assert_eq!(chart.features.len(), features.len() - 1);
        assert!(chart.features.iter().all(|f| f.record_id() != 2));
    }

    #[test]
    fn test_duplicate_record_id_is_skipped() {
        let features = sample_features();
        let mut bytes = encode_chart(&features[..1]).unwrap();
        bytes.extend(encode_feature(&features[0]).unwrap());

        let chart = decode_chart(&bytes);
        assert_eq!(chart.features.len(), 1);
        assert_eq!(
            chart.skipped,
            vec![FeatureError::DuplicateRecordId { record_id: 1 }]
        );
    }

    #[test]
    fn test_reserved_byte_attribute_is_rejected() {
        let mut attrs = Attributes::new();
        attrs.insert("SG2D".into(), AttributeValue::Bytes(vec![0]));
        let f = Feature::new(9, FeatureType::Wreck, vec![Coordinate::new(0.0, 0.0)], attrs).unwrap();
        assert!(matches!(encode_feature(&f), Err(EncodeError::InvalidTag { .. })));
    }
}
