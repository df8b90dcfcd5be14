//! ENC cell filename utilities.
//!
//! Charts are identified by their cell name. On disk a cell `ID` may be
//! stored as:
//!
//! - `ID.000`: the base cell, raw ISO 8211
//! - `ID.000.gz`: the base cell, gzip-compressed
//! - `ID.zip`: a zip archive holding `ID.000`
//!
//! # Cell Name Format
//!
//! S-57 cell names are 8 characters: `{producer:2}{band:1}{code:5}`, e.g.
//! `US5MA10M` is a harbour (band 5) cell produced by NOAA (`US`).

use std::fmt;

/// Extension of a base cell.
pub const BASE_CELL_EXTENSION: &str = "000";

/// Longest accepted chart id.
pub const MAX_CHART_ID_LEN: usize = 64;

/// Whether `chart_id` can safely name a cell file.
///
/// Accepts ASCII letters, digits, `_` and `-`, up to [`MAX_CHART_ID_LEN`]
/// characters. Path separators and dots are never accepted.
///
/// # Examples
///
/// ```
/// use chartkit::filename::is_valid_chart_id;
///
/// assert!(is_valid_chart_id("US5MA10M"));
/// assert!(!is_valid_chart_id("../US5MA10M"));
/// assert!(!is_valid_chart_id(""));
/// ```
pub fn is_valid_chart_id(chart_id: &str) -> bool {
    !chart_id.is_empty()
        && chart_id.len() <= MAX_CHART_ID_LEN
        && chart_id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

/// Convert a chart id to its base cell filename.
///
/// # Examples
///
/// ```
/// use chartkit::filename::chart_id_to_filename;
///
/// assert_eq!(chart_id_to_filename("US5MA10M"), "US5MA10M.000");
/// ```
pub fn chart_id_to_filename(chart_id: &str) -> String {
    format!("{}.{}", chart_id, BASE_CELL_EXTENSION)
}

/// Extract the chart id from a cell filename.
///
/// # Arguments
///
/// * `filename` - The filename, with or without a path. `.000`, `.000.gz`
///   and `.zip` are recognised, in any letter case.
///
/// # Returns
///
/// The chart id, or `None` if the name is not a cell file.
///
/// # Examples
///
/// ```
/// use chartkit::filename::filename_to_chart_id;
///
/// assert_eq!(filename_to_chart_id("US5MA10M.000"), Some("US5MA10M".to_string()));
/// assert_eq!(filename_to_chart_id("/data/enc/US5MA10M.zip"), Some("US5MA10M".to_string()));
/// assert_eq!(filename_to_chart_id("US5MA10M.000.gz"), Some("US5MA10M".to_string()));
/// assert_eq!(filename_to_chart_id("README.txt"), None);
/// ```
pub fn filename_to_chart_id(filename: &str) -> Option<String> {
    let name = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(filename);

    let lower = name.to_ascii_lowercase();
    let stem_len = [".000.gz", ".000", ".zip"]
        .iter()
        .find(|ext| lower.ends_with(*ext))
        .map(|ext| name.len() - ext.len())?;

    let stem = &name[..stem_len];
    is_valid_chart_id(stem).then(|| stem.to_string())
}

/// Navigational purpose of a cell, from the third character of its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum UsageBand {
    /// Band 1.
    Overview,
    /// Band 2.
    General,
    /// Band 3.
    Coastal,
    /// Band 4.
    Approach,
    /// Band 5.
    Harbour,
    /// Band 6.
    Berthing,
}

impl UsageBand {
    /// Band from its digit, 1 through 6.
    pub fn from_digit(digit: u8) -> Option<Self> {
        match digit {
            1 => Some(UsageBand::Overview),
            2 => Some(UsageBand::General),
            3 => Some(UsageBand::Coastal),
            4 => Some(UsageBand::Approach),
            5 => Some(UsageBand::Harbour),
            6 => Some(UsageBand::Berthing),
            _ => None,
        }
    }

    /// The band digit.
    pub fn digit(self) -> u8 {
        self as u8 + 1
    }
}

impl fmt::Display for UsageBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            UsageBand::Overview => "overview",
            UsageBand::General => "general",
            UsageBand::Coastal => "coastal",
            UsageBand::Approach => "approach",
            UsageBand::Harbour => "harbour",
            UsageBand::Berthing => "berthing",
        })
    }
}

/// A parsed S-57 cell name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CellName {
    /// Two-character producer code, e.g. `US`.
    pub producer: String,
    /// Usage band.
    pub usage_band: UsageBand,
    /// Five-character cell code.
    pub cell_code: String,
}

impl CellName {
    /// Parse an 8-character cell name. Letters are upper-cased.
    ///
    /// # Examples
    ///
    /// ```
    /// use chartkit::filename::{CellName, UsageBand};
    ///
    /// let cell = CellName::parse("US5MA10M").unwrap();
    /// assert_eq!(cell.producer, "US");
    /// assert_eq!(cell.usage_band, UsageBand::Harbour);
    /// assert_eq!(cell.cell_code, "MA10M");
    /// ```
    pub fn parse(name: &str) -> Option<Self> {
        let name = name.to_ascii_uppercase();
        if name.len() != 8 || !name.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return None;
        }
        let bytes = name.as_bytes();
        let usage_band = UsageBand::from_digit(bytes[2].wrapping_sub(b'0'))?;
        Some(Self {
            producer: name[0..2].to_string(),
            usage_band,
            cell_code: name[3..8].to_string(),
        })
    }
}

impl fmt::Display for CellName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}",
            self.producer,
            self.usage_band.digit(),
            self.cell_code
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chart_id_validation() {
        assert!(is_valid_chart_id("US5MA10M"));
        assert!(is_valid_chart_id("harbor_test-1"));
        assert!(!is_valid_chart_id("US5MA10M.000"));
        assert!(!is_valid_chart_id("a/b"));
        assert!(!is_valid_chart_id("a\\b"));
        assert!(!is_valid_chart_id(".."));
        assert!(!is_valid_chart_id(&"X".repeat(MAX_CHART_ID_LEN + 1)));
    }

    #[test]
    fn test_filename_round_trip() {
        for id in ["US5MA10M", "GB4X0000", "custom-chart"] {
            assert_eq!(
                filename_to_chart_id(&chart_id_to_filename(id)).as_deref(),
                Some(id)
            );
        }
    }

    #[test]
    fn test_filename_variants() {
        assert_eq!(filename_to_chart_id("US5MA10M.000").as_deref(), Some("US5MA10M"));
        assert_eq!(filename_to_chart_id("us5ma10m.ZIP").as_deref(), Some("us5ma10m"));
        assert_eq!(
            filename_to_chart_id("C:\\enc\\US5MA10M.000.GZ").as_deref(),
            Some("US5MA10M")
        );
        assert_eq!(filename_to_chart_id("US5MA10M.001"), None);
        assert_eq!(filename_to_chart_id(".000"), None);
        assert_eq!(filename_to_chart_id("US5MA10M"), None);
    }

    #[test]
    fn test_cell_name() {
        let cell = CellName::parse("gb4x0000").unwrap();
        assert_eq!(cell.producer, "GB");
        assert_eq!(cell.usage_band, UsageBand::Approach);
        assert_eq!(cell.to_string(), "GB4X0000");

        assert!(CellName::parse("US7MA10M").is_none());
        assert!(CellName::parse("US0MA10M").is_none());
        assert!(CellName::parse("US5MA10").is_none());
        assert!(CellName::parse("US5MA-0M").is_none());
    }

    #[test]
    fn test_usage_band_digits() {
        for d in 1..=6 {
            assert_eq!(UsageBand::from_digit(d).unwrap().digit(), d);
        }
        assert_eq!(UsageBand::Berthing.to_string(), "berthing");
    }
}
