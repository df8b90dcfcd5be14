//! Geographic primitives: coordinates and bounding rectangles.
//!
//! All values are decimal degrees (WGS84). Bounds never wrap the
//! antimeridian: `east >= west` always.

/// A position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    /// Latitude, -90 to 90.
    pub latitude: f64,
    /// Longitude, -180 to 180.
    pub longitude: f64,
}

impl Coordinate {
    /// Create a coordinate. No range check is done; see [`Self::is_valid`].
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Whether latitude and longitude are finite and within range.
    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// An axis-aligned geographic rectangle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    /// Northern boundary latitude.
    pub north: f64,
    /// Southern boundary latitude.
    pub south: f64,
    /// Eastern boundary longitude.
    pub east: f64,
    /// Western boundary longitude.
    pub west: f64,
}

impl Bounds {
    /// Create a bounding rectangle.
    ///
    /// # Arguments
    ///
    /// * `north` - Northern boundary latitude
    /// * `south` - Southern boundary latitude
    /// * `east` - Eastern boundary longitude
    /// * `west` - Western boundary longitude
    pub fn new(north: f64, south: f64, east: f64, west: f64) -> Self {
        Self {
            north,
            south,
            east,
            west,
        }
    }

    /// Create a rectangle only if `north >= south` and `east >= west`.
    pub fn checked(north: f64, south: f64, east: f64, west: f64) -> Option<Self> {
        let bounds = Self::new(north, south, east, west);
        bounds.is_valid().then_some(bounds)
    }

    /// Degenerate rectangle covering a single point.
    pub fn from_point(point: Coordinate) -> Self {
        Self::new(
            point.latitude,
            point.latitude,
            point.longitude,
            point.longitude,
        )
    }

    /// Square of half-width `radius` degrees centred on a point.
    pub fn around(latitude: f64, longitude: f64, radius: f64) -> Self {
        let radius = radius.abs();
        Self::new(
            latitude + radius,
            latitude - radius,
            longitude + radius,
            longitude - radius,
        )
    }

    /// Smallest rectangle containing every coordinate, or `None` if empty.
    pub fn from_coordinates<'a>(coords: impl IntoIterator<Item = &'a Coordinate>) -> Option<Self> {
        coords
            .into_iter()
            .map(|c| Self::from_point(*c))
            .reduce(|acc, b| acc.union(&b))
    }

    /// Whether the invariants `north >= south` and `east >= west` hold.
    pub fn is_valid(&self) -> bool {
        self.north >= self.south && self.east >= self.west
    }

    /// Whether two rectangles share at least one point (edges included).
    pub fn intersects(&self, other: &Bounds) -> bool {
        self.south <= other.north
            && self.north >= other.south
            && self.west <= other.east
            && self.east >= other.west
    }

    /// Whether a coordinate lies inside the rectangle (edges included).
    pub fn contains(&self, point: &Coordinate) -> bool {
        (self.south..=self.north).contains(&point.latitude)
            && (self.west..=self.east).contains(&point.longitude)
    }

    /// Smallest rectangle covering both.
    pub fn union(&self, other: &Bounds) -> Bounds {
        Bounds::new(
            self.north.max(other.north),
            self.south.min(other.south),
            self.east.max(other.east),
            self.west.min(other.west),
        )
    }

    /// Centre point.
    pub fn center(&self) -> Coordinate {
        Coordinate::new(
            (self.north + self.south) / 2.0,
            (self.east + self.west) / 2.0,
        )
    }
}

impl std::fmt::Display for Bounds {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "N{:.6} S{:.6} E{:.6} W{:.6}",
            self.north, self.south, self.east, self.west
        )
    }
}
