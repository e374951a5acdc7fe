//! Geometry primitives: points, rectangles and axis-aligned bounding boxes.
//!
//! All coordinates are WGS84 decimal degrees. Boxes are planar in
//! latitude/longitude space; they are only ever used for pruning, never for
//! distance answers.

use serde::{Deserialize, Serialize};

/// A geographic point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Latitude in decimal degrees.
    pub lat: f64,
    /// Longitude in decimal degrees.
    pub lon: f64,
}

impl Point {
    /// Create a point from latitude and longitude.
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Whether both coordinates are finite and within WGS84 range.
    pub fn is_valid(self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }

    /// Whether the point lies inside or on the edge of `bbox`.
    pub fn is_bounded_by(self, bbox: &BoundingBox) -> bool {
        bbox.contains_point(self)
    }
}

/// A rectangle given by two opposite corners in any order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rectangle {
    /// First corner.
    pub a: Point,
    /// Opposite corner.
    pub b: Point,
}

impl Rectangle {
    /// Create a rectangle from two opposite corners.
    pub const fn new(a: Point, b: Point) -> Self {
        Self { a, b }
    }

    /// Smallest latitude of the two corners.
    pub const fn min_lat(&self) -> f64 {
        self.a.lat.min(self.b.lat)
    }

    /// Largest latitude of the two corners.
    pub const fn max_lat(&self) -> f64 {
        self.a.lat.max(self.b.lat)
    }

    /// Smallest longitude of the two corners.
    pub const fn min_lon(&self) -> f64 {
        self.a.lon.min(self.b.lon)
    }

    /// Largest longitude of the two corners.
    pub const fn max_lon(&self) -> f64 {
        self.a.lon.max(self.b.lon)
    }

    /// The normalised box covering this rectangle.
    pub const fn bounding_box(&self) -> BoundingBox {
        BoundingBox {
            min_lat: self.min_lat(),
            min_lon: self.min_lon(),
            max_lat: self.max_lat(),
            max_lon: self.max_lon(),
        }
    }
}

/// The minimal axis-aligned box enclosing one or more rectangles.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Southern edge.
    pub min_lat: f64,
    /// Western edge.
    pub min_lon: f64,
    /// Northern edge.
    pub max_lat: f64,
    /// Eastern edge.
    pub max_lon: f64,
}

impl BoundingBox {
    /// A degenerate box covering exactly `point`.
    pub const fn from_point(point: Point) -> Self {
        Self {
            min_lat: point.lat,
            min_lon: point.lon,
            max_lat: point.lat,
            max_lon: point.lon,
        }
    }

    /// The union of two rectangles.
    pub const fn from_rectangles(r1: &Rectangle, r2: &Rectangle) -> Self {
        r1.bounding_box().union(&r2.bounding_box())
    }

    /// The box enclosing every point, or `None` for an empty slice.
    pub fn from_points(points: &[Point]) -> Option<Self> {
        let (first, rest) = points.split_first()?;
        Some(
            rest.iter()
                .fold(Self::from_point(*first), |acc, p| acc.union(&Self::from_point(*p))),
        )
    }

    /// The smallest box containing both `self` and `other`.
    #[must_use]
    pub const fn union(&self, other: &Self) -> Self {
        Self {
            min_lat: self.min_lat.min(other.min_lat),
            min_lon: self.min_lon.min(other.min_lon),
            max_lat: self.max_lat.max(other.max_lat),
            max_lon: self.max_lon.max(other.max_lon),
        }
    }

    /// Whether the two boxes share at least one point (edges count).
    pub fn intersects(&self, other: &Self) -> bool {
        self.min_lat <= other.max_lat
            && self.max_lat >= other.min_lat
            && self.min_lon <= other.max_lon
            && self.max_lon >= other.min_lon
    }

    /// Whether `point` lies inside or on the edge of the box.
    pub fn contains_point(&self, point: Point) -> bool {
        (self.min_lat..=self.max_lat).contains(&point.lat)
            && (self.min_lon..=self.max_lon).contains(&point.lon)
    }

    /// Whether `other` lies entirely inside the box.
    pub fn contains(&self, other: &Self) -> bool {
        self.min_lat <= other.min_lat
            && self.max_lat >= other.max_lat
            && self.min_lon <= other.min_lon
            && self.max_lon >= other.max_lon
    }

    /// Planar area in square degrees.
    pub fn area(&self) -> f64 {
        (self.max_lat - self.min_lat) * (self.max_lon - self.min_lon)
    }

    /// Centre point of the box.
    pub fn center(&self) -> Point {
        Point::new(
            self.min_lat.midpoint(self.max_lat),
            self.min_lon.midpoint(self.max_lon),
        )
    }

    /// The box grown by `dlat` degrees north/south and `dlon` east/west.
    #[must_use]
    pub fn expand(&self, dlat: f64, dlon: f64) -> Self {
        Self {
            min_lat: self.min_lat - dlat,
            min_lon: self.min_lon - dlon,
            max_lat: self.max_lat + dlat,
            max_lon: self.max_lon + dlon,
        }
    }

    /// The four corners, south-west first, counter-clockwise.
    pub const fn corners(&self) -> [Point; 4] {
        [
            Point::new(self.min_lat, self.min_lon),
            Point::new(self.min_lat, self.max_lon),
            Point::new(self.max_lat, self.max_lon),
            Point::new(self.max_lat, self.min_lon),
        ]
    }
}

impl From<Rectangle> for BoundingBox {
    fn from(rect: Rectangle) -> Self {
        rect.bounding_box()
    }
}
