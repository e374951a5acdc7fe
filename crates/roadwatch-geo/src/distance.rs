//! Geodesic distance helpers.
//!
//! Great-circle distances come from [`geo`]'s haversine implementation.
//! The closest point on a polyline leg is found in a local equirectangular
//! projection centred on the query point, which is accurate to well under a
//! metre at road-segment scale, and the distance to it is then measured on the
//! sphere.

use geo::{Distance, Haversine};

use crate::geometry::{BoundingBox, Point};

/// Mean Earth radius in metres, the same constant `geo` uses.
pub const EARTH_RADIUS_METERS: f64 = 6_371_008.8;

/// Below this cosine of latitude the projection degenerates (poles).
const MIN_COS_LAT: f64 = 1e-9;

/// Great-circle distance between two points in metres.
pub fn haversine_meters(a: Point, b: Point) -> f64 {
    Haversine::distance(geo::Point::new(a.lon, a.lat), geo::Point::new(b.lon, b.lat))
}

/// Degrees of latitude and longitude spanned by `radius_meters` at `point`.
///
/// The longitude span is the widest east-west reach of the spherical cap,
/// which is slightly more than the span along the parallel. When the cap
/// covers a pole the span is the whole globe.
pub fn radius_to_degrees(point: Point, radius_meters: f64) -> (f64, f64) {
    let angular = radius_meters / EARTH_RADIUS_METERS;
    let dlat = angular.to_degrees();
    let cos_lat = point.lat.to_radians().cos();
    let reach = angular.sin() / cos_lat.max(MIN_COS_LAT);
    let dlon = if angular < std::f64::consts::FRAC_PI_2 && reach < 1.0 {
        reach.asin().to_degrees()
    } else {
        360.0
    };
    (dlat, dlon)
}

/// Boxes approximating a circle of `radius_meters` around `point`.
///
/// A circle reaching across the antimeridian yields two boxes, one on each
/// side of it. Longitudes in the result always stay within -180..=180.
pub fn search_boxes(point: Point, radius_meters: f64) -> Vec<BoundingBox> {
    let (dlat, dlon) = radius_to_degrees(point, radius_meters);
    let min_lat = (point.lat - dlat).max(-90.0);
    let max_lat = (point.lat + dlat).min(90.0);
    let span = |min_lon: f64, max_lon: f64| BoundingBox {
        min_lat,
        min_lon,
        max_lat,
        max_lon,
    };

    if dlon >= 180.0 {
        return vec![span(-180.0, 180.0)];
    }
    let (west, east) = (point.lon - dlon, point.lon + dlon);
    if west < -180.0 {
        vec![span(-180.0, east), span(west + 360.0, 180.0)]
    } else if east > 180.0 {
        vec![span(west, 180.0), span(-180.0, east - 360.0)]
    } else {
        vec![span(west, east)]
    }
}

/// `to - from` in degrees of longitude, taken the short way round.
fn lon_delta(from: f64, to: f64) -> f64 {
    let delta = to - from;
    if delta > 180.0 {
        delta - 360.0
    } else if delta < -180.0 {
        delta + 360.0
    } else {
        delta
    }
}

/// Closest point to `p` on the leg `a`-`b`.
fn closest_point_on_leg(p: Point, a: Point, b: Point) -> Point {
    let cos_lat = p.lat.to_radians().cos();
    if cos_lat <= MIN_COS_LAT {
        return if haversine_meters(p, a) <= haversine_meters(p, b) { a } else { b };
    }

    // Project into a plane centred on `p`, x scaled by latitude.
    let (ax, ay) = (lon_delta(p.lon, a.lon) * cos_lat, a.lat - p.lat);
    let (bx, by) = (lon_delta(p.lon, b.lon) * cos_lat, b.lat - p.lat);
    let (dx, dy) = (bx - ax, by - ay);
    let len2 = dx.mul_add(dx, dy * dy);
    if len2 <= f64::EPSILON * f64::EPSILON {
        return a;
    }

    let t = (-ax.mul_add(dx, ay * dy) / len2).clamp(0.0, 1.0);
    let (cx, cy) = (t.mul_add(dx, ax), t.mul_add(dy, ay));
    Point::new(p.lat + cy, p.lon + cx / cos_lat)
}

/// Minimum geodesic distance in metres from `point` to a polyline.
///
/// Returns `f64::INFINITY` for an empty polyline.
pub fn distance_to_polyline(point: Point, polyline: &[Point]) -> f64 {
    match polyline {
        [] => f64::INFINITY,
        [only] => haversine_meters(point, *only),
        _ => polyline
            .windows(2)
            .filter_map(|leg| match leg {
                [a, b] => Some(haversine_meters(point, closest_point_on_leg(point, *a, *b))),
                _ => None,
            })
            .fold(f64::INFINITY, f64::min),
    }
}
