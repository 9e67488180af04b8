//! # Geographic Utilities
//!
//! Geometry engine for trajectory hover interaction.
//!
//! All functions are pure. Functions that measure distance take the distance metric as a
//! closure so the map surface can supply its own (see [`crate::MapSurface::distance`]);
//! [`haversine_distance`] is the default metric.
//!
//! ## Overview
//!
//! | Function | Description |
//! |----------|-------------|
//! | [`haversine_distance`] | Great-circle distance between two GPS points |
//! | [`nearest_point_on_segment`] | Clamped perpendicular projection onto a segment |
//! | [`nearest_point_on_polyline`] | Closest point over every segment of a polyline |
//! | [`nearest_vertex`] | Closest sample vertex of a polyline |
//! | [`compute_bounds`] | Bounding box of a GPS track |
//! | [`meters_to_degrees`] | Convert meters to approximate degrees at a latitude |
//!
//! ## Example
//!
//! ```rust
//! use trajectory_viewer::{GpsPoint, geo_utils};
//!
//! let track = vec![
//!     GpsPoint::new(36.00, -5.40),
//!     GpsPoint::new(36.00, -5.38),
//! ];
//!
//! // Cursor slightly north of the middle of the segment
//! let cursor = GpsPoint::new(36.001, -5.39);
//! let hit = geo_utils::nearest_point_on_polyline(&cursor, &track, geo_utils::haversine_distance)
//!     .unwrap();
//! assert_eq!(hit.segment_index, 0);
//! assert!((hit.point.longitude - (-5.39)).abs() < 1e-9);
//! assert!(hit.distance < 150.0);
//! ```
//!
//! ## Algorithm Notes
//!
//! Projection is done in planar latitude/longitude degrees, which is accurate enough at the
//! segment lengths of AIS sampling. The returned distance is always measured with the supplied
//! metric, so it is the true distance to the returned point.

use crate::{Bounds, GpsPoint};
use geo::{Distance, Haversine, Point};

// =============================================================================
// Distance Functions
// =============================================================================

/// Calculate the great-circle distance between two GPS points using the Haversine formula.
///
/// Returns the distance in meters along the Earth's surface (assuming a spherical Earth
/// with radius 6,371 km).
///
/// # Example
///
/// ```rust
/// use trajectory_viewer::{GpsPoint, geo_utils};
///
/// let tarifa = GpsPoint::new(36.0143, -5.6044);
/// let ceuta = GpsPoint::new(35.8894, -5.3213);
///
/// let distance = geo_utils::haversine_distance(&tarifa, &ceuta);
/// assert!((distance - 28_900.0).abs() < 1000.0); // ~29 km across the strait
/// ```
#[inline]
pub fn haversine_distance(p1: &GpsPoint, p2: &GpsPoint) -> f64 {
    let point1 = Point::new(p1.longitude, p1.latitude);
    let point2 = Point::new(p2.longitude, p2.latitude);
    Haversine::distance(point1, point2)
}

/// Convert meters to approximate degrees at a given latitude.
///
/// Uses the longitude scale at `latitude`, which is never smaller than the latitude scale,
/// so the result is a conservative (larger) value on both axes. Suitable for square
/// search envelopes.
#[inline]
pub fn meters_to_degrees(meters: f64, latitude: f64) -> f64 {
    let lat_rad = latitude.to_radians();
    let meters_per_degree = 111_320.0 * lat_rad.cos().max(0.1);
    meters / meters_per_degree
}

// =============================================================================
// Nearest-Point Functions
// =============================================================================

/// Clamped projection of a query point onto a segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentProjection {
    /// Closest point on the segment
    pub point: GpsPoint,
    /// Distance from the query to `point` in meters
    pub distance: f64,
    /// Projection parameter along `a -> b`, always within `[0, 1]`
    pub t: f64,
}

/// Closest point of a polyline to a query point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolylineHit {
    pub point: GpsPoint,
    pub distance: f64,
    /// Index of the segment `points[i] -> points[i + 1]` holding `point`
    pub segment_index: usize,
    /// Projection parameter along that segment
    pub t: f64,
}

/// Closest sample vertex of a polyline to a query point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VertexHit {
    pub index: usize,
    pub point: GpsPoint,
    pub distance: f64,
}

/// Project `query` onto the segment `a -> b`.
///
/// The projection parameter is computed on the infinite line through `a` and `b` and
/// clamped to `[0, 1]`, so the returned point always lies on the segment. For a degenerate
/// segment (`a == b`) the result is `a`; callers scanning polylines skip such segments.
///
/// # Example
///
/// ```rust
/// use trajectory_viewer::{GpsPoint, geo_utils};
///
/// let a = GpsPoint::new(36.0, -5.40);
/// let b = GpsPoint::new(36.0, -5.39);
///
/// // Beyond the end of the segment: clamped to b
/// let beyond = GpsPoint::new(36.0, -5.30);
/// let proj = geo_utils::nearest_point_on_segment(&beyond, &a, &b, geo_utils::haversine_distance);
/// assert_eq!(proj.t, 1.0);
/// assert_eq!(proj.point, b);
/// ```
pub fn nearest_point_on_segment<D>(
    query: &GpsPoint,
    a: &GpsPoint,
    b: &GpsPoint,
    distance: D,
) -> SegmentProjection
where
    D: Fn(&GpsPoint, &GpsPoint) -> f64,
{
    let d_lat = b.latitude - a.latitude;
    let d_lng = b.longitude - a.longitude;
    let len_sq = d_lat * d_lat + d_lng * d_lng;

    let t = if len_sq > 0.0 {
        let raw = ((query.latitude - a.latitude) * d_lat + (query.longitude - a.longitude) * d_lng)
            / len_sq;
        raw.clamp(0.0, 1.0)
    } else {
        0.0
    };

    let point = GpsPoint::new(a.latitude + t * d_lat, a.longitude + t * d_lng);
    SegmentProjection {
        point,
        distance: distance(query, &point),
        t,
    }
}

/// Find the closest point to `query` over every segment of a polyline.
///
/// Segments of zero length (as measured by `distance`) are skipped. On exact ties the
/// lowest segment index wins. Returns `None` for fewer than 2 points or when every
/// segment is degenerate.
pub fn nearest_point_on_polyline<D>(
    query: &GpsPoint,
    points: &[GpsPoint],
    distance: D,
) -> Option<PolylineHit>
where
    D: Fn(&GpsPoint, &GpsPoint) -> f64,
{
    let mut best: Option<PolylineHit> = None;

    for (i, w) in points.windows(2).enumerate() {
        if distance(&w[0], &w[1]) == 0.0 {
            continue;
        }
        let proj = nearest_point_on_segment(query, &w[0], &w[1], &distance);
        match best {
            Some(ref hit) if proj.distance >= hit.distance => {}
            _ => {
                best = Some(PolylineHit {
                    point: proj.point,
                    distance: proj.distance,
                    segment_index: i,
                    t: proj.t,
                });
            }
        }
    }

    best
}

/// Find the sample vertex closest to `query`. First minimum wins.
pub fn nearest_vertex<D>(query: &GpsPoint, points: &[GpsPoint], distance: D) -> Option<VertexHit>
where
    D: Fn(&GpsPoint, &GpsPoint) -> f64,
{
    let mut best: Option<VertexHit> = None;

    for (index, p) in points.iter().enumerate() {
        let d = distance(query, p);
        match best {
            Some(ref hit) if d >= hit.distance => {}
            _ => best = Some(VertexHit { index, point: *p, distance: d }),
        }
    }

    best
}

// =============================================================================
// Bounding Box Functions
// =============================================================================

/// Compute the bounding box of a GPS track.
///
/// For empty input, returns a bounds with MIN/MAX values that contain nothing.
///
/// # Example
///
/// ```rust
/// use trajectory_viewer::{GpsPoint, geo_utils};
///
/// let track = vec![
///     GpsPoint::new(36.00, -5.43),
///     GpsPoint::new(36.10, -5.42),
///     GpsPoint::new(36.05, -5.425),
/// ];
///
/// let bounds = geo_utils::compute_bounds(&track);
/// assert_eq!(bounds.min_lat, 36.00);
/// assert_eq!(bounds.max_lat, 36.10);
/// assert_eq!(bounds.min_lng, -5.43);
/// assert_eq!(bounds.max_lng, -5.42);
/// ```
pub fn compute_bounds(points: &[GpsPoint]) -> Bounds {
    let mut min_lat = f64::MAX;
    let mut max_lat = f64::MIN;
    let mut min_lng = f64::MAX;
    let mut max_lng = f64::MIN;

    for p in points {
        min_lat = min_lat.min(p.latitude);
        max_lat = max_lat.max(p.latitude);
        min_lng = min_lng.min(p.longitude);
        max_lng = max_lng.max(p.longitude);
    }

    Bounds { min_lat, max_lat, min_lng, max_lng }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
        (a - b).abs() < epsilon
    }

    #[test]
    fn test_haversine_distance_same_point() {
        let p = GpsPoint::new(36.0, -5.4);
        assert_eq!(haversine_distance(&p, &p), 0.0);
    }

    #[test]
    fn test_haversine_one_millidegree_latitude() {
        let a = GpsPoint::new(36.0, -5.4);
        let b = GpsPoint::new(36.001, -5.4);
        assert!(approx_eq(haversine_distance(&a, &b), 111.2, 1.0));
    }

    #[test]
    fn test_segment_projection_parameter_is_clamped() {
        let a = GpsPoint::new(36.0, -5.40);
        let b = GpsPoint::new(36.01, -5.41);
        let queries = [
            GpsPoint::new(35.9, -5.3),
            GpsPoint::new(36.2, -5.6),
            GpsPoint::new(36.005, -5.405),
            GpsPoint::new(36.0, -5.41),
            GpsPoint::new(40.0, 0.0),
        ];
        for q in queries {
            let proj = nearest_point_on_segment(&q, &a, &b, haversine_distance);
            assert!((0.0..=1.0).contains(&proj.t), "t = {}", proj.t);
            assert!(approx_eq(proj.distance, haversine_distance(&q, &proj.point), 1e-6));
        }
    }

    #[test]
    fn test_segment_projection_before_start() {
        let a = GpsPoint::new(36.0, -5.40);
        let b = GpsPoint::new(36.0, -5.39);
        let query = GpsPoint::new(36.0, -5.50);
        let proj = nearest_point_on_segment(&query, &a, &b, haversine_distance);
        assert_eq!(proj.t, 0.0);
        assert_eq!(proj.point, a);
    }

    #[test]
    fn test_segment_projection_perpendicular_foot() {
        let a = GpsPoint::new(36.0, -5.40);
        let b = GpsPoint::new(36.0, -5.38);
        let query = GpsPoint::new(36.002, -5.39);
        let proj = nearest_point_on_segment(&query, &a, &b, haversine_distance);
        assert!(approx_eq(proj.t, 0.5, 1e-9));
        assert!(approx_eq(proj.point.latitude, 36.0, 1e-12));
        assert!(approx_eq(proj.distance, 222.4, 1.0));
    }

    #[test]
    fn test_degenerate_segment_returns_start() {
        let a = GpsPoint::new(36.0, -5.4);
        let proj = nearest_point_on_segment(&GpsPoint::new(36.1, -5.4), &a, &a, haversine_distance);
        assert_eq!(proj.t, 0.0);
        assert_eq!(proj.point, a);
    }

    #[test]
    fn test_polyline_not_worse_than_any_vertex() {
        let track = vec![
            GpsPoint::new(36.00, -5.40),
            GpsPoint::new(36.01, -5.41),
            GpsPoint::new(36.015, -5.43),
            GpsPoint::new(36.02, -5.42),
        ];
        let queries = [
            GpsPoint::new(36.005, -5.40),
            GpsPoint::new(36.03, -5.45),
            GpsPoint::new(35.99, -5.39),
            GpsPoint::new(36.012, -5.425),
        ];
        for q in queries {
            let hit = nearest_point_on_polyline(&q, &track, haversine_distance).unwrap();
            let min_vertex = track
                .iter()
                .map(|p| haversine_distance(&q, p))
                .fold(f64::INFINITY, f64::min);
            assert!(hit.distance <= min_vertex + 1e-9);
        }
    }

    #[test]
    fn test_polyline_tie_prefers_first_segment() {
        // Symmetric "V": the query sits equally far from both arms
        let track = vec![
            GpsPoint::new(36.01, -5.41),
            GpsPoint::new(36.00, -5.40),
            GpsPoint::new(36.01, -5.39),
        ];
        let q = GpsPoint::new(36.00, -5.40);
        let hit = nearest_point_on_polyline(&q, &track, |a, b| {
            ((a.latitude - b.latitude).powi(2) + (a.longitude - b.longitude).powi(2)).sqrt()
        })
        .unwrap();
        assert_eq!(hit.segment_index, 0);
    }

    #[test]
    fn test_polyline_skips_degenerate_segments() {
        let track = vec![
            GpsPoint::new(36.0, -5.40),
            GpsPoint::new(36.0, -5.40),
            GpsPoint::new(36.0, -5.39),
        ];
        let query = GpsPoint::new(36.0, -5.395);
        let hit = nearest_point_on_polyline(&query, &track, haversine_distance)
            .unwrap();
        assert_eq!(hit.segment_index, 1);
    }

    #[test]
    fn test_polyline_too_short() {
        let single = vec![GpsPoint::new(36.0, -5.4)];
        assert!(nearest_point_on_polyline(&single[0], &single, haversine_distance).is_none());
        let repeated = vec![GpsPoint::new(36.0, -5.4); 3];
        assert!(nearest_point_on_polyline(&repeated[0], &repeated, haversine_distance).is_none());
    }

    #[test]
    fn test_nearest_vertex_first_minimum_wins() {
        let track = vec![
            GpsPoint::new(36.0, -5.41),
            GpsPoint::new(36.0, -5.39),
            GpsPoint::new(36.0, -5.41),
        ];
        let hit = nearest_vertex(&GpsPoint::new(36.0, -5.415), &track, haversine_distance).unwrap();
        assert_eq!(hit.index, 0);
        assert!(nearest_vertex(&GpsPoint::new(36.0, -5.4), &[], haversine_distance).is_none());
    }

    #[test]
    fn test_compute_bounds() {
        let track = vec![
            GpsPoint::new(36.00, -5.43),
            GpsPoint::new(36.01, -5.42),
            GpsPoint::new(36.005, -5.425),
        ];
        let bounds = compute_bounds(&track);
        assert_eq!(bounds.min_lat, 36.00);
        assert_eq!(bounds.max_lat, 36.01);
        assert_eq!(bounds.min_lng, -5.43);
        assert_eq!(bounds.max_lng, -5.42);
    }

    #[test]
    fn test_meters_to_degrees() {
        // At equator, 111km = 1 degree
        let deg = meters_to_degrees(111_320.0, 0.0);
        assert!(approx_eq(deg, 1.0, 0.01));

        // At higher latitude, same distance = more degrees
        let deg_36 = meters_to_degrees(111_320.0, 36.0);
        assert!(deg_36 > 1.0);
    }
}
