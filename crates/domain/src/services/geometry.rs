//! Planar polygon primitives over the `geo` crate.
//!
//! All operations treat longitude/latitude pairs as planar x/y coordinates.
//! Set operations are fail-closed: a result that is not a single
//! non-degenerate polygon is reported as `None`, and callers decide whether
//! that aborts a mutation or clears a derived area.

use std::collections::HashSet;

use geo::{Area, BooleanOps, Coord, Intersects, LineString, MultiPolygon, Polygon, Relate};

use crate::models::geofence::Coordinate;

/// Builds a closed planar polygon from a coordinate path.
///
/// The ring is auto-closed when the last point does not equal the first.
/// Returns `None` for paths with fewer than 3 distinct points; callers must
/// treat that as a non-geofence.
pub fn to_polygon(path: &[Coordinate]) -> Option<Polygon<f64>> {
    let distinct: HashSet<(u64, u64)> = path
        .iter()
        .map(|coord| (coord.lat.to_bits(), coord.lng.to_bits()))
        .collect();
    if distinct.len() < 3 {
        return None;
    }

    let ring: Vec<Coord<f64>> = path
        .iter()
        .map(|coord| Coord {
            x: coord.lng,
            y: coord.lat,
        })
        .collect();

    // Polygon::new closes an open exterior ring.
    Some(Polygon::new(LineString::new(ring), vec![]))
}

/// Converts a polygon's exterior ring back to a coordinate path.
pub fn path_from_polygon(polygon: &Polygon<f64>) -> Vec<Coordinate> {
    polygon
        .exterior()
        .coords()
        .map(|coord| Coordinate {
            lat: coord.y,
            lng: coord.x,
        })
        .collect()
}

/// Boundary-inclusive containment: true iff `inner` lies entirely within
/// `outer`, boundary contact allowed.
pub fn covers(outer: &Polygon<f64>, inner: &Polygon<f64>) -> bool {
    outer.relate(inner).is_covers()
}

/// True iff the polygons share any interior or boundary area.
pub fn intersects(a: &Polygon<f64>, b: &Polygon<f64>) -> bool {
    a.intersects(b)
}

/// The overlapping region of `a` and `b`, or `None` when disjoint or when
/// the result splits into multiple parts.
pub fn intersection(a: &Polygon<f64>, b: &Polygon<f64>) -> Option<Polygon<f64>> {
    single_polygon(a.intersection(b))
}

/// `a` minus the region covered by `b`, or `None` when the result is empty
/// or splits into multiple parts.
pub fn difference(a: &Polygon<f64>, b: &Polygon<f64>) -> Option<Polygon<f64>> {
    single_polygon(a.difference(b))
}

/// Planar area of a coordinate path; 0.0 for degenerate paths.
pub fn planar_area(path: &[Coordinate]) -> f64 {
    to_polygon(path).map(|p| p.unsigned_area()).unwrap_or(0.0)
}

fn single_polygon(parts: MultiPolygon<f64>) -> Option<Polygon<f64>> {
    if parts.0.len() != 1 {
        return None;
    }
    let polygon = parts.0.into_iter().next()?;
    if polygon.unsigned_area() <= 0.0 {
        return None;
    }
    Some(polygon)
}
