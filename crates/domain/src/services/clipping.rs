//! Containment and priority clipping.
//!
//! The priority-conflict validator runs on ORIGINAL paths: a same-priority
//! overlap is an authoring error the user must resolve, never something the
//! engine arbitrates. Clipping itself runs against the parent's and the
//! siblings' CLIPPED paths, since only effective areas participate in
//! spatial computations.

use geo::Polygon;

use crate::models::geofence::{Coordinate, GeofenceRecord};
use crate::services::geometry;

/// True iff any sibling with the same priority overlaps the candidate's
/// original path. Siblings are records sharing parent and type.
pub fn has_same_priority_overlap(
    candidate_path: &[Coordinate],
    candidate_priority: i32,
    siblings: &[&GeofenceRecord],
) -> bool {
    let Some(candidate_poly) = geometry::to_polygon(candidate_path) else {
        return false;
    };

    siblings
        .iter()
        .filter(|sibling| sibling.priority == candidate_priority)
        .any(|sibling| {
            geometry::to_polygon(&sibling.original_path)
                .map(|sibling_poly| geometry::intersects(&candidate_poly, &sibling_poly))
                .unwrap_or(false)
        })
}

/// Clips a child's original path to its parent's effective area.
///
/// Returns `None` when the shapes are disjoint or the overlap is not a
/// single polygon; the caller treats that as a containment failure for the
/// triggering record, or as a droppable inconsistency downstream.
pub fn clip_to_parent(
    original_path: &[Coordinate],
    parent_clipped_path: &[Coordinate],
) -> Option<Polygon<f64>> {
    let child = geometry::to_polygon(original_path)?;
    let parent = geometry::to_polygon(parent_clipped_path)?;
    geometry::intersection(&parent, &child)
}

/// Subtracts every strictly-higher-precedence sibling's effective area.
///
/// Applies all subtractions; a degenerate difference (consumed or split into
/// parts) short-circuits to the empty path, which is a legal persistent
/// state for a geofence.
pub fn clip_to_higher_priority_siblings(
    mut polygon: Polygon<f64>,
    priority: i32,
    siblings: &[&GeofenceRecord],
) -> Vec<Coordinate> {
    for sibling in siblings.iter().filter(|s| s.priority < priority) {
        let Some(sibling_poly) = geometry::to_polygon(&sibling.clipped_path) else {
            continue;
        };
        if !geometry::intersects(&polygon, &sibling_poly) {
            continue;
        }
        match geometry::difference(&polygon, &sibling_poly) {
            Some(remaining) => polygon = remaining,
            None => return Vec::new(),
        }
    }

    geometry::path_from_polygon(&polygon)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::geofence::GeofenceType;
    use std::collections::HashMap;
    use uuid::Uuid;

    fn square(x0: f64, y0: f64, x1: f64, y1: f64) -> Vec<Coordinate> {
        vec![
            Coordinate { lat: y0, lng: x0 },
            Coordinate { lat: y0, lng: x1 },
            Coordinate { lat: y1, lng: x1 },
            Coordinate { lat: y1, lng: x0 },
        ]
    }

    fn sibling(priority: i32, path: Vec<Coordinate>) -> GeofenceRecord {
        GeofenceRecord {
            id: Uuid::new_v4(),
            original_path: path.clone(),
            clipped_path: path,
            name: "sibling".to_string(),
            geofence_type: GeofenceType::Branch,
            priority,
            parent_id: None,
            metadata: HashMap::new(),
            country_iso: None,
        }
    }

    #[test]
    fn test_same_priority_overlap_detected() {
        let candidate = square(0.0, 0.0, 10.0, 10.0);
        let overlapping = sibling(1, square(5.0, 5.0, 15.0, 15.0));
        assert!(has_same_priority_overlap(&candidate, 1, &[&overlapping]));
    }

    #[test]
    fn test_different_priority_overlap_allowed() {
        let candidate = square(0.0, 0.0, 10.0, 10.0);
        let overlapping = sibling(2, square(5.0, 5.0, 15.0, 15.0));
        assert!(!has_same_priority_overlap(&candidate, 1, &[&overlapping]));
    }

    #[test]
    fn test_same_priority_disjoint_allowed() {
        let candidate = square(0.0, 0.0, 4.0, 4.0);
        let disjoint = sibling(1, square(6.0, 6.0, 9.0, 9.0));
        assert!(!has_same_priority_overlap(&candidate, 1, &[&disjoint]));
    }

    #[test]
    fn test_clip_to_parent_inside() {
        let child = square(2.0, 2.0, 8.0, 8.0);
        let parent = square(0.0, 0.0, 10.0, 10.0);
        let clipped = clip_to_parent(&child, &parent).unwrap();
        assert!((geo::Area::unsigned_area(&clipped) - 36.0).abs() < 1e-9);
    }

    #[test]
    fn test_clip_to_parent_partial_overlap_is_trimmed() {
        let child = square(5.0, 5.0, 15.0, 15.0);
        let parent = square(0.0, 0.0, 10.0, 10.0);
        let clipped = clip_to_parent(&child, &parent).unwrap();
        assert!((geo::Area::unsigned_area(&clipped) - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_clip_to_parent_disjoint_fails() {
        let child = square(20.0, 20.0, 30.0, 30.0);
        let parent = square(0.0, 0.0, 10.0, 10.0);
        assert!(clip_to_parent(&child, &parent).is_none());
    }

    #[test]
    fn test_sibling_clip_subtracts_higher_precedence() {
        let polygon = geometry::to_polygon(&square(0.0, 0.0, 10.0, 5.0)).unwrap();
        let higher = sibling(1, square(0.0, 0.0, 5.0, 5.0));
        let result = clip_to_higher_priority_siblings(polygon, 2, &[&higher]);
        assert!((geometry::planar_area(&result) - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_sibling_clip_ignores_lower_precedence() {
        let polygon = geometry::to_polygon(&square(0.0, 0.0, 10.0, 5.0)).unwrap();
        let lower = sibling(5, square(0.0, 0.0, 5.0, 5.0));
        let result = clip_to_higher_priority_siblings(polygon, 2, &[&lower]);
        assert!((geometry::planar_area(&result) - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_sibling_clip_consumed_yields_empty() {
        let polygon = geometry::to_polygon(&square(2.0, 2.0, 4.0, 4.0)).unwrap();
        let higher = sibling(1, square(0.0, 0.0, 9.0, 9.0));
        let result = clip_to_higher_priority_siblings(polygon, 2, &[&higher]);
        assert!(result.is_empty());
    }

    #[test]
    fn test_sibling_clip_split_yields_empty() {
        // The higher-precedence bar splits the region into two parts.
        let polygon = geometry::to_polygon(&square(0.0, 0.0, 9.0, 9.0)).unwrap();
        let bar = sibling(1, square(4.0, -1.0, 5.0, 10.0));
        let result = clip_to_higher_priority_siblings(polygon, 2, &[&bar]);
        assert!(result.is_empty());
    }

    #[test]
    fn test_sibling_clip_skips_empty_effective_areas() {
        let polygon = geometry::to_polygon(&square(0.0, 0.0, 5.0, 5.0)).unwrap();
        let mut consumed = sibling(1, square(0.0, 0.0, 5.0, 5.0));
        consumed.clipped_path = Vec::new();
        let result = clip_to_higher_priority_siblings(polygon, 2, &[&consumed]);
        assert!((geometry::planar_area(&result) - 25.0).abs() < 1e-9);
    }
}
