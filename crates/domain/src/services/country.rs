//! Country boundary import.
//!
//! Administrative (ADM0) boundaries arrive as GeoJSON geometry from an
//! external source. A multi-part country becomes one geofence per part,
//! largest part first, so an island nation imports as "X - Mainland" plus
//! numbered regions. Holes in the source rings are dropped; only exterior
//! rings become geofence paths.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::models::geofence::{Coordinate, GeofenceType};
use crate::services::geometry;
use crate::services::resolution::NewGeofence;

/// GeoJSON geometry for one country, positions in [lng, lat] order.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", content = "coordinates")]
pub enum BoundaryGeometry {
    Polygon(Vec<Vec<[f64; 2]>>),
    MultiPolygon(Vec<Vec<Vec<[f64; 2]>>>),
}

#[derive(Debug, Error)]
pub enum BoundaryError {
    #[error("no boundary data found for ISO code \"{0}\"")]
    NotFound(String),
    #[error("boundary source unavailable: {0}")]
    Unavailable(String),
    #[error("boundary data for \"{0}\" is malformed: {1}")]
    Malformed(String, String),
}

/// Provider of ADM0 boundary geometry, keyed by ISO 3166-1 alpha-3 code.
#[async_trait]
pub trait BoundarySource: Send + Sync {
    async fn fetch_adm0(&self, iso3: &str) -> Result<BoundaryGeometry, BoundaryError>;
}

/// Expands a country boundary into creation requests, one per landmass.
///
/// A single-polygon country keeps the given name. Multi-part countries are
/// ordered by descending area: the largest becomes "{name} - Mainland", the
/// rest "{name} - Region {n}". Parts too small to form a polygon are
/// skipped.
pub fn country_parts(
    name: &str,
    iso3: &str,
    priority: i32,
    metadata: HashMap<String, String>,
    geometry: &BoundaryGeometry,
) -> Vec<NewGeofence> {
    let mut parts: Vec<Vec<Coordinate>> = match geometry {
        BoundaryGeometry::Polygon(rings) => exterior_path(rings).into_iter().collect(),
        BoundaryGeometry::MultiPolygon(polygons) => polygons
            .iter()
            .filter_map(|rings| exterior_path(rings))
            .collect(),
    };

    parts.sort_by(|a, b| {
        geometry::planar_area(b)
            .partial_cmp(&geometry::planar_area(a))
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let single = parts.len() == 1;
    parts
        .into_iter()
        .enumerate()
        .map(|(index, path)| NewGeofence {
            name: if single {
                name.to_string()
            } else if index == 0 {
                format!("{} - Mainland", name)
            } else {
                format!("{} - Region {}", name, index)
            },
            geofence_type: GeofenceType::Country,
            priority,
            parent_id: None,
            metadata: metadata.clone(),
            country_iso: Some(iso3.to_string()),
            path,
        })
        .collect()
}

/// The exterior ring of a GeoJSON polygon as a coordinate path, or `None`
/// when the ring is missing or degenerate.
fn exterior_path(rings: &[Vec<[f64; 2]>]) -> Option<Vec<Coordinate>> {
    let exterior = rings.first()?;
    let path: Vec<Coordinate> = exterior
        .iter()
        .map(|position| Coordinate {
            lat: position[1],
            lng: position[0],
        })
        .collect();
    geometry::to_polygon(&path)?;
    Some(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ring(x0: f64, y0: f64, x1: f64, y1: f64) -> Vec<[f64; 2]> {
        vec![[x0, y0], [x1, y0], [x1, y1], [x0, y1], [x0, y0]]
    }

    #[test]
    fn test_single_polygon_keeps_name() {
        let geometry = BoundaryGeometry::Polygon(vec![ring(0.0, 0.0, 10.0, 10.0)]);
        let parts = country_parts("Testland", "TST", 0, HashMap::new(), &geometry);

        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].name, "Testland");
        assert_eq!(parts[0].geofence_type, GeofenceType::Country);
        assert_eq!(parts[0].country_iso.as_deref(), Some("TST"));
        assert!(parts[0].parent_id.is_none());
    }

    #[test]
    fn test_multipolygon_names_by_descending_area() {
        let geometry = BoundaryGeometry::MultiPolygon(vec![
            vec![ring(20.0, 20.0, 22.0, 22.0)], // small island, area 4
            vec![ring(0.0, 0.0, 10.0, 10.0)],   // mainland, area 100
            vec![ring(30.0, 30.0, 33.0, 33.0)], // island, area 9
        ]);
        let parts = country_parts("Archipelago", "ARC", 0, HashMap::new(), &geometry);

        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].name, "Archipelago - Mainland");
        assert!((geometry::planar_area(&parts[0].path) - 100.0).abs() < 1e-9);
        assert_eq!(parts[1].name, "Archipelago - Region 1");
        assert!((geometry::planar_area(&parts[1].path) - 9.0).abs() < 1e-9);
        assert_eq!(parts[2].name, "Archipelago - Region 2");
    }

    #[test]
    fn test_holes_are_dropped() {
        let geometry = BoundaryGeometry::Polygon(vec![
            ring(0.0, 0.0, 10.0, 10.0),
            ring(4.0, 4.0, 6.0, 6.0), // interior ring, ignored
        ]);
        let parts = country_parts("Testland", "TST", 0, HashMap::new(), &geometry);
        assert_eq!(parts.len(), 1);
        assert!((geometry::planar_area(&parts[0].path) - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_degenerate_parts_skipped() {
        let geometry = BoundaryGeometry::MultiPolygon(vec![
            vec![ring(0.0, 0.0, 10.0, 10.0)],
            vec![vec![[0.0, 0.0], [1.0, 1.0]]], // not a polygon
        ]);
        let parts = country_parts("Testland", "TST", 0, HashMap::new(), &geometry);
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].name, "Testland");
    }

    #[test]
    fn test_geometry_deserializes_from_geojson() {
        let json = r#"{"type":"Polygon","coordinates":[[[0.0,0.0],[4.0,0.0],[4.0,4.0],[0.0,4.0],[0.0,0.0]]]}"#;
        let geometry: BoundaryGeometry = serde_json::from_str(json).unwrap();
        assert!(matches!(geometry, BoundaryGeometry::Polygon(_)));
    }
}
