//! GeoJSON interchange types for geofence export and import.
//!
//! Only the small fixed subset this system produces is modeled: a
//! `FeatureCollection` of single-ring `Polygon` features. Features always
//! carry the ORIGINAL user-drawn path so that an export reflects exactly
//! what was drawn, never the derived clipped shapes.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::GeofenceError;
use crate::models::geofence::{Coordinate, GeofenceRecord, GeofenceType};

/// A GeoJSON feature collection of geofence boundaries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureCollection {
    #[serde(rename = "type")]
    pub kind: String,
    pub features: Vec<Feature>,
}

/// A single geofence boundary as a GeoJSON feature.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feature {
    #[serde(rename = "type")]
    pub kind: String,
    pub geometry: PolygonGeometry,
    pub properties: FeatureProperties,
}

/// Polygon geometry with positions in GeoJSON `[lng, lat]` order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolygonGeometry {
    #[serde(rename = "type")]
    pub kind: String,
    pub coordinates: Vec<Vec<[f64; 2]>>,
}

/// Identifying and hierarchy properties attached to each feature.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureProperties {
    pub id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub geofence_type: GeofenceType,
    pub parent_id: Option<Uuid>,
    pub priority: i32,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(rename = "countryISO", skip_serializing_if = "Option::is_none", default)]
    pub country_iso: Option<String>,
}

/// Converts a geofence collection into a GeoJSON feature collection.
pub fn to_feature_collection(records: &[GeofenceRecord]) -> FeatureCollection {
    let features = records
        .iter()
        .map(|record| Feature {
            kind: "Feature".to_string(),
            geometry: PolygonGeometry {
                kind: "Polygon".to_string(),
                coordinates: vec![record
                    .original_path
                    .iter()
                    .map(|coord| [coord.lng, coord.lat])
                    .collect()],
            },
            properties: FeatureProperties {
                id: record.id,
                name: record.name.clone(),
                geofence_type: record.geofence_type,
                parent_id: record.parent_id,
                priority: record.priority,
                metadata: record.metadata.clone(),
                country_iso: record.country_iso.clone(),
            },
        })
        .collect();

    FeatureCollection {
        kind: "FeatureCollection".to_string(),
        features,
    }
}

/// Parses a feature collection back into geofence records.
///
/// The clipped paths are seeded from the original paths; the caller is
/// expected to run a full resolution pass before the records are used.
pub fn records_from_feature_collection(
    collection: &FeatureCollection,
) -> Result<Vec<GeofenceRecord>, GeofenceError> {
    if collection.kind != "FeatureCollection" {
        return Err(GeofenceError::InvalidGeoJson(format!(
            "expected a FeatureCollection, got \"{}\"",
            collection.kind
        )));
    }

    collection
        .features
        .iter()
        .map(|feature| {
            if feature.kind != "Feature" {
                return Err(GeofenceError::InvalidGeoJson(format!(
                    "expected a Feature, got \"{}\"",
                    feature.kind
                )));
            }
            if feature.geometry.kind != "Polygon" {
                return Err(GeofenceError::InvalidGeoJson(format!(
                    "unsupported geometry \"{}\"",
                    feature.geometry.kind
                )));
            }
            let ring = feature
                .geometry
                .coordinates
                .first()
                .ok_or_else(|| GeofenceError::InvalidGeoJson("polygon has no rings".into()))?;

            let path: Vec<Coordinate> = ring
                .iter()
                .map(|&[lng, lat]| Coordinate { lat, lng })
                .collect();

            Ok(GeofenceRecord {
                id: feature.properties.id,
                original_path: path.clone(),
                clipped_path: path,
                name: feature.properties.name.clone(),
                geofence_type: feature.properties.geofence_type,
                priority: feature.properties.priority,
                parent_id: feature.properties.parent_id,
                metadata: feature.properties.metadata.clone(),
                country_iso: feature.properties.country_iso.clone(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> GeofenceRecord {
        GeofenceRecord {
            id: Uuid::new_v4(),
            original_path: vec![
                Coordinate { lat: 0.0, lng: 0.0 },
                Coordinate { lat: 0.0, lng: 4.0 },
                Coordinate { lat: 4.0, lng: 4.0 },
                Coordinate { lat: 4.0, lng: 0.0 },
            ],
            clipped_path: vec![
                Coordinate { lat: 0.0, lng: 0.0 },
                Coordinate { lat: 0.0, lng: 2.0 },
                Coordinate { lat: 2.0, lng: 2.0 },
            ],
            name: "Western Branch".to_string(),
            geofence_type: GeofenceType::Branch,
            priority: 2,
            parent_id: Some(Uuid::new_v4()),
            metadata: HashMap::from([("region".to_string(), "west".to_string())]),
            country_iso: None,
        }
    }

    #[test]
    fn test_export_uses_original_path() {
        let record = sample_record();
        let collection = to_feature_collection(std::slice::from_ref(&record));

        assert_eq!(collection.kind, "FeatureCollection");
        assert_eq!(collection.features.len(), 1);
        let ring = &collection.features[0].geometry.coordinates[0];
        assert_eq!(ring.len(), record.original_path.len());
        // Positions are [lng, lat]
        assert_eq!(ring[1], [4.0, 0.0]);
    }

    #[test]
    fn test_round_trip_preserves_fields() {
        let record = sample_record();
        let collection = to_feature_collection(std::slice::from_ref(&record));

        let json = serde_json::to_string(&collection).unwrap();
        let parsed: FeatureCollection = serde_json::from_str(&json).unwrap();
        let restored = records_from_feature_collection(&parsed).unwrap();

        assert_eq!(restored.len(), 1);
        let restored = &restored[0];
        assert_eq!(restored.id, record.id);
        assert_eq!(restored.original_path, record.original_path);
        assert_eq!(restored.name, record.name);
        assert_eq!(restored.geofence_type, record.geofence_type);
        assert_eq!(restored.priority, record.priority);
        assert_eq!(restored.parent_id, record.parent_id);
        assert_eq!(restored.metadata, record.metadata);
    }

    #[test]
    fn test_import_rejects_non_polygon_geometry() {
        let record = sample_record();
        let mut collection = to_feature_collection(&[record]);
        collection.features[0].geometry.kind = "MultiPolygon".to_string();

        let result = records_from_feature_collection(&collection);
        assert!(matches!(result, Err(GeofenceError::InvalidGeoJson(_))));
    }

    #[test]
    fn test_import_rejects_wrong_collection_kind() {
        let collection = FeatureCollection {
            kind: "GeometryCollection".to_string(),
            features: vec![],
        };
        assert!(records_from_feature_collection(&collection).is_err());
    }
}
