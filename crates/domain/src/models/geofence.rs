//! Geofence domain model.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

/// Position of a geofence type in the organizational hierarchy.
///
/// `Country` is the root type; every other type sits one level below its
/// predecessor.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum GeofenceType {
    Country,
    Branch,
    SubBranch,
    FieldOfficer,
}

impl GeofenceType {
    /// Converts to database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            GeofenceType::Country => "country",
            GeofenceType::Branch => "branch",
            GeofenceType::SubBranch => "sub_branch",
            GeofenceType::FieldOfficer => "field_officer",
        }
    }

    /// Parses from database string representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "country" => Some(GeofenceType::Country),
            "branch" => Some(GeofenceType::Branch),
            "sub_branch" => Some(GeofenceType::SubBranch),
            "field_officer" => Some(GeofenceType::FieldOfficer),
            _ => None,
        }
    }

    /// Human-readable label used in user-facing messages.
    pub fn label(&self) -> &'static str {
        match self {
            GeofenceType::Country => "Country",
            GeofenceType::Branch => "Branch",
            GeofenceType::SubBranch => "Sub-branch",
            GeofenceType::FieldOfficer => "Field Officer",
        }
    }

    /// Depth of the type in the hierarchy; smaller is closer to the root.
    pub fn rank(&self) -> u8 {
        match self {
            GeofenceType::Country => 0,
            GeofenceType::Branch => 1,
            GeofenceType::SubBranch => 2,
            GeofenceType::FieldOfficer => 3,
        }
    }
}

/// A latitude/longitude pair. No range validation happens at this level;
/// request types validate ranges before a coordinate reaches the engine.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

/// The core geofence entity.
///
/// `original_path` is the boundary exactly as drawn or imported and is the
/// source of truth for export. `clipped_path` is the derived effective
/// boundary; it is owned exclusively by the resolution engine and may be
/// recomputed as a side effect of mutations to ancestors or siblings. An
/// empty `clipped_path` means the effective area was fully consumed by
/// higher-precedence regions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GeofenceRecord {
    pub id: Uuid,
    pub original_path: Vec<Coordinate>,
    pub clipped_path: Vec<Coordinate>,
    pub name: String,
    pub geofence_type: GeofenceType,
    pub priority: i32,
    pub parent_id: Option<Uuid>,
    pub metadata: HashMap<String, String>,
    pub country_iso: Option<String>,
}

/// Validates a drawn boundary path: at least 3 points, every coordinate in
/// range.
pub fn validate_path(path: &[Coordinate]) -> Result<(), ValidationError> {
    if path.len() < 3 {
        let mut err = ValidationError::new("path_length");
        err.message = Some("A geofence boundary requires at least 3 points".into());
        return Err(err);
    }
    for coord in path {
        shared::validation::validate_latitude(coord.lat)?;
        shared::validation::validate_longitude(coord.lng)?;
    }
    Ok(())
}

/// Request payload for creating a geofence from a drawn path.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateGeofenceRequest {
    pub org_id: Uuid,

    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,

    #[serde(rename = "type")]
    pub geofence_type: GeofenceType,

    #[validate(custom(function = "shared::validation::validate_priority"))]
    pub priority: i32,

    pub parent_id: Option<Uuid>,

    #[serde(default)]
    pub metadata: HashMap<String, String>,

    #[validate(custom(function = "validate_path"))]
    pub path: Vec<Coordinate>,
}

/// Request payload for reshaping an existing geofence.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ReshapeGeofenceRequest {
    pub org_id: Uuid,

    #[validate(custom(function = "validate_path"))]
    pub path: Vec<Coordinate>,
}

/// Request payload for editing a geofence's details (partial update).
///
/// The type of a geofence is immutable after creation; changing it would
/// invalidate parent/child legality.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateGeofenceRequest {
    pub org_id: Uuid,

    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: Option<String>,

    #[validate(custom(function = "shared::validation::validate_priority"))]
    pub priority: Option<i32>,

    pub parent_id: Option<Uuid>,

    pub metadata: Option<HashMap<String, String>>,

    #[validate(custom(function = "shared::validation::validate_iso3"))]
    pub country_iso: Option<String>,
}

/// Request payload for importing a country boundary by ISO code.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ImportCountryRequest {
    pub org_id: Uuid,

    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,

    #[validate(custom(function = "shared::validation::validate_iso3"))]
    pub iso3: String,

    #[validate(custom(function = "shared::validation::validate_priority"))]
    pub priority: i32,

    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// Query parameters for listing geofences within an organizational scope.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListGeofencesQuery {
    pub org_id: Uuid,
    pub search: Option<String>,
    #[serde(rename = "type")]
    pub geofence_type: Option<GeofenceType>,
}

/// Query parameter carrying only the organizational scope. Used by
/// endpoints whose payload is in the path or body.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrgScopeQuery {
    pub org_id: Uuid,
}

/// Response payload for a single geofence.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeofenceResponse {
    pub id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub geofence_type: GeofenceType,
    pub priority: i32,
    pub parent_id: Option<Uuid>,
    pub metadata: HashMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country_iso: Option<String>,
    pub original_path: Vec<Coordinate>,
    pub clipped_path: Vec<Coordinate>,
}

impl From<GeofenceRecord> for GeofenceResponse {
    fn from(record: GeofenceRecord) -> Self {
        Self {
            id: record.id,
            name: record.name,
            geofence_type: record.geofence_type,
            priority: record.priority,
            parent_id: record.parent_id,
            metadata: record.metadata,
            country_iso: record.country_iso,
            original_path: record.original_path,
            clipped_path: record.clipped_path,
        }
    }
}

/// Response for listing geofences.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListGeofencesResponse {
    pub geofences: Vec<GeofenceResponse>,
    pub total: usize,
}

/// Response for mutations that re-resolve parts of the hierarchy.
///
/// `warnings` carries non-fatal downstream messages (e.g. a descendant whose
/// effective area was cleared); the UI layer decides how to present them.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationResponse {
    pub geofences: Vec<GeofenceResponse>,
    pub warnings: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geofence_type_round_trip() {
        for gt in [
            GeofenceType::Country,
            GeofenceType::Branch,
            GeofenceType::SubBranch,
            GeofenceType::FieldOfficer,
        ] {
            assert_eq!(GeofenceType::parse(gt.as_str()), Some(gt));
        }
        assert_eq!(GeofenceType::parse("region"), None);
    }

    #[test]
    fn test_geofence_type_serialization() {
        let json = serde_json::to_string(&GeofenceType::SubBranch).unwrap();
        assert_eq!(json, "\"sub_branch\"");
        let parsed: GeofenceType = serde_json::from_str("\"field_officer\"").unwrap();
        assert_eq!(parsed, GeofenceType::FieldOfficer);
    }

    #[test]
    fn test_geofence_type_rank_ordering() {
        assert!(GeofenceType::Country.rank() < GeofenceType::Branch.rank());
        assert!(GeofenceType::Branch.rank() < GeofenceType::SubBranch.rank());
        assert!(GeofenceType::SubBranch.rank() < GeofenceType::FieldOfficer.rank());
    }

    #[test]
    fn test_validate_path_too_short() {
        let path = vec![
            Coordinate { lat: 0.0, lng: 0.0 },
            Coordinate { lat: 1.0, lng: 1.0 },
        ];
        assert!(validate_path(&path).is_err());
    }

    #[test]
    fn test_validate_path_out_of_range() {
        let path = vec![
            Coordinate { lat: 0.0, lng: 0.0 },
            Coordinate { lat: 95.0, lng: 1.0 },
            Coordinate { lat: 1.0, lng: 1.0 },
        ];
        assert!(validate_path(&path).is_err());
    }

    #[test]
    fn test_create_request_deserialization() {
        let json = r#"{
            "orgId": "550e8400-e29b-41d4-a716-446655440000",
            "name": "Nairobi Branch",
            "type": "branch",
            "priority": 1,
            "parentId": "660e8400-e29b-41d4-a716-446655440000",
            "path": [
                {"lat": 1.0, "lng": 1.0},
                {"lat": 1.0, "lng": 9.0},
                {"lat": 9.0, "lng": 9.0}
            ]
        }"#;

        let request: CreateGeofenceRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.name, "Nairobi Branch");
        assert_eq!(request.geofence_type, GeofenceType::Branch);
        assert_eq!(request.priority, 1);
        assert!(request.parent_id.is_some());
        assert!(request.metadata.is_empty());
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_update_request_partial() {
        let json = r#"{
            "orgId": "550e8400-e29b-41d4-a716-446655440000",
            "priority": 3
        }"#;
        let request: UpdateGeofenceRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.priority, Some(3));
        assert!(request.name.is_none());
        assert!(request.parent_id.is_none());
        assert!(request.metadata.is_none());
    }

    #[test]
    fn test_geofence_response_skips_missing_iso() {
        let record = GeofenceRecord {
            id: Uuid::new_v4(),
            original_path: vec![],
            clipped_path: vec![],
            name: "Test".to_string(),
            geofence_type: GeofenceType::Branch,
            priority: 1,
            parent_id: None,
            metadata: HashMap::new(),
            country_iso: None,
        };

        let json = serde_json::to_string(&GeofenceResponse::from(record)).unwrap();
        assert!(json.contains("\"type\":\"branch\""));
        assert!(!json.contains("countryIso"));
    }
}
