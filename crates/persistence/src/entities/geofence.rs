//! Geofence entity (database row mapping).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use domain::models::geofence::{Coordinate, GeofenceRecord, GeofenceType};

/// Database row mapping for the geofences table.
///
/// Paths and metadata are stored as JSONB; the two paths are kept as
/// separate columns so the drawn shape survives every re-resolution of the
/// effective one.
#[derive(Debug, Clone, FromRow)]
pub struct GeofenceEntity {
    pub id: Uuid,
    pub org_id: Uuid,
    pub name: String,
    pub geofence_type: String,
    pub priority: i32,
    pub parent_id: Option<Uuid>,
    pub original_path: Json<Vec<Coordinate>>,
    pub clipped_path: Json<Vec<Coordinate>>,
    pub metadata: Json<HashMap<String, String>>,
    pub country_iso: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<GeofenceEntity> for GeofenceRecord {
    type Error = sqlx::Error;

    fn try_from(entity: GeofenceEntity) -> Result<Self, Self::Error> {
        let geofence_type = GeofenceType::parse(&entity.geofence_type).ok_or_else(|| {
            sqlx::Error::Decode(
                format!("unknown geofence type {:?}", entity.geofence_type).into(),
            )
        })?;

        Ok(Self {
            id: entity.id,
            original_path: entity.original_path.0,
            clipped_path: entity.clipped_path.0,
            name: entity.name,
            geofence_type,
            priority: entity.priority,
            parent_id: entity.parent_id,
            metadata: entity.metadata.0,
            country_iso: entity.country_iso,
        })
    }
}
