//! Entity definitions (database row mappings).

pub mod geofence;

pub use geofence::GeofenceEntity;
