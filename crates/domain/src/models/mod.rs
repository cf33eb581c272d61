//! Domain models.

pub mod geofence;
pub mod geojson;

pub use geofence::{Coordinate, GeofenceRecord, GeofenceType};
