//! Domain error types for geofence mutations.
//!
//! Every variant carries the user-facing message surfaced by the UI layer.
//! A mutation that returns an error leaves the record collection untouched.

use thiserror::Error;
use uuid::Uuid;

/// Errors raised while validating or resolving a geofence mutation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeofenceError {
    /// Illegal or missing parent/type relationship; rejected before any
    /// geometry runs.
    #[error("{0}")]
    Structure(String),

    /// Two same-priority siblings would overlap.
    #[error("Polygons with the same priority cannot overlap. Please adjust the priority or shape.")]
    PriorityConflict,

    /// The drawn or edited shape does not intersect its parent as a single
    /// polygon.
    #[error("The polygon must be completely within its parent geofence.")]
    OutsideParent,

    /// The path has fewer than 3 distinct points and cannot form a polygon.
    #[error("A geofence boundary requires at least 3 distinct points.")]
    DegeneratePath,

    /// The referenced geofence does not exist in the collection.
    #[error("Geofence not found: {0}")]
    NotFound(Uuid),

    /// An imported feature collection could not be interpreted.
    #[error("Invalid GeoJSON: {0}")]
    InvalidGeoJson(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_are_user_facing() {
        assert_eq!(
            GeofenceError::PriorityConflict.to_string(),
            "Polygons with the same priority cannot overlap. Please adjust the priority or shape."
        );
        assert_eq!(
            GeofenceError::OutsideParent.to_string(),
            "The polygon must be completely within its parent geofence."
        );
        assert_eq!(
            GeofenceError::Structure("Please select a parent geofence for Branch.".into())
                .to_string(),
            "Please select a parent geofence for Branch."
        );
    }
}
