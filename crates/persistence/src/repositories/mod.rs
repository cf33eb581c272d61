//! Repository implementations.

pub mod geofence;

pub use geofence::GeofenceRepository;
