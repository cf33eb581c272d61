//! Domain layer for the Geofence Manager backend.
//!
//! This crate contains:
//! - Domain models (geofence records, GeoJSON interchange types)
//! - The hierarchy resolution engine (validation, clipping, downstream
//!   re-derivation)
//! - Domain error types

pub mod error;
pub mod models;
pub mod services;

pub use error::GeofenceError;
