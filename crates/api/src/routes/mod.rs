//! Route handlers.

pub mod geofences;
pub mod health;
