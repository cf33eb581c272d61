//! Shared utilities for the Geofence Manager backend.
//!
//! This crate provides common functionality used across all other crates:
//! - Common validation logic for coordinates, boundary paths and ISO codes

pub mod validation;
