//! Business logic services.

pub mod clipping;
pub mod country;
pub mod geometry;
pub mod hierarchy;
pub mod resolution;
