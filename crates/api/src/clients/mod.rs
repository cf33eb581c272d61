//! Clients for external services.

pub mod geoboundaries;
