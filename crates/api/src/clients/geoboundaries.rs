//! geoBoundaries API client.
//!
//! Country imports fetch ADM0 (country-level) boundaries in two steps: a
//! metadata request keyed by ISO3 code, then a download of the GeoJSON it
//! points at. The first feature with a Polygon or MultiPolygon geometry is
//! the country boundary; other geometry types are skipped.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::info;

use domain::services::country::{BoundaryError, BoundaryGeometry, BoundarySource};

use crate::config::BoundariesConfig;

/// Metadata returned by the geoBoundaries API for one ISO3/ADM level pair.
#[derive(Debug, Deserialize)]
struct BoundaryMeta {
    #[serde(rename = "gjDownloadURL")]
    gj_download_url: String,
}

#[derive(Debug, Deserialize)]
struct BoundaryFeatureCollection {
    features: Vec<BoundaryFeature>,
}

/// Geometry kept as raw JSON so unsupported types (Point, LineString, ...)
/// don't fail the whole collection.
#[derive(Debug, Deserialize)]
struct BoundaryFeature {
    #[serde(default)]
    geometry: serde_json::Value,
}

/// Scans the collection for the first Polygon or MultiPolygon feature.
fn first_boundary_geometry(collection: BoundaryFeatureCollection) -> Option<BoundaryGeometry> {
    collection
        .features
        .into_iter()
        .find_map(|feature| serde_json::from_value(feature.geometry).ok())
}

/// HTTP client for the geoBoundaries open data API.
pub struct GeoBoundariesClient {
    client: Client,
    base_url: String,
}

impl GeoBoundariesClient {
    pub fn new(config: &BoundariesConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl BoundarySource for GeoBoundariesClient {
    async fn fetch_adm0(&self, iso3: &str) -> Result<BoundaryGeometry, BoundaryError> {
        let meta_url = format!("{}/{}/ADM0/", self.base_url, iso3);
        info!(iso3, "fetching country boundary metadata");

        let response = self
            .client
            .get(&meta_url)
            .send()
            .await
            .map_err(|e| BoundaryError::Unavailable(e.to_string()))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(BoundaryError::NotFound(iso3.to_string()));
        }
        let response = response
            .error_for_status()
            .map_err(|e| BoundaryError::Unavailable(e.to_string()))?;

        let meta: BoundaryMeta = response
            .json()
            .await
            .map_err(|e| BoundaryError::Malformed(iso3.to_string(), e.to_string()))?;

        let collection: BoundaryFeatureCollection = self
            .client
            .get(&meta.gj_download_url)
            .send()
            .await
            .map_err(|e| BoundaryError::Unavailable(e.to_string()))?
            .error_for_status()
            .map_err(|e| BoundaryError::Unavailable(e.to_string()))?
            .json()
            .await
            .map_err(|e| BoundaryError::Malformed(iso3.to_string(), e.to_string()))?;

        first_boundary_geometry(collection).ok_or_else(|| {
            BoundaryError::Malformed(
                iso3.to_string(),
                "no Polygon or MultiPolygon feature found".into(),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meta_deserializes() {
        let json = r#"{"boundaryISO":"KEN","gjDownloadURL":"https://example.org/KEN-ADM0.geojson"}"#;
        let meta: BoundaryMeta = serde_json::from_str(json).unwrap();
        assert_eq!(meta.gj_download_url, "https://example.org/KEN-ADM0.geojson");
    }

    #[test]
    fn test_feature_collection_deserializes() {
        let json = r#"{
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "properties": {},
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 0.0]]]
                }
            }]
        }"#;
        let collection: BoundaryFeatureCollection = serde_json::from_str(json).unwrap();
        assert_eq!(collection.features.len(), 1);
        assert!(matches!(
            first_boundary_geometry(collection),
            Some(BoundaryGeometry::Polygon(_))
        ));
    }

    #[test]
    fn test_first_boundary_geometry_skips_unsupported_types() {
        let json = r#"{
            "type": "FeatureCollection",
            "features": [
                {
                    "type": "Feature",
                    "properties": {},
                    "geometry": {"type": "Point", "coordinates": [36.8, -1.3]}
                },
                {
                    "type": "Feature",
                    "properties": {}
                },
                {
                    "type": "Feature",
                    "properties": {},
                    "geometry": {
                        "type": "Polygon",
                        "coordinates": [[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 0.0]]]
                    }
                }
            ]
        }"#;
        let collection: BoundaryFeatureCollection = serde_json::from_str(json).unwrap();
        assert!(matches!(
            first_boundary_geometry(collection),
            Some(BoundaryGeometry::Polygon(_))
        ));
    }

    #[test]
    fn test_first_boundary_geometry_none_without_polygons() {
        let json = r#"{
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "properties": {},
                "geometry": {"type": "LineString", "coordinates": [[0.0, 0.0], [1.0, 1.0]]}
            }]
        }"#;
        let collection: BoundaryFeatureCollection = serde_json::from_str(json).unwrap();
        assert!(first_boundary_geometry(collection).is_none());
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let config = BoundariesConfig {
            base_url: "https://example.org/api/".to_string(),
            timeout_ms: 1000,
        };
        let client = GeoBoundariesClient::new(&config).unwrap();
        assert_eq!(client.base_url, "https://example.org/api");
    }
}
