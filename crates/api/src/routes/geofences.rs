//! Geofence hierarchy endpoint handlers.
//!
//! Every mutation follows the same shape: load the organization's full
//! collection, run it through the resolution engine, persist the outcome
//! atomically, and return the updated collection with any downstream
//! warnings.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use persistence::repositories::GeofenceRepository;

use domain::models::geofence::{
    CreateGeofenceRequest, GeofenceRecord, GeofenceResponse, ImportCountryRequest,
    ListGeofencesQuery, ListGeofencesResponse, MutationResponse, OrgScopeQuery,
    ReshapeGeofenceRequest, UpdateGeofenceRequest,
};
use domain::models::geojson::{self, FeatureCollection};
use domain::services::country;
use domain::services::hierarchy::HierarchyPolicy;
use domain::services::resolution::{
    DetailUpdate, NewGeofence, ResolutionOutcome, Resolver,
};

use crate::app::AppState;
use crate::error::ApiError;

fn policy(state: &AppState) -> HierarchyPolicy {
    HierarchyPolicy::new(state.config.hierarchy.rule())
}

/// Loads the full collection for one organization as domain records.
async fn load_snapshot(state: &AppState, org_id: Uuid) -> Result<Vec<GeofenceRecord>, ApiError> {
    let repo = GeofenceRepository::new(state.pool.clone());
    let entities = repo.find_all_by_org(org_id).await?;
    entities
        .into_iter()
        .map(|entity| GeofenceRecord::try_from(entity).map_err(ApiError::from))
        .collect()
}

/// Orders a write set so parents precede children. The hierarchy types are
/// strictly ranked (a parent's type always ranks above its child's), so a
/// stable sort by rank is sufficient.
fn order_for_write(records: &[GeofenceRecord], ids: &[Uuid]) -> Vec<Uuid> {
    let mut ordered = ids.to_vec();
    ordered.sort_by_key(|id| {
        records
            .iter()
            .find(|record| record.id == *id)
            .map(|record| record.geofence_type.rank())
            .unwrap_or(u8::MAX)
    });
    ordered
}

fn mutation_response(outcome: ResolutionOutcome) -> MutationResponse {
    MutationResponse {
        geofences: outcome
            .records
            .into_iter()
            .map(GeofenceResponse::from)
            .collect(),
        warnings: outcome
            .warnings
            .into_iter()
            .map(|warning| warning.message)
            .collect(),
    }
}

/// Create a new geofence from a drawn path.
///
/// POST /api/v1/geofences
pub async fn create_geofence(
    State(state): State<AppState>,
    Json(request): Json<CreateGeofenceRequest>,
) -> Result<(StatusCode, Json<MutationResponse>), ApiError> {
    request.validate()?;

    let records = load_snapshot(&state, request.org_id).await?;
    let outcome = Resolver::new(records, policy(&state)).create(NewGeofence {
        name: request.name,
        geofence_type: request.geofence_type,
        priority: request.priority,
        parent_id: request.parent_id,
        metadata: request.metadata,
        country_iso: None,
        path: request.path,
    })?;

    GeofenceRepository::new(state.pool.clone())
        .save_resolution(request.org_id, &outcome)
        .await?;

    info!(
        org_id = %request.org_id,
        geofence_id = ?outcome.created,
        changed = outcome.changed.len(),
        "geofence created"
    );
    Ok((StatusCode::CREATED, Json(mutation_response(outcome))))
}

/// List geofences with optional name search and type filter.
///
/// GET /api/v1/geofences
pub async fn list_geofences(
    State(state): State<AppState>,
    Query(query): Query<ListGeofencesQuery>,
) -> Result<Json<ListGeofencesResponse>, ApiError> {
    let repo = GeofenceRepository::new(state.pool.clone());
    let entities = repo
        .search(
            query.org_id,
            query.search.as_deref(),
            query.geofence_type.map(|t| t.as_str()),
        )
        .await?;

    let geofences: Vec<GeofenceResponse> = entities
        .into_iter()
        .map(|entity| {
            GeofenceRecord::try_from(entity)
                .map(GeofenceResponse::from)
                .map_err(ApiError::from)
        })
        .collect::<Result<_, _>>()?;

    let total = geofences.len();
    Ok(Json(ListGeofencesResponse { geofences, total }))
}

/// Replace a geofence's drawn path.
///
/// PUT /api/v1/geofences/:geofence_id/path
pub async fn reshape_geofence(
    State(state): State<AppState>,
    Path(geofence_id): Path<Uuid>,
    Json(request): Json<ReshapeGeofenceRequest>,
) -> Result<Json<MutationResponse>, ApiError> {
    request.validate()?;

    let records = load_snapshot(&state, request.org_id).await?;
    let outcome = Resolver::new(records, policy(&state)).reshape(geofence_id, request.path)?;

    GeofenceRepository::new(state.pool.clone())
        .save_resolution(request.org_id, &outcome)
        .await?;

    info!(
        org_id = %request.org_id,
        geofence_id = %geofence_id,
        changed = outcome.changed.len(),
        warnings = outcome.warnings.len(),
        "geofence reshaped"
    );
    Ok(Json(mutation_response(outcome)))
}

/// Partial update of name, priority, parent or metadata.
///
/// PATCH /api/v1/geofences/:geofence_id
pub async fn update_geofence(
    State(state): State<AppState>,
    Path(geofence_id): Path<Uuid>,
    Json(request): Json<UpdateGeofenceRequest>,
) -> Result<Json<MutationResponse>, ApiError> {
    request.validate()?;

    let records = load_snapshot(&state, request.org_id).await?;
    let outcome = Resolver::new(records, policy(&state)).update_details(
        geofence_id,
        DetailUpdate {
            name: request.name,
            priority: request.priority,
            parent_id: request.parent_id,
            metadata: request.metadata,
            country_iso: request.country_iso,
        },
    )?;

    GeofenceRepository::new(state.pool.clone())
        .save_resolution(request.org_id, &outcome)
        .await?;

    info!(
        org_id = %request.org_id,
        geofence_id = %geofence_id,
        changed = outcome.changed.len(),
        "geofence updated"
    );
    Ok(Json(mutation_response(outcome)))
}

/// Delete a geofence and its entire subtree.
///
/// DELETE /api/v1/geofences/:geofence_id
pub async fn delete_geofence(
    State(state): State<AppState>,
    Path(geofence_id): Path<Uuid>,
    Query(query): Query<OrgScopeQuery>,
) -> Result<Json<MutationResponse>, ApiError> {
    let records = load_snapshot(&state, query.org_id).await?;
    let outcome = Resolver::new(records, policy(&state)).delete(geofence_id)?;

    GeofenceRepository::new(state.pool.clone())
        .save_resolution(query.org_id, &outcome)
        .await?;

    info!(
        org_id = %query.org_id,
        geofence_id = %geofence_id,
        deleted = outcome.deleted.len(),
        "geofence deleted"
    );
    Ok(Json(mutation_response(outcome)))
}

/// Export the full hierarchy as GeoJSON, original paths only.
///
/// GET /api/v1/geofences/export
pub async fn export_geofences(
    State(state): State<AppState>,
    Query(query): Query<OrgScopeQuery>,
) -> Result<Json<FeatureCollection>, ApiError> {
    let records = load_snapshot(&state, query.org_id).await?;
    Ok(Json(geojson::to_feature_collection(&records)))
}

/// Import a GeoJSON feature collection and re-resolve the whole hierarchy.
///
/// Existing geofences with matching ids are replaced; unknown ids are
/// created. Effective areas are re-derived from scratch afterwards.
///
/// POST /api/v1/geofences/import
pub async fn import_geofences(
    State(state): State<AppState>,
    Query(query): Query<OrgScopeQuery>,
    Json(collection): Json<FeatureCollection>,
) -> Result<Json<MutationResponse>, ApiError> {
    let imported = geojson::records_from_feature_collection(&collection)?;
    let imported_ids: Vec<Uuid> = imported.iter().map(|record| record.id).collect();

    let mut records = load_snapshot(&state, query.org_id).await?;
    for record in imported {
        match records.iter_mut().find(|existing| existing.id == record.id) {
            Some(existing) => *existing = record,
            None => records.push(record),
        }
    }

    // Imported records arrive pre-assembled, so the per-mutation checks
    // never ran on them; an inconsistent collection rejects the import.
    let resolver = Resolver::new(records, policy(&state));
    resolver.validate_collection()?;
    let mut outcome = resolver.resolve_all();

    // Every imported record must be written even when re-resolution left
    // its effective area as-is, and the whole write set must stay
    // parents-before-children for the self-referencing foreign key.
    for id in &imported_ids {
        if !outcome.changed.contains(id) {
            outcome.changed.push(*id);
        }
    }
    outcome.changed = order_for_write(&outcome.records, &outcome.changed);

    GeofenceRepository::new(state.pool.clone())
        .save_resolution(query.org_id, &outcome)
        .await?;

    info!(
        org_id = %query.org_id,
        imported = imported_ids.len(),
        changed = outcome.changed.len(),
        "geofences imported"
    );
    Ok(Json(mutation_response(outcome)))
}

/// Import a country boundary from the configured boundary provider.
///
/// Each landmass becomes its own country geofence, created through the
/// regular resolution pipeline.
///
/// POST /api/v1/geofences/country
pub async fn import_country(
    State(state): State<AppState>,
    Json(request): Json<ImportCountryRequest>,
) -> Result<(StatusCode, Json<MutationResponse>), ApiError> {
    request.validate()?;

    let geometry = state.boundaries.fetch_adm0(&request.iso3).await?;
    let parts = country::country_parts(
        &request.name,
        &request.iso3,
        request.priority,
        request.metadata,
        &geometry,
    );
    if parts.is_empty() {
        return Err(ApiError::Unprocessable(
            "The boundary data contains no usable polygons.".to_string(),
        ));
    }
    let part_count = parts.len();

    let mut records = load_snapshot(&state, request.org_id).await?;
    let mut changed: Vec<Uuid> = Vec::new();
    let mut warnings = Vec::new();

    for part in parts {
        let outcome = Resolver::new(records, policy(&state)).create(part)?;
        for id in outcome.changed {
            if !changed.contains(&id) {
                changed.push(id);
            }
        }
        warnings.extend(outcome.warnings);
        records = outcome.records;
    }

    let combined = ResolutionOutcome {
        records,
        changed,
        created: None,
        deleted: Vec::new(),
        warnings,
    };

    GeofenceRepository::new(state.pool.clone())
        .save_resolution(request.org_id, &combined)
        .await?;

    info!(
        org_id = %request.org_id,
        iso3 = %request.iso3,
        parts = part_count,
        "country imported"
    );
    Ok((StatusCode::CREATED, Json(mutation_response(combined))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::models::geofence::{Coordinate, GeofenceType};
    use std::collections::HashMap;

    fn record(geofence_type: GeofenceType, parent_id: Option<Uuid>) -> GeofenceRecord {
        let path = vec![
            Coordinate { lat: 0.0, lng: 0.0 },
            Coordinate { lat: 0.0, lng: 1.0 },
            Coordinate { lat: 1.0, lng: 1.0 },
        ];
        GeofenceRecord {
            id: Uuid::new_v4(),
            original_path: path.clone(),
            clipped_path: path,
            name: format!("{:?}", geofence_type),
            geofence_type,
            priority: 1,
            parent_id,
            metadata: HashMap::new(),
            country_iso: None,
        }
    }

    #[test]
    fn test_order_for_write_puts_parents_first() {
        let country = record(GeofenceType::Country, None);
        let branch = record(GeofenceType::Branch, Some(country.id));
        let sub = record(GeofenceType::SubBranch, Some(branch.id));
        let records = vec![country.clone(), branch.clone(), sub.clone()];

        // A child listed before its ancestors must still be written last.
        let ordered = order_for_write(&records, &[sub.id, branch.id, country.id]);
        assert_eq!(ordered, vec![country.id, branch.id, sub.id]);
    }

    #[test]
    fn test_order_for_write_is_stable_within_rank() {
        let country = record(GeofenceType::Country, None);
        let b1 = record(GeofenceType::Branch, Some(country.id));
        let b2 = record(GeofenceType::Branch, Some(country.id));
        let records = vec![country.clone(), b1.clone(), b2.clone()];

        let ordered = order_for_write(&records, &[b2.id, b1.id, country.id]);
        assert_eq!(ordered, vec![country.id, b2.id, b1.id]);
    }
}
