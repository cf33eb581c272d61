//! Geofence repository for database operations.

use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use domain::models::geofence::GeofenceRecord;
use domain::services::resolution::ResolutionOutcome;

use crate::entities::GeofenceEntity;
use crate::metrics::QueryTimer;

/// Repository for geofence-related database operations.
///
/// All reads and writes are scoped to a single organization. Mutations go
/// through [`save_resolution`](GeofenceRepository::save_resolution), which
/// writes a whole resolution outcome atomically.
#[derive(Clone)]
pub struct GeofenceRepository {
    pool: PgPool,
}

impl GeofenceRepository {
    /// Creates a new GeofenceRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Load the full geofence collection for an organization, the hierarchy
    /// snapshot the resolution engine runs against.
    pub async fn find_all_by_org(&self, org_id: Uuid) -> Result<Vec<GeofenceEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_geofences_by_org");
        let result = sqlx::query_as::<_, GeofenceEntity>(
            r#"
            SELECT * FROM geofences
            WHERE org_id = $1
            ORDER BY priority ASC, created_at ASC
            "#,
        )
        .bind(org_id)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Filtered listing: optional case-insensitive name search and optional
    /// type filter.
    pub async fn search(
        &self,
        org_id: Uuid,
        name_contains: Option<&str>,
        geofence_type: Option<&str>,
    ) -> Result<Vec<GeofenceEntity>, sqlx::Error> {
        let timer = QueryTimer::new("search_geofences");
        let pattern = name_contains.map(|term| format!("%{}%", term));
        let result = sqlx::query_as::<_, GeofenceEntity>(
            r#"
            SELECT * FROM geofences
            WHERE org_id = $1
              AND ($2::text IS NULL OR name ILIKE $2)
              AND ($3::text IS NULL OR geofence_type = $3)
            ORDER BY priority ASC, created_at ASC
            "#,
        )
        .bind(org_id)
        .bind(pattern)
        .bind(geofence_type)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Find a single geofence by id within an organization.
    pub async fn find_by_id(
        &self,
        org_id: Uuid,
        id: Uuid,
    ) -> Result<Option<GeofenceEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_geofence_by_id");
        let result = sqlx::query_as::<_, GeofenceEntity>(
            r#"
            SELECT * FROM geofences WHERE org_id = $1 AND id = $2
            "#,
        )
        .bind(org_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Persist a resolution outcome atomically: upserts for every changed
    /// record, deletes for the removed subtree.
    ///
    /// A per-organization advisory lock serializes concurrent mutations so
    /// two in-flight resolutions cannot interleave their snapshots.
    pub async fn save_resolution(
        &self,
        org_id: Uuid,
        outcome: &ResolutionOutcome,
    ) -> Result<(), sqlx::Error> {
        let timer = QueryTimer::new("save_resolution");
        let result = self.save_resolution_inner(org_id, outcome).await;
        timer.record();
        result
    }

    async fn save_resolution_inner(
        &self,
        org_id: Uuid,
        outcome: &ResolutionOutcome,
    ) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1::text, 0))")
            .bind(org_id.to_string())
            .execute(&mut *tx)
            .await?;

        if !outcome.deleted.is_empty() {
            sqlx::query(
                r#"
                DELETE FROM geofences WHERE org_id = $1 AND id = ANY($2)
                "#,
            )
            .bind(org_id)
            .bind(&outcome.deleted)
            .execute(&mut *tx)
            .await?;
        }

        // The changed list is ordered parents-before-children, which keeps
        // the self-referencing foreign key satisfied on insert.
        for id in &outcome.changed {
            let Some(record) = outcome.records.iter().find(|record| record.id == *id) else {
                continue;
            };
            upsert(&mut tx, org_id, record).await?;
        }

        tracing::debug!(
            org_id = %org_id,
            upserted = outcome.changed.len(),
            deleted = outcome.deleted.len(),
            "resolution outcome persisted"
        );
        tx.commit().await
    }
}

async fn upsert(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    org_id: Uuid,
    record: &GeofenceRecord,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO geofences (id, org_id, name, geofence_type, priority, parent_id,
                               original_path, clipped_path, metadata, country_iso)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        ON CONFLICT (id) DO UPDATE SET
            name = EXCLUDED.name,
            geofence_type = EXCLUDED.geofence_type,
            priority = EXCLUDED.priority,
            parent_id = EXCLUDED.parent_id,
            original_path = EXCLUDED.original_path,
            clipped_path = EXCLUDED.clipped_path,
            metadata = EXCLUDED.metadata,
            country_iso = EXCLUDED.country_iso,
            updated_at = NOW()
        "#,
    )
    .bind(record.id)
    .bind(org_id)
    .bind(&record.name)
    .bind(record.geofence_type.as_str())
    .bind(record.priority)
    .bind(record.parent_id)
    .bind(Json(&record.original_path))
    .bind(Json(&record.clipped_path))
    .bind(Json(&record.metadata))
    .bind(&record.country_iso)
    .execute(&mut **tx)
    .await?;
    Ok(())
}
