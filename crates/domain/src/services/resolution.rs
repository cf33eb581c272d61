//! The hierarchy resolution engine.
//!
//! A [`Resolver`] takes a snapshot of the full geofence collection for one
//! organizational scope, applies exactly one mutation (create, reshape,
//! detail update or delete), re-derives every transitively affected
//! effective area, and returns the full updated collection. A mutation is
//! accepted or rejected as one unit; on rejection the caller keeps its
//! previous collection untouched.
//!
//! Re-derivation always starts from a record's ORIGINAL path, clipped
//! against the parent's freshly-resolved effective area and then against
//! higher-precedence siblings, so repeated resolution of an already
//! consistent tree is a fixed point.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use crate::error::GeofenceError;
use crate::models::geofence::{Coordinate, GeofenceRecord, GeofenceType};
use crate::services::clipping;
use crate::services::geometry;
use crate::services::hierarchy::{validate_structure, HierarchyIndex, HierarchyPolicy};

/// A geofence waiting to be created: form data plus the drawn path.
#[derive(Debug, Clone)]
pub struct NewGeofence {
    pub name: String,
    pub geofence_type: GeofenceType,
    pub priority: i32,
    pub parent_id: Option<Uuid>,
    pub metadata: HashMap<String, String>,
    pub country_iso: Option<String>,
    pub path: Vec<Coordinate>,
}

/// Partial update of a geofence's details. `None` fields are left unchanged;
/// the geofence type is immutable.
#[derive(Debug, Clone, Default)]
pub struct DetailUpdate {
    pub name: Option<String>,
    pub priority: Option<i32>,
    pub parent_id: Option<Uuid>,
    pub metadata: Option<HashMap<String, String>>,
    pub country_iso: Option<String>,
}

/// A non-fatal downstream message: a record whose effective area was
/// cleared while propagating a mutation it did not trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionWarning {
    pub id: Uuid,
    pub name: String,
    pub message: String,
}

/// The result of a successful mutation: the FULL updated collection plus
/// bookkeeping for the persistence layer.
#[derive(Debug, Clone)]
pub struct ResolutionOutcome {
    /// Every record in the scope, mutated records replaced.
    pub records: Vec<GeofenceRecord>,
    /// Ids whose stored form changed and must be written.
    pub changed: Vec<Uuid>,
    /// The id assigned by a create mutation.
    pub created: Option<Uuid>,
    /// Ids removed by a delete mutation, subtree included.
    pub deleted: Vec<Uuid>,
    /// Non-fatal downstream messages for the UI layer.
    pub warnings: Vec<ResolutionWarning>,
}

enum DeriveFailure {
    /// The original path cannot form a polygon.
    Degenerate,
    /// Disjoint from the parent, or the overlap is not a single polygon.
    OutsideParent,
    /// The parent's own effective area is empty or the parent is missing.
    ParentConsumed,
}

/// Resolution engine over one scope's record collection.
pub struct Resolver {
    records: Vec<GeofenceRecord>,
    index: HierarchyIndex,
    policy: HierarchyPolicy,
    changed: Vec<Uuid>,
    changed_set: HashSet<Uuid>,
    warnings: Vec<ResolutionWarning>,
}

impl Resolver {
    pub fn new(records: Vec<GeofenceRecord>, policy: HierarchyPolicy) -> Self {
        let index = HierarchyIndex::build(&records);
        Self {
            records,
            index,
            policy,
            changed: Vec::new(),
            changed_set: HashSet::new(),
            warnings: Vec::new(),
        }
    }

    /// Creates a geofence from a drawn or imported path.
    pub fn create(mut self, request: NewGeofence) -> Result<ResolutionOutcome, GeofenceError> {
        // Country is a root type; a supplied parent id is cleared, not
        // rejected.
        let parent_id = if request.geofence_type == GeofenceType::Country {
            None
        } else {
            request.parent_id
        };

        validate_structure(
            request.geofence_type,
            parent_id,
            &self.policy,
            &self.records,
            &self.index,
        )?;

        // Only Country records carry an ISO code.
        let country_iso = if request.geofence_type == GeofenceType::Country {
            request.country_iso
        } else {
            None
        };

        let id = Uuid::new_v4();

        let siblings = self.sibling_refs(parent_id, request.geofence_type, Some(id));
        if clipping::has_same_priority_overlap(&request.path, request.priority, &siblings) {
            return Err(GeofenceError::PriorityConflict);
        }

        let clipped = self
            .derive_effective(
                &request.path,
                parent_id,
                request.geofence_type,
                request.priority,
                id,
            )
            .map_err(triggering_error)?;

        self.records.push(GeofenceRecord {
            id,
            original_path: request.path,
            clipped_path: clipped,
            name: request.name,
            geofence_type: request.geofence_type,
            priority: request.priority,
            parent_id,
            metadata: request.metadata,
            country_iso,
        });
        self.index = HierarchyIndex::build(&self.records);
        self.mark_changed(id);

        self.resolve_downstream(id);
        Ok(self.into_outcome(Some(id), Vec::new()))
    }

    /// Replaces a geofence's drawn path and re-resolves everything that
    /// depends on it.
    pub fn reshape(
        mut self,
        id: Uuid,
        new_path: Vec<Coordinate>,
    ) -> Result<ResolutionOutcome, GeofenceError> {
        let pos = self
            .index
            .position(id)
            .ok_or(GeofenceError::NotFound(id))?;
        let (parent_id, geofence_type, priority) = {
            let record = &self.records[pos];
            (record.parent_id, record.geofence_type, record.priority)
        };

        let siblings = self.sibling_refs(parent_id, geofence_type, Some(id));
        if clipping::has_same_priority_overlap(&new_path, priority, &siblings) {
            return Err(GeofenceError::PriorityConflict);
        }

        let clipped = self
            .derive_effective(&new_path, parent_id, geofence_type, priority, id)
            .map_err(triggering_error)?;

        let record = &mut self.records[pos];
        record.original_path = new_path;
        record.clipped_path = clipped;
        self.mark_changed(id);

        self.resolve_downstream(id);
        Ok(self.into_outcome(None, Vec::new()))
    }

    /// Applies a partial detail update. A priority or parent change re-runs
    /// the full clipping pipeline for the record and re-resolves both the
    /// old and the new sibling group.
    pub fn update_details(
        mut self,
        id: Uuid,
        update: DetailUpdate,
    ) -> Result<ResolutionOutcome, GeofenceError> {
        let pos = self
            .index
            .position(id)
            .ok_or(GeofenceError::NotFound(id))?;
        let old = self.records[pos].clone();

        let new_priority = update.priority.unwrap_or(old.priority);
        let new_parent = if old.geofence_type == GeofenceType::Country {
            None
        } else {
            update.parent_id.or(old.parent_id)
        };

        validate_structure(
            old.geofence_type,
            new_parent,
            &self.policy,
            &self.records,
            &self.index,
        )?;

        if let Some(parent_id) = new_parent {
            if self.index.is_self_or_descendant(parent_id, id) {
                return Err(GeofenceError::Structure(
                    "A geofence cannot be placed inside itself or one of its descendants."
                        .to_string(),
                ));
            }
        }

        let geometry_affecting = new_parent != old.parent_id || new_priority != old.priority;

        {
            let record = &mut self.records[pos];
            if let Some(name) = update.name {
                record.name = name;
            }
            if let Some(metadata) = update.metadata {
                record.metadata = metadata;
            }
            if let Some(iso) = update.country_iso {
                // Only Country records carry an ISO code.
                if record.geofence_type == GeofenceType::Country {
                    record.country_iso = Some(iso);
                }
            }
            record.priority = new_priority;
            record.parent_id = new_parent;
        }
        self.mark_changed(id);

        if !geometry_affecting {
            return Ok(self.into_outcome(None, Vec::new()));
        }

        self.index = HierarchyIndex::build(&self.records);

        let siblings = self.sibling_refs(new_parent, old.geofence_type, Some(id));
        if clipping::has_same_priority_overlap(&old.original_path, new_priority, &siblings) {
            return Err(GeofenceError::PriorityConflict);
        }

        // Feasibility of the move is checked up front so the triggering
        // mutation still fails loudly; the group re-derivation below only
        // warns.
        self.check_parent_feasibility(&old.original_path, new_parent)
            .map_err(triggering_error)?;

        if new_parent == old.parent_id {
            // Priority change within the group: every member at or below
            // the smaller of the two priorities is re-derived, the record
            // itself among them at its new position.
            let threshold = old.priority.min(new_priority);
            self.rederive_group(old.parent_id, old.geofence_type, threshold, None);
        } else {
            // The old group releases the record's area...
            self.rederive_group(old.parent_id, old.geofence_type, old.priority, None);
            // ...and the new group absorbs it.
            self.rederive_group(new_parent, old.geofence_type, new_priority, None);
        }

        Ok(self.into_outcome(None, Vec::new()))
    }

    /// Deletes a geofence and its entire descendant subtree.
    pub fn delete(mut self, id: Uuid) -> Result<ResolutionOutcome, GeofenceError> {
        self.index
            .position(id)
            .ok_or(GeofenceError::NotFound(id))?;

        let mut doomed = vec![id];
        let mut cursor = 0;
        while cursor < doomed.len() {
            doomed.extend_from_slice(self.index.children_of(doomed[cursor]));
            cursor += 1;
        }

        let doomed_set: HashSet<Uuid> = doomed.iter().copied().collect();
        self.records.retain(|record| !doomed_set.contains(&record.id));
        self.index = HierarchyIndex::build(&self.records);

        Ok(self.into_outcome(None, doomed))
    }

    /// Validates the whole collection without mutating it: every record's
    /// parent/type relationship must be legal and no two same-priority
    /// siblings may overlap on their original paths. Run before committing
    /// a bulk import, where records arrive pre-assembled instead of through
    /// the single-mutation pipelines.
    pub fn validate_collection(&self) -> Result<(), GeofenceError> {
        for record in &self.records {
            validate_structure(
                record.geofence_type,
                record.parent_id,
                &self.policy,
                &self.records,
                &self.index,
            )?;

            let siblings =
                self.sibling_refs(record.parent_id, record.geofence_type, Some(record.id));
            if clipping::has_same_priority_overlap(
                &record.original_path,
                record.priority,
                &siblings,
            ) {
                return Err(GeofenceError::PriorityConflict);
            }
        }
        Ok(())
    }

    /// Re-derives every effective area in the collection from scratch,
    /// top-down. Used after a bulk import; on an already consistent tree
    /// this is a no-op.
    pub fn resolve_all(mut self) -> ResolutionOutcome {
        let mut roots: Vec<(i32, Uuid)> = self
            .records
            .iter()
            .filter(|record| record.parent_id.is_none())
            .map(|record| (record.priority, record.id))
            .collect();
        roots.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));

        for (_, root) in &roots {
            self.rederive(*root);
        }
        for (_, root) in &roots {
            self.rederive_descendants(*root);
        }

        // Records whose parent id points outside the collection are still
        // visited so their effective areas get cleared with a warning.
        let orphans: Vec<Uuid> = self
            .records
            .iter()
            .filter(|record| {
                record
                    .parent_id
                    .is_some_and(|parent| self.index.position(parent).is_none())
            })
            .map(|record| record.id)
            .collect();
        for orphan in orphans {
            self.rederive(orphan);
            self.rederive_descendants(orphan);
        }

        self.into_outcome(None, Vec::new())
    }

    /// Re-derives everything downstream of a freshly committed change to
    /// `id`: lower-precedence siblings first, then the subtrees of the
    /// record and of each re-derived sibling, depth-first.
    fn resolve_downstream(&mut self, id: Uuid) {
        let Some(pos) = self.index.position(id) else {
            return;
        };
        let (parent_id, geofence_type, priority) = {
            let record = &self.records[pos];
            (record.parent_id, record.geofence_type, record.priority)
        };

        self.rederive_descendants(id);
        self.rederive_group(parent_id, geofence_type, priority, Some(id));
    }

    /// Re-derives every member of a sibling group with `priority >=
    /// threshold` (ascending priority order) and then each member's
    /// subtree.
    fn rederive_group(
        &mut self,
        parent_id: Option<Uuid>,
        geofence_type: GeofenceType,
        threshold: i32,
        exclude: Option<Uuid>,
    ) {
        let mut members: Vec<(i32, Uuid)> = self
            .sibling_ids(parent_id, geofence_type, exclude)
            .into_iter()
            .filter(|(priority, _)| *priority >= threshold)
            .collect();
        members.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));

        for (_, member) in &members {
            self.rederive(*member);
        }
        for (_, member) in &members {
            self.rederive_descendants(*member);
        }
    }

    /// Depth-first re-derivation of a record's children, higher precedence
    /// first within each group.
    fn rederive_descendants(&mut self, id: Uuid) {
        let mut children: Vec<(i32, Uuid)> = self
            .index
            .children_of(id)
            .iter()
            .filter_map(|child| {
                self.index
                    .position(*child)
                    .map(|pos| (self.records[pos].priority, *child))
            })
            .collect();
        children.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));

        for (_, child) in &children {
            self.rederive(*child);
        }
        for (_, child) in &children {
            self.rederive_descendants(*child);
        }
    }

    /// Recomputes one record's effective area from its original path. A
    /// failure here is downstream-only: the effective area is cleared and a
    /// warning recorded, never an error.
    fn rederive(&mut self, id: Uuid) {
        let Some(pos) = self.index.position(id) else {
            return;
        };
        let (original, parent_id, geofence_type, priority, name) = {
            let record = &self.records[pos];
            (
                record.original_path.clone(),
                record.parent_id,
                record.geofence_type,
                record.priority,
                record.name.clone(),
            )
        };

        let new_clipped =
            match self.derive_effective(&original, parent_id, geofence_type, priority, id) {
                Ok(path) => path,
                Err(failure) => {
                    let reason = match failure {
                        DeriveFailure::Degenerate => "its boundary is not a valid polygon",
                        DeriveFailure::OutsideParent => {
                            "it no longer fits within its parent's effective area"
                        }
                        DeriveFailure::ParentConsumed => "its parent has no effective area left",
                    };
                    if !self.records[pos].clipped_path.is_empty() {
                        warn!(geofence_id = %id, name = %name, reason, "clearing effective area during downstream resolution");
                        self.warnings.push(ResolutionWarning {
                            id,
                            name: name.clone(),
                            message: format!(
                                "The effective area of \"{}\" was cleared: {}.",
                                name, reason
                            ),
                        });
                    }
                    Vec::new()
                }
            };

        if self.records[pos].clipped_path != new_clipped {
            self.records[pos].clipped_path = new_clipped;
            self.mark_changed(id);
        }
    }

    /// The full clipping pipeline for one record: containment against the
    /// parent's effective area, then subtraction of higher-precedence
    /// siblings.
    fn derive_effective(
        &self,
        original: &[Coordinate],
        parent_id: Option<Uuid>,
        geofence_type: GeofenceType,
        priority: i32,
        id: Uuid,
    ) -> Result<Vec<Coordinate>, DeriveFailure> {
        let contained = match parent_id {
            Some(parent_id) => {
                let parent = self
                    .index
                    .position(parent_id)
                    .map(|pos| &self.records[pos])
                    .ok_or(DeriveFailure::ParentConsumed)?;
                if parent.clipped_path.is_empty() {
                    return Err(DeriveFailure::ParentConsumed);
                }
                if geometry::to_polygon(original).is_none() {
                    return Err(DeriveFailure::Degenerate);
                }
                clipping::clip_to_parent(original, &parent.clipped_path)
                    .ok_or(DeriveFailure::OutsideParent)?
            }
            None => geometry::to_polygon(original).ok_or(DeriveFailure::Degenerate)?,
        };

        let siblings = self.sibling_refs(parent_id, geofence_type, Some(id));
        Ok(clipping::clip_to_higher_priority_siblings(
            contained, priority, &siblings,
        ))
    }

    /// Checks that a path intersects its prospective parent as a single
    /// polygon, without committing anything.
    fn check_parent_feasibility(
        &self,
        original: &[Coordinate],
        parent_id: Option<Uuid>,
    ) -> Result<(), DeriveFailure> {
        let Some(parent_id) = parent_id else {
            return Ok(());
        };
        let parent = self
            .index
            .position(parent_id)
            .map(|pos| &self.records[pos])
            .ok_or(DeriveFailure::ParentConsumed)?;
        if parent.clipped_path.is_empty() {
            return Err(DeriveFailure::ParentConsumed);
        }
        clipping::clip_to_parent(original, &parent.clipped_path)
            .map(|_| ())
            .ok_or(DeriveFailure::OutsideParent)
    }

    /// Sibling records: same parent, same type, excluding `exclude`.
    fn sibling_refs(
        &self,
        parent_id: Option<Uuid>,
        geofence_type: GeofenceType,
        exclude: Option<Uuid>,
    ) -> Vec<&GeofenceRecord> {
        match parent_id {
            Some(parent) => self
                .index
                .children_of(parent)
                .iter()
                .filter_map(|id| self.index.position(*id).map(|pos| &self.records[pos]))
                .filter(|record| {
                    record.geofence_type == geofence_type && Some(record.id) != exclude
                })
                .collect(),
            None => self
                .records
                .iter()
                .filter(|record| {
                    record.parent_id.is_none()
                        && record.geofence_type == geofence_type
                        && Some(record.id) != exclude
                })
                .collect(),
        }
    }

    fn sibling_ids(
        &self,
        parent_id: Option<Uuid>,
        geofence_type: GeofenceType,
        exclude: Option<Uuid>,
    ) -> Vec<(i32, Uuid)> {
        self.sibling_refs(parent_id, geofence_type, exclude)
            .iter()
            .map(|record| (record.priority, record.id))
            .collect()
    }

    fn mark_changed(&mut self, id: Uuid) {
        if self.changed_set.insert(id) {
            self.changed.push(id);
        }
    }

    fn into_outcome(self, created: Option<Uuid>, deleted: Vec<Uuid>) -> ResolutionOutcome {
        ResolutionOutcome {
            records: self.records,
            changed: self.changed,
            created,
            deleted,
            warnings: self.warnings,
        }
    }
}

fn triggering_error(failure: DeriveFailure) -> GeofenceError {
    match failure {
        DeriveFailure::Degenerate => GeofenceError::DegeneratePath,
        DeriveFailure::OutsideParent | DeriveFailure::ParentConsumed => {
            GeofenceError::OutsideParent
        }
    }
}
