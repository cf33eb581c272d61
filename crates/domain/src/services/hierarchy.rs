//! Hierarchy structure: parent-legality policy, structural validation and
//! the id/children index used by the resolution engine.

use std::collections::HashMap;

use uuid::Uuid;

use crate::error::GeofenceError;
use crate::models::geofence::{GeofenceRecord, GeofenceType};

/// Which parent types are legal for a given geofence type.
///
/// The two observed variants of the rule are both supported; the caller
/// picks one at construction time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParentRule {
    /// Each type has exactly one legal parent type:
    /// Branch→Country, SubBranch→Branch, FieldOfficer→SubBranch.
    #[default]
    RequiredParent,
    /// Any strictly-higher type is accepted as parent (e.g. a FieldOfficer
    /// directly under a Branch).
    AllowedAncestors,
}

/// Parent-legality policy for the hierarchy.
#[derive(Debug, Clone, Copy, Default)]
pub struct HierarchyPolicy {
    rule: ParentRule,
}

impl HierarchyPolicy {
    pub fn new(rule: ParentRule) -> Self {
        Self { rule }
    }

    /// The single required parent type under the strict rule.
    fn required_parent(geofence_type: GeofenceType) -> Option<GeofenceType> {
        match geofence_type {
            GeofenceType::Country => None,
            GeofenceType::Branch => Some(GeofenceType::Country),
            GeofenceType::SubBranch => Some(GeofenceType::Branch),
            GeofenceType::FieldOfficer => Some(GeofenceType::SubBranch),
        }
    }

    /// True iff `parent` is a legal parent type for `child` under this
    /// policy.
    pub fn is_legal_parent(&self, child: GeofenceType, parent: GeofenceType) -> bool {
        match self.rule {
            ParentRule::RequiredParent => Self::required_parent(child) == Some(parent),
            ParentRule::AllowedAncestors => parent.rank() < child.rank(),
        }
    }

    fn illegal_parent_message(&self, child: GeofenceType, parent: GeofenceType) -> String {
        match self.rule {
            ParentRule::RequiredParent => {
                let required = Self::required_parent(child)
                    .map(|t| t.label())
                    .unwrap_or("none");
                format!(
                    "The selected parent must be of type \"{}\", but is a \"{}\".",
                    required,
                    parent.label()
                )
            }
            ParentRule::AllowedAncestors => format!(
                "A {} cannot be placed under a {}.",
                child.label(),
                parent.label()
            ),
        }
    }
}

/// Index over a flat record collection: id → position and id → child ids.
///
/// Built once per mutation so the engine traverses actual parent/child links
/// instead of re-filtering the flat list at every level.
#[derive(Debug, Default)]
pub struct HierarchyIndex {
    positions: HashMap<Uuid, usize>,
    children: HashMap<Uuid, Vec<Uuid>>,
}

impl HierarchyIndex {
    pub fn build(records: &[GeofenceRecord]) -> Self {
        let mut positions = HashMap::with_capacity(records.len());
        let mut children: HashMap<Uuid, Vec<Uuid>> = HashMap::new();

        for (pos, record) in records.iter().enumerate() {
            positions.insert(record.id, pos);
            if let Some(parent_id) = record.parent_id {
                children.entry(parent_id).or_default().push(record.id);
            }
        }

        Self {
            positions,
            children,
        }
    }

    pub fn position(&self, id: Uuid) -> Option<usize> {
        self.positions.get(&id).copied()
    }

    pub fn children_of(&self, id: Uuid) -> &[Uuid] {
        self.children.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// True iff `candidate` is `ancestor` itself or one of its transitive
    /// descendants. Used to reject parent assignments that would create a
    /// cycle.
    pub fn is_self_or_descendant(&self, candidate: Uuid, ancestor: Uuid) -> bool {
        if candidate == ancestor {
            return true;
        }
        let mut stack: Vec<Uuid> = self.children_of(ancestor).to_vec();
        while let Some(id) = stack.pop() {
            if id == candidate {
                return true;
            }
            stack.extend_from_slice(self.children_of(id));
        }
        false
    }
}

/// Validates the parent/type relationship of a candidate geofence.
///
/// Country never requires a parent (any supplied parent id is ignored by the
/// engine). Other types must reference an existing record of a legal parent
/// type.
pub fn validate_structure(
    geofence_type: GeofenceType,
    parent_id: Option<Uuid>,
    policy: &HierarchyPolicy,
    records: &[GeofenceRecord],
    index: &HierarchyIndex,
) -> Result<(), GeofenceError> {
    if geofence_type == GeofenceType::Country {
        return Ok(());
    }

    let parent_id = parent_id.ok_or_else(|| {
        GeofenceError::Structure(format!(
            "Please select a parent geofence for {}.",
            geofence_type.label()
        ))
    })?;

    let parent = index
        .position(parent_id)
        .map(|pos| &records[pos])
        .ok_or_else(|| {
            GeofenceError::Structure("The selected parent geofence does not exist.".to_string())
        })?;

    if !policy.is_legal_parent(geofence_type, parent.geofence_type) {
        return Err(GeofenceError::Structure(
            policy.illegal_parent_message(geofence_type, parent.geofence_type),
        ));
    }

    Ok(())
}
