//! Pre-flight validation of caller-supplied inputs.
//!
//! Every check here runs before any request is built or sent. Rules are
//! applied in a fixed order and the first failing rule wins: list emptiness
//! before per-entity checks, `_id` before `_type` within a payload.

use serde_json::Value;

use crate::error::ClientError;
use crate::types::{Entity, Patch, FIELD_ID, FIELD_TYPE};

pub(crate) fn require_query(query: &str) -> Result<(), ClientError> {
    if query.is_empty() {
        return Err(ClientError::QueryNotProvided);
    }
    Ok(())
}

pub(crate) fn require_id(id: &str) -> Result<(), ClientError> {
    if id.is_empty() {
        return Err(ClientError::IdNotProvided);
    }
    Ok(())
}

pub(crate) fn require_label(label: &str) -> Result<(), ClientError> {
    if label.is_empty() {
        return Err(ClientError::LabelNotSet);
    }
    Ok(())
}

/// Validate an insert payload: the list must be non-empty, and no entity may
/// carry `_id` or a `_type` other than `entity_type`.
pub(crate) fn validate_entities(entities: &[Entity], entity_type: &str) -> Result<(), ClientError> {
    if entities.is_empty() {
        return Err(ClientError::EntityNotProvided);
    }

    for entity in entities {
        if entity.contains_key(FIELD_ID) {
            return Err(ClientError::EntityIdSet {
                entity: Value::Object(entity.clone()).to_string(),
            });
        }

        if let Some(entity_type_field) = entity.get(FIELD_TYPE) {
            check_type_field(entity_type_field, entity_type)?;
        }
    }

    Ok(())
}

/// Validate an update payload: the patch must be non-empty and may not carry
/// `_id` or a `_type` other than `entity_type`.
pub(crate) fn validate_patch(patch: &Patch, entity_type: &str) -> Result<(), ClientError> {
    if patch.is_empty() {
        return Err(ClientError::PatchNotProvided);
    }

    if patch.contains_key(FIELD_ID) {
        return Err(ClientError::PatchIdSet {
            patch: Value::Object(patch.clone()).to_string(),
        });
    }

    if let Some(patch_type_field) = patch.get(FIELD_TYPE) {
        check_type_field(patch_type_field, entity_type)?;
    }

    Ok(())
}

// A non-string `_type` can never equal the configured type, so it counts as
// a mismatch too.
fn check_type_field(value: &Value, entity_type: &str) -> Result<(), ClientError> {
    if value.as_str() == Some(entity_type) {
        return Ok(());
    }
    Err(ClientError::EntityTypeMismatch {
        expected: entity_type.to_string(),
        actual: match value.as_str() {
            Some(s) => s.to_string(),
            None => value.to_string(),
        },
    })
}
