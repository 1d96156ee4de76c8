//! Constraint entity (database row mapping).

use sqlx::FromRow;

/// Database row mapping for the constraints table.
///
/// `operator` and `value` are stored as text and parsed by the mapper.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct ConstraintEntity {
    pub id: i64,
    pub segment_id: i64,
    pub property: String,
    pub operator: String,
    pub value: String,
}

/// Insert payload for the constraints table.
#[derive(Debug, Clone)]
pub struct NewConstraint {
    pub segment_id: i64,
    pub property: String,
    pub operator: String,
    pub value: String,
}
