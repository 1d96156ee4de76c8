//! Flag snapshot entity (database row mapping).

use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Database row mapping for the flag_snapshots table. Rows are append-only.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct FlagSnapshotEntity {
    pub id: i64,
    pub flag_id: i64,
    pub updated_by: Option<String>,
    /// Serialized flag subtree.
    pub flag: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for the flag_snapshots table.
#[derive(Debug, Clone)]
pub struct NewFlagSnapshot {
    pub flag_id: i64,
    pub updated_by: Option<String>,
    pub flag: serde_json::Value,
}
