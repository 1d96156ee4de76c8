//! Flag snapshot domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Flag;

/// Immutable point-in-time copy of a flag's configuration subtree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlagSnapshot {
    pub id: i64,
    pub flag: Flag,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Pagination for snapshot history. Snapshots are returned oldest first.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlagSnapshotsQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}
