//! Flag entity (database row mapping).

use chrono::{DateTime, Utc};
use sqlx::FromRow;

use super::{SegmentTree, VariantEntity};

/// Database row mapping for the flags table.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct FlagEntity {
    pub id: i64,
    pub key: String,
    pub description: String,
    pub enabled: bool,
    pub data_records_enabled: bool,
    pub updated_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert payload for the flags table.
#[derive(Debug, Clone)]
pub struct NewFlag {
    pub key: String,
    pub description: String,
    pub enabled: bool,
    pub data_records_enabled: bool,
    pub updated_by: Option<String>,
}

/// A flag row with every child row of its configuration subtree.
#[derive(Debug, Clone)]
pub struct FlagTree {
    pub flag: FlagEntity,
    /// Ordered by rank, then id.
    pub segments: Vec<SegmentTree>,
    pub variants: Vec<VariantEntity>,
}

impl FlagTree {
    /// A flag loaded without its children.
    pub fn bare(flag: FlagEntity) -> Self {
        Self {
            flag,
            segments: Vec::new(),
            variants: Vec::new(),
        }
    }
}
