//! Distribution entity (database row mapping).

use sqlx::FromRow;

/// Database row mapping for the distributions table.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct DistributionEntity {
    pub id: i64,
    pub segment_id: i64,
    pub variant_id: i64,
    /// Copy of the referenced variant's key.
    pub variant_key: String,
    pub percent: i64,
}

/// Insert payload for the distributions table.
#[derive(Debug, Clone)]
pub struct NewDistribution {
    pub segment_id: i64,
    pub variant_id: i64,
    pub variant_key: String,
    pub percent: i64,
}
