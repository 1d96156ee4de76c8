//! Variant entity (database row mapping).

use sqlx::FromRow;

/// Database row mapping for the variants table.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct VariantEntity {
    pub id: i64,
    pub flag_id: i64,
    pub key: String,
    pub attachment: Option<serde_json::Value>,
}

/// Insert payload for the variants table.
#[derive(Debug, Clone)]
pub struct NewVariant {
    pub flag_id: i64,
    pub key: String,
    pub attachment: Option<serde_json::Value>,
}
