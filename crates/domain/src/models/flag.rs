//! Flag domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{Segment, Variant};

/// A feature flag with its full configuration subtree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Flag {
    pub id: i64,
    pub key: String,
    pub description: String,
    pub enabled: bool,
    pub data_records_enabled: bool,
    /// Ordered by rank.
    #[serde(default)]
    pub segments: Vec<Segment>,
    #[serde(default)]
    pub variants: Vec<Variant>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Request payload for creating a flag.
///
/// An empty or absent key is replaced by a server-generated one.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateFlagRequest {
    #[validate(length(min = 1, message = "Description must not be empty"))]
    pub description: String,

    #[serde(default)]
    #[validate(custom(function = "shared::validation::validate_optional_key_format"))]
    pub key: Option<String>,
}

/// Request payload for updating a flag. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PutFlagRequest {
    #[validate(length(min = 1, message = "Description must not be empty"))]
    pub description: Option<String>,

    pub data_records_enabled: Option<bool>,

    #[validate(custom(function = "shared::validation::validate_key_format"))]
    pub key: Option<String>,
}

/// Request payload for toggling a flag.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetFlagEnabledRequest {
    pub enabled: bool,
}

/// Filters for flag lookup. Results are ordered by id ascending.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FindFlagsQuery {
    /// Exact key match.
    pub key: Option<String>,
    /// Exact description match.
    pub description: Option<String>,
    /// Case-insensitive substring match on description.
    pub description_like: Option<String>,
    pub enabled: Option<bool>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    /// Include segments and variants in each returned flag.
    #[serde(default)]
    pub preload: bool,
}
