//! Segment domain model.

use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{Constraint, Distribution};

/// A rank-ordered, percentage-gated rule of a flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    pub id: i64,
    pub description: String,
    #[serde(default)]
    pub constraints: Vec<Constraint>,
    /// Empty means the segment has no distribution configured yet.
    #[serde(default)]
    pub distributions: Vec<Distribution>,
    pub rank: i64,
    pub rollout_percent: i64,
}

/// Request payload for creating a segment.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateSegmentRequest {
    #[validate(length(min = 1, message = "Description must not be empty"))]
    pub description: String,

    #[validate(custom(function = "shared::validation::validate_percent"))]
    pub rollout_percent: i64,
}

/// Request payload for updating a segment.
pub type PutSegmentRequest = CreateSegmentRequest;

/// Request payload for reordering all segments of a flag.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PutSegmentReorderRequest {
    pub segment_ids: Vec<i64>,
}
