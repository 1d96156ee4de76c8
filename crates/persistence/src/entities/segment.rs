//! Segment entity (database row mapping).

use sqlx::FromRow;

use super::{ConstraintEntity, DistributionEntity};

/// Database row mapping for the segments table.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct SegmentEntity {
    pub id: i64,
    pub flag_id: i64,
    pub description: String,
    pub rank: i64,
    pub rollout_percent: i64,
}

/// Insert payload for the segments table.
#[derive(Debug, Clone)]
pub struct NewSegment {
    pub flag_id: i64,
    pub description: String,
    pub rank: i64,
    pub rollout_percent: i64,
}

/// A segment row with its constraints and distributions.
#[derive(Debug, Clone)]
pub struct SegmentTree {
    pub segment: SegmentEntity,
    pub constraints: Vec<ConstraintEntity>,
    pub distributions: Vec<DistributionEntity>,
}
