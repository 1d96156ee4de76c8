//! Repository contract for flag configuration storage.
//!
//! Every access goes through a [`ConfigTransaction`] obtained from
//! [`ConfigStore::begin`]. Writes become visible only after
//! [`ConfigTransaction::commit`]; dropping a transaction rolls it back.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use shared::pagination::PageParams;

use crate::entities::{
    ConstraintEntity, DistributionEntity, FlagEntity, FlagSnapshotEntity, FlagTree,
    NewConstraint, NewDistribution, NewFlag, NewFlagSnapshot, NewSegment, NewVariant,
    SegmentEntity, SegmentTree, VariantEntity,
};
use crate::error::RepoError;

pub use memory::MemoryConfigStore;
pub use postgres::PgConfigStore;

/// Filters for [`ConfigTransaction::find_flags`]. Rows are ordered by id ascending
/// and the page window is applied after ordering.
#[derive(Debug, Clone, Default)]
pub struct FlagFilter {
    pub key: Option<String>,
    pub description: Option<String>,
    /// Case-insensitive literal substring of the description; `%` and `_`
    /// carry no pattern meaning.
    pub description_like: Option<String>,
    pub enabled: Option<bool>,
    pub page: PageParams,
}

impl FlagFilter {
    /// Whether a flag row passes every filter except the page window.
    pub fn matches(&self, flag: &FlagEntity) -> bool {
        if let Some(key) = &self.key {
            if &flag.key != key {
                return false;
            }
        }
        if let Some(description) = &self.description {
            if &flag.description != description {
                return false;
            }
        }
        if let Some(like) = &self.description_like {
            if !flag
                .description
                .to_lowercase()
                .contains(&like.to_lowercase())
            {
                return false;
            }
        }
        if let Some(enabled) = self.enabled {
            if flag.enabled != enabled {
                return false;
            }
        }
        true
    }
}

/// Source of transactions over the configuration tables.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Opens a transaction.
    async fn begin(&self) -> Result<Box<dyn ConfigTransaction>, RepoError>;

    /// Checks that the backing store answers.
    async fn ping(&self) -> Result<(), RepoError>;
}

/// Transactional CRUD over the configuration tables.
///
/// Single-row lookups, updates and deletes report a missing row as
/// [`RepoError::NotFound`].
#[async_trait]
pub trait ConfigTransaction: Send {
    // Flags
    async fn find_flag(&mut self, id: i64) -> Result<FlagEntity, RepoError>;
    async fn find_flag_by_key(&mut self, key: &str) -> Result<Option<FlagEntity>, RepoError>;
    async fn find_flags(&mut self, filter: &FlagFilter) -> Result<Vec<FlagEntity>, RepoError>;
    async fn create_flag(&mut self, flag: NewFlag) -> Result<FlagEntity, RepoError>;
    async fn update_flag(&mut self, flag: &FlagEntity) -> Result<FlagEntity, RepoError>;
    async fn delete_flag(&mut self, id: i64) -> Result<(), RepoError>;

    // Segments, ordered by rank then id
    async fn find_segment(&mut self, id: i64) -> Result<SegmentEntity, RepoError>;
    async fn find_segments(&mut self, flag_id: i64) -> Result<Vec<SegmentEntity>, RepoError>;
    async fn create_segment(&mut self, segment: NewSegment) -> Result<SegmentEntity, RepoError>;
    async fn update_segment(&mut self, segment: &SegmentEntity)
        -> Result<SegmentEntity, RepoError>;
    async fn delete_segment(&mut self, id: i64) -> Result<(), RepoError>;

    // Constraints, ordered by id
    async fn find_constraint(&mut self, id: i64) -> Result<ConstraintEntity, RepoError>;
    async fn find_constraints(&mut self, segment_id: i64)
        -> Result<Vec<ConstraintEntity>, RepoError>;
    async fn create_constraint(
        &mut self,
        constraint: NewConstraint,
    ) -> Result<ConstraintEntity, RepoError>;
    async fn update_constraint(
        &mut self,
        constraint: &ConstraintEntity,
    ) -> Result<ConstraintEntity, RepoError>;
    async fn delete_constraint(&mut self, id: i64) -> Result<(), RepoError>;
    /// Deletes every constraint of a segment, returning the number removed.
    async fn delete_constraints(&mut self, segment_id: i64) -> Result<u64, RepoError>;

    // Variants, ordered by id
    async fn find_variant(&mut self, id: i64) -> Result<VariantEntity, RepoError>;
    async fn find_variants(&mut self, flag_id: i64) -> Result<Vec<VariantEntity>, RepoError>;
    async fn create_variant(&mut self, variant: NewVariant) -> Result<VariantEntity, RepoError>;
    async fn update_variant(&mut self, variant: &VariantEntity)
        -> Result<VariantEntity, RepoError>;
    async fn delete_variant(&mut self, id: i64) -> Result<(), RepoError>;

    // Distributions, ordered by id
    async fn find_distributions(
        &mut self,
        segment_id: i64,
    ) -> Result<Vec<DistributionEntity>, RepoError>;
    async fn find_distributions_by_variant(
        &mut self,
        variant_id: i64,
    ) -> Result<Vec<DistributionEntity>, RepoError>;
    async fn create_distribution(
        &mut self,
        distribution: NewDistribution,
    ) -> Result<DistributionEntity, RepoError>;
    /// Rewrites the denormalized variant key of every distribution of a variant.
    async fn update_distribution_variant_keys(
        &mut self,
        variant_id: i64,
        variant_key: &str,
    ) -> Result<u64, RepoError>;
    /// Deletes the whole distribution set of a segment, returning the number removed.
    async fn delete_distributions(&mut self, segment_id: i64) -> Result<u64, RepoError>;

    // Snapshots, ordered by id (oldest first)
    async fn create_snapshot(
        &mut self,
        snapshot: NewFlagSnapshot,
    ) -> Result<FlagSnapshotEntity, RepoError>;
    async fn find_snapshots(
        &mut self,
        flag_id: i64,
        page: PageParams,
    ) -> Result<Vec<FlagSnapshotEntity>, RepoError>;

    /// Makes every write of this transaction visible.
    async fn commit(self: Box<Self>) -> Result<(), RepoError>;
}

/// Loads a flag with its segments, constraints, distributions and variants.
pub async fn load_flag_tree(
    tx: &mut dyn ConfigTransaction,
    flag_id: i64,
) -> Result<FlagTree, RepoError> {
    let flag = tx.find_flag(flag_id).await?;
    let mut segments = Vec::new();
    for segment in tx.find_segments(flag_id).await? {
        segments.push(load_segment_tree(tx, segment).await?);
    }
    let variants = tx.find_variants(flag_id).await?;
    Ok(FlagTree {
        flag,
        segments,
        variants,
    })
}

/// Loads the constraints and distributions of a segment.
pub async fn load_segment_tree(
    tx: &mut dyn ConfigTransaction,
    segment: SegmentEntity,
) -> Result<SegmentTree, RepoError> {
    let constraints = tx.find_constraints(segment.id).await?;
    let distributions = tx.find_distributions(segment.id).await?;
    Ok(SegmentTree {
        segment,
        constraints,
        distributions,
    })
}
