//! Configuration orchestrator.
//!
//! Every mutating operation runs in one store transaction: load and check the
//! current state, validate the change, write it, append a snapshot, commit.
//! A failure at any step drops the transaction, which rolls it back.

use std::sync::Arc;

use domain::models::{
    CreateConstraintRequest, CreateFlagRequest, CreateSegmentRequest, CreateVariantRequest,
    Constraint, Distribution, FindFlagsQuery, Flag, FlagSnapshot, FlagSnapshotsQuery,
    PutConstraintRequest, PutDistributionsRequest, PutFlagRequest, PutSegmentReorderRequest,
    PutSegmentRequest, PutVariantRequest, Segment, SetFlagEnabledRequest, Variant,
};
use domain::services::{
    validate_attachment, validate_constraint, validate_delete_variant, validate_distributions,
    validate_flag_key_uniqueness, validate_key, validate_segment_reorder,
    validate_variant_key_uniqueness,
};
use domain::ConfigError;
use persistence::entities::{
    ConstraintEntity, FlagEntity, FlagTree, NewConstraint, NewDistribution, NewFlag, NewSegment,
    NewVariant, SegmentEntity, SegmentTree, VariantEntity,
};
use persistence::repositories::{
    load_flag_tree, load_segment_tree, ConfigStore, ConfigTransaction, FlagFilter,
};
use shared::pagination::PageParams;
use tracing::{debug, info};
use uuid::Uuid;
use validator::Validate;

use super::mapper::{EntityMapper, Mapper};
use super::snapshot::SnapshotRecorder;
use crate::middleware::metrics::record_config_mutation;

type Tx = Box<dyn ConfigTransaction>;

/// Server-generated flag key: `k` followed by 32 hex digits.
fn generate_flag_key() -> String {
    format!("k{}", Uuid::new_v4().simple())
}

/// Orchestrates validation, persistence and snapshotting of flag configuration.
#[derive(Clone)]
pub struct ConfigService {
    store: Arc<dyn ConfigStore>,
    mapper: Arc<dyn Mapper>,
    snapshots: SnapshotRecorder,
}

impl ConfigService {
    /// Creates a service using the default [`EntityMapper`].
    pub fn new(store: Arc<dyn ConfigStore>) -> Self {
        Self::with_mapper(store, Arc::new(EntityMapper))
    }

    pub fn with_mapper(store: Arc<dyn ConfigStore>, mapper: Arc<dyn Mapper>) -> Self {
        Self {
            store,
            snapshots: SnapshotRecorder::new(mapper.clone()),
            mapper,
        }
    }

    /// Checks that the store answers.
    pub async fn ping(&self) -> Result<(), ConfigError> {
        Ok(self.store.ping().await?)
    }

    async fn begin(&self) -> Result<Tx, ConfigError> {
        Ok(self.store.begin().await?)
    }

    async fn commit(&self, tx: Tx, operation: &'static str) -> Result<(), ConfigError> {
        tx.commit().await?;
        record_config_mutation(operation);
        Ok(())
    }

    // =========================================================================
    // Parent chain lookups
    // =========================================================================

    async fn owned_segment(
        tx: &mut Tx,
        flag_id: i64,
        segment_id: i64,
    ) -> Result<SegmentEntity, ConfigError> {
        let segment = tx.find_segment(segment_id).await?;
        if segment.flag_id != flag_id {
            return Err(ConfigError::not_found(format!(
                "segment {} not found in flag {}",
                segment_id, flag_id
            )));
        }
        Ok(segment)
    }

    async fn owned_constraint(
        tx: &mut Tx,
        flag_id: i64,
        segment_id: i64,
        constraint_id: i64,
    ) -> Result<ConstraintEntity, ConfigError> {
        Self::owned_segment(tx, flag_id, segment_id).await?;
        let constraint = tx.find_constraint(constraint_id).await?;
        if constraint.segment_id != segment_id {
            return Err(ConfigError::not_found(format!(
                "constraint {} not found in segment {}",
                constraint_id, segment_id
            )));
        }
        Ok(constraint)
    }

    async fn owned_variant(
        tx: &mut Tx,
        flag_id: i64,
        variant_id: i64,
    ) -> Result<VariantEntity, ConfigError> {
        let variant = tx.find_variant(variant_id).await?;
        if variant.flag_id != flag_id {
            return Err(ConfigError::not_found(format!(
                "variant {} not found in flag {}",
                variant_id, flag_id
            )));
        }
        Ok(variant)
    }

    async fn mapped_segment(
        &self,
        tx: &mut Tx,
        segment: SegmentEntity,
    ) -> Result<Segment, ConfigError> {
        let tree = load_segment_tree(tx.as_mut(), segment).await?;
        self.mapper.segment(&tree)
    }

    // =========================================================================
    // Flags
    // =========================================================================

    /// Finds flags matching the query, ordered by id ascending.
    pub async fn find_flags(&self, query: FindFlagsQuery) -> Result<Vec<Flag>, ConfigError> {
        let filter = FlagFilter {
            key: query.key,
            description: query.description,
            description_like: query.description_like,
            enabled: query.enabled,
            page: PageParams::new(query.limit, query.offset)?,
        };

        let mut tx = self.begin().await?;
        let rows = tx.find_flags(&filter).await?;
        let mut flags = Vec::with_capacity(rows.len());
        for row in rows {
            let tree = if query.preload {
                load_flag_tree(tx.as_mut(), row.id).await?
            } else {
                FlagTree::bare(row)
            };
            flags.push(self.mapper.flag(&tree)?);
        }
        debug!(count = flags.len(), preload = query.preload, "Flags found");
        Ok(flags)
    }

    /// Returns a flag with its full configuration subtree.
    pub async fn get_flag(&self, flag_id: i64) -> Result<Flag, ConfigError> {
        let mut tx = self.begin().await?;
        let tree = load_flag_tree(tx.as_mut(), flag_id).await?;
        self.mapper.flag(&tree)
    }

    pub async fn create_flag(
        &self,
        request: CreateFlagRequest,
        actor: Option<&str>,
    ) -> Result<Flag, ConfigError> {
        request.validate()?;
        let key = match request.key {
            Some(key) if !key.is_empty() => key,
            _ => generate_flag_key(),
        };
        validate_key(&key)?;

        let mut tx = self.begin().await?;
        let holder = tx.find_flag_by_key(&key).await?.map(|f| f.id);
        validate_flag_key_uniqueness(&key, holder, None)?;

        let created = tx
            .create_flag(NewFlag {
                key,
                description: request.description,
                enabled: false,
                data_records_enabled: false,
                updated_by: actor.map(str::to_string),
            })
            .await?;
        let flag = self.snapshots.record(tx.as_mut(), created.id, actor).await?;
        self.commit(tx, "create_flag").await?;

        info!(flag_id = flag.id, key = %flag.key, "Flag created");
        Ok(flag)
    }

    /// Updates the given fields of a flag; absent fields are left unchanged.
    pub async fn put_flag(
        &self,
        flag_id: i64,
        request: PutFlagRequest,
        actor: Option<&str>,
    ) -> Result<Flag, ConfigError> {
        request.validate()?;

        let mut tx = self.begin().await?;
        let mut entity = tx.find_flag(flag_id).await?;

        if let Some(key) = request.key {
            if key != entity.key {
                let holder = tx.find_flag_by_key(&key).await?.map(|f| f.id);
                validate_flag_key_uniqueness(&key, holder, Some(flag_id))?;
                entity.key = key;
            }
        }
        if let Some(description) = request.description {
            entity.description = description;
        }
        if let Some(data_records_enabled) = request.data_records_enabled {
            entity.data_records_enabled = data_records_enabled;
        }

        tx.update_flag(&entity).await?;
        let flag = self.snapshots.record(tx.as_mut(), flag_id, actor).await?;
        self.commit(tx, "put_flag").await?;

        info!(flag_id, key = %flag.key, "Flag updated");
        Ok(flag)
    }

    pub async fn set_flag_enabled(
        &self,
        flag_id: i64,
        request: SetFlagEnabledRequest,
        actor: Option<&str>,
    ) -> Result<Flag, ConfigError> {
        let mut tx = self.begin().await?;
        let entity = tx.find_flag(flag_id).await?;
        tx.update_flag(&FlagEntity {
            enabled: request.enabled,
            ..entity
        })
        .await?;
        let flag = self.snapshots.record(tx.as_mut(), flag_id, actor).await?;
        self.commit(tx, "set_flag_enabled").await?;

        info!(flag_id, enabled = flag.enabled, "Flag enabled state set");
        Ok(flag)
    }

    /// Deletes a flag and its whole subtree. Snapshot history is kept.
    pub async fn delete_flag(&self, flag_id: i64) -> Result<(), ConfigError> {
        let mut tx = self.begin().await?;
        tx.find_flag(flag_id).await?;

        let segments = tx.find_segments(flag_id).await?;
        for segment in segments {
            tx.delete_constraints(segment.id).await?;
            tx.delete_distributions(segment.id).await?;
            tx.delete_segment(segment.id).await?;
        }
        let variants = tx.find_variants(flag_id).await?;
        for variant in variants {
            tx.delete_variant(variant.id).await?;
        }
        tx.delete_flag(flag_id).await?;
        self.commit(tx, "delete_flag").await?;

        info!(flag_id, "Flag deleted");
        Ok(())
    }

    /// Returns the snapshot history of a flag, oldest first.
    pub async fn get_flag_snapshots(
        &self,
        flag_id: i64,
        query: FlagSnapshotsQuery,
    ) -> Result<Vec<FlagSnapshot>, ConfigError> {
        let page = PageParams::new(query.limit, query.offset)?;
        let mut tx = self.begin().await?;
        let rows = tx.find_snapshots(flag_id, page).await?;
        rows.iter().map(|s| self.mapper.snapshot(s)).collect()
    }

    // =========================================================================
    // Segments
    // =========================================================================

    /// Returns the segments of a flag in rank order.
    pub async fn find_segments(&self, flag_id: i64) -> Result<Vec<Segment>, ConfigError> {
        let mut tx = self.begin().await?;
        tx.find_flag(flag_id).await?;
        let rows = tx.find_segments(flag_id).await?;
        let mut segments = Vec::with_capacity(rows.len());
        for segment in rows {
            segments.push(self.mapped_segment(&mut tx, segment).await?);
        }
        Ok(segments)
    }

    /// Appends a segment after the flag's last segment.
    pub async fn create_segment(
        &self,
        flag_id: i64,
        request: CreateSegmentRequest,
        actor: Option<&str>,
    ) -> Result<Segment, ConfigError> {
        request.validate()?;

        let mut tx = self.begin().await?;
        tx.find_flag(flag_id).await?;
        let rank = tx
            .find_segments(flag_id)
            .await?
            .iter()
            .map(|s| s.rank)
            .max()
            .unwrap_or(0)
            + 1;

        let segment = tx
            .create_segment(NewSegment {
                flag_id,
                description: request.description,
                rank,
                rollout_percent: request.rollout_percent,
            })
            .await?;
        let mapped = self.mapped_segment(&mut tx, segment).await?;
        self.snapshots.record(tx.as_mut(), flag_id, actor).await?;
        self.commit(tx, "create_segment").await?;

        info!(flag_id, segment_id = mapped.id, rank, "Segment created");
        Ok(mapped)
    }

    pub async fn put_segment(
        &self,
        flag_id: i64,
        segment_id: i64,
        request: PutSegmentRequest,
        actor: Option<&str>,
    ) -> Result<Segment, ConfigError> {
        request.validate()?;

        let mut tx = self.begin().await?;
        let segment = Self::owned_segment(&mut tx, flag_id, segment_id).await?;
        let segment = tx
            .update_segment(&SegmentEntity {
                description: request.description,
                rollout_percent: request.rollout_percent,
                ..segment
            })
            .await?;
        let mapped = self.mapped_segment(&mut tx, segment).await?;
        self.snapshots.record(tx.as_mut(), flag_id, actor).await?;
        self.commit(tx, "put_segment").await?;

        info!(flag_id, segment_id, "Segment updated");
        Ok(mapped)
    }

    /// Deletes a segment with its constraints and distributions.
    pub async fn delete_segment(
        &self,
        flag_id: i64,
        segment_id: i64,
        actor: Option<&str>,
    ) -> Result<(), ConfigError> {
        let mut tx = self.begin().await?;
        Self::owned_segment(&mut tx, flag_id, segment_id).await?;
        tx.delete_constraints(segment_id).await?;
        tx.delete_distributions(segment_id).await?;
        tx.delete_segment(segment_id).await?;
        self.snapshots.record(tx.as_mut(), flag_id, actor).await?;
        self.commit(tx, "delete_segment").await?;

        info!(flag_id, segment_id, "Segment deleted");
        Ok(())
    }

    /// Assigns ranks 1..=n following the submitted order.
    ///
    /// The submitted ids must be exactly the flag's segments.
    pub async fn put_segments_reorder(
        &self,
        flag_id: i64,
        request: PutSegmentReorderRequest,
        actor: Option<&str>,
    ) -> Result<Vec<Segment>, ConfigError> {
        let mut tx = self.begin().await?;
        tx.find_flag(flag_id).await?;
        let existing = tx.find_segments(flag_id).await?;
        let existing_ids: Vec<i64> = existing.iter().map(|s| s.id).collect();
        validate_segment_reorder(&existing_ids, &request.segment_ids)?;

        for (index, segment_id) in request.segment_ids.iter().enumerate() {
            let Some(segment) = existing.iter().find(|s| s.id == *segment_id) else {
                continue;
            };
            tx.update_segment(&SegmentEntity {
                rank: index as i64 + 1,
                ..segment.clone()
            })
            .await?;
        }

        let flag = self.snapshots.record(tx.as_mut(), flag_id, actor).await?;
        self.commit(tx, "put_segments_reorder").await?;

        info!(flag_id, order = ?request.segment_ids, "Segments reordered");
        Ok(flag.segments)
    }

    // =========================================================================
    // Constraints
    // =========================================================================

    pub async fn find_constraints(
        &self,
        flag_id: i64,
        segment_id: i64,
    ) -> Result<Vec<Constraint>, ConfigError> {
        let mut tx = self.begin().await?;
        Self::owned_segment(&mut tx, flag_id, segment_id).await?;
        let rows = tx.find_constraints(segment_id).await?;
        rows.iter().map(|c| self.mapper.constraint(c)).collect()
    }

    pub async fn create_constraint(
        &self,
        flag_id: i64,
        segment_id: i64,
        request: CreateConstraintRequest,
        actor: Option<&str>,
    ) -> Result<Constraint, ConfigError> {
        request.validate()?;
        let operator = validate_constraint(&request.operator, &request.value)?;

        let mut tx = self.begin().await?;
        Self::owned_segment(&mut tx, flag_id, segment_id).await?;
        let constraint = tx
            .create_constraint(NewConstraint {
                segment_id,
                property: request.property,
                operator: operator.as_str().to_string(),
                value: request.value,
            })
            .await?;
        let mapped = self.mapper.constraint(&constraint)?;
        self.snapshots.record(tx.as_mut(), flag_id, actor).await?;
        self.commit(tx, "create_constraint").await?;

        info!(flag_id, segment_id, constraint_id = mapped.id, "Constraint created");
        Ok(mapped)
    }

    pub async fn put_constraint(
        &self,
        flag_id: i64,
        segment_id: i64,
        constraint_id: i64,
        request: PutConstraintRequest,
        actor: Option<&str>,
    ) -> Result<Constraint, ConfigError> {
        request.validate()?;
        let operator = validate_constraint(&request.operator, &request.value)?;

        let mut tx = self.begin().await?;
        let constraint =
            Self::owned_constraint(&mut tx, flag_id, segment_id, constraint_id).await?;
        let constraint = tx
            .update_constraint(&ConstraintEntity {
                property: request.property,
                operator: operator.as_str().to_string(),
                value: request.value,
                ..constraint
            })
            .await?;
        let mapped = self.mapper.constraint(&constraint)?;
        self.snapshots.record(tx.as_mut(), flag_id, actor).await?;
        self.commit(tx, "put_constraint").await?;

        info!(flag_id, segment_id, constraint_id, "Constraint updated");
        Ok(mapped)
    }

    pub async fn delete_constraint(
        &self,
        flag_id: i64,
        segment_id: i64,
        constraint_id: i64,
        actor: Option<&str>,
    ) -> Result<(), ConfigError> {
        let mut tx = self.begin().await?;
        Self::owned_constraint(&mut tx, flag_id, segment_id, constraint_id).await?;
        tx.delete_constraint(constraint_id).await?;
        self.snapshots.record(tx.as_mut(), flag_id, actor).await?;
        self.commit(tx, "delete_constraint").await?;

        info!(flag_id, segment_id, constraint_id, "Constraint deleted");
        Ok(())
    }

    // =========================================================================
    // Variants
    // =========================================================================

    pub async fn find_variants(&self, flag_id: i64) -> Result<Vec<Variant>, ConfigError> {
        let mut tx = self.begin().await?;
        tx.find_flag(flag_id).await?;
        let rows = tx.find_variants(flag_id).await?;
        rows.iter().map(|v| self.mapper.variant(v)).collect()
    }

    pub async fn create_variant(
        &self,
        flag_id: i64,
        request: CreateVariantRequest,
        actor: Option<&str>,
    ) -> Result<Variant, ConfigError> {
        request.validate()?;
        validate_key(&request.key)?;
        if let Some(attachment) = &request.attachment {
            validate_attachment(attachment)?;
        }

        let mut tx = self.begin().await?;
        tx.find_flag(flag_id).await?;
        let siblings = tx.find_variants(flag_id).await?;
        validate_variant_key_uniqueness(
            &request.key,
            siblings.iter().map(|v| (v.id, v.key.as_str())),
            None,
        )?;

        let attachment = self
            .mapper
            .attachment_to_entity(request.attachment.as_ref())?;
        let variant = tx
            .create_variant(NewVariant {
                flag_id,
                key: request.key,
                attachment,
            })
            .await?;
        let mapped = self.mapper.variant(&variant)?;
        self.snapshots.record(tx.as_mut(), flag_id, actor).await?;
        self.commit(tx, "create_variant").await?;

        info!(flag_id, variant_id = mapped.id, key = %mapped.key, "Variant created");
        Ok(mapped)
    }

    /// Replaces a variant's key and attachment.
    ///
    /// A renamed variant's key is copied onto every distribution that
    /// references it.
    pub async fn put_variant(
        &self,
        flag_id: i64,
        variant_id: i64,
        request: PutVariantRequest,
        actor: Option<&str>,
    ) -> Result<Variant, ConfigError> {
        request.validate()?;
        validate_key(&request.key)?;
        if let Some(attachment) = &request.attachment {
            validate_attachment(attachment)?;
        }

        let mut tx = self.begin().await?;
        let variant = Self::owned_variant(&mut tx, flag_id, variant_id).await?;
        let siblings = tx.find_variants(flag_id).await?;
        validate_variant_key_uniqueness(
            &request.key,
            siblings.iter().map(|v| (v.id, v.key.as_str())),
            Some(variant_id),
        )?;

        let renamed = variant.key != request.key;
        let attachment = self
            .mapper
            .attachment_to_entity(request.attachment.as_ref())?;
        let variant = tx
            .update_variant(&VariantEntity {
                key: request.key,
                attachment,
                ..variant
            })
            .await?;
        if renamed {
            let synced = tx
                .update_distribution_variant_keys(variant_id, &variant.key)
                .await?;
            debug!(variant_id, synced, "Distribution variant keys synchronised");
        }
        let mapped = self.mapper.variant(&variant)?;
        self.snapshots.record(tx.as_mut(), flag_id, actor).await?;
        self.commit(tx, "put_variant").await?;

        info!(flag_id, variant_id, key = %mapped.key, "Variant updated");
        Ok(mapped)
    }

    /// Deletes a variant that no distribution references.
    pub async fn delete_variant(
        &self,
        flag_id: i64,
        variant_id: i64,
        actor: Option<&str>,
    ) -> Result<(), ConfigError> {
        let mut tx = self.begin().await?;
        Self::owned_variant(&mut tx, flag_id, variant_id).await?;

        let mut referencing: Vec<i64> = tx
            .find_distributions_by_variant(variant_id)
            .await?
            .iter()
            .map(|d| d.segment_id)
            .collect();
        referencing.sort_unstable();
        referencing.dedup();
        validate_delete_variant(variant_id, &referencing)?;

        tx.delete_variant(variant_id).await?;
        self.snapshots.record(tx.as_mut(), flag_id, actor).await?;
        self.commit(tx, "delete_variant").await?;

        info!(flag_id, variant_id, "Variant deleted");
        Ok(())
    }

    // =========================================================================
    // Distributions
    // =========================================================================

    pub async fn find_distributions(
        &self,
        flag_id: i64,
        segment_id: i64,
    ) -> Result<Vec<Distribution>, ConfigError> {
        let mut tx = self.begin().await?;
        Self::owned_segment(&mut tx, flag_id, segment_id).await?;
        let rows = tx.find_distributions(segment_id).await?;
        rows.iter().map(|d| self.mapper.distribution(d)).collect()
    }

    /// Replaces the whole distribution set of a segment.
    ///
    /// An empty set clears the segment's distribution.
    pub async fn put_distributions(
        &self,
        flag_id: i64,
        segment_id: i64,
        request: PutDistributionsRequest,
        actor: Option<&str>,
    ) -> Result<Vec<Distribution>, ConfigError> {
        let mut tx = self.begin().await?;
        let segment = Self::owned_segment(&mut tx, flag_id, segment_id).await?;
        let variants = tx.find_variants(flag_id).await?;
        let variant_ids: Vec<i64> = variants.iter().map(|v| v.id).collect();
        validate_distributions(&request.distributions, &variant_ids)?;

        let removed = tx.delete_distributions(segment_id).await?;
        for d in &request.distributions {
            let Some(variant) = variants.iter().find(|v| v.id == d.variant_id) else {
                continue;
            };
            tx.create_distribution(NewDistribution {
                segment_id,
                variant_id: variant.id,
                variant_key: variant.key.clone(),
                percent: d.percent,
            })
            .await?;
        }

        let tree: SegmentTree = load_segment_tree(tx.as_mut(), segment).await?;
        let mapped = tree
            .distributions
            .iter()
            .map(|d| self.mapper.distribution(d))
            .collect::<Result<Vec<_>, _>>()?;
        self.snapshots.record(tx.as_mut(), flag_id, actor).await?;
        self.commit(tx, "put_distributions").await?;

        info!(
            flag_id,
            segment_id,
            removed,
            inserted = mapped.len(),
            "Distributions replaced"
        );
        Ok(mapped)
    }
}
