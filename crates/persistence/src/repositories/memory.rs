//! In-process configuration store.
//!
//! Transactions are serialized: `begin` locks the tables, works on a private
//! copy and `commit` swaps the copy in. Used by tests and local runs; a
//! [`FaultPlan`] can make chosen operations fail.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use shared::pagination::PageParams;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use super::{ConfigStore, ConfigTransaction, FlagFilter};
use crate::entities::{
    ConstraintEntity, DistributionEntity, FlagEntity, FlagSnapshotEntity, NewConstraint,
    NewDistribution, NewFlag, NewFlagSnapshot, NewSegment, NewVariant, SegmentEntity,
    VariantEntity,
};
use crate::error::RepoError;

/// Operations that should fail with [`RepoError::Storage`].
#[derive(Debug, Default)]
pub struct FaultPlan {
    fail_all: bool,
    operations: HashSet<&'static str>,
}

impl FaultPlan {
    fn check(&self, operation: &'static str) -> Result<(), RepoError> {
        if self.fail_all || self.operations.contains(operation) {
            tracing::debug!(operation, "Injecting storage failure");
            return Err(RepoError::Storage(format!(
                "injected failure in {}",
                operation
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
struct Sequences {
    flags: i64,
    segments: i64,
    constraints: i64,
    variants: i64,
    distributions: i64,
    snapshots: i64,
}

fn next_id(seq: &mut i64) -> i64 {
    *seq += 1;
    *seq
}

#[derive(Debug, Clone, Default)]
struct Tables {
    flags: BTreeMap<i64, FlagEntity>,
    segments: BTreeMap<i64, SegmentEntity>,
    constraints: BTreeMap<i64, ConstraintEntity>,
    variants: BTreeMap<i64, VariantEntity>,
    distributions: BTreeMap<i64, DistributionEntity>,
    snapshots: BTreeMap<i64, FlagSnapshotEntity>,
    seq: Sequences,
}

/// Configuration store kept in process memory.
#[derive(Clone, Default)]
pub struct MemoryConfigStore {
    tables: Arc<AsyncMutex<Tables>>,
    faults: Arc<Mutex<FaultPlan>>,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent operation fail.
    pub fn fail_all(&self) {
        self.plan(|plan| plan.fail_all = true);
    }

    /// Makes one named operation (e.g. `"delete_distributions"`) fail.
    pub fn fail_operation(&self, operation: &'static str) {
        self.plan(|plan| {
            plan.operations.insert(operation);
        });
    }

    /// Removes every injected failure.
    pub fn clear_faults(&self) {
        self.plan(|plan| *plan = FaultPlan::default());
    }

    fn plan(&self, f: impl FnOnce(&mut FaultPlan)) {
        let mut plan = self.faults.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut plan);
    }

    fn check(&self, operation: &'static str) -> Result<(), RepoError> {
        let plan = self.faults.lock().unwrap_or_else(|e| e.into_inner());
        plan.check(operation)
    }
}

#[async_trait]
impl ConfigStore for MemoryConfigStore {
    async fn begin(&self) -> Result<Box<dyn ConfigTransaction>, RepoError> {
        self.check("begin")?;
        let guard = self.tables.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryTransaction {
            guard,
            working,
            faults: self.faults.clone(),
        }))
    }

    async fn ping(&self) -> Result<(), RepoError> {
        self.check("ping")
    }
}

/// Transaction over a private copy of the tables.
pub struct MemoryTransaction {
    guard: OwnedMutexGuard<Tables>,
    working: Tables,
    faults: Arc<Mutex<FaultPlan>>,
}

impl MemoryTransaction {
    fn check(&self, operation: &'static str) -> Result<(), RepoError> {
        let plan = self.faults.lock().unwrap_or_else(|e| e.into_inner());
        plan.check(operation)
    }
}

fn sorted_segments<'a>(rows: impl Iterator<Item = &'a SegmentEntity>) -> Vec<SegmentEntity> {
    let mut segments: Vec<SegmentEntity> = rows.cloned().collect();
    segments.sort_by_key(|s| (s.rank, s.id));
    segments
}

#[async_trait]
impl ConfigTransaction for MemoryTransaction {
    async fn find_flag(&mut self, id: i64) -> Result<FlagEntity, RepoError> {
        self.check("find_flag")?;
        self.working
            .flags
            .get(&id)
            .cloned()
            .ok_or_else(|| RepoError::not_found("flag", id))
    }

    async fn find_flag_by_key(&mut self, key: &str) -> Result<Option<FlagEntity>, RepoError> {
        self.check("find_flag_by_key")?;
        Ok(self.working.flags.values().find(|f| f.key == key).cloned())
    }

    async fn find_flags(&mut self, filter: &FlagFilter) -> Result<Vec<FlagEntity>, RepoError> {
        self.check("find_flags")?;
        let rows: Vec<FlagEntity> = self
            .working
            .flags
            .values()
            .filter(|f| filter.matches(f))
            .cloned()
            .collect();
        Ok(filter.page.apply(rows))
    }

    async fn create_flag(&mut self, flag: NewFlag) -> Result<FlagEntity, RepoError> {
        self.check("create_flag")?;
        if self.working.flags.values().any(|f| f.key == flag.key) {
            return Err(RepoError::Storage(format!(
                "unique violation on flags.key '{}'",
                flag.key
            )));
        }
        let now = Utc::now();
        let entity = FlagEntity {
            id: next_id(&mut self.working.seq.flags),
            key: flag.key,
            description: flag.description,
            enabled: flag.enabled,
            data_records_enabled: flag.data_records_enabled,
            updated_by: flag.updated_by,
            created_at: now,
            updated_at: now,
        };
        self.working.flags.insert(entity.id, entity.clone());
        Ok(entity)
    }

    async fn update_flag(&mut self, flag: &FlagEntity) -> Result<FlagEntity, RepoError> {
        self.check("update_flag")?;
        if self
            .working
            .flags
            .values()
            .any(|f| f.key == flag.key && f.id != flag.id)
        {
            return Err(RepoError::Storage(format!(
                "unique violation on flags.key '{}'",
                flag.key
            )));
        }
        let row = self
            .working
            .flags
            .get_mut(&flag.id)
            .ok_or_else(|| RepoError::not_found("flag", flag.id))?;
        *row = FlagEntity {
            created_at: row.created_at,
            updated_at: Utc::now(),
            ..flag.clone()
        };
        Ok(row.clone())
    }

    async fn delete_flag(&mut self, id: i64) -> Result<(), RepoError> {
        self.check("delete_flag")?;
        self.working
            .flags
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| RepoError::not_found("flag", id))
    }

    async fn find_segment(&mut self, id: i64) -> Result<SegmentEntity, RepoError> {
        self.check("find_segment")?;
        self.working
            .segments
            .get(&id)
            .cloned()
            .ok_or_else(|| RepoError::not_found("segment", id))
    }

    async fn find_segments(&mut self, flag_id: i64) -> Result<Vec<SegmentEntity>, RepoError> {
        self.check("find_segments")?;
        Ok(sorted_segments(
            self.working
                .segments
                .values()
                .filter(|s| s.flag_id == flag_id),
        ))
    }

    async fn create_segment(&mut self, segment: NewSegment) -> Result<SegmentEntity, RepoError> {
        self.check("create_segment")?;
        if !self.working.flags.contains_key(&segment.flag_id) {
            return Err(RepoError::not_found("flag", segment.flag_id));
        }
        let entity = SegmentEntity {
            id: next_id(&mut self.working.seq.segments),
            flag_id: segment.flag_id,
            description: segment.description,
            rank: segment.rank,
            rollout_percent: segment.rollout_percent,
        };
        self.working.segments.insert(entity.id, entity.clone());
        Ok(entity)
    }

    async fn update_segment(
        &mut self,
        segment: &SegmentEntity,
    ) -> Result<SegmentEntity, RepoError> {
        self.check("update_segment")?;
        let row = self
            .working
            .segments
            .get_mut(&segment.id)
            .ok_or_else(|| RepoError::not_found("segment", segment.id))?;
        *row = segment.clone();
        Ok(row.clone())
    }

    async fn delete_segment(&mut self, id: i64) -> Result<(), RepoError> {
        self.check("delete_segment")?;
        self.working
            .segments
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| RepoError::not_found("segment", id))
    }

    async fn find_constraint(&mut self, id: i64) -> Result<ConstraintEntity, RepoError> {
        self.check("find_constraint")?;
        self.working
            .constraints
            .get(&id)
            .cloned()
            .ok_or_else(|| RepoError::not_found("constraint", id))
    }

    async fn find_constraints(
        &mut self,
        segment_id: i64,
    ) -> Result<Vec<ConstraintEntity>, RepoError> {
        self.check("find_constraints")?;
        Ok(self
            .working
            .constraints
            .values()
            .filter(|c| c.segment_id == segment_id)
            .cloned()
            .collect())
    }

    async fn create_constraint(
        &mut self,
        constraint: NewConstraint,
    ) -> Result<ConstraintEntity, RepoError> {
        self.check("create_constraint")?;
        if !self.working.segments.contains_key(&constraint.segment_id) {
            return Err(RepoError::not_found("segment", constraint.segment_id));
        }
        let entity = ConstraintEntity {
            id: next_id(&mut self.working.seq.constraints),
            segment_id: constraint.segment_id,
            property: constraint.property,
            operator: constraint.operator,
            value: constraint.value,
        };
        self.working.constraints.insert(entity.id, entity.clone());
        Ok(entity)
    }

    async fn update_constraint(
        &mut self,
        constraint: &ConstraintEntity,
    ) -> Result<ConstraintEntity, RepoError> {
        self.check("update_constraint")?;
        let row = self
            .working
            .constraints
            .get_mut(&constraint.id)
            .ok_or_else(|| RepoError::not_found("constraint", constraint.id))?;
        *row = constraint.clone();
        Ok(row.clone())
    }

    async fn delete_constraint(&mut self, id: i64) -> Result<(), RepoError> {
        self.check("delete_constraint")?;
        self.working
            .constraints
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| RepoError::not_found("constraint", id))
    }

    async fn delete_constraints(&mut self, segment_id: i64) -> Result<u64, RepoError> {
        self.check("delete_constraints")?;
        let before = self.working.constraints.len();
        self.working
            .constraints
            .retain(|_, c| c.segment_id != segment_id);
        Ok((before - self.working.constraints.len()) as u64)
    }

    async fn find_variant(&mut self, id: i64) -> Result<VariantEntity, RepoError> {
        self.check("find_variant")?;
        self.working
            .variants
            .get(&id)
            .cloned()
            .ok_or_else(|| RepoError::not_found("variant", id))
    }

    async fn find_variants(&mut self, flag_id: i64) -> Result<Vec<VariantEntity>, RepoError> {
        self.check("find_variants")?;
        Ok(self
            .working
            .variants
            .values()
            .filter(|v| v.flag_id == flag_id)
            .cloned()
            .collect())
    }

    async fn create_variant(&mut self, variant: NewVariant) -> Result<VariantEntity, RepoError> {
        self.check("create_variant")?;
        if !self.working.flags.contains_key(&variant.flag_id) {
            return Err(RepoError::not_found("flag", variant.flag_id));
        }
        let entity = VariantEntity {
            id: next_id(&mut self.working.seq.variants),
            flag_id: variant.flag_id,
            key: variant.key,
            attachment: variant.attachment,
        };
        self.working.variants.insert(entity.id, entity.clone());
        Ok(entity)
    }

    async fn update_variant(
        &mut self,
        variant: &VariantEntity,
    ) -> Result<VariantEntity, RepoError> {
        self.check("update_variant")?;
        let row = self
            .working
            .variants
            .get_mut(&variant.id)
            .ok_or_else(|| RepoError::not_found("variant", variant.id))?;
        *row = variant.clone();
        Ok(row.clone())
    }

    async fn delete_variant(&mut self, id: i64) -> Result<(), RepoError> {
        self.check("delete_variant")?;
        if self
            .working
            .distributions
            .values()
            .any(|d| d.variant_id == id)
        {
            return Err(RepoError::Storage(format!(
                "foreign key violation: variant {} is referenced by distributions",
                id
            )));
        }
        self.working
            .variants
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| RepoError::not_found("variant", id))
    }

    async fn find_distributions(
        &mut self,
        segment_id: i64,
    ) -> Result<Vec<DistributionEntity>, RepoError> {
        self.check("find_distributions")?;
        Ok(self
            .working
            .distributions
            .values()
            .filter(|d| d.segment_id == segment_id)
            .cloned()
            .collect())
    }

    async fn find_distributions_by_variant(
        &mut self,
        variant_id: i64,
    ) -> Result<Vec<DistributionEntity>, RepoError> {
        self.check("find_distributions_by_variant")?;
        Ok(self
            .working
            .distributions
            .values()
            .filter(|d| d.variant_id == variant_id)
            .cloned()
            .collect())
    }

    async fn create_distribution(
        &mut self,
        distribution: NewDistribution,
    ) -> Result<DistributionEntity, RepoError> {
        self.check("create_distribution")?;
        if !self.working.segments.contains_key(&distribution.segment_id) {
            return Err(RepoError::not_found("segment", distribution.segment_id));
        }
        if !self.working.variants.contains_key(&distribution.variant_id) {
            return Err(RepoError::not_found("variant", distribution.variant_id));
        }
        let entity = DistributionEntity {
            id: next_id(&mut self.working.seq.distributions),
            segment_id: distribution.segment_id,
            variant_id: distribution.variant_id,
            variant_key: distribution.variant_key,
            percent: distribution.percent,
        };
        self.working.distributions.insert(entity.id, entity.clone());
        Ok(entity)
    }

    async fn update_distribution_variant_keys(
        &mut self,
        variant_id: i64,
        variant_key: &str,
    ) -> Result<u64, RepoError> {
        self.check("update_distribution_variant_keys")?;
        let mut updated = 0;
        for d in self
            .working
            .distributions
            .values_mut()
            .filter(|d| d.variant_id == variant_id)
        {
            d.variant_key = variant_key.to_string();
            updated += 1;
        }
        Ok(updated)
    }

    async fn delete_distributions(&mut self, segment_id: i64) -> Result<u64, RepoError> {
        self.check("delete_distributions")?;
        let before = self.working.distributions.len();
        self.working
            .distributions
            .retain(|_, d| d.segment_id != segment_id);
        Ok((before - self.working.distributions.len()) as u64)
    }

    async fn create_snapshot(
        &mut self,
        snapshot: NewFlagSnapshot,
    ) -> Result<FlagSnapshotEntity, RepoError> {
        self.check("create_snapshot")?;
        let entity = FlagSnapshotEntity {
            id: next_id(&mut self.working.seq.snapshots),
            flag_id: snapshot.flag_id,
            updated_by: snapshot.updated_by,
            flag: snapshot.flag,
            created_at: Utc::now(),
        };
        self.working.snapshots.insert(entity.id, entity.clone());
        Ok(entity)
    }

    async fn find_snapshots(
        &mut self,
        flag_id: i64,
        page: PageParams,
    ) -> Result<Vec<FlagSnapshotEntity>, RepoError> {
        self.check("find_snapshots")?;
        let rows: Vec<FlagSnapshotEntity> = self
            .working
            .snapshots
            .values()
            .filter(|s| s.flag_id == flag_id)
            .cloned()
            .collect();
        Ok(page.apply(rows))
    }

    async fn commit(self: Box<Self>) -> Result<(), RepoError> {
        self.check("commit")?;
        let MemoryTransaction {
            mut guard, working, ..
        } = *self;
        *guard = working;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    fn new_flag(key: &str) -> NewFlag {
        NewFlag {
            key: key.into(),
            description: format!("{} description", key),
            enabled: false,
            data_records_enabled: false,
            updated_by: None,
        }
    }

    #[tokio::test]
    async fn test_commit_makes_writes_visible() {
        let store = MemoryConfigStore::new();

        let mut tx = store.begin().await.unwrap();
        let flag = tx.create_flag(new_flag("a")).await.unwrap();
        assert_ok!(tx.commit().await);

        let mut tx = store.begin().await.unwrap();
        assert_eq!(tx.find_flag(flag.id).await.unwrap().key, "a");
    }

    #[tokio::test]
    async fn test_drop_rolls_back() {
        let store = MemoryConfigStore::new();

        let mut tx = store.begin().await.unwrap();
        let flag = tx.create_flag(new_flag("a")).await.unwrap();
        drop(tx);

        let mut tx = store.begin().await.unwrap();
        assert!(tx.find_flag(flag.id).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_failed_commit_keeps_previous_state() {
        let store = MemoryConfigStore::new();
        store.fail_operation("commit");

        let mut tx = store.begin().await.unwrap();
        tx.create_flag(new_flag("a")).await.unwrap();
        assert_err!(tx.commit().await);

        store.clear_faults();
        let mut tx = store.begin().await.unwrap();
        assert!(tx
            .find_flags(&FlagFilter::default())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_fault_plan() {
        let store = MemoryConfigStore::new();
        store.fail_operation("delete_distributions");

        let mut tx = store.begin().await.unwrap();
        assert!(tx.find_flags(&FlagFilter::default()).await.is_ok());
        assert!(matches!(
            tx.delete_distributions(1).await,
            Err(RepoError::Storage(_))
        ));
        drop(tx);

        store.fail_all();
        assert!(store.begin().await.is_err());
        assert!(store.ping().await.is_err());

        store.clear_faults();
        assert!(store.ping().await.is_ok());
    }

    #[tokio::test]
    async fn test_find_flags_orders_by_id_and_pages() {
        let store = MemoryConfigStore::new();
        let mut tx = store.begin().await.unwrap();
        for i in 0..5 {
            tx.create_flag(new_flag(&format!("k{}", i))).await.unwrap();
        }

        let filter = FlagFilter {
            page: PageParams::new(Some(2), Some(1)).unwrap(),
            ..Default::default()
        };
        let ids: Vec<i64> = tx
            .find_flags(&filter)
            .await
            .unwrap()
            .iter()
            .map(|f| f.id)
            .collect();
        assert_eq!(ids, vec![2, 3]);
    }

    #[tokio::test]
    async fn test_segments_ordered_by_rank() {
        let store = MemoryConfigStore::new();
        let mut tx = store.begin().await.unwrap();
        let flag = tx.create_flag(new_flag("a")).await.unwrap();
        for rank in [3, 1, 2] {
            tx.create_segment(NewSegment {
                flag_id: flag.id,
                description: format!("rank {}", rank),
                rank,
                rollout_percent: 100,
            })
            .await
            .unwrap();
        }

        let ranks: Vec<i64> = tx
            .find_segments(flag.id)
            .await
            .unwrap()
            .iter()
            .map(|s| s.rank)
            .collect();
        assert_eq!(ranks, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_unique_flag_key() {
        let store = MemoryConfigStore::new();
        let mut tx = store.begin().await.unwrap();
        tx.create_flag(new_flag("dup")).await.unwrap();
        assert!(tx.create_flag(new_flag("dup")).await.is_err());
    }

    #[tokio::test]
    async fn test_referenced_variant_cannot_be_deleted() {
        let store = MemoryConfigStore::new();
        let mut tx = store.begin().await.unwrap();
        let flag = tx.create_flag(new_flag("a")).await.unwrap();
        let segment = tx
            .create_segment(NewSegment {
                flag_id: flag.id,
                description: "s".into(),
                rank: 1,
                rollout_percent: 100,
            })
            .await
            .unwrap();
        let variant = tx
            .create_variant(NewVariant {
                flag_id: flag.id,
                key: "control".into(),
                attachment: None,
            })
            .await
            .unwrap();
        tx.create_distribution(NewDistribution {
            segment_id: segment.id,
            variant_id: variant.id,
            variant_key: "control".into(),
            percent: 100,
        })
        .await
        .unwrap();

        assert!(tx.delete_variant(variant.id).await.is_err());
        assert_eq!(tx.delete_distributions(segment.id).await.unwrap(), 1);
        assert!(tx.delete_variant(variant.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_load_flag_tree() {
        let store = MemoryConfigStore::new();
        let mut tx = store.begin().await.unwrap();
        let flag = tx.create_flag(new_flag("a")).await.unwrap();
        let segment = tx
            .create_segment(NewSegment {
                flag_id: flag.id,
                description: "s".into(),
                rank: 1,
                rollout_percent: 100,
            })
            .await
            .unwrap();
        tx.create_constraint(NewConstraint {
            segment_id: segment.id,
            property: "state".into(),
            operator: "EQ".into(),
            value: "\"NY\"".into(),
        })
        .await
        .unwrap();
        tx.create_variant(NewVariant {
            flag_id: flag.id,
            key: "control".into(),
            attachment: None,
        })
        .await
        .unwrap();

        let tree = crate::repositories::load_flag_tree(tx.as_mut(), flag.id)
            .await
            .unwrap();
        assert_eq!(tree.flag.id, flag.id);
        assert_eq!(tree.segments.len(), 1);
        assert_eq!(tree.segments[0].constraints.len(), 1);
        assert!(tree.segments[0].distributions.is_empty());
        assert_eq!(tree.variants.len(), 1);

        assert!(crate::repositories::load_flag_tree(tx.as_mut(), 999)
            .await
            .unwrap_err()
            .is_not_found());
    }
}
