//! PostgreSQL configuration store.

use async_trait::async_trait;
use shared::pagination::PageParams;
use sqlx::{PgPool, Postgres, Transaction};

use super::{ConfigStore, ConfigTransaction, FlagFilter};
use crate::entities::{
    ConstraintEntity, DistributionEntity, FlagEntity, FlagSnapshotEntity, NewConstraint,
    NewDistribution, NewFlag, NewFlagSnapshot, NewSegment, NewVariant, SegmentEntity,
    VariantEntity,
};
use crate::error::RepoError;
use crate::metrics::{record_pool_metrics, QueryTimer};

const FLAG_COLUMNS: &str =
    "id, key, description, enabled, data_records_enabled, updated_by, created_at, updated_at";

/// Store backed by a PostgreSQL connection pool.
#[derive(Clone)]
pub struct PgConfigStore {
    pool: PgPool,
}

impl PgConfigStore {
    /// Creates a new PgConfigStore with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl ConfigStore for PgConfigStore {
    async fn begin(&self) -> Result<Box<dyn ConfigTransaction>, RepoError> {
        record_pool_metrics(&self.pool);
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgConfigTransaction { tx }))
    }

    async fn ping(&self) -> Result<(), RepoError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// A database transaction; rolled back by sqlx when dropped uncommitted.
pub struct PgConfigTransaction {
    tx: Transaction<'static, Postgres>,
}

/// Escapes `ILIKE` metacharacters so the pattern matches literally.
fn escape_like(pattern: &str) -> String {
    let mut escaped = String::with_capacity(pattern.len());
    for c in pattern.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn require_row(rows: u64, entity: &'static str, id: i64) -> Result<(), RepoError> {
    if rows == 0 {
        Err(RepoError::not_found(entity, id))
    } else {
        Ok(())
    }
}

#[async_trait]
impl ConfigTransaction for PgConfigTransaction {
    // =========================================================================
    // Flags
    // =========================================================================

    async fn find_flag(&mut self, id: i64) -> Result<FlagEntity, RepoError> {
        let timer = QueryTimer::new("find_flag");
        let result = sqlx::query_as::<_, FlagEntity>(&format!(
            "SELECT {} FROM flags WHERE id = $1",
            FLAG_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await;
        timer.record();
        result?.ok_or_else(|| RepoError::not_found("flag", id))
    }

    async fn find_flag_by_key(&mut self, key: &str) -> Result<Option<FlagEntity>, RepoError> {
        let timer = QueryTimer::new("find_flag_by_key");
        let result = sqlx::query_as::<_, FlagEntity>(&format!(
            "SELECT {} FROM flags WHERE key = $1",
            FLAG_COLUMNS
        ))
        .bind(key)
        .fetch_optional(&mut *self.tx)
        .await;
        timer.record();
        Ok(result?)
    }

    async fn find_flags(&mut self, filter: &FlagFilter) -> Result<Vec<FlagEntity>, RepoError> {
        let timer = QueryTimer::new("find_flags");
        let result = sqlx::query_as::<_, FlagEntity>(&format!(
            r#"
            SELECT {}
            FROM flags
            WHERE ($1::text IS NULL OR key = $1)
              AND ($2::text IS NULL OR description = $2)
              AND ($3::text IS NULL OR description ILIKE '%' || $3 || '%' ESCAPE '\')
              AND ($4::boolean IS NULL OR enabled = $4)
            ORDER BY id ASC
            LIMIT $5 OFFSET $6
            "#,
            FLAG_COLUMNS
        ))
        .bind(filter.key.as_deref())
        .bind(filter.description.as_deref())
        .bind(filter.description_like.as_deref().map(escape_like))
        .bind(filter.enabled)
        .bind(filter.page.limit)
        .bind(filter.page.offset.unwrap_or(0))
        .fetch_all(&mut *self.tx)
        .await;
        timer.record();
        Ok(result?)
    }

    async fn create_flag(&mut self, flag: NewFlag) -> Result<FlagEntity, RepoError> {
        let timer = QueryTimer::new("create_flag");
        let result = sqlx::query_as::<_, FlagEntity>(&format!(
            r#"
            INSERT INTO flags (key, description, enabled, data_records_enabled, updated_by)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}
            "#,
            FLAG_COLUMNS
        ))
        .bind(&flag.key)
        .bind(&flag.description)
        .bind(flag.enabled)
        .bind(flag.data_records_enabled)
        .bind(&flag.updated_by)
        .fetch_one(&mut *self.tx)
        .await;
        timer.record();
        Ok(result?)
    }

    async fn update_flag(&mut self, flag: &FlagEntity) -> Result<FlagEntity, RepoError> {
        let timer = QueryTimer::new("update_flag");
        let result = sqlx::query_as::<_, FlagEntity>(&format!(
            r#"
            UPDATE flags
            SET key = $2, description = $3, enabled = $4, data_records_enabled = $5,
                updated_by = $6, updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            FLAG_COLUMNS
        ))
        .bind(flag.id)
        .bind(&flag.key)
        .bind(&flag.description)
        .bind(flag.enabled)
        .bind(flag.data_records_enabled)
        .bind(&flag.updated_by)
        .fetch_optional(&mut *self.tx)
        .await;
        timer.record();
        result?.ok_or_else(|| RepoError::not_found("flag", flag.id))
    }

    async fn delete_flag(&mut self, id: i64) -> Result<(), RepoError> {
        let timer = QueryTimer::new("delete_flag");
        let result = sqlx::query("DELETE FROM flags WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await;
        timer.record();
        require_row(result?.rows_affected(), "flag", id)
    }

    // =========================================================================
    // Segments
    // =========================================================================

    async fn find_segment(&mut self, id: i64) -> Result<SegmentEntity, RepoError> {
        let timer = QueryTimer::new("find_segment");
        let result = sqlx::query_as::<_, SegmentEntity>(
            r#"
            SELECT id, flag_id, description, rank, rollout_percent
            FROM segments
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await;
        timer.record();
        result?.ok_or_else(|| RepoError::not_found("segment", id))
    }

    async fn find_segments(&mut self, flag_id: i64) -> Result<Vec<SegmentEntity>, RepoError> {
        let timer = QueryTimer::new("find_segments");
        let result = sqlx::query_as::<_, SegmentEntity>(
            r#"
            SELECT id, flag_id, description, rank, rollout_percent
            FROM segments
            WHERE flag_id = $1
            ORDER BY rank ASC, id ASC
            "#,
        )
        .bind(flag_id)
        .fetch_all(&mut *self.tx)
        .await;
        timer.record();
        Ok(result?)
    }

    async fn create_segment(&mut self, segment: NewSegment) -> Result<SegmentEntity, RepoError> {
        let timer = QueryTimer::new("create_segment");
        let result = sqlx::query_as::<_, SegmentEntity>(
            r#"
            INSERT INTO segments (flag_id, description, rank, rollout_percent)
            VALUES ($1, $2, $3, $4)
            RETURNING id, flag_id, description, rank, rollout_percent
            "#,
        )
        .bind(segment.flag_id)
        .bind(&segment.description)
        .bind(segment.rank)
        .bind(segment.rollout_percent)
        .fetch_one(&mut *self.tx)
        .await;
        timer.record();
        Ok(result?)
    }

    async fn update_segment(
        &mut self,
        segment: &SegmentEntity,
    ) -> Result<SegmentEntity, RepoError> {
        let timer = QueryTimer::new("update_segment");
        let result = sqlx::query_as::<_, SegmentEntity>(
            r#"
            UPDATE segments
            SET description = $2, rank = $3, rollout_percent = $4
            WHERE id = $1
            RETURNING id, flag_id, description, rank, rollout_percent
            "#,
        )
        .bind(segment.id)
        .bind(&segment.description)
        .bind(segment.rank)
        .bind(segment.rollout_percent)
        .fetch_optional(&mut *self.tx)
        .await;
        timer.record();
        result?.ok_or_else(|| RepoError::not_found("segment", segment.id))
    }

    async fn delete_segment(&mut self, id: i64) -> Result<(), RepoError> {
        let timer = QueryTimer::new("delete_segment");
        let result = sqlx::query("DELETE FROM segments WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await;
        timer.record();
        require_row(result?.rows_affected(), "segment", id)
    }

    // =========================================================================
    // Constraints
    // =========================================================================

    async fn find_constraint(&mut self, id: i64) -> Result<ConstraintEntity, RepoError> {
        let timer = QueryTimer::new("find_constraint");
        let result = sqlx::query_as::<_, ConstraintEntity>(
            r#"
            SELECT id, segment_id, property, operator, value
            FROM constraints
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await;
        timer.record();
        result?.ok_or_else(|| RepoError::not_found("constraint", id))
    }

    async fn find_constraints(
        &mut self,
        segment_id: i64,
    ) -> Result<Vec<ConstraintEntity>, RepoError> {
        let timer = QueryTimer::new("find_constraints");
        let result = sqlx::query_as::<_, ConstraintEntity>(
            r#"
            SELECT id, segment_id, property, operator, value
            FROM constraints
            WHERE segment_id = $1
            ORDER BY id ASC
            "#,
        )
        .bind(segment_id)
        .fetch_all(&mut *self.tx)
        .await;
        timer.record();
        Ok(result?)
    }

    async fn create_constraint(
        &mut self,
        constraint: NewConstraint,
    ) -> Result<ConstraintEntity, RepoError> {
        let timer = QueryTimer::new("create_constraint");
        let result = sqlx::query_as::<_, ConstraintEntity>(
            r#"
            INSERT INTO constraints (segment_id, property, operator, value)
            VALUES ($1, $2, $3, $4)
            RETURNING id, segment_id, property, operator, value
            "#,
        )
        .bind(constraint.segment_id)
        .bind(&constraint.property)
        .bind(&constraint.operator)
        .bind(&constraint.value)
        .fetch_one(&mut *self.tx)
        .await;
        timer.record();
        Ok(result?)
    }

    async fn update_constraint(
        &mut self,
        constraint: &ConstraintEntity,
    ) -> Result<ConstraintEntity, RepoError> {
        let timer = QueryTimer::new("update_constraint");
        let result = sqlx::query_as::<_, ConstraintEntity>(
            r#"
            UPDATE constraints
            SET property = $2, operator = $3, value = $4
            WHERE id = $1
            RETURNING id, segment_id, property, operator, value
            "#,
        )
        .bind(constraint.id)
        .bind(&constraint.property)
        .bind(&constraint.operator)
        .bind(&constraint.value)
        .fetch_optional(&mut *self.tx)
        .await;
        timer.record();
        result?.ok_or_else(|| RepoError::not_found("constraint", constraint.id))
    }

    async fn delete_constraint(&mut self, id: i64) -> Result<(), RepoError> {
        let timer = QueryTimer::new("delete_constraint");
        let result = sqlx::query("DELETE FROM constraints WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await;
        timer.record();
        require_row(result?.rows_affected(), "constraint", id)
    }

    async fn delete_constraints(&mut self, segment_id: i64) -> Result<u64, RepoError> {
        let timer = QueryTimer::new("delete_constraints");
        let result = sqlx::query("DELETE FROM constraints WHERE segment_id = $1")
            .bind(segment_id)
            .execute(&mut *self.tx)
            .await;
        timer.record();
        Ok(result?.rows_affected())
    }

    // =========================================================================
    // Variants
    // =========================================================================

    async fn find_variant(&mut self, id: i64) -> Result<VariantEntity, RepoError> {
        let timer = QueryTimer::new("find_variant");
        let result = sqlx::query_as::<_, VariantEntity>(
            "SELECT id, flag_id, key, attachment FROM variants WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await;
        timer.record();
        result?.ok_or_else(|| RepoError::not_found("variant", id))
    }

    async fn find_variants(&mut self, flag_id: i64) -> Result<Vec<VariantEntity>, RepoError> {
        let timer = QueryTimer::new("find_variants");
        let result = sqlx::query_as::<_, VariantEntity>(
            r#"
            SELECT id, flag_id, key, attachment
            FROM variants
            WHERE flag_id = $1
            ORDER BY id ASC
            "#,
        )
        .bind(flag_id)
        .fetch_all(&mut *self.tx)
        .await;
        timer.record();
        Ok(result?)
    }

    async fn create_variant(&mut self, variant: NewVariant) -> Result<VariantEntity, RepoError> {
        let timer = QueryTimer::new("create_variant");
        let result = sqlx::query_as::<_, VariantEntity>(
            r#"
            INSERT INTO variants (flag_id, key, attachment)
            VALUES ($1, $2, $3)
            RETURNING id, flag_id, key, attachment
            "#,
        )
        .bind(variant.flag_id)
        .bind(&variant.key)
        .bind(&variant.attachment)
        .fetch_one(&mut *self.tx)
        .await;
        timer.record();
        Ok(result?)
    }

    async fn update_variant(
        &mut self,
        variant: &VariantEntity,
    ) -> Result<VariantEntity, RepoError> {
        let timer = QueryTimer::new("update_variant");
        let result = sqlx::query_as::<_, VariantEntity>(
            r#"
            UPDATE variants
            SET key = $2, attachment = $3
            WHERE id = $1
            RETURNING id, flag_id, key, attachment
            "#,
        )
        .bind(variant.id)
        .bind(&variant.key)
        .bind(&variant.attachment)
        .fetch_optional(&mut *self.tx)
        .await;
        timer.record();
        result?.ok_or_else(|| RepoError::not_found("variant", variant.id))
    }

    async fn delete_variant(&mut self, id: i64) -> Result<(), RepoError> {
        let timer = QueryTimer::new("delete_variant");
        let result = sqlx::query("DELETE FROM variants WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await;
        timer.record();
        require_row(result?.rows_affected(), "variant", id)
    }

    // =========================================================================
    // Distributions
    // =========================================================================

    async fn find_distributions(
        &mut self,
        segment_id: i64,
    ) -> Result<Vec<DistributionEntity>, RepoError> {
        let timer = QueryTimer::new("find_distributions");
        let result = sqlx::query_as::<_, DistributionEntity>(
            r#"
            SELECT id, segment_id, variant_id, variant_key, percent
            FROM distributions
            WHERE segment_id = $1
            ORDER BY id ASC
            "#,
        )
        .bind(segment_id)
        .fetch_all(&mut *self.tx)
        .await;
        timer.record();
        Ok(result?)
    }

    async fn find_distributions_by_variant(
        &mut self,
        variant_id: i64,
    ) -> Result<Vec<DistributionEntity>, RepoError> {
        let timer = QueryTimer::new("find_distributions_by_variant");
        let result = sqlx::query_as::<_, DistributionEntity>(
            r#"
            SELECT id, segment_id, variant_id, variant_key, percent
            FROM distributions
            WHERE variant_id = $1
            ORDER BY id ASC
            "#,
        )
        .bind(variant_id)
        .fetch_all(&mut *self.tx)
        .await;
        timer.record();
        Ok(result?)
    }

    async fn create_distribution(
        &mut self,
        distribution: NewDistribution,
    ) -> Result<DistributionEntity, RepoError> {
        let timer = QueryTimer::new("create_distribution");
        let result = sqlx::query_as::<_, DistributionEntity>(
            r#"
            INSERT INTO distributions (segment_id, variant_id, variant_key, percent)
            VALUES ($1, $2, $3, $4)
            RETURNING id, segment_id, variant_id, variant_key, percent
            "#,
        )
        .bind(distribution.segment_id)
        .bind(distribution.variant_id)
        .bind(&distribution.variant_key)
        .bind(distribution.percent)
        .fetch_one(&mut *self.tx)
        .await;
        timer.record();
        Ok(result?)
    }

    async fn update_distribution_variant_keys(
        &mut self,
        variant_id: i64,
        variant_key: &str,
    ) -> Result<u64, RepoError> {
        let timer = QueryTimer::new("update_distribution_variant_keys");
        let result = sqlx::query("UPDATE distributions SET variant_key = $2 WHERE variant_id = $1")
            .bind(variant_id)
            .bind(variant_key)
            .execute(&mut *self.tx)
            .await;
        timer.record();
        Ok(result?.rows_affected())
    }

    async fn delete_distributions(&mut self, segment_id: i64) -> Result<u64, RepoError> {
        let timer = QueryTimer::new("delete_distributions");
        let result = sqlx::query("DELETE FROM distributions WHERE segment_id = $1")
            .bind(segment_id)
            .execute(&mut *self.tx)
            .await;
        timer.record();
        Ok(result?.rows_affected())
    }

    // =========================================================================
    // Snapshots
    // =========================================================================

    async fn create_snapshot(
        &mut self,
        snapshot: NewFlagSnapshot,
    ) -> Result<FlagSnapshotEntity, RepoError> {
        let timer = QueryTimer::new("create_snapshot");
        let result = sqlx::query_as::<_, FlagSnapshotEntity>(
            r#"
            INSERT INTO flag_snapshots (flag_id, updated_by, flag)
            VALUES ($1, $2, $3)
            RETURNING id, flag_id, updated_by, flag, created_at
            "#,
        )
        .bind(snapshot.flag_id)
        .bind(&snapshot.updated_by)
        .bind(&snapshot.flag)
        .fetch_one(&mut *self.tx)
        .await;
        timer.record();
        Ok(result?)
    }

    async fn find_snapshots(
        &mut self,
        flag_id: i64,
        page: PageParams,
    ) -> Result<Vec<FlagSnapshotEntity>, RepoError> {
        let timer = QueryTimer::new("find_snapshots");
        let result = sqlx::query_as::<_, FlagSnapshotEntity>(
            r#"
            SELECT id, flag_id, updated_by, flag, created_at
            FROM flag_snapshots
            WHERE flag_id = $1
            ORDER BY id ASC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(flag_id)
        .bind(page.limit)
        .bind(page.offset.unwrap_or(0))
        .fetch_all(&mut *self.tx)
        .await;
        timer.record();
        Ok(result?)
    }

    async fn commit(self: Box<Self>) -> Result<(), RepoError> {
        let timer = QueryTimer::new("commit");
        let result = self.tx.commit().await;
        timer.record();
        if let Err(e) = &result {
            tracing::error!("Failed to commit configuration transaction: {}", e);
        }
        Ok(result?)
    }
}
