//! Conversion between persisted rows and external representations.

use domain::models::{
    Attachment, Constraint, Distribution, Flag, FlagSnapshot, Operator, Segment, Variant,
};
use domain::ConfigError;
use persistence::entities::{
    ConstraintEntity, DistributionEntity, FlagSnapshotEntity, FlagTree, SegmentTree,
    VariantEntity,
};
use serde_json::Value;

/// Converts persisted entities into wire models and back.
///
/// Every conversion either succeeds or reports [`ConfigError::Mapping`];
/// malformed stored data is never defaulted.
pub trait Mapper: Send + Sync {
    fn flag(&self, tree: &FlagTree) -> Result<Flag, ConfigError>;

    fn segment(&self, tree: &SegmentTree) -> Result<Segment, ConfigError>;

    fn constraint(&self, entity: &ConstraintEntity) -> Result<Constraint, ConfigError>;

    fn variant(&self, entity: &VariantEntity) -> Result<Variant, ConfigError>;

    fn distribution(&self, entity: &DistributionEntity) -> Result<Distribution, ConfigError>;

    /// Storage form of a variant attachment.
    fn attachment_to_entity(
        &self,
        attachment: Option<&Attachment>,
    ) -> Result<Option<Value>, ConfigError>;

    /// Serialized flag stored in a snapshot row.
    fn snapshot_payload(&self, flag: &Flag) -> Result<Value, ConfigError>;

    fn snapshot(&self, entity: &FlagSnapshotEntity) -> Result<FlagSnapshot, ConfigError>;
}

/// The default [`Mapper`].
#[derive(Debug, Clone, Copy, Default)]
pub struct EntityMapper;

impl Mapper for EntityMapper {
    fn flag(&self, tree: &FlagTree) -> Result<Flag, ConfigError> {
        let segments = tree
            .segments
            .iter()
            .map(|s| self.segment(s))
            .collect::<Result<Vec<_>, _>>()?;
        let variants = tree
            .variants
            .iter()
            .map(|v| self.variant(v))
            .collect::<Result<Vec<_>, _>>()?;

        let flag = &tree.flag;
        Ok(Flag {
            id: flag.id,
            key: flag.key.clone(),
            description: flag.description.clone(),
            enabled: flag.enabled,
            data_records_enabled: flag.data_records_enabled,
            segments,
            variants,
            updated_by: flag.updated_by.clone(),
            updated_at: flag.updated_at,
        })
    }

    fn segment(&self, tree: &SegmentTree) -> Result<Segment, ConfigError> {
        let constraints = tree
            .constraints
            .iter()
            .map(|c| self.constraint(c))
            .collect::<Result<Vec<_>, _>>()?;
        let distributions = tree
            .distributions
            .iter()
            .map(|d| self.distribution(d))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Segment {
            id: tree.segment.id,
            description: tree.segment.description.clone(),
            constraints,
            distributions,
            rank: tree.segment.rank,
            rollout_percent: tree.segment.rollout_percent,
        })
    }

    fn constraint(&self, entity: &ConstraintEntity) -> Result<Constraint, ConfigError> {
        let operator: Operator = entity.operator.parse().map_err(|_| {
            ConfigError::mapping(format!(
                "constraint {} has unknown stored operator '{}'",
                entity.id, entity.operator
            ))
        })?;

        let value: Value = serde_json::from_str(&entity.value).map_err(|e| {
            ConfigError::mapping(format!(
                "constraint {} has a malformed stored value: {}",
                entity.id, e
            ))
        })?;
        if operator.expects_array() && !value.is_array() {
            return Err(ConfigError::mapping(format!(
                "constraint {} stores a non-array value for operator {}",
                entity.id, operator
            )));
        }

        Ok(Constraint {
            id: entity.id,
            property: entity.property.clone(),
            operator,
            value: entity.value.clone(),
        })
    }

    fn variant(&self, entity: &VariantEntity) -> Result<Variant, ConfigError> {
        let attachment = match &entity.attachment {
            None | Some(Value::Null) => None,
            Some(Value::Object(map)) => Some(map.clone()),
            Some(other) => {
                return Err(ConfigError::mapping(format!(
                    "variant {} has a stored attachment that is not an object: {}",
                    entity.id, other
                )))
            }
        };

        Ok(Variant {
            id: entity.id,
            key: entity.key.clone(),
            attachment,
        })
    }

    fn distribution(&self, entity: &DistributionEntity) -> Result<Distribution, ConfigError> {
        Ok(Distribution {
            id: entity.id,
            percent: entity.percent,
            variant_id: entity.variant_id,
            variant_key: entity.variant_key.clone(),
        })
    }

    fn attachment_to_entity(
        &self,
        attachment: Option<&Attachment>,
    ) -> Result<Option<Value>, ConfigError> {
        Ok(attachment.map(|a| Value::Object(a.clone())))
    }

    fn snapshot_payload(&self, flag: &Flag) -> Result<Value, ConfigError> {
        serde_json::to_value(flag).map_err(|e| {
            ConfigError::mapping(format!("flag {} could not be serialized: {}", flag.id, e))
        })
    }

    fn snapshot(&self, entity: &FlagSnapshotEntity) -> Result<FlagSnapshot, ConfigError> {
        let flag: Flag = serde_json::from_value(entity.flag.clone()).map_err(|e| {
            ConfigError::mapping(format!(
                "snapshot {} holds a malformed flag: {}",
                entity.id, e
            ))
        })?;

        Ok(FlagSnapshot {
            id: entity.id,
            flag,
            updated_by: entity.updated_by.clone(),
            updated_at: entity.created_at,
        })
    }
}
