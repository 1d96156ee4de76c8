//! Database entity definitions.
//!
//! Entities are direct mappings to database rows.

pub mod constraint;
pub mod distribution;
pub mod flag;
pub mod segment;
pub mod snapshot;
pub mod variant;

pub use constraint::{ConstraintEntity, NewConstraint};
pub use distribution::{DistributionEntity, NewDistribution};
pub use flag::{FlagEntity, FlagTree, NewFlag};
pub use segment::{NewSegment, SegmentEntity, SegmentTree};
pub use snapshot::{FlagSnapshotEntity, NewFlagSnapshot};
pub use variant::{NewVariant, VariantEntity};
