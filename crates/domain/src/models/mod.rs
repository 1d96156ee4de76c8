//! Domain models.

pub mod constraint;
pub mod distribution;
pub mod flag;
pub mod segment;
pub mod snapshot;
pub mod variant;

pub use constraint::{Constraint, CreateConstraintRequest, Operator, PutConstraintRequest};
pub use distribution::{Distribution, DistributionRequest, PutDistributionsRequest};
pub use flag::{CreateFlagRequest, FindFlagsQuery, Flag, PutFlagRequest, SetFlagEnabledRequest};
pub use segment::{CreateSegmentRequest, PutSegmentReorderRequest, PutSegmentRequest, Segment};
pub use snapshot::{FlagSnapshot, FlagSnapshotsQuery};
pub use variant::{Attachment, CreateVariantRequest, PutVariantRequest, Variant};
