//! Domain services for flag configuration.
//!
//! Services contain business logic that operates on domain models.

pub mod validation;

pub use validation::{
    validate_attachment, validate_constraint, validate_delete_variant, validate_distributions,
    validate_flag_key_uniqueness, validate_key, validate_segment_reorder,
    validate_variant_key_uniqueness,
};
