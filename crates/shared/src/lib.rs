//! Shared utilities and common types for the flag configuration backend.
//!
//! This crate provides common functionality used across all other crates:
//! - Key format, percentage and attachment validation helpers
//! - Limit/offset pagination

pub mod pagination;
pub mod validation;
