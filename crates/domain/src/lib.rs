//! Domain layer for the flag configuration backend.
//!
//! This crate contains:
//! - External representations of flags and their configuration subtree
//! - Request payloads with their field-level validation rules
//! - The configuration error type shared by every layer
//! - Cross-entity validation of proposed configuration changes

pub mod error;
pub mod models;
pub mod services;

pub use error::ConfigError;
