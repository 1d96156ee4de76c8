//! Persistence layer for the flag configuration backend.
//!
//! This crate contains:
//! - Database connection management
//! - Entity definitions (database row mappings)
//! - The transactional repository contract and its PostgreSQL and
//!   in-process implementations

pub mod db;
pub mod entities;
pub mod error;
pub mod metrics;
pub mod repositories;

pub use error::RepoError;
