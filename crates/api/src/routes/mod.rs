//! HTTP route handlers.

pub mod constraints;
pub mod distributions;
pub mod flags;
pub mod health;
pub mod segments;
pub mod variants;
