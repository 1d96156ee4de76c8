//! Custom Axum extractors.

pub mod actor;
pub mod rejection;

pub use actor::{Actor, UPDATED_BY_HEADER};
pub use rejection::{JsonBody, PathParams, QueryParams};
