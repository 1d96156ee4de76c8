//! Configuration services.

pub mod config_service;
pub mod mapper;
pub mod snapshot;

pub use config_service::ConfigService;
pub use mapper::{EntityMapper, Mapper};
pub use snapshot::SnapshotRecorder;
