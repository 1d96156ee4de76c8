//! Snapshot recording for flag configuration history.

use std::sync::Arc;

use domain::models::Flag;
use domain::ConfigError;
use persistence::entities::NewFlagSnapshot;
use persistence::repositories::{load_flag_tree, ConfigTransaction};
use tracing::debug;

use super::mapper::Mapper;

/// Appends a snapshot of a flag's subtree inside the caller's transaction.
#[derive(Clone)]
pub struct SnapshotRecorder {
    mapper: Arc<dyn Mapper>,
}

impl SnapshotRecorder {
    pub fn new(mapper: Arc<dyn Mapper>) -> Self {
        Self { mapper }
    }

    /// Stamps the flag with the acting user, then stores its current subtree.
    ///
    /// Returns the mapped flag as captured in the snapshot. Any failure must
    /// abort the caller's transaction.
    pub async fn record(
        &self,
        tx: &mut dyn ConfigTransaction,
        flag_id: i64,
        actor: Option<&str>,
    ) -> Result<Flag, ConfigError> {
        let mut flag = tx.find_flag(flag_id).await?;
        if let Some(actor) = actor {
            flag.updated_by = Some(actor.to_string());
        }
        tx.update_flag(&flag).await?;

        let tree = load_flag_tree(tx, flag_id).await?;
        let mapped = self.mapper.flag(&tree)?;
        let payload = self.mapper.snapshot_payload(&mapped)?;

        let snapshot = tx
            .create_snapshot(NewFlagSnapshot {
                flag_id,
                updated_by: mapped.updated_by.clone(),
                flag: payload,
            })
            .await?;
        debug!(flag_id, snapshot_id = snapshot.id, "Flag snapshot recorded");

        Ok(mapped)
    }
}
