use async_trait::async_trait;

use crate::models::Signal;

/// Bulk read of the current signal table. An engine seeds itself from a
/// snapshot before consuming its live feed, and again after every restart,
/// fully replacing prior state.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn fetch_signals(&self) -> anyhow::Result<Vec<Signal>>;
}
