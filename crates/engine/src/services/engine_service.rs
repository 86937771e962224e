use std::sync::Arc;
use std::time::Duration;

use anyhow::bail;
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use common::SnapshotSource;
use common::actors::{Actor, ActorType, ControlMessage};
use common::models::{ChangeEvent, NotificationIntent};

use crate::reducer::{EngineState, FeedMode};

/// One reconciliation engine instance. The supervisor may run several at
/// once (one per mode); each holds its own state and debounce windows, and
/// each re-seeds from a fresh snapshot whenever it is (re)started.
pub struct EngineService {
    id: Uuid,
    mode: FeedMode,
    snapshot: Arc<dyn SnapshotSource>,
    feed_rx: broadcast::Receiver<Arc<ChangeEvent>>,
    notify_tx: broadcast::Sender<NotificationIntent>,
}

#[async_trait]
impl Actor for EngineService {
    fn id(&self) -> Uuid {
        self.id
    }

    fn name(&self) -> ActorType {
        match self.mode {
            FeedMode::Latest => ActorType::LatestEngineActor,
            FeedMode::All => ActorType::AllEngineActor,
        }
    }

    async fn run(&mut self, supervisor_tx: mpsc::Sender<ControlMessage>) -> anyhow::Result<()> {
        let heartbeat_handle = self.spawn_heartbeat(supervisor_tx.clone());

        let id = self.id;
        let mode = self.mode;
        let notify_tx = self.notify_tx.clone();

        info!("Starting Reconciliation Engine ({:?} mode)", mode);

        let mut state = match Self::seed(mode, self.snapshot.as_ref()).await {
            Ok(state) => state,
            Err(e) => {
                let err_msg = format!("Snapshot seeding failed: {}", e);
                heartbeat_handle.abort();
                supervisor_tx
                    .send(ControlMessage::Error(id, err_msg.clone()))
                    .await?;
                bail!(err_msg);
            }
        };
        info!(
            "Engine seeded with {} signals ({:?} mode)",
            state.current_signals().len(),
            mode
        );

        let mut status_interval = tokio::time::interval(Duration::from_secs(60));

        loop {
            tokio::select! {
                event_res = self.feed_rx.recv() => {
                    match event_res {
                        Ok(event_arc) => {
                            for intent in state.apply_event(&event_arc, Utc::now()) {
                                // Send only fails when nobody is listening,
                                // which is not the engine's problem.
                                let _ = notify_tx.send(intent);
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            warn!("Engine ({:?}) lagged: missed {} change events", mode, n);
                        }
                        Err(_) => {
                            let err_msg =
                                format!("Change feed closed ({:?} mode). Stopping engine.", mode);
                            heartbeat_handle.abort();
                            supervisor_tx
                                .send(ControlMessage::Error(id, err_msg.clone()))
                                .await?;
                            bail!(err_msg);
                        }
                    }
                }
                _ = status_interval.tick() => {
                    let tracked = state.current_signals();
                    let open = tracked.iter().filter(|s| s.is_open()).count();
                    debug!("STATUS ({:?}): {} tracked, {} open", mode, tracked.len(), open);
                }
            }
        }
    }
}

impl EngineService {
    pub fn new(
        mode: FeedMode,
        snapshot: Arc<dyn SnapshotSource>,
        feed_rx: broadcast::Receiver<Arc<ChangeEvent>>,
        notify_tx: broadcast::Sender<NotificationIntent>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            mode,
            snapshot,
            feed_rx,
            notify_tx,
        }
    }

    async fn seed(mode: FeedMode, snapshot: &dyn SnapshotSource) -> anyhow::Result<EngineState> {
        let rows = snapshot.fetch_signals().await?;
        Ok(EngineState::initialize(mode, rows))
    }
}
