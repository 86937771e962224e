use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::{
    sync::{broadcast, mpsc},
    time,
};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::remote::{ChangeFrame, FeedError, get_ws_base_url};
use crate::traits::RemoteResponse;

use common::actors::{Actor, ActorType, ControlMessage};
use common::models::ChangeEvent;

/// Websocket subscription to the hosted database's row-change channel.
/// One gateway feeds any number of engine instances through a broadcast
/// channel; the supervisor restarts it if the connection wedges.
pub struct FeedGateway {
    id: Uuid,
    table: String,
    feed_tx: broadcast::Sender<Arc<ChangeEvent>>,
}

#[async_trait]
impl Actor for FeedGateway {
    fn id(&self) -> Uuid {
        self.id
    }

    fn name(&self) -> ActorType {
        ActorType::FeedGatewayActor
    }

    async fn run(&mut self, supervisor_tx: mpsc::Sender<ControlMessage>) -> anyhow::Result<()> {
        // Heartbeats outlive individual connections; reconnect attempts
        // below are normal operation, not unresponsiveness.
        let _heartbeat_handle = self.spawn_heartbeat(supervisor_tx.clone());

        let url = get_ws_base_url();
        info!("Connecting to: {}", url);

        loop {
            match tokio_tungstenite::connect_async(&url).await {
                Ok((ws_stream, _)) => {
                    let (mut write, mut read) = ws_stream.split();

                    let subscribe =
                        format!(r#"{{"event":"subscribe","table":"{}"}}"#, self.table);
                    if let Err(e) = write.send(Message::Text(subscribe.into())).await {
                        error!("Failed to send subscribe frame: {}. Reconnecting in 2s...", e);
                        time::sleep(Duration::from_secs(2)).await;
                        continue;
                    }

                    while let Some(msg) = read.next().await {
                        match msg {
                            Ok(Message::Text(ref text)) => {
                                match self.parse_feed_message(text) {
                                    Ok(Some(event)) => {
                                        let _ = self.feed_tx.send(Arc::new(event));
                                    }
                                    Ok(None) => continue,
                                    Err(e) => {
                                        supervisor_tx
                                            .send(ControlMessage::Error(
                                                self.id,
                                                format!("Unusable change frame: {}", e),
                                            ))
                                            .await?;
                                        continue;
                                    }
                                }
                            }
                            Ok(Message::Ping(pg)) => {
                                let _ = write.send(Message::Pong(pg)).await;
                                debug!("Ping - Pong reply sent to feed socket.");
                                continue;
                            }
                            Ok(Message::Close(_)) => {
                                debug!("Close frame received");
                                break;
                            }
                            Err(e) => {
                                error!("WebSocket error: {}", e);
                                break;
                            }
                            _ => {
                                supervisor_tx
                                    .send(ControlMessage::Error(
                                        self.id,
                                        "Unexpected frame received, continuing...".to_string(),
                                    ))
                                    .await?;
                                continue;
                            }
                        }
                    }
                }
                Err(e) => {
                    error!("Connection failed: {}. Retrying in 2s...", e);

                    supervisor_tx
                        .send(ControlMessage::Error(
                            self.id,
                            format!("Connection failed: {}. Retrying in 2s...", e),
                        ))
                        .await?;
                    time::sleep(Duration::from_secs(2)).await;
                }
            }
        }
    }
}

impl FeedGateway {
    pub fn new(table: &str, feed_tx: broadcast::Sender<Arc<ChangeEvent>>) -> Self {
        Self {
            id: Uuid::new_v4(),
            table: table.to_string(),
            feed_tx,
        }
    }

    /// `Ok(None)` means the frame was valid but aimed at a table this
    /// gateway does not track.
    fn parse_feed_message(&self, json_input: &str) -> Result<Option<ChangeEvent>, FeedError> {
        let frame: ChangeFrame = serde_json::from_str(json_input)?;

        if let Some(ref table) = frame.table {
            if table != &self.table {
                debug!("Ignoring change frame for table {}", table);
                return Ok(None);
            }
        }

        frame.to_change().map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::models::ChangeKind;

    fn gateway() -> FeedGateway {
        let (feed_tx, _) = broadcast::channel(8);
        FeedGateway::new("signals", feed_tx)
    }

    #[test]
    fn frames_for_other_tables_are_skipped() {
        let raw = r#"{
            "type": "INSERT",
            "table": "subscriptions",
            "record": {"tradeId": "x", "instrumentName": "EURUSD", "entryTime": "2025-06-02T12:00:00Z"}
        }"#;
        assert!(gateway().parse_feed_message(raw).unwrap().is_none());
    }

    #[test]
    fn frames_for_the_tracked_table_come_through() {
        let raw = r#"{
            "type": "INSERT",
            "table": "signals",
            "record": {"tradeId": "x", "instrumentName": "EURUSD", "entryTime": "2025-06-02T12:00:00Z"}
        }"#;
        let event = gateway().parse_feed_message(raw).unwrap().unwrap();
        assert_eq!(event.kind, ChangeKind::Insert);
    }

    #[test]
    fn garbage_frames_error_instead_of_panicking() {
        assert!(gateway().parse_feed_message("not json at all").is_err());
    }
}
