use dotenvy::dotenv;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;

use common::actors::ActorType;
use common::logger;
use common::models::{ChangeEvent, NotificationIntent};
use engine::reducer::FeedMode;
use engine::services::engine_service::EngineService;
use feed::remote::SignalApiClient;
use feed::services::feed_gateway::FeedGateway;

use crate::actors::supervisor::Supervisor;
use crate::services::market_status_service::MarketStatusService;
use crate::services::telegram_service::TelegramService;

mod actors;
mod services;

const SIGNAL_TABLE: &str = "signals";

const INSTRUMENTS: &[&str; 12] = &[
    // Forex majors
    "EURUSD",
    "GBPUSD",
    "USDJPY",
    "AUDUSD",
    // Index futures
    "NQ",
    "ES",
    "YM",
    // Metals & energy
    "GC",
    "CL",
    // Crypto
    "BTCUSD",
    "ETHUSD",
    "SOLUSD",
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logger::setup_logger();
    dotenv().ok();
    debug!("System starting up...");

    let mut supervisor = Supervisor::new();

    let snapshot = Arc::new(SignalApiClient::new());

    let (feed_tx, _) = broadcast::channel::<Arc<ChangeEvent>>(10_000);
    let (notify_tx, _) = broadcast::channel::<NotificationIntent>(1_024);

    let tx_for_gateway = feed_tx.clone();
    supervisor.register_actor(
        ActorType::FeedGatewayActor,
        Box::new(move || Box::new(FeedGateway::new(SIGNAL_TABLE, tx_for_gateway.clone()))),
    );

    let snapshot_for_latest = snapshot.clone();
    let feed_for_latest = feed_tx.subscribe();
    let notify_for_latest = notify_tx.clone();
    supervisor.register_actor(
        ActorType::LatestEngineActor,
        Box::new(move || {
            Box::new(EngineService::new(
                FeedMode::Latest,
                snapshot_for_latest.clone(),
                feed_for_latest.resubscribe(),
                notify_for_latest.clone(),
            ))
        }),
    );

    let snapshot_for_all = snapshot.clone();
    let feed_for_all = feed_tx.subscribe();
    let notify_for_all = notify_tx.clone();
    supervisor.register_actor(
        ActorType::AllEngineActor,
        Box::new(move || {
            Box::new(EngineService::new(
                FeedMode::All,
                snapshot_for_all.clone(),
                feed_for_all.resubscribe(),
                notify_for_all.clone(),
            ))
        }),
    );

    tokio::spawn(TelegramService::new().start(notify_tx.subscribe()));
    tokio::spawn(MarketStatusService::new(INSTRUMENTS).start());

    supervisor.start().await;
    Ok(())
}
