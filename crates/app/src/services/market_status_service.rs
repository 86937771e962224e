use std::time::Duration;

use chrono::Utc;
use tracing::info;

use schedule::{describe_schedule, is_active, next_active_start};

/// Once-a-minute session check over the watchlist, feeding the "market
/// closed" / "alerts offline" log lines. The evaluator is a pure function of
/// (symbol, now), so the cadence here is advisory and safe to change.
pub struct MarketStatusService {
    instruments: Vec<String>,
}

impl MarketStatusService {
    pub fn new(instruments: &[&str]) -> Self {
        Self {
            instruments: instruments.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub async fn start(self) {
        let mut interval = tokio::time::interval(Duration::from_secs(60));

        loop {
            interval.tick().await;
            let now = Utc::now();

            for instrument in &self.instruments {
                if is_active(instrument, now) {
                    continue;
                }
                match next_active_start(instrument, now) {
                    Some(next) => info!(
                        "{} session closed ({}), next open {}",
                        instrument,
                        describe_schedule(instrument),
                        next.format("%a %H:%M UTC")
                    ),
                    None => info!("{} session closed", instrument),
                }
            }
        }
    }
}
