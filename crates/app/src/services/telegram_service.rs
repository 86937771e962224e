use std::env;

use teloxide::prelude::*;
use tokio::sync::broadcast;
use tracing::{error, info};

use common::models::NotificationIntent;

pub struct TelegramService {
    bot: Bot,
    chat_id: ChatId,
}

impl TelegramService {
    pub fn new() -> Self {
        // We expect these to be present. If not, the service will panic at startup, which is fine for critical config.
        let token = env::var("TELEGRAM_BOT_TOKEN").expect("TELEGRAM_BOT_TOKEN not set in .env");
        let chat_id_str = env::var("TELEGRAM_CHAT_ID").expect("TELEGRAM_CHAT_ID not set in .env");
        let chat_id = chat_id_str
            .parse::<i64>()
            .expect("TELEGRAM_CHAT_ID must be a number");

        Self {
            bot: Bot::new(token),
            chat_id: ChatId(chat_id),
        }
    }

    pub async fn start(self, mut rx: broadcast::Receiver<NotificationIntent>) {
        info!("Starting Telegram Notification Service");

        loop {
            match rx.recv().await {
                Ok(intent) => {
                    // Send and log failures, but don't crash; duplicates and
                    // drops are acceptable at this layer.
                    let msg = Self::format_intent(&intent);
                    if let Err(e) = self.bot.send_message(self.chat_id, msg).await {
                        error!("Failed to send Telegram message: {}", e);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    error!("Telegram service lagged behind. Missed {} intents.", n);
                }
                Err(_) => {
                    info!("Notification channel closed. Stopping service.");
                    break;
                }
            }
        }
    }

    fn format_intent(intent: &NotificationIntent) -> String {
        match intent {
            NotificationIntent::SignalOpened {
                instrument,
                side,
                price,
            } => match price {
                Some(p) => format!("OPENED {} {} @ {}", side.label(), instrument, p),
                None => format!("OPENED {} {}", side.label(), instrument),
            },
            NotificationIntent::SignalClosed {
                instrument,
                side,
                price,
            } => match price {
                Some(p) => format!("CLOSED {} {} @ {}", side.label(), instrument, p),
                None => format!("CLOSED {} {}", side.label(), instrument),
            },
        }
    }
}
