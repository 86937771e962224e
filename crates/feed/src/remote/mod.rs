use std::env;

pub mod change_response;
pub mod rest_client;

pub use change_response::{ChangeFrame, FeedError, SignalRecord};
pub use rest_client::SignalApiClient;

pub fn get_ws_base_url() -> String {
    env::var("SIGNAL_WS_URL")
        .unwrap_or_else(|_| "wss://api.signalstack.app/realtime/v1/changes".to_string())
}
