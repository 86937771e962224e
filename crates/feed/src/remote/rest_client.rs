use std::env;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{error, warn};

use common::SnapshotSource;
use common::models::Signal;

use crate::remote::change_response::SignalRecord;

/// REST reader for the hosted signal table, used to seed engines before
/// their live feed starts.
#[derive(Clone)]
pub struct SignalApiClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl SignalApiClient {
    pub fn new() -> Self {
        // Critical config; missing credentials should stop the process at startup.
        let api_key = env::var("SIGNAL_API_KEY").expect("SIGNAL_API_KEY not set in .env");
        let base_url = env::var("SIGNAL_API_URL")
            .unwrap_or_else(|_| "https://api.signalstack.app".to_string());

        Self {
            client: Client::new(),
            base_url,
            api_key,
        }
    }

    /// Full current contents of the signal table. Rows that fail boundary
    /// normalization are logged and skipped rather than failing the fetch.
    pub async fn fetch_all(&self) -> anyhow::Result<Vec<Signal>> {
        let url = format!("{}/rest/v1/signals?select=*", self.base_url);

        let resp = self
            .client
            .get(&url)
            .header("apikey", &self.api_key)
            .send()
            .await?;

        if !resp.status().is_success() {
            let error_text = resp.text().await?;
            error!("Signal snapshot fetch failed: {}", error_text);
            anyhow::bail!("snapshot fetch failed: {}", error_text);
        }

        let records = resp.json::<Vec<SignalRecord>>().await?;
        let mut signals = Vec::with_capacity(records.len());
        for record in records {
            match record.normalize() {
                Ok(signal) => signals.push(signal),
                Err(e) => warn!("Skipping malformed snapshot row: {}", e),
            }
        }
        Ok(signals)
    }
}

#[async_trait]
impl SnapshotSource for SignalApiClient {
    async fn fetch_signals(&self) -> anyhow::Result<Vec<Signal>> {
        self.fetch_all().await
    }
}
