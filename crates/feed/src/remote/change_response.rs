use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use common::models::{ChangeEvent, ChangeKind, Side, Signal};

use crate::traits::RemoteResponse;

#[derive(Error, Debug)]
pub enum FeedError {
    #[error("missing required field `{0}` in signal row")]
    MissingField(&'static str),
    #[error("unsupported change type `{0}`")]
    UnknownChange(String),
    #[error("delete frame carried no row payload")]
    EmptyDelete,
    #[error(transparent)]
    Parse(#[from] serde_json::Error),
}

/// One frame from the hosted database's change channel. `record` holds the
/// new/current row for inserts and updates; deletes only carry `old_record`.
#[derive(Deserialize, Debug)]
pub struct ChangeFrame {
    #[serde(rename = "type")]
    pub change_type: String,
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default)]
    pub record: Option<Value>,
    #[serde(default)]
    pub old_record: Option<Value>,
}

/// A signal row exactly as the feed serves it: camelCase or snake_case keys,
/// trade ids as strings or numbers, optional fields present only when
/// non-null, free-form side strings.
#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct SignalRecord {
    #[serde(alias = "tradeId", alias = "id")]
    pub trade_id: Option<Value>,
    #[serde(alias = "instrumentName", alias = "instrument_name", alias = "symbol")]
    pub instrument: Option<String>,
    #[serde(alias = "tradeSide", alias = "trade_side")]
    pub side: Option<String>,
    #[serde(alias = "entryTime")]
    pub entry_time: Option<DateTime<Utc>>,
    #[serde(alias = "exitTime")]
    pub exit_time: Option<DateTime<Utc>>,
    #[serde(alias = "entryPrice")]
    pub entry_price: Option<f64>,
    #[serde(alias = "exitPrice")]
    pub exit_price: Option<f64>,
    #[serde(alias = "stopLoss")]
    pub stop_loss: Option<f64>,
    #[serde(alias = "takeProfit")]
    pub take_profit: Option<f64>,
    pub mfe: Option<f64>,
    pub mae: Option<f64>,
}

impl SignalRecord {
    /// Boundary normalization into the typed [`Signal`]. Rows missing any of
    /// the identity/entry fields are rejected here so the reducer never has
    /// to deal with them.
    pub fn normalize(&self) -> Result<Signal, FeedError> {
        let trade_id = match &self.trade_id {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => return Err(FeedError::MissingField("trade_id")),
        };
        let instrument = self
            .instrument
            .clone()
            .filter(|s| !s.is_empty())
            .ok_or(FeedError::MissingField("instrument"))?;
        let entry_time = self.entry_time.ok_or(FeedError::MissingField("entry_time"))?;

        Ok(Signal {
            trade_id,
            instrument,
            side: Side::from_raw(self.side.as_deref().unwrap_or("")),
            entry_time,
            exit_time: self.exit_time,
            entry_price: self.entry_price,
            exit_price: self.exit_price,
            stop_loss: self.stop_loss,
            take_profit: self.take_profit,
            mfe: self.mfe,
            mae: self.mae,
        })
    }
}

impl RemoteResponse<ChangeEvent> for ChangeFrame {
    fn to_change(&self) -> Result<ChangeEvent, FeedError> {
        let kind = match self.change_type.to_ascii_uppercase().as_str() {
            "INSERT" => ChangeKind::Insert,
            "UPDATE" => ChangeKind::Update,
            "DELETE" => ChangeKind::Delete,
            other => return Err(FeedError::UnknownChange(other.to_string())),
        };

        let payload = match kind {
            ChangeKind::Delete => self
                .old_record
                .as_ref()
                .or(self.record.as_ref())
                .ok_or(FeedError::EmptyDelete)?,
            _ => self.record.as_ref().ok_or(FeedError::MissingField("record"))?,
        };

        let record: SignalRecord = serde_json::from_value(payload.clone())?;
        Ok(ChangeEvent {
            kind,
            row: record.normalize()?,
        })
    }
}
