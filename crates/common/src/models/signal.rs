use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Direction of a trade signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Long,
    Short,
}

impl Side {
    /// Feed rows carry free-form side strings ("BUY", "Long", "buy", ...).
    /// Every long synonym maps to Long, everything else is Short.
    pub fn from_raw(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "BUY" | "LONG" => Side::Long,
            _ => Side::Short,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Side::Long => "LONG",
            Side::Short => "SHORT",
        }
    }
}

/// One trade idea/execution for one instrument. A signal is Open while
/// `exit_time` is absent and Closed once it is set; there is no third state
/// and no way back from Closed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub trade_id: String,
    pub instrument: String,
    pub side: Side,
    pub entry_time: DateTime<Utc>,
    pub exit_time: Option<DateTime<Utc>>,
    pub entry_price: Option<f64>,
    pub exit_price: Option<f64>,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub mfe: Option<f64>,
    pub mae: Option<f64>,
}

impl Signal {
    pub fn is_open(&self) -> bool {
        self.exit_time.is_none()
    }

    /// Field-wise update merge. Identity and side follow the update row,
    /// optional fields overwrite only when the update actually carries them,
    /// and `entry_time` is immutable once set.
    pub fn merge_update(&mut self, update: &Signal) {
        self.trade_id = update.trade_id.clone();
        self.instrument = update.instrument.clone();
        self.side = update.side;

        if update.exit_time.is_some() {
            self.exit_time = update.exit_time;
        }
        if update.entry_price.is_some() {
            self.entry_price = update.entry_price;
        }
        if update.exit_price.is_some() {
            self.exit_price = update.exit_price;
        }
        if update.stop_loss.is_some() {
            self.stop_loss = update.stop_loss;
        }
        if update.take_profit.is_some() {
            self.take_profit = update.take_profit;
        }
        if update.mfe.is_some() {
            self.mfe = update.mfe;
        }
        if update.mae.is_some() {
            self.mae = update.mae;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn open_signal() -> Signal {
        Signal {
            trade_id: "t-1".to_string(),
            instrument: "EURUSD".to_string(),
            side: Side::Long,
            entry_time: Utc.with_ymd_and_hms(2025, 3, 10, 14, 0, 0).unwrap(),
            exit_time: None,
            entry_price: Some(1.0842),
            exit_price: None,
            stop_loss: Some(1.0810),
            take_profit: None,
            mfe: None,
            mae: None,
        }
    }

    #[test]
    fn side_synonyms_normalize_to_long() {
        for raw in ["BUY", "Buy", "buy", "LONG", "Long", "  long "] {
            assert_eq!(Side::from_raw(raw), Side::Long, "raw = {:?}", raw);
        }
    }

    #[test]
    fn anything_else_normalizes_to_short() {
        for raw in ["SELL", "Sell", "SHORT", "Short", "", "garbage"] {
            assert_eq!(Side::from_raw(raw), Side::Short, "raw = {:?}", raw);
        }
    }

    #[test]
    fn merge_keeps_prior_optionals_when_update_omits_them() {
        let mut current = open_signal();
        let mut update = open_signal();
        update.stop_loss = None;
        update.take_profit = Some(1.0920);

        current.merge_update(&update);

        assert_eq!(current.stop_loss, Some(1.0810));
        assert_eq!(current.take_profit, Some(1.0920));
    }

    #[test]
    fn merge_never_moves_entry_time() {
        let mut current = open_signal();
        let mut update = open_signal();
        update.entry_time = Utc.with_ymd_and_hms(2025, 3, 11, 9, 0, 0).unwrap();

        current.merge_update(&update);

        assert_eq!(
            current.entry_time,
            Utc.with_ymd_and_hms(2025, 3, 10, 14, 0, 0).unwrap()
        );
    }
}
