use super::signal::Side;

/// Emitted by a reconciliation engine when a signal crosses a lifecycle
/// boundary. Dispatchers (Telegram, toasts, push) decide delivery; they are
/// expected to tolerate the occasional duplicate intent.
#[derive(Debug, Clone)]
pub enum NotificationIntent {
    SignalOpened {
        instrument: String,
        side: Side,
        price: Option<f64>,
    },
    SignalClosed {
        instrument: String,
        side: Side,
        price: Option<f64>,
    },
}
