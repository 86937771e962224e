use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use common::models::{ChangeEvent, ChangeKind, NotificationIntent, Signal};

/// Which projection of the signal table this engine maintains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedMode {
    /// Every distinct signal, deduplicated by trade id.
    All,
    /// At most one signal per instrument, always the most recently opened.
    Latest,
}

const DEBOUNCE_MS: i64 = 1_000;

/// Suppresses duplicate open/close intents landing within the debounce
/// window. One timestamp pair per engine instance, not per instrument: two
/// different instruments opening in the same second yield a single intent.
/// That granularity matches the observed upstream behavior (see DESIGN.md).
#[derive(Debug, Clone, Default)]
struct DebounceState {
    last_opened_fired_at: Option<DateTime<Utc>>,
    last_closed_fired_at: Option<DateTime<Utc>>,
}

impl DebounceState {
    /// Elapsed time <= window suppresses. Clock skew can make the elapsed
    /// duration negative; that suppresses too. The stamp only advances when
    /// an intent actually fires.
    fn allow(slot: &mut Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        if let Some(prev) = *slot {
            if now.signed_duration_since(prev) <= Duration::milliseconds(DEBOUNCE_MS) {
                return false;
            }
        }
        *slot = Some(now);
        true
    }

    fn allow_opened(&mut self, now: DateTime<Utc>) -> bool {
        Self::allow(&mut self.last_opened_fired_at, now)
    }

    fn allow_closed(&mut self, now: DateTime<Utc>) -> bool {
        Self::allow(&mut self.last_closed_fired_at, now)
    }
}

/// In-memory projection of "current signals", fed by row-change events.
///
/// All mutation goes through [`EngineState::apply_event`]; the caller injects
/// the clock, so the whole reducer is deterministic under test.
#[derive(Debug, Clone)]
pub struct EngineState {
    mode: FeedMode,
    signals: Vec<Signal>,
    debounce: DebounceState,
}

impl EngineState {
    /// Seeds state from a full snapshot. No notifications fire during
    /// seeding, and calling this again after a reconnect fully replaces
    /// whatever a previous incarnation held.
    pub fn initialize(mode: FeedMode, rows: Vec<Signal>) -> Self {
        let mut signals: Vec<Signal> = Vec::with_capacity(rows.len());
        for row in rows {
            match mode {
                FeedMode::Latest => {
                    if let Some(existing) = signals
                        .iter_mut()
                        .find(|s| s.instrument == row.instrument)
                    {
                        if row.entry_time >= existing.entry_time {
                            *existing = row;
                        }
                    } else {
                        signals.push(row);
                    }
                }
                FeedMode::All => {
                    if !signals.iter().any(|s| s.trade_id == row.trade_id) {
                        signals.push(row);
                    }
                }
            }
        }
        signals.sort_by(|a, b| b.entry_time.cmp(&a.entry_time));

        Self {
            mode,
            signals,
            debounce: DebounceState::default(),
        }
    }

    pub fn mode(&self) -> FeedMode {
        self.mode
    }

    /// Reconciled view, newest-known first.
    pub fn current_signals(&self) -> &[Signal] {
        &self.signals
    }

    /// The reducer. Applies one feed event and returns whatever notification
    /// intents it produced. Never fails: events that do not match tracked
    /// state are dropped on the floor.
    pub fn apply_event(
        &mut self,
        event: &ChangeEvent,
        now: DateTime<Utc>,
    ) -> Vec<NotificationIntent> {
        match event.kind {
            ChangeKind::Insert => self.apply_insert(&event.row, now),
            ChangeKind::Update => self.apply_update(&event.row, now),
            ChangeKind::Delete => {
                self.remove(&event.row);
                Vec::new()
            }
        }
    }

    fn apply_insert(&mut self, row: &Signal, now: DateTime<Utc>) -> Vec<NotificationIntent> {
        match self.mode {
            FeedMode::Latest => {
                // Newer unconditionally replaces older for the instrument,
                // regardless of the open/closed state of either.
                self.signals.retain(|s| s.instrument != row.instrument);
            }
            FeedMode::All => {
                if self.signals.iter().any(|s| s.trade_id == row.trade_id) {
                    debug!("Duplicate insert for trade {}, ignoring", row.trade_id);
                    return Vec::new();
                }
            }
        }
        self.signals.insert(0, row.clone());

        if row.is_open() && self.debounce.allow_opened(now) {
            vec![NotificationIntent::SignalOpened {
                instrument: row.instrument.clone(),
                side: row.side,
                price: row.entry_price,
            }]
        } else {
            Vec::new()
        }
    }

    fn apply_update(&mut self, row: &Signal, now: DateTime<Utc>) -> Vec<NotificationIntent> {
        let mode = self.mode;
        let Some(tracked) = self.signals.iter_mut().find(|s| match mode {
            FeedMode::Latest => s.instrument == row.instrument,
            FeedMode::All => s.trade_id == row.trade_id,
        }) else {
            // Possibly a row this engine's mode is not tracking. Not an error.
            return Vec::new();
        };

        let was_open = tracked.is_open();
        tracked.merge_update(row);

        let closed_now = tracked.exit_time.is_some();
        let instrument = tracked.instrument.clone();
        let side = tracked.side;
        let price = tracked.exit_price;

        if was_open && closed_now && self.debounce.allow_closed(now) {
            vec![NotificationIntent::SignalClosed {
                instrument,
                side,
                price,
            }]
        } else {
            Vec::new()
        }
    }

    fn remove(&mut self, row: &Signal) {
        match self.mode {
            FeedMode::Latest => self.signals.retain(|s| s.instrument != row.instrument),
            FeedMode::All => self.signals.retain(|s| s.trade_id != row.trade_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use common::models::Side;

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 2, 12, 0, 0).unwrap()
    }

    /// Wall clock for reducer calls, offset in milliseconds from base.
    fn at(offset_ms: i64) -> DateTime<Utc> {
        base() + Duration::milliseconds(offset_ms)
    }

    fn open_signal(trade_id: &str, instrument: &str, entry_offset_s: i64) -> Signal {
        Signal {
            trade_id: trade_id.to_string(),
            instrument: instrument.to_string(),
            side: Side::Long,
            entry_time: base() + Duration::seconds(entry_offset_s),
            exit_time: None,
            entry_price: Some(100.0),
            exit_price: None,
            stop_loss: None,
            take_profit: None,
            mfe: None,
            mae: None,
        }
    }

    fn insert(row: Signal) -> ChangeEvent {
        ChangeEvent {
            kind: ChangeKind::Insert,
            row,
        }
    }

    fn update(row: Signal) -> ChangeEvent {
        ChangeEvent {
            kind: ChangeKind::Update,
            row,
        }
    }

    fn delete(row: Signal) -> ChangeEvent {
        ChangeEvent {
            kind: ChangeKind::Delete,
            row,
        }
    }

    fn close_row(mut row: Signal, exit_offset_s: i64, exit_price: f64) -> Signal {
        row.exit_time = Some(base() + Duration::seconds(exit_offset_s));
        row.exit_price = Some(exit_price);
        row
    }

    #[test]
    fn latest_mode_keeps_one_signal_per_instrument() {
        let mut state = EngineState::initialize(FeedMode::Latest, vec![]);

        state.apply_event(&insert(open_signal("t-1", "EURUSD", 0)), at(0));
        state.apply_event(&insert(open_signal("t-2", "EURUSD", 60)), at(2_000));
        state.apply_event(&insert(open_signal("t-3", "EURUSD", 120)), at(4_000));

        let view = state.current_signals();
        assert_eq!(view.len(), 1);
        assert_eq!(view[0].trade_id, "t-3");
        assert_eq!(view[0].entry_time, base() + Duration::seconds(120));
    }

    #[test]
    fn latest_mode_replaces_even_while_older_is_still_open() {
        let mut state = EngineState::initialize(FeedMode::Latest, vec![]);

        state.apply_event(&insert(open_signal("t-1", "NQ", 0)), at(0));
        // Older t-1 never closed; the newer signal still takes its place.
        state.apply_event(&insert(open_signal("t-2", "NQ", 300)), at(5_000));

        let view = state.current_signals();
        assert_eq!(view.len(), 1);
        assert_eq!(view[0].trade_id, "t-2");
    }

    #[test]
    fn all_mode_insert_is_idempotent_by_trade_id() {
        let mut state = EngineState::initialize(FeedMode::All, vec![]);

        let first = state.apply_event(&insert(open_signal("t-1", "EURUSD", 0)), at(0));
        let second = state.apply_event(&insert(open_signal("t-1", "EURUSD", 0)), at(5_000));

        assert_eq!(state.current_signals().len(), 1);
        assert_eq!(first.len(), 1);
        assert!(second.is_empty(), "re-insert must not re-notify");
    }

    #[test]
    fn all_mode_tracks_distinct_trades_on_one_instrument() {
        let mut state = EngineState::initialize(FeedMode::All, vec![]);

        state.apply_event(&insert(open_signal("t-1", "GC", 0)), at(0));
        state.apply_event(&insert(open_signal("t-2", "GC", 60)), at(5_000));

        assert_eq!(state.current_signals().len(), 2);
        // Newest-known insert renders first.
        assert_eq!(state.current_signals()[0].trade_id, "t-2");
    }

    #[test]
    fn open_to_close_fires_exactly_one_closed_intent() {
        let mut state = EngineState::initialize(FeedMode::Latest, vec![]);
        state.apply_event(&insert(open_signal("t-1", "EURUSD", 0)), at(0));

        let closed = close_row(open_signal("t-1", "EURUSD", 0), 600, 101.5);
        let first = state.apply_event(&update(closed.clone()), at(5_000));
        // Same closing update delivered again, well outside the debounce
        // window: the row is no longer open, so nothing may fire.
        let second = state.apply_event(&update(closed), at(10_000));

        assert_eq!(first.len(), 1);
        assert!(matches!(
            &first[0],
            NotificationIntent::SignalClosed { instrument, price: Some(p), .. }
                if instrument == "EURUSD" && *p == 101.5
        ));
        assert!(second.is_empty());
    }

    #[test]
    fn all_mode_close_is_keyed_by_trade_id() {
        let mut state = EngineState::initialize(FeedMode::All, vec![]);
        state.apply_event(&insert(open_signal("t-1", "GC", 0)), at(0));
        state.apply_event(&insert(open_signal("t-2", "GC", 60)), at(5_000));

        let intents =
            state.apply_event(&update(close_row(open_signal("t-1", "GC", 0), 600, 99.0)), at(10_000));

        assert_eq!(intents.len(), 1);
        let t1 = state
            .current_signals()
            .iter()
            .find(|s| s.trade_id == "t-1")
            .unwrap();
        let t2 = state
            .current_signals()
            .iter()
            .find(|s| s.trade_id == "t-2")
            .unwrap();
        assert!(!t1.is_open());
        assert!(t2.is_open(), "the other trade on the instrument stays open");
    }

    #[test]
    fn opened_debounce_suppresses_rapid_duplicates() {
        let mut state = EngineState::initialize(FeedMode::Latest, vec![]);

        let first = state.apply_event(&insert(open_signal("t-1", "EURUSD", 0)), at(0));
        // Different instrument, 500ms later: still suppressed, the window is
        // engine-global.
        let second = state.apply_event(&insert(open_signal("t-2", "GBPUSD", 1)), at(500));
        // 1.5s after the last fired intent: allowed again.
        let third = state.apply_event(&insert(open_signal("t-3", "USDJPY", 2)), at(1_500));

        assert_eq!(first.len(), 1);
        assert!(second.is_empty());
        assert_eq!(third.len(), 1);
    }

    #[test]
    fn suppressed_events_do_not_extend_the_window() {
        let mut state = EngineState::initialize(FeedMode::Latest, vec![]);

        assert_eq!(state.apply_event(&insert(open_signal("t-1", "A1", 0)), at(0)).len(), 1);
        // Suppressed, and must not re-arm the window...
        assert!(state.apply_event(&insert(open_signal("t-2", "B2", 1)), at(900)).is_empty());
        // ...so 1.5s after the *fired* intent this one goes out.
        assert_eq!(state.apply_event(&insert(open_signal("t-3", "C3", 2)), at(1_500)).len(), 1);
    }

    #[test]
    fn clock_skew_counts_as_suppressed() {
        let mut state = EngineState::initialize(FeedMode::Latest, vec![]);

        assert_eq!(state.apply_event(&insert(open_signal("t-1", "A1", 0)), at(0)).len(), 1);
        // now earlier than the previous fire: negative elapsed, suppressed.
        assert!(state
            .apply_event(&insert(open_signal("t-2", "B2", 1)), at(-2_000))
            .is_empty());
    }

    #[test]
    fn open_and_close_debounce_windows_are_independent() {
        let mut state = EngineState::initialize(FeedMode::All, vec![]);

        let opened = state.apply_event(&insert(open_signal("t-1", "NQ", 0)), at(0));
        // Close lands 200ms after the open fired; the closed window has its
        // own timestamp, so it still fires.
        let closed = state.apply_event(
            &update(close_row(open_signal("t-1", "NQ", 0), 1, 15_000.0)),
            at(200),
        );

        assert_eq!(opened.len(), 1);
        assert_eq!(closed.len(), 1);
    }

    #[test]
    fn orphan_update_and_delete_are_no_ops() {
        let mut state = EngineState::initialize(FeedMode::Latest, vec![]);
        state.apply_event(&insert(open_signal("t-1", "EURUSD", 0)), at(0));

        let intents = state.apply_event(
            &update(close_row(open_signal("t-9", "ZZZ", 0), 600, 1.0)),
            at(5_000),
        );
        assert!(intents.is_empty());

        state.apply_event(&delete(open_signal("t-9", "ZZZ", 0)), at(6_000));
        assert_eq!(state.current_signals().len(), 1);
    }

    #[test]
    fn delete_removes_by_mode_key() {
        let mut latest = EngineState::initialize(FeedMode::Latest, vec![]);
        latest.apply_event(&insert(open_signal("t-1", "EURUSD", 0)), at(0));
        latest.apply_event(&delete(open_signal("t-1", "EURUSD", 0)), at(2_000));
        assert!(latest.current_signals().is_empty());

        let mut all = EngineState::initialize(FeedMode::All, vec![]);
        all.apply_event(&insert(open_signal("t-1", "GC", 0)), at(0));
        all.apply_event(&insert(open_signal("t-2", "GC", 60)), at(5_000));
        all.apply_event(&delete(open_signal("t-1", "GC", 0)), at(7_000));
        assert_eq!(all.current_signals().len(), 1);
        assert_eq!(all.current_signals()[0].trade_id, "t-2");
    }

    #[test]
    fn inserting_an_already_closed_row_applies_without_notifying() {
        let mut state = EngineState::initialize(FeedMode::Latest, vec![]);
        state.apply_event(&insert(open_signal("t-1", "EURUSD", 0)), at(0));

        let closed = close_row(open_signal("t-2", "EURUSD", 60), 600, 1.1);
        let intents = state.apply_event(&insert(closed), at(5_000));

        assert!(intents.is_empty());
        assert_eq!(state.current_signals().len(), 1);
        assert_eq!(state.current_signals()[0].trade_id, "t-2");
    }

    #[test]
    fn snapshot_seeding_dedups_and_orders_newest_first() {
        let rows = vec![
            open_signal("t-1", "EURUSD", 0),
            open_signal("t-2", "NQ", 300),
            // Older duplicate for EURUSD, listed after the newer row.
            open_signal("t-3", "EURUSD", -300),
            open_signal("t-4", "EURUSD", 600),
        ];

        let state = EngineState::initialize(FeedMode::Latest, rows.clone());
        let view = state.current_signals();
        assert_eq!(view.len(), 2);
        assert_eq!(view[0].trade_id, "t-4");
        assert_eq!(view[1].trade_id, "t-2");

        let all = EngineState::initialize(FeedMode::All, rows);
        assert_eq!(all.current_signals().len(), 4);
        assert_eq!(all.current_signals()[0].trade_id, "t-4");
    }

    #[test]
    fn update_merge_leaves_missing_optionals_alone() {
        let mut state = EngineState::initialize(FeedMode::All, vec![]);
        let mut opened = open_signal("t-1", "EURUSD", 0);
        opened.stop_loss = Some(0.99);
        state.apply_event(&insert(opened), at(0));

        let mut partial = open_signal("t-1", "EURUSD", 0);
        partial.entry_price = None;
        partial.take_profit = Some(1.25);
        state.apply_event(&update(partial), at(5_000));

        let tracked = &state.current_signals()[0];
        assert_eq!(tracked.entry_price, Some(100.0));
        assert_eq!(tracked.stop_loss, Some(0.99));
        assert_eq!(tracked.take_profit, Some(1.25));
        assert!(tracked.is_open());
    }
}
