use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Timelike, Utc};

use crate::table::{MarketSchedule, lookup_schedule};

/// Is the market/alert session for `symbol` active at `now`?
///
/// Unresolvable symbols fail open: a missing schedule entry must never hide a
/// live signal.
pub fn is_active(symbol: &str, now: DateTime<Utc>) -> bool {
    match lookup_schedule(symbol) {
        None => true,
        Some(schedule) => schedule.is_active_at(now),
    }
}

/// The next UTC instant at which the session for `symbol` becomes active.
///
/// `None` means there is nothing to wait for: the schedule is always open,
/// the symbol has no schedule entry, or the session is active right now.
pub fn next_active_start(symbol: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    lookup_schedule(symbol).and_then(|schedule| schedule.next_open_after(now))
}

/// Human-readable session summary for display on "market closed" cards.
pub fn describe_schedule(symbol: &str) -> String {
    match lookup_schedule(symbol) {
        None => "open around the clock".to_string(),
        Some(schedule) => schedule.describe(),
    }
}

const DAY_NAMES: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

impl MarketSchedule {
    fn trading_day(&self, weekday: u32) -> bool {
        self.day_start <= weekday && weekday <= self.day_end
    }

    fn is_always_open(&self) -> bool {
        self.day_start == 0
            && self.day_end == 6
            && self.open_hour == 0.0
            && self.close_hour == 24.0
            && self.break_window.is_none()
    }

    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        let weekday = now.weekday().num_days_from_sunday();
        if !self.trading_day(weekday) {
            return false;
        }

        let hour = fractional_hour(now);
        if !span_contains(self.open_hour, self.close_hour, hour) {
            return false;
        }
        if let Some(brk) = self.break_window {
            if span_contains(brk.start, brk.end, hour) {
                return false;
            }
        }
        true
    }

    pub fn next_open_after(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if self.is_always_open() {
            return None;
        }

        let weekday = now.weekday().num_days_from_sunday();
        let hour = fractional_hour(now);
        let today = now.date_naive();

        if self.trading_day(weekday) && span_contains(self.open_hour, self.close_hour, hour) {
            if let Some(brk) = self.break_window {
                if span_contains(brk.start, brk.end, hour) {
                    // The session resumes at break end; a midnight-spanning
                    // break ends on the following day.
                    let date = if brk.start > brk.end && hour >= brk.start {
                        today + Duration::days(1)
                    } else {
                        today
                    };
                    return Some(at_fractional_hour(date, brk.end));
                }
            }
            // Already active, nothing to wait for.
            return None;
        }

        let spans_midnight = self.open_hour > self.close_hour;
        if !self.trading_day(weekday) || (!spans_midnight && hour >= self.close_hour) {
            // Walk forward to the next configured weekday. Terminates because
            // day_start..=day_end is never empty.
            let mut offset = 1i64;
            let mut day = (weekday + 1) % 7;
            while !self.trading_day(day) {
                day = (day + 1) % 7;
                offset += 1;
            }
            return Some(at_fractional_hour(
                today + Duration::days(offset),
                self.open_hour,
            ));
        }

        // A trading day, before the open (or between close and re-open for a
        // midnight-spanning session).
        Some(at_fractional_hour(today, self.open_hour))
    }

    pub fn describe(&self) -> String {
        let days = if self.day_start == 0 && self.day_end == 6 {
            "every day".to_string()
        } else {
            format!(
                "{}-{}",
                DAY_NAMES[self.day_start as usize], DAY_NAMES[self.day_end as usize]
            )
        };

        let mut out = format!(
            "{} {}-{} UTC",
            days,
            format_hour(self.open_hour),
            format_hour(self.close_hour)
        );
        if let Some(brk) = self.break_window {
            out.push_str(&format!(
                ", break {}-{}",
                format_hour(brk.start),
                format_hour(brk.end)
            ));
        }
        out
    }
}

fn fractional_hour(now: DateTime<Utc>) -> f64 {
    now.hour() as f64 + now.minute() as f64 / 60.0 + now.second() as f64 / 3600.0
}

/// Membership in a possibly midnight-spanning interval. The start bound is
/// inclusive, the end bound exclusive, so a session is never active at its
/// own close hour.
fn span_contains(start: f64, end: f64, hour: f64) -> bool {
    if start > end {
        hour >= start || hour < end
    } else {
        start <= hour && hour < end
    }
}

fn at_fractional_hour(date: NaiveDate, hour: f64) -> DateTime<Utc> {
    let (h, m) = split_hour(hour);
    Utc.from_utc_datetime(
        &date
            .and_hms_opt(h, m, 0)
            .expect("open/break-end hours stay within 00:00..24:00"),
    )
}

/// 19.75 -> (19, 45).
fn split_hour(hour: f64) -> (u32, u32) {
    let whole = hour.trunc();
    let minutes = ((hour - whole) * 60.0).round() as u32;
    if minutes == 60 {
        (whole as u32 + 1, 0)
    } else {
        (whole as u32, minutes)
    }
}

fn format_hour(hour: f64) -> String {
    let (h, m) = split_hour(hour);
    format!("{:02}:{:02}", h, m)
}
