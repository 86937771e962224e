use tracing::debug;

/// Sub-interval of an otherwise-open session during which it is inactive.
/// Same spanning rules as the session itself: `start > end` wraps midnight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BreakWindow {
    pub start: f64,
    pub end: f64,
}

/// Weekly recurrence for one instrument root, all times UTC.
///
/// Hours are fractional hours-of-day; `open_hour > close_hour` denotes a
/// session spanning midnight. Weekdays are 0=Sunday..6=Saturday and every
/// table entry upholds `day_start <= day_end`; week-spanning day ranges are
/// not a supported configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarketSchedule {
    pub root: &'static str,
    pub open_hour: f64,
    pub close_hour: f64,
    pub day_start: u32,
    pub day_end: u32,
    pub break_window: Option<BreakWindow>,
}

const fn globex(root: &'static str) -> MarketSchedule {
    // CME Globex, UTC: opens Sunday 23:00, closes 22:00, daily
    // maintenance hour 22:00-23:00.
    MarketSchedule {
        root,
        open_hour: 23.0,
        close_hour: 22.0,
        day_start: 0,
        day_end: 5,
        break_window: Some(BreakWindow {
            start: 22.0,
            end: 23.0,
        }),
    }
}

const fn crypto(root: &'static str) -> MarketSchedule {
    MarketSchedule {
        root,
        open_hour: 0.0,
        close_hour: 24.0,
        day_start: 0,
        day_end: 6,
        break_window: None,
    }
}

const fn us_cash(root: &'static str) -> MarketSchedule {
    // US cash equity session, 09:30-16:00 Eastern expressed in UTC.
    MarketSchedule {
        root,
        open_hour: 13.5,
        close_hour: 20.0,
        day_start: 1,
        day_end: 5,
        break_window: None,
    }
}

/// The 24/5 forex week: around the clock on Monday..Friday. Also the target
/// of the currency-pair lookup heuristic.
pub const FOREX: MarketSchedule = MarketSchedule {
    root: "FOREX",
    open_hour: 0.0,
    close_hour: 24.0,
    day_start: 1,
    day_end: 5,
    break_window: None,
};

static SCHEDULES: &[MarketSchedule] = &[
    // Equity index futures
    globex("NQ"),
    globex("ES"),
    globex("YM"),
    globex("RTY"),
    // Metals
    globex("GC"),
    globex("SI"),
    globex("HG"),
    // Energy
    globex("CL"),
    globex("NG"),
    // Crypto, always on
    crypto("BTCUSD"),
    crypto("ETHUSD"),
    crypto("SOLUSD"),
    // US cash equities
    us_cash("SPY"),
    us_cash("QQQ"),
    us_cash("AAPL"),
    us_cash("NVDA"),
    us_cash("TSLA"),
];

/// Resolves a raw ticker to its schedule entry.
///
/// Raw tickers may carry futures month/year codes or broker suffixes
/// ("NQZ25", "GCM2024", "BTCUSDT"), so resolution is: exact root match, else
/// longest-prefix match among known roots, else the currency-pair heuristic
/// (USD/EUR/JPY/GBP substring means a forex cross), else `None`, and `None`
/// must be treated as always-open by callers.
pub fn lookup_schedule(symbol: &str) -> Option<&'static MarketSchedule> {
    let ticker = symbol.trim().to_ascii_uppercase();

    if let Some(exact) = SCHEDULES.iter().find(|s| s.root == ticker) {
        return Some(exact);
    }

    let mut best: Option<&'static MarketSchedule> = None;
    for schedule in SCHEDULES {
        if ticker.starts_with(schedule.root)
            && best.is_none_or(|b| schedule.root.len() > b.root.len())
        {
            best = Some(schedule);
        }
    }
    if best.is_some() {
        return best;
    }

    if ["USD", "EUR", "JPY", "GBP"].iter().any(|c| ticker.contains(c)) {
        return Some(&FOREX);
    }

    debug!("No schedule entry for {}, treating as always open", ticker);
    None
}
