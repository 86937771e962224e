pub mod evaluator;
pub mod table;

pub use evaluator::{describe_schedule, is_active, next_active_start};
pub use table::{BreakWindow, MarketSchedule, lookup_schedule};
