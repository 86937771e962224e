pub mod reducer;
pub mod services;

pub use reducer::{EngineState, FeedMode};
pub use services::engine_service::EngineService;
