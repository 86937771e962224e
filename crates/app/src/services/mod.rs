pub mod market_status_service;
pub mod telegram_service;
