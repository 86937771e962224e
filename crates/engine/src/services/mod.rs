pub mod engine_service;

pub use engine_service::EngineService;
