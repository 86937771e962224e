pub mod feed_gateway;

pub use feed_gateway::FeedGateway;
