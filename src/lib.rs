pub mod aggregator;
pub mod browser;
pub mod config;
pub mod constants;
pub mod error;
pub mod fetch;
pub mod identity;
pub mod logging;
pub mod metrics;
pub mod parser;
pub mod pipeline;
pub mod retrieval;
pub mod shards;
pub mod sink;
pub mod store;
pub mod types;
