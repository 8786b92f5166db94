pub mod api;
pub mod config;
pub mod credential_store;
pub mod engine;
pub mod errors;
pub mod metrics;
pub mod poller;
pub mod product;
pub mod reservation;
pub mod resolver;
pub mod scheduler;
pub mod session;
pub mod structured_logging;
pub mod types;
