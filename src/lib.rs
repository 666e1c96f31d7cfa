//! Host-name redirect server with a concurrently reloadable rule set.

// Core subsystems
pub mod config;
pub mod http;
pub mod manager;
pub mod refresh;
pub mod routing;

// Cross-cutting concerns
pub mod control;
pub mod lifecycle;
pub mod observability;
pub mod security;

pub use config::schema::RuleSet;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use manager::ConfigManager;
