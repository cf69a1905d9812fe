pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod observability;
pub mod pipeline;
pub mod schema;

// Layered boundaries for application and infrastructure
pub mod app;
pub mod infra;
