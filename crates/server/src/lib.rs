//! tilestash daemon.
//!
//! This crate wires the tile blob store into a process:
//! - Layered configuration loading (TOML file plus `TILESTASH_*` variables)
//! - Health and Prometheus endpoints
//! - Shared state handed to the handlers

pub mod config;
pub mod handlers;
pub mod metrics;
pub mod routes;
pub mod state;

pub use config::load_config;
pub use routes::create_router;
pub use state::AppState;
