pub mod config;
pub mod core;
pub mod engine;
pub mod logging;
pub mod nodes;
pub mod observability;

pub use config::RuntimeConfig;
