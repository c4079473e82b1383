//! Configuration module - settings types and the file/environment loader

pub mod loader;
pub mod types;

pub use loader::load_config;
pub use types::AppConfig;
