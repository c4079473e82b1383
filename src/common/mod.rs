//! Common module - errors, shared types, adapter traits and channels

pub mod channels;
pub mod errors;
pub mod traits;
pub mod types;
