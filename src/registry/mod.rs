//! Registry module - durable, cached cross-broker symbol identity store

pub mod postgres;
pub mod store;
pub mod symbol_registry;
pub mod types;

pub use postgres::PostgresSymbolStore;
pub use store::{InMemorySymbolStore, SymbolStore};
pub use symbol_registry::{native_id_for, SymbolRegistry};
pub use types::{SymbolDetails, SymbolRecord};
