//! Janus Library
//!
//! Order backbone for a multi-broker trading terminal: a cross-broker symbol
//! registry, an order router and a trade-event reconciler.

pub mod common;
pub mod config;
pub mod reconciler;
pub mod registry;
pub mod router;

// Re-export commonly used types
pub use common::errors::{ErrorKind, Result, TradingError};
pub use common::traits::{BrokerAdapter, CancelRequest, Resync, TradeEventSink};
pub use common::types::{
    Broker, Direction, Exchange, NativeId, OrderRef, OrderState, OrderStatus, OrderType,
};
pub use config::types::AppConfig;
pub use reconciler::{HealthReport, HealthStatus, TradeEventEngine};
pub use registry::{InMemorySymbolStore, PostgresSymbolStore, SymbolRecord, SymbolRegistry, SymbolStore};
pub use router::{HarmonyReport, OrderIntent, OrderRouter};
