//! Router module - order intent normalization, symbol resolution and dispatch

pub mod cache;
pub mod harmony;
pub mod intent;
pub mod resolver;
#[allow(clippy::module_inception)]
pub mod router;

pub use cache::{OrderBook, OrderCache};
pub use harmony::{BrokerTally, HarmonyReport};
pub use intent::{parse_futures_symbol, OrderIntent};
pub use resolver::{LookupKind, SymbolResolver};
pub use router::OrderRouter;
