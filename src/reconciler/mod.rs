//! Reconciler module - trade-event ingestion, order-state updates and stream health

pub mod engine;
pub mod fields;
pub mod health;
pub mod status;
pub mod worker;

pub use engine::{HealthReport, TradeEventEngine};
pub use fields::EventFields;
pub use health::{HealthMonitor, HealthStatus, LogThrottle, WorkerActivity};
pub use status::{derive_status, normalize_status};
pub use worker::{EventIngress, EventProcessor, TradeEventWorker};
