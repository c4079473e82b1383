//! Trait definitions for broker adapters and the reconciliation seams

use async_trait::async_trait;
use serde_json::Value;

use super::errors::Result;
use super::types::{
    AccountSnapshot, Broker, ContractCandidate, ContractQuery, Exchange, NativeOrder,
    NativeOrderRequest, NativePosition,
};

/// Cancel parameters forwarded to a broker adapter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancelRequest {
    pub order_id: String,
    pub symbol: String,
    pub exchange: Exchange,
}

/// Trait for broker adapters (IB, Webull, ...)
///
/// Adapters wrap one broker's SDK. The core treats every call as opaque:
/// it hands over broker-native parameters and receives broker-native results.
#[async_trait]
pub trait BrokerAdapter: Send + Sync {
    /// Which broker this adapter talks to
    fn broker(&self) -> Broker;

    /// Whether the underlying session is currently connected
    fn is_connected(&self) -> bool;

    /// Place an order, returning the broker-native order id
    async fn place_order(&self, request: NativeOrderRequest) -> Result<String>;

    /// Cancel a working order
    async fn cancel_order(&self, request: CancelRequest) -> Result<()>;

    /// Query all open orders of the connected account
    async fn query_open_orders(&self) -> Result<Vec<NativeOrder>>;

    /// Query all positions of the connected account
    async fn query_positions(&self) -> Result<Vec<NativePosition>>;

    /// Query account balances
    async fn query_account(&self) -> Result<AccountSnapshot>;

    /// Look up contracts matching the query
    ///
    /// Only meaningful for contract-id brokers; ticker brokers may return an
    /// empty list.
    async fn lookup_contract_candidates(
        &self,
        query: &ContractQuery,
    ) -> Result<Vec<ContractCandidate>>;

    /// Subscribe to the trade-event stream of the given accounts
    ///
    /// Runs the SDK's receive loop until the stream ends or the task is
    /// aborted, invoking `sink` once per pushed message.
    async fn subscribe_trade_events(
        &self,
        account_ids: Vec<String>,
        sink: std::sync::Arc<dyn TradeEventSink>,
    ) -> Result<()>;
}

/// Ingestion boundary the broker SDK callbacks push into
///
/// Implementations must not block: callbacks run on the SDK's own thread.
pub trait TradeEventSink: Send + Sync {
    /// Called once per trade/order event payload
    fn on_event(&self, payload: Value);

    /// Called for SDK log lines
    fn on_log(&self, level: tracing::Level, message: &str);
}

/// Consolidated state refresh (orders + positions + account) for one gateway
#[async_trait]
pub trait Resync: Send + Sync {
    async fn resync(&self, gateway: &str) -> Result<()>;
}
