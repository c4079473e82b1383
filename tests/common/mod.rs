//! Common test utilities and fixtures

#![allow(dead_code)]

use async_trait::async_trait;
use janus::common::channels::{create_order_channel, OrderStateReceiver};
use janus::common::errors::{Result, TradingError};
use janus::common::traits::{BrokerAdapter, CancelRequest, Resync, TradeEventSink};
use janus::common::types::{
    AccountSnapshot, AssetClass, Broker, ContractCandidate, ContractQuery, Exchange,
    InstrumentType, NativeOrder, NativeOrderRequest, NativePosition,
};
use janus::config::types::RouterSettings;
use janus::registry::{InMemorySymbolStore, SymbolRecord, SymbolRegistry};
use janus::OrderRouter;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Scriptable in-process broker adapter
pub struct FakeAdapter {
    broker: Broker,
    connected: AtomicBool,
    next_order_id: AtomicUsize,
    candidates: Mutex<HashMap<(String, Exchange), Vec<ContractCandidate>>>,
    lookup_failure: Mutex<Option<String>>,
    lookup_delay: Mutex<Option<Duration>>,
    place_failure: Mutex<Option<String>>,
    subscribe_failure: Mutex<Option<String>>,
    open_orders: Mutex<Vec<NativeOrder>>,
    positions: Mutex<Vec<NativePosition>>,
    pub placed: Mutex<Vec<NativeOrderRequest>>,
    pub cancelled: Mutex<Vec<CancelRequest>>,
    pub lookups: Mutex<Vec<ContractQuery>>,
    pub syncs: AtomicUsize,
    sink: Mutex<Option<Arc<dyn TradeEventSink>>>,
    pub subscribed_accounts: Mutex<Vec<String>>,
}

impl FakeAdapter {
    pub fn new(broker: Broker) -> Self {
        Self {
            broker,
            connected: AtomicBool::new(true),
            next_order_id: AtomicUsize::new(1000),
            candidates: Mutex::new(HashMap::new()),
            lookup_failure: Mutex::new(None),
            lookup_delay: Mutex::new(None),
            place_failure: Mutex::new(None),
            subscribe_failure: Mutex::new(None),
            open_orders: Mutex::new(Vec::new()),
            positions: Mutex::new(Vec::new()),
            placed: Mutex::new(Vec::new()),
            cancelled: Mutex::new(Vec::new()),
            lookups: Mutex::new(Vec::new()),
            syncs: AtomicUsize::new(0),
            sink: Mutex::new(None),
            subscribed_accounts: Mutex::new(Vec::new()),
        }
    }

    pub fn ib() -> Arc<Self> {
        Arc::new(Self::new(Broker::Ib))
    }

    pub fn webull() -> Arc<Self> {
        Arc::new(Self::new(Broker::Webull))
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Candidates returned for `symbol` on `exchange`
    pub fn add_candidates(&self, symbol: &str, exchange: Exchange, candidates: Vec<ContractCandidate>) {
        self.candidates
            .lock()
            .unwrap()
            .insert((symbol.to_string(), exchange), candidates);
    }

    pub fn fail_lookups(&self, message: &str) {
        *self.lookup_failure.lock().unwrap() = Some(message.to_string());
    }

    pub fn delay_lookups(&self, delay: Duration) {
        *self.lookup_delay.lock().unwrap() = Some(delay);
    }

    pub fn fail_placement(&self, message: &str) {
        *self.place_failure.lock().unwrap() = Some(message.to_string());
    }

    pub fn fail_subscription(&self, message: &str) {
        *self.subscribe_failure.lock().unwrap() = Some(message.to_string());
    }

    pub fn set_positions(&self, positions: Vec<NativePosition>) {
        *self.positions.lock().unwrap() = positions;
    }

    pub fn set_open_orders(&self, orders: Vec<NativeOrder>) {
        *self.open_orders.lock().unwrap() = orders;
    }

    pub fn placed_count(&self) -> usize {
        self.placed.lock().unwrap().len()
    }

    pub fn lookup_count(&self) -> usize {
        self.lookups.lock().unwrap().len()
    }

    pub fn last_placed(&self) -> Option<NativeOrderRequest> {
        self.placed.lock().unwrap().last().cloned()
    }

    /// The sink handed over by the last subscription, once subscribed
    pub fn sink(&self) -> Option<Arc<dyn TradeEventSink>> {
        self.sink.lock().unwrap().clone()
    }

    /// Wait until a subscription has delivered its sink
    pub async fn wait_for_sink(&self) -> Arc<dyn TradeEventSink> {
        for _ in 0..200 {
            if let Some(sink) = self.sink() {
                return sink;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("adapter was never subscribed");
    }
}

#[async_trait]
impl BrokerAdapter for FakeAdapter {
    fn broker(&self) -> Broker {
        self.broker
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn place_order(&self, request: NativeOrderRequest) -> Result<String> {
        let failure = self.place_failure.lock().unwrap().clone();
        if let Some(message) = failure {
            return Err(TradingError::BrokerCall(message));
        }
        self.placed.lock().unwrap().push(request);
        Ok(self.next_order_id.fetch_add(1, Ordering::SeqCst).to_string())
    }

    async fn cancel_order(&self, request: CancelRequest) -> Result<()> {
        self.cancelled.lock().unwrap().push(request);
        Ok(())
    }

    async fn query_open_orders(&self) -> Result<Vec<NativeOrder>> {
        self.syncs.fetch_add(1, Ordering::SeqCst);
        Ok(self.open_orders.lock().unwrap().clone())
    }

    async fn query_positions(&self) -> Result<Vec<NativePosition>> {
        Ok(self.positions.lock().unwrap().clone())
    }

    async fn query_account(&self) -> Result<AccountSnapshot> {
        Ok(AccountSnapshot {
            account_id: "acct1".to_string(),
            balance: dec!(100000),
            available: dec!(50000),
        })
    }

    async fn lookup_contract_candidates(&self, query: &ContractQuery) -> Result<Vec<ContractCandidate>> {
        self.lookups.lock().unwrap().push(query.clone());

        let delay = *self.lookup_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let failure = self.lookup_failure.lock().unwrap().clone();
        if let Some(message) = failure {
            return Err(TradingError::BrokerCall(message));
        }

        Ok(self
            .candidates
            .lock()
            .unwrap()
            .get(&(query.symbol.clone(), query.exchange))
            .cloned()
            .unwrap_or_default())
    }

    async fn subscribe_trade_events(&self, account_ids: Vec<String>, sink: Arc<dyn TradeEventSink>) -> Result<()> {
        self.subscribed_accounts.lock().unwrap().extend(account_ids);
        let failure = self.subscribe_failure.lock().unwrap().clone();
        if let Some(message) = failure {
            return Err(TradingError::BrokerCall(message));
        }
        *self.sink.lock().unwrap() = Some(sink);
        // Streams run until the worker aborts the subscription
        std::future::pending::<()>().await;
        Ok(())
    }
}

/// Resync target that counts calls, optionally taking `delay` to finish
#[derive(Default)]
pub struct CountingResync {
    pub calls: AtomicUsize,
    pub gateways: Mutex<Vec<String>>,
    delay: Duration,
}

impl CountingResync {
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Resync for CountingResync {
    async fn resync(&self, gateway: &str) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.gateways.lock().unwrap().push(gateway.to_string());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(())
    }
}

pub fn stock(contract_id: i64) -> ContractCandidate {
    ContractCandidate {
        contract_id,
        instrument_type: InstrumentType::Stock,
        currency: "USD".to_string(),
        description: Some(format!("Stock {}", contract_id)),
    }
}

pub fn future(contract_id: i64) -> ContractCandidate {
    ContractCandidate {
        contract_id,
        instrument_type: InstrumentType::Future,
        currency: "USD".to_string(),
        description: None,
    }
}

pub fn record(symbol: &str, asset_class: AssetClass, currency: &str) -> SymbolRecord {
    SymbolRecord::new(symbol, asset_class, currency)
}

pub async fn registry_with(records: Vec<SymbolRecord>) -> (Arc<SymbolRegistry>, Arc<InMemorySymbolStore>) {
    let store = Arc::new(InMemorySymbolStore::with_records(records));
    let registry = SymbolRegistry::open(store.clone())
        .await
        .expect("in-memory registry opens");
    (Arc::new(registry), store)
}

/// Router over `registry` with short lookup timeouts
pub fn router_for(registry: Arc<SymbolRegistry>) -> (Arc<OrderRouter>, OrderStateReceiver) {
    let settings = RouterSettings {
        lookup_timeout_ms: 200,
        ..RouterSettings::default()
    };
    let (tx, rx) = create_order_channel();
    (Arc::new(OrderRouter::new(registry, settings, tx)), rx)
}

/// Sample trade-event payloads
pub mod payloads {
    /// Partial fill reported with a FILLED scene
    pub const PARTIAL_FILL: &str = r#"{
        "account_id": "acct1",
        "client_order_id": "c1",
        "order_id": "o1",
        "symbol": "AAPL",
        "side": "BUY",
        "quantity": "10",
        "filled_qty": "4",
        "order_type": "STOP_LOSS",
        "stop_price": "98",
        "order_status": "SUBMITTED",
        "scene_type": "FILLED"
    }"#;

    /// Event for an account the gateway does not own
    pub const OTHER_ACCOUNT: &str = r#"{
        "account_id": "acct2",
        "order_id": "o2",
        "symbol": "MSFT",
        "side": "SELL",
        "quantity": "1"
    }"#;

    /// Placement failure keyed only by client order id
    pub const PLACE_FAILED: &str = r#"{
        "account_id": "acct1",
        "client_order_id": "cid1",
        "symbol": "AAPL",
        "side": "BUY",
        "quantity": "1",
        "filled_qty": "0",
        "order_type": "LIMIT",
        "limit_price": "10",
        "order_status": "FAILED",
        "scene_type": "PLACE_FAILED"
    }"#;

    pub fn filled(order_id: &str) -> serde_json::Value {
        serde_json::json!({
            "account_id": "acct1",
            "orderId": order_id,
            "orderStatus": "FILLED",
            "qty": 5,
        })
    }

    pub fn cancelled(order_id: &str) -> serde_json::Value {
        serde_json::json!({
            "account_id": "acct1",
            "order_id": order_id,
            "status": "CANCELLED",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payloads_parse() {
        for raw in [payloads::PARTIAL_FILL, payloads::OTHER_ACCOUNT, payloads::PLACE_FAILED] {
            let value: serde_json::Value = serde_json::from_str(raw).unwrap();
            assert!(value.is_object());
        }
    }
}
