//! Integration tests for order routing, symbol resolution and harmony

mod common;

use async_trait::async_trait;
use common::{future, record, registry_with, router_for, stock, FakeAdapter};
use janus::common::errors::{Result, TradingError};
use janus::common::traits::{BrokerAdapter, CancelRequest, TradeEventSink};
use janus::common::types::{
    AccountSnapshot, AssetClass, Broker, ContractCandidate, ContractQuery, Direction, Exchange,
    NativeId, NativeOrder, NativeOrderRequest, NativePosition, OrderRef, OrderStatus, OrderType,
};
use mockall::mock;
use pretty_assertions::assert_eq;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

mock! {
    pub Adapter {}

    #[async_trait]
    impl BrokerAdapter for Adapter {
        fn broker(&self) -> Broker;
        fn is_connected(&self) -> bool;
        async fn place_order(&self, request: NativeOrderRequest) -> Result<String>;
        async fn cancel_order(&self, request: CancelRequest) -> Result<()>;
        async fn query_open_orders(&self) -> Result<Vec<NativeOrder>>;
        async fn query_positions(&self) -> Result<Vec<NativePosition>>;
        async fn query_account(&self) -> Result<AccountSnapshot>;
        async fn lookup_contract_candidates(&self, query: &ContractQuery) -> Result<Vec<ContractCandidate>>;
        async fn subscribe_trade_events(&self, account_ids: Vec<String>, sink: Arc<dyn TradeEventSink>) -> Result<()>;
    }
}

// ============================================================================
// send_order
// ============================================================================

#[tokio::test]
async fn test_missing_volume_makes_no_adapter_calls() {
    let (registry, store) = registry_with(vec![]).await;
    let (router, _rx) = router_for(registry);

    let mut adapter = MockAdapter::new();
    adapter.expect_broker().return_const(Broker::Ib);
    adapter.expect_place_order().never();
    adapter.expect_lookup_contract_candidates().never();
    router.register_gateway("ib_main", Arc::new(adapter)).await;

    let result = router.send_order(&json!({"action": "buy", "symbol": "AAPL"}), "ib_main").await;

    assert!(matches!(result, Err(TradingError::Validation(_))));
    assert_eq!(store.write_count(), 0);
}

#[tokio::test]
async fn test_unknown_account_is_not_found() {
    let (registry, _) = registry_with(vec![]).await;
    let (router, _rx) = router_for(registry);

    let result = router
        .send_order(&json!({"action": "buy", "symbol": "AAPL", "volume": 1}), "nobody")
        .await;

    assert_eq!(result.unwrap_err().kind().code(), "NOT_FOUND");
}

#[tokio::test]
async fn test_webull_order_uses_ticker_and_records_state() {
    let (registry, _) = registry_with(vec![]).await;
    let (router, mut rx) = router_for(registry.clone());
    let adapter = FakeAdapter::webull();
    router.register_gateway("webull_main", adapter.clone()).await;

    let order_ref = router
        .send_order(&json!({"action": "buy", "symbol": " aapl", "volume": "3", "price": 187.5}), "webull_main")
        .await
        .unwrap();

    let placed = adapter.last_placed().unwrap();
    assert_eq!(placed.instrument, NativeId::Ticker("AAPL".to_string()));
    assert_eq!(placed.order_type, OrderType::Limit);
    assert!(!placed.short_sale);

    assert_eq!(order_ref.gateway, "webull_main");
    let cached = router.order_book().get(&order_ref).await.unwrap();
    assert_eq!(cached.status, OrderStatus::Submitting);
    assert_eq!(cached.price, dec!(187.5));
    assert_eq!(cached.client_order_id.as_deref(), Some(placed.client_order_id.as_str()));

    let snapshot = rx.recv().await.unwrap();
    assert_eq!(snapshot.order_ref(), order_ref);
    assert!(registry.get_by_webull_ticker("AAPL").await.is_some());
}

#[tokio::test]
async fn test_short_without_long_position_is_short_sale() {
    let (registry, _) = registry_with(vec![]).await;
    let (router, _rx) = router_for(registry);
    let adapter = FakeAdapter::webull();
    router.register_gateway("webull_main", adapter.clone()).await;

    router
        .send_order(&json!({"action": "sell", "symbol": "TSLA", "volume": 1}), "webull_main")
        .await
        .unwrap();
    assert!(adapter.last_placed().unwrap().short_sale);

    adapter.set_positions(vec![NativePosition {
        symbol: "TSLA".to_string(),
        direction: Direction::Long,
        volume: dec!(10),
        avg_price: dec!(240),
    }]);
    router.sync("webull_main").await.unwrap();

    router
        .send_order(&json!({"action": "sell", "symbol": "TSLA", "volume": 1}), "webull_main")
        .await
        .unwrap();
    assert!(!adapter.last_placed().unwrap().short_sale);
}

#[tokio::test]
async fn test_ib_single_candidate_updates_registry_once() {
    let (registry, store) = registry_with(vec![]).await;
    let (router, _rx) = router_for(registry.clone());
    let adapter = FakeAdapter::ib();
    adapter.add_candidates("AAPL", Exchange::Smart, vec![stock(265598)]);
    router.register_gateway("ib_main", adapter.clone()).await;

    let intent = json!({"action": "buy", "symbol": "AAPL", "volume": 1});
    router.send_order(&intent, "ib_main").await.unwrap();
    router.send_order(&intent, "ib_main").await.unwrap();

    assert_eq!(adapter.last_placed().unwrap().instrument, NativeId::ContractId(265598));
    assert_eq!(adapter.lookup_count(), 1);
    assert_eq!(store.write_count(), 1);
    assert_eq!(registry.get_by_ib_conid(265598).await.unwrap().canonical_symbol, "AAPL");
}

#[tokio::test]
async fn test_ib_zero_candidates_is_not_found() {
    let (registry, store) = registry_with(vec![]).await;
    let (router, _rx) = router_for(registry);
    let adapter = FakeAdapter::ib();
    router.register_gateway("ib_main", adapter.clone()).await;

    let result = router
        .send_order(&json!({"action": "buy", "symbol": "ZZZZ", "volume": 1}), "ib_main")
        .await;

    assert!(matches!(result, Err(TradingError::NotFound(_))));
    assert_eq!(adapter.placed_count(), 0);
    assert_eq!(store.write_count(), 0);
}

#[tokio::test]
async fn test_ib_two_candidates_is_ambiguous() {
    let (registry, store) = registry_with(vec![]).await;
    let (router, _rx) = router_for(registry);
    let adapter = FakeAdapter::ib();
    adapter.add_candidates("BRK", Exchange::Smart, vec![stock(1), stock(2)]);
    router.register_gateway("ib_main", adapter.clone()).await;

    let result = router
        .send_order(&json!({"action": "buy", "symbol": "BRK", "volume": 1}), "ib_main")
        .await;

    assert!(matches!(result, Err(TradingError::AmbiguousSymbol { candidates: 2, .. })));
    assert_eq!(adapter.placed_count(), 0);
    assert_eq!(store.write_count(), 0);
}

#[tokio::test]
async fn test_ib_non_usd_equity_candidates_are_filtered() {
    let (registry, _) = registry_with(vec![]).await;
    let (router, _rx) = router_for(registry);
    let adapter = FakeAdapter::ib();
    let mut foreign = stock(2);
    foreign.currency = "CAD".to_string();
    adapter.add_candidates("SHOP", Exchange::Smart, vec![stock(1), foreign]);
    router.register_gateway("ib_main", adapter.clone()).await;

    router
        .send_order(&json!({"action": "buy", "symbol": "SHOP", "volume": 1}), "ib_main")
        .await
        .unwrap();

    assert_eq!(adapter.last_placed().unwrap().instrument, NativeId::ContractId(1));
}

#[tokio::test]
async fn test_ib_futures_fall_back_to_secondary_exchange() {
    let (registry, _) = registry_with(vec![]).await;
    let (router, _rx) = router_for(registry.clone());
    let adapter = FakeAdapter::ib();
    adapter.add_candidates("ZN", Exchange::Cbot, vec![future(815824)]);
    router.register_gateway("ib_main", adapter.clone()).await;

    router
        .send_order(&json!({"action": "sell", "symbol": "ZN.2506", "volume": 2}), "ib_main")
        .await
        .unwrap();

    let lookups = adapter.lookups.lock().unwrap().clone();
    assert_eq!(lookups.len(), 2);
    assert_eq!(lookups[0].exchange, Exchange::Cme);
    assert_eq!(lookups[1].exchange, Exchange::Cbot);
    assert_eq!(lookups[1].expiry.as_deref(), Some("202506"));

    let placed = adapter.last_placed().unwrap();
    assert_eq!(placed.instrument, NativeId::ContractId(815824));
    assert_eq!(placed.exchange, Exchange::Cme);
    assert_eq!(registry.get_by_canonical("ZN.2506").await.unwrap().asset_class, AssetClass::Future);
}

#[tokio::test]
async fn test_lookup_timeout_is_not_found() {
    let (registry, store) = registry_with(vec![]).await;
    let (router, _rx) = router_for(registry);
    let adapter = FakeAdapter::ib();
    adapter.add_candidates("SLOW", Exchange::Smart, vec![stock(7)]);
    adapter.delay_lookups(Duration::from_secs(2));
    router.register_gateway("ib_main", adapter.clone()).await;

    let result = router
        .send_order(&json!({"action": "buy", "symbol": "SLOW", "volume": 1}), "ib_main")
        .await;

    assert!(matches!(result, Err(TradingError::NotFound(_))));
    assert_eq!(store.write_count(), 0);
}

#[tokio::test]
async fn test_placement_failure_is_broker_call() {
    let (registry, _) = registry_with(vec![]).await;
    let (router, _rx) = router_for(registry);
    let adapter = FakeAdapter::webull();
    adapter.fail_placement("insufficient buying power");
    router.register_gateway("webull_main", adapter.clone()).await;

    let err = router
        .send_order(&json!({"action": "buy", "symbol": "AAPL", "volume": 1}), "webull_main")
        .await
        .unwrap_err();

    assert_eq!(err.kind().code(), "BROKER_CALL");
    assert!(err.reason().contains("insufficient buying power"));
    assert!(router.order_book().transact(|cache| cache.is_empty()).await);
}

// ============================================================================
// cancel / sync
// ============================================================================

#[tokio::test]
async fn test_cancel_forwards_cached_order() {
    let (registry, _) = registry_with(vec![]).await;
    let (router, _rx) = router_for(registry);
    let adapter = FakeAdapter::webull();
    router.register_gateway("webull_main", adapter.clone()).await;

    let order_ref = router
        .send_order(&json!({"action": "buy", "symbol": "AAPL", "volume": 1}), "webull_main")
        .await
        .unwrap();
    router.cancel_order(&order_ref).await.unwrap();

    let cancelled = adapter.cancelled.lock().unwrap().clone();
    assert_eq!(cancelled.len(), 1);
    assert_eq!(cancelled[0].order_id, order_ref.order_id);
    assert_eq!(cancelled[0].symbol, "AAPL");
}

#[tokio::test]
async fn test_cancel_unknown_order_is_not_found() {
    let (registry, _) = registry_with(vec![]).await;
    let (router, _rx) = router_for(registry);

    let mut adapter = MockAdapter::new();
    adapter.expect_broker().return_const(Broker::Webull);
    adapter.expect_cancel_order().never();
    router.register_gateway("webull_main", Arc::new(adapter)).await;

    let result = router.cancel_order(&OrderRef::new("webull_main", "404")).await;
    assert!(matches!(result, Err(TradingError::NotFound(_))));
}

#[tokio::test]
async fn test_sync_merges_orders_and_account() {
    let (registry, _) = registry_with(vec![]).await;
    let (router, mut rx) = router_for(registry);
    let adapter = FakeAdapter::ib();
    adapter.set_open_orders(vec![NativeOrder {
        order_id: "77".to_string(),
        client_order_id: None,
        symbol: "MSFT".to_string(),
        direction: Some(Direction::Long),
        order_type: Some(OrderType::Limit),
        price: dec!(400),
        volume: dec!(5),
        traded: Decimal::ZERO,
        status: OrderStatus::Working,
    }]);
    router.register_gateway("ib_main", adapter.clone()).await;

    router.sync("ib_main").await.unwrap();

    let state = rx.recv().await.unwrap();
    assert_eq!(state.order_id, "77");
    assert_eq!(router.order_book().account("ib_main").await.unwrap().balance, dec!(100000));
    assert!(router.sync("missing").await.is_err());
}

// ============================================================================
// harmony
// ============================================================================

#[tokio::test]
async fn test_harmony_backfills_connected_brokers() {
    let (registry, _) = registry_with(vec![
        record("AAPL", AssetClass::Equity, "USD"),
        record("BRK", AssetClass::Stock, "USD"),
        record("SAP", AssetClass::Equity, "EUR"),
        record("ES.2503", AssetClass::Future, "USD"),
        record("GHOST", AssetClass::Etf, "USD"),
        record("BTC", AssetClass::Other("CRYPTO".to_string()), "USD"),
    ])
    .await;
    let (router, _rx) = router_for(registry.clone());

    let ib = FakeAdapter::ib();
    ib.add_candidates("AAPL", Exchange::Smart, vec![stock(265598)]);
    ib.add_candidates("BRK", Exchange::Smart, vec![stock(1), stock(2)]);
    ib.add_candidates("ES", Exchange::Cme, vec![future(551601561)]);
    router.register_gateway("ib_main", ib.clone()).await;

    let webull = FakeAdapter::webull();
    router.register_gateway("webull_main", webull.clone()).await;

    let report = router.harmony_report().await;

    let ib_tally = report.tally(Broker::Ib).unwrap();
    assert_eq!(ib_tally.updated, vec!["AAPL".to_string(), "ES.2503".to_string()]);
    assert_eq!(ib_tally.missing, vec!["GHOST".to_string()]);
    assert_eq!(ib_tally.ambiguous, vec!["BRK".to_string()]);
    assert_eq!(ib_tally.skipped, vec!["BTC".to_string(), "SAP".to_string()]);
    assert!(ib_tally.aborted.is_none());

    let webull_tally = report.tally(Broker::Webull).unwrap();
    assert_eq!(webull_tally.updated, vec!["AAPL".to_string(), "BRK".to_string(), "GHOST".to_string()]);
    assert_eq!(registry.get_by_webull_ticker("GHOST").await.unwrap().canonical_symbol, "GHOST");

    let summary = report.summary();
    assert!(summary.contains("IB updated: 2, missing: 1, skipped: 2, ambiguous: 1"));
    assert!(summary.contains("Webull updated: 3"));
}

#[tokio::test]
async fn test_harmony_adapter_failure_aborts_only_that_broker() {
    let (registry, _) = registry_with(vec![
        record("AAPL", AssetClass::Equity, "USD"),
        record("MSFT", AssetClass::Equity, "USD"),
    ])
    .await;
    let (router, _rx) = router_for(registry.clone());

    let ib = FakeAdapter::ib();
    ib.fail_lookups("gateway disconnected");
    router.register_gateway("ib_main", ib.clone()).await;
    router.register_gateway("webull_main", FakeAdapter::webull()).await;

    let report = router.harmony_report().await;

    let ib_tally = report.tally(Broker::Ib).unwrap();
    assert!(ib_tally.updated.is_empty());
    assert!(ib_tally.aborted.as_deref().unwrap().contains("gateway disconnected"));
    assert_eq!(ib.lookup_count(), 1);

    let webull_tally = report.tally(Broker::Webull).unwrap();
    assert_eq!(webull_tally.updated.len(), 2);
    assert!(report.summary().contains("aborted"));
}

#[tokio::test]
async fn test_harmony_skips_disconnected_brokers() {
    let (registry, _) = registry_with(vec![record("AAPL", AssetClass::Equity, "USD")]).await;
    let (router, _rx) = router_for(registry);

    let ib = FakeAdapter::ib();
    ib.set_connected(false);
    router.register_gateway("ib_main", ib.clone()).await;

    assert_eq!(router.harmony().await, "No connected brokers");
    assert_eq!(ib.lookup_count(), 0);
}
