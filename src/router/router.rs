//! Order router: intent dispatch, cancel and state sync across gateways

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use super::cache::OrderBook;
use super::harmony::{self, HarmonyReport};
use super::intent::OrderIntent;
use super::resolver::{as_broker_error, SymbolResolver};
use crate::common::channels::{notify, OrderStateSender};
use crate::common::errors::{Result, TradingError};
use crate::common::traits::{BrokerAdapter, CancelRequest, Resync};
use crate::common::types::{
    Broker, Direction, NativeId, NativeOrderRequest, OrderRef, OrderState, OrderStatus,
};
use crate::config::types::RouterSettings;
use crate::registry::SymbolRegistry;

/// Routes broker-neutral order intents to named gateways
///
/// A gateway is one broker connection bound to one account; its name is the
/// account name callers pass to [`OrderRouter::send_order`] and the prefix of
/// every [`OrderRef`] it produces.
pub struct OrderRouter {
    resolver: SymbolResolver,
    settings: RouterSettings,
    gateways: RwLock<HashMap<String, Arc<dyn BrokerAdapter>>>,
    book: Arc<OrderBook>,
    notifier: OrderStateSender,
}

impl OrderRouter {
    pub fn new(registry: Arc<SymbolRegistry>, settings: RouterSettings, notifier: OrderStateSender) -> Self {
        Self {
            resolver: SymbolResolver::new(registry, settings.clone()),
            settings,
            gateways: RwLock::new(HashMap::new()),
            book: Arc::new(OrderBook::new()),
            notifier,
        }
    }

    /// Add (or replace) a named gateway
    pub async fn register_gateway(&self, name: impl Into<String>, adapter: Arc<dyn BrokerAdapter>) {
        let name = name.into();
        info!("Registered {} gateway {}", adapter.broker(), name);
        self.gateways.write().await.insert(name, adapter);
    }

    pub async fn gateway(&self, name: &str) -> Result<Arc<dyn BrokerAdapter>> {
        self.gateways
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| TradingError::NotFound(format!("Unknown account: {}", name)))
    }

    /// Gateway names in sorted order
    pub async fn gateway_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.gateways.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// First connected gateway of each broker kind, by gateway name
    pub(crate) async fn connected_adapters(&self) -> Vec<(Broker, String, Arc<dyn BrokerAdapter>)> {
        let gateways = self.gateways.read().await;
        let mut names: Vec<&String> = gateways.keys().collect();
        names.sort();

        let mut selected: Vec<(Broker, String, Arc<dyn BrokerAdapter>)> = Vec::new();
        for broker in Broker::ALL {
            let found = names.iter().find_map(|name| {
                let adapter = gateways.get(*name)?;
                (adapter.broker() == broker && adapter.is_connected())
                    .then(|| ((*name).clone(), adapter.clone()))
            });
            if let Some((name, adapter)) = found {
                selected.push((broker, name, adapter));
            }
        }
        selected
    }

    pub fn registry(&self) -> &Arc<SymbolRegistry> {
        self.resolver.registry()
    }

    pub(crate) fn resolver(&self) -> &SymbolResolver {
        &self.resolver
    }

    pub fn settings(&self) -> &RouterSettings {
        &self.settings
    }

    /// Shared order cache, also updated by the trade-event reconciler
    pub fn order_book(&self) -> Arc<OrderBook> {
        self.book.clone()
    }

    pub fn notifier(&self) -> OrderStateSender {
        self.notifier.clone()
    }

    /// Validate, resolve and dispatch a raw order intent
    ///
    /// Validation and resolution failures return before any broker call.
    pub async fn send_order(&self, request: &Value, account: &str) -> Result<OrderRef> {
        let intent = OrderIntent::from_value(request, &self.settings).inspect_err(|e| {
            warn!("Order rejected: {}", e.reason());
        })?;
        self.send_intent(intent, account).await
    }

    /// Dispatch an already normalized intent to `account`
    #[instrument(skip(self, intent), fields(symbol = %intent.symbol))]
    pub async fn send_intent(&self, intent: OrderIntent, account: &str) -> Result<OrderRef> {
        let adapter = self.gateway(account).await?;

        let instrument = self
            .resolver
            .resolve(adapter.as_ref(), &intent.symbol)
            .await
            .inspect_err(|e| warn!("Order for {} rejected: {}", intent.symbol, e.reason()))?;

        let short_sale = match (&instrument, intent.direction) {
            (NativeId::Ticker(ticker), Direction::Short) => {
                let holds_long = self
                    .book
                    .transact(|cache| cache.has_long_position(account, &[intent.symbol.as_str(), ticker.as_str()]))
                    .await;
                !holds_long
            }
            _ => false,
        };

        let client_order_id = Uuid::new_v4().to_string();
        let request = NativeOrderRequest {
            instrument,
            symbol: intent.symbol.clone(),
            exchange: intent.exchange,
            direction: intent.direction,
            order_type: intent.order_type,
            volume: intent.volume,
            price: intent.price,
            stop_price: intent.stop_price,
            limit_price: intent.limit_price,
            offset: intent.offset,
            short_sale,
            client_order_id: client_order_id.clone(),
        };

        let order_id = adapter.place_order(request).await.map_err(|e| {
            let err = as_broker_error(e);
            warn!("Order for {} failed at {}: {}", intent.symbol, account, err);
            err
        })?;

        let state = OrderState {
            gateway: account.to_string(),
            order_id: order_id.clone(),
            client_order_id: Some(client_order_id),
            symbol: intent.symbol.clone(),
            exchange: intent.exchange,
            direction: Some(intent.direction),
            order_type: Some(intent.order_type),
            price: intent.price,
            volume: intent.volume,
            traded: rust_decimal::Decimal::ZERO,
            status: OrderStatus::Submitting,
            updated_at: Utc::now(),
        };
        let order_ref = state.order_ref();

        // An event may already have created the order; keep what it learned
        let snapshot = self
            .book
            .transact(|cache| {
                let merged = match cache.get(&order_ref) {
                    Some(existing) => OrderState {
                        client_order_id: state.client_order_id.clone(),
                        direction: existing.direction.or(state.direction),
                        order_type: existing.order_type.or(state.order_type),
                        exchange: state.exchange,
                        ..existing.clone()
                    },
                    None => state,
                };
                cache.put(merged.clone());
                merged
            })
            .await;
        notify(&self.notifier, snapshot);

        info!("Order {} placed: {} {} {} @ {}", order_ref, intent.direction, intent.volume, intent.symbol, intent.price);
        Ok(order_ref)
    }

    /// Cancel a cached order
    #[instrument(skip(self), fields(order = %order_ref))]
    pub async fn cancel_order(&self, order_ref: &OrderRef) -> Result<()> {
        let order = self
            .book
            .get(order_ref)
            .await
            .ok_or_else(|| TradingError::NotFound(format!("Unknown order: {}", order_ref)))?;
        let adapter = self.gateway(&order_ref.gateway).await?;

        let request = CancelRequest {
            order_id: order.order_id.clone(),
            symbol: order.symbol.clone(),
            exchange: order.exchange,
        };
        adapter.cancel_order(request).await.map_err(as_broker_error)?;

        info!("Cancel requested for {}", order_ref);
        Ok(())
    }

    /// Refresh open orders, positions and the account snapshot of one gateway
    #[instrument(skip(self))]
    pub async fn sync(&self, account: &str) -> Result<()> {
        let adapter = self.gateway(account).await?;

        let orders = adapter.query_open_orders().await.map_err(as_broker_error)?;
        let positions = adapter.query_positions().await.map_err(as_broker_error)?;
        let snapshot = adapter.query_account().await.map_err(as_broker_error)?;

        let order_count = orders.len();
        let position_count = positions.len();
        let changed = self
            .book
            .transact(|cache| {
                let changed = cache.merge_open_orders(account, orders);
                cache.set_positions(account, positions);
                cache.set_account(account, snapshot);
                changed
            })
            .await;

        for state in changed {
            notify(&self.notifier, state);
        }

        info!(
            "Synced {}: {} open orders, {} positions",
            account, order_count, position_count
        );
        Ok(())
    }

    /// Sync every gateway, logging failures
    pub async fn sync_all(&self) {
        for name in self.gateway_names().await {
            if let Err(e) = self.sync(&name).await {
                error!("Sync failed for {}: {}", name, e);
            }
        }
    }

    /// Backfill missing native identifiers for every connected broker
    pub async fn harmony(&self) -> String {
        self.harmony_report().await.summary()
    }

    pub async fn harmony_report(&self) -> HarmonyReport {
        harmony::run(self).await
    }
}

#[async_trait]
impl Resync for OrderRouter {
    async fn resync(&self, gateway: &str) -> Result<()> {
        self.sync(gateway).await
    }
}

impl std::fmt::Debug for OrderRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderRouter")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}
