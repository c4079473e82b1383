//! Local order, position and account caches

use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::Mutex;

use crate::common::types::{
    AccountSnapshot, Direction, NativeOrder, NativePosition, OrderRef, OrderState,
};

/// Cached state for all gateways
///
/// Orders are keyed by [`OrderRef`] (gateway + broker order id) with a
/// secondary client-order-id index populated at placement time.
#[derive(Debug, Default)]
pub struct OrderCache {
    orders: HashMap<OrderRef, OrderState>,
    client_ids: HashMap<(String, String), String>,
    positions: HashMap<String, Vec<NativePosition>>,
    accounts: HashMap<String, AccountSnapshot>,
}

impl OrderCache {
    pub fn get(&self, order_ref: &OrderRef) -> Option<&OrderState> {
        self.orders.get(order_ref)
    }

    /// Store an order, indexing its client order id when present
    pub fn put(&mut self, state: OrderState) {
        if let Some(ref client_id) = state.client_order_id {
            self.client_ids.insert(
                (state.gateway.clone(), client_id.clone()),
                state.order_id.clone(),
            );
        }
        self.orders.insert(state.order_ref(), state);
    }

    /// Map a client order id to the broker order id it was placed under
    pub fn order_id_for_client(&self, gateway: &str, client_order_id: &str) -> Option<&String> {
        self.client_ids
            .get(&(gateway.to_string(), client_order_id.to_string()))
    }

    /// Merge a broker open-order listing into the cache
    ///
    /// Orders already FILLED, CANCELLED or REJECTED are left as they are.
    /// Returns the snapshots that were created or changed.
    pub fn merge_open_orders(&mut self, gateway: &str, orders: Vec<NativeOrder>) -> Vec<OrderState> {
        let mut changed = Vec::new();

        for order in orders {
            let order_ref = OrderRef::new(gateway, order.order_id.clone());
            let merged = match self.orders.get(&order_ref) {
                Some(existing) if existing.status.is_terminal() => continue,
                Some(existing) => {
                    let mut state = existing.clone();
                    if !order.symbol.is_empty() {
                        state.symbol = order.symbol;
                    }
                    state.direction = order.direction.or(state.direction);
                    state.order_type = order.order_type.or(state.order_type);
                    if order.client_order_id.is_some() {
                        state.client_order_id = order.client_order_id;
                    }
                    state.price = order.price;
                    state.volume = order.volume;
                    state.traded = order.traded;
                    state.status = order.status;
                    if &state == existing {
                        continue;
                    }
                    state.updated_at = Utc::now();
                    state
                }
                None => OrderState {
                    gateway: gateway.to_string(),
                    order_id: order.order_id,
                    client_order_id: order.client_order_id,
                    symbol: order.symbol,
                    exchange: Default::default(),
                    direction: order.direction,
                    order_type: order.order_type,
                    price: order.price,
                    volume: order.volume,
                    traded: order.traded,
                    status: order.status,
                    updated_at: Utc::now(),
                },
            };
            self.put(merged.clone());
            changed.push(merged);
        }

        changed
    }

    pub fn set_positions(&mut self, gateway: &str, positions: Vec<NativePosition>) {
        self.positions.insert(gateway.to_string(), positions);
    }

    pub fn positions(&self, gateway: &str) -> &[NativePosition] {
        self.positions
            .get(gateway)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Whether the gateway holds a long position in any of `symbols`
    pub fn has_long_position(&self, gateway: &str, symbols: &[&str]) -> bool {
        self.positions(gateway).iter().any(|p| {
            p.direction == Direction::Long
                && p.volume > rust_decimal::Decimal::ZERO
                && symbols.iter().any(|s| p.symbol.eq_ignore_ascii_case(s))
        })
    }

    pub fn set_account(&mut self, gateway: &str, account: AccountSnapshot) {
        self.accounts.insert(gateway.to_string(), account);
    }

    pub fn account(&self, gateway: &str) -> Option<&AccountSnapshot> {
        self.accounts.get(gateway)
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }
}

/// The order cache behind one lock, shared by the router and the reconciler
#[derive(Debug, Default)]
pub struct OrderBook {
    inner: Mutex<OrderCache>,
}

impl OrderBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` with exclusive access to the cache
    pub async fn transact<R>(&self, f: impl FnOnce(&mut OrderCache) -> R) -> R {
        let mut cache = self.inner.lock().await;
        f(&mut cache)
    }

    pub async fn get(&self, order_ref: &OrderRef) -> Option<OrderState> {
        self.inner.lock().await.get(order_ref).cloned()
    }

    pub async fn positions(&self, gateway: &str) -> Vec<NativePosition> {
        self.inner.lock().await.positions(gateway).to_vec()
    }

    pub async fn account(&self, gateway: &str) -> Option<AccountSnapshot> {
        self.inner.lock().await.account(gateway).cloned()
    }
}
