//! Per-gateway trade-event worker
//!
//! The broker SDK pushes payloads into an [`EventIngress`], which only stamps
//! the activity clock and forwards them over a channel. A single task per
//! gateway drains that channel in order, applies each event to the shared
//! order cache and debounces the follow-up resync.

use chrono::Utc;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn, Level};

use super::fields::EventFields;
use super::health::WorkerActivity;
use super::status::{derive_status, triggers_resync};
use crate::common::channels::{notify, OrderStateSender};
use crate::common::traits::{BrokerAdapter, Resync, TradeEventSink};
use crate::common::types::{OrderRef, OrderState, OrderStatus};
use crate::router::cache::{OrderBook, OrderCache};

/// Callback target handed to the broker SDK
pub struct EventIngress {
    gateway: String,
    activity: Arc<WorkerActivity>,
    sender: mpsc::UnboundedSender<Value>,
}

impl EventIngress {
    pub fn new(gateway: impl Into<String>, activity: Arc<WorkerActivity>, sender: mpsc::UnboundedSender<Value>) -> Self {
        Self {
            gateway: gateway.into(),
            activity,
            sender,
        }
    }
}

impl TradeEventSink for EventIngress {
    fn on_event(&self, payload: Value) {
        if !self.activity.is_running() {
            return;
        }
        self.activity.record_message(Instant::now());
        if self.sender.send(payload).is_err() {
            debug!("Trade events {}: worker gone, event dropped", self.gateway);
        }
    }

    fn on_log(&self, level: Level, message: &str) {
        match level {
            Level::ERROR => error!("TradeEvents[{}]: {}", self.gateway, message),
            Level::WARN => warn!("TradeEvents[{}]: {}", self.gateway, message),
            Level::INFO => info!("TradeEvents[{}]: {}", self.gateway, message),
            _ => debug!("TradeEvents[{}]: {}", self.gateway, message),
        }
    }
}

/// Applies trade events for one gateway
pub struct EventProcessor {
    gateway: String,
    account_id: Option<String>,
    book: Arc<OrderBook>,
    notifier: OrderStateSender,
    resync: Arc<dyn Resync>,
    debounce: Duration,
    /// Set while a debounce timer is sleeping; cleared before the resync runs
    resync_armed: Arc<AtomicBool>,
    pending_resync: Option<JoinHandle<()>>,
}

impl EventProcessor {
    pub fn new(
        gateway: impl Into<String>,
        account_id: Option<String>,
        book: Arc<OrderBook>,
        notifier: OrderStateSender,
        resync: Arc<dyn Resync>,
        debounce: Duration,
    ) -> Self {
        Self {
            gateway: gateway.into(),
            account_id,
            book,
            notifier,
            resync,
            debounce,
            resync_armed: Arc::new(AtomicBool::new(false)),
            pending_resync: None,
        }
    }

    /// Apply one payload; returns the emitted snapshot, if any
    pub async fn handle_payload(&mut self, payload: &Value) -> Option<OrderState> {
        let fields = EventFields::extract(payload)?;

        if let (Some(expected), Some(actual)) = (&self.account_id, &fields.account_id) {
            if expected != actual {
                debug!("Trade events {}: ignoring event for account {}", self.gateway, actual);
                return None;
            }
        }

        if fields.order_id.is_none() && fields.client_order_id.is_none() {
            debug!("Trade events {}: event without order id dropped", self.gateway);
            return None;
        }

        let gateway = self.gateway.clone();
        let (snapshot, trigger) = self
            .book
            .transact(|cache| apply_event(cache, &gateway, &fields))
            .await?;

        notify(&self.notifier, snapshot.clone());

        if trigger {
            self.schedule_resync();
        }
        Some(snapshot)
    }

    /// Single-shot delayed resync; no-op while one is already pending
    fn schedule_resync(&mut self) {
        if self.resync_armed.swap(true, Ordering::SeqCst) {
            debug!("Trade events {}: resync already pending", self.gateway);
            return;
        }

        let armed = self.resync_armed.clone();
        let resync = self.resync.clone();
        let gateway = self.gateway.clone();
        let delay = self.debounce;
        self.pending_resync = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // Events from here on need a refresh of their own
            armed.store(false, Ordering::SeqCst);
            debug!("Trade events {}: running debounced resync", gateway);
            if let Err(e) = resync.resync(&gateway).await {
                error!("Resync after trade event failed for {}: {}", gateway, e);
            }
        }));
    }

    /// Whether a debounce timer is still waiting to fire
    pub fn has_pending_resync(&self) -> bool {
        self.resync_armed.load(Ordering::SeqCst)
    }

    fn cancel_pending(&mut self) {
        if let Some(handle) = self.pending_resync.take() {
            handle.abort();
        }
        self.resync_armed.store(false, Ordering::SeqCst);
    }

    /// Drain events until the channel closes or a shutdown signal arrives
    pub async fn run(mut self, mut events: mpsc::UnboundedReceiver<Value>, mut shutdown: mpsc::Receiver<()>) {
        loop {
            tokio::select! {
                payload = events.recv() => match payload {
                    Some(payload) => {
                        self.handle_payload(&payload).await;
                    }
                    None => break,
                },
                _ = shutdown.recv() => break,
            }
        }
        self.cancel_pending();
        debug!("Trade events {}: worker loop exited", self.gateway);
    }
}

impl Drop for EventProcessor {
    fn drop(&mut self) {
        self.cancel_pending();
    }
}

/// Merge one event into the cache
///
/// Returns the resulting snapshot and whether it should trigger a resync.
/// Events for an order that is already terminal change nothing.
fn apply_event(cache: &mut OrderCache, gateway: &str, fields: &EventFields) -> Option<(OrderState, bool)> {
    let order_id = match (&fields.order_id, &fields.client_order_id) {
        (Some(order_id), _) => order_id.clone(),
        (None, Some(client_id)) => cache
            .order_id_for_client(gateway, client_id)
            .cloned()
            .unwrap_or_else(|| client_id.clone()),
        (None, None) => return None,
    };
    let order_ref = OrderRef::new(gateway, order_id.clone());

    let existing = cache.get(&order_ref).cloned();
    if let Some(ref existing) = existing {
        if existing.status.is_terminal() {
            debug!("Order {} already {}, event ignored", order_ref, existing.status);
            return Some((existing.clone(), false));
        }
    }

    let mut state = existing.unwrap_or_else(|| OrderState {
        gateway: gateway.to_string(),
        order_id,
        client_order_id: None,
        symbol: String::new(),
        exchange: Default::default(),
        direction: None,
        order_type: None,
        price: rust_decimal::Decimal::ZERO,
        volume: rust_decimal::Decimal::ZERO,
        traded: rust_decimal::Decimal::ZERO,
        status: OrderStatus::Working,
        updated_at: Utc::now(),
    });

    if let Some(ref symbol) = fields.symbol {
        state.symbol = symbol.clone();
    }
    if fields.direction.is_some() {
        state.direction = fields.direction;
    }
    if fields.order_type.is_some() {
        state.order_type = fields.order_type;
    }
    if let Some(price) = fields.price() {
        state.price = price;
    }
    if let Some(ref client_id) = fields.client_order_id {
        state.client_order_id = Some(client_id.clone());
    }

    if let Some(total) = fields.total_qty {
        state.volume = total;
    }
    if let Some(filled) = fields.filled_qty {
        state.traded = filled;
    }
    let total = (state.volume > rust_decimal::Decimal::ZERO).then_some(state.volume);
    if let Some(status) = derive_status(
        fields.status.as_deref(),
        fields.scene.as_deref(),
        Some(state.traded),
        total,
    ) {
        state.status = status;
    }
    if state.status == OrderStatus::Filled && state.volume > rust_decimal::Decimal::ZERO {
        state.traded = state.volume;
    }
    state.updated_at = Utc::now();

    let trigger = triggers_resync(state.status);
    cache.put(state.clone());
    Some((state, trigger))
}

/// Handle to a running worker
pub struct TradeEventWorker {
    gateway: String,
    activity: Arc<WorkerActivity>,
    shutdown: mpsc::Sender<()>,
    event_loop: Option<JoinHandle<()>>,
    subscription: Option<JoinHandle<()>>,
}

impl TradeEventWorker {
    /// Start the event loop and subscribe to `account_id`'s stream
    pub fn start(
        account_id: String,
        adapter: Arc<dyn BrokerAdapter>,
        processor: EventProcessor,
    ) -> Self {
        let gateway = processor.gateway.clone();
        let activity = Arc::new(WorkerActivity::new());
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);

        activity.mark_started(Instant::now());
        let event_loop = tokio::spawn(processor.run(event_rx, shutdown_rx));

        let ingress: Arc<dyn TradeEventSink> =
            Arc::new(EventIngress::new(gateway.clone(), activity.clone(), event_tx));
        let subscription_activity = activity.clone();
        let subscription_gateway = gateway.clone();
        let subscription = tokio::spawn(async move {
            info!("Trade events {} subscribing for {}", subscription_gateway, account_id);
            match adapter.subscribe_trade_events(vec![account_id], ingress).await {
                Ok(()) => info!("Trade events {} stream ended", subscription_gateway),
                Err(e) => error!("Trade events {} stopped: {}", subscription_gateway, e),
            }
            subscription_activity.mark_stopped();
        });

        Self {
            gateway,
            activity,
            shutdown: shutdown_tx,
            event_loop: Some(event_loop),
            subscription: Some(subscription),
        }
    }

    pub fn gateway(&self) -> &str {
        &self.gateway
    }

    pub fn activity(&self) -> &Arc<WorkerActivity> {
        &self.activity
    }

    pub fn is_running(&self) -> bool {
        self.activity.is_running()
    }

    /// Stop the worker, waiting at most `timeout` for its loop to exit
    ///
    /// Returns false if the loop had to be aborted.
    pub async fn stop(&mut self, timeout: Duration) -> bool {
        self.activity.mark_stopped();
        let _ = self.shutdown.try_send(());

        if let Some(subscription) = self.subscription.take() {
            subscription.abort();
        }

        let Some(event_loop) = self.event_loop.take() else {
            return true;
        };
        let abort = event_loop.abort_handle();
        match tokio::time::timeout(timeout, event_loop).await {
            Ok(_) => {
                info!("Trade events {} stopped", self.gateway);
                true
            }
            Err(_) => {
                warn!("Trade events {} did not stop within {:?}", self.gateway, timeout);
                abort.abort();
                false
            }
        }
    }
}
