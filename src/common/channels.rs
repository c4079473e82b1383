//! Channel type definitions for order-state notifications

use tokio::sync::mpsc;

use super::types::OrderState;

/// Sender half of the order-state notification sink
pub type OrderStateSender = mpsc::UnboundedSender<OrderState>;

/// Receiver half of the order-state notification sink
pub type OrderStateReceiver = mpsc::UnboundedReceiver<OrderState>;

/// Create a new order-state notification channel
///
/// Unbounded so that broker callbacks and the reconciler never wait on the
/// presentation layer.
pub fn create_order_channel() -> (OrderStateSender, OrderStateReceiver) {
    mpsc::unbounded_channel()
}

/// Push a snapshot to the sink, tolerating a sink nobody listens to
pub fn notify(sender: &OrderStateSender, state: OrderState) {
    if sender.send(state).is_err() {
        tracing::debug!("Order-state sink closed, snapshot dropped");
    }
}
