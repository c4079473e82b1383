//! Tolerant field extraction from broker trade-event payloads
//!
//! Broker SDKs rename fields between versions and message kinds. Each semantic
//! field has an ordered list of accepted keys; the first present, convertible
//! value wins.

use rust_decimal::Decimal;
use serde_json::{Map, Value};
use std::str::FromStr;

use crate::common::types::{Direction, OrderType};

pub const ORDER_ID_KEYS: &[&str] = &["order_id", "orderId", "id"];
pub const CLIENT_ORDER_ID_KEYS: &[&str] = &["client_order_id", "clientOrderId", "client_id"];
pub const SYMBOL_KEYS: &[&str] = &["symbol", "ticker", "instrument"];
pub const SIDE_KEYS: &[&str] = &["side", "action", "order_side"];
pub const TOTAL_QTY_KEYS: &[&str] = &["quantity", "total_quantity", "qty", "order_qty"];
pub const FILLED_QTY_KEYS: &[&str] = &["filled_qty", "filled_quantity", "filledQuantity", "traded"];
pub const LIMIT_PRICE_KEYS: &[&str] = &["limit_price", "price", "lmtPrice"];
pub const STOP_PRICE_KEYS: &[&str] = &["stop_price", "stopPrice", "aux_price"];
pub const ORDER_TYPE_KEYS: &[&str] = &["order_type", "orderType", "type"];
pub const STATUS_KEYS: &[&str] = &["order_status", "status", "orderStatus"];
pub const SCENE_KEYS: &[&str] = &["scene_type", "sceneType", "scene"];
pub const ACCOUNT_KEYS: &[&str] = &["account_id", "accountId", "account"];

/// Typed view of one trade-event payload
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventFields {
    pub order_id: Option<String>,
    pub client_order_id: Option<String>,
    pub account_id: Option<String>,
    pub symbol: Option<String>,
    pub direction: Option<Direction>,
    pub order_type: Option<OrderType>,
    pub total_qty: Option<Decimal>,
    pub filled_qty: Option<Decimal>,
    pub limit_price: Option<Decimal>,
    pub stop_price: Option<Decimal>,
    pub status: Option<String>,
    pub scene: Option<String>,
}

impl EventFields {
    /// Extract fields from a payload; `None` for anything but a JSON object
    pub fn extract(payload: &Value) -> Option<Self> {
        let map = payload.as_object()?;

        Some(Self {
            order_id: first_text(map, ORDER_ID_KEYS),
            client_order_id: first_text(map, CLIENT_ORDER_ID_KEYS),
            account_id: first_text(map, ACCOUNT_KEYS),
            symbol: first_text(map, SYMBOL_KEYS).map(|s| s.trim().to_uppercase()),
            direction: first_parsed(map, SIDE_KEYS),
            order_type: first_parsed(map, ORDER_TYPE_KEYS),
            total_qty: first_decimal(map, TOTAL_QTY_KEYS),
            filled_qty: first_decimal(map, FILLED_QTY_KEYS),
            limit_price: first_decimal(map, LIMIT_PRICE_KEYS),
            stop_price: first_decimal(map, STOP_PRICE_KEYS),
            status: first_text(map, STATUS_KEYS),
            scene: first_text(map, SCENE_KEYS),
        })
    }

    /// Order price: the limit price, else the stop trigger
    pub fn price(&self) -> Option<Decimal> {
        self.limit_price
            .filter(|p| *p > Decimal::ZERO)
            .or(self.stop_price.filter(|p| *p > Decimal::ZERO))
    }
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn first_text(map: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| map.get(*key).and_then(as_text))
}

fn first_decimal(map: &Map<String, Value>, keys: &[&str]) -> Option<Decimal> {
    keys.iter().find_map(|key| {
        let text = map.get(*key).and_then(as_text)?;
        Decimal::from_str(&text)
            .or_else(|_| Decimal::from_scientific(&text))
            .ok()
    })
}

fn first_parsed<T: FromStr>(map: &Map<String, Value>, keys: &[&str]) -> Option<T> {
    keys.iter().find_map(|key| {
        let text = map.get(*key).and_then(as_text)?;
        text.parse().ok()
    })
}
