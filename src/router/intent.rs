//! Order intent parsing and normalization
//!
//! Callers submit either a fully specified intent (`direction` + `order_type`)
//! or a shorthand `action` of `buy`, `sell`, `bstop` or `sstop`. Both forms are
//! normalized into an [`OrderIntent`] before anything touches a broker.

use rust_decimal::Decimal;
use serde_json::{Map, Value};
use std::str::FromStr;

use crate::common::errors::{Result, TradingError};
use crate::common::types::{Direction, Exchange, Offset, OrderType};
use crate::config::types::RouterSettings;
use crate::registry::SymbolRegistry;

/// A validated, broker-neutral order request
#[derive(Debug, Clone, PartialEq)]
pub struct OrderIntent {
    pub symbol: String,
    pub direction: Direction,
    pub order_type: OrderType,
    pub volume: Decimal,
    /// Working price: limit price for LIMIT, trigger price for STOP, 0 for MARKET
    pub price: Decimal,
    pub stop_price: Option<Decimal>,
    pub limit_price: Option<Decimal>,
    pub exchange: Exchange,
    pub offset: Offset,
}

/// Shorthand actions accepted in place of direction + order type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Buy,
    Sell,
    BuyStop,
    SellStop,
}

impl FromStr for Action {
    type Err = TradingError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "buy" => Ok(Action::Buy),
            "sell" => Ok(Action::Sell),
            "bstop" => Ok(Action::BuyStop),
            "sstop" => Ok(Action::SellStop),
            other => Err(TradingError::Validation(format!(
                "Unknown action: {}",
                other
            ))),
        }
    }
}

impl OrderIntent {
    /// Parse and normalize an intent from a JSON object
    pub fn from_value(value: &Value, settings: &RouterSettings) -> Result<Self> {
        let map = value
            .as_object()
            .ok_or_else(|| TradingError::Validation("Order intent must be an object".to_string()))?;

        let symbol = text_field(map, "symbol")
            .map(|s| SymbolRegistry::normalize(&s))
            .filter(|s| !s.is_empty())
            .ok_or_else(|| TradingError::Validation("Missing symbol".to_string()))?;

        let volume = decimal_field(map, "volume")?
            .ok_or_else(|| TradingError::Validation("Missing volume".to_string()))?;
        if volume <= Decimal::ZERO {
            return Err(TradingError::Validation(format!(
                "Volume must be positive: {}",
                volume
            )));
        }

        let price = decimal_field(map, "price")?.filter(|p| *p > Decimal::ZERO);
        let stop_price = decimal_field(map, "stop_price")?.filter(|p| *p > Decimal::ZERO);
        let limit_price = decimal_field(map, "limit_price")?.filter(|p| *p > Decimal::ZERO);

        let (direction, order_type) = match text_field(map, "action") {
            Some(action) => match action.parse::<Action>()? {
                Action::Buy if price.is_none() => (Direction::Long, OrderType::Market),
                Action::Buy => (Direction::Long, OrderType::Limit),
                Action::Sell if price.is_none() => (Direction::Short, OrderType::Market),
                Action::Sell => (Direction::Short, OrderType::Limit),
                Action::BuyStop => (Direction::Long, OrderType::Stop),
                Action::SellStop => (Direction::Short, OrderType::Stop),
            },
            None => {
                let direction = text_field(map, "direction")
                    .ok_or_else(|| TradingError::Validation("Missing direction or action".to_string()))?
                    .parse::<Direction>()?;
                let order_type = text_field(map, "order_type")
                    .or_else(|| text_field(map, "type"))
                    .ok_or_else(|| TradingError::Validation("Missing order type".to_string()))?
                    .parse::<OrderType>()?;
                (direction, order_type)
            }
        };

        let (price, stop_price, limit_price) =
            resolve_prices(order_type, price, stop_price, limit_price)?;

        let exchange = match text_field(map, "exchange").filter(|e| !e.trim().is_empty()) {
            Some(exchange) => exchange.parse::<Exchange>()?,
            None if parse_futures_symbol(&symbol).is_some() => settings.futures_home_exchange,
            None => settings.default_exchange,
        };

        let offset = match text_field(map, "offset") {
            Some(offset) => offset.parse::<Offset>()?,
            None => Offset::default(),
        };

        Ok(Self {
            symbol,
            direction,
            order_type,
            volume,
            price,
            stop_price,
            limit_price,
            exchange,
            offset,
        })
    }
}

/// Work out the working price and trigger/limit prices for an order type
fn resolve_prices(
    order_type: OrderType,
    price: Option<Decimal>,
    stop_price: Option<Decimal>,
    limit_price: Option<Decimal>,
) -> Result<(Decimal, Option<Decimal>, Option<Decimal>)> {
    match order_type {
        OrderType::Market => Ok((Decimal::ZERO, None, None)),
        OrderType::Limit => {
            let limit = price
                .or(limit_price)
                .ok_or_else(|| TradingError::Validation("Limit order requires a price".to_string()))?;
            Ok((limit, None, Some(limit)))
        }
        OrderType::Stop => {
            let stop = stop_price
                .or(price)
                .ok_or_else(|| TradingError::Validation("Stop order requires a stop price".to_string()))?;
            Ok((stop, Some(stop), limit_price))
        }
        OrderType::StopLimit => {
            let stop = stop_price.ok_or_else(|| {
                TradingError::Validation("Stop-limit order requires a stop price".to_string())
            })?;
            let limit = limit_price.or(price).ok_or_else(|| {
                TradingError::Validation("Stop-limit order requires a limit price".to_string())
            })?;
            Ok((limit, Some(stop), Some(limit)))
        }
    }
}

/// Split a `ROOT.YYMM` futures symbol into its root and `YYYYMM` contract month
pub fn parse_futures_symbol(symbol: &str) -> Option<(String, String)> {
    let (root, month) = symbol.split_once('.')?;
    let root_ok = !root.is_empty() && root.chars().all(|c| c.is_ascii_uppercase());
    let month_ok = month.len() == 4 && month.chars().all(|c| c.is_ascii_digit());
    if !root_ok || !month_ok {
        return None;
    }

    let mm: u32 = month[2..].parse().ok()?;
    if !(1..=12).contains(&mm) {
        return None;
    }

    Some((root.to_string(), format!("20{}", month)))
}

fn text_field(map: &Map<String, Value>, key: &str) -> Option<String> {
    match map.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Coerce a numeric field given as a JSON number or numeric string
fn decimal_field(map: &Map<String, Value>, key: &str) -> Result<Option<Decimal>> {
    let raw = match map.get(key) {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => return Ok(None),
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(other) => {
            return Err(TradingError::Validation(format!(
                "Field {} is not numeric: {}",
                key, other
            )))
        }
    };

    Decimal::from_str(&raw)
        .or_else(|_| Decimal::from_scientific(&raw))
        .map(Some)
        .map_err(|_| TradingError::Validation(format!("Field {} is not numeric: {}", key, raw)))
}
