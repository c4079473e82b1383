//! Broker-neutral types shared by the registry, router and reconciler

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::errors::{Result, TradingError};

/// Supported broker kinds
///
/// Each broker identifies instruments differently: IB by numeric contract id,
/// Webull by its own ticker string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Broker {
    Ib,
    Webull,
}

impl Broker {
    pub const ALL: [Broker; 2] = [Broker::Ib, Broker::Webull];
}

impl std::fmt::Display for Broker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Broker::Ib => write!(f, "IB"),
            Broker::Webull => write!(f, "Webull"),
        }
    }
}

impl FromStr for Broker {
    type Err = TradingError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "ib" | "ibkr" | "interactive_brokers" => Ok(Broker::Ib),
            "webull" | "wb" => Ok(Broker::Webull),
            other => Err(TradingError::Configuration(format!(
                "Unsupported broker type: {}",
                other
            ))),
        }
    }
}

/// A broker-native instrument identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NativeId {
    /// Numeric contract id (IB conid)
    ContractId(i64),
    /// Broker ticker string (Webull)
    Ticker(String),
}

impl std::fmt::Display for NativeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NativeId::ContractId(id) => write!(f, "{}", id),
            NativeId::Ticker(t) => write!(f, "{}", t),
        }
    }
}

/// Order direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Long,
    Short,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Long => write!(f, "LONG"),
            Direction::Short => write!(f, "SHORT"),
        }
    }
}

impl FromStr for Direction {
    type Err = TradingError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_uppercase().as_str() {
            "LONG" | "BUY" | "B" => Ok(Direction::Long),
            "SHORT" | "SELL" | "S" | "SELL_SHORT" | "SHORT_SELL" => Ok(Direction::Short),
            other => Err(TradingError::Validation(format!(
                "Unknown direction: {}",
                other
            ))),
        }
    }
}

/// Order type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    Market,
    Limit,
    Stop,
    StopLimit,
}

impl std::fmt::Display for OrderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderType::Market => write!(f, "MARKET"),
            OrderType::Limit => write!(f, "LIMIT"),
            OrderType::Stop => write!(f, "STOP"),
            OrderType::StopLimit => write!(f, "STOP_LIMIT"),
        }
    }
}

impl FromStr for OrderType {
    type Err = TradingError;

    /// Accepts neutral names and the common broker spellings
    fn from_str(s: &str) -> Result<Self> {
        let key = s.trim().to_uppercase().replace([' ', '-'], "_");
        match key.as_str() {
            "MARKET" | "MKT" => Ok(OrderType::Market),
            "LIMIT" | "LMT" => Ok(OrderType::Limit),
            "STOP" | "STP" | "STOP_LOSS" | "STOP_MARKET" => Ok(OrderType::Stop),
            "STOP_LIMIT" | "STP_LMT" | "STOP_LOSS_LIMIT" => Ok(OrderType::StopLimit),
            other => Err(TradingError::Validation(format!(
                "Unknown order type: {}",
                other
            ))),
        }
    }
}

/// Lifecycle status of an order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Submitting,
    Working,
    PartiallyFilled,
    Filled,
    Cancelled,
    Rejected,
}

impl OrderStatus {
    /// FILLED, CANCELLED and REJECTED accept no further mutation
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Filled | OrderStatus::Cancelled | OrderStatus::Rejected
        )
    }

    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OrderStatus::Submitting => "SUBMITTING",
            OrderStatus::Working => "WORKING",
            OrderStatus::PartiallyFilled => "PARTIALLY_FILLED",
            OrderStatus::Filled => "FILLED",
            OrderStatus::Cancelled => "CANCELLED",
            OrderStatus::Rejected => "REJECTED",
        };
        write!(f, "{}", s)
    }
}

/// Position effect of an order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Offset {
    #[default]
    Open,
    Close,
    None,
}

impl FromStr for Offset {
    type Err = TradingError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_uppercase().as_str() {
            "OPEN" => Ok(Offset::Open),
            "CLOSE" => Ok(Offset::Close),
            "" | "NONE" => Ok(Offset::None),
            other => Err(TradingError::Validation(format!("Unknown offset: {}", other))),
        }
    }
}

/// Execution venue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Exchange {
    /// Broker smart routing, the neutral default
    #[default]
    Smart,
    Nasdaq,
    Nyse,
    Arca,
    Amex,
    Cme,
    Cbot,
    Nymex,
    Comex,
}

impl std::fmt::Display for Exchange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Exchange::Smart => "SMART",
            Exchange::Nasdaq => "NASDAQ",
            Exchange::Nyse => "NYSE",
            Exchange::Arca => "ARCA",
            Exchange::Amex => "AMEX",
            Exchange::Cme => "CME",
            Exchange::Cbot => "CBOT",
            Exchange::Nymex => "NYMEX",
            Exchange::Comex => "COMEX",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for Exchange {
    type Err = TradingError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_uppercase().as_str() {
            "SMART" => Ok(Exchange::Smart),
            "NASDAQ" => Ok(Exchange::Nasdaq),
            "NYSE" => Ok(Exchange::Nyse),
            "ARCA" => Ok(Exchange::Arca),
            "AMEX" => Ok(Exchange::Amex),
            "CME" | "GLOBEX" => Ok(Exchange::Cme),
            "CBOT" => Ok(Exchange::Cbot),
            "NYMEX" => Ok(Exchange::Nymex),
            "COMEX" => Ok(Exchange::Comex),
            other => Err(TradingError::Validation(format!(
                "Unknown exchange: {}",
                other
            ))),
        }
    }
}

/// Asset class of a registry record
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AssetClass {
    #[default]
    Equity,
    Stock,
    Etf,
    Future,
    Option,
    Other(String),
}

impl AssetClass {
    /// EQUITY, STOCK and ETF resolve the same way at a contract-id broker
    pub fn is_equity_like(&self) -> bool {
        matches!(self, AssetClass::Equity | AssetClass::Stock | AssetClass::Etf)
    }

    pub fn as_str(&self) -> &str {
        match self {
            AssetClass::Equity => "EQUITY",
            AssetClass::Stock => "STOCK",
            AssetClass::Etf => "ETF",
            AssetClass::Future => "FUTURE",
            AssetClass::Option => "OPTION",
            AssetClass::Other(s) => s.as_str(),
        }
    }
}

impl std::fmt::Display for AssetClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<&str> for AssetClass {
    fn from(s: &str) -> Self {
        match s.trim().to_uppercase().as_str() {
            "EQUITY" => AssetClass::Equity,
            "STOCK" | "STK" => AssetClass::Stock,
            "ETF" => AssetClass::Etf,
            "FUTURE" | "FUTURES" | "FUT" => AssetClass::Future,
            "OPTION" | "OPT" => AssetClass::Option,
            other => AssetClass::Other(other.to_string()),
        }
    }
}

/// Instrument type reported by a broker contract lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum InstrumentType {
    Stock,
    Future,
    Option,
    Other,
}

impl std::fmt::Display for InstrumentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InstrumentType::Stock => write!(f, "STK"),
            InstrumentType::Future => write!(f, "FUT"),
            InstrumentType::Option => write!(f, "OPT"),
            InstrumentType::Other => write!(f, "OTHER"),
        }
    }
}

/// Composite order reference returned to callers: gateway name + broker order id
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderRef {
    /// Name of the broker connection (gateway) that owns the order
    pub gateway: String,
    /// Broker-native order id
    pub order_id: String,
}

impl OrderRef {
    pub fn new(gateway: impl Into<String>, order_id: impl Into<String>) -> Self {
        Self {
            gateway: gateway.into(),
            order_id: order_id.into(),
        }
    }
}

impl std::fmt::Display for OrderRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.gateway, self.order_id)
    }
}

impl FromStr for OrderRef {
    type Err = TradingError;

    /// Parses `gateway.order_id`; the gateway part may not contain dots
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().split_once('.') {
            Some((gateway, order_id)) if !gateway.is_empty() && !order_id.is_empty() => {
                Ok(OrderRef::new(gateway, order_id))
            }
            _ => Err(TradingError::Validation(format!(
                "Invalid order reference: {}",
                s
            ))),
        }
    }
}

/// Locally cached order state, keyed by broker-native order id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderState {
    pub gateway: String,
    pub order_id: String,
    pub client_order_id: Option<String>,
    pub symbol: String,
    pub exchange: Exchange,
    pub direction: Option<Direction>,
    pub order_type: Option<OrderType>,
    pub price: Decimal,
    pub volume: Decimal,
    pub traded: Decimal,
    pub status: OrderStatus,
    pub updated_at: DateTime<Utc>,
}

impl OrderState {
    pub fn order_ref(&self) -> OrderRef {
        OrderRef::new(self.gateway.clone(), self.order_id.clone())
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }
}

/// Broker-native order parameters handed to an adapter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NativeOrderRequest {
    /// Broker-native instrument id (ticker or contract id)
    pub instrument: NativeId,
    /// Canonical symbol the instrument was resolved from
    pub symbol: String,
    pub exchange: Exchange,
    pub direction: Direction,
    pub order_type: OrderType,
    pub volume: Decimal,
    pub price: Decimal,
    pub stop_price: Option<Decimal>,
    pub limit_price: Option<Decimal>,
    pub offset: Offset,
    /// Adapter should use its short-sale side code instead of a plain sell
    pub short_sale: bool,
    pub client_order_id: String,
}

/// An open order as reported by a broker query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NativeOrder {
    pub order_id: String,
    pub client_order_id: Option<String>,
    pub symbol: String,
    pub direction: Option<Direction>,
    pub order_type: Option<OrderType>,
    pub price: Decimal,
    pub volume: Decimal,
    pub traded: Decimal,
    pub status: OrderStatus,
}

/// A position as reported by a broker query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NativePosition {
    pub symbol: String,
    pub direction: Direction,
    pub volume: Decimal,
    pub avg_price: Decimal,
}

/// Account balances as reported by a broker query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub account_id: String,
    pub balance: Decimal,
    pub available: Decimal,
}

/// Parameters for a contract-candidate lookup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractQuery {
    pub symbol: String,
    pub exchange: Exchange,
    pub currency: String,
    pub instrument_type: InstrumentType,
    /// Contract month as `YYYYMM`, futures only
    pub expiry: Option<String>,
}

/// One contract returned by a broker lookup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractCandidate {
    pub contract_id: i64,
    pub instrument_type: InstrumentType,
    pub currency: String,
    pub description: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_type_accepts_broker_spellings() {
        assert_eq!("STOP_LOSS".parse::<OrderType>().unwrap(), OrderType::Stop);
        assert_eq!("stp lmt".parse::<OrderType>().unwrap(), OrderType::StopLimit);
        assert_eq!("LMT".parse::<OrderType>().unwrap(), OrderType::Limit);
        assert!("ICEBERG".parse::<OrderType>().is_err());
    }

    #[test]
    fn test_order_ref_round_trip_display() {
        let order_ref: OrderRef = "ib_main.12345".parse().unwrap();
        assert_eq!(order_ref.gateway, "ib_main");
        assert_eq!(order_ref.order_id, "12345");
        assert_eq!(order_ref.to_string(), "ib_main.12345");
        assert!("noseparator".parse::<OrderRef>().is_err());
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(OrderStatus::Filled.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
        assert!(OrderStatus::Rejected.is_terminal());
        assert!(!OrderStatus::PartiallyFilled.is_terminal());
        assert!(!OrderStatus::Submitting.is_terminal());
    }

    #[test]
    fn test_asset_class_equity_like() {
        assert!(AssetClass::from("etf").is_equity_like());
        assert!(AssetClass::from("STOCK").is_equity_like());
        assert!(!AssetClass::from("FUT").is_equity_like());
        assert_eq!(AssetClass::from("crypto"), AssetClass::Other("CRYPTO".to_string()));
    }
}
