//! Symbol registry record types

use serde::{Deserialize, Serialize};

use crate::common::types::{AssetClass, Broker, NativeId};

/// One canonical instrument and its per-broker native identifiers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolRecord {
    /// Normalized (trimmed, uppercase) broker-neutral symbol
    pub canonical_symbol: String,
    pub asset_class: AssetClass,
    pub currency: String,
    /// IB contract id, unique across records when set
    pub ib_conid: Option<i64>,
    /// Webull ticker, unique across records when set
    pub webull_ticker: Option<String>,
    pub description: Option<String>,
}

impl SymbolRecord {
    pub fn new(canonical_symbol: impl Into<String>, asset_class: AssetClass, currency: impl Into<String>) -> Self {
        Self {
            canonical_symbol: canonical_symbol.into(),
            asset_class,
            currency: currency.into(),
            ib_conid: None,
            webull_ticker: None,
            description: None,
        }
    }

    /// The native identifier this record holds for `broker`, if any
    pub fn native_id(&self, broker: Broker) -> Option<NativeId> {
        match broker {
            Broker::Ib => self.ib_conid.map(NativeId::ContractId),
            Broker::Webull => self.webull_ticker.clone().map(NativeId::Ticker),
        }
    }

    pub fn has_native_id(&self, broker: Broker) -> bool {
        match broker {
            Broker::Ib => self.ib_conid.is_some(),
            Broker::Webull => self.webull_ticker.is_some(),
        }
    }

    pub(crate) fn set_native_id(&mut self, id: &NativeId) {
        match id {
            NativeId::ContractId(conid) => self.ib_conid = Some(*conid),
            NativeId::Ticker(ticker) => self.webull_ticker = Some(ticker.clone()),
        }
    }
}

/// Optional attributes supplied alongside a native identifier
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymbolDetails {
    pub asset_class: Option<AssetClass>,
    pub currency: Option<String>,
    pub description: Option<String>,
}

impl SymbolDetails {
    pub fn with_asset_class(mut self, asset_class: AssetClass) -> Self {
        self.asset_class = Some(asset_class);
        self
    }

    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = Some(currency.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Which broker a native identifier belongs to
pub fn broker_of(id: &NativeId) -> Broker {
    match id {
        NativeId::ContractId(_) => Broker::Ib,
        NativeId::Ticker(_) => Broker::Webull,
    }
}
