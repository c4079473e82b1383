//! Per-broker symbol resolution

use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use super::intent::parse_futures_symbol;
use crate::common::errors::{Result, TradingError};
use crate::common::traits::BrokerAdapter;
use crate::common::types::{
    AssetClass, Broker, ContractCandidate, ContractQuery, Exchange, InstrumentType, NativeId,
};
use crate::config::types::RouterSettings;
use crate::registry::{SymbolDetails, SymbolRecord, SymbolRegistry};

/// How a symbol is looked up at a contract-id broker
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupKind {
    Equity,
    Futures { root: String, expiry: String },
}

impl LookupKind {
    /// Futures when the symbol matches `ROOT.YYMM`, equity otherwise
    pub fn for_symbol(symbol: &str) -> Self {
        match parse_futures_symbol(symbol) {
            Some((root, expiry)) => LookupKind::Futures { root, expiry },
            None => LookupKind::Equity,
        }
    }
}

/// Resolves canonical symbols to broker-native identifiers via the registry
pub struct SymbolResolver {
    registry: Arc<SymbolRegistry>,
    settings: RouterSettings,
}

impl SymbolResolver {
    pub fn new(registry: Arc<SymbolRegistry>, settings: RouterSettings) -> Self {
        Self { registry, settings }
    }

    pub fn registry(&self) -> &Arc<SymbolRegistry> {
        &self.registry
    }

    /// Native identifier of `symbol` at the adapter's broker
    pub async fn resolve(&self, adapter: &dyn BrokerAdapter, symbol: &str) -> Result<NativeId> {
        match adapter.broker() {
            Broker::Webull => self.resolve_ticker(symbol).await.map(NativeId::Ticker),
            Broker::Ib => {
                let kind = LookupKind::for_symbol(&SymbolRegistry::normalize(symbol));
                let record = self.resolve_contract(adapter, symbol, kind).await?;
                record
                    .ib_conid
                    .map(NativeId::ContractId)
                    .ok_or_else(|| TradingError::Internal(format!("No contract id recorded for {}", symbol)))
            }
        }
    }

    /// Ticker-native brokers: the canonical symbol is the ticker
    pub async fn resolve_ticker(&self, symbol: &str) -> Result<String> {
        let record = self
            .registry
            .ensure_webull_symbol(symbol, SymbolDetails::default())
            .await?;
        record
            .webull_ticker
            .ok_or_else(|| TradingError::Internal(format!("No ticker recorded for {}", symbol)))
    }

    /// Contract-id brokers: registry first, then a single-candidate lookup
    ///
    /// Returns the registry record carrying the contract id. Zero candidates
    /// (or a timed-out lookup) is `NotFound`; more than one is
    /// `AmbiguousSymbol`. Neither mutates the registry.
    #[instrument(skip(self, adapter))]
    pub async fn resolve_contract(
        &self,
        adapter: &dyn BrokerAdapter,
        symbol: &str,
        kind: LookupKind,
    ) -> Result<SymbolRecord> {
        let canonical = SymbolRegistry::normalize(symbol);

        if let Some(record) = self.registry.get_by_canonical(&canonical).await {
            if record.ib_conid.is_some() {
                return Ok(record);
            }
        }

        let (candidate, asset_class) = match kind {
            LookupKind::Futures { root, expiry } => {
                let candidate = self.lookup_futures(adapter, &canonical, &root, &expiry).await?;
                (candidate, AssetClass::Future)
            }
            LookupKind::Equity => {
                let candidate = self.lookup_equity(adapter, &canonical).await?;
                (candidate, AssetClass::Equity)
            }
        };

        let details = SymbolDetails {
            asset_class: Some(asset_class),
            currency: Some(candidate.currency.clone()),
            description: candidate.description.clone(),
        };
        let record = self
            .registry
            .ensure_broker_symbol(&canonical, NativeId::ContractId(candidate.contract_id), details)
            .await?;

        if record.canonical_symbol != canonical {
            warn!(
                "Contract {} for {} belongs to {}",
                candidate.contract_id, canonical, record.canonical_symbol
            );
            return Err(TradingError::Conflict(format!(
                "Contract {} already mapped to {}",
                candidate.contract_id, record.canonical_symbol
            )));
        }

        info!("Resolved {} to contract {}", canonical, candidate.contract_id);
        Ok(record)
    }

    async fn lookup_futures(
        &self,
        adapter: &dyn BrokerAdapter,
        canonical: &str,
        root: &str,
        expiry: &str,
    ) -> Result<ContractCandidate> {
        let mut candidates = Vec::new();
        for exchange in [
            self.settings.futures_primary_exchange,
            self.settings.futures_secondary_exchange,
        ] {
            let query = ContractQuery {
                symbol: root.to_string(),
                exchange,
                currency: self.settings.equity_currency.clone(),
                instrument_type: InstrumentType::Future,
                expiry: Some(expiry.to_string()),
            };
            candidates = self
                .lookup(adapter, &query)
                .await?
                .into_iter()
                .filter(|c| c.instrument_type == InstrumentType::Future)
                .collect();
            if !candidates.is_empty() {
                break;
            }
            debug!("No {} futures candidates on {}", canonical, exchange);
        }

        exactly_one(canonical, candidates)
    }

    async fn lookup_equity(&self, adapter: &dyn BrokerAdapter, canonical: &str) -> Result<ContractCandidate> {
        let currency = &self.settings.equity_currency;
        let query = ContractQuery {
            symbol: canonical.to_string(),
            exchange: Exchange::Smart,
            currency: currency.clone(),
            instrument_type: InstrumentType::Stock,
            expiry: None,
        };
        let candidates = self
            .lookup(adapter, &query)
            .await?
            .into_iter()
            .filter(|c| c.instrument_type == InstrumentType::Stock && c.currency.eq_ignore_ascii_case(currency))
            .collect();

        exactly_one(canonical, candidates)
    }

    /// Bounded adapter lookup; a timeout counts as no candidates found
    async fn lookup(&self, adapter: &dyn BrokerAdapter, query: &ContractQuery) -> Result<Vec<ContractCandidate>> {
        let timeout = self.settings.lookup_timeout();
        match tokio::time::timeout(timeout, adapter.lookup_contract_candidates(query)).await {
            Ok(Ok(candidates)) => Ok(candidates),
            Ok(Err(e)) => Err(as_broker_error(e)),
            Err(_) => {
                warn!("Contract lookup for {} timed out after {:?}", query.symbol, timeout);
                Err(TradingError::NotFound(format!(
                    "Contract lookup for {} timed out",
                    query.symbol
                )))
            }
        }
    }
}

fn exactly_one(symbol: &str, mut candidates: Vec<ContractCandidate>) -> Result<ContractCandidate> {
    match candidates.len() {
        0 => Err(TradingError::NotFound(format!("No contract found for {}", symbol))),
        1 => Ok(candidates.remove(0)),
        n => Err(TradingError::AmbiguousSymbol {
            symbol: symbol.to_string(),
            candidates: n,
        }),
    }
}

/// Adapter failures surface as `BrokerCall` unless already classified
pub(crate) fn as_broker_error(err: TradingError) -> TradingError {
    match err {
        TradingError::BrokerCall(_) => err,
        other => TradingError::BrokerCall(other.to_string()),
    }
}
