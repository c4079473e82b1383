//! Harmony pass: backfill missing native identifiers for connected brokers

use tracing::{error, info, warn};

use super::intent::parse_futures_symbol;
use super::resolver::LookupKind;
use super::router::OrderRouter;
use crate::common::errors::TradingError;
use crate::common::traits::BrokerAdapter;
use crate::common::types::{AssetClass, Broker};
use crate::registry::{SymbolDetails, SymbolRecord};

/// Outcome of the backfill for one broker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerTally {
    pub broker: Broker,
    pub gateway: String,
    pub updated: Vec<String>,
    pub missing: Vec<String>,
    pub skipped: Vec<String>,
    pub ambiguous: Vec<String>,
    /// Error that stopped this broker's pass early, if any
    pub aborted: Option<String>,
}

impl BrokerTally {
    fn new(broker: Broker, gateway: &str) -> Self {
        Self {
            broker,
            gateway: gateway.to_string(),
            updated: Vec::new(),
            missing: Vec::new(),
            skipped: Vec::new(),
            ambiguous: Vec::new(),
            aborted: None,
        }
    }
}

/// Per-broker results of one harmony pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HarmonyReport {
    pub tallies: Vec<BrokerTally>,
}

impl HarmonyReport {
    pub fn tally(&self, broker: Broker) -> Option<&BrokerTally> {
        self.tallies.iter().find(|t| t.broker == broker)
    }

    /// Multi-line summary, one block per broker
    pub fn summary(&self) -> String {
        if self.tallies.is_empty() {
            return "No connected brokers".to_string();
        }

        let mut lines = Vec::new();
        for tally in &self.tallies {
            lines.push(format!(
                "{} updated: {}, missing: {}, skipped: {}, ambiguous: {}",
                tally.broker,
                tally.updated.len(),
                tally.missing.len(),
                tally.skipped.len(),
                tally.ambiguous.len()
            ));
            for (label, symbols) in [
                ("updated", &tally.updated),
                ("missing", &tally.missing),
                ("skipped", &tally.skipped),
                ("ambiguous", &tally.ambiguous),
            ] {
                if !symbols.is_empty() {
                    lines.push(format!("  {}: {}", label, symbols.join(", ")));
                }
            }
            if let Some(ref reason) = tally.aborted {
                lines.push(format!("  aborted: {}", reason));
            }
        }
        lines.join("\n")
    }
}

pub(crate) async fn run(router: &OrderRouter) -> HarmonyReport {
    let mut report = HarmonyReport::default();

    for (broker, gateway, adapter) in router.connected_adapters().await {
        let pending: Vec<SymbolRecord> = router
            .registry()
            .list_records()
            .await
            .into_iter()
            .filter(|r| !r.has_native_id(broker))
            .collect();

        info!("Harmony {} via {}: {} records to check", broker, gateway, pending.len());

        let tally = match broker {
            Broker::Ib => backfill_contracts(router, adapter.as_ref(), &gateway, pending).await,
            Broker::Webull => backfill_tickers(router, &gateway, pending).await,
        };
        report.tallies.push(tally);
    }

    report
}

async fn backfill_contracts(
    router: &OrderRouter,
    adapter: &dyn BrokerAdapter,
    gateway: &str,
    records: Vec<SymbolRecord>,
) -> BrokerTally {
    let mut tally = BrokerTally::new(Broker::Ib, gateway);
    let currency = &router.settings().equity_currency;

    for record in records {
        let symbol = record.canonical_symbol.clone();
        let kind = match record.asset_class {
            ref class if class.is_equity_like() => {
                if !record.currency.eq_ignore_ascii_case(currency) {
                    tally.skipped.push(symbol);
                    continue;
                }
                LookupKind::Equity
            }
            AssetClass::Future => match parse_futures_symbol(&symbol) {
                Some((root, expiry)) => LookupKind::Futures { root, expiry },
                None => {
                    tally.skipped.push(symbol);
                    continue;
                }
            },
            _ => {
                tally.skipped.push(symbol);
                continue;
            }
        };

        match router.resolver().resolve_contract(adapter, &symbol, kind).await {
            Ok(_) => tally.updated.push(symbol),
            Err(TradingError::NotFound(_)) => tally.missing.push(symbol),
            Err(TradingError::AmbiguousSymbol { .. }) => tally.ambiguous.push(symbol),
            Err(TradingError::Conflict(_)) => tally.skipped.push(symbol),
            Err(e) => {
                error!("Harmony IB aborted at {}: {}", symbol, e);
                tally.aborted = Some(e.to_string());
                break;
            }
        }
    }

    tally
}

async fn backfill_tickers(router: &OrderRouter, gateway: &str, records: Vec<SymbolRecord>) -> BrokerTally {
    let mut tally = BrokerTally::new(Broker::Webull, gateway);
    let currency = &router.settings().equity_currency;

    for record in records {
        let symbol = record.canonical_symbol.clone();
        if !record.asset_class.is_equity_like() || !record.currency.eq_ignore_ascii_case(currency) {
            tally.skipped.push(symbol);
            continue;
        }

        match router
            .registry()
            .ensure_webull_symbol(&symbol, SymbolDetails::default())
            .await
        {
            Ok(updated) if updated.canonical_symbol == symbol => tally.updated.push(symbol),
            Ok(other) => {
                warn!("Ticker {} already mapped to {}", symbol, other.canonical_symbol);
                tally.skipped.push(symbol);
            }
            Err(e) => {
                error!("Harmony Webull aborted at {}: {}", symbol, e);
                tally.aborted = Some(e.to_string());
                break;
            }
        }
    }

    tally
}
