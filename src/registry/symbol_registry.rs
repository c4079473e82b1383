//! Cross-broker symbol identity registry

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use super::store::SymbolStore;
use super::types::{broker_of, SymbolDetails, SymbolRecord};
use crate::common::errors::Result;
use crate::common::types::{AssetClass, Broker, InstrumentType, NativeId};

const DEFAULT_CURRENCY: &str = "USD";

/// In-memory view of the store, indexed by canonical symbol and native ids
#[derive(Debug, Default)]
struct RegistryCache {
    by_canonical: HashMap<String, SymbolRecord>,
    by_ib_conid: HashMap<i64, String>,
    by_webull_ticker: HashMap<String, String>,
}

impl RegistryCache {
    fn owner_of(&self, id: &NativeId) -> Option<&String> {
        match id {
            NativeId::ContractId(conid) => self.by_ib_conid.get(conid),
            NativeId::Ticker(ticker) => self.by_webull_ticker.get(ticker),
        }
    }

    fn index(&mut self, record: &SymbolRecord) {
        if let Some(conid) = record.ib_conid {
            self.by_ib_conid
                .entry(conid)
                .or_insert_with(|| record.canonical_symbol.clone());
        }
        if let Some(ref ticker) = record.webull_ticker {
            self.by_webull_ticker
                .entry(ticker.clone())
                .or_insert_with(|| record.canonical_symbol.clone());
        }
    }

    fn put(&mut self, record: SymbolRecord) {
        self.index(&record);
        self.by_canonical
            .insert(record.canonical_symbol.clone(), record);
    }
}

/// Single source of truth mapping canonical symbols to broker-native ids
///
/// Every mutation is written through to the [`SymbolStore`] before the cache
/// changes, so the cache is never ahead of the durable table. The whole
/// check-then-act sequence of [`SymbolRegistry::ensure_broker_symbol`] runs
/// under one lock per registry instance.
pub struct SymbolRegistry {
    store: Arc<dyn SymbolStore>,
    cache: Mutex<RegistryCache>,
    conflicts: AtomicU64,
}

impl SymbolRegistry {
    /// Load the full table from `store`
    ///
    /// A store that cannot be read is fatal here.
    pub async fn open(store: Arc<dyn SymbolStore>) -> Result<Self> {
        let rows = store.load_all().await?;
        let mut cache = RegistryCache::default();

        for row in rows {
            let mut record = row;
            record.canonical_symbol = Self::normalize(&record.canonical_symbol);
            record.webull_ticker = record
                .webull_ticker
                .as_deref()
                .map(Self::normalize)
                .filter(|t| !t.is_empty());
            cache.put(record);
        }

        info!("Symbol registry loaded {} records", cache.by_canonical.len());

        Ok(Self {
            store,
            cache: Mutex::new(cache),
            conflicts: AtomicU64::new(0),
        })
    }

    /// Trim and uppercase a symbol
    pub fn normalize(symbol: &str) -> String {
        symbol.trim().to_uppercase()
    }

    pub async fn get_by_canonical(&self, symbol: &str) -> Option<SymbolRecord> {
        let canonical = Self::normalize(symbol);
        self.cache.lock().await.by_canonical.get(&canonical).cloned()
    }

    pub async fn get_by_broker_id(&self, id: &NativeId) -> Option<SymbolRecord> {
        let id = Self::normalize_native(id);
        let cache = self.cache.lock().await;
        cache
            .owner_of(&id)
            .and_then(|canonical| cache.by_canonical.get(canonical))
            .cloned()
    }

    pub async fn get_by_ib_conid(&self, conid: i64) -> Option<SymbolRecord> {
        self.get_by_broker_id(&NativeId::ContractId(conid)).await
    }

    pub async fn get_by_webull_ticker(&self, ticker: &str) -> Option<SymbolRecord> {
        self.get_by_broker_id(&NativeId::Ticker(ticker.to_string()))
            .await
    }

    /// All records, ordered by canonical symbol
    pub async fn list_records(&self) -> Vec<SymbolRecord> {
        let mut records: Vec<SymbolRecord> = self
            .cache
            .lock()
            .await
            .by_canonical
            .values()
            .cloned()
            .collect();
        records.sort_by(|a, b| a.canonical_symbol.cmp(&b.canonical_symbol));
        records
    }

    pub async fn len(&self) -> usize {
        self.cache.lock().await.by_canonical.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Number of identity conflicts observed since startup
    pub fn conflict_count(&self) -> u64 {
        self.conflicts.load(Ordering::Relaxed)
    }

    /// Return or create the record for `symbol`, binding `native_id` to it
    ///
    /// - If `native_id` already belongs to another canonical symbol, that
    ///   record is returned untouched and the collision is logged.
    /// - A missing record is created (EQUITY/USD unless supplied).
    /// - A missing native id or description is filled in once; an existing
    ///   different id is kept and the conflict is logged.
    #[instrument(skip(self, details), fields(native = %native_id))]
    pub async fn ensure_broker_symbol(
        &self,
        symbol: &str,
        native_id: NativeId,
        details: SymbolDetails,
    ) -> Result<SymbolRecord> {
        let canonical = Self::normalize(symbol);
        let native_id = Self::normalize_native(&native_id);
        let broker = broker_of(&native_id);

        let mut cache = self.cache.lock().await;

        if let Some(owner) = cache.owner_of(&native_id) {
            if owner != &canonical {
                let owner = owner.clone();
                self.record_conflict();
                warn!(
                    "{} id {} already mapped to {}, ignoring it for {}",
                    broker, native_id, owner, canonical
                );
                if let Some(existing) = cache.by_canonical.get(&owner) {
                    return Ok(existing.clone());
                }
            }
        }

        let Some(existing) = cache.by_canonical.get(&canonical) else {
            let mut record = SymbolRecord::new(
                canonical.clone(),
                details.asset_class.unwrap_or_default(),
                details
                    .currency
                    .map(|c| Self::normalize(&c))
                    .unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
            );
            record.set_native_id(&native_id);
            record.description = details.description.filter(|d| !d.trim().is_empty());

            self.store.upsert(&record).await?;
            cache.put(record.clone());
            info!("Registered {} as {} {}", canonical, broker, native_id);
            return Ok(record);
        };

        let mut updated = existing.clone();
        let mut changed = false;

        match existing.native_id(broker) {
            None => {
                updated.set_native_id(&native_id);
                changed = true;
            }
            Some(current) if current != native_id => {
                self.record_conflict();
                warn!(
                    "{} id conflict for {}: registry has {}, keeping it over {}",
                    broker, canonical, current, native_id
                );
            }
            Some(_) => {}
        }

        if let Some(description) = details.description.filter(|d| !d.trim().is_empty()) {
            if updated.description.as_deref().map_or(true, str::is_empty) {
                updated.description = Some(description);
                changed = true;
            }
        }

        if changed {
            self.store.upsert(&updated).await?;
            cache.put(updated.clone());
            debug!("Updated registry record {}", canonical);
        }

        Ok(updated)
    }

    /// Bind an IB contract id to `symbol`
    pub async fn ensure_ib_symbol(
        &self,
        symbol: &str,
        conid: i64,
        currency: Option<&str>,
        description: Option<&str>,
    ) -> Result<SymbolRecord> {
        let details = SymbolDetails {
            asset_class: None,
            currency: currency.map(str::to_string),
            description: description.map(str::to_string),
        };
        self.ensure_broker_symbol(symbol, NativeId::ContractId(conid), details)
            .await
    }

    /// Bind a Webull ticker; the ticker is also the canonical symbol
    pub async fn ensure_webull_symbol(
        &self,
        ticker: &str,
        details: SymbolDetails,
    ) -> Result<SymbolRecord> {
        let canonical = Self::normalize(ticker);
        self.ensure_broker_symbol(&canonical, NativeId::Ticker(canonical.clone()), details)
            .await
    }

    /// Register a holding reported by a broker, if it is a US equity with an id
    ///
    /// Returns `None` when the holding is skipped; the reason is logged.
    pub async fn observe_holding(
        &self,
        symbol: &str,
        native_id: Option<NativeId>,
        instrument_type: InstrumentType,
        currency: Option<&str>,
    ) -> Result<Option<SymbolRecord>> {
        if instrument_type != InstrumentType::Stock {
            info!("Holding skipped (non-equity): {} {}", symbol, instrument_type);
            return Ok(None);
        }
        let Some(native_id) = native_id else {
            info!("Holding missing native id: {}", symbol);
            return Ok(None);
        };
        if let Some(currency) = currency {
            if !currency.eq_ignore_ascii_case(DEFAULT_CURRENCY) {
                info!("Holding skipped (non-US): {} {}", symbol, currency);
                return Ok(None);
            }
        }

        let details = SymbolDetails::default()
            .with_asset_class(AssetClass::Equity)
            .with_currency(currency.unwrap_or(DEFAULT_CURRENCY));
        self.ensure_broker_symbol(symbol, native_id, details)
            .await
            .map(Some)
    }

    fn normalize_native(id: &NativeId) -> NativeId {
        match id {
            NativeId::ContractId(conid) => NativeId::ContractId(*conid),
            NativeId::Ticker(ticker) => NativeId::Ticker(Self::normalize(ticker)),
        }
    }

    fn record_conflict(&self) {
        self.conflicts.fetch_add(1, Ordering::Relaxed);
    }
}

impl std::fmt::Debug for SymbolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SymbolRegistry")
            .field("conflicts", &self.conflict_count())
            .finish_non_exhaustive()
    }
}

/// Helper used by callers that only know the broker and a raw identifier
pub fn native_id_for(broker: Broker, raw: &str) -> Option<NativeId> {
    match broker {
        Broker::Ib => raw.trim().parse().ok().map(NativeId::ContractId),
        Broker::Webull => {
            let ticker = SymbolRegistry::normalize(raw);
            (!ticker.is_empty()).then_some(NativeId::Ticker(ticker))
        }
    }
}
