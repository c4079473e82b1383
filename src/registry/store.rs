//! Durable storage seam for the symbol registry

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::RwLock;

use super::types::SymbolRecord;
use crate::common::errors::{Result, TradingError};

/// Durable store holding one row per canonical symbol
///
/// The registry loads every row once at startup and writes through on each
/// mutation; the store never needs to answer lookups.
#[async_trait]
pub trait SymbolStore: Send + Sync {
    /// Load the full table
    async fn load_all(&self) -> Result<Vec<SymbolRecord>>;

    /// Insert or update the row for `record.canonical_symbol`
    async fn upsert(&self, record: &SymbolRecord) -> Result<()>;
}

/// Simple in-memory store
///
/// Used for tests and for running without a database. It can be flipped
/// unavailable to simulate an unreachable store.
#[derive(Debug, Default)]
pub struct InMemorySymbolStore {
    rows: RwLock<HashMap<String, SymbolRecord>>,
    unavailable: AtomicBool,
    writes: AtomicUsize,
}

impl InMemorySymbolStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-seeded with rows
    pub fn with_records(records: Vec<SymbolRecord>) -> Self {
        let rows = records
            .into_iter()
            .map(|r| (r.canonical_symbol.clone(), r))
            .collect();
        Self {
            rows: RwLock::new(rows),
            ..Self::default()
        }
    }

    /// Make every subsequent call fail with a persistence error
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of successful upserts since creation
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub async fn get(&self, canonical_symbol: &str) -> Option<SymbolRecord> {
        self.rows.read().await.get(canonical_symbol).cloned()
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(TradingError::RegistryPersistence(
                "symbol store unavailable".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl SymbolStore for InMemorySymbolStore {
    async fn load_all(&self) -> Result<Vec<SymbolRecord>> {
        self.check_available()?;
        Ok(self.rows.read().await.values().cloned().collect())
    }

    async fn upsert(&self, record: &SymbolRecord) -> Result<()> {
        self.check_available()?;
        self.rows
            .write()
            .await
            .insert(record.canonical_symbol.clone(), record.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
