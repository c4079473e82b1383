//! PostgreSQL-backed symbol store

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{info, instrument};

use super::store::SymbolStore;
use super::types::SymbolRecord;
use crate::common::errors::Result;
use crate::common::types::AssetClass;
use crate::config::types::DatabaseConfig;

/// Row shape of `janus.symbol_registry`
#[derive(Debug, Clone, sqlx::FromRow)]
struct SymbolRow {
    canonical_symbol: String,
    asset_class: String,
    currency: String,
    ib_conid: Option<i64>,
    webull_ticker: Option<String>,
    description: Option<String>,
}

impl From<SymbolRow> for SymbolRecord {
    fn from(row: SymbolRow) -> Self {
        SymbolRecord {
            canonical_symbol: row.canonical_symbol,
            asset_class: AssetClass::from(row.asset_class.as_str()),
            currency: row.currency,
            ib_conid: row.ib_conid,
            webull_ticker: row.webull_ticker,
            description: row.description,
        }
    }
}

/// Symbol store on a PostgreSQL connection pool
pub struct PostgresSymbolStore {
    pool: PgPool,
}

impl PostgresSymbolStore {
    /// Connect and make sure the schema exists
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout_seconds))
            .connect(&config.url)
            .await?;

        let store = Self { pool };
        store.initialize_schema().await?;
        Ok(store)
    }

    async fn initialize_schema(&self) -> Result<()> {
        sqlx::query("CREATE SCHEMA IF NOT EXISTS janus")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS janus.symbol_registry (
                canonical_symbol TEXT PRIMARY KEY,
                asset_class TEXT NOT NULL DEFAULT 'EQUITY',
                currency TEXT NOT NULL DEFAULT 'USD',
                ib_conid BIGINT UNIQUE,
                webull_ticker TEXT UNIQUE,
                description TEXT,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        info!("Symbol registry schema initialized");
        Ok(())
    }
}

#[async_trait]
impl SymbolStore for PostgresSymbolStore {
    #[instrument(skip(self))]
    async fn load_all(&self) -> Result<Vec<SymbolRecord>> {
        let rows = sqlx::query_as::<_, SymbolRow>(
            r#"
            SELECT canonical_symbol, asset_class, currency, ib_conid, webull_ticker, description
            FROM janus.symbol_registry
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(SymbolRecord::from).collect())
    }

    #[instrument(skip(self, record), fields(symbol = %record.canonical_symbol))]
    async fn upsert(&self, record: &SymbolRecord) -> Result<()> {
        // Native ids and description are first-write-wins at the row level too
        sqlx::query(
            r#"
            INSERT INTO janus.symbol_registry (
                canonical_symbol, asset_class, currency, ib_conid, webull_ticker, description
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (canonical_symbol) DO UPDATE SET
                ib_conid = COALESCE(janus.symbol_registry.ib_conid, EXCLUDED.ib_conid),
                webull_ticker = COALESCE(janus.symbol_registry.webull_ticker, EXCLUDED.webull_ticker),
                description = COALESCE(janus.symbol_registry.description, EXCLUDED.description),
                updated_at = now()
            "#,
        )
        .bind(&record.canonical_symbol)
        .bind(record.asset_class.as_str())
        .bind(&record.currency)
        .bind(record.ib_conid)
        .bind(&record.webull_ticker)
        .bind(&record.description)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
