//! Request-log and pricing storage using SQLite
//!
//! Two tables: `request_logs` (one row per successful request) and
//! `model_pricing` (read-mostly rates, seeded when empty). Decimal USD
//! columns are stored as text and parsed on read.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{sqlite::SqlitePoolOptions, FromRow, Pool, Sqlite};
use std::path::Path;
use tollgate_llm::cost::StoreError;
use tollgate_llm::{
    CostAmount, ModelId, ModelPricing, PricingLookup, RequestLog, RequestLogSink, RoutingConfig,
    TokenCount,
};
use tracing::{debug, info};

/// SQLite-backed pricing lookup and request-log sink
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

#[derive(Debug, FromRow)]
struct PricingRow {
    model_name: String,
    input_cost_per_1m_tokens: String,
    output_cost_per_1m_tokens: String,
    max_context_tokens: i64,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PricingRow> for ModelPricing {
    type Error = anyhow::Error;

    fn try_from(row: PricingRow) -> Result<Self> {
        let mut pricing = ModelPricing::new(
            ModelId::new(row.model_name).map_err(|e| anyhow::anyhow!(e))?,
            row.input_cost_per_1m_tokens
                .parse::<Decimal>()
                .context("bad input rate")?,
            row.output_cost_per_1m_tokens
                .parse::<Decimal>()
                .context("bad output rate")?,
            u32::try_from(row.max_context_tokens).context("bad context window")?,
        )
        .map_err(|e| anyhow::anyhow!(e))?;
        pricing.updated_at = row.updated_at;
        Ok(pricing)
    }
}

impl SqliteStore {
    /// Open (or create) the database at `path` and run migrations
    pub async fn from_path(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let url = format!("sqlite:{}?mode=rwc", path.display());
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await
            .context("Failed to open SQLite database")?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Run database migrations
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS request_logs (
                id TEXT PRIMARY KEY,
                timestamp TIMESTAMP NOT NULL,
                model_used TEXT NOT NULL,
                input_tokens INTEGER NOT NULL,
                output_tokens INTEGER NOT NULL,
                estimated_cost_usd TEXT NOT NULL,
                provider_name TEXT NOT NULL,
                response_time_ms INTEGER NOT NULL,
                was_fallback BOOLEAN NOT NULL DEFAULT FALSE
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS model_pricing (
                id TEXT PRIMARY KEY,
                model_name TEXT NOT NULL UNIQUE,
                provider_name TEXT NOT NULL,
                input_cost_per_1m_tokens TEXT NOT NULL,
                output_cost_per_1m_tokens TEXT NOT NULL,
                max_context_tokens INTEGER NOT NULL,
                updated_at TIMESTAMP NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_request_logs_timestamp ON request_logs(timestamp)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_request_logs_provider ON request_logs(provider_name)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Insert a pricing row, replacing any previous rates for the model
    pub async fn upsert_pricing(&self, pricing: &ModelPricing) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO model_pricing (
                id, model_name, provider_name,
                input_cost_per_1m_tokens, output_cost_per_1m_tokens,
                max_context_tokens, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(model_name) DO UPDATE SET
                input_cost_per_1m_tokens = excluded.input_cost_per_1m_tokens,
                output_cost_per_1m_tokens = excluded.output_cost_per_1m_tokens,
                max_context_tokens = excluded.max_context_tokens,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(uuid::Uuid::new_v4().to_string())
        .bind(pricing.model.as_str())
        .bind(&pricing.provider)
        .bind(pricing.input_cost_per_million.to_string())
        .bind(pricing.output_cost_per_million.to_string())
        .bind(i64::from(pricing.max_context_tokens))
        .bind(pricing.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Seed pricing rows for the routed models when the table is empty
    pub async fn seed_pricing(&self, routing: &RoutingConfig) -> Result<()> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM model_pricing")
            .fetch_one(&self.pool)
            .await?;
        if count > 0 {
            debug!(rows = count, "Pricing table already populated");
            return Ok(());
        }

        // per-1M-token USD rates in routed order: default, large, balanced
        let seeds = [
            (&routing.default_model, "0.15", "0.60", 128_000_u32),
            (&routing.large_context_model, "3.00", "15.00", 200_000),
            (&routing.balanced_model, "2.50", "10.00", 128_000),
        ];

        for (model, input, output, context) in seeds {
            let pricing = ModelPricing::new(
                model.clone(),
                input.parse().context("seed rate")?,
                output.parse().context("seed rate")?,
                context,
            )
            .map_err(|e| anyhow::anyhow!(e))?;
            self.upsert_pricing(&pricing).await?;
        }

        info!(rows = seeds.len(), "Seeded model pricing");
        Ok(())
    }

    /// Count of persisted request logs (diagnostics and tests)
    pub async fn request_log_count(&self) -> Result<i64> {
        Ok(sqlx::query_scalar("SELECT COUNT(*) FROM request_logs")
            .fetch_one(&self.pool)
            .await?)
    }

    /// Most recent request logs, newest first
    pub async fn recent_logs(&self, limit: u32) -> Result<Vec<RequestLog>> {
        let rows: Vec<RequestLogRow> = sqlx::query_as(
            r#"
            SELECT id, timestamp, model_used, input_tokens, output_tokens,
                   estimated_cost_usd, provider_name, response_time_ms, was_fallback
            FROM request_logs ORDER BY timestamp DESC LIMIT ?
            "#,
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(RequestLogRow::try_into).collect()
    }
}

#[derive(Debug, FromRow)]
struct RequestLogRow {
    id: String,
    timestamp: DateTime<Utc>,
    model_used: String,
    input_tokens: i64,
    output_tokens: i64,
    estimated_cost_usd: String,
    provider_name: String,
    response_time_ms: i64,
    was_fallback: bool,
}

impl TryFrom<RequestLogRow> for RequestLog {
    type Error = anyhow::Error;

    fn try_from(row: RequestLogRow) -> Result<Self> {
        Ok(Self {
            id: row.id.parse().context("bad log id")?,
            timestamp: row.timestamp,
            model_used: ModelId::new(row.model_used).map_err(|e| anyhow::anyhow!(e))?,
            input_tokens: TokenCount::new(u32::try_from(row.input_tokens)?),
            output_tokens: TokenCount::new(u32::try_from(row.output_tokens)?),
            estimated_cost: CostAmount::new(
                row.estimated_cost_usd
                    .parse::<Decimal>()
                    .context("bad cost")?,
            )
            .map_err(|e| anyhow::anyhow!(e))?,
            provider_name: row.provider_name,
            response_time: std::time::Duration::from_millis(u64::try_from(
                row.response_time_ms,
            )?),
            was_fallback: row.was_fallback,
        })
    }
}

#[async_trait::async_trait]
impl PricingLookup for SqliteStore {
    async fn pricing_for(
        &self,
        model: &ModelId,
    ) -> std::result::Result<Option<ModelPricing>, StoreError> {
        let row: Option<PricingRow> = sqlx::query_as(
            r#"
            SELECT model_name, input_cost_per_1m_tokens, output_cost_per_1m_tokens,
                   max_context_tokens, updated_at
            FROM model_pricing WHERE model_name = ?
            "#,
        )
        .bind(model.as_str())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let pricing: ModelPricing = row.try_into().map_err(StoreError::from)?;
                Ok(Some(pricing))
            }
            None => Ok(None),
        }
    }
}

#[async_trait::async_trait]
impl RequestLogSink for SqliteStore {
    async fn save(&self, log: &RequestLog) -> std::result::Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO request_logs (
                id, timestamp, model_used, input_tokens, output_tokens,
                estimated_cost_usd, provider_name, response_time_ms, was_fallback
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(log.id.to_string())
        .bind(log.timestamp)
        .bind(log.model_used.as_str())
        .bind(i64::from(log.input_tokens.get()))
        .bind(i64::from(log.output_tokens.get()))
        .bind(log.estimated_cost.as_decimal().to_string())
        .bind(&log.provider_name)
        .bind(log.response_time.as_millis() as i64)
        .bind(log.was_fallback)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tollgate_llm::{CostAmount, TokenCount};

    async fn store() -> (SqliteStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::from_path(&dir.path().join("test.db"))
            .await
            .unwrap();
        (store, dir)
    }

    fn routing() -> RoutingConfig {
        RoutingConfig::new(
            ModelId::new("a/default").unwrap(),
            ModelId::new("a/large").unwrap(),
            ModelId::new("a/balanced").unwrap(),
        )
    }

    #[tokio::test]
    async fn test_pricing_roundtrip() {
        let (store, _dir) = store().await;
        let pricing = ModelPricing::new(
            ModelId::new("a/x").unwrap(),
            "1.0".parse().unwrap(),
            "2.0".parse().unwrap(),
            128_000,
        )
        .unwrap();
        store.upsert_pricing(&pricing).await.unwrap();

        let loaded = store
            .pricing_for(&ModelId::new("a/x").unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.model.as_str(), "a/x");
        assert_eq!(loaded.input_cost_per_million, "1.0".parse().unwrap());
        assert_eq!(loaded.max_context_tokens, 128_000);
    }

    #[tokio::test]
    async fn test_missing_pricing_is_none() {
        let (store, _dir) = store().await;
        let loaded = store
            .pricing_for(&ModelId::new("no/row").unwrap())
            .await
            .unwrap();
        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn test_seed_is_idempotent() {
        let (store, _dir) = store().await;
        store.seed_pricing(&routing()).await.unwrap();
        store.seed_pricing(&routing()).await.unwrap();

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM model_pricing")
            .fetch_one(&store.pool)
            .await
            .unwrap();
        assert_eq!(count, 3);
    }

    #[tokio::test]
    async fn test_request_log_persisted() {
        let (store, _dir) = store().await;
        let log = RequestLog::new(
            ModelId::new("a/x").unwrap(),
            TokenCount::new(100),
            TokenCount::new(200),
            CostAmount::new("0.0005".parse().unwrap()).unwrap(),
            "a",
            Duration::from_millis(42),
            true,
        );
        store.save(&log).await.unwrap();

        assert_eq!(store.request_log_count().await.unwrap(), 1);

        let (cost, fallback): (String, bool) = sqlx::query_as(
            "SELECT estimated_cost_usd, was_fallback FROM request_logs WHERE id = ?",
        )
        .bind(log.id.to_string())
        .fetch_one(&store.pool)
        .await
        .unwrap();
        assert_eq!(cost, "0.0005");
        assert!(fallback);
    }
}
