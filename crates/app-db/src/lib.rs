mod error;

pub use error::Error;

use std::str::FromStr;

use bigdecimal::BigDecimal;
use nearlens_core::CanonicalEvent;
use sqlx::{postgres::PgPoolOptions, PgPool, Row};
use tracing::{debug, info};

pub type Result<T> = std::result::Result<T, Error>;

const MAX_CONNECTIONS: u32 = 10;

#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect(url)
            .await?;
        let db = Self { pool };
        db.init_schema().await?;
        info!("database connected, schema ready");
        Ok(db)
    }

    async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS ft_events (
                event_index          NUMERIC(40,0) PRIMARY KEY,
                block_height         BIGINT        NOT NULL,
                block_timestamp      BIGINT        NOT NULL,
                shard_id             BIGINT        NOT NULL,
                receipt_id           TEXT          NOT NULL,
                transaction_hash     TEXT,
                contract_account_id  TEXT          NOT NULL,
                affected_account_id  TEXT          NOT NULL,
                involved_account_id  TEXT,
                delta_amount         NUMERIC(40,0) NOT NULL,
                cause                TEXT          NOT NULL,
                standard             TEXT          NOT NULL,
                event_memo           TEXT
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_ft_events_contract
             ON ft_events (contract_account_id, block_height)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_ft_events_affected
             ON ft_events (affected_account_id, block_height)",
        )
        .execute(&self.pool)
        .await?;

        // One typed row per indexer; never mixed with the generic settings
        // store below.
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS checkpoints (
                indexer     TEXT        PRIMARY KEY,
                sync_height BIGINT      NOT NULL,
                updated_at  TIMESTAMPTZ NOT NULL DEFAULT now()
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS settings (
                key   TEXT  PRIMARY KEY,
                value JSONB NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Idempotent batch upsert: the composite `event_index` is the natural
    /// key, so re-processing a block after a restart resolves to no-ops.
    pub async fn insert_events(&self, events: &[CanonicalEvent]) -> Result<u64> {
        if events.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;

        for event in events {
            let result = sqlx::query(
                "INSERT INTO ft_events
                    (event_index, block_height, block_timestamp, shard_id, receipt_id,
                     transaction_hash, contract_account_id, affected_account_id,
                     involved_account_id, delta_amount, cause, standard, event_memo)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
                 ON CONFLICT (event_index) DO NOTHING",
            )
            .bind(BigDecimal::from_str(&event.event_index.to_string())?)
            .bind(event.block_height as i64)
            .bind(event.block_timestamp as i64)
            .bind(event.shard_id as i64)
            .bind(&event.receipt_id)
            .bind(&event.transaction_hash)
            .bind(&event.contract_account_id)
            .bind(&event.affected_account_id)
            .bind(&event.involved_account_id)
            .bind(BigDecimal::from_str(&event.delta_amount.to_string())?)
            .bind(event.cause.to_string())
            .bind(event.standard.to_string())
            .bind(&event.memo)
            .execute(&mut *tx)
            .await?;
            inserted += result.rows_affected();
        }

        tx.commit().await?;
        debug!(total = events.len(), inserted, "events persisted");
        Ok(inserted)
    }

    pub async fn checkpoint(&self, indexer: &str) -> Result<Option<u64>> {
        let row = sqlx::query("SELECT sync_height FROM checkpoints WHERE indexer = $1")
            .bind(indexer)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|row| row.get::<i64, _>("sync_height") as u64))
    }

    /// Only called after the same block's events are durably persisted.
    pub async fn advance_checkpoint(&self, indexer: &str, height: u64) -> Result<()> {
        sqlx::query(
            "INSERT INTO checkpoints (indexer, sync_height)
             VALUES ($1, $2)
             ON CONFLICT (indexer)
             DO UPDATE SET sync_height = EXCLUDED.sync_height, updated_at = now()",
        )
        .bind(indexer)
        .bind(height as i64)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn setting(&self, key: &str) -> Result<Option<serde_json::Value>> {
        let row = sqlx::query("SELECT value FROM settings WHERE key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|row| row.get("value")))
    }

    pub async fn set_setting(&self, key: &str, value: serde_json::Value) -> Result<()> {
        sqlx::query(
            "INSERT INTO settings (key, value)
             VALUES ($1, $2)
             ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
