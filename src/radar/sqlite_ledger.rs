//! Snapshot ledger - append-only relational history of scored snapshots.
//!
//! The JSON state file stays the source of truth for change detection; the
//! ledger keeps every snapshot so concentration and liquidity can be charted
//! over time.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    FromRow, Pool, Sqlite,
};
use std::path::Path;
use tracing::{debug, info};

use crate::radar::types::{Authority, RiskLabel, Snapshot, AUTHORITY_NOT_SET};
use crate::types::{Chain, Token};

/// Persistence contract for snapshot history.
#[async_trait]
pub trait SnapshotLedger: Send + Sync {
    /// Append one snapshot. Returns the row id.
    async fn insert_snapshot(&self, snapshot: &Snapshot) -> Result<i64>;

    /// Most recent snapshots for an address, newest first.
    async fn snapshots_for(&self, address: &str, limit: u32) -> Result<Vec<Snapshot>>;

    /// Total number of recorded snapshots.
    async fn count(&self) -> Result<i64>;

    /// Health check for the storage backend.
    async fn health_check(&self) -> Result<bool>;
}

#[derive(FromRow)]
struct SnapshotRow {
    ts: String,
    symbol: String,
    chain: String,
    address: String,
    tags: String,
    mint_authority: Option<String>,
    freeze_authority: Option<String>,
    supply_raw: Option<String>,
    decimals: Option<i64>,
    top10_pct: Option<f64>,
    liquidity_usd: Option<f64>,
    volume_24h_usd: Option<f64>,
    risk_score: i64,
    risk: String,
    flags: String, // JSON array
}

impl SnapshotRow {
    fn into_snapshot(self) -> Result<Snapshot> {
        let ts = DateTime::parse_from_rfc3339(&self.ts)
            .with_context(|| format!("Invalid snapshot timestamp {}", self.ts))?
            .with_timezone(&Utc);
        let risk = RiskLabel::parse(&self.risk)
            .with_context(|| format!("Invalid risk label {}", self.risk))?;

        let mut token = Token::new(self.symbol, Chain::parse(&self.chain), self.address);
        token.tags = serde_json::from_str(&self.tags).context("Invalid tags column")?;

        Ok(Snapshot {
            ts,
            token,
            mint_authority: authority_from_column(self.mint_authority),
            freeze_authority: authority_from_column(self.freeze_authority),
            supply_raw: self.supply_raw,
            decimals: self.decimals.and_then(|d| u8::try_from(d).ok()),
            top10_pct: self.top10_pct,
            liquidity_usd: self.liquidity_usd,
            volume_24h_usd: self.volume_24h_usd,
            risk_score: u32::try_from(self.risk_score)
                .with_context(|| format!("Invalid risk score {}", self.risk_score))?,
            risk,
            flags: serde_json::from_str(&self.flags).context("Invalid flags column")?,
        })
    }
}

fn authority_to_column(authority: &Authority) -> Option<String> {
    match authority {
        Authority::Set(key) => Some(key.clone()),
        Authority::NotSet => Some(AUTHORITY_NOT_SET.to_string()),
        Authority::Unknown => None,
    }
}

fn authority_from_column(value: Option<String>) -> Authority {
    match value {
        None => Authority::Unknown,
        Some(v) if v == AUTHORITY_NOT_SET => Authority::NotSet,
        Some(v) => Authority::Set(v),
    }
}

/// SQLite implementation of `SnapshotLedger`.
pub struct SqliteSnapshotLedger {
    pool: Pool<Sqlite>,
}

impl SqliteSnapshotLedger {
    /// Open (creating if needed) the ledger database at `path`.
    pub async fn connect(path: &Path) -> Result<Self> {
        if let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir)
                .await
                .with_context(|| format!("Failed to create directory {}", dir.display()))?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .context("Failed to connect to SQLite database")?;

        Self::create_schema(&pool).await?;
        info!("Snapshot ledger connected to {}", path.display());
        Ok(Self { pool })
    }

    /// Private in-memory ledger.
    pub async fn in_memory() -> Result<Self> {
        // every connection would otherwise see its own empty database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .context("Failed to open in-memory SQLite database")?;

        Self::create_schema(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    async fn create_schema(pool: &Pool<Sqlite>) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS snapshots (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                ts TEXT NOT NULL,
                symbol TEXT NOT NULL,
                chain TEXT NOT NULL,
                address TEXT NOT NULL,
                tags TEXT NOT NULL DEFAULT '[]',
                mintAuthority TEXT,
                freezeAuthority TEXT,
                supplyRaw TEXT,
                decimals INTEGER,
                top10Pct REAL,
                liquidityUsd REAL,
                volume24hUsd REAL,
                riskScore INTEGER NOT NULL,
                risk TEXT NOT NULL,
                flags TEXT NOT NULL
            );
            "#,
        )
        .execute(pool)
        .await
        .context("Failed to create snapshots table")?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_snapshots_addr_ts ON snapshots(address, ts);")
            .execute(pool)
            .await
            .context("Failed to create snapshots index")?;

        debug!("Snapshot ledger schema ready");
        Ok(())
    }
}

#[async_trait]
impl SnapshotLedger for SqliteSnapshotLedger {
    async fn insert_snapshot(&self, snapshot: &Snapshot) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO snapshots (
                ts, symbol, chain, address, tags, mintAuthority, freezeAuthority,
                supplyRaw, decimals, top10Pct, liquidityUsd, volume24hUsd,
                riskScore, risk, flags
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(snapshot.ts.to_rfc3339_opts(SecondsFormat::Millis, true))
        .bind(&snapshot.token.symbol)
        .bind(snapshot.token.chain.as_str())
        .bind(&snapshot.token.address)
        .bind(serde_json::to_string(&snapshot.token.tags)?)
        .bind(authority_to_column(&snapshot.mint_authority))
        .bind(authority_to_column(&snapshot.freeze_authority))
        .bind(&snapshot.supply_raw)
        .bind(snapshot.decimals.map(i64::from))
        .bind(snapshot.top10_pct)
        .bind(snapshot.liquidity_usd)
        .bind(snapshot.volume_24h_usd)
        .bind(i64::from(snapshot.risk_score))
        .bind(snapshot.risk.as_str())
        .bind(serde_json::to_string(&snapshot.flags)?)
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to insert snapshot for {}", snapshot.token.address))?;

        Ok(result.last_insert_rowid())
    }

    async fn snapshots_for(&self, address: &str, limit: u32) -> Result<Vec<Snapshot>> {
        let rows: Vec<SnapshotRow> = sqlx::query_as(
            r#"
            SELECT ts, symbol, chain, address, tags,
                   mintAuthority AS mint_authority,
                   freezeAuthority AS freeze_authority,
                   supplyRaw AS supply_raw,
                   decimals,
                   top10Pct AS top10_pct,
                   liquidityUsd AS liquidity_usd,
                   volume24hUsd AS volume_24h_usd,
                   riskScore AS risk_score,
                   risk, flags
            FROM snapshots
            WHERE address = ?
            ORDER BY ts DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(address)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .with_context(|| format!("Failed to query snapshots for {}", address))?;

        rows.into_iter().map(SnapshotRow::into_snapshot).collect()
    }

    async fn count(&self) -> Result<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM snapshots")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count snapshots")?;
        Ok(count.0)
    }

    async fn health_check(&self) -> Result<bool> {
        match sqlx::query("SELECT 1").execute(&self.pool).await {
            Ok(_) => Ok(true),
            Err(_) => Ok(false),
        }
    }
}
