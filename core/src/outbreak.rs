use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::str::FromStr;
use tracing::{error, info};

use crate::error::StorageError;
use crate::registry::OutbreakReport;

/// Persists confirmed disease incidents. Implementations must tolerate
/// concurrent calls from independent diagnosis cycles.
#[async_trait]
pub trait OutbreakRecorder: Send + Sync {
    /// Stores the incident and returns its identifier.
    async fn record(&self, report: &OutbreakReport) -> Result<String, StorageError>;
}

/// One row of the dashboard feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutbreakStat {
    pub plant: String,
    pub disease: String,
    pub severity: String,
}

pub const RECENT_STATS_LIMIT: i64 = 5;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS outbreaks (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    plant       TEXT NOT NULL,
    disease     TEXT NOT NULL,
    confidence  REAL NOT NULL,
    severity    TEXT NOT NULL,
    status      TEXT NOT NULL DEFAULT 'OPEN',
    created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
)
"#;

/// SQLite-backed outbreak registry.
#[derive(Clone)]
pub struct OutbreakRegistry {
    pool: SqlitePool,
}

impl OutbreakRegistry {
    /// Opens (creating if needed) the database at `url` and ensures the table exists.
    pub async fn connect(url: &str) -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let mut pool_options = SqlitePoolOptions::new().max_connections(5);
        if url.contains(":memory:") {
            // In-memory databases live and die with their connection.
            pool_options = pool_options
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }
        let pool = pool_options.connect_with(options).await?;
        Self::with_pool(pool).await
    }

    pub async fn with_pool(pool: SqlitePool) -> Result<Self, StorageError> {
        sqlx::query(SCHEMA).execute(&pool).await?;
        info!("Outbreak registry ready.");
        Ok(Self { pool })
    }

    /// Newest incidents first, at most `limit` of them.
    pub async fn recent_stats(&self, limit: i64) -> Result<Vec<OutbreakStat>, StorageError> {
        let rows = sqlx::query(
            "SELECT plant, disease, severity FROM outbreaks ORDER BY created_at DESC, id DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(OutbreakStat {
                    plant: row.try_get("plant")?,
                    disease: row.try_get("disease")?,
                    severity: row.try_get("severity")?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()
            .map_err(StorageError::from)
    }
}

#[async_trait]
impl OutbreakRecorder for OutbreakRegistry {
    async fn record(&self, report: &OutbreakReport) -> Result<String, StorageError> {
        let result = sqlx::query(
            "INSERT INTO outbreaks (plant, disease, confidence, severity) VALUES (?, ?, ?, ?)",
        )
        .bind(&report.plant)
        .bind(&report.disease)
        .bind(report.confidence)
        .bind(report.severity.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!("Database Error: {}", e);
            StorageError::from(e)
        })?;

        let id = result.last_insert_rowid().to_string();
        info!("Incident logged: {}", id);
        Ok(id)
    }
}
