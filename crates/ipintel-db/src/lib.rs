//! Postgres-backed durable tier (spec §4.5 steps 3 and 8, §6 "Database").
//!
//! One row per canonical record keyed by normalized IP, carrying the record
//! as JSONB plus a content hash (for change detection) and its own
//! `expires_at`. A second table tracks per-provider daily stats keyed by
//! `(provider, date)`, updated from background tasks per spec §5 ("Metrics
//! counters and daily provider stats are updated from background tasks;
//! their failure must never affect the foreground response").

use chrono::{DateTime, NaiveDate, Utc};
use ipintel_core::model::{CorrelatedIpRecord, ProviderDailyStats};
use sha2::{Digest, Sha256};
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool, Row};

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("failed to (de)serialize stored record: {0}")]
    Serde(#[from] serde_json::Error),
}

#[derive(FromRow)]
struct IpRecordRow {
    record: Json<CorrelatedIpRecord>,
}

/// Content hash of the fields that matter for "has this IP's intelligence
/// actually changed" — metadata's own timestamps are excluded so a bare
/// cache-refresh touch never looks like a content change.
fn content_hash(record: &CorrelatedIpRecord) -> String {
    let mut hasher = Sha256::new();
    hasher.update(record.ip.as_bytes());
    if let Ok(core) = serde_json::to_vec(&(&record.asn, &record.org, &record.location, &record.flags, &record.threat)) {
        hasher.update(&core);
    }
    format!("{:x}", hasher.finalize())
}

#[derive(Clone)]
pub struct IpDb {
    pool: PgPool,
}

impl IpDb {
    /// Connects and runs embedded migrations, matching the pool sizing
    /// implied by spec §5 ("process-wide and thread-safe" connection
    /// pools).
    pub async fn connect(database_url: &str) -> Result<Self, DbError> {
        let pool = PgPoolOptions::new().max_connections(10).connect(database_url).await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    /// Reads the persisted row for `ip` regardless of whether it has
    /// expired — the lookup service decides freshness via
    /// `CorrelatedIpRecord::is_expired` (spec §4.5 step 3).
    pub async fn get(&self, ip: &str) -> Result<Option<CorrelatedIpRecord>, DbError> {
        let row: Option<IpRecordRow> = sqlx::query_as("SELECT record FROM ip_records WHERE ip = $1").bind(ip).fetch_optional(&self.pool).await?;
        Ok(row.map(|r| r.record.0))
    }

    /// Upserts `record`, recomputing its content hash (spec §6 "Database").
    pub async fn upsert(&self, record: &CorrelatedIpRecord) -> Result<(), DbError> {
        let hash = content_hash(record);
        sqlx::query(
            "INSERT INTO ip_records (ip, record, hash, created_at, updated_at, expires_at)
             VALUES ($1, $2, $3, $4, $5, $6)
             ON CONFLICT (ip) DO UPDATE SET
                record = EXCLUDED.record,
                hash = EXCLUDED.hash,
                updated_at = EXCLUDED.updated_at,
                expires_at = EXCLUDED.expires_at",
        )
        .bind(&record.ip)
        .bind(Json(record))
        .bind(&hash)
        .bind(record.metadata.created_at)
        .bind(record.metadata.updated_at)
        .bind(record.metadata.expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn delete(&self, ip: &str) -> Result<(), DbError> {
        sqlx::query("DELETE FROM ip_records WHERE ip = $1").bind(ip).execute(&self.pool).await?;
        Ok(())
    }

    /// Removes rows whose `expires_at` is older than `now - grace_days`
    /// (spec §6: "Cleanup removes rows whose expiresAt is older than
    /// `now - 7 days` (grace period)"). Intended to run on a periodic
    /// background task, never on the request path.
    pub async fn cleanup_expired(&self, grace_days: i64, now: DateTime<Utc>) -> Result<u64, DbError> {
        let cutoff = now - chrono::Duration::days(grace_days);
        let result = sqlx::query("DELETE FROM ip_records WHERE expires_at < $1").bind(cutoff).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    /// Records one provider settlement into that provider's running daily
    /// stats, folding the new latency sample into the stored average in a
    /// single statement (spec §3 `ProviderDailyStats`, §5 "updated from
    /// background tasks").
    pub async fn record_provider_result(&self, provider: &str, date: NaiveDate, success: bool, timed_out: bool, latency_ms: u64, error: Option<&str>) -> Result<(), DbError> {
        let (success_inc, failure_inc, timeout_inc) = match (success, timed_out) {
            (true, _) => (1i64, 0i64, 0i64),
            (false, true) => (0, 1, 1),
            (false, false) => (0, 1, 0),
        };
        sqlx::query(
            "INSERT INTO provider_daily_stats (provider, date, success_count, failure_count, timeout_count, avg_latency_ms, last_error)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             ON CONFLICT (provider, date) DO UPDATE SET
                success_count = provider_daily_stats.success_count + EXCLUDED.success_count,
                failure_count = provider_daily_stats.failure_count + EXCLUDED.failure_count,
                timeout_count = provider_daily_stats.timeout_count + EXCLUDED.timeout_count,
                avg_latency_ms = (provider_daily_stats.avg_latency_ms * (provider_daily_stats.success_count + provider_daily_stats.failure_count)
                                  + EXCLUDED.avg_latency_ms) / (provider_daily_stats.success_count + provider_daily_stats.failure_count + 1),
                last_error = COALESCE(EXCLUDED.last_error, provider_daily_stats.last_error)",
        )
        .bind(provider)
        .bind(date)
        .bind(success_inc)
        .bind(failure_inc)
        .bind(timeout_inc)
        .bind(latency_ms as f64)
        .bind(error)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn daily_stats(&self, provider: &str, date: NaiveDate) -> Result<Option<ProviderDailyStats>, DbError> {
        let row = sqlx::query(
            "SELECT provider, date, success_count, failure_count, timeout_count, avg_latency_ms, last_error
             FROM provider_daily_stats WHERE provider = $1 AND date = $2",
        )
        .bind(provider)
        .bind(date)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| ProviderDailyStats {
            provider: row.get("provider"),
            date: row.get::<NaiveDate, _>("date").format("%Y-%m-%d").to_string(),
            success_count: row.get::<i64, _>("success_count") as u64,
            failure_count: row.get::<i64, _>("failure_count") as u64,
            timeout_count: row.get::<i64, _>("timeout_count") as u64,
            avg_latency_ms: row.get("avg_latency_ms"),
            last_error: row.get("last_error"),
        }))
    }

    pub async fn ping(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ipintel_core::model::{Flags, Location, Metadata, RecordSource, Threat};

    fn sample_record(ip: &str) -> CorrelatedIpRecord {
        let now = Utc::now();
        CorrelatedIpRecord {
            ip: ip.to_string(),
            asn: Some("AS15169".to_string()),
            org: Some("Google LLC".to_string()),
            location: Location::default(),
            flags: Flags::default(),
            threat: Threat::default(),
            metadata: Metadata {
                providers: vec!["ipwhois".to_string()],
                conflicts: None,
                source: RecordSource::Live,
                created_at: now,
                updated_at: now,
                expires_at: now + chrono::Duration::seconds(3600),
                ttl_seconds: 3600,
                warnings: None,
                partial_data: false,
                providers_queried: 1,
                providers_succeeded: 1,
                llm_analysis: None,
            },
        }
    }

    #[test]
    fn content_hash_ignores_metadata_timestamps() {
        let mut a = sample_record("8.8.8.8");
        let mut b = a.clone();
        b.metadata.updated_at += chrono::Duration::seconds(1);
        b.metadata.expires_at += chrono::Duration::seconds(1);
        assert_eq!(content_hash(&a), content_hash(&b));

        a.org = Some("Different Org".to_string());
        assert_ne!(content_hash(&a), content_hash(&b));
    }
}
