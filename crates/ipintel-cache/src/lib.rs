//! Redis-backed cache tier for canonical IP records (spec §4.5 steps 2 and
//! 8, §6 "Cache layout").
//!
//! Keys are `ipintel:v1:{ip}`; values are the JSON-serialized
//! `CorrelatedIpRecord`. Iteration never uses a blocking `KEYS` — every scan
//! is cursor-based and non-blocking, and bulk deletes are chunked to at
//! most 100 keys per round trip (spec §6).

use ipintel_core::model::CorrelatedIpRecord;
use redis::AsyncCommands;
use std::time::Duration;
use tracing::{debug, warn};

const KEY_PREFIX: &str = "ipintel:v1:";
const SCAN_BATCH: usize = 250;
const DELETE_BATCH: usize = 100;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("failed to (de)serialize cached record: {0}")]
    Serde(#[from] serde_json::Error),
}

fn key_for(ip: &str) -> String {
    format!("{KEY_PREFIX}{ip}")
}

/// Thin wrapper around a process-wide Redis connection manager (spec §5
/// "Connection pools ... are process-wide and thread-safe").
#[derive(Clone)]
pub struct IpCache {
    conn: redis::aio::ConnectionManager,
}

impl IpCache {
    pub async fn connect(redis_url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(redis_url)?;
        let conn = client.get_connection_manager().await?;
        Ok(Self { conn })
    }

    /// Reads the cached record for `ip`, if present and still valid JSON.
    /// A corrupt entry is treated as a miss rather than an error, since
    /// persistence failures must never surface to the caller (spec §7).
    pub async fn get(&self, ip: &str) -> Result<Option<CorrelatedIpRecord>, CacheError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(key_for(ip)).await?;
        match raw {
            None => Ok(None),
            Some(s) => match serde_json::from_str(&s) {
                Ok(record) => Ok(Some(record)),
                Err(e) => {
                    warn!(ip, error = %e, "dropping corrupt cache entry");
                    Ok(None)
                }
            },
        }
    }

    /// Writes `record` under `ip`'s key with the given TTL (spec §4.5 step
    /// 8, "write cache and database in parallel, best-effort").
    pub async fn set(&self, ip: &str, record: &CorrelatedIpRecord, ttl_seconds: i64) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let body = serde_json::to_string(record)?;
        let ttl = ttl_seconds.max(1) as u64;
        let _: () = conn.set_ex(key_for(ip), body, ttl).await?;
        Ok(())
    }

    /// Resets the key's remaining TTL to the full window without rewriting
    /// the value (spec §4.5 step 2 "extend TTL back to the full window" —
    /// the "touch on access" policy flagged in spec §9 as an open design
    /// question; preserved as specified).
    pub async fn touch(&self, ip: &str, ttl_seconds: i64) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let ttl = ttl_seconds.max(1) as u64;
        let _: bool = conn.expire(key_for(ip), ttl as i64).await?;
        Ok(())
    }

    /// Remaining TTL for `ip`'s key, if it exists. `None` means absent (not
    /// "no expiry" — every entry written through [`IpCache::set`] carries
    /// one).
    pub async fn ttl_remaining(&self, ip: &str) -> Result<Option<Duration>, CacheError> {
        let mut conn = self.conn.clone();
        let ttl: i64 = conn.ttl(key_for(ip)).await?;
        Ok((ttl >= 0).then(|| Duration::from_secs(ttl as u64)))
    }

    pub async fn delete(&self, ip: &str) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(key_for(ip)).await?;
        Ok(())
    }

    /// Non-blocking cursor-based iteration over every cached key (spec §6:
    /// "scanned with non-blocking iteration ... never a blocking `KEYS`").
    /// Used by the admin surface and cache-wide maintenance, never on the
    /// request path.
    pub async fn scan_all_keys(&self) -> Result<Vec<String>, CacheError> {
        let mut conn = self.conn.clone();
        let pattern = format!("{KEY_PREFIX}*");
        let mut cursor: u64 = 0;
        let mut keys = Vec::new();
        loop {
            let (next, batch): (u64, Vec<String>) =
                redis::cmd("SCAN").arg(cursor).arg("MATCH").arg(&pattern).arg("COUNT").arg(SCAN_BATCH).query_async(&mut conn).await?;
            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }
        Ok(keys)
    }

    /// Deletes every cached entry, in batches of at most `DELETE_BATCH`
    /// keys per round trip (spec §6 "Bulk deletes in batches of ≤100").
    pub async fn clear_all(&self) -> Result<usize, CacheError> {
        let keys = self.scan_all_keys().await?;
        let mut conn = self.conn.clone();
        let mut deleted = 0;
        for chunk in keys.chunks(DELETE_BATCH) {
            let count: usize = conn.del(chunk).await?;
            deleted += count;
        }
        debug!(deleted, "cleared cache");
        Ok(deleted)
    }

    pub async fn ping(&self) -> bool {
        let mut conn = self.conn.clone();
        redis::cmd("PING").query_async::<String>(&mut conn).await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_layout_matches_the_documented_namespace() {
        assert_eq!(key_for("8.8.8.8"), "ipintel:v1:8.8.8.8");
    }
}
