//! Best-effort event journal in Redis.
//!
//! Proctoring log entries and cross-verification outcomes are appended to
//! per-session Redis lists so reviewers on other nodes can read them. The
//! in-memory session is always the source of truth; journal failures are
//! logged and never reach the caller.

use anyhow::{Context, Result};
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use sentinel_common::{LogEntry, SentinelError};
use sentinel_common::constants::redis_keys;
use serde::Serialize;

/// Redis-backed journal; a no-op when no Redis is configured
#[derive(Clone)]
pub struct EventJournal {
    redis: Option<ConnectionManager>,
    ttl_secs: i64,
}

/// Outcome of one cross-verification pass
#[derive(Debug, Clone, Serialize)]
pub struct VerificationOutcome {
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub candidate_id: String,
    pub verified: bool,
    pub id_similarity: f64,
    pub live_similarity: f64,
    pub attempt: u32,
}

impl EventJournal {
    /// Journal that records nothing
    pub fn disabled() -> Self {
        Self {
            redis: None,
            ttl_secs: 0,
        }
    }

    /// Connect to Redis with connection manager (handles reconnection)
    pub async fn connect(redis_url: &str, ttl_secs: u64) -> Result<Self> {
        let client = redis::Client::open(redis_url).context("Failed to create Redis client")?;

        let redis = ConnectionManager::new(client)
            .await
            .context("Failed to connect to Redis")?;

        Ok(Self {
            redis: Some(redis),
            ttl_secs: ttl_secs as i64,
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.redis.is_some()
    }

    /// PING Redis. `None` when the journal is disabled.
    pub async fn ping(&self) -> Option<bool> {
        let mut conn = self.redis.clone()?;
        let result: Result<String, _> = redis::cmd("PING").query_async(&mut conn).await;
        Some(result.is_ok())
    }

    pub async fn record_log(&self, session_id: &str, entry: &LogEntry) {
        let key = format!("{}{}", redis_keys::PROCTOR_LOG_PREFIX, session_id);
        self.append(&key, entry).await;
    }

    pub async fn record_outcome(&self, session_id: &str, outcome: &VerificationOutcome) {
        let key = format!("{}{}", redis_keys::IDENTITY_OUTCOME_PREFIX, session_id);
        self.append(&key, outcome).await;
    }

    async fn append<V: Serialize>(&self, key: &str, value: &V) {
        let Some(mut conn) = self.redis.clone() else {
            return;
        };

        let payload = match serde_json::to_string(value) {
            Ok(p) => p,
            Err(e) => {
                tracing::error!(key = %key, error = %e, "Failed to serialize journal entry");
                return;
            }
        };

        let result: redis::RedisResult<()> = async {
            let _: i64 = conn.rpush(key, payload).await?;
            let _: bool = conn.expire(key, self.ttl_secs).await?;
            Ok(())
        }
        .await;

        if let Err(e) = result {
            let error = SentinelError::Redis(e.to_string());
            tracing::warn!(
                key = %key,
                error = %error,
                retryable = error.is_retryable(),
                "Failed to append to event journal"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentinel_common::AlertKind;

    #[tokio::test]
    async fn test_disabled_journal_is_noop() {
        let journal = EventJournal::disabled();
        assert!(!journal.is_enabled());
        assert_eq!(journal.ping().await, None);

        let entry = LogEntry {
            timestamp: chrono::Utc::now(),
            kind: AlertKind::Warning,
            reason: "Tab visibility change: blur".to_string(),
        };
        journal.record_log("s1", &entry).await;
    }
}
