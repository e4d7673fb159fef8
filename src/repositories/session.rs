use std::sync::Arc;

use crate::error::Result;
use crate::models::session::{Session, timestamp_score};
use crate::store::{KeyValueStore, ScoreBound};

/// Key prefix for serialized session records.
pub const SESSION_PREFIX: &str = "session:";
/// Key prefix for per-user session id sets.
pub const USER_SESSIONS_PREFIX: &str = "user_sessions:";
/// Key of the global expiry index.
pub const EXPIRY_INDEX_KEY: &str = "session_cleanup";

/// Remaining lifetime of a stored record as seen by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordTtl {
    /// The record is gone.
    Missing,
    /// The record has no store-level expiry.
    Persistent,
    /// Milliseconds left before the store evicts the record.
    Millis(u64),
}

/// Maps session operations onto the three store namespaces.
#[derive(Clone)]
pub struct SessionRepository {
    store: Arc<dyn KeyValueStore>,
}

fn session_key(session_id: &str) -> String {
    format!("{}{}", SESSION_PREFIX, session_id)
}

fn user_sessions_key(user_id: &str) -> String {
    format!("{}{}", USER_SESSIONS_PREFIX, user_id)
}

impl SessionRepository {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Writes the serialized record with a store-level expiry of `ttl_ms`.
    pub async fn save_record(&self, session: &Session, ttl_ms: u64) -> Result<()> {
        let json = sonic_rs::to_string(session)?;
        self.store
            .set_ex(&session_key(&session.session_id), &json, ttl_ms)
            .await
    }

    /// Reads and decodes a record, if present.
    pub async fn load_record(&self, session_id: &str) -> Result<Option<Session>> {
        let Some(json) = self.store.get(&session_key(session_id)).await? else {
            return Ok(None);
        };
        Ok(Some(sonic_rs::from_str(&json)?))
    }

    pub async fn record_ttl(&self, session_id: &str) -> Result<RecordTtl> {
        let ttl = self.store.pttl(&session_key(session_id)).await?;
        Ok(match ttl {
            t if t >= 0 => RecordTtl::Millis(t as u64),
            crate::store::TTL_PERSISTENT => RecordTtl::Persistent,
            _ => RecordTtl::Missing,
        })
    }

    pub async fn delete_record(&self, session_id: &str) -> Result<()> {
        self.store.del(&session_key(session_id)).await
    }

    /// Adds the id to the user's set and rolls the set's expiry forward.
    pub async fn add_to_user(&self, user_id: &str, session_id: &str, ttl_seconds: i64) -> Result<()> {
        let key = user_sessions_key(user_id);
        self.store.sadd(&key, session_id).await?;
        self.store.expire(&key, ttl_seconds).await
    }

    pub async fn remove_from_user(&self, user_id: &str, session_id: &str) -> Result<()> {
        self.store.srem(&user_sessions_key(user_id), session_id).await
    }

    pub async fn user_session_ids(&self, user_id: &str) -> Result<Vec<String>> {
        self.store.smembers(&user_sessions_key(user_id)).await
    }

    pub async fn delete_user_set(&self, user_id: &str) -> Result<()> {
        self.store.del(&user_sessions_key(user_id)).await
    }

    pub async fn index_expiry(&self, session: &Session) -> Result<()> {
        self.store
            .zadd(EXPIRY_INDEX_KEY, &session.session_id, session.expiry_score())
            .await
    }

    pub async fn unindex(&self, session_id: &str) -> Result<()> {
        self.store.zrem(EXPIRY_INDEX_KEY, session_id).await
    }

    /// Ids whose indexed expiry is at or before `now`, soonest first.
    pub async fn expired_ids(&self, now: chrono::DateTime<chrono::Utc>) -> Result<Vec<String>> {
        self.store
            .zrange_by_score(
                EXPIRY_INDEX_KEY,
                ScoreBound::NegInf,
                ScoreBound::Inclusive(timestamp_score(now)),
            )
            .await
    }

    /// Drops every index entry expiring at or before `now`.
    pub async fn prune_index(&self, now: chrono::DateTime<chrono::Utc>) -> Result<u64> {
        self.store
            .zrem_range_by_score(
                EXPIRY_INDEX_KEY,
                ScoreBound::NegInf,
                ScoreBound::Inclusive(timestamp_score(now)),
            )
            .await
    }

    pub async fn index_size(&self) -> Result<u64> {
        self.store.zcard(EXPIRY_INDEX_KEY).await
    }

    /// Index entries expiring strictly after `now`.
    pub async fn index_count_after(&self, now: chrono::DateTime<chrono::Utc>) -> Result<u64> {
        self.store
            .zcount(
                EXPIRY_INDEX_KEY,
                ScoreBound::Exclusive(timestamp_score(now)),
                ScoreBound::PosInf,
            )
            .await
    }

    pub async fn ping(&self) -> Result<()> {
        self.store.ping().await
    }
}
