use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

use super::{KeyValueStore, ScoreBound, TTL_MISSING, TTL_PERSISTENT};
use crate::error::{Result, SessionError};

#[derive(Default)]
struct Inner {
    strings: HashMap<String, (String, Option<DateTime<Utc>>)>,
    sets: HashMap<String, (HashSet<String>, Option<DateTime<Utc>>)>,
    zsets: HashMap<String, HashMap<String, f64>>,
    clock_offset: Duration,
}

impl Inner {
    fn now(&self) -> DateTime<Utc> {
        Utc::now() + self.clock_offset
    }

    /// Drops strings and sets whose expiry has passed.
    fn evict_expired(&mut self) {
        let now = self.now();
        self.strings
            .retain(|_, (_, exp)| exp.is_none_or(|at| at > now));
        self.sets
            .retain(|_, (members, exp)| !members.is_empty() && exp.is_none_or(|at| at > now));
        self.zsets.retain(|_, members| !members.is_empty());
    }
}

/// In-process store with native per-key expiry.
///
/// Mirrors the Redis semantics the session layer depends on; the clock can be
/// moved forward with [`MemoryStore::advance`] and the store can be switched
/// into a failing mode with [`MemoryStore::set_unavailable`].
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
    unavailable: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves the store's clock forward, expiring whatever falls due.
    pub async fn advance(&self, by: Duration) {
        let mut inner = self.inner.write().await;
        inner.clock_offset += by;
        inner.evict_expired();
    }

    /// When set, every command fails as if the connection were down.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(SessionError::StoreUnavailable(redis::RedisError::from((
                redis::ErrorKind::IoError,
                "memory store marked unavailable",
            ))));
        }
        Ok(())
    }

    fn invalid_expire(command: &str) -> SessionError {
        SessionError::StoreUnavailable(redis::RedisError::from((
            redis::ErrorKind::ResponseError,
            "invalid expire time",
            command.to_string(),
        )))
    }

    async fn write(&self) -> Result<tokio::sync::RwLockWriteGuard<'_, Inner>> {
        self.check_available()?;
        let mut inner = self.inner.write().await;
        inner.evict_expired();
        Ok(inner)
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn set_ex(&self, key: &str, value: &str, ttl_ms: u64) -> Result<()> {
        let mut inner = self.write().await?;
        let expires = i64::try_from(ttl_ms)
            .ok()
            .filter(|ms| *ms > 0)
            .and_then(Duration::try_milliseconds)
            .and_then(|ttl| inner.now().checked_add_signed(ttl))
            .ok_or_else(|| Self::invalid_expire("psetex"))?;
        inner
            .strings
            .insert(key.to_string(), (value.to_string(), Some(expires)));
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let inner = self.write().await?;
        Ok(inner.strings.get(key).map(|(v, _)| v.clone()))
    }

    async fn pttl(&self, key: &str) -> Result<i64> {
        let inner = self.write().await?;
        let now = inner.now();
        let expiry = inner
            .strings
            .get(key)
            .map(|(_, exp)| *exp)
            .or_else(|| inner.sets.get(key).map(|(_, exp)| *exp));
        Ok(match expiry {
            None => TTL_MISSING,
            Some(None) => TTL_PERSISTENT,
            Some(Some(at)) => (at - now).num_milliseconds().max(0),
        })
    }

    async fn del(&self, key: &str) -> Result<()> {
        let mut inner = self.write().await?;
        inner.strings.remove(key);
        inner.sets.remove(key);
        inner.zsets.remove(key);
        Ok(())
    }

    async fn sadd(&self, key: &str, member: &str) -> Result<()> {
        let mut inner = self.write().await?;
        inner
            .sets
            .entry(key.to_string())
            .or_insert_with(|| (HashSet::new(), None))
            .0
            .insert(member.to_string());
        Ok(())
    }

    async fn srem(&self, key: &str, member: &str) -> Result<()> {
        let mut inner = self.write().await?;
        if let Some((members, _)) = inner.sets.get_mut(key) {
            members.remove(member);
            if members.is_empty() {
                inner.sets.remove(key);
            }
        }
        Ok(())
    }

    async fn smembers(&self, key: &str) -> Result<Vec<String>> {
        let inner = self.write().await?;
        Ok(inner
            .sets
            .get(key)
            .map(|(members, _)| members.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn expire(&self, key: &str, seconds: i64) -> Result<()> {
        let mut inner = self.write().await?;
        let at = Duration::try_seconds(seconds)
            .and_then(|ttl| inner.now().checked_add_signed(ttl))
            .ok_or_else(|| Self::invalid_expire("expire"))?;
        if let Some((_, exp)) = inner.strings.get_mut(key) {
            *exp = Some(at);
        }
        if let Some((_, exp)) = inner.sets.get_mut(key) {
            *exp = Some(at);
        }
        inner.evict_expired();
        Ok(())
    }

    async fn zadd(&self, key: &str, member: &str, score: f64) -> Result<()> {
        let mut inner = self.write().await?;
        inner
            .zsets
            .entry(key.to_string())
            .or_default()
            .insert(member.to_string(), score);
        Ok(())
    }

    async fn zrem(&self, key: &str, member: &str) -> Result<()> {
        let mut inner = self.write().await?;
        if let Some(members) = inner.zsets.get_mut(key) {
            members.remove(member);
        }
        Ok(())
    }

    async fn zrange_by_score(&self, key: &str, min: ScoreBound, max: ScoreBound) -> Result<Vec<String>> {
        let inner = self.write().await?;
        let mut hits: Vec<(&String, f64)> = inner
            .zsets
            .get(key)
            .map(|members| {
                members
                    .iter()
                    .filter(|(_, score)| ScoreBound::contains(min, max, **score))
                    .map(|(m, s)| (m, *s))
                    .collect()
            })
            .unwrap_or_default();
        hits.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(b.0)));
        Ok(hits.into_iter().map(|(m, _)| m.clone()).collect())
    }

    async fn zrem_range_by_score(&self, key: &str, min: ScoreBound, max: ScoreBound) -> Result<u64> {
        let mut inner = self.write().await?;
        let Some(members) = inner.zsets.get_mut(key) else {
            return Ok(0);
        };
        let before = members.len();
        members.retain(|_, score| !ScoreBound::contains(min, max, *score));
        Ok((before - members.len()) as u64)
    }

    async fn zcount(&self, key: &str, min: ScoreBound, max: ScoreBound) -> Result<u64> {
        let inner = self.write().await?;
        Ok(inner
            .zsets
            .get(key)
            .map(|members| {
                members
                    .values()
                    .filter(|score| ScoreBound::contains(min, max, **score))
                    .count() as u64
            })
            .unwrap_or(0))
    }

    async fn zcard(&self, key: &str) -> Result<u64> {
        let inner = self.write().await?;
        Ok(inner.zsets.get(key).map(|m| m.len() as u64).unwrap_or(0))
    }

    async fn ping(&self) -> Result<()> {
        self.check_available()
    }
}
