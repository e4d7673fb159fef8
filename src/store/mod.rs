//! Command surface of the backing key-value store.

pub mod memory;
pub mod redis_store;

use async_trait::async_trait;

use crate::error::Result;

pub use self::memory::MemoryStore;
pub use self::redis_store::RedisStore;

/// One end of a sorted-set score range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScoreBound {
    Inclusive(f64),
    Exclusive(f64),
    NegInf,
    PosInf,
}

impl ScoreBound {
    /// Renders the bound in Redis range syntax.
    pub fn to_redis_arg(self) -> String {
        match self {
            ScoreBound::Inclusive(v) => v.to_string(),
            ScoreBound::Exclusive(v) => format!("({}", v),
            ScoreBound::NegInf => "-inf".to_string(),
            ScoreBound::PosInf => "+inf".to_string(),
        }
    }

    fn admits_as_min(self, score: f64) -> bool {
        match self {
            ScoreBound::Inclusive(v) => score >= v,
            ScoreBound::Exclusive(v) => score > v,
            ScoreBound::NegInf => true,
            ScoreBound::PosInf => false,
        }
    }

    fn admits_as_max(self, score: f64) -> bool {
        match self {
            ScoreBound::Inclusive(v) => score <= v,
            ScoreBound::Exclusive(v) => score < v,
            ScoreBound::NegInf => false,
            ScoreBound::PosInf => true,
        }
    }

    /// Whether `score` lies within `[min, max]` as bounded.
    pub fn contains(min: ScoreBound, max: ScoreBound, score: f64) -> bool {
        min.admits_as_min(score) && max.admits_as_max(score)
    }
}

/// Remaining lifetime reported by [`KeyValueStore::pttl`] for a missing key.
pub const TTL_MISSING: i64 = -2;
/// Remaining lifetime reported by [`KeyValueStore::pttl`] for a key without expiry.
pub const TTL_PERSISTENT: i64 = -1;

/// The narrow set of store commands the session layer relies on.
///
/// Every call is an independent command; nothing here is transactional.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Sets `key` to `value`, expiring after `ttl_ms` milliseconds.
    async fn set_ex(&self, key: &str, value: &str, ttl_ms: u64) -> Result<()>;
    async fn get(&self, key: &str) -> Result<Option<String>>;
    /// Remaining lifetime in milliseconds, or [`TTL_MISSING`] / [`TTL_PERSISTENT`].
    async fn pttl(&self, key: &str) -> Result<i64>;
    async fn del(&self, key: &str) -> Result<()>;

    async fn sadd(&self, key: &str, member: &str) -> Result<()>;
    async fn srem(&self, key: &str, member: &str) -> Result<()>;
    async fn smembers(&self, key: &str) -> Result<Vec<String>>;
    async fn expire(&self, key: &str, seconds: i64) -> Result<()>;

    async fn zadd(&self, key: &str, member: &str, score: f64) -> Result<()>;
    async fn zrem(&self, key: &str, member: &str) -> Result<()>;
    async fn zrange_by_score(&self, key: &str, min: ScoreBound, max: ScoreBound) -> Result<Vec<String>>;
    /// Removes every member scored within the range and returns how many went.
    async fn zrem_range_by_score(&self, key: &str, min: ScoreBound, max: ScoreBound) -> Result<u64>;
    async fn zcount(&self, key: &str, min: ScoreBound, max: ScoreBound) -> Result<u64>;
    async fn zcard(&self, key: &str) -> Result<u64>;

    /// Round-trips a no-op command to check connectivity.
    async fn ping(&self) -> Result<()>;
}
