use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use std::collections::BTreeMap;
use std::time::Duration;

use super::{KeyValueStore, ScoreBound};
use crate::error::Result;

/// Redis-backed store using a pooled, auto-reconnecting connection manager.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    /// Opens a connection manager for `url`.
    ///
    /// # Arguments
    ///
    /// * `url` - A `redis://` URL.
    /// * `connect_timeout` - Upper bound for establishing a connection.
    /// * `response_timeout` - Upper bound for a single command round trip.
    pub async fn connect(url: &str, connect_timeout: Duration, response_timeout: Duration) -> Result<Self> {
        let client = redis::Client::open(url)?;
        let config = ConnectionManagerConfig::new()
            .set_connection_timeout(connect_timeout)
            .set_response_timeout(response_timeout);
        let conn = ConnectionManager::new_with_config(client, config).await?;
        tracing::info!("✅ Redis Connection Manager initialized");
        Ok(Self { conn })
    }

    /// Wraps an existing connection manager.
    pub fn from_manager(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    /// Runs `INFO [section]` and parses the `field:value` lines.
    pub async fn info(&self, section: Option<&str>) -> Result<BTreeMap<String, String>> {
        let mut cmd = redis::cmd("INFO");
        if let Some(section) = section {
            cmd.arg(section);
        }
        let raw: String = cmd.query_async(&mut self.conn.clone()).await?;
        Ok(parse_info(&raw))
    }
}

/// Parses the text body of an `INFO` reply, skipping comments and blank lines.
fn parse_info(raw: &str) -> BTreeMap<String, String> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn set_ex(&self, key: &str, value: &str, ttl_ms: u64) -> Result<()> {
        let _: () = self.conn.clone().pset_ex(key, value, ttl_ms).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.conn.clone().get(key).await?)
    }

    async fn pttl(&self, key: &str) -> Result<i64> {
        Ok(self.conn.clone().pttl(key).await?)
    }

    async fn del(&self, key: &str) -> Result<()> {
        let _: () = self.conn.clone().del(key).await?;
        Ok(())
    }

    async fn sadd(&self, key: &str, member: &str) -> Result<()> {
        let _: () = self.conn.clone().sadd(key, member).await?;
        Ok(())
    }

    async fn srem(&self, key: &str, member: &str) -> Result<()> {
        let _: () = self.conn.clone().srem(key, member).await?;
        Ok(())
    }

    async fn smembers(&self, key: &str) -> Result<Vec<String>> {
        Ok(self.conn.clone().smembers(key).await?)
    }

    async fn expire(&self, key: &str, seconds: i64) -> Result<()> {
        let _: () = self.conn.clone().expire(key, seconds).await?;
        Ok(())
    }

    async fn zadd(&self, key: &str, member: &str, score: f64) -> Result<()> {
        let _: () = self.conn.clone().zadd(key, member, score).await?;
        Ok(())
    }

    async fn zrem(&self, key: &str, member: &str) -> Result<()> {
        let _: () = self.conn.clone().zrem(key, member).await?;
        Ok(())
    }

    async fn zrange_by_score(&self, key: &str, min: ScoreBound, max: ScoreBound) -> Result<Vec<String>> {
        Ok(self
            .conn
            .clone()
            .zrangebyscore(key, min.to_redis_arg(), max.to_redis_arg())
            .await?)
    }

    async fn zrem_range_by_score(&self, key: &str, min: ScoreBound, max: ScoreBound) -> Result<u64> {
        Ok(self
            .conn
            .clone()
            .zrembyscore(key, min.to_redis_arg(), max.to_redis_arg())
            .await?)
    }

    async fn zcount(&self, key: &str, min: ScoreBound, max: ScoreBound) -> Result<u64> {
        Ok(self
            .conn
            .clone()
            .zcount(key, min.to_redis_arg(), max.to_redis_arg())
            .await?)
    }

    async fn zcard(&self, key: &str) -> Result<u64> {
        Ok(self.conn.clone().zcard(key).await?)
    }

    async fn ping(&self) -> Result<()> {
        let _: String = redis::cmd("PING").query_async(&mut self.conn.clone()).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn info_lines_become_fields() {
        let raw = "# Memory\r\nused_memory:1024\r\nused_memory_human:1.00K\r\n\r\nmaxmemory_policy:noeviction\r\n";
        let info = parse_info(raw);
        assert_eq!(info.len(), 3);
        assert_eq!(info.get("used_memory").map(String::as_str), Some("1024"));
        assert_eq!(info.get("used_memory_human").map(String::as_str), Some("1.00K"));
    }
}
