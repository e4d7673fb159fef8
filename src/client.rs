use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::error::Result;
use crate::services::session::{SessionManager, SessionStats};
use crate::store::RedisStore;

/// Non-secret view of the connection settings.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionInfo {
    pub host: String,
    pub port: u16,
    pub db: i64,
    pub has_password: bool,
}

/// Outcome of [`SessionClient::health_check`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct HealthReport {
    pub redis_connection: bool,
    pub ping: bool,
    pub session_stats: Option<SessionStats>,
    pub memory_usage: Option<BTreeMap<String, String>>,
    pub errors: Vec<String>,
}

impl HealthReport {
    /// True when Redis answered the ping. Stats or memory errors are reported
    /// in `errors` but do not make the store unreachable.
    pub fn is_reachable(&self) -> bool {
        self.ping
    }
}

/// Connects to Redis and exposes the session manager plus operational helpers.
///
/// Unlike the manager, the helpers here translate store failures into
/// boolean or empty results.
#[derive(Clone)]
pub struct SessionClient {
    store: RedisStore,
    manager: SessionManager,
    connection: ConnectionInfo,
    default_ttl_seconds: u64,
}

impl SessionClient {
    /// Creates a new `SessionClient`.
    ///
    /// # Arguments
    ///
    /// * `config` - The application's configuration.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `SessionClient`.
    pub async fn connect(config: &Config) -> Result<Self> {
        let store = RedisStore::connect(
            config.redis_url().as_str(),
            Duration::from_millis(config.connect_timeout_ms),
            Duration::from_millis(config.response_timeout_ms),
        )
        .await?;

        let manager = SessionManager::new(Arc::new(store.clone()))
            .with_session_limit(config.max_sessions_per_user);
        tracing::info!(
            "✅ Session manager ready on {}:{} db {}",
            config.redis_host,
            config.redis_port,
            config.redis_db
        );

        Ok(Self {
            store,
            manager,
            connection: ConnectionInfo {
                host: config.redis_host.clone(),
                port: config.redis_port,
                db: config.redis_db,
                has_password: config.redis_password.is_some(),
            },
            default_ttl_seconds: config.session_ttl_seconds,
        })
    }

    /// The underlying session manager.
    pub fn sessions(&self) -> &SessionManager {
        &self.manager
    }

    /// Session lifetime used when a caller does not pick one.
    pub fn default_ttl_seconds(&self) -> u64 {
        self.default_ttl_seconds
    }

    pub fn connection_info(&self) -> &ConnectionInfo {
        &self.connection
    }

    /// Tests the Redis connection.
    pub async fn ping(&self) -> bool {
        match self.manager.ping().await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("❌ Redis ping failed: {}", e);
                false
            }
        }
    }

    /// Full `INFO` output.
    pub async fn info(&self) -> Result<BTreeMap<String, String>> {
        self.store.info(None).await
    }

    /// `INFO memory` output.
    pub async fn memory_info(&self) -> Result<BTreeMap<String, String>> {
        self.store.info(Some("memory")).await
    }

    /// Session statistics; zeros when the store is unreachable.
    pub async fn session_stats(&self) -> SessionStats {
        self.manager.stats().await
    }

    /// Runs one cleanup sweep; `0` when the store is unreachable.
    pub async fn cleanup_expired_sessions(&self) -> usize {
        match self.manager.cleanup_expired(chrono::Utc::now()).await {
            Ok(cleaned) => cleaned,
            Err(e) => {
                tracing::error!("❌ Error cleaning up sessions: {}", e);
                0
            }
        }
    }

    /// Pings the store and gathers session and memory statistics.
    pub async fn health_check(&self) -> HealthReport {
        let mut report = HealthReport {
            redis_connection: true,
            ..HealthReport::default()
        };

        if self.ping().await {
            report.ping = true;
        } else {
            report.errors.push("Redis ping failed".to_string());
        }

        match self.manager.try_stats().await {
            Ok(stats) => report.session_stats = Some(stats),
            Err(e) => report
                .errors
                .push(format!("Failed to get session stats: {}", e)),
        }

        match self.memory_info().await {
            Ok(memory) => report.memory_usage = Some(memory),
            Err(e) => report
                .errors
                .push(format!("Failed to get memory info: {}", e)),
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reachability_follows_ping_only() {
        let mut report = HealthReport {
            redis_connection: true,
            ping: true,
            ..HealthReport::default()
        };
        assert!(report.is_reachable());

        report.errors.push("Failed to get memory info: timeout".to_string());
        assert!(report.is_reachable());

        report.ping = false;
        report.errors.push("Redis ping failed".to_string());
        assert!(!report.is_reachable());
    }

    #[test]
    fn report_serializes_with_stats_field_names() {
        let report = HealthReport {
            redis_connection: true,
            ping: true,
            session_stats: Some(SessionStats {
                total: 10,
                active: 8,
                expired: 2,
            }),
            ..HealthReport::default()
        };
        let json = sonic_rs::to_string(&report).unwrap();
        assert!(json.contains(r#""total_sessions":10"#));
        assert!(json.contains(r#""expired_sessions":2"#));
        assert!(json.contains(r#""memory_usage":null"#));
    }
}
