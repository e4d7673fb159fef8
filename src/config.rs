use anyhow::{Context, Result};
use garde::Validate;
use std::env;
use std::str::FromStr;
use zeroize::Zeroizing;

/// The application's configuration.
#[derive(Clone, Validate)]
pub struct Config {
    /// The Redis host.
    #[garde(length(min = 1))]
    pub redis_host: String,
    /// The Redis port.
    #[garde(range(min = 1))]
    pub redis_port: u16,
    /// The Redis password, if any.
    #[garde(skip)]
    pub redis_password: Option<Zeroizing<String>>,
    /// The Redis logical database index.
    #[garde(range(min = 0))]
    pub redis_db: i64,
    /// Default session lifetime in seconds.
    #[garde(range(min = 1))]
    pub session_ttl_seconds: u64,
    /// Maximum concurrent sessions per user; `0` means unlimited.
    #[garde(skip)]
    pub max_sessions_per_user: usize,
    /// Seconds between cleanup sweeps.
    #[garde(range(min = 1))]
    pub cleanup_interval_seconds: u64,
    /// Default log filter when `RUST_LOG` is unset.
    #[garde(length(min = 1))]
    pub log_level: String,
    /// Connection establishment timeout in milliseconds.
    #[garde(range(min = 1))]
    pub connect_timeout_ms: u64,
    /// Per-command response timeout in milliseconds.
    #[garde(range(min = 1))]
    pub response_timeout_ms: u64,
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid {}", name)),
        None => Ok(default),
    }
}

impl Config {
    /// Creates a new `Config` from environment variables, loading `.env` first.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `Config`.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds a `Config` from an arbitrary variable source.
    ///
    /// `REDIS_URL`, when present, overrides host, port, password and db.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self {
            redis_host: lookup("REDIS_HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            redis_port: parse_or(&lookup, "REDIS_PORT", 6379)?,
            redis_password: lookup("REDIS_PASSWORD")
                .filter(|p| !p.is_empty())
                .map(Zeroizing::new),
            redis_db: parse_or(&lookup, "REDIS_DB", 0)?,
            session_ttl_seconds: parse_or(&lookup, "SESSION_TTL_SECONDS", 3600)?,
            max_sessions_per_user: parse_or(&lookup, "MAX_SESSIONS_PER_USER", 0)?,
            cleanup_interval_seconds: parse_or(&lookup, "CLEANUP_INTERVAL_SECONDS", 300)?,
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            connect_timeout_ms: parse_or(&lookup, "REDIS_CONNECT_TIMEOUT_MS", 2000)?,
            response_timeout_ms: parse_or(&lookup, "REDIS_RESPONSE_TIMEOUT_MS", 1000)?,
        };

        if let Some(url) = lookup("REDIS_URL") {
            config.apply_redis_url(&url)?;
        }

        config
            .validate()
            .map_err(|report| anyhow::anyhow!("Invalid configuration: {}", report))?;

        Ok(config)
    }

    fn apply_redis_url(&mut self, url: &str) -> Result<()> {
        let parsed = redis::parse_redis_url(url)
            .with_context(|| "REDIS_URL must be a valid redis:// URL".to_string())?;

        if let Some(host) = parsed.host_str() {
            self.redis_host = host.trim_start_matches('[').trim_end_matches(']').to_string();
        }
        if let Some(port) = parsed.port() {
            self.redis_port = port;
        }
        if let Some(password) = parsed.password() {
            self.redis_password = Some(Zeroizing::new(password.to_string()));
        }
        let db = parsed.path().trim_start_matches('/');
        if !db.is_empty() {
            self.redis_db = db.parse().context("REDIS_URL database must be a number")?;
        }
        Ok(())
    }

    /// The connection URL, including the password when one is configured.
    pub fn redis_url(&self) -> Zeroizing<String> {
        let auth = match &self.redis_password {
            Some(password) => format!(":{}@", password.as_str()),
            None => String::new(),
        };
        Zeroizing::new(format!(
            "redis://{}{}:{}/{}",
            auth, self.redis_host, self.redis_port, self.redis_db
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.redis_host, "127.0.0.1");
        assert_eq!(config.redis_port, 6379);
        assert_eq!(config.redis_db, 0);
        assert!(config.redis_password.is_none());
        assert_eq!(config.session_ttl_seconds, 3600);
        assert_eq!(config.max_sessions_per_user, 0);
        assert_eq!(config.cleanup_interval_seconds, 300);
        assert_eq!(config.redis_url().as_str(), "redis://127.0.0.1:6379/0");
    }

    #[test]
    fn explicit_parts_build_the_url() {
        let config = config_from(&[
            ("REDIS_HOST", "cache.internal"),
            ("REDIS_PORT", "6380"),
            ("REDIS_PASSWORD", "hunter2"),
            ("REDIS_DB", "3"),
        ])
        .unwrap();
        assert_eq!(config.redis_url().as_str(), "redis://:hunter2@cache.internal:6380/3");
    }

    #[test]
    fn redis_url_overrides_parts() {
        let config = config_from(&[
            ("REDIS_HOST", "ignored"),
            ("REDIS_URL", "redis://:s3cret@db.example:7000/5"),
        ])
        .unwrap();
        assert_eq!(config.redis_host, "db.example");
        assert_eq!(config.redis_port, 7000);
        assert_eq!(config.redis_db, 5);
        assert_eq!(config.redis_password.as_deref().map(String::as_str), Some("s3cret"));
    }

    #[test]
    fn rejects_garbage_and_out_of_range_values() {
        assert!(config_from(&[("SESSION_TTL_SECONDS", "soon")]).is_err());
        assert!(config_from(&[("SESSION_TTL_SECONDS", "0")]).is_err());
        assert!(config_from(&[("CLEANUP_INTERVAL_SECONDS", "0")]).is_err());
        assert!(config_from(&[("REDIS_URL", "not a url")]).is_err());
    }
}
