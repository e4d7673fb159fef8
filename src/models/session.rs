use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::error::ValidationError;

/// A single metadata value. Only primitive kinds are stored so the serialized
/// record stays readable by any consumer of the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl From<&str> for MetadataValue {
    fn from(v: &str) -> Self {
        MetadataValue::String(v.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(v: String) -> Self {
        MetadataValue::String(v)
    }
}

impl From<bool> for MetadataValue {
    fn from(v: bool) -> Self {
        MetadataValue::Bool(v)
    }
}

impl From<i64> for MetadataValue {
    fn from(v: i64) -> Self {
        MetadataValue::Integer(v)
    }
}

impl From<f64> for MetadataValue {
    fn from(v: f64) -> Self {
        MetadataValue::Float(v)
    }
}

/// Open key-value attributes attached to a session.
pub type Metadata = BTreeMap<String, MetadataValue>;

/// Represents a user session as persisted under `session:{session_id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Opaque unique identifier (UUID string).
    pub session_id: String,
    /// The principal owning this session.
    pub user_id: String,
    /// The timestamp when the session was created.
    pub created_at: DateTime<Utc>,
    /// The timestamp when the session expires.
    pub expires_at: DateTime<Utc>,
    /// Refreshed on every successful read.
    pub last_activity: DateTime<Utc>,
    /// Whether the session is still considered valid.
    #[serde(default = "default_active")]
    pub is_active: bool,
    /// Arbitrary attributes supplied at creation.
    #[serde(default)]
    pub metadata: Metadata,
}

fn default_active() -> bool {
    true
}

impl Session {
    /// Builds a fresh session for `user_id` expiring `ttl_seconds` from `now`.
    ///
    /// A new v4 UUID is generated and `created_at`/`last_activity` are both `now`.
    /// Fails with `InvalidExpiry` when `now + ttl_seconds` is not representable.
    pub fn new(
        user_id: impl Into<String>,
        ttl_seconds: u64,
        metadata: Metadata,
        now: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        let expires_at = i64::try_from(ttl_seconds)
            .ok()
            .and_then(Duration::try_seconds)
            .and_then(|ttl| now.checked_add_signed(ttl))
            .ok_or(ValidationError::InvalidExpiry)?;
        Ok(Self {
            session_id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            created_at: now,
            expires_at,
            last_activity: now,
            is_active: true,
            metadata,
        })
    }

    /// The sortable score used in the global expiry index: Unix seconds with
    /// millisecond fraction, rounded up so that `expiry_score() <= timestamp_score(now)`
    /// implies `expires_at <= now`.
    pub fn expiry_score(&self) -> f64 {
        let mut millis = self.expires_at.timestamp_millis();
        if self.expires_at.timestamp_subsec_nanos() % 1_000_000 != 0 {
            millis += 1;
        }
        millis as f64 / 1000.0
    }
}

/// Converts a point in time into an expiry-index score, truncated to the millisecond.
pub fn timestamp_score(at: DateTime<Utc>) -> f64 {
    at.timestamp_millis() as f64 / 1000.0
}
