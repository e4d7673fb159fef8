use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use serde::Serialize;
use std::sync::Arc;

use crate::error::{Result, SessionError};
use crate::models::session::{Metadata, Session};
use crate::repositories::session::{RecordTtl, SessionRepository};
use crate::store::KeyValueStore;
use crate::validation::session as validator;

/// Aggregate counts taken from the global expiry index.
///
/// These reflect the index, not the live records: entries whose record was
/// evicted natively keep counting until the next cleanup sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    #[serde(rename = "total_sessions")]
    pub total: u64,
    #[serde(rename = "active_sessions")]
    pub active: u64,
    #[serde(rename = "expired_sessions")]
    pub expired: u64,
}

/// Creates, reads, invalidates and sweeps sessions.
///
/// Each operation is a short sequence of independent store commands. Nothing
/// is wrapped in a transaction, so a failure between commands can leave the
/// user set or the expiry index pointing at a missing record; the cleanup
/// sweep reconciles the index.
#[derive(Clone)]
pub struct SessionManager {
    repo: SessionRepository,
    max_sessions_per_user: usize,
}

impl SessionManager {
    /// Creates a manager with no per-user session cap.
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            repo: SessionRepository::new(store),
            max_sessions_per_user: 0,
        }
    }

    /// Caps how many sessions a user may hold at once. `0` disables the cap.
    pub fn with_session_limit(mut self, max_sessions_per_user: usize) -> Self {
        self.max_sessions_per_user = max_sessions_per_user;
        self
    }

    /// Creates a session for `user_id` living `ttl_seconds`.
    ///
    /// The record is validated before anything is written. Metadata warnings are
    /// logged but never reject the call.
    ///
    /// # Returns
    ///
    /// A `Result` containing the stored `Session`.
    pub async fn create(&self, user_id: &str, ttl_seconds: u64, metadata: Metadata) -> Result<Session> {
        let session = Session::new(user_id, ttl_seconds, metadata, Utc::now())?;
        validator::validate(&session)?;

        let warnings = validator::validate_metadata(&session.metadata);
        if !warnings.is_empty() {
            tracing::warn!(
                "⚠️ Session for user {} created with {} metadata warning(s)",
                user_id,
                warnings.len()
            );
        }

        if self.max_sessions_per_user > 0 {
            let held = self.repo.user_session_ids(user_id).await?.len();
            if held >= self.max_sessions_per_user {
                tracing::warn!(
                    "❌ User {} already holds {} sessions (limit {})",
                    user_id,
                    held,
                    self.max_sessions_per_user
                );
                return Err(SessionError::SessionLimitExceeded {
                    user_id: user_id.to_string(),
                    limit: self.max_sessions_per_user,
                });
            }
        }

        self.repo
            .save_record(&session, ttl_seconds.saturating_mul(1000))
            .await?;
        self.repo
            .add_to_user(
                user_id,
                &session.session_id,
                i64::try_from(ttl_seconds).unwrap_or(i64::MAX),
            )
            .await?;
        self.repo.index_expiry(&session).await?;

        tracing::info!(
            "✅ Session {} created for user {} (ttl {}s)",
            session.session_id,
            user_id,
            ttl_seconds
        );
        Ok(session)
    }

    /// Reads a session and refreshes its `last_activity`.
    ///
    /// The record is rewritten under its current remaining TTL, so a read never
    /// moves the expiry. Absent covers both "never existed" and "evicted".
    pub async fn get(&self, session_id: &str) -> Result<Option<Session>> {
        let Some(mut session) = self.repo.load_record(session_id).await? else {
            tracing::debug!("Session {} not found", session_id);
            return Ok(None);
        };
        validator::validate(&session)?;

        session.last_activity = Utc::now().max(session.created_at);

        match self.repo.record_ttl(session_id).await? {
            RecordTtl::Millis(0) | RecordTtl::Missing => {
                tracing::debug!("Session {} expired while being read", session_id);
                return Ok(None);
            }
            RecordTtl::Millis(remaining) => {
                self.repo.save_record(&session, remaining).await?;
            }
            RecordTtl::Persistent => {
                tracing::warn!("Session {} has no store expiry; activity not persisted", session_id);
            }
        }

        tracing::debug!("🔑 Session {} read for user {}", session_id, session.user_id);
        Ok(Some(session))
    }

    /// Removes a session and its index entries.
    ///
    /// # Returns
    ///
    /// `false` when there was nothing to invalidate.
    pub async fn invalidate(&self, session_id: &str) -> Result<bool> {
        let Some(session) = self.repo.load_record(session_id).await? else {
            return Ok(false);
        };

        self.repo.delete_record(session_id).await?;
        self.repo.unindex(session_id).await?;
        self.repo
            .remove_from_user(&session.user_id, session_id)
            .await?;

        tracing::info!("🗑️ Session {} invalidated for user {}", session_id, session.user_id);
        Ok(true)
    }

    /// Removes every session in the user's set, then the set itself.
    ///
    /// # Returns
    ///
    /// The number of ids processed.
    pub async fn invalidate_all_for_user(&self, user_id: &str) -> Result<usize> {
        let session_ids = self.repo.user_session_ids(user_id).await?;
        if session_ids.is_empty() {
            return Ok(0);
        }

        for session_id in &session_ids {
            self.repo.delete_record(session_id).await?;
            self.repo.unindex(session_id).await?;
        }
        self.repo.delete_user_set(user_id).await?;

        tracing::info!("🗑️ {} session(s) invalidated for user {}", session_ids.len(), user_id);
        Ok(session_ids.len())
    }

    /// Resolves every id in the user's set through [`SessionManager::get`],
    /// keeping the active ones. Order is unspecified.
    ///
    /// Records that fail to decode or validate are logged and left out; store
    /// failures abort the whole listing.
    pub async fn list_active_for_user(&self, user_id: &str) -> Result<Vec<Session>> {
        let session_ids = self.repo.user_session_ids(user_id).await?;
        let sessions = try_join_all(session_ids.iter().map(|id| async move {
            match self.get(id).await {
                Err(e) if !e.is_store_error() => {
                    tracing::warn!("⚠️ Skipping unreadable session {} of user {}: {}", id, user_id, e);
                    Ok(None)
                }
                other => other,
            }
        }))
        .await?;
        Ok(sessions
            .into_iter()
            .flatten()
            .filter(|s| s.is_active)
            .collect())
    }

    /// Invalidates every session whose indexed expiry is at or before `now`,
    /// then prunes index entries whose record had already been evicted.
    ///
    /// A record that cannot be decoded is skipped: its index entry is dropped
    /// and the record is left to expire natively. Store failures abort the sweep.
    ///
    /// # Returns
    ///
    /// The number of sessions actually invalidated.
    pub async fn cleanup_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let expired = self.repo.expired_ids(now).await?;

        let mut cleaned = 0;
        for session_id in &expired {
            match self.invalidate(session_id).await {
                Ok(true) => cleaned += 1,
                Ok(false) => {}
                Err(e) if e.is_store_error() => return Err(e),
                Err(e) => {
                    tracing::warn!("⚠️ Skipping undecodable session {} during cleanup: {}", session_id, e);
                    self.repo.unindex(session_id).await?;
                }
            }
        }

        let pruned = self.repo.prune_index(now).await?;

        tracing::info!(
            "🧹 Cleanup swept {} expired session(s), pruned {} orphaned index entries",
            cleaned,
            pruned
        );
        Ok(cleaned)
    }

    /// Index statistics as of now. Store failures degrade to zero counts.
    pub async fn stats(&self) -> SessionStats {
        self.stats_at(Utc::now()).await
    }

    /// Index statistics as of `now`. Store failures degrade to zero counts.
    pub async fn stats_at(&self, now: DateTime<Utc>) -> SessionStats {
        match self.try_stats_at(now).await {
            Ok(stats) => stats,
            Err(e) => {
                tracing::warn!("⚠️ Session stats unavailable: {}", e);
                SessionStats::default()
            }
        }
    }

    /// Index statistics as of now, surfacing store failures.
    pub async fn try_stats(&self) -> Result<SessionStats> {
        self.try_stats_at(Utc::now()).await
    }

    /// Index statistics as of `now`, surfacing store failures.
    pub async fn try_stats_at(&self, now: DateTime<Utc>) -> Result<SessionStats> {
        let total = self.repo.index_size().await?;
        let active = self.repo.index_count_after(now).await?;
        Ok(SessionStats {
            total,
            active,
            expired: total.saturating_sub(active),
        })
    }

    /// Checks that the backing store answers.
    pub async fn ping(&self) -> Result<()> {
        self.repo.ping().await
    }
}
