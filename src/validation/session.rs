use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::ValidationError;
use crate::models::session::{Metadata, Session};

/// The maximum length of a user id.
pub const MAX_USER_ID_LEN: usize = 255;
/// The recommended upper bound for serialized metadata, in bytes.
pub const MAX_METADATA_BYTES: usize = 1024;
/// Substrings that suggest a metadata key is holding a credential.
const SENSITIVE_KEY_FRAGMENTS: [&str; 4] = ["password", "token", "secret", "key"];

/// Validates a user id.
///
/// # Arguments
///
/// * `user_id` - The user id to validate.
///
/// # Returns
///
/// A `Result<(), ValidationError>` indicating whether the user id is valid.
pub fn validate_user_id(user_id: &str) -> Result<(), ValidationError> {
    if user_id.is_empty() {
        return Err(ValidationError::InvalidUserId(
            "User ID cannot be empty".to_string(),
        ));
    }

    if user_id.chars().count() > MAX_USER_ID_LEN {
        return Err(ValidationError::InvalidUserId(format!(
            "User ID must be at most {} characters",
            MAX_USER_ID_LEN
        )));
    }

    if !user_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(ValidationError::InvalidUserId(
            "User ID can only contain letters, numbers, underscores, and hyphens".to_string(),
        ));
    }

    Ok(())
}

/// Validates a session id.
///
/// # Arguments
///
/// * `session_id` - The session id to validate.
///
/// # Returns
///
/// A `Result<(), ValidationError>` indicating whether the session id is a UUID.
pub fn validate_session_id(session_id: &str) -> Result<(), ValidationError> {
    Uuid::parse_str(session_id)
        .map(|_| ())
        .map_err(|_| ValidationError::InvalidSessionId("Session ID must be a valid UUID".to_string()))
}

/// Validates a session record.
///
/// Fields are checked in declaration order and the first violation is returned.
/// Metadata is not checked here; see [`validate_metadata`].
pub fn validate(session: &Session) -> Result<&Session, ValidationError> {
    let outcome = validate_user_id(&session.user_id)
        .and_then(|_| validate_session_id(&session.session_id))
        .and_then(|_| {
            if session.expires_at <= session.created_at {
                Err(ValidationError::InvalidExpiry)
            } else {
                Ok(())
            }
        })
        .and_then(|_| {
            if session.last_activity < session.created_at {
                Err(ValidationError::InvalidActivity)
            } else {
                Ok(())
            }
        });

    match outcome {
        Ok(()) => {
            tracing::debug!("Session validation passed for user {}", session.user_id);
            Ok(session)
        }
        Err(e) => {
            tracing::warn!("Session validation failed: {}", e);
            Err(e)
        }
    }
}

/// Checks metadata against advisory limits.
///
/// Never fails; returns one warning per issue found (oversized payload,
/// keys that look like credentials).
pub fn validate_metadata(metadata: &Metadata) -> Vec<String> {
    let mut warnings = Vec::new();

    let size = sonic_rs::to_string(metadata).map(|s| s.len()).unwrap_or(0);
    if size > MAX_METADATA_BYTES {
        warnings.push(format!(
            "Metadata size exceeds recommended limit of 1KB ({} bytes)",
            size
        ));
    }

    for key in metadata.keys() {
        let lowered = key.to_lowercase();
        if SENSITIVE_KEY_FRAGMENTS.iter().any(|s| lowered.contains(s)) {
            warnings.push(format!("Metadata contains potentially sensitive key: {}", key));
        }
    }

    for warning in &warnings {
        tracing::warn!("{}", warning);
    }

    warnings
}

/// True iff `now` is past the session's expiry.
pub fn is_expired(session: &Session, now: DateTime<Utc>) -> bool {
    now > session.expires_at
}

/// Remaining lifetime in whole seconds, never negative.
pub fn remaining_ttl(session: &Session, now: DateTime<Utc>) -> i64 {
    (session.expires_at - now).num_seconds().max(0)
}

/// True iff the session has been idle for longer than `max_idle`.
pub fn is_stale(session: &Session, now: DateTime<Utc>, max_idle: chrono::Duration) -> bool {
    now - session.last_activity > max_idle
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::session::MetadataValue;
    use chrono::Duration;

    fn session_at(now: DateTime<Utc>) -> Session {
        Session::new("user_1", 60, Metadata::new(), now).unwrap()
    }

    #[test]
    fn accepts_fresh_session() {
        let session = session_at(Utc::now());
        assert!(validate(&session).is_ok());
    }

    #[test]
    fn rejects_bad_user_ids() {
        for bad in ["", "user 1", "user/1", "usér"] {
            assert!(
                matches!(validate_user_id(bad), Err(ValidationError::InvalidUserId(_))),
                "expected {:?} to be rejected",
                bad
            );
        }
    }

    #[test]
    fn user_id_length_boundary() {
        assert!(validate_user_id(&"a".repeat(255)).is_ok());
        assert!(validate_user_id(&"a".repeat(256)).is_err());
        assert!(validate_user_id("Ab-9_z").is_ok());
    }

    #[test]
    fn rejects_non_uuid_session_id() {
        let mut session = session_at(Utc::now());
        session.session_id = "test_session".to_string();
        assert!(matches!(
            validate(&session),
            Err(ValidationError::InvalidSessionId(_))
        ));
    }

    #[test]
    fn expiry_must_be_strictly_after_creation() {
        let now = Utc::now();
        let mut session = session_at(now);

        session.expires_at = session.created_at;
        assert_eq!(validate(&session).unwrap_err(), ValidationError::InvalidExpiry);

        session.expires_at = session.created_at + Duration::seconds(1);
        assert!(validate(&session).is_ok());
    }

    #[test]
    fn activity_cannot_precede_creation() {
        let now = Utc::now();
        let mut session = session_at(now);

        session.last_activity = now - Duration::milliseconds(1);
        assert_eq!(validate(&session).unwrap_err(), ValidationError::InvalidActivity);

        session.last_activity = now;
        assert!(validate(&session).is_ok());
    }

    #[test]
    fn first_violation_wins() {
        let now = Utc::now();
        let mut session = session_at(now);
        session.user_id = String::new();
        session.expires_at = now;
        assert!(matches!(
            validate(&session),
            Err(ValidationError::InvalidUserId(_))
        ));
    }

    #[test]
    fn metadata_warnings_are_advisory() {
        let mut metadata = Metadata::new();
        metadata.insert("ip".into(), "10.0.0.1".into());
        assert!(validate_metadata(&metadata).is_empty());

        metadata.insert("API_Key".into(), "abc".into());
        metadata.insert("refresh_token".into(), "xyz".into());
        let warnings = validate_metadata(&metadata);
        assert_eq!(warnings.len(), 2);
        assert!(warnings.iter().all(|w| w.contains("sensitive")));
    }

    #[test]
    fn oversized_metadata_is_flagged() {
        let mut metadata = Metadata::new();
        metadata.insert("blob".into(), MetadataValue::String("x".repeat(2048)));
        let warnings = validate_metadata(&metadata);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("1KB"));
    }

    #[test]
    fn temporal_helpers() {
        let now = Utc::now();
        let session = session_at(now);

        assert!(!is_expired(&session, now));
        assert!(!is_expired(&session, session.expires_at));
        assert!(is_expired(&session, session.expires_at + Duration::seconds(1)));

        assert_eq!(remaining_ttl(&session, now), 60);
        assert_eq!(remaining_ttl(&session, now + Duration::seconds(90)), 0);

        let idle = Duration::seconds(30);
        assert!(!is_stale(&session, now + Duration::seconds(30), idle));
        assert!(is_stale(&session, now + Duration::seconds(31), idle));
    }
}
