//! Session identifier and record types.

use std::fmt;

use chrono::{DateTime, Utc};

/// Client-supplied opaque token naming a session record.
///
/// Identifiers are non-empty and alphanumeric; anything else is treated as
/// "no identifier" by the header parser. Uniqueness is not enforced here —
/// collisions are the caller's risk.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct SessionId(String);

impl SessionId {
    /// Create a session identifier, rejecting empty or non-alphanumeric input.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Option<Self> {
        let id = id.into();
        if id.is_empty() || !id.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return None;
        }
        Some(Self(id))
    }

    /// Get the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The value stored per session identifier.
///
/// Owned exclusively by its store entry, mutated only by the state machine,
/// destroyed by store TTL expiry or overwrite on renewal. Absent keys read as
/// the default record; callers treat empty fields as "no session".
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SessionRecord {
    /// Server-held secret verifying the next session-bound request.
    pub session_secret: String,
    /// Public rotating value echoed to the client in the response header.
    pub key_seed: String,
    /// RFC 3339 creation timestamp. An unparseable value counts as expired.
    pub created_at: String,
    /// Consecutive failed session authentication attempts.
    pub failed_attempts: u32,
}

impl SessionRecord {
    /// Create a record for a freshly started session.
    #[must_use]
    pub fn started(session_secret: String, key_seed: String) -> Self {
        Self {
            session_secret,
            key_seed,
            created_at: Utc::now().to_rfc3339(),
            failed_attempts: 0,
        }
    }

    /// Whether this is the empty record an absent key reads as.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.session_secret.is_empty()
    }

    /// Parse the creation timestamp.
    #[must_use]
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.created_at)
            .ok()
            .map(|t| t.with_timezone(&Utc))
    }

    /// Whether the session has outlived `session_ttl` seconds at `now`.
    ///
    /// A timestamp that fails to parse counts as expired: the fail-safe
    /// direction is re-authentication, not silent acceptance.
    #[must_use]
    pub fn is_expired(&self, session_ttl: u64, now: DateTime<Utc>) -> bool {
        let Some(created) = self.created_at() else {
            return true;
        };
        let deadline = i64::try_from(session_ttl)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .and_then(|ttl| created.checked_add_signed(ttl));
        match deadline {
            Some(deadline) => deadline < now,
            // A TTL too large to represent can never be outlived.
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_accept_alphanumeric_identifier() {
        let id = SessionId::new("id123").unwrap();
        assert_eq!(id.as_str(), "id123");
    }

    #[test]
    fn test_should_reject_empty_identifier() {
        assert!(SessionId::new("").is_none());
    }

    #[test]
    fn test_should_reject_non_alphanumeric_identifier() {
        assert!(SessionId::new("id-123").is_none());
        assert!(SessionId::new("id:123").is_none());
        assert!(SessionId::new("id 123").is_none());
    }

    #[test]
    fn test_should_start_record_with_zero_failed_attempts() {
        let record = SessionRecord::started("secret".to_owned(), "seed".to_owned());
        assert_eq!(record.failed_attempts, 0);
        assert!(!record.is_empty());
        assert!(record.created_at().is_some());
    }

    #[test]
    fn test_should_treat_default_record_as_empty() {
        assert!(SessionRecord::default().is_empty());
    }

    #[test]
    fn test_should_expire_past_ttl() {
        let record = SessionRecord {
            created_at: "2024-01-01T00:00:00+00:00".to_owned(),
            ..SessionRecord::default()
        };
        let now = DateTime::parse_from_rfc3339("2024-01-01T02:00:00+00:00")
            .unwrap()
            .with_timezone(&Utc);
        assert!(record.is_expired(3600, now));
        assert!(!record.is_expired(7201, now));
    }

    #[test]
    fn test_should_treat_unparseable_timestamp_as_expired() {
        let record = SessionRecord {
            created_at: "not a timestamp".to_owned(),
            ..SessionRecord::default()
        };
        assert!(record.is_expired(3600, Utc::now()));
    }
}
