//! The session store abstraction and its in-memory backend.
//!
//! Session records live in an external key-value store — the transport is an
//! external collaborator, so the state machine only sees the [`SessionStore`]
//! trait: existence check, read, write-with-TTL, and an atomic bump of the
//! failed-attempt counter. All operations are keyed by [`SessionId`] and laid
//! out as `<namespace>.gatehouse-auth.<id>` so tenants can share one backend.
//!
//! [`MemoryStore`] is the in-process implementation: a [`DashMap`] with lazy
//! TTL expiry, in the spirit of the project's other in-memory engines. A
//! Redis-class backend implements the same trait out of tree (the record's
//! serde derives define the JSON it would hold).
//!
//! # Object safety
//!
//! The trait uses `#[async_trait]` so providers can hold `Arc<dyn
//! SessionStore>` when the backend is chosen at runtime.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::StoreError;
use crate::session::{SessionId, SessionRecord};

/// Fixed key-layout component identifying this provider's entries.
pub const STORE_COMPONENT: &str = "gatehouse-auth";

/// Key-value store holding one [`SessionRecord`] per session identifier.
///
/// Infrastructure failures surface as [`StoreError`]; they are never folded
/// into "no session".
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Whether a live record exists for `id`.
    async fn exists(&self, id: &SessionId) -> Result<bool, StoreError>;

    /// Read the record for `id`.
    ///
    /// An absent key reads as [`SessionRecord::default`]; callers treat empty
    /// fields as "no session", not as an error.
    async fn read(&self, id: &SessionId) -> Result<SessionRecord, StoreError>;

    /// Overwrite the record for `id` and reset its TTL.
    ///
    /// The write is atomic from the caller's perspective: no partial-write
    /// state is ever visible.
    async fn write(
        &self,
        id: &SessionId,
        record: &SessionRecord,
        ttl: Duration,
    ) -> Result<(), StoreError>;

    /// Atomically increment the failed-attempt counter and reset the TTL.
    ///
    /// Returns the new count. An absent key returns 0 without creating an
    /// entry. Backends must make this a single store-side operation so
    /// concurrent mismatches cannot race past the lockout threshold.
    async fn bump_failed_attempts(
        &self,
        id: &SessionId,
        ttl: Duration,
    ) -> Result<u32, StoreError>;
}

/// In-process [`SessionStore`] backed by a [`DashMap`].
///
/// Entries carry a deadline and are reaped lazily on access; a background
/// sweeper is unnecessary at the hit rates this backend is meant for
/// (development and tests).
#[derive(Debug, Default)]
pub struct MemoryStore {
    namespace: String,
    entries: DashMap<String, StoredEntry>,
}

#[derive(Debug)]
struct StoredEntry {
    record: SessionRecord,
    expires_at: Instant,
}

impl MemoryStore {
    /// Create a store with no namespace.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store whose keys are prefixed with `namespace`.
    #[must_use]
    pub fn with_namespace(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            entries: DashMap::new(),
        }
    }

    /// Full store key for a session identifier.
    fn key(&self, id: &SessionId) -> String {
        format!("{}.{STORE_COMPONENT}.{id}", self.namespace)
    }

    /// Clone the record under `key` if its deadline has not passed, reaping
    /// it otherwise.
    fn live_record(&self, key: &str) -> Option<SessionRecord> {
        let expired = match self.entries.get(key) {
            Some(entry) => {
                if entry.expires_at > Instant::now() {
                    return Some(entry.record.clone());
                }
                true
            }
            None => false,
        };

        // The read guard must be dropped before removal.
        if expired {
            self.entries.remove(key);
        }
        None
    }

    /// Number of live entries (test support).
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn exists(&self, id: &SessionId) -> Result<bool, StoreError> {
        Ok(self.live_record(&self.key(id)).is_some())
    }

    async fn read(&self, id: &SessionId) -> Result<SessionRecord, StoreError> {
        Ok(self.live_record(&self.key(id)).unwrap_or_default())
    }

    async fn write(
        &self,
        id: &SessionId,
        record: &SessionRecord,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        self.entries.insert(
            self.key(id),
            StoredEntry {
                record: record.clone(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn bump_failed_attempts(
        &self,
        id: &SessionId,
        ttl: Duration,
    ) -> Result<u32, StoreError> {
        let key = self.key(id);
        let now = Instant::now();

        let Some(mut entry) = self.entries.get_mut(&key) else {
            return Ok(0);
        };
        if entry.expires_at <= now {
            drop(entry);
            self.entries.remove(&key);
            return Ok(0);
        }

        entry.record.failed_attempts = entry.record.failed_attempts.saturating_add(1);
        entry.expires_at = now + ttl;
        Ok(entry.record.failed_attempts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(60);

    fn id(s: &str) -> SessionId {
        SessionId::new(s).unwrap()
    }

    fn record() -> SessionRecord {
        SessionRecord::started("secret".to_owned(), "seed".to_owned())
    }

    #[tokio::test]
    async fn test_should_read_default_record_for_absent_key() {
        let store = MemoryStore::new();
        assert!(!store.exists(&id("missing")).await.unwrap());
        assert!(store.read(&id("missing")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_should_read_back_written_record() {
        let store = MemoryStore::new();
        let written = record();
        store.write(&id("abc"), &written, TTL).await.unwrap();

        assert!(store.exists(&id("abc")).await.unwrap());
        assert_eq!(store.read(&id("abc")).await.unwrap(), written);
    }

    #[tokio::test]
    async fn test_should_expire_entry_after_ttl() {
        let store = MemoryStore::new();
        store
            .write(&id("abc"), &record(), Duration::ZERO)
            .await
            .unwrap();

        assert!(!store.exists(&id("abc")).await.unwrap());
        assert!(store.read(&id("abc")).await.unwrap().is_empty());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_should_overwrite_record_and_reset_ttl() {
        let store = MemoryStore::new();
        store.write(&id("abc"), &record(), TTL).await.unwrap();

        let renewed = SessionRecord::started("secret2".to_owned(), "seed2".to_owned());
        store.write(&id("abc"), &renewed, TTL).await.unwrap();

        assert_eq!(store.read(&id("abc")).await.unwrap(), renewed);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_should_bump_failed_attempts_atomically() {
        let store = MemoryStore::new();
        store.write(&id("abc"), &record(), TTL).await.unwrap();

        assert_eq!(store.bump_failed_attempts(&id("abc"), TTL).await.unwrap(), 1);
        assert_eq!(store.bump_failed_attempts(&id("abc"), TTL).await.unwrap(), 2);
        assert_eq!(store.read(&id("abc")).await.unwrap().failed_attempts, 2);
    }

    #[tokio::test]
    async fn test_should_not_create_entry_when_bumping_absent_key() {
        let store = MemoryStore::new();
        assert_eq!(store.bump_failed_attempts(&id("abc"), TTL).await.unwrap(), 0);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_should_isolate_namespaces() {
        let tenant_a = MemoryStore::with_namespace("a");
        tenant_a.write(&id("abc"), &record(), TTL).await.unwrap();

        // Same identifier under a different namespace maps to a different key.
        let tenant_b = MemoryStore::with_namespace("b");
        assert!(!tenant_b.exists(&id("abc")).await.unwrap());
        assert_eq!(tenant_a.key(&id("abc")), "a.gatehouse-auth.abc");
        assert_eq!(tenant_b.key(&id("abc")), "b.gatehouse-auth.abc");
    }
}
