//! The authentication state machine.
//!
//! [`AuthProvider`] makes the per-request decision: accept, start a new
//! session, reject, or report a timeout. Conceptually a request moves through
//! one of four states recomputed on every call — no session, session present,
//! session expired, locked out — and the outcome is the closed [`Decision`]
//! sum type, so callers handle every case exhaustively.
//!
//! # Decision flow
//!
//! 1. Excluded paths bypass authentication entirely.
//! 2. With session mode off, a request authenticates one-shot against the
//!    shared secret; the store is never touched.
//! 3. With session mode on, an unknown identifier starts a session; a known
//!    identifier must present a valid session token, which rotates the
//!    session credentials, while mismatches count toward lockout.
//!
//! Every successful start or renewal issues a brand-new secret/seed pair: a
//! session secret is single-use per authentication round, so a leaked seed is
//! only good for one round.

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use subtle::ConstantTimeEq;
use tracing::{debug, warn};

use gatehouse_auth::{CredentialDeriver, SessionKeys, Sha1Deriver, auth_material};

use crate::config::AuthConfig;
use crate::error::StoreError;
use crate::session::{SessionId, SessionRecord};
use crate::store::SessionStore;

/// An authorization header already split into its identifier and token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedAuthHeader {
    /// The session identifier from the prefix before the colon.
    pub session_id: SessionId,
    /// The (possibly empty) token after the colon.
    pub token: String,
}

/// The five request-bound inputs the state machine decides on.
///
/// Header parsing belongs to the request adapter; by the time a request
/// reaches the provider, malformed headers have already collapsed to `None`.
#[derive(Debug, Clone)]
pub struct AuthRequest {
    /// The raw `Date` header, absent when the client sent none.
    pub date: Option<String>,
    /// The HTTP request method.
    pub method: String,
    /// The request path.
    pub path: String,
    /// The parsed primary authorization header.
    pub authorization: Option<ParsedAuthHeader>,
    /// The parsed secondary session-auth header.
    pub session_auth: Option<ParsedAuthHeader>,
}

impl AuthRequest {
    /// The identifier naming this request's session: the secondary header's
    /// prefix when present, the primary's otherwise.
    #[must_use]
    pub fn session_identifier(&self) -> Option<&SessionId> {
        self.session_auth
            .as_ref()
            .map(|h| &h.session_id)
            .or_else(|| self.authorization.as_ref().map(|h| &h.session_id))
    }

    /// Whether the inputs for one-shot authentication are present.
    fn has_authorization_data(&self) -> bool {
        self.date.is_some() && self.authorization.is_some()
    }

    /// Auth material for this request, available once a date header exists.
    fn material(&self, date: &str) -> String {
        auth_material(date, &self.method, &self.path)
    }
}

/// The outcome of authenticating one request.
///
/// The three rejection kinds map to the error conditions of the scheme;
/// everything else proceeds to the wrapped handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Let the request through. Carries the key seed issued this round, when
    /// session work happened.
    Proceed {
        /// Seed for the response header; `None` for one-shot and excluded
        /// requests.
        key_seed: Option<String>,
    },
    /// Required header(s) or a parseable identifier are absent.
    RejectMissing,
    /// Token mismatch, or any attempt past the lockout threshold.
    RejectInvalid,
    /// The session expired and no renewal data accompanied the request.
    RejectTimeout,
}

/// The authentication provider: configuration, derivation strategy, store.
///
/// Cheap to share behind an `Arc`; all state is immutable configuration or
/// lives in the store.
pub struct AuthProvider<S> {
    config: AuthConfig,
    deriver: Arc<dyn CredentialDeriver>,
    store: S,
}

impl<S> fmt::Debug for AuthProvider<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthProvider")
            .field("config", &self.config)
            .field("deriver", &"...")
            .finish()
    }
}

impl<S: SessionStore> AuthProvider<S> {
    /// Create a provider with the default SHA-1 derivation strategy.
    #[must_use]
    pub fn new(config: AuthConfig, store: S) -> Self {
        let deriver = Arc::new(Sha1Deriver::new(config.shared_secret.clone()));
        Self::with_deriver(config, store, deriver)
    }

    /// Create a provider with an injected derivation strategy.
    #[must_use]
    pub fn with_deriver(config: AuthConfig, store: S, deriver: Arc<dyn CredentialDeriver>) -> Self {
        if config.uses_placeholder_secret() {
            warn!("shared secret is the well-known placeholder; override it in production");
        }
        Self {
            config,
            deriver,
            store,
        }
    }

    /// The provider's configuration.
    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// The underlying session store.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Decide whether this request may proceed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the session store fails; infrastructure
    /// trouble is not an authentication outcome.
    pub async fn authenticate(&self, request: &AuthRequest) -> Result<Decision, StoreError> {
        if self.is_excluded(&request.path) {
            debug!(path = %request.path, "path excluded from authentication");
            return Ok(Decision::Proceed { key_seed: None });
        }

        if !self.config.use_session {
            return Ok(match self.one_shot_keys(request) {
                Ok(_) => Decision::Proceed { key_seed: None },
                Err(rejection) => rejection,
            });
        }

        let Some(id) = request.session_identifier().cloned() else {
            return Ok(Decision::RejectMissing);
        };

        if self.store.exists(&id).await? {
            self.authenticate_session(&id, request).await
        } else {
            self.start_session(&id, request).await
        }
    }

    /// The current stored key seed for this request, for the response header.
    ///
    /// `None` when session mode is off, the path is excluded, no identifier
    /// parses, or the record has no seed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the session store fails.
    pub async fn response_seed(&self, request: &AuthRequest) -> Result<Option<String>, StoreError> {
        if !self.config.use_session || self.is_excluded(&request.path) {
            return Ok(None);
        }
        let Some(id) = request.session_identifier() else {
            return Ok(None);
        };

        let record = self.store.read(id).await?;
        if record.key_seed.is_empty() {
            Ok(None)
        } else {
            Ok(Some(record.key_seed))
        }
    }

    fn is_excluded(&self, path: &str) -> bool {
        self.config
            .excluded_patterns
            .iter()
            .any(|re| re.is_match(path))
    }

    /// One-shot verification against the shared secret.
    ///
    /// The error side carries the rejection to surface when derivation cannot
    /// run (missing data) or fails (invalid token).
    fn one_shot_keys(&self, request: &AuthRequest) -> Result<SessionKeys, Decision> {
        let Some(date) = request.date.as_deref() else {
            return Err(Decision::RejectMissing);
        };
        let Some(auth) = request.authorization.as_ref() else {
            return Err(Decision::RejectMissing);
        };

        let material = request.material(date);
        self.deriver
            .derive(auth.session_id.as_str(), &material, &auth.token)
            .ok_or(Decision::RejectInvalid)
    }

    /// Start (or renew) the session for `id` from one-shot credentials.
    async fn start_session(
        &self,
        id: &SessionId,
        request: &AuthRequest,
    ) -> Result<Decision, StoreError> {
        let keys = match self.one_shot_keys(request) {
            Ok(keys) => keys,
            Err(rejection) => return Ok(rejection),
        };

        let record = SessionRecord::started(keys.session_secret, keys.key_seed);
        self.store
            .write(id, &record, self.config.record_ttl())
            .await?;

        debug!(session_id = %id, "session started");
        Ok(Decision::Proceed {
            key_seed: Some(record.key_seed),
        })
    }

    /// Authenticate a request against an existing session record.
    async fn authenticate_session(
        &self,
        id: &SessionId,
        request: &AuthRequest,
    ) -> Result<Decision, StoreError> {
        let Some(date) = request.date.as_deref() else {
            return Ok(Decision::RejectMissing);
        };
        let Some(session_auth) = request.session_auth.as_ref() else {
            return Ok(Decision::RejectMissing);
        };

        let record = self.store.read(id).await?;

        // The record may have been reaped between the existence check and the
        // read; the empty record's timestamp fails to parse and lands in the
        // expired branch, which is the fail-safe direction.
        if record.is_expired(self.config.session_ttl, Utc::now()) {
            if request.has_authorization_data() {
                debug!(session_id = %id, "session expired, re-authenticating one-shot");
                return self.start_session(id, request).await;
            }
            debug!(session_id = %id, "session expired with no renewal data");
            return Ok(Decision::RejectTimeout);
        }

        if record.failed_attempts >= self.config.max_failed_attempts {
            warn!(
                session_id = %id,
                failed_attempts = record.failed_attempts,
                "session locked out"
            );
            return Ok(Decision::RejectInvalid);
        }

        let material = request.material(date);
        let expected = self
            .deriver
            .session_token(&record.session_secret, &material);

        if !bool::from(expected.as_bytes().ct_eq(session_auth.token.as_bytes())) {
            let attempts = self
                .store
                .bump_failed_attempts(id, self.config.record_ttl())
                .await?;
            warn!(session_id = %id, failed_attempts = attempts, "session token mismatch");
            return Ok(Decision::RejectInvalid);
        }

        // A matching token revalidates the session: fresh credentials from the
        // primary header, counter back to zero. Identical to starting over.
        self.start_session(id, request).await
    }
}
