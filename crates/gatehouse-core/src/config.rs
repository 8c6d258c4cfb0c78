//! Immutable provider configuration.
//!
//! Configuration is built once at startup and passed into the provider's
//! constructor; nothing here is mutated afterwards. Environment-variable
//! loading follows the project convention: every option has a default and a
//! `GATEHOUSE_*` override.

use std::env;
use std::fmt;
use std::time::Duration;

use regex::Regex;
use tracing::warn;

/// Default session identifier TTL in seconds.
pub const DEFAULT_SESSION_ID_TTL: u64 = 60 * 60;
/// Default session TTL in seconds.
pub const DEFAULT_SESSION_TTL: u64 = 60 * 60;
/// Placeholder shared secret. MUST be overridden in production.
pub const DEFAULT_SHARED_SECRET: &str = "change_me";
/// Default failed-attempt lockout threshold.
pub const DEFAULT_MAX_FAILED_ATTEMPTS: u32 = 10;

/// Configuration for the authentication provider.
#[derive(Clone)]
pub struct AuthConfig {
    /// Session identifier TTL in seconds (store-entry lifetime component).
    pub session_id_ttl: u64,
    /// Session TTL in seconds (expiry horizon from `created_at`).
    pub session_ttl: u64,
    /// Process-wide shared secret. Never transmitted.
    pub shared_secret: String,
    /// Failed-attempt count at which a session locks out.
    pub max_failed_attempts: u32,
    /// Whether session mode is enabled. Off means one-shot only.
    pub use_session: bool,
    /// Request paths matching any of these bypass authentication entirely.
    pub excluded_patterns: Vec<Regex>,
    /// Store key namespace for multi-tenant isolation.
    pub store_namespace: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_id_ttl: DEFAULT_SESSION_ID_TTL,
            session_ttl: DEFAULT_SESSION_TTL,
            shared_secret: DEFAULT_SHARED_SECRET.to_owned(),
            max_failed_attempts: DEFAULT_MAX_FAILED_ATTEMPTS,
            use_session: false,
            excluded_patterns: Vec::new(),
            store_namespace: String::new(),
        }
    }
}

impl AuthConfig {
    /// Load configuration from `GATEHOUSE_*` environment variables.
    ///
    /// Unset variables keep their defaults. Unparseable numeric values and
    /// invalid exclusion patterns are skipped with a warning rather than
    /// aborting startup.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(v) = env_u64("GATEHOUSE_SESSION_ID_TTL") {
            config.session_id_ttl = v;
        }
        if let Some(v) = env_u64("GATEHOUSE_SESSION_TTL") {
            config.session_ttl = v;
        }
        if let Ok(v) = env::var("GATEHOUSE_SHARED_SECRET") {
            config.shared_secret = v;
        }
        if let Some(v) = env_u64("GATEHOUSE_MAX_FAILED_ATTEMPTS") {
            config.max_failed_attempts = u32::try_from(v).unwrap_or(u32::MAX);
        }
        if let Ok(v) = env::var("GATEHOUSE_USE_SESSION") {
            config.use_session = matches!(v.as_str(), "1" | "true" | "yes" | "TRUE" | "YES");
        }
        if let Ok(v) = env::var("GATEHOUSE_EXCLUDED_PATTERNS") {
            config.excluded_patterns = parse_patterns(&v);
        }
        if let Ok(v) = env::var("GATEHOUSE_STORE_NAMESPACE") {
            config.store_namespace = v;
        }

        config
    }

    /// Store-entry lifetime: `session_id_ttl + session_ttl`.
    #[must_use]
    pub fn record_ttl(&self) -> Duration {
        Duration::from_secs(self.session_id_ttl.saturating_add(self.session_ttl))
    }

    /// Whether the shared secret is still the well-known placeholder.
    #[must_use]
    pub fn uses_placeholder_secret(&self) -> bool {
        self.shared_secret == DEFAULT_SHARED_SECRET
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("session_id_ttl", &self.session_id_ttl)
            .field("session_ttl", &self.session_ttl)
            .field("shared_secret", &"<redacted>")
            .field("max_failed_attempts", &self.max_failed_attempts)
            .field("use_session", &self.use_session)
            .field(
                "excluded_patterns",
                &self
                    .excluded_patterns
                    .iter()
                    .map(Regex::as_str)
                    .collect::<Vec<_>>(),
            )
            .field("store_namespace", &self.store_namespace)
            .finish()
    }
}

/// Parse a comma-separated list of exclusion patterns, skipping invalid ones.
fn parse_patterns(raw: &str) -> Vec<Regex> {
    raw.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .filter_map(|p| match Regex::new(p) {
            Ok(re) => Some(re),
            Err(e) => {
                warn!(pattern = %p, error = %e, "skipping invalid exclusion pattern");
                None
            }
        })
        .collect()
}

fn env_u64(key: &str) -> Option<u64> {
    let raw = env::var(key).ok()?;
    match raw.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(var = %key, value = %raw, "ignoring unparseable numeric value");
            None
        }
    }
}
