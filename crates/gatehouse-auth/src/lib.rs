//! Challenge-response credential derivation for Gatehouse.
//!
//! This crate implements the cryptographic half of the Gatehouse
//! authentication scheme: verifying a client-supplied one-shot token against
//! the shared secret and, on success, issuing a fresh per-session secret
//! together with its public seed.
//!
//! # Overview
//!
//! A client proves knowledge of the shared secret by sending
//! `hex(digest(secret \n date \n method \n path))` alongside the request.
//! The server recomputes the token from the same request-bound material and,
//! when it matches, rotates the session: a cryptographically random seed is
//! drawn and the next session secret is derived as
//! `hex(digest(secret \n seed))`. The seed is returned to the client, which
//! can derive the matching session token for its next request.
//!
//! # Modules
//!
//! - [`deriver`] - The [`CredentialDeriver`] strategy trait and its digest-based
//!   implementation
//! - [`material`] - Request-bound auth material construction

pub mod deriver;
pub mod material;

pub use deriver::{CredentialDeriver, DigestDeriver, SessionKeys, Sha1Deriver, Sha256Deriver};
pub use material::auth_material;
