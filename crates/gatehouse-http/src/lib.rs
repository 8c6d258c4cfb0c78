//! HTTP request adapter and middleware service for Gatehouse.
//!
//! This crate is the transport boundary of the scheme. It extracts the five
//! authentication inputs from an inbound request (date header, method, path,
//! and the two authorization headers), hands them to the provider, and maps
//! the resulting decision back onto HTTP:
//!
//! - `Proceed` → the wrapped handler runs; in session mode the current stored
//!   key seed is attached as the `X-Session-Seed` response header.
//! - `RejectMissing` / `RejectInvalid` → `401 Unauthorized`.
//! - `RejectTimeout` → `419 Authentication Timeout`.
//!
//! # Modules
//!
//! - [`body`] - The response body type
//! - [`header`] - Strict authorization-header parsing and request extraction
//! - [`service`] - The hyper middleware service wrapping an app handler

pub mod body;
pub mod header;
pub mod service;

pub use body::ResponseBody;
pub use header::{
    AUTHORIZATION_HEADER, DATE_HEADER, SESSION_AUTH_HEADER, SESSION_SEED_HEADER, auth_request,
    parse_auth_header,
};
pub use service::{AppHandler, AuthService};
