//! Request-bound auth material.
//!
//! Both the one-shot token and the session token are digests over a piece of
//! data tied to the individual request: the `Date` header, the HTTP method,
//! and the request path, joined by newlines. The material is derived per
//! request and never persisted.

/// Build the auth material for a request.
///
/// The order is fixed: `date`, `method`, `path`, newline-separated. Swapping
/// any two components produces different material and therefore a different
/// token.
///
/// # Examples
///
/// ```
/// use gatehouse_auth::auth_material;
///
/// let material = auth_material("Mon, 01 Jan 2024 00:00:00 GMT", "GET", "/x");
/// assert_eq!(material, "Mon, 01 Jan 2024 00:00:00 GMT\nGET\n/x");
/// ```
#[must_use]
pub fn auth_material(date: &str, method: &str, path: &str) -> String {
    format!("{date}\n{method}\n{path}")
}
