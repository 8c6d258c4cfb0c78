//! Strict authorization-header parsing and request extraction.
//!
//! Authorization headers follow the literal format `<identifier>:<token>`,
//! both sides alphanumeric. Parsing never fails loudly: absent or malformed
//! headers collapse to `None`, which the state machine treats as missing
//! authorization data.

use http::{HeaderMap, Method, Uri};

use gatehouse_core::{AuthRequest, ParsedAuthHeader, SessionId};

/// The standard date header, input to the auth material.
pub const DATE_HEADER: &str = "date";
/// The primary authorization header, carrying one-shot credentials.
pub const AUTHORIZATION_HEADER: &str = "authorization";
/// The secondary header, carrying session-bound credentials.
pub const SESSION_AUTH_HEADER: &str = "x-session-auth";
/// The response header carrying the rotating key seed.
pub const SESSION_SEED_HEADER: &str = "x-session-seed";

/// Parse an authorization header value into identifier and token.
///
/// Accepts exactly `<identifier>:<token>` with a single colon, a non-empty
/// alphanumeric identifier, and a (possibly empty) alphanumeric token.
/// Everything else — no colon, extra colons, empty identifier, stray
/// characters — parses to `None`.
///
/// # Examples
///
/// ```
/// use gatehouse_http::parse_auth_header;
///
/// assert!(parse_auth_header("id123:a1b2c3").is_some());
/// assert!(parse_auth_header("no colon here").is_none());
/// assert!(parse_auth_header(":token").is_none());
/// ```
#[must_use]
pub fn parse_auth_header(value: &str) -> Option<ParsedAuthHeader> {
    let (id, token) = value.split_once(':')?;
    if !token.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return None;
    }
    let session_id = SessionId::new(id)?;
    Some(ParsedAuthHeader {
        session_id,
        token: token.to_owned(),
    })
}

/// Extract the five authentication inputs from a request.
///
/// Header lookup is case-insensitive (property of [`HeaderMap`]); values that
/// are not visible ASCII read as absent.
#[must_use]
pub fn auth_request(method: &Method, uri: &Uri, headers: &HeaderMap) -> AuthRequest {
    AuthRequest {
        date: header_str(headers, DATE_HEADER).map(ToOwned::to_owned),
        method: method.as_str().to_owned(),
        path: uri.path().to_owned(),
        authorization: header_str(headers, AUTHORIZATION_HEADER).and_then(parse_auth_header),
        session_auth: header_str(headers, SESSION_AUTH_HEADER).and_then(parse_auth_header),
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name)?.to_str().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_parse_well_formed_header() {
        let parsed = parse_auth_header("id123:a1b2c3").unwrap();
        assert_eq!(parsed.session_id.as_str(), "id123");
        assert_eq!(parsed.token, "a1b2c3");
    }

    #[test]
    fn test_should_parse_empty_token() {
        let parsed = parse_auth_header("id123:").unwrap();
        assert_eq!(parsed.token, "");
    }

    #[test]
    fn test_should_reject_missing_colon() {
        assert!(parse_auth_header("id123").is_none());
        assert!(parse_auth_header("").is_none());
    }

    #[test]
    fn test_should_reject_empty_identifier() {
        assert!(parse_auth_header(":a1b2c3").is_none());
    }

    #[test]
    fn test_should_reject_non_alphanumeric_parts() {
        assert!(parse_auth_header("id-123:a1b2c3").is_none());
        assert!(parse_auth_header("id123:a1b2 c3").is_none());
        assert!(parse_auth_header("id123:tok:en").is_none());
    }

    #[test]
    fn test_should_extract_request_inputs() {
        let req = http::Request::builder()
            .method(http::Method::GET)
            .uri("http://example.com/x?query=1")
            .header("Date", "Mon, 01 Jan 2024 00:00:00 GMT")
            .header("Authorization", "id123:abc")
            .header("X-Session-Auth", "id123:def")
            .body(())
            .expect("valid request");

        let auth = auth_request(req.method(), req.uri(), req.headers());
        assert_eq!(auth.date.as_deref(), Some("Mon, 01 Jan 2024 00:00:00 GMT"));
        assert_eq!(auth.method, "GET");
        assert_eq!(auth.path, "/x");
        assert_eq!(auth.authorization.unwrap().token, "abc");
        assert_eq!(auth.session_auth.unwrap().token, "def");
    }

    #[test]
    fn test_should_collapse_malformed_headers_to_absent() {
        let req = http::Request::builder()
            .uri("/x")
            .header("Authorization", "malformed")
            .body(())
            .expect("valid request");

        let auth = auth_request(req.method(), req.uri(), req.headers());
        assert!(auth.date.is_none());
        assert!(auth.authorization.is_none());
        assert!(auth.session_auth.is_none());
    }
}
