//! The authentication middleware service.
//!
//! [`AuthService`] ties request extraction, the authentication state machine,
//! and response mapping into a single hyper-compatible service. It handles:
//!
//! 1. Extracting the authentication inputs from the inbound request
//! 2. Asking the provider for a [`Decision`]
//! 3. On `Proceed`, invoking the wrapped [`AppHandler`] and attaching the
//!    current stored key seed as a response header (session mode only)
//! 4. Mapping rejections to `401`/`419` with fixed bodies
//! 5. Mapping store infrastructure failures to `500`

use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use gatehouse_core::{AuthProvider, Decision, SessionStore};

use crate::body::ResponseBody;
use crate::header::{SESSION_SEED_HEADER, auth_request};

/// Fixed body for `401` responses.
pub const UNAUTHORIZED_MESSAGE: &str = "Unauthorized";
/// Fixed body for `419` responses.
pub const TIMEOUT_MESSAGE: &str = "Authentication Timeout";

/// Non-standard status code reporting an expired session.
const AUTH_TIMEOUT_STATUS: u16 = 419;

/// The wrapped application, called once a request is allowed through.
///
/// Generic over the request body so the middleware works with hyper's
/// `Incoming` in production and plain unit bodies in tests.
#[async_trait]
pub trait AppHandler<B>: Send + Sync {
    /// Produce the downstream response for an authenticated request.
    async fn handle(&self, req: http::Request<B>) -> http::Response<ResponseBody>;
}

/// Hyper middleware service enforcing the authentication scheme.
#[derive(Debug)]
pub struct AuthService<H, S> {
    handler: Arc<H>,
    provider: Arc<AuthProvider<S>>,
}

impl<H, S> AuthService<H, S> {
    /// Create a service wrapping `handler` behind `provider`.
    #[must_use]
    pub fn new(handler: H, provider: AuthProvider<S>) -> Self {
        Self {
            handler: Arc::new(handler),
            provider: Arc::new(provider),
        }
    }

    /// Create a service from already shared parts.
    #[must_use]
    pub fn from_shared(handler: Arc<H>, provider: Arc<AuthProvider<S>>) -> Self {
        Self { handler, provider }
    }
}

impl<H, S> Clone for AuthService<H, S> {
    fn clone(&self) -> Self {
        Self {
            handler: Arc::clone(&self.handler),
            provider: Arc::clone(&self.provider),
        }
    }
}

impl<B, H, S> hyper::service::Service<http::Request<B>> for AuthService<H, S>
where
    B: Send + 'static,
    H: AppHandler<B> + 'static,
    S: SessionStore + 'static,
{
    type Response = http::Response<ResponseBody>;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn call(&self, req: http::Request<B>) -> Self::Future {
        let handler = Arc::clone(&self.handler);
        let provider = Arc::clone(&self.provider);

        Box::pin(async move { Ok(process_request(req, handler.as_ref(), provider.as_ref()).await) })
    }
}

/// Run one request through the authentication pipeline.
async fn process_request<B, H, S>(
    req: http::Request<B>,
    handler: &H,
    provider: &AuthProvider<S>,
) -> http::Response<ResponseBody>
where
    B: Send,
    H: AppHandler<B>,
    S: SessionStore,
{
    let auth = auth_request(req.method(), req.uri(), req.headers());
    debug!(method = %auth.method, path = %auth.path, "authenticating request");

    match provider.authenticate(&auth).await {
        Ok(Decision::Proceed { .. }) => {
            let mut response = handler.handle(req).await;

            // The response reports the *current* stored seed, which may have
            // rotated again under a concurrent renewal.
            match provider.response_seed(&auth).await {
                Ok(Some(seed)) => match http::HeaderValue::from_str(&seed) {
                    Ok(value) => {
                        response.headers_mut().insert(SESSION_SEED_HEADER, value);
                    }
                    Err(_) => warn!("stored key seed is not a valid header value"),
                },
                Ok(None) => {}
                Err(err) => {
                    warn!(error = %err, "session store failure while reading seed");
                    return store_error_response();
                }
            }

            response
        }
        Ok(decision @ (Decision::RejectMissing | Decision::RejectInvalid)) => {
            debug!(
                method = %auth.method,
                path = %auth.path,
                ?decision,
                "rejecting request"
            );
            unauthorized_response()
        }
        Ok(Decision::RejectTimeout) => {
            debug!(method = %auth.method, path = %auth.path, "session timed out");
            timeout_response()
        }
        Err(err) => {
            warn!(error = %err, "session store failure");
            store_error_response()
        }
    }
}

/// Produce the fixed `401 Unauthorized` response.
fn unauthorized_response() -> http::Response<ResponseBody> {
    http::Response::builder()
        .status(http::StatusCode::UNAUTHORIZED)
        .body(ResponseBody::from_string(UNAUTHORIZED_MESSAGE))
        .expect("static unauthorized response should be valid")
}

/// Produce the fixed `419 Authentication Timeout` response.
fn timeout_response() -> http::Response<ResponseBody> {
    http::Response::builder()
        .status(AUTH_TIMEOUT_STATUS)
        .body(ResponseBody::from_string(TIMEOUT_MESSAGE))
        .expect("static timeout response should be valid")
}

/// Produce the `500` response for store infrastructure failures.
fn store_error_response() -> http::Response<ResponseBody> {
    http::Response::builder()
        .status(http::StatusCode::INTERNAL_SERVER_ERROR)
        .body(ResponseBody::empty())
        .expect("static error response should be valid")
}
