//! Gatehouse demo server.
//!
//! Wires the authentication middleware around a trivial JSON echo handler,
//! backed by the in-memory session store. Useful for exercising the scheme
//! end to end with curl or a client library.
//!
//! # Usage
//!
//! ```text
//! GATEHOUSE_SHARED_SECRET=mysecret GATEHOUSE_USE_SESSION=true gatehouse-server
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `GATEHOUSE_LISTEN` | `0.0.0.0:8080` | Bind address |
//! | `GATEHOUSE_SHARED_SECRET` | `change_me` | Shared secret (override it!) |
//! | `GATEHOUSE_USE_SESSION` | `false` | Enable session mode |
//! | `GATEHOUSE_SESSION_ID_TTL` | `3600` | Session id TTL in seconds |
//! | `GATEHOUSE_SESSION_TTL` | `3600` | Session TTL in seconds |
//! | `GATEHOUSE_MAX_FAILED_ATTEMPTS` | `10` | Lockout threshold |
//! | `GATEHOUSE_EXCLUDED_PATTERNS` | *(empty)* | Comma-separated path patterns |
//! | `GATEHOUSE_STORE_NAMESPACE` | *(empty)* | Store key namespace |
//! | `LOG_LEVEL` | `info` | Log level filter |
//! | `RUST_LOG` | *(unset)* | Fine-grained tracing filter (overrides `LOG_LEVEL`) |

use std::net::SocketAddr;

use anyhow::{Context, Result};
use async_trait::async_trait;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as HttpConnBuilder;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use gatehouse_core::{AuthConfig, AuthProvider, MemoryStore};
use gatehouse_http::{AppHandler, AuthService, ResponseBody};

/// Initialize the tracing subscriber.
///
/// Uses `RUST_LOG` if set, otherwise falls back to the `LOG_LEVEL` value.
fn init_tracing(log_level: &str) -> Result<()> {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::try_new(log_level)
            .with_context(|| format!("invalid log level filter: {log_level}"))?
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    Ok(())
}

/// The demo application behind the middleware: answers every authenticated
/// request with a small JSON echo of the method and path.
#[derive(Debug, Clone)]
struct EchoHandler;

#[async_trait]
impl<B: Send + 'static> AppHandler<B> for EchoHandler {
    async fn handle(&self, req: http::Request<B>) -> http::Response<ResponseBody> {
        let body = serde_json::json!({
            "status": "ok",
            "method": req.method().as_str(),
            "path": req.uri().path(),
        });

        http::Response::builder()
            .status(http::StatusCode::OK)
            .header("Content-Type", "application/json")
            .body(ResponseBody::from_string(body.to_string()))
            .expect("static echo response should be valid")
    }
}

/// Run the accept loop, serving connections until a shutdown signal arrives.
async fn serve(
    listener: TcpListener,
    service: AuthService<EchoHandler, MemoryStore>,
) -> Result<()> {
    let graceful = hyper_util::server::graceful::GracefulShutdown::new();
    let http = HttpConnBuilder::new(TokioExecutor::new());

    let shutdown = async {
        tokio::signal::ctrl_c().await.ok();
        info!("received shutdown signal, draining connections");
    };

    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = listener.accept() => {
                let (stream, peer_addr) = match result {
                    Ok(conn) => conn,
                    Err(e) => {
                        warn!(error = %e, "failed to accept connection");
                        continue;
                    }
                };

                let svc = service.clone();
                let conn = http.serve_connection(TokioIo::new(stream), svc);
                let conn = graceful.watch(conn.into_owned());

                tokio::spawn(async move {
                    if let Err(e) = conn.await {
                        error!(peer_addr = %peer_addr, error = %e, "connection error");
                    }
                });
            }

            () = &mut shutdown => {
                info!("shutting down gracefully");
                break;
            }
        }
    }

    // Wait for in-flight requests to complete.
    graceful.shutdown().await;
    info!("all connections drained, exiting");

    Ok(())
}

/// Read the bind address from the environment.
fn listen_addr() -> String {
    std::env::var("GATEHOUSE_LISTEN").unwrap_or_else(|_| "0.0.0.0:8080".to_string())
}

/// Read the log level from the environment.
fn log_level() -> String {
    std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing(&log_level())?;

    let config = AuthConfig::from_env();
    info!(
        use_session = config.use_session,
        session_ttl = config.session_ttl,
        max_failed_attempts = config.max_failed_attempts,
        "initializing authentication provider",
    );

    let store = MemoryStore::with_namespace(config.store_namespace.clone());
    let provider = AuthProvider::new(config, store);
    let service = AuthService::new(EchoHandler, provider);

    let listen = listen_addr();
    let addr: SocketAddr = listen
        .parse()
        .with_context(|| format!("invalid bind address: {listen}"))?;

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;

    info!(%addr, "starting gatehouse server");

    serve(listener, service).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_should_echo_method_and_path() {
        let handler = EchoHandler;
        let req = http::Request::builder()
            .method(http::Method::GET)
            .uri("/demo")
            .body(())
            .expect("valid request");

        let response = handler.handle(req).await;
        assert_eq!(response.status(), http::StatusCode::OK);
        assert_eq!(
            response
                .headers()
                .get("Content-Type")
                .and_then(|v| v.to_str().ok()),
            Some("application/json"),
        );
    }
}
