//! HTTP surface for MediVault.
//!
//! # Responsibility
//! - Translate JSON requests into `medivault_core` service calls.
//! - Authenticate bearer tokens and map service errors to status codes.
//!
//! # Invariants
//! - SQLite work never runs on the async executor; it goes through
//!   [`AppState::run`] on the blocking pool.
//! - All responses use the `success`/`data`/`error` envelope.

pub mod error;
pub mod extract;
pub mod routes;

use axum::extract::Request;
use axum::http::{Method, Uri};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::Router;
use error::{ApiError, ApiResult};
use log::info;
use medivault_core::{AppConfig, ServiceResult};
use rusqlite::Connection;
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// Shared handler state: one serialized SQLite connection plus config.
#[derive(Clone)]
pub struct AppState {
    conn: Arc<Mutex<Connection>>,
    config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(conn: Connection, config: AppConfig) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Runs `work` against the connection on the blocking thread pool.
    pub async fn run<T, F>(&self, work: F) -> ApiResult<T>
    where
        F: FnOnce(&Connection) -> ServiceResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        let joined = tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| ApiError::internal("database connection mutex poisoned"))?;
            work(&guard).map_err(ApiError::from)
        })
        .await;

        match joined {
            Ok(result) => result,
            Err(err) => Err(ApiError::internal(format!("blocking task failed: {err}"))),
        }
    }
}

/// Builds the full application router with request logging.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .nest("/api", routes::router())
        .fallback(route_not_found)
        .method_not_allowed_fallback(method_not_allowed)
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}

async fn route_not_found(uri: Uri) -> ApiError {
    ApiError::route_not_found(uri.path())
}

async fn method_not_allowed(method: Method, uri: Uri) -> ApiError {
    ApiError::method_not_allowed(method.as_str(), uri.path())
}

async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started_at = Instant::now();

    let response = next.run(request).await;
    let http_status = response.status();
    info!(
        "event=http_request module=api status={} method={} path={} http_status={} duration_ms={}",
        if http_status.is_server_error() { "error" } else { "ok" },
        method,
        path,
        http_status.as_u16(),
        started_at.elapsed().as_millis()
    );
    response
}
