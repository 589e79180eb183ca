//! Route table, grouped by resource.

mod admin;
mod appointments;
mod auth;
mod notifications;
mod prescriptions;
mod users;

use crate::error::{ok, ApiOk};
use crate::AppState;
use axum::routing::get;
use axum::{Json, Router};
use medivault_core::PageRequest;
use serde::{Deserialize, Serialize};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .merge(auth::router())
        .merge(users::router())
        .merge(appointments::router())
        .merge(prescriptions::router())
        .merge(lab_tests::router())
        .merge(notifications::router())
        .merge(admin::router())
}

#[derive(Debug, Serialize)]
struct Health {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<ApiOk<Health>> {
    ok(Health {
        status: medivault_core::ping(),
        version: medivault_core::core_version(),
    })
}

/// `?status=&limit=&offset=` shared by the list endpoints.
#[derive(Debug, Deserialize)]
pub(crate) struct ListParams<S> {
    pub status: Option<S>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl<S> ListParams<S> {
    pub fn page(&self) -> PageRequest {
        PageRequest {
            limit: self.limit,
            offset: self.offset.unwrap_or(0),
        }
    }
}
