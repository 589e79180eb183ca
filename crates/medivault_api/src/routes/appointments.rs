use super::ListParams;
use crate::error::{created, ok, ApiOk, ApiResult};
use crate::extract::{ApiJson, ApiPath, ApiQuery, Caller};
use crate::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, patch};
use axum::{Json, Router};
use medivault_core::{
    Appointment, AppointmentId, AppointmentService, AppointmentStatus, BookAppointmentRequest,
    ListResult,
};
use serde::Deserialize;

pub(super) fn router() -> Router<AppState> {
    Router::new()
        .route("/appointments", get(list).post(book))
        .route("/appointments/:id", get(fetch))
        .route("/appointments/:id/status", patch(update_status))
}

#[derive(Debug, Deserialize)]
struct StatusChange {
    status: AppointmentStatus,
    #[serde(default)]
    notes: Option<String>,
}

async fn list(
    State(state): State<AppState>,
    caller: Caller,
    ApiQuery(params): ApiQuery<ListParams<AppointmentStatus>>,
) -> ApiResult<Json<ApiOk<ListResult<Appointment>>>> {
    let principal = caller.principal;
    let result = state
        .run(move |conn| {
            AppointmentService::from_connection(conn)?.list(&principal, params.status, params.page())
        })
        .await?;
    Ok(ok(result))
}

async fn book(
    State(state): State<AppState>,
    caller: Caller,
    ApiJson(request): ApiJson<BookAppointmentRequest>,
) -> ApiResult<(StatusCode, Json<ApiOk<Appointment>>)> {
    let principal = caller.principal;
    let appointment = state
        .run(move |conn| AppointmentService::from_connection(conn)?.book(&principal, request))
        .await?;
    Ok(created(appointment))
}

async fn fetch(
    State(state): State<AppState>,
    caller: Caller,
    ApiPath(id): ApiPath<AppointmentId>,
) -> ApiResult<Json<ApiOk<Appointment>>> {
    let principal = caller.principal;
    let appointment = state
        .run(move |conn| AppointmentService::from_connection(conn)?.get(&principal, id))
        .await?;
    Ok(ok(appointment))
}

async fn update_status(
    State(state): State<AppState>,
    caller: Caller,
    ApiPath(id): ApiPath<AppointmentId>,
    ApiJson(change): ApiJson<StatusChange>,
) -> ApiResult<Json<ApiOk<Appointment>>> {
    let principal = caller.principal;
    let appointment = state
        .run(move |conn| {
            AppointmentService::from_connection(conn)?.update_status(
                &principal,
                id,
                change.status,
                change.notes,
            )
        })
        .await?;
    Ok(ok(appointment))
}
