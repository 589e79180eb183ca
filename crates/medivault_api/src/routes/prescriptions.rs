use super::ListParams;
use crate::error::{created, ok, ApiOk, ApiResult};
use crate::extract::{ApiJson, ApiPath, ApiQuery, Caller};
use crate::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, patch};
use axum::{Json, Router};
use medivault_core::model::prescription::PrescriptionDraft;
use medivault_core::{
    ListResult, Prescription, PrescriptionId, PrescriptionService, PrescriptionStatus,
};

pub(super) fn router() -> Router<AppState> {
    Router::new()
        .route("/prescriptions", get(list).post(create))
        .route("/prescriptions/:id", get(fetch))
        .route("/prescriptions/:id/dispense", patch(dispense))
        .route("/prescriptions/:id/cancel", patch(cancel))
}

async fn list(
    State(state): State<AppState>,
    caller: Caller,
    ApiQuery(params): ApiQuery<ListParams<PrescriptionStatus>>,
) -> ApiResult<Json<ApiOk<ListResult<Prescription>>>> {
    let principal = caller.principal;
    let result = state
        .run(move |conn| {
            PrescriptionService::from_connection(conn)?.list(&principal, params.status, params.page())
        })
        .await?;
    Ok(ok(result))
}

async fn create(
    State(state): State<AppState>,
    caller: Caller,
    ApiJson(draft): ApiJson<PrescriptionDraft>,
) -> ApiResult<(StatusCode, Json<ApiOk<Prescription>>)> {
    let principal = caller.principal;
    let prescription = state
        .run(move |conn| PrescriptionService::from_connection(conn)?.create(&principal, draft))
        .await?;
    Ok(created(prescription))
}

async fn fetch(
    State(state): State<AppState>,
    caller: Caller,
    ApiPath(id): ApiPath<PrescriptionId>,
) -> ApiResult<Json<ApiOk<Prescription>>> {
    let principal = caller.principal;
    let prescription = state
        .run(move |conn| PrescriptionService::from_connection(conn)?.get(&principal, id))
        .await?;
    Ok(ok(prescription))
}

async fn dispense(
    State(state): State<AppState>,
    caller: Caller,
    ApiPath(id): ApiPath<PrescriptionId>,
) -> ApiResult<Json<ApiOk<Prescription>>> {
    let principal = caller.principal;
    let prescription = state
        .run(move |conn| PrescriptionService::from_connection(conn)?.dispense(&principal, id))
        .await?;
    Ok(ok(prescription))
}

async fn cancel(
    State(state): State<AppState>,
    caller: Caller,
    ApiPath(id): ApiPath<PrescriptionId>,
) -> ApiResult<Json<ApiOk<Prescription>>> {
    let principal = caller.principal;
    let prescription = state
        .run(move |conn| PrescriptionService::from_connection(conn)?.cancel(&principal, id))
        .await?;
    Ok(ok(prescription))
}
