//! Admin-only endpoints. Role checks live in the core services.

use crate::error::{created, ok, ApiOk, ApiResult};
use crate::extract::{ApiJson, ApiPath, ApiQuery, Caller};
use crate::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, patch};
use axum::{Json, Router};
use medivault_core::repo::report_repo::TableSchema;
use medivault_core::{
    ListResult, PageRequest, RegisterRequest, ReportService, ReportSummary, Role, User, UserId,
    UserService,
};
use serde::Deserialize;

pub(super) fn router() -> Router<AppState> {
    Router::new()
        .route("/admin/users", get(list_users).post(create_user))
        .route("/admin/users/:id/active", patch(set_active))
        .route("/admin/reports/summary", get(summary))
        .route("/admin/schema", get(schema))
}

#[derive(Debug, Deserialize)]
struct UserListParams {
    role: Option<Role>,
    limit: Option<u32>,
    offset: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ActiveChange {
    is_active: bool,
}

async fn list_users(
    State(state): State<AppState>,
    caller: Caller,
    ApiQuery(params): ApiQuery<UserListParams>,
) -> ApiResult<Json<ApiOk<ListResult<User>>>> {
    let principal = caller.principal;
    let page = PageRequest {
        limit: params.limit,
        offset: params.offset.unwrap_or(0),
    };
    let result = state
        .run(move |conn| UserService::from_connection(conn)?.list_users(&principal, params.role, page))
        .await?;
    Ok(ok(result))
}

async fn create_user(
    State(state): State<AppState>,
    caller: Caller,
    ApiJson(request): ApiJson<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<ApiOk<User>>)> {
    let principal = caller.principal;
    let user = state
        .run(move |conn| UserService::from_connection(conn)?.create_user(&principal, request))
        .await?;
    Ok(created(user))
}

async fn set_active(
    State(state): State<AppState>,
    caller: Caller,
    ApiPath(id): ApiPath<UserId>,
    ApiJson(change): ApiJson<ActiveChange>,
) -> ApiResult<Json<ApiOk<User>>> {
    let principal = caller.principal;
    let user = state
        .run(move |conn| {
            UserService::from_connection(conn)?.set_active(&principal, id, change.is_active)
        })
        .await?;
    Ok(ok(user))
}

async fn summary(
    State(state): State<AppState>,
    caller: Caller,
) -> ApiResult<Json<ApiOk<ReportSummary>>> {
    let principal = caller.principal;
    let summary = state
        .run(move |conn| ReportService::from_connection(conn)?.summary(&principal))
        .await?;
    Ok(ok(summary))
}

async fn schema(
    State(state): State<AppState>,
    caller: Caller,
) -> ApiResult<Json<ApiOk<Vec<TableSchema>>>> {
    let principal = caller.principal;
    let tables = state
        .run(move |conn| ReportService::from_connection(conn)?.schema(&principal))
        .await?;
    Ok(ok(tables))
}
