use crate::error::{ok, ApiOk, ApiResult};
use crate::extract::{ApiPath, ApiQuery, Caller};
use crate::AppState;
use axum::extract::State;
use axum::routing::{get, patch};
use axum::{Json, Router};
use medivault_core::{ListResult, Notification, NotificationId, NotificationService, PageRequest};
use serde::{Deserialize, Serialize};

pub(super) fn router() -> Router<AppState> {
    Router::new()
        .route("/notifications", get(list))
        .route("/notifications/unread-count", get(unread_count))
        .route("/notifications/read-all", patch(mark_all_read))
        .route("/notifications/:id/read", patch(mark_read))
}

#[derive(Debug, Deserialize)]
struct InboxParams {
    #[serde(default)]
    unread_only: bool,
    limit: Option<u32>,
    offset: Option<u32>,
}

#[derive(Debug, Serialize)]
struct UnreadCount {
    unread: u64,
}

#[derive(Debug, Serialize)]
struct Updated {
    updated: usize,
}

async fn list(
    State(state): State<AppState>,
    caller: Caller,
    ApiQuery(params): ApiQuery<InboxParams>,
) -> ApiResult<Json<ApiOk<ListResult<Notification>>>> {
    let principal = caller.principal;
    let page = PageRequest {
        limit: params.limit,
        offset: params.offset.unwrap_or(0),
    };
    let result = state
        .run(move |conn| {
            NotificationService::from_connection(conn)?.list(&principal, params.unread_only, page)
        })
        .await?;
    Ok(ok(result))
}

async fn unread_count(
    State(state): State<AppState>,
    caller: Caller,
) -> ApiResult<Json<ApiOk<UnreadCount>>> {
    let principal = caller.principal;
    let unread = state
        .run(move |conn| NotificationService::from_connection(conn)?.unread_count(&principal))
        .await?;
    Ok(ok(UnreadCount { unread }))
}

async fn mark_read(
    State(state): State<AppState>,
    caller: Caller,
    ApiPath(id): ApiPath<NotificationId>,
) -> ApiResult<Json<ApiOk<Updated>>> {
    let principal = caller.principal;
    state
        .run(move |conn| NotificationService::from_connection(conn)?.mark_read(&principal, id))
        .await?;
    Ok(ok(Updated { updated: 1 }))
}

async fn mark_all_read(
    State(state): State<AppState>,
    caller: Caller,
) -> ApiResult<Json<ApiOk<Updated>>> {
    let principal = caller.principal;
    let updated = state
        .run(move |conn| NotificationService::from_connection(conn)?.mark_all_read(&principal))
        .await?;
    Ok(ok(Updated { updated }))
}
