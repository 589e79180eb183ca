use crate::error::{ok, ApiOk, ApiResult};
use crate::extract::{ApiJson, Caller};
use crate::AppState;
use axum::extract::State;
use axum::routing::{get, put};
use axum::{Json, Router};
use medivault_core::model::user::ProfileUpdate;
use medivault_core::{User, UserService};

pub(super) fn router() -> Router<AppState> {
    Router::new()
        .route("/users/me", put(update_me))
        .route("/doctors", get(list_doctors))
}

async fn update_me(
    State(state): State<AppState>,
    caller: Caller,
    ApiJson(update): ApiJson<ProfileUpdate>,
) -> ApiResult<Json<ApiOk<User>>> {
    let principal = caller.principal;
    let user = state
        .run(move |conn| UserService::from_connection(conn)?.update_profile(&principal, update))
        .await?;
    Ok(ok(user))
}

/// Any authenticated user may browse doctors when booking.
async fn list_doctors(
    State(state): State<AppState>,
    _caller: Caller,
) -> ApiResult<Json<ApiOk<Vec<User>>>> {
    let doctors = state
        .run(|conn| UserService::from_connection(conn)?.list_doctors())
        .await?;
    Ok(ok(doctors))
}
