use crate::error::{created, ok, ApiOk, ApiResult};
use crate::extract::{ApiJson, Caller};
use crate::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use medivault_core::auth::access::permissions_for;
use medivault_core::{AuthService, LoginOutcome, RegisterRequest, User, UserService};
use serde::{Deserialize, Serialize};

pub(super) fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/me", get(me))
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Debug, Serialize)]
struct MeResponse {
    user: User,
    permissions: Vec<&'static str>,
    session_expires_at: i64,
}

#[derive(Debug, Serialize)]
struct LogoutResponse {
    logged_out: bool,
}

async fn register(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<ApiOk<User>>)> {
    let user = state
        .run(move |conn| UserService::from_connection(conn)?.register(request))
        .await?;
    Ok(created(user))
}

async fn login(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<LoginRequest>,
) -> ApiResult<Json<ApiOk<LoginOutcome>>> {
    let session_ttl_ms = state.config().session_ttl_ms();
    let outcome = state
        .run(move |conn| {
            AuthService::from_connection(conn, session_ttl_ms)?
                .login(&request.email, &request.password)
        })
        .await?;
    Ok(ok(outcome))
}

async fn logout(
    State(state): State<AppState>,
    caller: Caller,
) -> ApiResult<Json<ApiOk<LogoutResponse>>> {
    let session_ttl_ms = state.config().session_ttl_ms();
    let token = caller.token;
    state
        .run(move |conn| AuthService::from_connection(conn, session_ttl_ms)?.logout(&token))
        .await?;
    Ok(ok(LogoutResponse { logged_out: true }))
}

async fn me(caller: Caller) -> Json<ApiOk<MeResponse>> {
    ok(MeResponse {
        permissions: permissions_for(caller.principal.role)
            .into_iter()
            .map(|permission| permission.as_str())
            .collect(),
        session_expires_at: caller.expires_at,
        user: caller.user,
    })
}
