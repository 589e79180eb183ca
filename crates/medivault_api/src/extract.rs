//! Request extractors: authenticated caller and envelope-aware JSON/query/path.

use crate::error::ApiError;
use crate::AppState;
use axum::async_trait;
use axum::extract::{FromRequest, FromRequestParts};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use medivault_core::{AuthService, Principal, User};

/// `axum::Json` with rejections rendered in the error envelope.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct ApiPath<T>(pub T);

/// Authenticated caller resolved from `Authorization: Bearer <token>`.
#[derive(Debug, Clone)]
pub struct Caller {
    pub principal: Principal,
    pub user: User,
    pub token: String,
    pub expires_at: i64,
}

#[async_trait]
impl FromRequestParts<AppState> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)?;
        let session_ttl_ms = state.config().session_ttl_ms();
        let lookup = token.clone();
        let context = state
            .run(move |conn| AuthService::from_connection(conn, session_ttl_ms)?.authenticate(&lookup))
            .await?;

        Ok(Self {
            principal: context.principal,
            user: context.user,
            token,
            expires_at: context.session.expires_at,
        })
    }
}

fn bearer_token(headers: &HeaderMap) -> Result<String, ApiError> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or_else(|| ApiError::unauthorized("missing Authorization header"))?
        .to_str()
        .map_err(|_| ApiError::unauthorized("invalid Authorization header"))?;
    let token = value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| ApiError::unauthorized("expected a Bearer token"))?;
    Ok(token.to_string())
}

#[cfg(test)]
mod tests {
    use super::bearer_token;
    use axum::http::{HeaderMap, HeaderValue};

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn bearer_token_is_extracted_and_trimmed() {
        assert_eq!(bearer_token(&headers("Bearer abc123 ")).unwrap(), "abc123");
    }

    #[test]
    fn other_schemes_and_empty_tokens_are_rejected() {
        assert!(bearer_token(&headers("Basic abc")).is_err());
        assert!(bearer_token(&headers("Bearer   ")).is_err());
        assert!(bearer_token(&HeaderMap::new()).is_err());
    }
}
