use axum::{extract::rejection::JsonRejection, extract::State, Json};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;

use crate::app::AppState;
use crate::auth::access::require_authenticated;
use crate::database::models::User;
use crate::error::ApiError;
use crate::middleware::{clear_session_cookie, session_cookie, ApiResponse, ApiResult, RequestIdentity};

use super::util::json_body;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub password: String,
    pub role: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// POST /api/auth/register - Self-registration, always as end_user
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> ApiResult<User> {
    let req = json_body(payload)?;
    let user = state
        .auth
        .register(&req.email, &req.name, &req.password, req.role.as_deref())
        .await?;
    Ok(ApiResponse::created(user))
}

/// POST /api/auth/login - Verify credentials and set the session cookie
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<(CookieJar, ApiResponse<User>), ApiError> {
    let req = json_body(payload)?;
    let (token, user) = state.auth.login(&req.email, &req.password).await?;
    let cookie = session_cookie(token, state.config.security.cookie_secure);
    Ok((jar.add(cookie), ApiResponse::success(user)))
}

/// POST /api/auth/logout - Clear the session cookie
pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> (CookieJar, ApiResponse<()>) {
    let cookie = clear_session_cookie(state.config.security.cookie_secure);
    (jar.add(cookie), ApiResponse::<()>::no_content())
}

/// GET /api/auth/me - Profile of the calling user
pub async fn me(State(state): State<AppState>, identity: RequestIdentity) -> ApiResult<User> {
    let caller = require_authenticated(identity.get())?;
    let user = state.auth.profile(caller.user_id).await?;
    Ok(ApiResponse::success(user))
}
