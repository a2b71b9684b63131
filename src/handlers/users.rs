use std::collections::HashMap;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::app::AppState;
use crate::auth::Role;
use crate::database::models::User;
use crate::database::UserFilter;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};

use super::util::{json_body, parse_id, query_int, query_str};

pub const DEFAULT_USER_LIMIT: i64 = 20;

#[derive(Debug, Serialize)]
pub struct UserPage {
    pub items: Vec<User>,
    pub total: i64,
}

#[derive(Debug, Deserialize)]
pub struct RoleRequest {
    #[serde(default)]
    pub role: String,
}

#[derive(Debug, Deserialize)]
pub struct ActiveRequest {
    pub active: bool,
}

#[derive(Debug, Deserialize)]
pub struct BasicRequest {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct PasswordRequest {
    #[serde(default)]
    pub password: String,
}

fn parse_active(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "t" => Some(true),
        "false" | "0" | "f" => Some(false),
        _ => None,
    }
}

fn user_filter(params: &HashMap<String, String>) -> Result<UserFilter, ApiError> {
    let role = match query_str(params, "role").as_str() {
        "" => None,
        raw => Some(
            raw.parse::<Role>()
                .map_err(|e| ApiError::field_error("role", e.to_string()))?,
        ),
    };
    Ok(UserFilter {
        q: query_str(params, "q"),
        role,
        active: parse_active(&query_str(params, "active")),
        limit: query_int(params, "limit", DEFAULT_USER_LIMIT),
        offset: query_int(params, "offset", 0),
    })
}

/// GET /api/users - Paginated user directory (admin)
pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<UserPage> {
    let filter = user_filter(&params)?;
    let (items, total) = state.users.list(&filter).await?;
    Ok(ApiResponse::success(UserPage { items, total }).with_total_count(total))
}

/// PATCH /api/users/:id/role - Change a user's role (admin)
pub async fn update_role(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<RoleRequest>, JsonRejection>,
) -> ApiResult<User> {
    let id = parse_id(&id)?;
    let req = json_body(payload)?;
    let role = req
        .role
        .parse::<Role>()
        .map_err(|e| ApiError::field_error("role", e.to_string()))?;
    let user = state.users.update_role(id, role).await?;
    Ok(ApiResponse::success(user))
}

/// PATCH /api/users/:id/active - Enable or disable a user (admin)
pub async fn set_active(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<ActiveRequest>, JsonRejection>,
) -> ApiResult<User> {
    let id = parse_id(&id)?;
    let req = json_body(payload)?;
    let user = state.users.set_active(id, req.active).await?;
    Ok(ApiResponse::success(user))
}

/// PATCH /api/users/:id/basic - Update display name (self or admin)
pub async fn update_basic(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<BasicRequest>, JsonRejection>,
) -> ApiResult<User> {
    let id = parse_id(&id)?;
    let req = json_body(payload)?;
    let user = state.users.update_basic(id, &req.name).await?;
    Ok(ApiResponse::success(user))
}

/// PATCH /api/users/:id/password - Set a new password (self or admin)
pub async fn update_password(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<PasswordRequest>, JsonRejection>,
) -> ApiResult<Value> {
    let id = parse_id(&id)?;
    let req = json_body(payload)?;
    state.auth.change_password(id, &req.password).await?;
    Ok(ApiResponse::success(json!({"status": "ok"})))
}
